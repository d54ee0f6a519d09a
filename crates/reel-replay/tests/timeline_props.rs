//! Timeline comparison over generated logs.

use proptest::prelude::*;
use reel_core::{InputEvent, KeyEvent};
use reel_replay::{same_timeline, Checkpoint, EncodedCheckpoint, LogHeader, LogWriter};

/// Shape of one generated frame: key count, input count, checkpoint
/// payload length (if any) and a value seed.
type FrameShape = (usize, usize, Option<usize>, u16);

fn frame_shapes() -> impl Strategy<Value = Vec<FrameShape>> {
    prop::collection::vec(
        (0usize..3, 0usize..4, prop::option::of(0usize..24), any::<u16>()),
        1..12,
    )
}

/// Build a log from `shapes`, returning it with the end offset of the
/// initial section followed by the end offset of every frame.
fn build(shapes: &[FrameShape]) -> (Vec<u8>, Vec<usize>) {
    let header = LogHeader::new(0xFEED, 3, 8, 2, 0);
    let initial = Checkpoint::Encoded(EncodedCheckpoint {
        compression: 0,
        encoding: 0,
        state_size: 6,
        encoded_size: 6,
        payload: vec![1, 2, 3, 4, 5, 6],
    });
    let mut w = LogWriter::new(Vec::new(), &header, &initial).unwrap();
    let mut ends = vec![w.bytes_written() as usize];
    for &(keys, inputs, checkpoint, seed) in shapes {
        let keys: Vec<_> = (0..keys)
            .map(|i| KeyEvent {
                down: i % 2 == 0,
                modifiers: seed,
                code: u32::from(seed) + i as u32,
                character: i as u32,
            })
            .collect();
        let inputs: Vec<_> = (0..inputs)
            .map(|i| InputEvent {
                port: 0,
                device: 1,
                index: 0,
                id: i as u16,
                value: seed as i16 ^ i as i16,
            })
            .collect();
        let checkpoint = checkpoint.map(|len| Checkpoint::Raw(vec![seed as u8; len]));
        w.write_frame(&keys, &inputs, checkpoint).unwrap();
        ends.push(w.bytes_written() as usize);
    }
    (w.into_inner(), ends)
}

/// Offset of frame `k`'s tag byte, where the frame starts at `start`.
fn tag_offset(start: usize, shape: &FrameShape) -> usize {
    start + 4 + 1 + shape.0 * KeyEvent::WIRE_SIZE + 2 + shape.1 * InputEvent::WIRE_SIZE
}

proptest! {
    #[test]
    fn every_frame_prefix_shares_the_timeline(shapes in frame_shapes()) {
        let (log, ends) = build(&shapes);
        for &end in &ends {
            prop_assert!(same_timeline(&log, &log[..end]));
            prop_assert!(same_timeline(&log[..end], &log));
        }
    }

    #[test]
    fn edited_events_diverge_at_that_frame(
        shapes in frame_shapes(),
        frame in any::<prop::sample::Index>(),
        byte in any::<prop::sample::Index>(),
        mask in 1u8..=255,
    ) {
        let (log, ends) = build(&shapes);
        let k = frame.index(shapes.len()) + 1;
        let start = ends[k - 1];
        // Key count through tag: every byte here is compared exactly.
        let first = start + 4;
        let last = tag_offset(start, &shapes[k - 1]);
        let at = first + byte.index(last - first + 1);

        let mut other = log[..ends[k]].to_vec();
        other[at] ^= mask;
        prop_assert!(!same_timeline(&log, &other));
        prop_assert!(same_timeline(&log, &other[..start]));
    }

    #[test]
    fn back_references_are_not_compared(
        shapes in frame_shapes(),
        frame in any::<prop::sample::Index>(),
        mask in 1u8..=255,
    ) {
        let (log, ends) = build(&shapes);
        let k = frame.index(shapes.len()) + 1;
        let mut other = log.clone();
        other[ends[k - 1]] ^= mask;
        prop_assert!(same_timeline(&log, &other));
    }
}
