//! Sessions backed by a real file.

use std::fs::File;
use std::io::{Cursor, Read, Seek, SeekFrom};

use reel_core::ReplayStream;
use reel_replay::{Advance, ReplayConfig, ReplaySession, SnapshotLoad};
use reel_test_utils::{key, pad_input, patterned_state, MockCore};

fn config() -> ReplayConfig {
    ReplayConfig {
        block_size: 64,
        superblock_size: 8,
        frame_history: 8,
        ..ReplayConfig::new(4)
    }
}

/// Record frame `n` over a core state that depends only on `seed` and `n`.
fn step<S: ReplayStream>(s: &mut ReplaySession<S, MockCore>, seed: u64, n: u32) {
    let mut state = patterned_state(1024, seed);
    state[(n as usize * 61) % 1024] = n as u8;
    s.core_mut().state = state;
    assert!(s.push_key_event(key(n)));
    assert!(s.push_input_event(pad_input(0, n as i16)));
    s.advance_frame().unwrap();
}

fn contents(mut file: File) -> Vec<u8> {
    file.seek(SeekFrom::Start(0)).unwrap();
    let mut out = Vec::new();
    file.read_to_end(&mut out).unwrap();
    out
}

#[test]
fn file_recording_matches_memory_recording() {
    let file = tempfile::tempfile().unwrap();
    let mut on_disk = ReplaySession::begin_recording(
        file,
        MockCore::new(patterned_state(1024, 8)),
        config(),
        0xD15C,
        9,
    )
    .unwrap();
    for n in 1..=12 {
        step(&mut on_disk, 8, n);
    }
    for _ in 0..10 {
        on_disk.rewind_one_frame().unwrap();
    }
    assert_eq!(on_disk.frame_count(), 2);
    let snap = on_disk.serialize_session_to_bytes().unwrap();
    let saved = on_disk.core().state.clone();
    for n in 3..=6 {
        step(&mut on_disk, 8, n);
    }
    on_disk.core_mut().state = saved;
    assert_eq!(on_disk.load_external_snapshot(&snap).unwrap(), SnapshotLoad::Resumed);
    for n in 3..=9 {
        step(&mut on_disk, 8, n);
    }
    let (file, _, _) = on_disk.finish().unwrap();
    let disk_log = contents(file);

    let mut in_memory = ReplaySession::begin_recording(
        Cursor::new(Vec::new()),
        MockCore::new(patterned_state(1024, 8)),
        config(),
        0xD15C,
        9,
    )
    .unwrap();
    for n in 1..=9 {
        step(&mut in_memory, 8, n);
    }
    let memory_log = in_memory.finish().unwrap().0.into_inner();
    assert_eq!(disk_log, memory_log);
}

#[test]
fn playback_from_file() {
    let mut file = tempfile::tempfile().unwrap();
    let mut rec = ReplaySession::begin_recording(
        &mut file,
        MockCore::new(patterned_state(1024, 3)),
        config(),
        1,
        0,
    )
    .unwrap();
    let mut states = Vec::new();
    for n in 1..=8 {
        step(&mut rec, 3, n);
        states.push(rec.core().state.clone());
    }
    rec.finish().unwrap();

    let mut p = ReplaySession::begin_playback(file, MockCore::new(vec![]), config()).unwrap();
    assert_eq!(p.header().frame_count, 8);
    for n in 1..=8u32 {
        let advance = p.advance_frame().unwrap();
        assert_eq!(advance, Advance::Played { checkpoint: n % 4 == 0 });
        assert_eq!(p.take_key_events(), vec![key(n)]);
        assert_eq!(p.input_state(0, 1, 0, 0), Some(n as i16));
        if n % 4 == 0 {
            assert_eq!(p.core().state, states[n as usize - 1]);
        }
    }
    assert_eq!(p.advance_frame().unwrap(), Advance::Ended);

    // Stepping back from the end replays the last frame's checkpoint.
    p.rewind_one_frame().unwrap();
    assert_eq!(p.frame_count(), 8);
    assert_eq!(p.core().state, states[7]);
}
