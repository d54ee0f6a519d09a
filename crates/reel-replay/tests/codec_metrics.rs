//! Checkpoint statistics reported through an injected metrics sink.

use std::io::Cursor;

use reel_replay::{Advance, CodecStats, ReplayConfig, ReplaySession};
use reel_test_utils::{patterned_state, MockCore};

fn config() -> ReplayConfig {
    ReplayConfig {
        block_size: 32,
        superblock_size: 4,
        ..ReplayConfig::new(1)
    }
}

#[test]
fn unchanged_frames_skip_every_block() {
    let mut rec = ReplaySession::begin_recording_with_metrics(
        Cursor::new(Vec::new()),
        MockCore::new(patterned_state(512, 6)),
        config(),
        3,
        0,
        CodecStats::default(),
    )
    .unwrap();
    for _ in 0..4 {
        rec.advance_frame().unwrap();
    }

    let stats = rec.metrics().clone();
    assert_eq!(stats.encodes, 5);
    assert_eq!(stats.decodes, 0);
    assert_eq!(stats.blocks, 5 * 16);
    assert_eq!(stats.blocks_skipped, 4 * 16);
    assert_eq!(stats.hashes(), 16);
    assert_eq!(stats.superblocks, 5 * 4);
    assert_eq!(stats.bytes_in, 5 * 512);
    assert!(stats.compression_ratio().is_some());

    let (stream, _, _) = rec.finish().unwrap();
    let mut p = ReplaySession::begin_playback_with_metrics(
        Cursor::new(stream.into_inner()),
        MockCore::new(vec![]),
        config(),
        CodecStats::default(),
    )
    .unwrap();
    while p.advance_frame().unwrap() != Advance::Ended {}
    assert_eq!(p.metrics().decodes, 5);
    assert_eq!(p.metrics().encodes, 0);
    assert_eq!(p.core().state, patterned_state(512, 6));
}

#[test]
fn borrowed_sink_outlives_the_session() {
    let mut stats = CodecStats::default();
    let mut rec = ReplaySession::begin_recording_with_metrics(
        Cursor::new(Vec::new()),
        MockCore::new(vec![0; 64]),
        config(),
        3,
        0,
        &mut stats,
    )
    .unwrap();
    rec.advance_frame().unwrap();
    rec.finish().unwrap();
    assert_eq!(stats.encodes, 2);
    // An all-zero state dedups entirely to the reserved zero block.
    assert_eq!(stats.blocks_new, 0);
}
