//! Fuzz target: arbitrary bytes through both schedules.
//!
//! Any input must either be rejected with an error or produce identical,
//! sentinel-free output under both schedules. Never panic.

#![no_main]

use gotrack::{
    BoundaryScanner, Pipeline, PipelineConfig, RecoveryMode, Schedule, TransformError, SENTINEL,
};
use libfuzzer_sys::fuzz_target;

fn pipeline(schedule: Schedule) -> Pipeline {
    let config = PipelineConfig {
        schedule,
        recovery: RecoveryMode::Permissive,
        chunk_size: 64,
        parallel_scan_threshold: 256,
        channel_capacity: 2,
        ..PipelineConfig::default()
    };
    match Pipeline::new(config) {
        Ok(pipeline) => pipeline,
        Err(e) => panic!("pipeline setup failed: {e}"),
    }
}

fuzz_target!(|data: &[u8]| {
    let newlines = BoundaryScanner::newline().with_chunk_size(7).with_parallel_threshold(0);
    let scanned = newlines.scan(data);
    assert_eq!(scanned.len(), newlines.count(data));

    let phased = pipeline(Schedule::Phased).transform_bytes(data.to_vec());
    let streaming = pipeline(Schedule::Streaming).transform_bytes(data.to_vec());
    match (phased, streaming) {
        (Ok(a), Ok(b)) => {
            assert_eq!(a, b);
            assert!(!a.contains(&SENTINEL));
            assert!(a.len() <= data.len());
        },
        (Err(TransformError::EmptyInput { .. }), Err(TransformError::EmptyInput { .. }))
        | (
            Err(TransformError::SentinelInInput { .. }),
            Err(TransformError::SentinelInInput { .. }),
        ) => {},
        (a, b) => panic!("schedules disagree: {a:?} vs {b:?}"),
    }
});
