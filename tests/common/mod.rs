//! Common test helpers and utilities shared across test suite.

use gotrack::{Pipeline, PipelineConfig, Schedule, TrackSchema};

/// Builds one GoTrack trackspoints line: `id,latitude,longitude,track_id,time`.
#[allow(dead_code)]
pub fn go_track_line(id: usize, track: usize) -> String {
    format!(
        "{id},-10.{:06},-37.{:06},{track},2014-09-13 07:{:02}:{:02}\n",
        939_341 + id,
        62_742 + id * 7,
        (id / 60) % 60,
        id % 60
    )
}

/// Builds a GoTrack dataset of `records` lines spread over a few tracks.
#[allow(dead_code)]
pub fn go_track_dataset(records: usize) -> Vec<u8> {
    (0..records)
        .map(|i| go_track_line(i + 1, i / 50 + 1))
        .collect::<String>()
        .into_bytes()
}

/// Expected reprojection of [`go_track_dataset`], computed independently.
#[allow(dead_code)]
pub fn expected_go_track_output(records: usize) -> Vec<u8> {
    let mut out = Vec::new();
    for i in 0..records {
        let line = go_track_line(i + 1, i / 50 + 1);
        let fields: Vec<&str> = line.trim_end_matches('\n').split(',').collect();
        out.extend_from_slice(format!("{},{},{}\n", fields[3], fields[1], fields[2]).as_bytes());
    }
    out
}

/// Four-column layout `ID,flag,lat,lon` used by the reference examples.
#[allow(dead_code)]
pub fn four_column_schema() -> TrackSchema {
    TrackSchema::new(4, 0, 2, 3).expect("valid schema")
}

/// Pipeline built from `config` with the given schedule.
#[allow(dead_code)]
pub fn pipeline_with(schedule: Schedule, config: PipelineConfig) -> Pipeline {
    Pipeline::new(PipelineConfig { schedule, ..config }).expect("pipeline setup")
}

/// Both schedules, for tests that must hold under each.
#[allow(dead_code)]
pub const SCHEDULES: [Schedule; 2] = [Schedule::Phased, Schedule::Streaming];
