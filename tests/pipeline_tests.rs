//! Integration tests for the trackpoint pipeline

mod common;

use common::{
    expected_go_track_output, four_column_schema, go_track_dataset, pipeline_with, SCHEDULES,
};
use gotrack::{
    write_output, DatasetPaths, HeaderPolicy, PipelineConfig, RecoveryMode, Schedule,
    SharedArena, TransformError, SENTINEL,
};
use std::fs;
use tempfile::tempdir;

#[test]
fn test_reference_example_both_schedules() {
    for schedule in SCHEDULES {
        let config = PipelineConfig {
            schema: four_column_schema(),
            ..PipelineConfig::default()
        };
        let pipeline = pipeline_with(schedule, config);
        let output = pipeline
            .transform_bytes(b"1,0,-19.0,-42.0\n2,0,-19.1,-42.1\n".to_vec())
            .expect("transform");
        assert_eq!(output, b"1,-19.0,-42.0\n2,-19.1,-42.1\n", "{schedule}");
    }
}

#[test]
fn test_go_track_dataset_both_schedules() {
    let input = go_track_dataset(2_000);
    let expected = expected_go_track_output(2_000);
    for schedule in SCHEDULES {
        let config = PipelineConfig {
            chunk_size: 1_024,
            parallel_scan_threshold: 4_096,
            channel_capacity: 2,
            ..PipelineConfig::default()
        };
        let pipeline = pipeline_with(schedule, config);
        let mut arena = SharedArena::from_input(input.clone(), "dataset").unwrap();
        let report = pipeline.run(&mut arena).expect("run");

        assert_eq!(report.newlines, 2_000);
        assert_eq!(report.delimiters, 8_000);
        assert_eq!(report.summary.records, 2_000);
        assert_eq!(report.summary.emitted, 2_000);
        assert!(report.output_len() < report.input_len);
        assert_eq!(arena.output().unwrap().content(), expected.as_slice());
    }
}

#[test]
fn test_single_record_without_terminator() {
    for schedule in SCHEDULES {
        let pipeline = pipeline_with(schedule, PipelineConfig::default());
        let output = pipeline
            .transform_bytes(b"1,-10.93,-37.06,4,2014-09-13 07:24:32".to_vec())
            .unwrap();
        assert_eq!(output, b"4,-10.93,-37.06\n");
    }
}

#[test]
fn test_output_never_exceeds_capacity_and_is_sentinel_terminated() {
    let input = go_track_dataset(300);
    let pipeline = pipeline_with(Schedule::Phased, PipelineConfig::default());
    let mut arena = SharedArena::from_input(input.clone(), "dataset").unwrap();
    pipeline.run(&mut arena).unwrap();

    let output = arena.output().unwrap();
    assert_eq!(output.as_capacity().len(), input.len() + 1);
    assert_eq!(output.as_capacity()[output.len()], SENTINEL);
    assert!(!output.content().contains(&SENTINEL));
}

#[test]
fn test_lenient_recovery_drops_only_bad_records() {
    let input = b"1,-10.1,-37.1,1,t\n2,-10.2\n3,-10.3,-37.3,1,t\n".to_vec();
    for schedule in SCHEDULES {
        let config = PipelineConfig {
            recovery: RecoveryMode::Lenient,
            ..PipelineConfig::default()
        };
        let pipeline = pipeline_with(schedule, config);
        let mut arena = SharedArena::from_input(input.clone(), "t").unwrap();
        let report = pipeline.run(&mut arena).unwrap();
        assert_eq!(report.summary.skipped, 1);
        assert_eq!(
            arena.output().unwrap().content(),
            b"1,-10.1,-37.1\n1,-10.3,-37.3\n"
        );
    }
}

#[test]
fn test_header_rewrite_through_pipeline() {
    let mut input = b"id,latitude,longitude,track_id,time\n".to_vec();
    input.extend(go_track_dataset(3));
    let mut expected = b"ID,LATITUDE,LONGITUDE\n".to_vec();
    expected.extend(expected_go_track_output(3));

    for schedule in SCHEDULES {
        let config = PipelineConfig {
            header: HeaderPolicy::Rewrite,
            ..PipelineConfig::default()
        };
        let output = pipeline_with(schedule, config)
            .transform_bytes(input.clone())
            .unwrap();
        assert_eq!(output, expected);
    }
}

#[test]
fn test_empty_input_fails_without_output_file() {
    let dir = tempdir().unwrap();
    let paths = DatasetPaths::from_size_tag(dir.path(), "0").unwrap();
    fs::write(&paths.input, b"").unwrap();

    let pipeline = pipeline_with(Schedule::Phased, PipelineConfig::default());
    let err = pipeline
        .transform_file(&paths.input, &paths.output)
        .unwrap_err();
    assert!(matches!(err, TransformError::EmptyInput { .. }));
    assert!(!paths.output.exists());
}

#[test]
fn test_malformed_input_fails_without_output_file() {
    let dir = tempdir().unwrap();
    let paths = DatasetPaths::from_size_tag(dir.path(), "bad").unwrap();
    fs::write(&paths.input, b"1,-10.1,-37.1,1,t\n2,-10.2\n").unwrap();

    for schedule in SCHEDULES {
        let pipeline = pipeline_with(schedule, PipelineConfig::default());
        let err = pipeline
            .transform_file(&paths.input, &paths.output)
            .unwrap_err();
        assert!(matches!(
            err,
            TransformError::MalformedRecord {
                record: 1,
                found: 2,
                ..
            }
        ));
        assert!(!paths.output.exists());
    }
}

#[test]
fn test_transform_file_writes_projected_dataset() {
    let dir = tempdir().unwrap();
    let paths = DatasetPaths::from_size_tag(dir.path(), "1x").unwrap();
    fs::write(&paths.input, go_track_dataset(120)).unwrap();

    let pipeline = pipeline_with(Schedule::Streaming, PipelineConfig::default());
    let report = pipeline
        .transform_file(&paths.input, &paths.output)
        .unwrap();

    let written = fs::read(&paths.output).unwrap();
    assert_eq!(written, expected_go_track_output(120));
    assert_eq!(written.len(), report.output_len());
}

#[test]
fn test_writer_ignores_bytes_after_sentinel() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("out.csv");
    let mut buffer = b"1,2,3\n".to_vec();
    buffer.push(SENTINEL);
    buffer.extend_from_slice(b"garbage,that,must,not,appear\n");

    write_output(&path, &buffer).unwrap();
    assert_eq!(fs::read(&path).unwrap(), b"1,2,3\n");
}

#[test]
fn test_missing_input_is_io_error() {
    let dir = tempdir().unwrap();
    let paths = DatasetPaths::from_size_tag(dir.path(), "none").unwrap();
    let pipeline = pipeline_with(Schedule::Phased, PipelineConfig::default());
    let err = pipeline
        .transform_file(&paths.input, &paths.output)
        .unwrap_err();
    assert!(matches!(err, TransformError::Io(_)));
    assert!(!paths.output.exists());
}

#[test]
fn test_projection_matches_csv_reader() {
    // Independent oracle: parse the same input with the csv crate.
    let input = go_track_dataset(500);
    let output = pipeline_with(Schedule::Phased, PipelineConfig::default())
        .transform_bytes(input.clone())
        .unwrap();

    let mut source = csv::ReaderBuilder::new()
        .has_headers(false)
        .from_reader(input.as_slice());
    let mut projected = csv::ReaderBuilder::new()
        .has_headers(false)
        .from_reader(output.as_slice());

    let source_rows: Vec<csv::StringRecord> = source.records().map(Result::unwrap).collect();
    let projected_rows: Vec<csv::StringRecord> = projected.records().map(Result::unwrap).collect();
    assert_eq!(source_rows.len(), projected_rows.len());

    for (src, out) in source_rows.iter().zip(&projected_rows) {
        assert_eq!(out.len(), 3);
        assert_eq!(&out[0], &src[3]);
        assert_eq!(&out[1], &src[1]);
        assert_eq!(&out[2], &src[2]);
    }
}
