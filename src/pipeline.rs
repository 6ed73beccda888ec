//! Pipeline coordinator.
//!
//! A [`Pipeline`] owns the [`ExecutionContext`] and a validated
//! [`PipelineConfig`]. [`Pipeline::run`] splits a [`SharedArena`] into its
//! read and write views, assigns the newline finder, the delimiter finder and
//! the record transformer to their lanes, and joins every lane before the
//! output becomes readable.
//!
//! Two schedules are available:
//!
//! - **Phased** (default): both scanners run concurrently on the context's
//!   pool and are joined; the transformer then runs alone over the completed
//!   boundary sets.
//! - **Streaming**: all three lanes run at once on dedicated threads. The
//!   scanners stream chunks of boundaries over bounded channels and the
//!   transformer consumes each record as soon as both streams have passed it.
//!
//! Both schedules produce byte-identical output.
//!
//! # Example
//!
//! ```
//! use gotrack::pipeline::{Pipeline, PipelineConfig};
//! use gotrack::schema::TrackSchema;
//!
//! let config = PipelineConfig {
//!     schema: TrackSchema::new(4, 0, 2, 3)?,
//!     ..PipelineConfig::default()
//! };
//! let pipeline = Pipeline::new(config)?;
//! let output = pipeline.transform_bytes(b"1,0,-19.0,-42.0\n2,0,-19.1,-42.1\n".to_vec())?;
//! assert_eq!(output, b"1,-19.0,-42.0\n2,-19.1,-42.1\n");
//! # Ok::<(), gotrack::TransformError>(())
//! ```

use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::thread::{self, Scope, ScopedJoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::bounded;

use crate::arena::{OutputView, RawView, SharedArena};
use crate::boundary_scanner::BoundaryScanner;
use crate::error::{Result, TransformError};
use crate::io::{load_input, write_output};
use crate::lanes::{run_lane, ExecutionContext, Lane};
use crate::recovery::RecoveryMode;
use crate::schema::{HeaderPolicy, TrackSchema};
use crate::streaming::{produce_boundaries, StreamedBoundaries};
use crate::transformer::{RecordTransformer, TransformSummary};

/// How the three lanes are ordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Schedule {
    /// Scan phase joined before the transform phase starts (default).
    #[default]
    Phased,
    /// Scanners and transformer overlap, linked by bounded channels.
    Streaming,
}

impl FromStr for Schedule {
    type Err = TransformError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "phased" => Ok(Schedule::Phased),
            "streaming" => Ok(Schedule::Streaming),
            other => Err(TransformError::InvalidConfig(format!(
                "unknown schedule '{other}'"
            ))),
        }
    }
}

impl fmt::Display for Schedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Schedule::Phased => "phased",
            Schedule::Streaming => "streaming",
        })
    }
}

/// Configuration for the pipeline
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Source record layout
    pub schema: TrackSchema,
    /// Treatment of the first record
    pub header: HeaderPolicy,
    /// Treatment of records that do not match the schema
    pub recovery: RecoveryMode,
    /// Lane ordering
    pub schedule: Schedule,
    /// Scan chunk size in bytes, for parallel and streamed scans
    pub chunk_size: usize,
    /// Inputs at least this large are scanned in parallel (phased schedule)
    pub parallel_scan_threshold: usize,
    /// Channel capacity in chunks (streaming schedule)
    pub channel_capacity: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            schema: TrackSchema::GO_TRACK,
            header: HeaderPolicy::Absent,
            recovery: RecoveryMode::Strict,
            schedule: Schedule::Phased,
            chunk_size: BoundaryScanner::DEFAULT_CHUNK_SIZE, // 64 KB
            parallel_scan_threshold: BoundaryScanner::DEFAULT_PARALLEL_THRESHOLD, // 1 MB
            channel_capacity: 64, // 64 chunks in flight per scanner
        }
    }
}

impl PipelineConfig {
    /// Check the configuration before any resource is acquired.
    ///
    /// # Errors
    ///
    /// Returns [`TransformError::InvalidConfig`] for a zero chunk size or
    /// channel capacity, or [`TransformError::InvalidSchema`] for a bad schema.
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(TransformError::InvalidConfig(
                "chunk_size must be greater than zero".to_string(),
            ));
        }
        if self.channel_capacity == 0 {
            return Err(TransformError::InvalidConfig(
                "channel_capacity must be greater than zero".to_string(),
            ));
        }
        self.schema.validate()
    }

    fn scanner(&self, scanner: BoundaryScanner) -> BoundaryScanner {
        scanner
            .with_chunk_size(self.chunk_size)
            .with_parallel_threshold(self.parallel_scan_threshold)
    }

    fn transformer(&self) -> RecordTransformer {
        RecordTransformer::new(self.schema)
            .with_header(self.header)
            .with_recovery(self.recovery)
    }
}

/// Wall-clock time spent in each phase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PhaseTimings {
    /// Longest scanner lane.
    pub scan: Duration,
    /// Transformer lane.
    pub transform: Duration,
    /// Whole run, lane setup and joins included.
    pub total: Duration,
}

/// Outcome of one pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineReport {
    /// Schedule the run used.
    pub schedule: Schedule,
    /// Raw input length `N`.
    pub input_len: usize,
    /// Record terminators found.
    pub newlines: usize,
    /// Field separators found.
    pub delimiters: usize,
    /// Transformer counters.
    pub summary: TransformSummary,
    /// Phase durations.
    pub timings: PhaseTimings,
}

impl PipelineReport {
    /// Logical length of the output content.
    #[must_use]
    pub fn output_len(&self) -> usize {
        self.summary.output_len
    }
}

struct LaneOutcome<T> {
    value: T,
    elapsed: Duration,
}

fn timed<T>(stage: impl FnOnce() -> Result<T>) -> Result<LaneOutcome<T>> {
    let start = Instant::now();
    let value = stage()?;
    Ok(LaneOutcome {
        value,
        elapsed: start.elapsed(),
    })
}

/// Pipeline coordinator: owns the execution context and runs the lanes.
#[derive(Debug)]
pub struct Pipeline {
    config: PipelineConfig,
    context: ExecutionContext,
}

impl Pipeline {
    /// Validate `config` and acquire the execution context.
    ///
    /// # Errors
    ///
    /// Returns a configuration error, or [`TransformError::LaneSetup`] if the
    /// lane pool cannot be created.
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        let context = ExecutionContext::new()?;
        Ok(Self { config, context })
    }

    /// The configuration in use.
    #[must_use]
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run every lane over `arena` and seal its output.
    ///
    /// On success the sealed output is available through
    /// [`SharedArena::output`]. On failure every lane has been joined and
    /// the output is left unsealed.
    ///
    /// # Errors
    ///
    /// Returns the first root-cause error from any lane.
    pub fn run(&self, arena: &mut SharedArena) -> Result<PipelineReport> {
        let started = Instant::now();
        let schedule = self.config.schedule;
        let input_len = arena.input_len();
        let (raw, out) = arena.split();

        let (newlines, delimiters, summary, mut timings) = match schedule {
            Schedule::Phased => self.run_phased(raw, out)?,
            Schedule::Streaming => self.run_streaming(raw, out)?,
        };
        timings.total = started.elapsed();

        tracing::info!(
            %schedule,
            input_len,
            records = summary.records,
            emitted = summary.emitted,
            skipped = summary.skipped,
            output_len = summary.output_len,
            "pipeline complete"
        );
        Ok(PipelineReport {
            schedule,
            input_len,
            newlines,
            delimiters,
            summary,
            timings,
        })
    }

    fn run_phased(
        &self,
        raw: RawView<'_>,
        out: OutputView<'_>,
    ) -> Result<(usize, usize, TransformSummary, PhaseTimings)> {
        let newline_scanner = self.config.scanner(BoundaryScanner::newline());
        let delimiter_scanner = self.config.scanner(BoundaryScanner::delimiter());
        let bytes = raw.as_bytes();

        // Phase 1: both scanners, joined.
        let (newlines, delimiters) = self.context.install(|| {
            rayon::join(
                || {
                    run_lane(Lane::NewlineFinder, || {
                        timed(|| Ok(newline_scanner.scan(bytes)))
                    })
                },
                || {
                    run_lane(Lane::DelimiterFinder, || {
                        timed(|| Ok(delimiter_scanner.scan(bytes)))
                    })
                },
            )
        });
        let newlines = newlines?;
        let delimiters = delimiters?;

        // Phase 2: the transformer over the completed sets.
        let transformer = self.config.transformer();
        let transformed = self.context.install(|| {
            run_lane(Lane::Transformer, || {
                timed(|| transformer.transform(raw, &newlines.value, &delimiters.value, out))
            })
        })?;

        let timings = PhaseTimings {
            scan: newlines.elapsed.max(delimiters.elapsed),
            transform: transformed.elapsed,
            total: Duration::ZERO,
        };
        Ok((
            newlines.value.len(),
            delimiters.value.len(),
            transformed.value,
            timings,
        ))
    }

    fn run_streaming(
        &self,
        raw: RawView<'_>,
        out: OutputView<'_>,
    ) -> Result<(usize, usize, TransformSummary, PhaseTimings)> {
        let newline_scanner = self.config.scanner(BoundaryScanner::newline());
        let delimiter_scanner = self.config.scanner(BoundaryScanner::delimiter());
        let transformer = self.config.transformer();
        let capacity = self.config.channel_capacity;

        thread::scope(|scope| {
            let (newline_tx, newline_rx) = bounded(capacity);
            let (delimiter_tx, delimiter_rx) = bounded(capacity);

            let newline = spawn_lane(scope, Lane::NewlineFinder, move || {
                timed(|| produce_boundaries(Lane::NewlineFinder, newline_scanner, raw, &newline_tx))
            })?;
            let delimiter = spawn_lane(scope, Lane::DelimiterFinder, move || {
                timed(|| {
                    produce_boundaries(Lane::DelimiterFinder, delimiter_scanner, raw, &delimiter_tx)
                })
            })?;
            let transform = spawn_lane(scope, Lane::Transformer, move || {
                timed(|| {
                    let mut source = StreamedBoundaries::new(newline_rx, delimiter_rx, raw.len());
                    transformer.run(raw, &mut source, out)
                })
            })?;

            // Barrier: every lane is joined before any result is inspected.
            let transformed = join_lane(Lane::Transformer, transform);
            let newlines = join_lane(Lane::NewlineFinder, newline);
            let delimiters = join_lane(Lane::DelimiterFinder, delimiter);

            let (newlines, delimiters, transformed) =
                first_root_cause(newlines, delimiters, transformed)?;
            let timings = PhaseTimings {
                scan: newlines.elapsed.max(delimiters.elapsed),
                transform: transformed.elapsed,
                total: Duration::ZERO,
            };
            Ok((newlines.value, delimiters.value, transformed.value, timings))
        })
    }

    /// Run the pipeline over an in-memory input and return the output content.
    ///
    /// # Errors
    ///
    /// See [`SharedArena::from_input`] and [`Pipeline::run`].
    pub fn transform_bytes(&self, input: Vec<u8>) -> Result<Vec<u8>> {
        let mut arena = SharedArena::from_input(input, "<memory>")?;
        self.run(&mut arena)?;
        Ok(arena.output()?.content().to_vec())
    }

    /// Load `input`, run the pipeline, and write the output to `output`.
    ///
    /// Nothing is written unless every lane succeeded.
    ///
    /// # Errors
    ///
    /// Returns any load, pipeline or write error.
    pub fn transform_file(&self, input: &Path, output: &Path) -> Result<PipelineReport> {
        let bytes = load_input(input)?;
        let mut arena = SharedArena::from_input(bytes, &input.display().to_string())?;
        let report = self.run(&mut arena)?;
        write_output(output, arena.output()?.as_capacity())?;
        Ok(report)
    }
}

fn spawn_lane<'scope, 'env, T, F>(
    scope: &'scope Scope<'scope, 'env>,
    lane: Lane,
    stage: F,
) -> Result<ScopedJoinHandle<'scope, Result<T>>>
where
    F: FnOnce() -> Result<T> + Send + 'scope,
    T: Send + 'scope,
{
    thread::Builder::new()
        .name(lane.name().to_string())
        .spawn_scoped(scope, move || run_lane(lane, stage))
        .map_err(|e| TransformError::LaneSetup(format!("could not spawn {lane} lane: {e}")))
}

fn join_lane<T>(lane: Lane, handle: ScopedJoinHandle<'_, Result<T>>) -> Result<T> {
    handle.join().unwrap_or_else(|_| {
        Err(TransformError::LaneFailed {
            lane,
            message: "lane thread panicked outside its stage".to_string(),
        })
    })
}

/// Pick the error that caused a streaming run to fail.
///
/// A panicked lane wins over the disconnects it caused downstream; after
/// that the transformer's error wins over the producers' aborts.
fn first_root_cause<N, D, T>(
    newlines: Result<N>,
    delimiters: Result<D>,
    transformed: Result<T>,
) -> Result<(N, D, T)> {
    if let Err(err @ TransformError::LaneFailed { .. }) = newlines {
        return Err(err);
    }
    if let Err(err @ TransformError::LaneFailed { .. }) = delimiters {
        return Err(err);
    }
    let transformed = transformed?;
    Ok((newlines?, delimiters?, transformed))
}
