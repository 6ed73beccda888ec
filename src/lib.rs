#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

//! # gotrack: GoTrack trackpoint reprojection
//!
//! Converts GoTrack GPS trackpoint CSV into the three-field
//! `ID,LATITUDE,LONGITUDE` layout with a three-lane pipeline over a single
//! in-memory buffer: a newline finder and a delimiter finder discover record
//! and field boundaries, and a record transformer rewrites each record into
//! a sentinel-terminated output region.
//!
//! ## Quick Start
//!
//! ```no_run
//! use gotrack::{Pipeline, PipelineConfig};
//! use std::path::Path;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let pipeline = Pipeline::new(PipelineConfig::default())?;
//! let report = pipeline.transform_file(
//!     Path::new("data/series/trackspoints_size_1x.csv"),
//!     Path::new("data/series/trackspoints_transformed_size_1x.csv"),
//! )?;
//! println!("{} records written", report.summary.emitted);
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`arena`]: Shared input/output regions and their read/write views
//! - [`boundary_scanner`]: Newline and delimiter finders
//! - [`transformer`]: Record rewriting into the output region
//! - [`pipeline`]: Lane coordination, schedules and configuration
//! - [`streaming`]: Channel-fed boundaries for the overlapped schedule
//! - [`lanes`]: Execution context and lane failure handling
//! - [`schema`]: Source column layout and header policy
//! - [`recovery`]: Handling of records that do not match the schema
//! - [`io`]: Input loading, output writing, dataset paths
//! - [`error`]: Error types and result type

pub mod arena;
pub mod boundary_scanner;
pub mod error;
pub mod io;
pub mod lanes;
pub mod pipeline;
pub mod recovery;
pub mod schema;
pub mod streaming;
pub mod transformer;

pub use arena::{OutputBuffer, SharedArena, SENTINEL};
pub use boundary_scanner::{BoundaryScanner, BoundarySet};
pub use error::{Result, TransformError};
pub use io::{load_input, write_output, DatasetPaths};
pub use lanes::{ExecutionContext, Lane};
pub use pipeline::{PhaseTimings, Pipeline, PipelineConfig, PipelineReport, Schedule};
pub use recovery::RecoveryMode;
pub use schema::{HeaderPolicy, TrackSchema};
pub use transformer::{RecordTransformer, TransformSummary};
