//! Error types for trackpoint transformation.
//!
//! This module provides the [`TransformError`] type for every pipeline stage
//! and collaborator, plus the [`Result`] convenience type.

use std::path::PathBuf;

use thiserror::Error;

use crate::lanes::Lane;

/// Error type for all pipeline operations.
///
/// Variants fall into four groups: configuration problems detected before
/// any buffer is allocated, resource acquisition failures, failures of a lane
/// while the pipeline runs, and data errors in the input records.
#[derive(Error, Debug)]
pub enum TransformError {
    /// Command line usage error (wrong argument count, unknown option).
    #[error("Usage error: {0}")]
    Usage(String),

    /// The input source holds no bytes.
    #[error("Empty input: {source_name} contains no data")]
    EmptyInput {
        /// Path or label of the empty source.
        source_name: String,
    },

    /// The record schema is inconsistent (duplicate or out-of-range columns).
    #[error("Invalid schema: {0}")]
    InvalidSchema(String),

    /// A pipeline configuration value is out of range.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A shared buffer could not be allocated.
    #[error("Allocation failed: could not reserve {bytes} bytes")]
    Allocation {
        /// Requested capacity in bytes.
        bytes: usize,
    },

    /// The execution context or a lane thread could not be created.
    #[error("Lane setup failed: {0}")]
    LaneSetup(String),

    /// A lane panicked while running its stage.
    #[error("Lane {lane} failed: {message}")]
    LaneFailed {
        /// The lane that failed.
        lane: Lane,
        /// Panic payload, when it was a string.
        message: String,
    },

    /// A streaming producer stopped before covering the whole buffer.
    #[error("Boundary stream from {lane} closed at offset {scanned_to} of {expected}")]
    BoundaryStreamClosed {
        /// The producing lane.
        lane: Lane,
        /// How far the producer had scanned.
        scanned_to: usize,
        /// The raw buffer length it had to reach.
        expected: usize,
    },

    /// A downstream lane went away while a producer was still sending.
    #[error("Lane {0} aborted: consumer disconnected")]
    LaneAborted(Lane),

    /// Writing would exceed the output buffer capacity.
    #[error("Output overflow: {needed} bytes needed, capacity is {capacity}")]
    OutputOverflow {
        /// Bytes required including the sentinel.
        needed: usize,
        /// Allocated output capacity.
        capacity: usize,
    },

    /// The output buffer was read before the transformer sealed it.
    #[error("Output buffer has not been sealed by the transformer")]
    OutputNotSealed,

    /// A record does not match the schema's field layout.
    #[error("Malformed record {record} at offset {offset}: expected {expected} fields, found {found}")]
    MalformedRecord {
        /// Zero-based record index.
        record: usize,
        /// Byte offset where the record starts.
        offset: usize,
        /// Fields required by the schema.
        expected: usize,
        /// Fields present in the record.
        found: usize,
    },

    /// The input contains the end-of-content sentinel byte.
    #[error("Input contains sentinel byte 0x1A at offset {offset}")]
    SentinelInInput {
        /// Offset of the first sentinel byte.
        offset: usize,
    },

    /// Failed to persist the output file at its final path.
    #[error("Could not persist output to {path}: {source}")]
    Persist {
        /// Destination path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// IO error from the underlying source/destination.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience type alias for [`std::result::Result`] with [`TransformError`].
pub type Result<T> = std::result::Result<T, TransformError>;
