//! Policy for records that do not match the schema.
//!
//! The transformer consults a [`RecoveryContext`] whenever a record's field
//! count differs from the [`TrackSchema`]. Strict mode turns the mismatch
//! into an error that aborts the run; the other modes skip or salvage the
//! record and keep count.

use std::fmt;
use std::str::FromStr;

use crate::error::{Result, TransformError};
use crate::schema::TrackSchema;

/// Strategy for handling malformed records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecoveryMode {
    /// Any field-count mismatch is an error (default)
    #[default]
    Strict,
    /// Skip mismatched records
    Lenient,
    /// Project every record that has the projected columns; skip the rest
    Permissive,
}

impl FromStr for RecoveryMode {
    type Err = TransformError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "strict" => Ok(RecoveryMode::Strict),
            "lenient" => Ok(RecoveryMode::Lenient),
            "permissive" => Ok(RecoveryMode::Permissive),
            other => Err(TransformError::InvalidConfig(format!(
                "unknown recovery mode '{other}'"
            ))),
        }
    }
}

impl fmt::Display for RecoveryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RecoveryMode::Strict => "strict",
            RecoveryMode::Lenient => "lenient",
            RecoveryMode::Permissive => "permissive",
        })
    }
}

/// What to do with one record, given its field count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Write the projected fields.
    Emit,
    /// Drop the record.
    Skip,
}

/// Recovery state for one transformer run.
#[derive(Debug)]
pub struct RecoveryContext {
    /// Current recovery mode
    pub mode: RecoveryMode,
    /// Records dropped so far
    pub skipped: usize,
}

impl RecoveryContext {
    /// Create a new recovery context with the given mode
    #[must_use]
    pub fn new(mode: RecoveryMode) -> Self {
        RecoveryContext { mode, skipped: 0 }
    }

    /// Decide what happens to record `record` starting at `offset`.
    ///
    /// # Errors
    ///
    /// Returns [`TransformError::MalformedRecord`] in strict mode when
    /// `found` differs from the schema's field count.
    pub fn check(
        &mut self,
        schema: &TrackSchema,
        record: usize,
        offset: usize,
        found: usize,
    ) -> Result<Verdict> {
        let expected = schema.field_count();
        if found == expected {
            return Ok(Verdict::Emit);
        }
        if self.mode == RecoveryMode::Permissive && found >= schema.required_fields() {
            return Ok(Verdict::Emit);
        }

        let error = TransformError::MalformedRecord {
            record,
            offset,
            expected,
            found,
        };
        self.recover(error)?;
        Ok(Verdict::Skip)
    }

    /// Try to recover from an error based on the recovery mode
    ///
    /// # Errors
    ///
    /// Returns the error in strict mode, otherwise logs it and counts a skip.
    pub fn recover(&mut self, error: TransformError) -> Result<()> {
        match self.mode {
            RecoveryMode::Strict => Err(error),
            RecoveryMode::Lenient | RecoveryMode::Permissive => {
                tracing::warn!(mode = %self.mode, "skipping record: {error}");
                self.skipped += 1;
                Ok(())
            },
        }
    }
}
