//! Source record layout and the columns projected into the output.

use std::fmt;
use std::str::FromStr;

use crate::error::{Result, TransformError};

/// Header line written by [`HeaderPolicy::Rewrite`].
pub const OUTPUT_HEADER: &[u8] = b"ID,LATITUDE,LONGITUDE\n";

/// Column layout of the source CSV.
///
/// A schema fixes how many fields each record carries and which of them
/// become the `ID`, `LATITUDE` and `LONGITUDE` output columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackSchema {
    field_count: usize,
    id_column: usize,
    lat_column: usize,
    lon_column: usize,
}

impl TrackSchema {
    /// GoTrack trackspoints: `id,latitude,longitude,track_id,time`.
    ///
    /// The output ID is the trajectory ID (`track_id`, column 3), not the
    /// per-point `id` in column 0, so every output line names its track.
    /// Use [`TrackSchema::new`] with `id_column` 0 to keep the point ID.
    pub const GO_TRACK: TrackSchema = TrackSchema {
        field_count: 5,
        id_column: 3,
        lat_column: 1,
        lon_column: 2,
    };

    /// Build a schema from zero-based column indexes.
    ///
    /// # Errors
    ///
    /// Returns [`TransformError::InvalidSchema`] if a column is outside
    /// `0..field_count` or two output columns share a source column.
    pub fn new(
        field_count: usize,
        id_column: usize,
        lat_column: usize,
        lon_column: usize,
    ) -> Result<Self> {
        let schema = Self {
            field_count,
            id_column,
            lat_column,
            lon_column,
        };
        schema.validate()?;
        Ok(schema)
    }

    /// Check column indexes against the field count.
    ///
    /// # Errors
    ///
    /// See [`TrackSchema::new`].
    pub fn validate(&self) -> Result<()> {
        for (name, column) in [
            ("id", self.id_column),
            ("latitude", self.lat_column),
            ("longitude", self.lon_column),
        ] {
            if column >= self.field_count {
                return Err(TransformError::InvalidSchema(format!(
                    "{name} column {column} is outside a {}-field record",
                    self.field_count
                )));
            }
        }
        if self.id_column == self.lat_column
            || self.id_column == self.lon_column
            || self.lat_column == self.lon_column
        {
            return Err(TransformError::InvalidSchema(
                "id, latitude and longitude must be distinct columns".to_string(),
            ));
        }
        Ok(())
    }

    /// Fields per source record.
    #[must_use]
    pub fn field_count(&self) -> usize {
        self.field_count
    }

    /// Source column of the output ID.
    #[must_use]
    pub fn id_column(&self) -> usize {
        self.id_column
    }

    /// Source column of the latitude.
    #[must_use]
    pub fn lat_column(&self) -> usize {
        self.lat_column
    }

    /// Source column of the longitude.
    #[must_use]
    pub fn lon_column(&self) -> usize {
        self.lon_column
    }

    /// Minimum number of fields a record needs for the projection to exist.
    #[must_use]
    pub fn required_fields(&self) -> usize {
        self.id_column.max(self.lat_column).max(self.lon_column) + 1
    }

    /// Output columns in emission order.
    #[must_use]
    pub fn projection(&self) -> [usize; 3] {
        [self.id_column, self.lat_column, self.lon_column]
    }
}

impl Default for TrackSchema {
    fn default() -> Self {
        Self::GO_TRACK
    }
}

/// What to do with the first record of the input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HeaderPolicy {
    /// Every record is data (default).
    #[default]
    Absent,
    /// The first record is a header and is dropped.
    Skip,
    /// The first record is a header and is replaced by [`OUTPUT_HEADER`].
    ///
    /// The output region is sized to the input, so this can only succeed
    /// when the rest of the output is short enough to absorb a header line
    /// longer than the one it replaces. Otherwise the run fails with
    /// [`TransformError::OutputOverflow`].
    Rewrite,
}

impl FromStr for HeaderPolicy {
    type Err = TransformError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "absent" | "none" => Ok(HeaderPolicy::Absent),
            "skip" => Ok(HeaderPolicy::Skip),
            "rewrite" => Ok(HeaderPolicy::Rewrite),
            other => Err(TransformError::InvalidConfig(format!(
                "unknown header policy '{other}'"
            ))),
        }
    }
}

impl fmt::Display for HeaderPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            HeaderPolicy::Absent => "absent",
            HeaderPolicy::Skip => "skip",
            HeaderPolicy::Rewrite => "rewrite",
        })
    }
}
