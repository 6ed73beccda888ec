//! File collaborators around the pipeline: input loading, sentinel-terminated
//! output writing, and dataset path templates.

use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::arena::SENTINEL;
use crate::error::{Result, TransformError};

/// Default directory holding the size-tagged datasets.
pub const DEFAULT_DATA_DIR: &str = "data/series";

/// Input and output paths derived from a dataset size tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetPaths {
    /// Source CSV, `<dir>/trackspoints_size_<tag>.csv`.
    pub input: PathBuf,
    /// Destination CSV, `<dir>/trackspoints_transformed_size_<tag>.csv`.
    pub output: PathBuf,
}

impl DatasetPaths {
    /// Build both paths for `tag` under `data_dir`.
    ///
    /// # Errors
    ///
    /// Returns [`TransformError::Usage`] if the tag is empty or contains a
    /// path separator.
    pub fn from_size_tag(data_dir: &Path, tag: &str) -> Result<Self> {
        if tag.is_empty() || tag.contains(['/', '\\']) {
            return Err(TransformError::Usage(format!(
                "invalid dataset size tag '{tag}'"
            )));
        }
        Ok(Self {
            input: data_dir.join(format!("trackspoints_size_{tag}.csv")),
            output: data_dir.join(format!("trackspoints_transformed_size_{tag}.csv")),
        })
    }
}

/// Read a whole file, leaving room for the arena's reserved byte.
///
/// # Errors
///
/// - [`TransformError::Io`] if the file cannot be opened or read.
/// - [`TransformError::EmptyInput`] if it holds no bytes.
/// - [`TransformError::Allocation`] if the buffer cannot be reserved.
pub fn load_input(path: &Path) -> Result<Vec<u8>> {
    let mut file = File::open(path)?;
    let hint = usize::try_from(file.metadata()?.len()).unwrap_or(usize::MAX);

    let mut buffer = Vec::new();
    let capacity = hint.saturating_add(1);
    buffer
        .try_reserve_exact(capacity)
        .map_err(|_| TransformError::Allocation { bytes: capacity })?;
    file.read_to_end(&mut buffer)?;

    if buffer.is_empty() {
        return Err(TransformError::EmptyInput {
            source_name: path.display().to_string(),
        });
    }
    tracing::debug!(path = %path.display(), bytes = buffer.len(), "input loaded");
    Ok(buffer)
}

/// Write `buffer` up to (not including) its first sentinel byte.
///
/// A buffer without a sentinel is written in full. The bytes go to a
/// temporary file next to `path` that is renamed into place, so a failed
/// write leaves no partial file behind. Returns the number of bytes written.
///
/// # Errors
///
/// Returns [`TransformError::Io`] or [`TransformError::Persist`] on failure.
pub fn write_output(path: &Path, buffer: &[u8]) -> Result<usize> {
    let end = memchr::memchr(SENTINEL, buffer).unwrap_or(buffer.len());
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;

    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(&buffer[..end])?;
    tmp.flush()?;
    tmp.persist(path).map_err(|e| TransformError::Persist {
        path: path.to_path_buf(),
        source: e.error,
    })?;
    tracing::debug!(path = %path.display(), bytes = end, "output written");
    Ok(end)
}
