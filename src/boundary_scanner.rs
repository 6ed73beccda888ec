//! Record and field boundary detection.
//!
//! This module locates record terminators (`\n`) and field separators (`,`)
//! in the raw buffer using the SIMD-accelerated `memchr` crate. The two
//! scanners share one implementation, [`BoundaryScanner`], parameterized by
//! the byte they look for. Each produces a [`BoundarySet`]: every matching
//! offset in `[0, N)`, strictly increasing, with no early exit.
//!
//! Large buffers are split into chunks and scanned with Rayon; the per-chunk
//! results are concatenated in chunk order, so the set is identical to a
//! sequential scan. [`BoundaryScanner::scan_chunks`] exposes the same chunked
//! walk to the streaming schedule.
//!
//! # Example
//!
//! ```
//! use gotrack::boundary_scanner::BoundaryScanner;
//!
//! let buffer = b"1,0,-19.0\n2,0,-19.1\n";
//! let newlines = BoundaryScanner::newline().scan(buffer);
//! let delimiters = BoundaryScanner::delimiter().scan(buffer);
//!
//! assert_eq!(newlines.offsets(), &[9, 19]);
//! assert_eq!(delimiters.offsets(), &[1, 3, 11, 13]);
//! ```

use std::ops::Range;

use rayon::prelude::*;

/// The byte that terminates a record.
pub const RECORD_TERMINATOR: u8 = b'\n';

/// The byte that separates two fields within a record.
pub const FIELD_SEPARATOR: u8 = b',';

/// Ordered, immutable set of boundary offsets produced by one scanner.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BoundarySet {
    offsets: Vec<usize>,
}

impl BoundarySet {
    /// Wrap offsets that are already strictly increasing.
    ///
    /// Callers outside this module use it for tests and for sets assembled
    /// from a stream of chunks.
    #[must_use]
    pub fn from_sorted(offsets: Vec<usize>) -> Self {
        debug_assert!(offsets.windows(2).all(|w| w[0] < w[1]));
        Self { offsets }
    }

    /// All offsets, in increasing order.
    #[must_use]
    pub fn offsets(&self) -> &[usize] {
        &self.offsets
    }

    /// Number of boundaries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    /// Whether the set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    /// Whether `offset` is a boundary.
    #[must_use]
    pub fn contains(&self, offset: usize) -> bool {
        self.offsets.binary_search(&offset).is_ok()
    }

    /// Boundaries falling inside `span`.
    #[must_use]
    pub fn within(&self, span: Range<usize>) -> &[usize] {
        let lo = self.offsets.partition_point(|&o| o < span.start);
        let hi = self.offsets.partition_point(|&o| o < span.end);
        &self.offsets[lo..hi]
    }

    /// Consume the set and return the offsets.
    #[must_use]
    pub fn into_offsets(self) -> Vec<usize> {
        self.offsets
    }
}

/// Boundaries found in one chunk of the buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanChunk {
    /// Absolute offsets of matches inside the chunk.
    pub offsets: Vec<usize>,
    /// Every byte before this offset has been scanned.
    pub scanned_to: usize,
}

/// Byte scanner for one kind of boundary.
#[derive(Debug, Clone, Copy)]
pub struct BoundaryScanner {
    needle: u8,
    chunk_size: usize,
    parallel_threshold: usize,
}

impl BoundaryScanner {
    /// Default chunk size for parallel and streamed scans (64 KiB).
    pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

    /// Buffers at least this large are scanned in parallel by default (1 MiB).
    pub const DEFAULT_PARALLEL_THRESHOLD: usize = 1024 * 1024;

    /// Create a scanner for an arbitrary boundary byte.
    #[must_use]
    pub fn new(needle: u8) -> Self {
        Self {
            needle,
            chunk_size: Self::DEFAULT_CHUNK_SIZE,
            parallel_threshold: Self::DEFAULT_PARALLEL_THRESHOLD,
        }
    }

    /// The newline finder.
    #[must_use]
    pub fn newline() -> Self {
        Self::new(RECORD_TERMINATOR)
    }

    /// The delimiter finder.
    #[must_use]
    pub fn delimiter() -> Self {
        Self::new(FIELD_SEPARATOR)
    }

    /// Set the chunk size used by parallel and streamed scans.
    ///
    /// A zero size is clamped to one byte.
    #[must_use]
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Set the buffer size from which [`scan`](Self::scan) goes parallel.
    #[must_use]
    pub fn with_parallel_threshold(mut self, threshold: usize) -> Self {
        self.parallel_threshold = threshold;
        self
    }

    /// The byte this scanner looks for.
    #[must_use]
    pub fn needle(&self) -> u8 {
        self.needle
    }

    /// Find every boundary in `buffer`.
    ///
    /// Chooses the parallel scan when the buffer reaches the parallel
    /// threshold and spans more than one chunk.
    #[must_use]
    pub fn scan(&self, buffer: &[u8]) -> BoundarySet {
        let set = if buffer.len() >= self.parallel_threshold && buffer.len() > self.chunk_size {
            self.scan_parallel(buffer)
        } else {
            self.scan_sequential(buffer)
        };
        tracing::debug!(
            needle = self.needle,
            bytes = buffer.len(),
            boundaries = set.len(),
            "boundary scan complete"
        );
        set
    }

    /// Single-threaded scan of the whole buffer.
    #[must_use]
    pub fn scan_sequential(&self, buffer: &[u8]) -> BoundarySet {
        BoundarySet {
            offsets: memchr::memchr_iter(self.needle, buffer).collect(),
        }
    }

    /// Chunked scan on the current Rayon pool.
    #[must_use]
    pub fn scan_parallel(&self, buffer: &[u8]) -> BoundarySet {
        let chunk_size = self.chunk_size;
        let needle = self.needle;
        let per_chunk: Vec<Vec<usize>> = buffer
            .par_chunks(chunk_size)
            .enumerate()
            .map(|(i, chunk)| {
                let base = i * chunk_size;
                memchr::memchr_iter(needle, chunk).map(|p| base + p).collect()
            })
            .collect();

        let total = per_chunk.iter().map(Vec::len).sum();
        let mut offsets = Vec::with_capacity(total);
        for chunk in per_chunk {
            offsets.extend(chunk);
        }
        BoundarySet { offsets }
    }

    /// Walk the buffer chunk by chunk, in order.
    ///
    /// The last chunk always reports `scanned_to == buffer.len()`.
    pub fn scan_chunks<'a>(&self, buffer: &'a [u8]) -> impl Iterator<Item = ScanChunk> + 'a {
        let needle = self.needle;
        let chunk_size = self.chunk_size;
        buffer
            .chunks(chunk_size)
            .enumerate()
            .map(move |(i, chunk)| {
                let base = i * chunk_size;
                ScanChunk {
                    offsets: memchr::memchr_iter(needle, chunk).map(|p| base + p).collect(),
                    scanned_to: base + chunk.len(),
                }
            })
    }

    /// Count boundaries without collecting them.
    #[must_use]
    pub fn count(&self, buffer: &[u8]) -> usize {
        memchr::memchr_iter(self.needle, buffer).count()
    }
}
