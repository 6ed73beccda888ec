//! Shared input/output regions for the pipeline lanes.
//!
//! A [`SharedArena`] owns two allocations of identical capacity `N + 1`: the
//! raw input (the trailing byte is reserved) and the output region. The
//! arena is never handed to a lane directly. Instead [`SharedArena::split`]
//! produces two capability views:
//!
//! - [`RawView`]: a `Copy` read-only handle that any number of lanes may hold.
//! - [`OutputView`]: an exclusive write handle with a running cursor, given
//!   only to the record transformer.
//!
//! The borrow checker guarantees the arena cannot be read back through
//! [`SharedArena::output`] while either view is alive, which is the barrier
//! between the lanes and the write-out step.
//!
//! # Examples
//!
//! ```
//! use gotrack::arena::{SharedArena, SENTINEL};
//!
//! let mut arena = SharedArena::from_input(b"1,2,3\n".to_vec(), "memory")?;
//! {
//!     let (raw, mut out) = arena.split();
//!     assert_eq!(raw.len(), 6);
//!     out.put(b"1,3\n")?;
//!     out.seal()?;
//! }
//! let output = arena.output()?;
//! assert_eq!(output.content(), b"1,3\n");
//! assert_eq!(output.as_capacity()[4], SENTINEL);
//! # Ok::<(), gotrack::TransformError>(())
//! ```

use crate::error::{Result, TransformError};

/// Byte marking the logical end of the output content.
pub const SENTINEL: u8 = 0x1A;

/// Owner of the raw input and output regions for one pipeline run.
#[derive(Debug)]
pub struct SharedArena {
    raw: Vec<u8>,
    output: Vec<u8>,
    len: usize,
    sealed_at: Option<usize>,
}

impl SharedArena {
    /// Build an arena from loaded input bytes.
    ///
    /// The input vector is extended in place with the reserved byte, and an
    /// output region of the same capacity is allocated before any boundary
    /// is known.
    ///
    /// # Errors
    ///
    /// - [`TransformError::EmptyInput`] when `input` is empty.
    /// - [`TransformError::SentinelInInput`] when `input` already contains
    ///   the sentinel byte, since the output would be cut short there.
    /// - [`TransformError::Allocation`] when either region cannot be reserved.
    pub fn from_input(mut input: Vec<u8>, source_name: &str) -> Result<Self> {
        if input.is_empty() {
            return Err(TransformError::EmptyInput {
                source_name: source_name.to_string(),
            });
        }
        if let Some(offset) = memchr::memchr(SENTINEL, &input) {
            return Err(TransformError::SentinelInInput { offset });
        }

        let len = input.len();
        let capacity = len
            .checked_add(1)
            .ok_or(TransformError::Allocation { bytes: usize::MAX })?;

        input
            .try_reserve_exact(1)
            .map_err(|_| TransformError::Allocation { bytes: capacity })?;
        input.push(0);

        let mut output = Vec::new();
        output
            .try_reserve_exact(capacity)
            .map_err(|_| TransformError::Allocation { bytes: capacity })?;
        output.resize(capacity, 0);

        Ok(Self {
            raw: input,
            output,
            len,
            sealed_at: None,
        })
    }

    /// Length `N` of the raw input, excluding the reserved byte.
    #[must_use]
    pub fn input_len(&self) -> usize {
        self.len
    }

    /// Capacity `N + 1` shared by both regions.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.output.len()
    }

    /// Split the arena into its read view and its exclusive write view.
    ///
    /// Any previously sealed output is invalidated.
    pub fn split(&mut self) -> (RawView<'_>, OutputView<'_>) {
        self.sealed_at = None;
        let raw = RawView {
            bytes: &self.raw[..self.len],
        };
        let out = OutputView {
            buf: self.output.as_mut_slice(),
            cursor: 0,
            sealed_at: &mut self.sealed_at,
        };
        (raw, out)
    }

    /// Finalized output, readable once the transformer has sealed it.
    ///
    /// # Errors
    ///
    /// Returns [`TransformError::OutputNotSealed`] if no [`OutputView::seal`]
    /// happened since the last [`split`](Self::split).
    pub fn output(&self) -> Result<OutputBuffer<'_>> {
        let sealed_at = self.sealed_at.ok_or(TransformError::OutputNotSealed)?;
        Ok(OutputBuffer {
            buf: &self.output,
            sealed_at,
        })
    }
}

/// Read-only view of the raw input shared by every lane.
#[derive(Debug, Clone, Copy)]
pub struct RawView<'a> {
    bytes: &'a [u8],
}

impl<'a> RawView<'a> {
    /// The `N` input bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &'a [u8] {
        self.bytes
    }

    /// Number of input bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether the view is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Exclusive, append-only write view of the output region.
#[derive(Debug)]
pub struct OutputView<'a> {
    buf: &'a mut [u8],
    cursor: usize,
    sealed_at: &'a mut Option<usize>,
}

impl OutputView<'_> {
    /// Append bytes at the cursor.
    ///
    /// One byte is always held back for the sentinel, so a successful `put`
    /// never prevents a later [`seal`](Self::seal).
    ///
    /// # Errors
    ///
    /// Returns [`TransformError::OutputOverflow`] if the bytes plus the
    /// sentinel do not fit. Nothing is written in that case.
    pub fn put(&mut self, bytes: &[u8]) -> Result<()> {
        let end = self.cursor + bytes.len();
        if end >= self.buf.len() {
            return Err(TransformError::OutputOverflow {
                needed: end + 1,
                capacity: self.buf.len(),
            });
        }
        self.buf[self.cursor..end].copy_from_slice(bytes);
        self.cursor = end;
        Ok(())
    }

    /// Current write cursor.
    #[must_use]
    pub fn position(&self) -> usize {
        self.cursor
    }

    /// Total capacity of the output region.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// Write the sentinel at the cursor and release the view.
    ///
    /// Bytes after the sentinel are left as they are.
    ///
    /// # Errors
    ///
    /// Returns [`TransformError::OutputOverflow`] if the region has no room
    /// left for the sentinel, which only happens for a zero-capacity region.
    pub fn seal(self) -> Result<usize> {
        if self.cursor >= self.buf.len() {
            return Err(TransformError::OutputOverflow {
                needed: self.cursor + 1,
                capacity: self.buf.len(),
            });
        }
        self.buf[self.cursor] = SENTINEL;
        *self.sealed_at = Some(self.cursor);
        Ok(self.cursor)
    }
}

/// Read view of a sealed output region, handed to the write-out step.
#[derive(Debug, Clone, Copy)]
pub struct OutputBuffer<'a> {
    buf: &'a [u8],
    sealed_at: usize,
}

impl<'a> OutputBuffer<'a> {
    /// Logical content, up to (not including) the sentinel.
    #[must_use]
    pub fn content(&self) -> &'a [u8] {
        &self.buf[..self.sealed_at]
    }

    /// The whole region, sentinel and undefined tail included.
    #[must_use]
    pub fn as_capacity(&self) -> &'a [u8] {
        self.buf
    }

    /// Length of the logical content.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sealed_at
    }

    /// Whether no record was written.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sealed_at == 0
    }
}
