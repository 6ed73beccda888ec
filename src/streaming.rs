//! Channel-fed boundaries for the overlapped schedule.
//!
//! In [`Schedule::Streaming`](crate::pipeline::Schedule::Streaming) the two
//! scanners and the transformer run at the same time. Each scanner walks the
//! raw buffer chunk by chunk and sends a [`ScanChunk`] per chunk over a
//! bounded `crossbeam_channel`; a full channel blocks the scanner, which is
//! the backpressure between the lanes.
//!
//! Every chunk carries a watermark (`scanned_to`). The transformer only
//! treats a record as complete once the delimiter watermark has passed the
//! record's end, so it never acts on a partial boundary set. A channel that
//! disconnects before its watermark reaches `N` means the producing lane
//! died, and is reported as [`TransformError::BoundaryStreamClosed`].

use std::collections::VecDeque;

use crossbeam_channel::{Receiver, Sender};

use crate::arena::RawView;
use crate::boundary_scanner::{BoundaryScanner, ScanChunk};
use crate::error::{Result, TransformError};
use crate::lanes::Lane;
use crate::transformer::BoundarySource;

/// Producer body: scan `raw` in chunks and send each one downstream.
///
/// Returns the number of boundaries sent.
///
/// # Errors
///
/// Returns [`TransformError::LaneAborted`] if the consumer went away.
pub fn produce_boundaries(
    lane: Lane,
    scanner: BoundaryScanner,
    raw: RawView<'_>,
    sender: &Sender<ScanChunk>,
) -> Result<usize> {
    let mut sent = 0;
    for chunk in scanner.scan_chunks(raw.as_bytes()) {
        sent += chunk.offsets.len();
        sender
            .send(chunk)
            .map_err(|_| TransformError::LaneAborted(lane))?;
    }
    tracing::debug!(%lane, boundaries = sent, bytes = raw.len(), "boundary stream complete");
    Ok(sent)
}

/// Consumer side of one scanner's channel.
#[derive(Debug)]
pub struct BoundaryStream {
    lane: Lane,
    receiver: Receiver<ScanChunk>,
    pending: VecDeque<usize>,
    scanned_to: usize,
    len: usize,
    received: usize,
}

impl BoundaryStream {
    /// Wrap the receiver for a buffer of `len` bytes.
    #[must_use]
    pub fn new(lane: Lane, receiver: Receiver<ScanChunk>, len: usize) -> Self {
        Self {
            lane,
            receiver,
            pending: VecDeque::new(),
            scanned_to: 0,
            len,
            received: 0,
        }
    }

    /// Bytes the producer has finished scanning.
    #[must_use]
    pub fn scanned_to(&self) -> usize {
        self.scanned_to
    }

    /// Boundaries received so far.
    #[must_use]
    pub fn received(&self) -> usize {
        self.received
    }

    /// Whether the producer has covered the whole buffer.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.scanned_to >= self.len
    }

    fn pull(&mut self) -> Result<()> {
        let chunk = self
            .receiver
            .recv()
            .map_err(|_| TransformError::BoundaryStreamClosed {
                lane: self.lane,
                scanned_to: self.scanned_to,
                expected: self.len,
            })?;
        debug_assert!(chunk.scanned_to > self.scanned_to);
        self.received += chunk.offsets.len();
        self.pending.extend(chunk.offsets);
        self.scanned_to = chunk.scanned_to;
        Ok(())
    }

    /// Next boundary, waiting for the producer if needed.
    ///
    /// # Errors
    ///
    /// Returns [`TransformError::BoundaryStreamClosed`] if the producer
    /// disconnected before covering the buffer.
    pub fn next_offset(&mut self) -> Result<Option<usize>> {
        loop {
            if let Some(offset) = self.pending.pop_front() {
                return Ok(Some(offset));
            }
            if self.is_complete() {
                return Ok(None);
            }
            self.pull()?;
        }
    }

    /// Wait until every boundary below `end` has arrived.
    ///
    /// # Errors
    ///
    /// Returns [`TransformError::BoundaryStreamClosed`] if the producer
    /// disconnected first.
    pub fn fill_to(&mut self, end: usize) -> Result<()> {
        while self.scanned_to < end.min(self.len) {
            self.pull()?;
        }
        Ok(())
    }

    /// Wait until the producer has covered the whole buffer.
    ///
    /// # Errors
    ///
    /// Returns [`TransformError::BoundaryStreamClosed`] if the producer
    /// disconnected first.
    pub fn finish(&mut self) -> Result<()> {
        self.fill_to(self.len)
    }

    /// Move every pending boundary below `end` into `into`.
    ///
    /// Call [`fill_to`](Self::fill_to) first for a complete answer.
    pub fn drain_below(&mut self, end: usize, into: &mut Vec<usize>) {
        while let Some(&offset) = self.pending.front() {
            if offset >= end {
                break;
            }
            into.push(offset);
            self.pending.pop_front();
        }
    }
}

/// [`BoundarySource`] fed by the two scanner channels.
#[derive(Debug)]
pub struct StreamedBoundaries {
    terminators: BoundaryStream,
    separators: BoundaryStream,
    scratch: Vec<usize>,
}

impl StreamedBoundaries {
    /// Pair the newline and delimiter channels for a buffer of `len` bytes.
    #[must_use]
    pub fn new(
        newlines: Receiver<ScanChunk>,
        delimiters: Receiver<ScanChunk>,
        len: usize,
    ) -> Self {
        Self {
            terminators: BoundaryStream::new(Lane::NewlineFinder, newlines, len),
            separators: BoundaryStream::new(Lane::DelimiterFinder, delimiters, len),
            scratch: Vec::new(),
        }
    }

    /// Terminators and separators received so far.
    #[must_use]
    pub fn received(&self) -> (usize, usize) {
        (self.terminators.received(), self.separators.received())
    }
}

impl BoundarySource for StreamedBoundaries {
    fn next_terminator(&mut self) -> Result<Option<usize>> {
        self.terminators.next_offset()
    }

    fn separators_before(&mut self, end: usize) -> Result<&[usize]> {
        self.separators.fill_to(end)?;
        self.scratch.clear();
        self.separators.drain_below(end, &mut self.scratch);
        Ok(&self.scratch)
    }

    fn finish(&mut self) -> Result<()> {
        // Producers block on their last send until it is received.
        self.terminators.finish()?;
        self.separators.finish()
    }
}
