//! Execution lanes and the context that hosts them.
//!
//! Every pipeline stage runs on its own [`Lane`]. The [`ExecutionContext`] is
//! built once per [`Pipeline`](crate::pipeline::Pipeline) and owns a Rayon
//! thread pool sized for the three lanes; dropping the context tears the pool
//! down, on success and failure paths alike.
//!
//! [`run_lane`] is the guard every stage body goes through. A panic inside a
//! lane is caught and turned into [`TransformError::LaneFailed`] so the
//! coordinator can abort the run and report the failure upward instead of
//! unwinding through the caller.

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};

use crate::error::{Result, TransformError};

/// Number of lanes the pipeline needs: two scanners and the transformer.
pub const LANE_COUNT: usize = 3;

/// Identifies the stage running on a lane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lane {
    /// Locates every record terminator.
    NewlineFinder,
    /// Locates every field separator.
    DelimiterFinder,
    /// Rewrites records into the output region.
    Transformer,
}

impl Lane {
    /// Stable name, also used for lane thread names.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Lane::NewlineFinder => "newline-finder",
            Lane::DelimiterFinder => "delimiter-finder",
            Lane::Transformer => "transformer",
        }
    }
}

impl fmt::Display for Lane {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Process-lifetime resources shared by every run of a pipeline.
pub struct ExecutionContext {
    pool: rayon::ThreadPool,
}

impl fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("threads", &self.pool.current_num_threads())
            .finish()
    }
}

impl ExecutionContext {
    /// Create a context with one pool thread per lane.
    ///
    /// # Errors
    ///
    /// Returns [`TransformError::LaneSetup`] if the thread pool cannot be built.
    pub fn new() -> Result<Self> {
        Self::with_threads(LANE_COUNT)
    }

    /// Create a context with an explicit pool size.
    ///
    /// # Errors
    ///
    /// Returns [`TransformError::LaneSetup`] if `threads` is zero or the
    /// thread pool cannot be built.
    pub fn with_threads(threads: usize) -> Result<Self> {
        if threads == 0 {
            return Err(TransformError::LaneSetup(
                "execution context needs at least one thread".to_string(),
            ));
        }
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("gotrack-lane-{i}"))
            .build()
            .map_err(|e| TransformError::LaneSetup(e.to_string()))?;
        tracing::debug!(threads, "execution context ready");
        Ok(Self { pool })
    }

    /// Number of pool threads.
    #[must_use]
    pub fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Run `op` inside the context's pool.
    pub fn install<R, F>(&self, op: F) -> R
    where
        F: FnOnce() -> R + Send,
        R: Send,
    {
        self.pool.install(op)
    }
}

/// Run one stage body on behalf of `lane`, converting a panic into an error.
///
/// # Errors
///
/// Propagates the stage's own error, or returns
/// [`TransformError::LaneFailed`] if the stage panicked.
pub fn run_lane<T, F>(lane: Lane, stage: F) -> Result<T>
where
    F: FnOnce() -> Result<T>,
{
    match panic::catch_unwind(AssertUnwindSafe(stage)) {
        Ok(result) => result,
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            tracing::error!(%lane, %message, "lane panicked");
            Err(TransformError::LaneFailed { lane, message })
        },
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
