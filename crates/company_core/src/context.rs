//! Per-request cancellation scope.
//!
//! # Responsibility
//! - Carry a caller-owned cancellation flag and optional deadline through
//!   persistence and notification calls.
//!
//! # Invariants
//! - Clones share one flag; cancelling any clone cancels all of them.
//! - Once cancelled or past its deadline, a context never becomes live again.

use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Why a context stopped accepting work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextError {
    Cancelled,
    DeadlineExceeded,
}

impl Display for ContextError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cancelled => write!(f, "context cancelled"),
            Self::DeadlineExceeded => write!(f, "context deadline exceeded"),
        }
    }
}

impl Error for ContextError {}

/// Cancellation scope for one unit of work.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    cancelled: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl RequestContext {
    /// Context that is never cancelled unless `cancel` is called.
    pub fn background() -> Self {
        Self::default()
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self::with_deadline(Instant::now() + timeout)
    }

    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
            deadline: Some(deadline),
        }
    }

    /// Cancels this context and every clone of it.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Returns an error once the context is cancelled or expired.
    pub fn check(&self) -> Result<(), ContextError> {
        if self.cancelled.load(Ordering::Acquire) {
            return Err(ContextError::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Err(ContextError::DeadlineExceeded),
            _ => Ok(()),
        }
    }

    pub fn is_done(&self) -> bool {
        self.check().is_err()
    }
}

#[cfg(test)]
mod tests {
    use super::{ContextError, RequestContext};
    use std::time::{Duration, Instant};

    #[test]
    fn background_context_is_live() {
        let ctx = RequestContext::background();
        assert_eq!(ctx.check(), Ok(()));
        assert!(ctx.deadline().is_none());
    }

    #[test]
    fn cancel_propagates_to_clones() {
        let ctx = RequestContext::with_timeout(Duration::from_secs(60));
        let shared = ctx.clone();

        shared.cancel();
        assert_eq!(ctx.check(), Err(ContextError::Cancelled));
        assert!(ctx.is_done());
    }

    #[test]
    fn elapsed_deadline_is_reported() {
        let ctx = RequestContext::with_deadline(Instant::now());
        assert_eq!(ctx.check(), Err(ContextError::DeadlineExceeded));
    }
}
