//! Cooperative cancellation for long-running collection work.
//!
//! An [`ExecutionContext`] pairs a [`CancellationToken`] with an optional
//! deadline and is passed explicitly through every engine and driver call.
//! Work polls it before each unit (each retry attempt, each batch item);
//! nothing is preempted.
//!
//! A context ends in exactly one of two ways, reported as [`ContextEnd`]:
//! explicit cancellation or an elapsed deadline. Derived contexts end when
//! their parent does, but a parent never observes its children's bounds,
//! which is what lets callers tell an internal budget apart from an
//! external cancellation.

use crate::error::{CollectorError, ErrorCode, Result};
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tokio_util::sync::{CancellationToken, DropGuard};

/// How an execution context ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ContextEnd {
    /// The context (or an ancestor) was explicitly cancelled
    #[error("context cancelled")]
    Cancelled,
    /// The context's deadline elapsed
    #[error("context deadline exceeded")]
    DeadlineExceeded,
}

impl ContextEnd {
    /// Taxonomy code for this outcome.
    pub fn code(self) -> ErrorCode {
        match self {
            ContextEnd::Cancelled => ErrorCode::Cancelled,
            ContextEnd::DeadlineExceeded => ErrorCode::DeadlineExceeded,
        }
    }

    /// Converts the outcome into a classified error.
    pub fn into_error(
        self,
        source: impl Into<String>,
        operation: impl Into<String>,
    ) -> CollectorError {
        let message = match self {
            ContextEnd::Cancelled => "operation cancelled by caller",
            ContextEnd::DeadlineExceeded => "operation deadline exceeded",
        };
        CollectorError::new(self.code(), source, operation, message).with_cause(self)
    }
}

/// Cancellation token plus optional deadline.
///
/// Cloning is cheap and clones share cancellation state.
#[derive(Debug, Clone, Default)]
pub struct ExecutionContext {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl ExecutionContext {
    /// Creates a root context with no deadline.
    pub fn new() -> Self {
        Self::default()
    }

    /// Derives a child that also ends once `timeout` has elapsed.
    ///
    /// The child never outlives its parent's deadline.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        match Instant::now().checked_add(timeout) {
            Some(deadline) => self.with_deadline(deadline),
            None => self.child(),
        }
    }

    /// Derives a child that also ends at `deadline`.
    pub fn with_deadline(&self, deadline: Instant) -> Self {
        let deadline = match self.deadline {
            Some(parent) => parent.min(deadline),
            None => deadline,
        };
        Self {
            token: self.token.child_token(),
            deadline: Some(deadline),
        }
    }

    /// Derives a child that can be cancelled without affecting this context.
    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
            deadline: self.deadline,
        }
    }

    /// Cancels this context and every context derived from it.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Returns a guard that cancels this context when dropped.
    pub fn cancel_on_drop(&self) -> DropGuard {
        self.token.clone().drop_guard()
    }

    /// Effective deadline, if any.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left before the deadline; `None` when unbounded.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    /// Reports how the context ended, or `None` while it is live.
    ///
    /// Explicit cancellation takes precedence over an elapsed deadline.
    pub fn end(&self) -> Option<ContextEnd> {
        if self.token.is_cancelled() {
            Some(ContextEnd::Cancelled)
        } else if self.deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            Some(ContextEnd::DeadlineExceeded)
        } else {
            None
        }
    }

    /// Whether the context has ended.
    pub fn is_done(&self) -> bool {
        self.end().is_some()
    }

    /// Resolves once the context ends.
    pub async fn done(&self) -> ContextEnd {
        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    () = self.token.cancelled() => ContextEnd::Cancelled,
                    () = tokio::time::sleep_until(deadline) => {
                        if self.token.is_cancelled() {
                            ContextEnd::Cancelled
                        } else {
                            ContextEnd::DeadlineExceeded
                        }
                    }
                }
            }
            None => {
                self.token.cancelled().await;
                ContextEnd::Cancelled
            }
        }
    }

    /// Drives `future` until it completes or the context ends.
    ///
    /// The future is dropped if the context ends first, so callers never
    /// wait on a driver that ignores cancellation.
    pub async fn run_until_done<F>(&self, future: F) -> std::result::Result<F::Output, ContextEnd>
    where
        F: Future,
    {
        if let Some(end) = self.end() {
            return Err(end);
        }
        tokio::select! {
            biased;
            output = future => Ok(output),
            end = self.done() => Err(end),
        }
    }
}

/// Returns `Ok(())` while `ctx` is live, otherwise a CANCELLED or
/// DEADLINE_EXCEEDED error attributed to `source` and `operation`.
pub fn check_context(ctx: &ExecutionContext, source: &str, operation: &str) -> Result<()> {
    match ctx.end() {
        Some(end) => Err(end.into_error(source, operation)),
        None => Ok(()),
    }
}

/// Reclassifies `err` after a call failed because `ctx` ended.
///
/// When `ctx` has ended the result is a CANCELLED or DEADLINE_EXCEEDED error
/// with `err` kept as its cause; otherwise `err` is returned unchanged.
pub fn wrap_context_error(
    ctx: &ExecutionContext,
    err: CollectorError,
    source: &str,
    operation: &str,
) -> CollectorError {
    match ctx.end() {
        Some(end) if err.code() == end.code() => err,
        Some(end) => {
            let message = format!("{}: {}", end, err.message());
            CollectorError::new(end.code(), source, operation, message).with_cause(err)
        }
        None => err,
    }
}
