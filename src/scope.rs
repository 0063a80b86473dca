//! Cancellable, deadline-bearing execution scope.
//!
//! A [`Scope`] is handed from the caller down to the enrichment coordinator and from there to every
//! provider adapter. Ending a scope (explicit cancel or deadline) is observed by all of its
//! children; ending a child never touches its parent.

use std::fmt;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Why a scope stopped accepting work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeEnd {
    /// `cancel()` was called on this scope or one of its ancestors.
    Cancelled,
    /// The deadline inherited by this scope has passed.
    DeadlineExceeded,
}

impl fmt::Display for ScopeEnd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScopeEnd::Cancelled => write!(f, "scope cancelled"),
            ScopeEnd::DeadlineExceeded => write!(f, "deadline exceeded"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Scope {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl Default for Scope {
    fn default() -> Self {
        Self::new()
    }
}

impl Scope {
    /// Root scope without a deadline. It only ends when cancelled.
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
            deadline: None,
        }
    }

    /// Root scope that ends `timeout` from now.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::with_deadline(Instant::now() + timeout)
    }

    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            token: CancellationToken::new(),
            deadline: Some(deadline),
        }
    }

    /// Derives a child scope that ends whenever this one does. It can also be cancelled alone.
    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
            deadline: self.deadline,
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_done(&self) -> bool {
        self.end_reason().is_some()
    }

    /// `None` while the scope is live.
    pub fn end_reason(&self) -> Option<ScopeEnd> {
        if self.token.is_cancelled() {
            return Some(ScopeEnd::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(ScopeEnd::DeadlineExceeded),
            _ => None,
        }
    }

    /// Resolves once the scope is cancelled or its deadline passes.
    pub async fn done(&self) -> ScopeEnd {
        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    _ = self.token.cancelled() => ScopeEnd::Cancelled,
                    _ = tokio::time::sleep_until(deadline) => ScopeEnd::DeadlineExceeded,
                }
            }
            None => {
                self.token.cancelled().await;
                ScopeEnd::Cancelled
            }
        }
    }

    /// Races `fut` against the end of the scope.
    ///
    /// When the scope ends first the future is dropped, which aborts whatever I/O it was driving.
    pub async fn run<F>(&self, fut: F) -> Result<F::Output, ScopeEnd>
    where
        F: Future,
    {
        if let Some(reason) = self.end_reason() {
            return Err(reason);
        }

        tokio::select! {
            biased;
            reason = self.done() => Err(reason),
            out = fut => Ok(out),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_child_observes_parent_cancel() {
        let parent = Scope::new();
        let child = parent.child();

        parent.cancel();

        assert_eq!(child.done().await, ScopeEnd::Cancelled);
        assert_eq!(child.end_reason(), Some(ScopeEnd::Cancelled));
    }

    #[tokio::test]
    async fn test_child_cancel_does_not_reach_parent() {
        let parent = Scope::new();
        let child = parent.child();

        child.cancel();

        assert!(child.is_done());
        assert!(!parent.is_done());
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_ends_scope() {
        let scope = Scope::with_timeout(Duration::from_millis(50));
        let child = scope.child();

        assert_eq!(child.deadline(), scope.deadline());
        assert_eq!(child.done().await, ScopeEnd::DeadlineExceeded);
        assert_eq!(scope.end_reason(), Some(ScopeEnd::DeadlineExceeded));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_drops_future_when_scope_ends() {
        let scope = Scope::with_timeout(Duration::from_millis(10));

        let result = scope
            .run(tokio::time::sleep(Duration::from_secs(60)))
            .await;

        assert_eq!(result, Err(ScopeEnd::DeadlineExceeded));
    }

    #[tokio::test]
    async fn test_run_returns_output_when_live() {
        let scope = Scope::new();
        let result = scope.run(async { 42 }).await;
        assert_eq!(result, Ok(42));
    }

    #[tokio::test]
    async fn test_run_on_ended_scope_never_polls() {
        let scope = Scope::new();
        scope.cancel();

        let result = scope.run(async { 7 }).await;

        assert_eq!(result, Err(ScopeEnd::Cancelled));
    }
}
