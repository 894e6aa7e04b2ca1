//! Per-call deadline propagation.

use std::time::Duration;

use tokio::time::Instant;

/// Caller-scoped context carried through a login.
///
/// The only thing it carries today is an optional deadline; when it elapses
/// the in-flight downstream future is dropped, which aborts the request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallContext {
    deadline: Option<Instant>,
}

impl CallContext {
    /// Context without a deadline.
    #[must_use]
    pub const fn background() -> Self {
        Self { deadline: None }
    }

    /// Context expiring `timeout` from now.
    #[must_use]
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::with_deadline(Instant::now() + timeout)
    }

    /// Context expiring at `deadline`.
    #[must_use]
    pub const fn with_deadline(deadline: Instant) -> Self {
        Self {
            deadline: Some(deadline),
        }
    }

    /// Deadline, if one applies.
    #[must_use]
    pub const fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Whether the deadline has already passed.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.deadline
            .is_some_and(|deadline| Instant::now() >= deadline)
    }

    /// Derive a child context whose deadline is the earlier of the parent's
    /// and `now + timeout`. A `None` timeout inherits the parent unchanged.
    #[must_use]
    pub fn child(&self, timeout: Option<Duration>) -> Self {
        let Some(timeout) = timeout else {
            return *self;
        };
        let candidate = Instant::now() + timeout;
        let deadline = match self.deadline {
            Some(parent) => parent.min(candidate),
            None => candidate,
        };
        Self::with_deadline(deadline)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn child_takes_the_earlier_deadline() {
        let parent = CallContext::with_timeout(Duration::from_millis(100));
        let tighter = parent.child(Some(Duration::from_millis(50)));
        let looser = parent.child(Some(Duration::from_secs(5)));

        assert!(tighter.deadline() < parent.deadline());
        assert_eq!(looser.deadline(), parent.deadline());
        assert_eq!(parent.child(None), parent);
    }

    #[tokio::test(start_paused = true)]
    async fn background_child_gets_its_own_deadline() {
        let ctx = CallContext::background().child(Some(Duration::from_millis(10)));
        assert!(ctx.deadline().is_some());
        assert!(!ctx.is_expired());

        tokio::time::advance(Duration::from_millis(10)).await;
        assert!(ctx.is_expired());
        assert!(!CallContext::background().is_expired());
    }
}
