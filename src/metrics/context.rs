//! Per-stream execution context for metric recording.

use metrics::Label;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

/// Carries cancellation, an optional deadline and base attributes into
/// metric recording calls. Never consulted by the data path.
#[derive(Debug, Clone)]
pub struct MeterContext {
    token: CancellationToken,
    deadline: Option<Instant>,
    attributes: Arc<[Label]>,
}

impl Default for MeterContext {
    fn default() -> Self {
        Self {
            token: CancellationToken::new(),
            deadline: None,
            attributes: Arc::from(Vec::new()),
        }
    }
}

impl MeterContext {
    /// Context that is never cancelled and carries no attributes
    pub fn background() -> Self {
        Self::default()
    }

    /// Bind to an existing cancellation token
    pub fn with_token(mut self, token: CancellationToken) -> Self {
        self.token = token;
        self
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Attributes prepended to every metric recorded under this context
    pub fn with_attributes(mut self, attributes: impl IntoIterator<Item = Label>) -> Self {
        self.attributes = attributes.into_iter().collect();
        self
    }

    /// Derive a child context cancelled together with this one
    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
            deadline: self.deadline,
            attributes: self.attributes.clone(),
        }
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn attributes(&self) -> &[Label] {
        &self.attributes
    }

    /// True once cancelled or past the deadline
    pub fn is_done(&self) -> bool {
        self.token.is_cancelled() || self.deadline.is_some_and(|d| Instant::now() >= d)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_background_is_live() {
        let ctx = MeterContext::background();
        assert!(!ctx.is_done());
        assert!(ctx.attributes().is_empty());
    }

    #[test]
    fn test_cancel_propagates_to_child() {
        let parent = MeterContext::background();
        let child = parent.child();
        parent.cancel();
        assert!(parent.is_done());
        assert!(child.is_done());
    }

    #[test]
    fn test_child_cancel_leaves_parent() {
        let parent = MeterContext::background();
        let child = parent.child();
        child.cancel();
        assert!(!parent.is_done());
    }

    #[test]
    fn test_expired_deadline() {
        let ctx = MeterContext::background().with_deadline(Instant::now() - Duration::from_millis(1));
        assert!(ctx.is_done());
    }

    #[test]
    fn test_attributes_carried() {
        let ctx = MeterContext::background().with_attributes([Label::new("region", "eu")]);
        assert_eq!(ctx.attributes().len(), 1);
        assert_eq!(ctx.child().attributes()[0].key(), "region");
    }
}
