//! Shared cancellation source.
//!
//! Every request sent through one client is stamped with the same token, so
//! cancelling the source aborts all in-flight requests together. A source is
//! never reset; a fresh one only comes with a freshly initialised client.

use tokio_util::sync::CancellationToken;

/// Cancellation source shared by every request of a client.
#[derive(Debug, Clone, Default)]
pub struct CancellationSource {
    token: CancellationToken,
}

impl CancellationSource {
    /// Create a fresh, uncancelled source.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Token to attach to an outgoing request.
    #[must_use]
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Cancel every request holding this source's token.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Whether the source has been cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_reaches_every_issued_token() {
        let source = CancellationSource::new();
        let first = source.token();
        let second = source.token();
        assert!(!first.is_cancelled());

        source.cancel();

        assert!(source.is_cancelled());
        assert!(first.is_cancelled());
        assert!(second.is_cancelled());
        assert!(source.token().is_cancelled());
    }

    #[test]
    fn sources_are_independent() {
        let old = CancellationSource::new();
        old.cancel();
        let fresh = CancellationSource::new();
        assert!(!fresh.is_cancelled());
    }
}
