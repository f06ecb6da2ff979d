//! Application actions emitted by the client and the dispatchers that receive them.
//!
//! # Design
//! - The dispatcher is supplied when the client is built; it is never swapped later.
//! - Closures work as dispatchers; `ChannelDispatcher` forwards into a tokio channel
//!   for hosts that drain actions on their own task.

use serde::Serialize;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::warn;

/// Actions the client asks the hosting application to perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AppAction {
    /// Credentials were rejected; send the user to the authentication screen.
    RedirectToAuth,
}

impl AppAction {
    /// Machine-friendly discriminator.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::RedirectToAuth => "redirect_to_auth",
        }
    }
}

/// Sink for [`AppAction`]s.
pub trait Dispatch: Send + Sync {
    /// Deliver an action to the hosting application.
    fn dispatch(&self, action: AppAction);
}

impl<F> Dispatch for F
where
    F: Fn(AppAction) + Send + Sync,
{
    fn dispatch(&self, action: AppAction) {
        self(action);
    }
}

/// Dispatcher that forwards actions into an unbounded tokio channel.
#[derive(Debug, Clone)]
pub struct ChannelDispatcher {
    sender: UnboundedSender<AppAction>,
}

impl ChannelDispatcher {
    /// Create a dispatcher and the receiver the host drains.
    #[must_use]
    pub fn new() -> (Self, UnboundedReceiver<AppAction>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl Dispatch for ChannelDispatcher {
    fn dispatch(&self, action: AppAction) {
        if self.sender.send(action).is_err() {
            warn!(action = action.kind(), "action receiver dropped; action discarded");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn closures_act_as_dispatchers() {
        let count = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&count);
        let dispatcher = move |action: AppAction| {
            assert_eq!(action, AppAction::RedirectToAuth);
            seen.fetch_add(1, Ordering::SeqCst);
        };
        dispatcher.dispatch(AppAction::RedirectToAuth);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn channel_dispatcher_forwards_actions() {
        let (dispatcher, mut receiver) = ChannelDispatcher::new();
        dispatcher.dispatch(AppAction::RedirectToAuth);
        assert_eq!(receiver.try_recv().ok(), Some(AppAction::RedirectToAuth));
        assert!(receiver.try_recv().is_err());
    }

    #[test]
    fn channel_dispatcher_tolerates_dropped_receiver() {
        let (dispatcher, receiver) = ChannelDispatcher::new();
        drop(receiver);
        dispatcher.dispatch(AppAction::RedirectToAuth);
    }

    #[test]
    fn action_serialises_with_type_tag() -> Result<(), serde_json::Error> {
        let rendered = serde_json::to_string(&AppAction::RedirectToAuth)?;
        assert_eq!(rendered, r#"{"type":"redirect_to_auth"}"#);
        assert_eq!(AppAction::RedirectToAuth.kind(), "redirect_to_auth");
        Ok(())
    }
}
