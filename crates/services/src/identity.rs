use std::sync::Arc;

use academy_core::model::Identity;
use tokio::sync::watch;

/// Source of the current authenticated principal.
///
/// `subscribe` hands out a watch receiver, so every subscriber sees the
/// resolved initial state first and then each change, including `None` on
/// sign-out.
pub trait IdentityProvider: Send + Sync {
    fn current_identity(&self) -> Option<Identity>;

    fn subscribe(&self) -> watch::Receiver<Option<Identity>>;
}

/// In-process identity provider driven by explicit sign-in / sign-out calls.
#[derive(Debug, Clone)]
pub struct SessionIdentity {
    tx: Arc<watch::Sender<Option<Identity>>>,
}

impl SessionIdentity {
    #[must_use]
    pub fn new(initial: Option<Identity>) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self { tx: Arc::new(tx) }
    }

    #[must_use]
    pub fn anonymous() -> Self {
        Self::new(None)
    }

    pub fn sign_in(&self, identity: Identity) {
        tracing::info!(learner = %identity.learner_id, "signed in");
        self.tx.send_replace(Some(identity));
    }

    pub fn sign_out(&self) {
        if self.tx.send_replace(None).is_some() {
            tracing::info!("signed out");
        }
    }
}

impl IdentityProvider for SessionIdentity {
    fn current_identity(&self) -> Option<Identity> {
        self.tx.borrow().clone()
    }

    fn subscribe(&self) -> watch::Receiver<Option<Identity>> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use academy_core::model::LearnerId;

    #[tokio::test]
    async fn subscribers_see_initial_state_then_changes() {
        let provider = SessionIdentity::anonymous();
        let mut rx = provider.subscribe();
        assert!(rx.borrow_and_update().is_none());

        provider.sign_in(Identity::new(LearnerId::new("u1").unwrap()));
        rx.changed().await.unwrap();
        assert_eq!(
            rx.borrow_and_update().as_ref().map(|i| i.learner_id.as_str()),
            Some("u1")
        );

        provider.sign_out();
        rx.changed().await.unwrap();
        assert!(rx.borrow().is_none());
        assert!(provider.current_identity().is_none());
    }
}
