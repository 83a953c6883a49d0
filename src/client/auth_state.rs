use std::sync::Arc;

use tokio::sync::watch;

/// Whether the client believes it holds a logged-in session. One instance is
/// shared by the [`ApiClient`](super::ApiClient) and the UI; the UI watches
/// it through [`subscribe`](Self::subscribe).
#[derive(Clone, Debug)]
pub struct AuthState {
    tx: Arc<watch::Sender<bool>>,
}

impl Default for AuthState {
    fn default() -> Self {
        Self::new()
    }
}

impl AuthState {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    pub fn is_authenticated(&self) -> bool {
        *self.tx.borrow()
    }

    /// Stores the flag and wakes every subscriber, even when the value did
    /// not change, so repeated logouts are each observed.
    pub fn set_authenticated(&self, authenticated: bool) {
        self.tx.send_replace(authenticated);
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}
