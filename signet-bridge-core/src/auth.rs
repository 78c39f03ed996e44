use std::sync::Arc;

use tokio::sync::watch;
use tracing::debug;

use signet_bridge_models::AuthStatus;
use signet_bridge_sdk::AuthSource;

/// Settable login gate backing both pages of the demo runtime.
pub struct MemoryAuth {
    tx: watch::Sender<AuthStatus>,
}

impl MemoryAuth {
    pub fn new(initial: AuthStatus) -> Arc<Self> {
        Arc::new(Self {
            tx: watch::channel(initial).0,
        })
    }

    pub fn set(&self, status: AuthStatus) {
        debug!(%status, "auth status changed");
        let _ = self.tx.send(status);
    }
}

impl AuthSource for MemoryAuth {
    fn status(&self) -> AuthStatus {
        *self.tx.borrow()
    }

    fn subscribe(&self) -> watch::Receiver<AuthStatus> {
        self.tx.subscribe()
    }
}
