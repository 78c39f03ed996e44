use crate::window::RemoteWindow;
use signet_bridge_models::LivenessPolicy;
use std::sync::Arc;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::debug;

/// Handle for a running peer liveness poll.
///
/// Popup-specific: an iframe cannot be closed independently of its host, so
/// its teardown rides the host document lifecycle instead of a monitor.
/// `stop` cancels the poll synchronously; dropping the handle cancels too.
pub struct PeerLiveness {
    token: CancellationToken,
    _guard: DropGuard,
}

impl PeerLiveness {
    /// Poll `remote` at the policy cadence. On the first closed observation,
    /// invoke `on_closed` once and stop polling.
    pub fn watch(
        remote: Arc<dyn RemoteWindow>,
        policy: LivenessPolicy,
        on_closed: impl FnOnce() + Send + 'static,
    ) -> Self {
        let token = CancellationToken::new();
        let poll_token = token.clone();

        tokio::spawn(async move {
            let interval = policy.interval();
            let mut on_closed = Some(on_closed);
            loop {
                tokio::select! {
                    _ = poll_token.cancelled() => break,
                    _ = tokio::time::sleep(interval) => {
                        if remote.is_closed() {
                            debug!("peer window reported closed");
                            if let Some(notify) = on_closed.take() {
                                notify();
                            }
                            break;
                        }
                    }
                }
            }
        });

        Self {
            _guard: token.clone().drop_guard(),
            token,
        }
    }

    pub fn stop(&self) {
        self.token.cancel();
    }

    #[inline]
    pub fn is_stopped(&self) -> bool {
        self.token.is_cancelled()
    }
}
