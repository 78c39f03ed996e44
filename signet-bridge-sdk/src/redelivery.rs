use crate::channel::Channel;
use crate::error::BridgeError;
use crate::event::BridgeEvent;
use signet_bridge_models::RedeliveryPolicy;
use std::sync::Arc;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, warn};

/// Handle for a running re-send loop.
///
/// The loop stops on acknowledgement, channel close, or the policy bound;
/// `stop` cancels it synchronously and dropping the handle cancels it too,
/// so a torn-down owner cannot leak the timer.
pub struct Redelivery {
    token: CancellationToken,
    _guard: DropGuard,
}

impl Redelivery {
    pub fn stop(&self) {
        self.token.cancel();
    }

    #[inline]
    pub fn is_stopped(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// Re-send `event` on `channel` at the policy cadence until `acked` returns
/// true. The first send happens immediately; there is no transport-level
/// handshake confirming the peer's listener is attached, so the receiver must
/// treat duplicate deliveries idempotently.
pub fn send_until_acked(
    channel: Arc<Channel>,
    event: BridgeEvent,
    policy: RedeliveryPolicy,
    acked: impl Fn() -> bool + Send + Sync + 'static,
) -> Redelivery {
    let token = CancellationToken::new();
    let loop_token = token.clone();

    tokio::spawn(async move {
        let interval = policy.interval();
        let mut attempts: u32 = 0;
        loop {
            if acked() {
                debug!(event = %event, attempts, "redelivery acknowledged");
                break;
            }
            if channel.is_closed() {
                debug!(event = %event, attempts, "redelivery stopped: channel closed");
                break;
            }
            if let Some(max) = policy.max_attempts {
                if attempts >= max {
                    warn!(event = %event, attempts, "redelivery gave up: attempt bound reached");
                    break;
                }
            }

            match channel.send(&event) {
                Ok(()) => {}
                Err(BridgeError::ChannelClosed) => break,
                Err(e) => warn!(event = %event, error = %e, "redelivery send failed"),
            }
            attempts += 1;

            tokio::select! {
                _ = loop_token.cancelled() => break,
                _ = tokio::time::sleep(interval) => {}
            }
        }
    });

    Redelivery {
        _guard: token.clone().drop_guard(),
        token,
    }
}
