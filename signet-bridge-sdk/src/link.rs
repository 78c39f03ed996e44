use crate::error::BridgeResult;
use crate::session::{SessionPhase, SessionSnapshot};
use async_trait::async_trait;
use tokio::sync::watch;

/// Common control surface of the two role drivers.
///
/// A driver owns at most one live connection attempt at a time; `start` on a
/// finished driver begins a fresh attempt whose session discards the previous
/// one entirely.
#[async_trait]
pub trait LinkDriver: Send + Sync {
    /// Begin a connection attempt (waits for the auth gate first).
    async fn start(&self) -> BridgeResult<()>;

    /// Watch the current attempt's phase. The receiver stays valid across
    /// attempts; a new attempt resets it to `connecting`.
    fn subscribe_phase(&self) -> watch::Receiver<SessionPhase>;

    /// Explicit user cancel: abandon the session and tear the channel down.
    async fn cancel(&self) -> BridgeResult<()>;

    /// Serializable view of the current attempt for UI surfaces.
    fn snapshot(&self) -> Option<SessionSnapshot>;
}
