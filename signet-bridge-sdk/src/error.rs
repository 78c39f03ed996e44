use crate::session::SessionPhase;
use signet_bridge_models::Origin;
use std::time::Duration;
use thiserror::Error;

pub type BridgeResult<T, E = BridgeError> = Result<T, E>;

/// Protocol-layer failures.
///
/// None of these is globally fatal: origin and schema mismatches are dropped
/// at the channel, `ChannelClosed` marks a benign post-teardown send, and
/// mutation failures put the session back into `ready` for a retry.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BridgeError {
    /// Inbound message from an origin other than the bound one. Dropped and
    /// logged at the channel; never surfaced to the user.
    #[error("origin mismatch: expected {expected}, got {actual}")]
    OriginMismatch { expected: Origin, actual: Origin },
    /// Recognized origin, but the payload matched no declared event shape.
    #[error("schema mismatch: {0}")]
    SchemaMismatch(String),
    /// Send attempted after teardown; callers treat this as a no-op signal.
    #[error("channel closed")]
    ChannelClosed,
    /// External wallet call rejected; the session returns to `ready`.
    #[error("wallet mutation failed: {0}")]
    MutationFailed(#[from] WalletError),
    /// The liveness monitor reported the peer window gone.
    #[error("peer abandoned the connection")]
    PeerAbandoned,
    /// The state machine rejected an edge outside its transition table.
    #[error("invalid session transition: {from} -> {to}")]
    InvalidTransition { from: SessionPhase, to: SessionPhase },
    /// Popup blocked or embedding failed before any protocol activity.
    #[error("window unavailable: {0}")]
    WindowUnavailable(String),
    #[error("configuration error: {0}")]
    ConfigurationError(String),
    /// A configured session deadline elapsed.
    #[error("timed out after {0:?}")]
    Timeout(Duration),
}

/// Failures surfaced by the wallet and transaction collaborators.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WalletError {
    #[error("wallet not connected")]
    NotConnected,
    #[error("signer already delegated")]
    AlreadyDelegated,
    #[error("chain mismatch: wallet is on {actual}, grant targets {expected}")]
    ChainMismatch { expected: String, actual: String },
    #[error("user rejected the request")]
    UserRejected,
    #[error("{0}")]
    Failed(String),
}
