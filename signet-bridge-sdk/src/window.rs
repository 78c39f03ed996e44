use crate::error::BridgeResult;
use serde_json::Value;
use signet_bridge_models::{EmbedMode, Origin};
use std::fmt::Debug;
use std::sync::Arc;
use tokio::sync::mpsc;

/// A message delivered to a window, stamped with its sender's origin.
///
/// The origin stamp comes from the messaging runtime, never from the sender's
/// payload, which is what makes the channel's origin check trustworthy.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub origin: Origin,
    pub data: Value,
}

/// Handle to a peer window, as seen from the document that holds it.
///
/// The handle is exclusively owned by the Transport Channel bound to it; no
/// other component posts through it directly.
pub trait RemoteWindow: Send + Sync + Debug {
    /// Post `data` restricted to `target_origin`. When the peer document's
    /// origin differs, the runtime silently withholds delivery; posting to a
    /// closed window is a silent no-op as well.
    fn post(&self, data: Value, target_origin: &Origin) -> BridgeResult<()>;

    /// Whether the window reports itself closed.
    fn is_closed(&self) -> bool;

    /// Close the window. Meaningful for popups; frames ignore it.
    fn close(&self);
}

/// The local document's view of its own window.
pub trait WindowContext: Send + Sync {
    /// Origin this document is loaded from.
    fn origin(&self) -> Origin;

    /// Subscribe to messages delivered to this window from this point on.
    /// Replaces any previous subscription, whose receiver stops yielding;
    /// the stream preserves post order from any single peer. `None` means
    /// the window no longer accepts listeners.
    fn take_inbox(&self) -> Option<mpsc::UnboundedReceiver<InboundMessage>>;

    /// Handle to the window that opened or embeds this one, if any.
    fn opener(&self) -> Option<Arc<dyn RemoteWindow>>;
}

/// Supplies partner window handles to the initiating side.
pub trait WindowEmbedder: Send + Sync {
    /// Load the partner document and return the handle a channel binds to.
    /// Popup mode fails with `WindowUnavailable` when the runtime refuses to
    /// open the window.
    fn open_partner(
        &self,
        url: &str,
        name: &str,
        mode: EmbedMode,
        features: &str,
    ) -> BridgeResult<Arc<dyn RemoteWindow>>;
}
