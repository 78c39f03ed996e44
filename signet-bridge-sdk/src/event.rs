use crate::error::{BridgeError, BridgeResult};
use crate::schema::{Envelope, EventSchema, SchemaSet};
use serde_json::{json, Value};
use std::fmt::{Display, Formatter};

/// Stable wire names of the bridge events.
pub mod names {
    pub const READY: &str = "ready";
    pub const DELEGATED_SIGNER: &str = "delegatedSigner";
    pub const WALLET: &str = "wallet";
    pub const MESSAGE_TO_SIGN: &str = "messageToSign";
    pub const SIGNATURE: &str = "signature";
}

/// Events the Portal may post toward the DApp.
pub static PORTAL_TO_DAPP: SchemaSet = SchemaSet::new(
    "portal->dapp",
    &[
        EventSchema::text(names::DELEGATED_SIGNER),
        EventSchema::text(names::SIGNATURE),
    ],
);

/// Events the DApp may post toward the Portal.
pub static DAPP_TO_PORTAL: SchemaSet = SchemaSet::new(
    "dapp->portal",
    &[
        EventSchema::signal(names::READY),
        EventSchema::text(names::WALLET),
        EventSchema::text(names::MESSAGE_TO_SIGN),
    ],
);

/// Typed union of every event on the bridge wire.
///
/// Wire form is flat, one key per message: `{"<event>": <payload>}`, with the
/// readiness signal spelled `{"type": "ready"}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeEvent {
    /// Peer document finished booting and attached its listeners.
    Ready,
    /// Bare address of the signer the Portal wants granted on the wallet.
    DelegatedSigner(String),
    /// The DApp's wallet address, acknowledging a successful grant.
    Wallet(String),
    /// Message the DApp needs signed by the Portal's signer.
    MessageToSign(String),
    /// Signature produced by the Portal's signer.
    Signature(String),
}

impl BridgeEvent {
    /// Declared name of this event.
    #[inline]
    pub const fn name(&self) -> &'static str {
        match self {
            BridgeEvent::Ready => names::READY,
            BridgeEvent::DelegatedSigner(_) => names::DELEGATED_SIGNER,
            BridgeEvent::Wallet(_) => names::WALLET,
            BridgeEvent::MessageToSign(_) => names::MESSAGE_TO_SIGN,
            BridgeEvent::Signature(_) => names::SIGNATURE,
        }
    }

    /// Flat wire form.
    pub fn to_wire(&self) -> Value {
        match self {
            BridgeEvent::Ready => json!({ "type": "ready" }),
            BridgeEvent::DelegatedSigner(address) => json!({ "delegatedSigner": address }),
            BridgeEvent::Wallet(address) => json!({ "wallet": address }),
            BridgeEvent::MessageToSign(message) => json!({ "messageToSign": message }),
            BridgeEvent::Signature(signature) => json!({ "signature": signature }),
        }
    }

    /// Decode a validated envelope into the typed union.
    pub fn from_envelope(envelope: &Envelope) -> BridgeResult<Self> {
        match envelope.event {
            names::READY => Ok(BridgeEvent::Ready),
            names::DELEGATED_SIGNER => text_payload(envelope).map(BridgeEvent::DelegatedSigner),
            names::WALLET => text_payload(envelope).map(BridgeEvent::Wallet),
            names::MESSAGE_TO_SIGN => text_payload(envelope).map(BridgeEvent::MessageToSign),
            names::SIGNATURE => text_payload(envelope).map(BridgeEvent::Signature),
            other => Err(BridgeError::SchemaMismatch(format!(
                "no typed decoding for event '{other}'"
            ))),
        }
    }
}

impl Display for BridgeEvent {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

fn text_payload(envelope: &Envelope) -> BridgeResult<String> {
    envelope
        .payload
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| {
            BridgeError::SchemaMismatch(format!(
                "event '{}' payload is not a string",
                envelope.event
            ))
        })
}
