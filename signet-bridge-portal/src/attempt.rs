use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tracing::{debug, info, warn};

use signet_bridge_models::{LivenessPolicy, RedeliveryPolicy};
use signet_bridge_sdk::{
    names, BridgeError, BridgeEvent, Channel, ConnectionSession, Envelope, PeerLiveness,
    Redelivery, RemoteWindow, SessionPhase, WalletGateway,
};

/// Resources of one connection attempt. A new attempt replaces the whole
/// struct; nothing survives across attempts except the phase watch.
pub struct PortalAttempt {
    pub(crate) session: Arc<ConnectionSession>,
    pub(crate) channel: Arc<Channel>,
    pub(crate) remote: Arc<dyn RemoteWindow>,
    wallet: Arc<dyn WalletGateway>,
    signer_address: String,
    redelivery: RedeliveryPolicy,
    signer_redelivery: Mutex<Option<Redelivery>>,
    signature_redelivery: Mutex<Option<Redelivery>>,
    liveness: Mutex<Option<PeerLiveness>>,
    signing: AtomicBool,
    peer_wallet: Mutex<Option<String>>,
    last_error: Mutex<Option<String>>,
}

impl PortalAttempt {
    pub(crate) fn new(
        session: Arc<ConnectionSession>,
        channel: Arc<Channel>,
        remote: Arc<dyn RemoteWindow>,
        wallet: Arc<dyn WalletGateway>,
        signer_address: String,
        redelivery: RedeliveryPolicy,
    ) -> Arc<Self> {
        Arc::new(Self {
            session,
            channel,
            remote,
            wallet,
            signer_address,
            redelivery,
            signer_redelivery: Mutex::new(None),
            signature_redelivery: Mutex::new(None),
            liveness: Mutex::new(None),
            signing: AtomicBool::new(false),
            peer_wallet: Mutex::new(None),
            last_error: Mutex::new(None),
        })
    }

    /// Registers the inbound handlers on the channel. Handlers hold weak
    /// references so a discarded attempt cannot be kept alive by its own
    /// channel.
    pub(crate) fn wire(self: &Arc<Self>) {
        let weak = Arc::downgrade(self);
        self.channel.on(names::READY, move |_| {
            if let Some(attempt) = weak.upgrade() {
                attempt.on_ready();
            }
        });

        let weak = Arc::downgrade(self);
        self.channel.on(names::WALLET, move |envelope| {
            if let Some(attempt) = weak.upgrade() {
                attempt.on_wallet(envelope);
            }
        });

        let weak = Arc::downgrade(self);
        self.channel.on(names::MESSAGE_TO_SIGN, move |envelope| {
            if let Some(attempt) = weak.upgrade() {
                attempt.on_message_to_sign(envelope);
            }
        });
    }

    /// Starts polling the partner window. Only meaningful for popups; an
    /// embedded iframe shares the page lifecycle and never "closes" on
    /// its own.
    pub(crate) fn watch_peer(self: &Arc<Self>, policy: LivenessPolicy) {
        let weak = Arc::downgrade(self);
        let monitor = PeerLiveness::watch(Arc::clone(&self.remote), policy, move || {
            if let Some(attempt) = weak.upgrade() {
                warn!(
                    attempt = attempt.session.attempt(),
                    "partner window closed, abandoning session"
                );
                if let Ok(mut slot) = attempt.last_error.lock() {
                    *slot = Some(BridgeError::PeerAbandoned.to_string());
                }
                attempt.session.abandon();
                attempt.teardown();
            }
        });
        if let Ok(mut slot) = self.liveness.lock() {
            *slot = Some(monitor);
        }
    }

    /// The peer signalled it is listening. Advance to ready and start
    /// re-sending the delegated signer until the peer confirms it.
    fn on_ready(self: &Arc<Self>) {
        match self.session.transition(SessionPhase::Ready) {
            Ok(true) => {}
            Ok(false) => return,
            Err(e) => {
                debug!(error = %e, "ignoring ready signal");
                return;
            }
        }
        info!(attempt = self.session.attempt(), "peer is listening");

        let ack_session = Arc::clone(&self.session);
        let handle = signet_bridge_sdk::send_until_acked(
            Arc::clone(&self.channel),
            BridgeEvent::DelegatedSigner(self.signer_address.clone()),
            self.redelivery.clone(),
            move || {
                matches!(
                    ack_session.phase(),
                    SessionPhase::PeerAcknowledged | SessionPhase::Completed
                )
            },
        );
        if let Ok(mut slot) = self.signer_redelivery.lock() {
            *slot = Some(handle);
        }
        if let Err(e) = self.session.transition(SessionPhase::SignerSent) {
            debug!(error = %e, "signer-sent transition rejected");
        }
    }

    /// The peer confirmed the grant and reported its wallet address. The
    /// portal has no mutation of its own to run, so acknowledgement
    /// completes the session in one step.
    fn on_wallet(self: &Arc<Self>, envelope: &Envelope) {
        let Ok(BridgeEvent::Wallet(address)) = BridgeEvent::from_envelope(envelope) else {
            return;
        };
        match self.session.transition(SessionPhase::PeerAcknowledged) {
            Ok(true) => {}
            Ok(false) => return,
            Err(e) => {
                debug!(error = %e, "ignoring wallet confirmation");
                return;
            }
        }
        if let Ok(mut slot) = self.peer_wallet.lock() {
            *slot = Some(address.clone());
        }
        info!(
            attempt = self.session.attempt(),
            wallet = %address,
            "peer acknowledged the delegated signer"
        );
        if let Err(e) = self.session.transition(SessionPhase::Completed) {
            debug!(error = %e, "completion transition rejected");
        }
    }

    /// The peer asked for a signature over a prepared message. Signing is
    /// only served once the grant exchange has completed, and one request
    /// at a time.
    fn on_message_to_sign(self: &Arc<Self>, envelope: &Envelope) {
        let Ok(BridgeEvent::MessageToSign(message)) = BridgeEvent::from_envelope(envelope) else {
            return;
        };
        if self.session.phase() != SessionPhase::Completed {
            debug!("ignoring signature request before the grant completes");
            return;
        }
        if self.signing.swap(true, Ordering::AcqRel) {
            debug!("signature request already in flight, dropping duplicate");
            return;
        }
        let attempt = Arc::clone(self);
        tokio::spawn(async move {
            attempt.sign_and_relay(message).await;
            attempt.signing.store(false, Ordering::Release);
        });
    }

    async fn sign_and_relay(self: &Arc<Self>, message: String) {
        // A newer request supersedes any signature still being re-sent.
        if let Ok(mut slot) = self.signature_redelivery.lock() {
            if let Some(previous) = slot.take() {
                previous.stop();
            }
        }
        match self.wallet.sign_message(message.as_bytes()).await {
            Ok(signature) => {
                info!(attempt = self.session.attempt(), "message signed, relaying signature");
                // The signature exchange carries no acknowledgement; the
                // loop runs until the channel closes or the policy bound
                // is reached.
                let handle = signet_bridge_sdk::send_until_acked(
                    Arc::clone(&self.channel),
                    BridgeEvent::Signature(signature),
                    self.redelivery.clone(),
                    || false,
                );
                if let Ok(mut slot) = self.signature_redelivery.lock() {
                    *slot = Some(handle);
                }
            }
            Err(e) => {
                warn!(error = %e, "wallet declined to sign");
                if let Ok(mut slot) = self.last_error.lock() {
                    *slot = Some(e.to_string());
                }
            }
        }
    }

    /// Stops every timer and closes the channel. Safe to call more than
    /// once; everything here is idempotent.
    pub(crate) fn teardown(&self) {
        if let Ok(mut slot) = self.signer_redelivery.lock() {
            if let Some(handle) = slot.take() {
                handle.stop();
            }
        }
        if let Ok(mut slot) = self.signature_redelivery.lock() {
            if let Some(handle) = slot.take() {
                handle.stop();
            }
        }
        if let Ok(mut slot) = self.liveness.lock() {
            if let Some(monitor) = slot.take() {
                monitor.stop();
            }
        }
        self.channel.close();
    }

    /// Wallet address the peer reported, once acknowledged.
    pub fn peer_wallet(&self) -> Option<String> {
        self.peer_wallet.lock().ok().and_then(|slot| slot.clone())
    }

    pub fn last_error(&self) -> Option<String> {
        self.last_error.lock().ok().and_then(|slot| slot.clone())
    }
}
