use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tracing::{debug, info, warn};

use signet_bridge_models::SignerRef;
use signet_bridge_sdk::{
    names, BridgeError, BridgeEvent, BridgeResult, Channel, ConnectionSession, Envelope,
    PreparedTransaction, SessionPhase, TransactionApprover, WalletError, WalletGateway,
};

/// Resources of one connection attempt on the accepting side.
pub struct DappAttempt {
    pub(crate) session: Arc<ConnectionSession>,
    pub(crate) channel: Arc<Channel>,
    wallet: Arc<dyn WalletGateway>,
    approver: Arc<dyn TransactionApprover>,
    chain: String,
    wallet_address: String,
    granted_signer: Mutex<Option<SignerRef>>,
    pending_tx: Mutex<Option<PreparedTransaction>>,
    applied_tx: Mutex<Option<String>>,
    approving: AtomicBool,
    last_error: Mutex<Option<String>>,
}

impl DappAttempt {
    pub(crate) fn new(
        session: Arc<ConnectionSession>,
        channel: Arc<Channel>,
        wallet: Arc<dyn WalletGateway>,
        approver: Arc<dyn TransactionApprover>,
        chain: String,
        wallet_address: String,
    ) -> Arc<Self> {
        Arc::new(Self {
            session,
            channel,
            wallet,
            approver,
            chain,
            wallet_address,
            granted_signer: Mutex::new(None),
            pending_tx: Mutex::new(None),
            applied_tx: Mutex::new(None),
            approving: AtomicBool::new(false),
            last_error: Mutex::new(None),
        })
    }

    /// Registers inbound handlers. Must run before the ready signal goes
    /// out so no delivery can race the listener.
    pub(crate) fn wire(self: &Arc<Self>) {
        let weak = Arc::downgrade(self);
        self.channel.on(names::DELEGATED_SIGNER, move |envelope| {
            if let Some(attempt) = weak.upgrade() {
                attempt.on_delegated_signer(envelope);
            }
        });

        let weak = Arc::downgrade(self);
        self.channel.on(names::SIGNATURE, move |envelope| {
            if let Some(attempt) = weak.upgrade() {
                attempt.on_signature(envelope);
            }
        });
    }

    fn on_delegated_signer(self: &Arc<Self>, envelope: &Envelope) {
        let Ok(BridgeEvent::DelegatedSigner(address)) = BridgeEvent::from_envelope(envelope)
        else {
            return;
        };
        let attempt = Arc::clone(self);
        tokio::spawn(async move {
            attempt.grant_signer(address).await;
        });
    }

    fn on_signature(self: &Arc<Self>, envelope: &Envelope) {
        let Ok(BridgeEvent::Signature(signature)) = BridgeEvent::from_envelope(envelope) else {
            return;
        };
        let attempt = Arc::clone(self);
        tokio::spawn(async move {
            attempt.apply_signature(signature).await;
        });
    }

    /// Validate the delivered signer, run the wallet mutation at most once,
    /// and confirm with this wallet's address. Re-deliveries while the
    /// mutation is in flight are dropped; re-deliveries after completion are
    /// re-acknowledged without touching the wallet.
    async fn grant_signer(self: Arc<Self>, address: String) {
        let signer = SignerRef::external_wallet(&address);

        if self.session.phase() == SessionPhase::Completed {
            debug!(%signer, "signer re-delivered after completion, re-acknowledging");
            let _ = self.confirm();
            return;
        }

        let Some(_guard) = self.session.begin_mutation() else {
            debug!(%signer, "grant already in flight, dropping re-delivery");
            return;
        };
        match self.session.transition(SessionPhase::PeerAcknowledged) {
            Ok(_) => {}
            Err(e) => {
                debug!(error = %e, "signer delivery ignored in current phase");
                return;
            }
        }

        let already = match self.wallet.list_delegated_signers().await {
            Ok(records) => records.iter().any(|record| record.signer == signer),
            Err(e) => {
                self.fail_grant(e);
                return;
            }
        };
        if already {
            info!(%signer, "signer already delegated, skipping the wallet call");
        } else {
            match self.wallet.add_delegated_signer(&signer, &self.chain).await {
                Ok(()) => info!(%signer, chain = %self.chain, "delegated signer granted"),
                Err(WalletError::AlreadyDelegated) => {
                    info!(%signer, "wallet reports the signer as already delegated");
                }
                Err(e) => {
                    self.fail_grant(e);
                    return;
                }
            }
        }

        if let Ok(mut slot) = self.granted_signer.lock() {
            *slot = Some(signer);
        }
        if let Err(e) = self.confirm() {
            warn!(error = %e, "grant confirmed locally but the peer is unreachable");
            return;
        }
        if let Err(e) = self.session.transition(SessionPhase::Completed) {
            debug!(error = %e, "completion transition rejected");
        }
    }

    fn confirm(&self) -> BridgeResult<()> {
        self.channel
            .send(&BridgeEvent::Wallet(self.wallet_address.clone()))
    }

    /// A failed mutation returns the session to ready; the peer keeps
    /// re-sending the signer, so the next delivery retries the grant.
    fn fail_grant(&self, error: WalletError) {
        warn!(error = %error, "delegated signer grant failed, returning to ready");
        if let Ok(mut slot) = self.last_error.lock() {
            *slot = Some(error.to_string());
        }
        if let Err(e) = self.session.transition(SessionPhase::Ready) {
            debug!(error = %e, "retry transition rejected");
        }
    }

    /// Prepare a transaction on the wallet and relay its message to the
    /// peer for signing.
    pub(crate) async fn request_signature(&self) -> BridgeResult<PreparedTransaction> {
        let signer = self
            .granted_signer
            .lock()
            .ok()
            .and_then(|slot| slot.clone())
            .ok_or_else(|| {
                BridgeError::MutationFailed(WalletError::Failed(
                    "no delegated signer granted yet".into(),
                ))
            })?;
        let prepared = self
            .approver
            .prepare_transaction(&signer)
            .await
            .map_err(BridgeError::MutationFailed)?;
        if let Ok(mut slot) = self.pending_tx.lock() {
            *slot = Some(prepared.clone());
        }
        if let Ok(mut slot) = self.applied_tx.lock() {
            *slot = None;
        }
        self.channel
            .send(&BridgeEvent::MessageToSign(prepared.message_to_sign.clone()))?;
        info!(transaction = %prepared.transaction_id, "signature requested from the peer");
        Ok(prepared)
    }

    /// Apply a relayed signature to the pending transaction exactly once.
    /// The peer re-sends the signature blindly, so every duplicate path
    /// lands here: after apply, without a pending transaction, or while an
    /// approval is still in flight.
    async fn apply_signature(self: Arc<Self>, signature: String) {
        if self.session.phase() != SessionPhase::Completed {
            debug!("ignoring signature before the grant completes");
            return;
        }
        if self
            .applied_tx
            .lock()
            .ok()
            .and_then(|slot| slot.clone())
            .is_some()
        {
            debug!("transaction already approved, dropping re-sent signature");
            return;
        }
        let Some(pending) = self.pending_tx.lock().ok().and_then(|slot| slot.clone()) else {
            debug!("no transaction awaiting a signature");
            return;
        };
        let Some(signer) = self.granted_signer.lock().ok().and_then(|slot| slot.clone()) else {
            debug!("no delegated signer recorded");
            return;
        };
        if self.approving.swap(true, Ordering::AcqRel) {
            debug!("approval already in flight, dropping re-sent signature");
            return;
        }

        match self
            .approver
            .approve_transaction(&pending.transaction_id, &signer, &signature)
            .await
        {
            Ok(hash) => {
                info!(transaction = %pending.transaction_id, %hash, "transaction approved");
                if let Ok(mut slot) = self.applied_tx.lock() {
                    *slot = Some(hash);
                }
                if let Ok(mut slot) = self.pending_tx.lock() {
                    *slot = None;
                }
            }
            Err(e) => {
                warn!(error = %e, "transaction approval failed");
                if let Ok(mut slot) = self.last_error.lock() {
                    *slot = Some(e.to_string());
                }
            }
        }
        self.approving.store(false, Ordering::Release);
    }

    pub(crate) fn teardown(&self) {
        self.channel.close();
    }

    pub fn granted_signer(&self) -> Option<SignerRef> {
        self.granted_signer.lock().ok().and_then(|slot| slot.clone())
    }

    /// Hash of the approved transaction, once a signature has been applied.
    pub fn transaction_hash(&self) -> Option<String> {
        self.applied_tx.lock().ok().and_then(|slot| slot.clone())
    }

    pub fn last_error(&self) -> Option<String> {
        self.last_error.lock().ok().and_then(|slot| slot.clone())
    }
}
