use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwapOption;
use async_trait::async_trait;
use tokio::sync::watch;
use tracing::{info, warn};

use signet_bridge_models::{Origin, Settings, SignerRef};
use signet_bridge_sdk::{
    wait_for_login, AuthSource, BridgeError, BridgeEvent, BridgeResult, Channel,
    ChannelStatsSnapshot, ConnectionSession, LinkDriver, PreparedTransaction, SessionPhase,
    SessionSnapshot, TransactionApprover, WalletGateway, WindowContext, DAPP_TO_PORTAL,
    PORTAL_TO_DAPP,
};

use crate::attempt::DappAttempt;

/// Everything the dapp side is wired with at construction.
pub struct DappContext {
    pub settings: Settings,
    pub window: Arc<dyn WindowContext>,
    pub wallet: Arc<dyn WalletGateway>,
    pub approver: Arc<dyn TransactionApprover>,
    pub auth: Arc<dyn AuthSource>,
}

/// Accepting side of the bridge. Connects back through its opener window,
/// announces readiness, grants the delivered signer on its wallet exactly
/// once, and later relays transactions to that signer for signing.
pub struct DappDriver {
    settings: Settings,
    partner_origin: Origin,
    window: Arc<dyn WindowContext>,
    wallet: Arc<dyn WalletGateway>,
    approver: Arc<dyn TransactionApprover>,
    auth: Arc<dyn AuthSource>,
    phase_tx: watch::Sender<SessionPhase>,
    attempt_seq: AtomicU64,
    active: ArcSwapOption<DappAttempt>,
}

impl std::fmt::Debug for DappDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DappDriver")
            .field("partner_origin", &self.partner_origin)
            .field("attempt_seq", &self.attempt_seq)
            .finish_non_exhaustive()
    }
}

impl DappDriver {
    /// Validates the configured partner URL up front; no IO happens until
    /// [`LinkDriver::start`].
    pub fn with_context(ctx: DappContext) -> BridgeResult<Self> {
        let partner_origin = ctx
            .settings
            .dapp
            .partner_origin()
            .map_err(|e| BridgeError::ConfigurationError(e.to_string()))?;
        let (phase_tx, _) = watch::channel(SessionPhase::Connecting);
        Ok(Self {
            settings: ctx.settings,
            partner_origin,
            window: ctx.window,
            wallet: ctx.wallet,
            approver: ctx.approver,
            auth: ctx.auth,
            phase_tx,
            attempt_seq: AtomicU64::new(0),
            active: ArcSwapOption::empty(),
        })
    }

    fn discard_active(&self) {
        if let Some(previous) = self.active.swap(None) {
            if !previous.session.phase().is_terminal() {
                previous.session.abandon();
            }
            previous.teardown();
        }
    }

    fn spawn_deadlines(&self, attempt: &Arc<DappAttempt>) {
        if let Some(limit) = self.settings.session.connect_timeout() {
            Self::spawn_deadline(attempt, limit, |phase| phase == SessionPhase::Connecting);
        }
        if let Some(limit) = self.settings.session.overall_timeout() {
            Self::spawn_deadline(attempt, limit, |phase| !phase.is_terminal());
        }
    }

    fn spawn_deadline(
        attempt: &Arc<DappAttempt>,
        limit: Duration,
        still_pending: fn(SessionPhase) -> bool,
    ) {
        let weak = Arc::downgrade(attempt);
        tokio::spawn(async move {
            tokio::time::sleep(limit).await;
            let Some(attempt) = weak.upgrade() else {
                return;
            };
            let phase = attempt.session.phase();
            if still_pending(phase) {
                warn!(%phase, elapsed = ?limit, "deadline elapsed, abandoning session");
                attempt.session.abandon();
                attempt.teardown();
            }
        });
    }

    /// Prepare a transaction for the granted signer and ask the peer to
    /// sign its message.
    pub async fn request_signature(&self) -> BridgeResult<PreparedTransaction> {
        let attempt = self.active.load_full().ok_or(BridgeError::ChannelClosed)?;
        attempt.request_signature().await
    }

    /// Signer granted in the current attempt, once acknowledged.
    pub fn granted_signer(&self) -> Option<SignerRef> {
        self.active.load_full().and_then(|a| a.granted_signer())
    }

    /// Hash of the transaction approved with the relayed signature.
    pub fn transaction_hash(&self) -> Option<String> {
        self.active.load_full().and_then(|a| a.transaction_hash())
    }

    /// Last wallet failure surfaced to the user, if any.
    pub fn last_error(&self) -> Option<String> {
        self.active.load_full().and_then(|a| a.last_error())
    }

    /// Counters of the active attempt's channel.
    pub fn channel_stats(&self) -> Option<ChannelStatsSnapshot> {
        self.active.load_full().map(|a| a.channel.stats())
    }
}

#[async_trait]
impl LinkDriver for DappDriver {
    async fn start(&self) -> BridgeResult<()> {
        // A new attempt discards the previous session entirely.
        self.discard_active();
        wait_for_login(self.auth.as_ref()).await?;

        let wallet_address = self
            .wallet
            .address()
            .await
            .map_err(BridgeError::MutationFailed)?;

        let opener = self.window.opener().ok_or_else(|| {
            BridgeError::WindowUnavailable("no opener window to connect back to".into())
        })?;
        let channel = Channel::open(
            self.window.as_ref(),
            opener,
            self.partner_origin.clone(),
            PORTAL_TO_DAPP,
            DAPP_TO_PORTAL,
        )?;

        let attempt_no = self.attempt_seq.fetch_add(1, Ordering::Relaxed) + 1;
        let session = Arc::new(ConnectionSession::new(attempt_no, self.phase_tx.clone()));
        let attempt = DappAttempt::new(
            session,
            channel,
            Arc::clone(&self.wallet),
            Arc::clone(&self.approver),
            self.settings.chain.id.clone(),
            wallet_address,
        );

        // Listeners attach before the ready signal goes out; the signer can
        // arrive the moment the peer hears it.
        attempt.wire();
        self.spawn_deadlines(&attempt);
        attempt.channel.send(&BridgeEvent::Ready)?;
        attempt.session.transition(SessionPhase::Ready)?;

        info!(
            attempt = attempt_no,
            peer = %attempt.channel.peer_origin(),
            "dapp announced ready to its opener"
        );
        self.active.store(Some(attempt));
        Ok(())
    }

    fn subscribe_phase(&self) -> watch::Receiver<SessionPhase> {
        self.phase_tx.subscribe()
    }

    async fn cancel(&self) -> BridgeResult<()> {
        if let Some(attempt) = self.active.load_full() {
            info!(attempt = attempt.session.attempt(), "cancelling connection attempt");
            attempt.session.abandon();
            attempt.teardown();
        }
        Ok(())
    }

    fn snapshot(&self) -> Option<SessionSnapshot> {
        self.active.load_full().map(|a| a.session.snapshot())
    }
}
