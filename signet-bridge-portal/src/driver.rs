use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwapOption;
use async_trait::async_trait;
use tokio::sync::watch;
use tracing::{info, warn};

use signet_bridge_models::constants::PARTNER_WINDOW_NAME;
use signet_bridge_models::{EmbedMode, Origin, Settings};
use signet_bridge_sdk::{
    wait_for_login, AuthSource, BridgeError, BridgeResult, Channel, ChannelStatsSnapshot,
    ConnectionSession, LinkDriver, SessionPhase, SessionSnapshot, WalletGateway, WindowContext,
    WindowEmbedder, DAPP_TO_PORTAL, PORTAL_TO_DAPP,
};

use crate::attempt::PortalAttempt;

/// Everything the portal side is wired with at construction.
pub struct PortalContext {
    pub settings: Settings,
    pub window: Arc<dyn WindowContext>,
    pub embedder: Arc<dyn WindowEmbedder>,
    pub wallet: Arc<dyn WalletGateway>,
    pub auth: Arc<dyn AuthSource>,
}

/// Initiating side of the bridge. Opens the partner window, waits for its
/// ready signal, re-sends the delegated signer until confirmed, and serves
/// signature requests afterwards.
pub struct PortalDriver {
    settings: Settings,
    partner_origin: Origin,
    window: Arc<dyn WindowContext>,
    embedder: Arc<dyn WindowEmbedder>,
    wallet: Arc<dyn WalletGateway>,
    auth: Arc<dyn AuthSource>,
    phase_tx: watch::Sender<SessionPhase>,
    attempt_seq: AtomicU64,
    active: ArcSwapOption<PortalAttempt>,
}

impl PortalDriver {
    /// Validates the configured partner URL up front; no IO happens until
    /// [`LinkDriver::start`].
    pub fn with_context(ctx: PortalContext) -> BridgeResult<Self> {
        let partner_origin = ctx
            .settings
            .portal
            .partner_origin()
            .map_err(|e| BridgeError::ConfigurationError(e.to_string()))?;
        let (phase_tx, _) = watch::channel(SessionPhase::Connecting);
        Ok(Self {
            settings: ctx.settings,
            partner_origin,
            window: ctx.window,
            embedder: ctx.embedder,
            wallet: ctx.wallet,
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

    fn spawn_deadlines(&self, attempt: &Arc<PortalAttempt>) {
        if let Some(limit) = self.settings.session.connect_timeout() {
            Self::spawn_deadline(attempt, limit, |phase| phase == SessionPhase::Connecting);
        }
        if let Some(limit) = self.settings.session.overall_timeout() {
            Self::spawn_deadline(attempt, limit, |phase| !phase.is_terminal());
        }
    }

    fn spawn_deadline(
        attempt: &Arc<PortalAttempt>,
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

    /// Wallet address the peer reported, once the grant is acknowledged.
    pub fn peer_wallet(&self) -> Option<String> {
        self.active.load_full().and_then(|a| a.peer_wallet())
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
impl LinkDriver for PortalDriver {
    async fn start(&self) -> BridgeResult<()> {
        // A new attempt discards the previous session entirely.
        self.discard_active();
        wait_for_login(self.auth.as_ref()).await?;

        let signer_address = self
            .wallet
            .address()
            .await
            .map_err(BridgeError::MutationFailed)?;

        let portal = &self.settings.portal;
        let remote = self.embedder.open_partner(
            &portal.dapp_url,
            PARTNER_WINDOW_NAME,
            portal.embed,
            &portal.popup_features,
        )?;

        let channel = Channel::open(
            self.window.as_ref(),
            Arc::clone(&remote),
            self.partner_origin.clone(),
            DAPP_TO_PORTAL,
            PORTAL_TO_DAPP,
        )?;

        let attempt_no = self.attempt_seq.fetch_add(1, Ordering::Relaxed) + 1;
        let session = Arc::new(ConnectionSession::new(attempt_no, self.phase_tx.clone()));
        let attempt = PortalAttempt::new(
            session,
            channel,
            remote,
            Arc::clone(&self.wallet),
            signer_address,
            self.settings.redelivery.clone(),
        );
        attempt.wire();
        if portal.embed == EmbedMode::Popup {
            attempt.watch_peer(self.settings.liveness.clone());
        }
        self.spawn_deadlines(&attempt);

        info!(
            attempt = attempt_no,
            peer = %attempt.channel.peer_origin(),
            mode = ?portal.embed,
            "portal connection attempt started"
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
