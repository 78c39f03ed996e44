use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwapOption;
use tokio::sync::watch;
use tracing::info;

use signet_bridge_dapp::{DappContext, DappDriver};
use signet_bridge_models::constants::PARTNER_WINDOW_NAME;
use signet_bridge_models::{AuthStatus, Settings};
use signet_bridge_portal::{PortalContext, PortalDriver};
use signet_bridge_sdk::{BridgeError, BridgeResult, LinkDriver, SessionPhase};

use crate::auth::MemoryAuth;
use crate::wallet::MemoryWallet;
use crate::windows::{InMemoryEmbedder, WindowCell, WindowSystem};

/// Name the harness registers the portal's own window under.
pub const PORTAL_WINDOW_NAME: &str = "portal";
/// Address of the signer held by the portal's wallet.
pub const PORTAL_SIGNER_ADDRESS: &str = "0x1111111111111111111111111111111111111111";
/// Address of the dapp's wallet, reported back on a successful grant.
pub const DAPP_WALLET_ADDRESS: &str = "0x2222222222222222222222222222222222222222";

/// Both pages of the bridge wired into one in-memory window runtime.
///
/// The portal side is built eagerly; the dapp side can only exist once the
/// portal has opened the partner window, so it is built by `start_dapp`.
pub struct BridgeHarness {
    settings: Settings,
    windows: Arc<WindowSystem>,
    embedder: Arc<InMemoryEmbedder>,
    portal_wallet: Arc<MemoryWallet>,
    dapp_wallet: Arc<MemoryWallet>,
    portal_auth: Arc<MemoryAuth>,
    dapp_auth: Arc<MemoryAuth>,
    portal: Arc<PortalDriver>,
    dapp: ArcSwapOption<DappDriver>,
}

impl BridgeHarness {
    pub fn build(settings: Settings) -> BridgeResult<Self> {
        let windows = WindowSystem::new();
        let portal_origin = settings
            .dapp
            .partner_origin()
            .map_err(|e| BridgeError::ConfigurationError(e.to_string()))?;
        let portal_window = windows.create_window(PORTAL_WINDOW_NAME, portal_origin);
        let embedder = InMemoryEmbedder::new(Arc::clone(&windows), Arc::clone(&portal_window));
        let portal_wallet = MemoryWallet::new(PORTAL_SIGNER_ADDRESS, &settings.chain.id);
        let dapp_wallet = MemoryWallet::new(DAPP_WALLET_ADDRESS, &settings.chain.id);
        let portal_auth = MemoryAuth::new(AuthStatus::LoggedIn);
        let dapp_auth = MemoryAuth::new(AuthStatus::LoggedIn);

        let portal = Arc::new(PortalDriver::with_context(PortalContext {
            settings: settings.clone(),
            window: portal_window,
            embedder: embedder.clone(),
            wallet: portal_wallet.clone(),
            auth: portal_auth.clone(),
        })?);

        Ok(Self {
            settings,
            windows,
            embedder,
            portal_wallet,
            dapp_wallet,
            portal_auth,
            dapp_auth,
            portal,
            dapp: ArcSwapOption::empty(),
        })
    }

    /// Start the portal, then load and start the dapp in the window it
    /// opened.
    pub async fn launch(&self) -> BridgeResult<Arc<DappDriver>> {
        self.start_portal().await?;
        self.start_dapp().await
    }

    /// Start only the portal. The partner window exists afterwards but
    /// stays silent until `start_dapp` brings its page up.
    pub async fn start_portal(&self) -> BridgeResult<()> {
        self.portal.start().await
    }

    /// Build and start the dapp inside the opened partner window.
    pub async fn start_dapp(&self) -> BridgeResult<Arc<DappDriver>> {
        let window = self.windows.window(PARTNER_WINDOW_NAME).ok_or_else(|| {
            BridgeError::WindowUnavailable("partner window was never opened".into())
        })?;
        let dapp = Arc::new(DappDriver::with_context(DappContext {
            settings: self.settings.clone(),
            window,
            wallet: self.dapp_wallet.clone(),
            approver: self.dapp_wallet.clone(),
            auth: self.dapp_auth.clone(),
        })?);
        dapp.start().await?;
        info!("both pages are up");
        self.dapp.store(Some(Arc::clone(&dapp)));
        Ok(dapp)
    }

    pub fn portal(&self) -> &Arc<PortalDriver> {
        &self.portal
    }

    pub fn dapp(&self) -> Option<Arc<DappDriver>> {
        self.dapp.load_full()
    }

    pub fn windows(&self) -> &Arc<WindowSystem> {
        &self.windows
    }

    /// The partner window cell, once the portal has opened it.
    pub fn partner_window(&self) -> Option<Arc<WindowCell>> {
        self.windows.window(PARTNER_WINDOW_NAME)
    }

    pub fn portal_window(&self) -> Option<Arc<WindowCell>> {
        self.windows.window(PORTAL_WINDOW_NAME)
    }

    pub fn embedder(&self) -> &Arc<InMemoryEmbedder> {
        &self.embedder
    }

    pub fn portal_wallet(&self) -> &Arc<MemoryWallet> {
        &self.portal_wallet
    }

    pub fn dapp_wallet(&self) -> &Arc<MemoryWallet> {
        &self.dapp_wallet
    }

    pub fn portal_auth(&self) -> &Arc<MemoryAuth> {
        &self.portal_auth
    }

    pub fn dapp_auth(&self) -> &Arc<MemoryAuth> {
        &self.dapp_auth
    }
}

/// Wait until `rx` reports `target`, bounded by `limit`.
pub async fn wait_for_phase(
    mut rx: watch::Receiver<SessionPhase>,
    target: SessionPhase,
    limit: Duration,
) -> BridgeResult<()> {
    let wait = async {
        loop {
            if *rx.borrow_and_update() == target {
                return Ok(());
            }
            if rx.changed().await.is_err() {
                return Err(BridgeError::ChannelClosed);
            }
        }
    };
    tokio::time::timeout(limit, wait)
        .await
        .map_err(|_| BridgeError::Timeout(limit))?
}
