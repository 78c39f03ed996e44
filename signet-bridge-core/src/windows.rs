use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::debug;

use signet_bridge_models::{EmbedMode, Origin};
use signet_bridge_sdk::{
    BridgeError, BridgeResult, InboundMessage, RemoteWindow, WindowContext, WindowEmbedder,
};

/// In-memory stand-in for the browser's window runtime: named windows with
/// origin-stamped delivery, opener backlinks, and target-origin restricted
/// posting.
pub struct WindowSystem {
    cells: DashMap<String, Arc<WindowCell>>,
}

impl WindowSystem {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            cells: DashMap::new(),
        })
    }

    /// Create the named window. An existing window under the same name is
    /// closed and replaced, like navigating a reused window name.
    pub fn create_window(&self, name: &str, origin: Origin) -> Arc<WindowCell> {
        let cell = WindowCell::new(name, origin);
        if let Some(previous) = self.cells.insert(name.to_string(), Arc::clone(&cell)) {
            previous.close_window();
        }
        debug!(window = name, origin = %cell.origin, "window created");
        cell
    }

    pub fn window(&self, name: &str) -> Option<Arc<WindowCell>> {
        self.cells.get(name).map(|entry| Arc::clone(entry.value()))
    }
}

/// One window: an origin, a replaceable message listener, and an optional
/// opener backlink.
pub struct WindowCell {
    name: String,
    origin: Origin,
    inbox_tx: Mutex<mpsc::UnboundedSender<InboundMessage>>,
    opener: Mutex<Option<Arc<dyn RemoteWindow>>>,
    closed: AtomicBool,
}

impl WindowCell {
    fn new(name: &str, origin: Origin) -> Arc<Self> {
        // No listener until the first take_inbox; deliveries before that
        // are lost, exactly like posting before a listener attaches.
        let (inbox_tx, _) = mpsc::unbounded_channel();
        Arc::new(Self {
            name: name.to_string(),
            origin,
            inbox_tx: Mutex::new(inbox_tx),
            opener: Mutex::new(None),
            closed: AtomicBool::new(false),
        })
    }

    /// Handle onto this window for a document at `holder_origin`; posts
    /// through it arrive stamped with that origin.
    pub fn lease(self: &Arc<Self>, holder_origin: Origin) -> Arc<WindowLease> {
        Arc::new(WindowLease {
            target: Arc::clone(self),
            holder_origin,
        })
    }

    pub fn set_opener(&self, opener: Arc<dyn RemoteWindow>) {
        if let Ok(mut slot) = self.opener.lock() {
            *slot = Some(opener);
        }
    }

    /// The user closes the window; listeners stop receiving.
    pub fn close_window(&self) {
        self.closed.store(true, Ordering::Release);
    }

    pub fn is_window_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn deliver(&self, from: Origin, data: Value) {
        if self.is_window_closed() {
            return;
        }
        if let Ok(tx) = self.inbox_tx.lock() {
            let _ = tx.send(InboundMessage { origin: from, data });
        }
    }
}

impl WindowContext for WindowCell {
    fn origin(&self) -> Origin {
        self.origin.clone()
    }

    fn take_inbox(&self) -> Option<mpsc::UnboundedReceiver<InboundMessage>> {
        if self.is_window_closed() {
            return None;
        }
        let (tx, rx) = mpsc::unbounded_channel();
        match self.inbox_tx.lock() {
            Ok(mut slot) => *slot = tx,
            Err(_) => return None,
        }
        Some(rx)
    }

    fn opener(&self) -> Option<Arc<dyn RemoteWindow>> {
        self.opener.lock().ok().and_then(|slot| slot.clone())
    }
}

impl fmt::Debug for WindowCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WindowCell")
            .field("name", &self.name)
            .field("origin", &self.origin)
            .field("closed", &self.is_window_closed())
            .finish_non_exhaustive()
    }
}

/// A document's handle to a foreign window.
#[derive(Debug)]
pub struct WindowLease {
    target: Arc<WindowCell>,
    holder_origin: Origin,
}

impl RemoteWindow for WindowLease {
    fn post(&self, data: Value, target_origin: &Origin) -> BridgeResult<()> {
        if self.target.is_window_closed() {
            return Ok(());
        }
        if *target_origin != self.target.origin {
            debug!(
                restricted_to = %target_origin,
                actual = %self.target.origin,
                "delivery withheld by target origin restriction"
            );
            return Ok(());
        }
        self.target.deliver(self.holder_origin.clone(), data);
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.target.is_window_closed()
    }

    fn close(&self) {
        self.target.close_window();
    }
}

/// Embedder that loads partner documents into the in-memory window system.
pub struct InMemoryEmbedder {
    system: Arc<WindowSystem>,
    opener: Arc<WindowCell>,
    popups_blocked: AtomicBool,
}

impl InMemoryEmbedder {
    pub fn new(system: Arc<WindowSystem>, opener: Arc<WindowCell>) -> Arc<Self> {
        Arc::new(Self {
            system,
            opener,
            popups_blocked: AtomicBool::new(false),
        })
    }

    /// Refuse subsequent popup opens, like a popup blocker would.
    pub fn block_popups(&self) {
        self.popups_blocked.store(true, Ordering::Release);
    }
}

impl WindowEmbedder for InMemoryEmbedder {
    fn open_partner(
        &self,
        url: &str,
        name: &str,
        mode: EmbedMode,
        features: &str,
    ) -> BridgeResult<Arc<dyn RemoteWindow>> {
        if mode == EmbedMode::Popup && self.popups_blocked.load(Ordering::Acquire) {
            return Err(BridgeError::WindowUnavailable(
                "popup blocked by the runtime".into(),
            ));
        }
        let origin =
            Origin::parse(url).map_err(|e| BridgeError::ConfigurationError(e.to_string()))?;
        let cell = self.system.create_window(name, origin);
        cell.set_opener(self.opener.lease(cell.origin.clone()));
        debug!(window = name, %url, ?mode, features, "partner window opened");
        Ok(cell.lease(self.opener.origin.clone()))
    }
}
