use crate::error::{BridgeError, BridgeResult};
use crate::event::BridgeEvent;
use crate::schema::{Envelope, SchemaSet};
use crate::window::{InboundMessage, RemoteWindow, WindowContext};
use signet_bridge_models::Origin;
use arc_swap::ArcSwapOption;
use dashmap::DashMap;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

type Handler = dyn Fn(&Envelope) + Send + Sync;

/// Counters kept by a channel for diagnostics.
#[derive(Debug, Default)]
pub struct ChannelStats {
    sent: AtomicU64,
    delivered: AtomicU64,
    origin_rejected: AtomicU64,
    schema_rejected: AtomicU64,
}

/// Point-in-time copy of [`ChannelStats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ChannelStatsSnapshot {
    pub sent: u64,
    pub delivered: u64,
    pub origin_rejected: u64,
    pub schema_rejected: u64,
}

impl ChannelStats {
    pub fn snapshot(&self) -> ChannelStatsSnapshot {
        ChannelStatsSnapshot {
            sent: self.sent.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            origin_rejected: self.origin_rejected.load(Ordering::Relaxed),
            schema_rejected: self.schema_rejected.load(Ordering::Relaxed),
        }
    }
}

/// Sized cell for the remote handle: arc-swap stores a thin pointer, so the
/// unsized trait object cannot go in the `ArcSwapOption` directly.
struct RemoteSlot(Arc<dyn RemoteWindow>);

/// Origin-bound messaging relationship with one peer window.
///
/// Inbound messages pass two gates in order: the origin gate (sender origin
/// must equal the bound expected origin, regardless of payload) and the
/// schema gate (payload must classify against the inbound schema set). Only
/// then are handlers dispatched, each at most once per envelope, in
/// registration order. The channel exclusively owns the remote handle;
/// `close` releases it and synchronously stops accepting messages.
pub struct Channel {
    remote: ArcSwapOption<RemoteSlot>,
    expected_origin: Origin,
    outbound: SchemaSet,
    handlers: Arc<DashMap<&'static str, Vec<Arc<Handler>>>>,
    stats: Arc<ChannelStats>,
    cancel: CancellationToken,
}

impl Channel {
    /// Bind a channel: take the local window's inbox, keep the remote handle,
    /// and start the dispatch pump.
    pub fn open(
        local: &dyn WindowContext,
        remote: Arc<dyn RemoteWindow>,
        expected_origin: Origin,
        inbound: SchemaSet,
        outbound: SchemaSet,
    ) -> BridgeResult<Arc<Self>> {
        let inbox = local.take_inbox().ok_or_else(|| {
            BridgeError::WindowUnavailable("window no longer accepts listeners".to_string())
        })?;

        let channel = Arc::new(Self {
            remote: ArcSwapOption::from(Some(Arc::new(RemoteSlot(remote)))),
            expected_origin: expected_origin.clone(),
            outbound,
            handlers: Arc::new(DashMap::new()),
            stats: Arc::new(ChannelStats::default()),
            cancel: CancellationToken::new(),
        });

        channel.spawn_pump(inbox, inbound);
        debug!(peer = %expected_origin, "channel opened");
        Ok(channel)
    }

    fn spawn_pump(&self, mut inbox: mpsc::UnboundedReceiver<InboundMessage>, inbound: SchemaSet) {
        let expected = self.expected_origin.clone();
        let handlers = Arc::clone(&self.handlers);
        let stats = Arc::clone(&self.stats);
        let cancel = self.cancel.clone();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    received = inbox.recv() => {
                        let Some(message) = received else { break };

                        if message.origin != expected {
                            stats.origin_rejected.fetch_add(1, Ordering::Relaxed);
                            warn!(
                                expected = %expected,
                                actual = %message.origin,
                                "dropping message from unexpected origin"
                            );
                            continue;
                        }

                        let envelope = match inbound.classify(&message.data) {
                            Ok(envelope) => envelope,
                            Err(violation) => {
                                stats.schema_rejected.fetch_add(1, Ordering::Relaxed);
                                warn!(%violation, "dropping message that failed schema validation");
                                continue;
                            }
                        };

                        stats.delivered.fetch_add(1, Ordering::Relaxed);
                        let targets: Vec<Arc<Handler>> = handlers
                            .get(envelope.event)
                            .map(|entry| entry.clone())
                            .unwrap_or_default();
                        debug!(event = envelope.event, handlers = targets.len(), "dispatching envelope");
                        for handler in targets {
                            handler(&envelope);
                        }
                    }
                }
            }
        });
    }

    /// Serialize `event` into its flat wire form and post it, restricted to
    /// the bound expected origin (never a wildcard). After `close`, sends
    /// report `ChannelClosed` and have no effect.
    pub fn send(&self, event: &BridgeEvent) -> BridgeResult<()> {
        let Some(remote) = self.remote.load_full() else {
            debug!(event = event.name(), "send on closed channel is a no-op");
            return Err(BridgeError::ChannelClosed);
        };
        if !self.outbound.contains(event.name()) {
            return Err(BridgeError::SchemaMismatch(format!(
                "event '{}' is not declared for direction {}",
                event.name(),
                self.outbound.direction()
            )));
        }
        self.stats.sent.fetch_add(1, Ordering::Relaxed);
        remote.0.post(event.to_wire(), &self.expected_origin)
    }

    /// Register a handler for one event name. Handlers for the same event
    /// run in registration order, at most once per validated envelope.
    pub fn on(&self, event: &'static str, handler: impl Fn(&Envelope) + Send + Sync + 'static) {
        self.handlers.entry(event).or_default().push(Arc::new(handler));
    }

    /// Unregister all listeners, stop the pump, and release the remote
    /// window handle. Idempotent.
    pub fn close(&self) {
        let released = self.remote.swap(None);
        if released.is_none() {
            return;
        }
        self.cancel.cancel();
        self.handlers.clear();
        debug!(
            peer = %self.expected_origin,
            stats = ?self.stats.snapshot(),
            "channel closed"
        );
    }

    #[inline]
    pub fn is_closed(&self) -> bool {
        self.remote.load().is_none()
    }

    /// Origin this channel accepts from and posts toward.
    #[inline]
    pub fn peer_origin(&self) -> &Origin {
        &self.expected_origin
    }

    pub fn stats(&self) -> ChannelStatsSnapshot {
        self.stats.snapshot()
    }
}

impl Drop for Channel {
    fn drop(&mut self) {
        self.close();
    }
}
