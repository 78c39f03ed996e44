use crate::error::{BridgeError, BridgeResult};
use chrono::{DateTime, Utc};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tracing::{debug, info};

/// Phases of a single connection attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionPhase {
    /// Channel opened, waiting for the peer readiness signal.
    Connecting,
    /// `ready` observed (initiator) or posted (acceptor).
    Ready,
    /// The delivery-until-acknowledged loop for the signer payload started.
    SignerSent,
    /// The peer's confirmation envelope arrived and validated.
    PeerAcknowledged,
    /// Required external mutation succeeded and was reported back.
    Completed,
    /// Peer closed, user cancelled, or a configured deadline elapsed.
    Abandoned,
}

impl SessionPhase {
    /// Return the stable string representation (kebab-case).
    #[inline]
    pub const fn as_str(&self) -> &'static str {
        match self {
            SessionPhase::Connecting => "connecting",
            SessionPhase::Ready => "ready",
            SessionPhase::SignerSent => "signer-sent",
            SessionPhase::PeerAcknowledged => "peer-acknowledged",
            SessionPhase::Completed => "completed",
            SessionPhase::Abandoned => "abandoned",
        }
    }

    /// Terminal phases admit no further transitions.
    #[inline]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, SessionPhase::Completed | SessionPhase::Abandoned)
    }

    /// Edge table: forward edges, `abandoned` from any non-terminal phase,
    /// and the single documented retry edge back to `ready` after a failed
    /// mutation.
    pub fn can_transition_to(&self, next: SessionPhase) -> bool {
        use SessionPhase::*;
        if self.is_terminal() {
            return false;
        }
        if next == Abandoned {
            return true;
        }
        matches!(
            (self, next),
            (Connecting, Ready)
                | (Ready, SignerSent)
                | (Ready, PeerAcknowledged)
                | (SignerSent, PeerAcknowledged)
                | (PeerAcknowledged, Completed)
                | (PeerAcknowledged, Ready)
        )
    }
}

impl Display for SessionPhase {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Serialize for SessionPhase {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for SessionPhase {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        match s.as_str() {
            "connecting" => Ok(SessionPhase::Connecting),
            "ready" => Ok(SessionPhase::Ready),
            "signer-sent" => Ok(SessionPhase::SignerSent),
            "peer-acknowledged" => Ok(SessionPhase::PeerAcknowledged),
            "completed" => Ok(SessionPhase::Completed),
            "abandoned" => Ok(SessionPhase::Abandoned),
            other => Err(de::Error::custom(format!("unknown session phase '{other}'"))),
        }
    }
}

/// Serializable view of a session for UI and log surfaces.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub attempt: u64,
    pub phase: SessionPhase,
    pub started_at: DateTime<Utc>,
    pub last_transition: DateTime<Utc>,
    pub mutation_in_flight: bool,
}

/// State machine for one connection attempt.
///
/// Every phase change flows through [`transition`](Self::transition), which
/// enforces the edge table and broadcasts over the driver's watch channel.
/// Requesting the phase the session is already in is accepted as a no-op so
/// duplicate-tolerant receivers stay simple. A new attempt gets a fresh
/// session; constructing it resets the shared watch to `connecting`.
pub struct ConnectionSession {
    attempt: u64,
    phase_tx: watch::Sender<SessionPhase>,
    in_flight: AtomicBool,
    started_at: DateTime<Utc>,
    last_transition: Mutex<DateTime<Utc>>,
}

impl ConnectionSession {
    pub fn new(attempt: u64, phase_tx: watch::Sender<SessionPhase>) -> Self {
        phase_tx.send_replace(SessionPhase::Connecting);
        let now = Utc::now();
        Self {
            attempt,
            phase_tx,
            in_flight: AtomicBool::new(false),
            started_at: now,
            last_transition: Mutex::new(now),
        }
    }

    #[inline]
    pub fn attempt(&self) -> u64 {
        self.attempt
    }

    #[inline]
    pub fn phase(&self) -> SessionPhase {
        *self.phase_tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionPhase> {
        self.phase_tx.subscribe()
    }

    /// Apply a transition. `Ok(true)` when applied, `Ok(false)` when the
    /// session already was in `next` (duplicate delivery), error when the
    /// edge is outside the table.
    pub fn transition(&self, next: SessionPhase) -> BridgeResult<bool> {
        let mut applied = false;
        let mut rejected: Option<SessionPhase> = None;
        self.phase_tx.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            if !current.can_transition_to(next) {
                rejected = Some(*current);
                return false;
            }
            applied = true;
            *current = next;
            true
        });

        if let Some(from) = rejected {
            return Err(BridgeError::InvalidTransition { from, to: next });
        }
        if applied {
            if let Ok(mut stamp) = self.last_transition.lock() {
                *stamp = Utc::now();
            }
            debug!(attempt = self.attempt, phase = %next, "session transition");
        }
        Ok(applied)
    }

    /// Move to `abandoned` from any non-terminal phase. Returns whether the
    /// session actually moved; a terminal session is left untouched, so a
    /// liveness event arriving after completion is harmless.
    pub fn abandon(&self) -> bool {
        let moved = matches!(self.transition(SessionPhase::Abandoned), Ok(true));
        if moved {
            info!(attempt = self.attempt, "session abandoned");
        }
        moved
    }

    /// Claim the single-mutation-at-a-time flag. Returns `None` while another
    /// mutation is in flight; the claim is released when the guard drops.
    ///
    /// This is deliberately a flag separate from the session phase: the phase
    /// update can lag the async wallet call, and duplicate deliveries landing
    /// in that gap must not start a second mutation.
    pub fn begin_mutation(self: &Arc<Self>) -> Option<MutationGuard> {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            Some(MutationGuard {
                session: Arc::clone(self),
            })
        } else {
            None
        }
    }

    #[inline]
    pub fn mutation_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            attempt: self.attempt,
            phase: self.phase(),
            started_at: self.started_at,
            last_transition: self
                .last_transition
                .lock()
                .map(|stamp| *stamp)
                .unwrap_or(self.started_at),
            mutation_in_flight: self.mutation_in_flight(),
        }
    }
}

/// RAII claim on the mutation in-flight flag.
pub struct MutationGuard {
    session: Arc<ConnectionSession>,
}

impl Drop for MutationGuard {
    fn drop(&mut self) {
        self.session.in_flight.store(false, Ordering::Release);
    }
}
