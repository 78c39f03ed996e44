//! Portal role driver.
//!
//! The portal holds the wallet signer. It opens the partner document in a
//! popup or iframe, waits for the peer's ready signal, re-sends the
//! delegated signer address until the peer confirms, and afterwards signs
//! any message the peer relays over the same channel.

pub mod attempt;
pub mod driver;

pub use attempt::PortalAttempt;
pub use driver::{PortalContext, PortalDriver};
