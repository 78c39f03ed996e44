//! DApp role driver.
//!
//! The dapp runs in the partner window opened by the portal. It connects
//! back through its opener, announces readiness, and waits for the
//! delegated signer; the grant runs on its wallet exactly once, however
//! many times the signer is delivered. Afterwards it can relay transaction
//! messages to the portal for signing.

pub mod attempt;
pub mod driver;

pub use attempt::DappAttempt;
pub use driver::{DappContext, DappDriver};
