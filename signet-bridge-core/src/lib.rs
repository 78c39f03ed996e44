//! In-memory runtime for running both bridge pages in one process: a window
//! system with origin-stamped message delivery, a deterministic wallet and
//! transaction approver, a watchable auth source, structured logging, and a
//! harness that wires a portal and a dapp together for demos and end-to-end
//! tests.

pub mod auth;
pub mod harness;
pub mod logger;
pub mod wallet;
pub mod windows;

pub use auth::MemoryAuth;
pub use harness::{
    wait_for_phase, BridgeHarness, DAPP_WALLET_ADDRESS, PORTAL_SIGNER_ADDRESS, PORTAL_WINDOW_NAME,
};
pub use logger::Logger;
pub use wallet::MemoryWallet;
pub use windows::{InMemoryEmbedder, WindowCell, WindowLease, WindowSystem};
