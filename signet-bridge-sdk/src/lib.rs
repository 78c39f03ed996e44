//! Protocol core for the Signet Bridge: typed event schemas, origin-bound
//! transport channels, delivery-until-acknowledged sending, peer liveness
//! monitoring, and the connection session state machine, plus the narrow
//! collaborator traits (wallet, auth, window embedding) the role drivers are
//! wired with.

pub mod channel;
pub mod error;
pub mod event;
pub mod link;
pub mod liveness;
pub mod redelivery;
pub mod schema;
pub mod session;
pub mod wallet;
pub mod window;

pub use channel::{Channel, ChannelStats, ChannelStatsSnapshot};
pub use error::{BridgeError, BridgeResult, WalletError};
pub use event::{names, BridgeEvent, DAPP_TO_PORTAL, PORTAL_TO_DAPP};
pub use link::LinkDriver;
pub use liveness::PeerLiveness;
pub use redelivery::{send_until_acked, Redelivery};
pub use schema::{Envelope, EventSchema, FieldKind, FieldSpec, PayloadShape, SchemaSet, SchemaViolation};
pub use session::{ConnectionSession, MutationGuard, SessionPhase, SessionSnapshot};
pub use wallet::{
    wait_for_login, AuthSource, PreparedTransaction, TransactionApprover, WalletGateway,
};
pub use window::{InboundMessage, RemoteWindow, WindowContext, WindowEmbedder};
