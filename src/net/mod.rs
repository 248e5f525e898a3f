//! The wire protocol: JSON envelopes over WebSocket, a handshake-gated
//! per-connection session, a broadcast registry, and request/response
//! correlation with TTL cleanup.

pub mod callbacks;
pub mod codes;
pub mod registry;
pub mod server;
pub mod session;
pub mod version;
pub mod wire;

pub use callbacks::CallbackRegistry;
pub use codes::ActionCode;
pub use registry::ConnectionRegistry;
pub use session::{ProtocolSession, RoutedRequest, SessionOutput};
pub use version::Compatibility;
