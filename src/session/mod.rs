//! Chat platform client session.
//!
//! # Data Flow
//! ```text
//! SessionConfig (token, API base, retry count)
//!     → client.rs (authenticated REST with retries)
//!     → gateway.rs (frame types used by the client loop service)
//!     → types.rs (guilds, messages, errors)
//! ```
//!
//! # Security Constraints
//! - The token only ever leaves the process in the Authorization header
//!   and the gateway IDENTIFY frame; it is never logged

pub mod client;
pub mod gateway;
pub mod types;

pub use client::Session;
pub use gateway::GatewayPayload;
pub use types::{Guild, MessageCreate, SessionError, SessionResult};
