//! Network Layer
//!
//! WebSocket front end for the runtime. This layer is **non-deterministic**:
//! wall-clock time, connection order and token validation live here, while
//! every state change still goes through `host::runtime`.

pub mod auth;
pub mod protocol;
pub mod server;

pub use auth::{authenticate, validate_token, AuthConfig, AuthError, TokenClaims};
pub use protocol::{ClientMessage, Contract, ErrorCode, ServerError, ServerMessage};
pub use server::{ServerConfig, SharedRuntime, WheelServer, WheelServerError};
