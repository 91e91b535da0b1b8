//! Protocol Messages
//!
//! Wire format for client-server communication over WebSocket.
//! All messages are JSON; amounts that are secret travel as ciphertext
//! handles, native value as decimal strings.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::address::Address;
use crate::core::fhe::EncryptedInput;
use crate::core::handle::Handle;
use crate::host::events::Event;
use crate::host::runtime::{Query, QueryResult, Receipt, Transaction};

// =============================================================================
// CLIENT -> SERVER MESSAGES
// =============================================================================

/// Messages sent from client to server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Authenticate with the server.
    Auth(AuthRequest),

    /// Submit a state-changing transaction.
    Submit(SubmitRequest),

    /// Read-only query.
    Query {
        /// Echoed in the reply.
        #[serde(default)]
        request_id: Option<Uuid>,
        /// The query.
        query: Query,
    },

    /// Encrypt a value for one of the contracts (development gateway).
    Encrypt {
        /// Echoed in the reply.
        #[serde(default)]
        request_id: Option<Uuid>,
        /// Contract the input is bound to.
        target: Contract,
        /// Plaintext value.
        value: u64,
    },

    /// Decrypt a handle the caller holds a grant on.
    Decrypt {
        /// Echoed in the reply.
        #[serde(default)]
        request_id: Option<Uuid>,
        /// Ciphertext handle.
        handle: Handle,
    },

    /// Start receiving events that involve the caller.
    Subscribe,

    /// Stop receiving events.
    Unsubscribe,

    /// Ping for latency measurement.
    Ping {
        /// Client timestamp.
        timestamp: u64,
    },
}

/// Authentication request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthRequest {
    /// JWT (or `dev:<label>` in development mode).
    pub token: String,
    /// Client version for compatibility check.
    pub client_version: String,
}

/// Transaction submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitRequest {
    /// Echoed in the reply.
    #[serde(default)]
    pub request_id: Option<Uuid>,
    /// Native value attached, in wei.
    #[serde(default, with = "crate::host::u128_str")]
    pub value: u128,
    /// The transaction.
    pub tx: Transaction,
}

/// Deployed contracts a client can address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Contract {
    /// Token ledger (transfers).
    Ledger,
    /// Prize wheel (encrypted bets).
    Wheel,
}

// =============================================================================
// SERVER -> CLIENT MESSAGES
// =============================================================================

/// Messages sent from server to client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Authentication result.
    AuthResult(AuthResult),

    /// Transaction committed.
    Receipt {
        /// Request being answered.
        request_id: Option<Uuid>,
        /// Receipt.
        receipt: Receipt,
    },

    /// Query answer.
    QueryResult {
        /// Request being answered.
        request_id: Option<Uuid>,
        /// Answer.
        result: QueryResult,
    },

    /// Encrypted input ready for submission.
    Encrypted {
        /// Request being answered.
        request_id: Option<Uuid>,
        /// Ciphertext and proof.
        input: EncryptedInput,
    },

    /// Decryption result.
    Decrypted {
        /// Request being answered.
        request_id: Option<Uuid>,
        /// Handle that was opened.
        handle: Handle,
        /// Plaintext (booleans as 0/1).
        value: u64,
    },

    /// Event involving the subscriber.
    Event(Event),

    /// Pong response.
    Pong {
        /// Echoed client timestamp.
        timestamp: u64,
        /// Server time (Unix seconds).
        server_time: u64,
    },

    /// Error message.
    Error(ServerError),

    /// Server is shutting down.
    Shutdown {
        /// Why.
        reason: String,
    },
}

/// Authentication result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthResult {
    /// Whether auth succeeded.
    pub success: bool,
    /// Account the session acts as.
    pub address: Option<Address>,
    /// Error message if failed.
    pub error: Option<String>,
    /// Server version.
    pub server_version: String,
}

/// Server error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerError {
    /// Error code.
    pub code: ErrorCode,
    /// Stable reason identifier (e.g. `"PendingSpinExists"`).
    pub reason: String,
    /// Human-readable message.
    pub message: String,
    /// Request being answered, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<Uuid>,
}

/// Error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Authentication failed.
    AuthFailed,
    /// Not authenticated.
    NotAuthenticated,
    /// JWT token has expired.
    TokenExpired,
    /// Invalid JWT token (signature, format, claims).
    InvalidToken,
    /// Malformed message.
    InvalidMessage,
    /// Transaction aborted; nothing was applied.
    TransactionReverted,
    /// No grant on the requested handle.
    DecryptionDenied,
    /// Server overloaded.
    ServerOverloaded,
    /// Internal error.
    InternalError,
}

impl ServerError {
    /// Build an error reply.
    pub fn new(code: ErrorCode, reason: &str, message: impl Into<String>) -> Self {
        Self {
            code,
            reason: reason.to_string(),
            message: message.into(),
            request_id: None,
        }
    }

    /// Attach the request being answered.
    pub fn for_request(mut self, request_id: Option<Uuid>) -> Self {
        self.request_id = request_id;
        self
    }
}

// =============================================================================
// SERIALIZATION HELPERS
// =============================================================================

impl ClientMessage {
    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

impl ServerMessage {
    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}
