//! User Data Stream Wire Types
//!
//! Envelopes exchanged on the user data stream connection.
//!
//! # Outbound
//! ```json
//! {"id": 1, "method": "REQUEST", "params": ["<listenKey>@balance"]}
//! ```
//!
//! # Inbound
//! ```json
//! {"id": 1, "result": [{"req": "<listenKey>@balance", "res": {...}}]}
//! {"error": {"code": -1121, "msg": "Invalid symbol."}}
//! {"e": "ACCOUNT_UPDATE", ...}
//! ```

use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;

/// Method name for snapshot queries.
pub const METHOD_REQUEST: &str = "REQUEST";

/// Kind of snapshot a `REQUEST` asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestKind {
    /// Open positions.
    Position,
    /// Asset balances.
    Balance,
    /// Account permissions and fee tier.
    Account,
}

impl RequestKind {
    /// Suffix appended to the listen key to form the subscription key.
    #[must_use]
    pub const fn suffix(self) -> &'static str {
        match self {
            Self::Position => "@position",
            Self::Balance => "@balance",
            Self::Account => "@account",
        }
    }

    /// Label used in logs and metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Position => "position",
            Self::Balance => "balance",
            Self::Account => "account",
        }
    }

    /// Build the subscription key for a listen key.
    #[must_use]
    pub fn subscription_key(self, listen_key: &str) -> String {
        format!("{listen_key}{}", self.suffix())
    }
}

/// Outbound request envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamRequest {
    /// Correlation ID.
    pub id: u64,
    /// Method name.
    pub method: String,
    /// Subscription keys.
    pub params: Vec<String>,
}

impl StreamRequest {
    /// Build a `REQUEST` envelope for a snapshot kind.
    #[must_use]
    pub fn snapshot(id: u64, kind: RequestKind, listen_key: &str) -> Self {
        Self {
            id,
            method: METHOD_REQUEST.to_string(),
            params: vec![kind.subscription_key(listen_key)],
        }
    }
}

/// Inbound response envelope.
#[derive(Debug, Deserialize)]
pub struct StreamResponse {
    /// Correlation ID echoed from the request.
    pub id: u64,
    /// Result elements; only the first one is consumed.
    #[serde(default)]
    pub result: Option<Vec<StreamResult>>,
}

/// One element of a response's `result` array.
#[derive(Debug, Clone, Deserialize)]
pub struct StreamResult {
    /// Subscription key the result answers.
    #[serde(default)]
    pub req: String,
    /// Opaque payload, decoded by the request's callback.
    pub res: Box<RawValue>,
}

/// Inbound error envelope payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RemoteError {
    /// Error code.
    #[serde(default)]
    pub code: i64,
    /// Error message.
    #[serde(default)]
    pub msg: String,
}
