//! Credentials produced by a completed browser login

use serde::{Deserialize, Serialize};

/// Validated output of a browser login.
///
/// Ownership passes to the caller; persisting the API key (keychain, config
/// file) is the caller's responsibility.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    /// API key authorizing requests against the Caravel API
    pub api_key: String,

    /// Organization the key is scoped to (empty when the callback omitted it)
    pub org_id: String,

    /// Human-readable organization name (empty when the callback omitted it)
    pub org_name: String,
}
