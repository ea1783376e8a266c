use std::collections::HashMap;

use serde::Deserialize;

use crate::sessions::SessionLedger;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

/// Cross-request state: one session ledger per course id. Everything else
/// arrives in request params and is recomputed on every call.
#[derive(Default)]
pub struct AppState {
    pub ledgers: HashMap<String, SessionLedger>,
}
