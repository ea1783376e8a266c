use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::ipc::error::err;
use crate::sheet::SortMode;

pub struct HandlerErr {
    pub code: &'static str,
    pub message: String,
    pub details: Option<serde_json::Value>,
}

impl HandlerErr {
    pub fn bad_params(message: impl Into<String>) -> HandlerErr {
        HandlerErr {
            code: "bad_params",
            message: message.into(),
            details: None,
        }
    }

    pub fn response(self, id: &str) -> serde_json::Value {
        err(id, self.code, self.message, self.details)
    }
}

pub fn required_str(params: &serde_json::Value, key: &str) -> Result<String, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| HandlerErr::bad_params(format!("missing {}", key)))
}

pub fn required_i64(params: &serde_json::Value, key: &str) -> Result<i64, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_i64())
        .ok_or_else(|| HandlerErr::bad_params(format!("missing {}", key)))
}

/// A key that is absent or null reads as `None`; anything else must
/// deserialize as a list of `T`.
pub fn optional_list<T: DeserializeOwned>(
    params: &serde_json::Value,
    key: &str,
) -> Result<Option<Vec<T>>, HandlerErr> {
    match params.get(key) {
        None => Ok(None),
        Some(v) if v.is_null() => Ok(None),
        Some(v) => serde_json::from_value(v.clone())
            .map(Some)
            .map_err(|e| HandlerErr::bad_params(format!("invalid {}: {}", key, e))),
    }
}

pub fn required_list<T: DeserializeOwned>(
    params: &serde_json::Value,
    key: &str,
) -> Result<Vec<T>, HandlerErr> {
    optional_list(params, key)?
        .ok_or_else(|| HandlerErr::bad_params(format!("missing {}", key)))
}

pub fn sort_mode(params: &serde_json::Value) -> Result<SortMode, HandlerErr> {
    match params.get("sortMode") {
        None => Ok(SortMode::default()),
        Some(v) if v.is_null() => Ok(SortMode::default()),
        Some(v) => serde_json::from_value(v.clone()).map_err(|_| {
            HandlerErr::bad_params("sortMode must be one of: entered, roll-asc, roll-desc")
        }),
    }
}

pub fn encode<T: Serialize>(value: &T) -> Result<serde_json::Value, HandlerErr> {
    serde_json::to_value(value).map_err(|e| HandlerErr {
        code: "encode_failed",
        message: e.to_string(),
        details: None,
    })
}
