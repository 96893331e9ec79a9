//! Request/response envelope over the cache engine.
//!
//! Maps textual operation verbs onto engine calls and wraps the outcome in a
//! success/error envelope. This is the boundary callers speak through when
//! the cache sits behind a wire protocol; the engine itself never sees
//! envelopes.
//!
//! ## Contract
//!
//! - Accepted verbs: `Create`, `Read`, `Update`, `Delete`, plus their legacy
//!   all-uppercase spellings. Anything else yields
//!   `{ Success: false, Error: "Invalid operation" }`.
//! - An engine call that returns `false`/`None` without raising yields
//!   `Success: false` with no `Error`.
//! - A panic crossing this boundary is caught and surfaced as
//!   `Success: false` with the panic message in `Error`.
//! - The payload type is [`serde_json::Value`]: `Null` is a storable value,
//!   distinguishable from "key missing" only through the create/update
//!   return flags.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::engine::FreqCache;
use crate::error::CacheError;

/// One cache operation as received from a caller.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Request {
    pub operation: String,
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub value: Option<Value>,
    #[serde(default)]
    pub expiration_seconds: Option<u64>,
}

/// Outcome envelope returned for every request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Response {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Response {
    fn flag(success: bool) -> Self {
        Self {
            success,
            value: None,
            error: None,
        }
    }

    fn with_value(value: Value) -> Self {
        Self {
            success: true,
            value: Some(value),
            error: None,
        }
    }

    fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            value: None,
            error: Some(message.into()),
        }
    }
}

/// Stateless dispatcher from [`Request`] envelopes to engine calls.
#[derive(Debug)]
pub struct RequestProcessor {
    cache: Arc<FreqCache<Value>>,
}

impl RequestProcessor {
    pub fn new(cache: Arc<FreqCache<Value>>) -> Self {
        Self { cache }
    }

    /// Executes one request. Never panics; any panic below this frame is
    /// converted into an error response.
    pub fn handle(&self, request: &Request) -> Response {
        match catch_unwind(AssertUnwindSafe(|| self.dispatch(request))) {
            Ok(response) => response,
            Err(payload) => Response::error(panic_message(&payload)),
        }
    }

    fn dispatch(&self, request: &Request) -> Response {
        // A missing key is indistinguishable from an empty one: both fail
        // the engine's key validation.
        let key = request.key.as_deref().unwrap_or("");
        match request.operation.as_str() {
            "Create" | "CREATE" => {
                let value = request.value.clone().unwrap_or(Value::Null);
                Response::flag(self.cache.create(key, value, request.expiration_seconds))
            }
            "Read" | "READ" => match self.cache.read(key) {
                Some(value) => Response::with_value((*value).clone()),
                None => Response::flag(false),
            },
            "Update" | "UPDATE" => {
                let value = request.value.clone().unwrap_or(Value::Null);
                Response::flag(self.cache.update(key, value, request.expiration_seconds))
            }
            "Delete" | "DELETE" => Response::flag(self.cache.delete(key)),
            verb => Response::error(
                CacheError::InvalidOperation {
                    verb: verb.to_string(),
                }
                .to_string(),
            ),
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unexpected panic".to_string()
    }
}
