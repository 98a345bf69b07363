//! Transport seam between the resolver and the external CRM RPC surface.
//!
//! The resolver never talks HTTP itself. It submits a mapping of named
//! commands and receives a mapping of named result buckets back through
//! [`BatchPort`], which keeps the core testable against scripted transports
//! and keeps serialization details (webhook URLs, envelopes, auth) in the
//! `innkeeper-rest` crate.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

/// Ordered mapping from a locally unique command key to a command string.
///
/// Ordering matters for reproducible dispatch and for debug command
/// previews; keys are zero-padded by [`crate::batch::CommandSeq`] so that
/// lexicographic order equals generation order.
pub type BatchCommands = BTreeMap<String, String>;

/// Result buckets keyed by the submitted command keys.
///
/// A missing key or an empty row list both mean "no match" for that command.
pub type BatchResults = HashMap<String, Vec<Value>>;

/// Upstream failure taxonomy as seen through the transport.
#[derive(Clone, thiserror::Error, Debug)]
pub enum TransportError {
    /// The request never produced a usable HTTP response.
    #[error("transport error: {message}")]
    Http { message: String },

    /// The upstream answered with a non-success status.
    #[error("upstream status {code}: {message}")]
    Status { code: u16, message: String },

    /// The response body could not be decoded into the expected envelope.
    #[error("failed to decode upstream payload: {message}")]
    Decode { message: String },

    /// The per-request deadline elapsed before the call completed.
    #[error("deadline exceeded while calling upstream")]
    DeadlineExceeded,
}

/// Async port over the external batched RPC surface.
///
/// Implementations must be cheap to share (`Send + Sync`); the resolver
/// holds one behind an `Arc` for the lifetime of the service.
#[async_trait]
pub trait BatchPort: Send + Sync {
    /// Executes a single named RPC method with JSON parameters.
    async fn call(&self, method: &str, params: Value) -> Result<Value, TransportError>;

    /// Executes one command batch of at most
    /// [`MAX_BATCH_COMMANDS`](crate::batch::MAX_BATCH_COMMANDS) commands and
    /// returns the per-key result buckets.
    async fn call_batch(&self, commands: &BatchCommands)
    -> Result<BatchResults, TransportError>;
}

/// Normalizes one raw result bucket into a row list.
///
/// The upstream is loosely typed: a bucket may be an array of rows or a bare
/// object standing in for a one-element array. Anything else (null, scalars)
/// reads as "no match". This is the single place where that coercion
/// happens.
pub fn coerce_rows(value: Value) -> Vec<Value> {
    match value {
        Value::Array(rows) => rows,
        Value::Object(_) => vec![value],
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn arrays_pass_through() {
        let rows = coerce_rows(json!([{"ID": "1"}, {"ID": "2"}]));
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn bare_object_becomes_single_row() {
        let rows = coerce_rows(json!({"ID": "1"}));
        assert_eq!(rows, vec![json!({"ID": "1"})]);
    }

    #[test]
    fn scalars_and_null_read_as_no_match() {
        assert!(coerce_rows(Value::Null).is_empty());
        assert!(coerce_rows(json!("7")).is_empty());
        assert!(coerce_rows(json!(7)).is_empty());
    }
}
