//! reqwest-backed implementation of the batch RPC port.

use async_trait::async_trait;
use innkeeper::port::{BatchCommands, BatchPort, BatchResults, TransportError, coerce_rows};
use serde_json::{Value, json};
use std::time::Duration;

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP transport speaking the CRM webhook dialect.
///
/// A webhook base URL embeds the credential, so no separate auth flow is
/// needed; every method is a POST of JSON parameters to
/// `{base}/{method}.json`.
#[derive(Clone)]
pub struct RestPort {
    base_url: String,
    client: reqwest::Client,
}

impl RestPort {
    /// Creates a port targeting the given webhook base URL with the default
    /// 30 s per-call timeout.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_timeout(base_url, DEFAULT_REQUEST_TIMEOUT)
    }

    /// Creates a port with an explicit per-call timeout.
    #[must_use]
    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            base_url: base_url.into(),
            client,
        }
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/{method}.json", self.base_url.trim_end_matches('/'))
    }

    async fn post(&self, method: &str, payload: &Value) -> Result<Value, TransportError> {
        let response = self
            .client
            .post(self.method_url(method))
            .json(payload)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    TransportError::DeadlineExceeded
                } else {
                    TransportError::Http {
                        message: format!("{method} request failed: {e}"),
                    }
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::Status {
                code: status.as_u16(),
                message: upstream_message(&body),
            });
        }

        response.json::<Value>().await.map_err(|e| TransportError::Decode {
            message: format!("invalid {method} response body: {e}"),
        })
    }
}

#[async_trait]
impl BatchPort for RestPort {
    async fn call(&self, method: &str, params: Value) -> Result<Value, TransportError> {
        let body = self.post(method, &params).await?;
        Ok(body.get("result").cloned().unwrap_or(Value::Null))
    }

    async fn call_batch(
        &self,
        commands: &BatchCommands,
    ) -> Result<BatchResults, TransportError> {
        let cmd: serde_json::Map<String, Value> = commands
            .iter()
            .map(|(key, command)| (key.clone(), Value::String(command.clone())))
            .collect();
        // halt: 0 keeps the batch running past individual command errors,
        // mirroring the degraded-continue policy of the resolver itself.
        let body = self.post("batch", &json!({"halt": 0, "cmd": cmd})).await?;
        unwrap_batch_envelope(body)
    }
}

/// Unwraps the nested batch envelope into per-key row buckets.
///
/// The upstream shape is `{"result": {"result": {key: rows}, "result_error":
/// {key: error}}}`. Keys listed under `result_error` are logged and left
/// absent, which reads as "no match" downstream.
fn unwrap_batch_envelope(body: Value) -> Result<BatchResults, TransportError> {
    let Some(outer) = body.get("result") else {
        return Err(TransportError::Decode {
            message: "batch response is missing the result envelope".to_string(),
        });
    };

    if let Some(Value::Object(errors)) = outer.get("result_error") {
        for (key, error) in errors {
            tracing::warn!(key = %key, error = %error, "batch command failed upstream");
        }
    }

    let mut out = BatchResults::new();
    if let Some(Value::Object(buckets)) = outer.get("result") {
        for (key, bucket) in buckets {
            out.insert(key.clone(), coerce_rows(bucket.clone()));
        }
    }
    Ok(out)
}

/// Pulls a human-readable message out of an error body, falling back to the
/// raw text.
fn upstream_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|value| {
            value
                .get("error_description")
                .or_else(|| value.get("error"))
                .and_then(|v| v.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.chars().take(256).collect())
}
