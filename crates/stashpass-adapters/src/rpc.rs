//! Minimal JSON-RPC 2.0 client over HTTP.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use stashpass_core::StashError;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum RpcError {
    #[error("request to {url} failed: {message}")]
    Transport { url: String, message: String },

    #[error("HTTP {status} from {url}: {body}")]
    Status { url: String, status: u16, body: String },

    #[error("{method} returned error {code}: {message}")]
    Rpc {
        method: String,
        code: i64,
        message: String,
    },

    #[error("could not decode {method} response: {message}")]
    Decode { method: String, message: String },
}

impl From<RpcError> for StashError {
    fn from(err: RpcError) -> Self {
        match err {
            // Gateway and throttling statuses are as transient as a dropped connection.
            RpcError::Transport { .. } => StashError::Transport(err.to_string()),
            RpcError::Status { status, .. } if status == 429 || status >= 500 => {
                StashError::Transport(err.to_string())
            }
            other => StashError::Protocol(other.to_string()),
        }
    }
}

#[derive(Serialize)]
struct Request<'a, P> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: P,
}

#[derive(Deserialize)]
struct Response {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<ErrorBody>,
}

#[derive(Deserialize)]
struct ErrorBody {
    code: i64,
    message: String,
}

pub struct RpcClient {
    http: reqwest::Client,
    url: String,
    next_id: AtomicU64,
}

impl RpcClient {
    pub fn new(url: &str, timeout: Duration) -> Result<Self, RpcError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RpcError::Transport {
                url: url.to_string(),
                message: e.to_string(),
            })?;
        Ok(Self {
            http,
            url: url.trim_end_matches('/').to_string(),
            next_id: AtomicU64::new(1),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub async fn call<P: Serialize, R: DeserializeOwned>(
        &self,
        method: &str,
        params: P,
    ) -> Result<R, RpcError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        debug!(method, id, url = %self.url, "rpc call");

        let transport = |e: reqwest::Error| RpcError::Transport {
            url: self.url.clone(),
            message: e.to_string(),
        };
        let response = self
            .http
            .post(&self.url)
            .json(&Request {
                jsonrpc: "2.0",
                id,
                method,
                params,
            })
            .send()
            .await
            .map_err(transport)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RpcError::Status {
                url: self.url.clone(),
                status: status.as_u16(),
                body,
            });
        }

        let envelope: Response = response.json().await.map_err(|e| RpcError::Decode {
            method: method.to_string(),
            message: e.to_string(),
        })?;
        if let Some(error) = envelope.error {
            return Err(RpcError::Rpc {
                method: method.to_string(),
                code: error.code,
                message: error.message,
            });
        }
        serde_json::from_value(envelope.result.unwrap_or(Value::Null)).map_err(|e| {
            RpcError::Decode {
                method: method.to_string(),
                message: e.to_string(),
            }
        })
    }
}
