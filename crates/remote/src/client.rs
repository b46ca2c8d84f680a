//! HTTP executor client.

use std::time::Duration;

use log::info;
use sheetwire_client::{ExecuteFuture, ExecutorError, GridExecutor, Request, Response};
use sheetwire_config::RemoteSettings;
use sheetwire_protocol::PROTOCOL_VERSION;

/// Header carrying the wire protocol version on every request.
pub const PROTOCOL_HEADER: &str = "x-sheetwire-protocol";

/// Grid executor reached over HTTP.
#[derive(Clone)]
pub struct HttpExecutor {
    http: reqwest::blocking::Client,
    endpoint: String,
    token: String,
}

impl HttpExecutor {
    pub fn new(settings: &RemoteSettings) -> Result<Self, ExecutorError> {
        let http = reqwest::blocking::Client::builder()
            .user_agent(format!("sheetwire/{}", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(|e| ExecutorError::Transport(e.to_string()))?;

        let endpoint = settings.endpoint.trim_end_matches('/').to_string();
        info!("remote grid executor at {}", endpoint);

        Ok(Self {
            http,
            endpoint,
            token: settings.token.clone(),
        })
    }

    /// Perform one request, blocking the calling thread.
    pub fn execute_blocking(&self, request: &Request) -> Result<Response, ExecutorError> {
        let url = format!("{}/execute", self.endpoint);
        let mut builder = self
            .http
            .post(&url)
            .header(PROTOCOL_HEADER, PROTOCOL_VERSION.to_string())
            .json(request);
        if !self.token.is_empty() {
            builder = builder.bearer_auth(&self.token);
        }

        let response = builder
            .send()
            .map_err(|e| ExecutorError::Transport(e.to_string()))?;

        let status = response.status().as_u16();
        if !response.status().is_success() {
            let body = response.text().unwrap_or_default();
            return Err(ExecutorError::Remote { status, message: error_message(&body) });
        }

        let body = response
            .text()
            .map_err(|e| ExecutorError::Transport(e.to_string()))?;
        serde_json::from_str(&body).map_err(|e| ExecutorError::Decode(e.to_string()))
    }
}

impl GridExecutor for HttpExecutor {
    fn execute(&self, request: Request) -> ExecuteFuture {
        let this = self.clone();
        Box::pin(smol::unblock(move || this.execute_blocking(&request)))
    }
}

/// Pull a readable message out of an error body.
///
/// Accepts `{"error": "..."}`, `{"error": {"message": "..."}}` and
/// `{"message": "..."}`; anything else is returned as-is.
fn error_message(body: &str) -> String {
    if let Ok(json) = serde_json::from_str::<serde_json::Value>(body) {
        let message = json["error"]
            .as_str()
            .or_else(|| json["error"]["message"].as_str())
            .or_else(|| json["message"].as_str());
        if let Some(message) = message {
            return message.to_string();
        }
    }
    body.trim().to_string()
}
