use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{de::DeserializeOwned, Serialize};

use crate::error::RemoteError;

use super::types::{Envelope, SummaryPayload};
use super::{PacedChunk, PacingRequest, Summary, SummaryRequest};

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_warn};

const DEFAULT_TIMEOUT_MS: u64 = 30_000;
const PACER_PATH: &str = "smart-pacer";
const SUMMARY_PATH: &str = "smart-summary";

/// The AI collaborator behind the smart pacer and summary features.
#[async_trait]
pub trait AiService: Send + Sync {
    async fn analyze_pacing(
        &self,
        request: &PacingRequest,
    ) -> Result<Vec<PacedChunk>, RemoteError>;

    async fn summarize(&self, request: &SummaryRequest) -> Result<Summary, RemoteError>;
}

#[derive(Debug, Clone)]
pub struct RemoteConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub timeout: Duration,
}

impl RemoteConfig {
    /// Reads `SWIFTREAD_API_URL`, `SWIFTREAD_API_KEY` and
    /// `SWIFTREAD_API_TIMEOUT_MS`.
    pub fn from_env() -> Result<Self, RemoteError> {
        let base_url = env_string("SWIFTREAD_API_URL")
            .ok_or(RemoteError::NotConfigured("SWIFTREAD_API_URL"))?;
        let timeout_ms = env_string("SWIFTREAD_API_TIMEOUT_MS")
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_TIMEOUT_MS);

        Ok(Self {
            base_url: base_url.trim().trim_end_matches('/').to_string(),
            api_key: env_string("SWIFTREAD_API_KEY"),
            timeout: Duration::from_millis(timeout_ms),
        })
    }
}

#[derive(Clone)]
pub struct HttpAiClient {
    config: RemoteConfig,
    client: reqwest::Client,
}

impl HttpAiClient {
    pub fn new(config: RemoteConfig) -> Result<Self, RemoteError> {
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self { config, client })
    }

    pub fn from_env() -> Result<Self, RemoteError> {
        Self::new(RemoteConfig::from_env()?)
    }

    async fn post<B, T>(&self, path: &str, body: &B) -> Result<T, RemoteError>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        let url = format!("{}/{path}", self.config.base_url);
        let mut request = self.client.post(&url).json(body);
        if let Some(key) = self.config.api_key.as_deref() {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|err| self.map_transport(err))?;
        let status = response.status();
        let text = response.text().await.map_err(|err| self.map_transport(err))?;
        log_debug!("POST {url} -> {status}");

        decode_envelope(status, &text).inspect_err(|err| {
            log_warn!("{path} request failed: {err}");
        })
    }

    fn map_transport(&self, err: reqwest::Error) -> RemoteError {
        if err.is_timeout() {
            let ms = u64::try_from(self.config.timeout.as_millis()).unwrap_or(u64::MAX);
            RemoteError::Timeout(ms)
        } else {
            RemoteError::Request(err)
        }
    }
}

#[async_trait]
impl AiService for HttpAiClient {
    async fn analyze_pacing(
        &self,
        request: &PacingRequest,
    ) -> Result<Vec<PacedChunk>, RemoteError> {
        let chunks: Vec<PacedChunk> = self.post(PACER_PATH, request).await?;
        let chunks: Vec<PacedChunk> = chunks
            .into_iter()
            .filter(|c| !c.chunk.trim().is_empty())
            .collect();
        if chunks.is_empty() {
            return Err(RemoteError::EmptyResult);
        }
        Ok(chunks)
    }

    async fn summarize(&self, request: &SummaryRequest) -> Result<Summary, RemoteError> {
        let payload: SummaryPayload = self.post(SUMMARY_PATH, request).await?;
        let summary = Summary::from(payload);
        if summary.text.is_empty() {
            return Err(RemoteError::EmptySummary);
        }
        Ok(summary)
    }
}

/// Maps a service response to its `result`, or to the most specific error
/// the body allows.
fn decode_envelope<T: DeserializeOwned>(status: StatusCode, body: &str) -> Result<T, RemoteError> {
    if !status.is_success() {
        if status != StatusCode::TOO_MANY_REQUESTS {
            if let Ok(Envelope::<serde_json::Value> { error: Some(message), .. }) =
                serde_json::from_str(body)
            {
                return Err(RemoteError::Service(message));
            }
        }
        return Err(RemoteError::HttpStatus {
            status,
            body: body.chars().take(200).collect(),
        });
    }

    let envelope: Envelope<T> = serde_json::from_str(body)?;
    if let Some(message) = envelope.error {
        return Err(RemoteError::Service(message));
    }
    envelope.result.ok_or(RemoteError::EmptyResult)
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_is_built_with_configured_timeout() {
        let client = HttpAiClient::new(RemoteConfig {
            base_url: "http://localhost:9".into(),
            api_key: None,
            timeout: Duration::from_millis(1500),
        })
        .unwrap();
        assert_eq!(client.config.timeout, Duration::from_millis(1500));
    }

    #[test]
    fn decodes_pacing_result() {
        let chunks: Vec<PacedChunk> = decode_envelope(
            StatusCode::OK,
            r#"{"result":[{"chunk":"brown fox","multiplier":0.8}]}"#,
        )
        .unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].multiplier, 0.8);
    }

    #[test]
    fn rate_limit_keeps_status() {
        let err = decode_envelope::<Vec<PacedChunk>>(
            StatusCode::TOO_MANY_REQUESTS,
            r#"{"error":"Rate limit exceeded. Please try again later."}"#,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            RemoteError::HttpStatus { status, .. } if status == StatusCode::TOO_MANY_REQUESTS
        ));
        assert_eq!(err.notice(), "Rate limit exceeded. Please try again later.");
    }

    #[test]
    fn server_error_message_is_surfaced() {
        let err = decode_envelope::<Vec<PacedChunk>>(
            StatusCode::INTERNAL_SERVER_ERROR,
            r#"{"error":"AI service error"}"#,
        )
        .unwrap_err();
        assert!(matches!(err, RemoteError::Service(ref m) if m == "AI service error"));
    }

    #[test]
    fn malformed_body_is_an_error() {
        let err = decode_envelope::<Vec<PacedChunk>>(StatusCode::OK, "<html>").unwrap_err();
        assert!(matches!(err, RemoteError::Malformed(_)));

        let err = decode_envelope::<Vec<PacedChunk>>(StatusCode::OK, "{}").unwrap_err();
        assert!(matches!(err, RemoteError::EmptyResult));
    }

    #[test]
    fn non_json_failure_body_is_truncated() {
        let body = "x".repeat(500);
        let err = decode_envelope::<Vec<PacedChunk>>(StatusCode::BAD_GATEWAY, &body).unwrap_err();
        match err {
            RemoteError::HttpStatus { body, .. } => assert_eq!(body.len(), 200),
            other => panic!("unexpected error {other:?}"),
        }
    }
}
