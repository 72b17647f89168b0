use thiserror::Error;

/// Engine-visible input condition. Never fatal; callers treat it as a no-op.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ReaderError {
    #[error("nothing to read")]
    NothingToRead,
}

/// Failures of the remote pacing / summary collaborator.
///
/// All of these are recovered locally: the reader reverts to heuristic pacing
/// or the original text and surfaces a notice.
#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("remote service not configured: {0}")]
    NotConfigured(&'static str),
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("HTTP {status}: {body}")]
    HttpStatus {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("{0}")]
    Service(String),
    #[error("malformed response: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("no pacing data returned")]
    EmptyResult,
    #[error("summary returned no text")]
    EmptySummary,
    #[error("request timed out after {0}ms")]
    Timeout(u64),
}

impl RemoteError {
    /// Short message suitable for a transient user notice.
    pub fn notice(&self) -> String {
        match self {
            RemoteError::HttpStatus { status, .. } if status.as_u16() == 429 => {
                "Rate limit exceeded. Please try again later.".to_string()
            }
            RemoteError::EmptySummary => "Summary returned no text.".to_string(),
            other => other.to_string(),
        }
    }
}

/// Attention tracking could not start. Playback keeps working without it.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CapabilityError {
    #[error("presence source unavailable: {0}")]
    Unavailable(String),
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    #[error("attention tracking already running")]
    AlreadyRunning,
}

/// A single detection call failed. The sampling loop treats it as a frame with
/// zero detections and keeps going.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("presence sample failed: {0}")]
pub struct SampleError(pub String);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limit_gets_friendly_notice() {
        let err = RemoteError::HttpStatus {
            status: reqwest::StatusCode::TOO_MANY_REQUESTS,
            body: "slow down".into(),
        };
        assert_eq!(err.notice(), "Rate limit exceeded. Please try again later.");
    }

    #[test]
    fn service_error_passes_message_through() {
        let err = RemoteError::Service("AI service error".into());
        assert_eq!(err.notice(), "AI service error");
    }
}
