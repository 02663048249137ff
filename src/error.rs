//! Error taxonomy for the fetch → publish pipeline.
//!
//! None of these are meant to escape a sync worker. Each operation returns them
//! so the caller can tell "nothing this cycle, try later" apart from problems
//! that will not fix themselves (bad config, invalid records).

use thiserror::Error;

pub type SyncResult<T> = Result<T, SyncError>;

#[derive(Debug, Error)]
pub enum SyncError {
    /// Network failure, timeout or non-2xx status from upstream or backend.
    #[error("transport error: {0}")]
    Transport(String),

    /// Response arrived but did not have the expected shape.
    #[error("unexpected payload: {0}")]
    Payload(String),

    /// A record is missing a required field.
    #[error("invalid record: {0}")]
    Validation(String),

    /// Backend login failed or the session was rejected.
    #[error("backend authentication failed: {0}")]
    BackendAuth(String),

    /// Publisher has no live backend session.
    #[error("publisher is not connected")]
    NotConnected,

    /// Reading or writing local state failed.
    #[error("storage error: {0}")]
    Storage(#[from] std::io::Error),

    #[error("configuration error: {0}")]
    Config(String),
}

impl SyncError {
    /// True when the same call may succeed on a later cycle without any change
    /// on our side.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SyncError::Transport(_)
                | SyncError::BackendAuth(_)
                | SyncError::NotConnected
                | SyncError::Storage(_)
        )
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(e: reqwest::Error) -> Self {
        // URLs may carry API keys.
        let e = e.without_url();
        if e.is_decode() {
            SyncError::Payload(e.to_string())
        } else if e.status().map(|s| s.as_u16()) == Some(401) {
            SyncError::BackendAuth(e.to_string())
        } else {
            SyncError::Transport(e.to_string())
        }
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(e: serde_json::Error) -> Self {
        SyncError::Payload(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_and_auth_are_retryable_payload_is_not() {
        assert!(SyncError::Transport("timeout".into()).is_retryable());
        assert!(SyncError::NotConnected.is_retryable());
        assert!(!SyncError::Payload("missing events".into()).is_retryable());
        assert!(!SyncError::Validation("no title".into()).is_retryable());
    }

    #[test]
    fn json_errors_map_to_payload() {
        let err = serde_json::from_str::<Vec<u32>>("{").unwrap_err();
        assert!(matches!(SyncError::from(err), SyncError::Payload(_)));
    }
}
