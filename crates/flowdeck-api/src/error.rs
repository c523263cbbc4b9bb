use serde_json::Value;
use thiserror::Error;

/// Errors surfaced by the gateway client.
#[derive(Error, Debug)]
pub enum ApiError {
    /// Network failure or body read failure.
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// Non-2xx response; `message` comes from the body's `error`/`message`
    /// fields when present, `body` carries the parsed payload for callers.
    #[error("{message} (http {status})")]
    Status {
        status: u16,
        message: String,
        body: Value,
    },

    /// The server answered with an HTML document, usually a proxy or
    /// misrouted front-end index rather than the API.
    #[error("unexpected HTML response (http {status})")]
    UnexpectedHtml { status: u16 },

    /// Required argument missing; rejected before dispatch.
    #[error("{call}: {field} is required")]
    MissingField {
        call: &'static str,
        field: &'static str,
    },
}

impl ApiError {
    /// HTTP status when the error came back from the server.
    pub fn http_status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } | ApiError::UnexpectedHtml { status, .. } => {
                Some(*status)
            }
            ApiError::Transport(err) => err.status().map(|s| s.as_u16()),
            ApiError::MissingField { .. } => None,
        }
    }

    /// True for the 400/401 class that should roll optimistic state back.
    pub fn is_rejection(&self) -> bool {
        matches!(self.http_status(), Some(400) | Some(401))
    }
}
