use std::path::PathBuf;

use thiserror::Error;

/// Failure to read claims out of an access token.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("token is {0} bytes, larger than {max}", max = crate::auth::jwt::MAX_TOKEN_BYTES)]
    TooLarge(usize),
    #[error("token must have three dot-separated segments, found {0}")]
    SegmentCount(usize),
    #[error("token payload is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("token payload is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("token payload is not a JSON object")]
    NotAnObject,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("session storage I/O failed at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("session storage at {} is not a JSON object of strings: {source}", path.display())]
    Format {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("session storage lock poisoned")]
    Poisoned,
}

#[derive(Debug, Error)]
pub enum RefreshError {
    #[error("token refresh request failed: {0}")]
    Network(#[from] reqwest::Error),
    #[error("token refresh rejected with status {status}")]
    Rejected {
        status: u16,
        detail: Option<String>,
        code: Option<String>,
    },
    #[error("token refresh response not understood: {0}")]
    InvalidResponse(String),
}

impl RefreshError {
    /// True when the server says the refresh token itself is no longer valid.
    pub fn is_token_invalid(&self) -> bool {
        let Self::Rejected { detail, code, .. } = self else {
            return false;
        };

        if code.as_deref() == Some("token_not_valid") {
            return true;
        }

        detail.as_deref().is_some_and(|detail| {
            let detail = detail.to_ascii_lowercase();
            detail.contains("invalid") || detail.contains("expired")
        })
    }
}

/// Failures of the authenticated API calls (login, OTP, signup, KYC).
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("request failed: {0}")]
    Network(#[from] reqwest::Error),
    #[error("{message}")]
    Rejected { status: u16, message: String },
    #[error("unexpected response: {0}")]
    InvalidResponse(String),
    #[error("No authentication token found. Please login again.")]
    NotLoggedIn,
    /// The API answered 401; the local session has been cleared.
    #[error("Session expired. Please login again.")]
    SessionExpired,
    #[error("session could not be saved: {0}")]
    Store(#[from] StoreError),
    #[error("could not read {}: {source}", path.display())]
    Attachment {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl AuthError {
    pub fn rejected(status: u16, message: impl Into<String>) -> Self {
        Self::Rejected {
            status,
            message: message.into(),
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Rejected { status, .. } => Some(*status),
            Self::Network(err) => err.status().map(|status| status.as_u16()),
            Self::SessionExpired => Some(401),
            Self::InvalidResponse(_) | Self::NotLoggedIn | Self::Store(_) | Self::Attachment { .. } => {
                None
            }
        }
    }
}
