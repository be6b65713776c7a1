//! Error-source failures
//!
//! All of these surface to the submitter as an invalid request; none of them
//! is allowed to take the service down.

/// Error-source lookup errors
#[derive(Debug, thiserror::Error)]
pub enum ErrorSourceError {
    /// Project id, service account or key not configured
    #[error("error reporting credentials are not configured")]
    MissingCredentials,

    /// Private key unusable for signing
    #[error("invalid service account key: {0}")]
    InvalidKey(#[from] jsonwebtoken::errors::Error),

    /// Access token could not be obtained
    #[error("token exchange failed: {0}")]
    TokenExchange(String),

    /// Transport failure
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// API answered with a non-success status
    #[error("error reporting API returned {status}: {body}")]
    Status { status: u16, body: String },
}

impl ErrorSourceError {
    /// Whether credentials are the problem
    #[inline]
    #[must_use]
    pub fn is_auth(&self) -> bool {
        matches!(
            self,
            Self::MissingCredentials
                | Self::InvalidKey(_)
                | Self::TokenExchange(_)
                | Self::Status { status: 401 | 403, .. }
        )
    }
}
