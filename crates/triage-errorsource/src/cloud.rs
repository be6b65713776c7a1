//! Google Cloud Error Reporting client
//!
//! Auth follows the service-account JWT-bearer grant: an RS256 assertion
//! signed with the account key is exchanged at the token endpoint for a
//! short-lived access token. Tokens are cached until a minute before they
//! expire; a 401 from the API evicts the cached token.

use crate::error::ErrorSourceError;
use crate::source::ErrorSource;
use async_trait::async_trait;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use moka::future::Cache;
use moka::Expiry;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use triage_core::ErrorSourceConfig;

const SCOPE: &str = "https://www.googleapis.com/auth/cloud-platform";
const GRANT_TYPE: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECS: i64 = 3600;
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: u64,
}

fn default_expires_in() -> u64 {
    3600
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListEventsResponse {
    #[serde(default)]
    error_events: Vec<ErrorEvent>,
}

#[derive(Debug, Deserialize)]
struct ErrorEvent {
    #[serde(default)]
    message: Option<String>,
}

#[derive(Clone)]
struct AccessToken {
    value: Arc<str>,
    ttl: Duration,
}

struct TokenExpiry;

impl Expiry<String, AccessToken> for TokenExpiry {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &AccessToken,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

/// Error Reporting API client
#[derive(Clone)]
pub struct CloudErrorReporting {
    http: reqwest::Client,
    config: ErrorSourceConfig,
    tokens: Cache<String, AccessToken>,
}

impl std::fmt::Debug for CloudErrorReporting {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudErrorReporting")
            .field("config", &self.config)
            .field("cached_tokens", &self.tokens.entry_count())
            .finish()
    }
}

impl CloudErrorReporting {
    /// Create client
    ///
    /// # Errors
    /// `ErrorSourceError::Http` when the HTTP client cannot be built.
    pub fn new(config: ErrorSourceConfig) -> Result<Self, ErrorSourceError> {
        let http = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self::with_client(http, config))
    }

    /// Create client around an existing `reqwest::Client`
    #[must_use]
    pub fn with_client(http: reqwest::Client, config: ErrorSourceConfig) -> Self {
        Self {
            http,
            config,
            tokens: Cache::builder()
                .max_capacity(4)
                .expire_after(TokenExpiry)
                .build(),
        }
    }

    /// Whether lookups can be attempted at all
    #[inline]
    #[must_use]
    pub fn is_configured(&self) -> bool {
        self.config.has_credentials()
    }

    fn signed_assertion(&self, email: &str, key: &str) -> Result<String, ErrorSourceError> {
        let now = chrono::Utc::now().timestamp();
        let claims = AssertionClaims {
            iss: email,
            scope: SCOPE,
            aud: &self.config.token_uri,
            iat: now,
            exp: now + ASSERTION_LIFETIME_SECS,
        };
        let key = EncodingKey::from_rsa_pem(key.as_bytes())?;
        Ok(jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &key)?)
    }

    async fn exchange_token(&self, email: &str, key: &str) -> Result<AccessToken, ErrorSourceError> {
        let assertion = self.signed_assertion(email, key)?;
        let response = self
            .http
            .post(&self.config.token_uri)
            .form(&[("grant_type", GRANT_TYPE), ("assertion", assertion.as_str())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ErrorSourceError::TokenExchange(format!("{status}: {body}")));
        }
        let token: TokenResponse = response.json().await?;
        tracing::debug!("Obtained access token valid for {}s", token.expires_in);
        Ok(AccessToken {
            value: Arc::from(token.access_token),
            ttl: Duration::from_secs(token.expires_in).saturating_sub(EXPIRY_MARGIN),
        })
    }

    async fn access_token(&self) -> Result<Arc<str>, ErrorSourceError> {
        let (Some(email), Some(key)) = (
            self.config.service_account_email.as_deref(),
            self.config.private_key.as_ref(),
        ) else {
            return Err(ErrorSourceError::MissingCredentials);
        };

        self.tokens
            .try_get_with(email.to_string(), self.exchange_token(email, key.expose()))
            .await
            .map(|token| token.value)
            .map_err(|e| ErrorSourceError::TokenExchange(e.to_string()))
    }
}

#[async_trait]
impl ErrorSource for CloudErrorReporting {
    async fn latest_message(&self, group_id: &str) -> Result<Option<String>, ErrorSourceError> {
        if !self.is_configured() {
            return Err(ErrorSourceError::MissingCredentials);
        }
        let Some(project) = self.config.project_id.as_deref() else {
            return Err(ErrorSourceError::MissingCredentials);
        };
        let token = self.access_token().await?;

        let url = format!(
            "{}/projects/{project}/events",
            self.config.api_base_url.trim_end_matches('/')
        );
        tracing::info!("Fetching latest event of error group {}", group_id);
        let response = self
            .http
            .get(&url)
            .query(&[("groupId", group_id)])
            .bearer_auth(&*token)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            if status == reqwest::StatusCode::UNAUTHORIZED {
                if let Some(email) = &self.config.service_account_email {
                    self.tokens.invalidate(email).await;
                }
            }
            let body = response.text().await.unwrap_or_default();
            return Err(ErrorSourceError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let events: ListEventsResponse = response.json().await?;
        Ok(events
            .error_events
            .into_iter()
            .next()
            .and_then(|event| event.message)
            .filter(|message| !message.trim().is_empty()))
    }
}
