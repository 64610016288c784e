use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use async_std::sync::Mutex;
use async_trait::async_trait;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};

use crate::StoreError;

const DATASTORE_SCOPE: &str = "https://www.googleapis.com/auth/datastore";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
// The emulator accepts this token as an admin credential
const EMULATOR_ACCESS_TOKEN: &str = "owner";
const ASSERTION_LIFETIME: Duration = Duration::from_secs(3600);
// Refresh a cached token this long before Google would reject it
const REFRESH_MARGIN: Duration = Duration::from_secs(300);

/// Source of bearer tokens for Firestore requests. Asked once per request.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn access_token(&self) -> Result<String, StoreError>;
}

/// A token that never changes: the emulator's admin token or a token handed
/// in from the environment.
pub struct StaticToken(String);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn emulator() -> Self {
        Self::new(EMULATOR_ACCESS_TOKEN)
    }
}

#[async_trait]
impl TokenProvider for StaticToken {
    async fn access_token(&self) -> Result<String, StoreError> {
        Ok(self.0.clone())
    }
}

/// The fields of a Google service account key file that token minting needs.
#[derive(Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

impl std::fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("client_email", &self.client_email)
            .field("private_key", &"<redacted>")
            .field("project_id", &self.project_id)
            .field("token_uri", &self.token_uri)
            .finish()
    }
}

impl ServiceAccountKey {
    pub fn from_json(json: &str) -> Result<Self, StoreError> {
        serde_json::from_str(json)
            .map_err(|e| StoreError::Unauthenticated(format!("Invalid service account key: {}", e)))
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
struct AssertionClaims {
    iss: String,
    scope: String,
    aud: String,
    iat: u64,
    exp: u64,
}

impl AssertionClaims {
    fn new(key: &ServiceAccountKey, issued_at: u64) -> Self {
        Self {
            iss: key.client_email.clone(),
            scope: DATASTORE_SCOPE.to_string(),
            aud: key.token_uri.clone(),
            iat: issued_at,
            exp: issued_at + ASSERTION_LIFETIME.as_secs(),
        }
    }
}

#[derive(Serialize)]
struct TokenRequest<'a> {
    grant_type: &'a str,
    assertion: &'a str,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

struct CachedToken {
    token: String,
    refresh_at: Instant,
}

impl CachedToken {
    fn new(token: String, expires_in: Duration, now: Instant) -> Self {
        Self {
            token,
            refresh_at: now + expires_in.saturating_sub(REFRESH_MARGIN),
        }
    }

    fn is_fresh(&self, now: Instant) -> bool {
        now < self.refresh_at
    }
}

/// Exchanges a signed service account assertion for access tokens and keeps
/// the current one until it is close to expiry, so long runs outlive any
/// single token.
pub struct ServiceAccountTokenProvider {
    key: ServiceAccountKey,
    client: surf::Client,
    cached: Mutex<Option<CachedToken>>,
}

impl ServiceAccountTokenProvider {
    pub fn new(key: ServiceAccountKey) -> Self {
        Self {
            key,
            client: surf::Client::new(),
            cached: Mutex::new(None),
        }
    }

    fn signed_assertion(&self) -> Result<String, StoreError> {
        let issued_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| StoreError::Unauthenticated(format!("System clock error: {}", e)))?
            .as_secs();
        let claims = AssertionClaims::new(&self.key, issued_at);

        let signing_key = EncodingKey::from_rsa_pem(self.key.private_key.as_bytes())
            .map_err(|e| StoreError::Unauthenticated(format!("Invalid private key: {}", e)))?;
        jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &signing_key)
            .map_err(|e| StoreError::Unauthenticated(format!("Failed to sign assertion: {}", e)))
    }

    async fn fetch_token(&self) -> Result<CachedToken, StoreError> {
        let assertion = self.signed_assertion()?;
        let request = TokenRequest {
            grant_type: JWT_BEARER_GRANT,
            assertion: &assertion,
        };

        let mut response = self
            .client
            .post(&self.key.token_uri)
            .body(surf::Body::from_form(&request)?)
            .await?;
        let status = response.status();
        let text = response.body_string().await?;
        if !status.is_success() {
            return Err(StoreError::Unauthenticated(format!(
                "Token exchange failed ({}): {}",
                status,
                text.trim()
            )));
        }

        let token: TokenResponse = serde_json::from_str(&text)?;
        let expires_in = Duration::from_secs(token.expires_in.unwrap_or(ASSERTION_LIFETIME.as_secs()));
        tracing::debug!(
            client_email = %self.key.client_email,
            expires_in_secs = expires_in.as_secs(),
            "Fetched Firestore access token"
        );
        Ok(CachedToken::new(token.access_token, expires_in, Instant::now()))
    }
}

#[async_trait]
impl TokenProvider for ServiceAccountTokenProvider {
    async fn access_token(&self) -> Result<String, StoreError> {
        let mut cached = self.cached.lock().await;
        if let Some(current) = cached.as_ref() {
            if current.is_fresh(Instant::now()) {
                return Ok(current.token.clone());
            }
        }

        let fresh = self.fetch_token().await?;
        let token = fresh.token.clone();
        *cached = Some(fresh);
        Ok(token)
    }
}
