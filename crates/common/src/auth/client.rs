//! OIDC HTTP client: authorization URL building, authorization-code
//! exchange, token refresh, and end-session calls.
//!
//! Talks to a Keycloak-style provider over its
//! `/realms/<realm>/protocol/openid-connect/*` endpoints. All POSTs are
//! form-encoded per RFC 6749; responses are JSON.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use super::pkce::PkcePair;
use super::token::{RefreshResponse, TokenExchangeResponse};
use crate::error::AuthError;

/// Fixed scope set requested at authorization time.
const DEFAULT_SCOPES: [&str; 3] = ["openid", "profile", "email"];

/// Provider and flow configuration, injected into every component that
/// needs it. There is no ambient process-wide configuration.
#[derive(Debug, Clone)]
pub struct OidcConfig {
    /// Provider base URL, e.g. `http://localhost:8080`.
    pub issuer: String,

    /// Keycloak realm name.
    pub realm: String,

    /// Public OAuth client id.
    pub client_id: String,

    /// Fixed local port the redirect listener binds. Must match the
    /// `redirect_uri` registered with the provider exactly.
    pub callback_port: u16,

    /// Callback path component of the registered `redirect_uri`.
    pub callback_path: String,

    /// Scopes requested at authorization time.
    pub scopes: Vec<String>,

    /// Upper bound on waiting for the browser redirect.
    pub redirect_deadline: Duration,

    /// Interval at which the redirect wait re-checks deadline expiry.
    pub poll_interval: Duration,

    /// Tokens expiring within this many seconds trigger proactive refresh.
    pub near_expiry_threshold_secs: i64,
}

impl Default for OidcConfig {
    fn default() -> Self {
        Self {
            issuer: "http://localhost:8080".to_string(),
            realm: "avalanchecms".to_string(),
            client_id: "avalanchecli".to_string(),
            callback_port: 49200,
            callback_path: "/avalanchecli/oidc/pkce/callback".to_string(),
            scopes: DEFAULT_SCOPES.iter().map(ToString::to_string).collect(),
            redirect_deadline: Duration::from_secs(300),
            poll_interval: Duration::from_secs(1),
            near_expiry_threshold_secs: 20,
        }
    }
}

impl OidcConfig {
    /// Defaults overridden by `AVALANCHE_*` environment variables where
    /// set (`AVALANCHE_ISSUER`, `AVALANCHE_REALM`, `AVALANCHE_CLIENT_ID`,
    /// `AVALANCHE_CALLBACK_PORT`).
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(issuer) = std::env::var("AVALANCHE_ISSUER") {
            config.issuer = issuer;
        }
        if let Ok(realm) = std::env::var("AVALANCHE_REALM") {
            config.realm = realm;
        }
        if let Ok(client_id) = std::env::var("AVALANCHE_CLIENT_ID") {
            config.client_id = client_id;
        }
        if let Ok(port) = std::env::var("AVALANCHE_CALLBACK_PORT") {
            if let Ok(port) = port.parse() {
                config.callback_port = port;
            }
        }
        config
    }

    /// The provider's authorization endpoint.
    #[must_use]
    pub fn authorization_endpoint(&self) -> String {
        format!("{}/realms/{}/protocol/openid-connect/auth", self.issuer, self.realm)
    }

    /// The provider's token endpoint.
    #[must_use]
    pub fn token_endpoint(&self) -> String {
        format!("{}/realms/{}/protocol/openid-connect/token", self.issuer, self.realm)
    }

    /// The provider's end-session (logout) endpoint.
    #[must_use]
    pub fn end_session_endpoint(&self) -> String {
        format!("{}/realms/{}/protocol/openid-connect/logout", self.issuer, self.realm)
    }

    /// The exact redirect URI registered with the provider.
    #[must_use]
    pub fn redirect_uri(&self) -> String {
        format!("http://localhost:{}{}", self.callback_port, self.callback_path)
    }

    /// Scopes as the space-separated string the wire format wants.
    #[must_use]
    pub fn scope_string(&self) -> String {
        self.scopes.join(" ")
    }

    /// Build the browser authorization URL for one PKCE attempt.
    #[must_use]
    pub fn build_authorization_url(&self, pkce: &PkcePair) -> String {
        let params = [
            ("client_id", self.client_id.as_str()),
            ("response_type", "code"),
            ("scope", &self.scope_string()),
            ("redirect_uri", &self.redirect_uri()),
            ("code_challenge", &pkce.challenge),
            ("code_challenge_method", pkce.challenge_method()),
        ];

        let query = params
            .iter()
            .map(|(k, v)| format!("{k}={}", urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&");

        format!("{}?{}", self.authorization_endpoint(), query)
    }
}

/// OAuth error response from the provider (RFC 6749 §5.2).
#[derive(Debug, Deserialize)]
pub struct ProviderError {
    pub error: String,
    pub error_description: Option<String>,
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.error_description {
            Some(desc) => write!(f, "{}: {}", self.error, desc),
            None => write!(f, "{}", self.error),
        }
    }
}

/// Trait seam over the provider HTTP calls, for dependency injection and
/// testing with mock implementations.
#[async_trait]
pub trait OidcClientTrait: Send + Sync {
    /// Exchange an authorization code (plus its PKCE verifier) for the
    /// token triple.
    ///
    /// # Errors
    /// Returns [`AuthError::CodeExchangeFailed`] for a non-success status
    /// or a body missing any of the three tokens. Never retried: the
    /// code is single-use.
    async fn exchange_code(
        &self,
        code: &str,
        verifier: &str,
    ) -> Result<TokenExchangeResponse, AuthError>;

    /// Obtain fresh tokens via the refresh-token grant.
    ///
    /// # Errors
    /// Returns [`AuthError::RefreshFailed`] on any non-success response;
    /// callers must treat this as "session is dead", not retryable.
    async fn refresh(&self, refresh_jwt: &str) -> Result<RefreshResponse, AuthError>;

    /// Notify the provider that the session is over.
    ///
    /// # Errors
    /// Returns [`AuthError::Network`] on transport or status failure.
    /// Local logout proceeds regardless.
    async fn end_session(&self, refresh_jwt: &str) -> Result<(), AuthError>;
}

/// Production [`OidcClientTrait`] implementation over reqwest.
#[derive(Debug, Clone)]
pub struct HttpOidcClient {
    config: OidcConfig,
    http: Client,
}

impl HttpOidcClient {
    /// Create a client for the given provider configuration.
    #[must_use]
    pub fn new(config: OidcConfig) -> Self {
        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self { config, http }
    }

    /// The configuration this client talks to.
    #[must_use]
    pub fn config(&self) -> &OidcConfig {
        &self.config
    }

    /// Render the provider's error body, falling back to the HTTP status
    /// when the body is not a standard OAuth error object.
    async fn error_detail(response: reqwest::Response) -> String {
        let status = response.status();
        match response.json::<ProviderError>().await {
            Ok(err) => err.to_string(),
            Err(_) => format!("provider returned HTTP {status}"),
        }
    }
}

#[async_trait]
impl OidcClientTrait for HttpOidcClient {
    async fn exchange_code(
        &self,
        code: &str,
        verifier: &str,
    ) -> Result<TokenExchangeResponse, AuthError> {
        debug!(endpoint = %self.config.token_endpoint(), "exchanging authorization code");

        let form = [
            ("grant_type", "authorization_code"),
            ("client_id", self.config.client_id.as_str()),
            ("redirect_uri", &self.config.redirect_uri()),
            ("code", code),
            ("code_verifier", verifier),
        ];

        let response =
            self.http.post(self.config.token_endpoint()).form(&form).send().await?;

        if !response.status().is_success() {
            return Err(AuthError::CodeExchangeFailed(Self::error_detail(response).await));
        }

        response.json::<TokenExchangeResponse>().await.map_err(|e| {
            AuthError::CodeExchangeFailed(format!(
                "response missing required token fields: {e}"
            ))
        })
    }

    async fn refresh(&self, refresh_jwt: &str) -> Result<RefreshResponse, AuthError> {
        debug!(endpoint = %self.config.token_endpoint(), "refreshing tokens");

        let form = [
            ("grant_type", "refresh_token"),
            ("client_id", self.config.client_id.as_str()),
            ("refresh_token", refresh_jwt),
        ];

        let response =
            self.http.post(self.config.token_endpoint()).form(&form).send().await?;

        if !response.status().is_success() {
            return Err(AuthError::RefreshFailed(Self::error_detail(response).await));
        }

        response
            .json::<RefreshResponse>()
            .await
            .map_err(|e| AuthError::RefreshFailed(format!("malformed refresh response: {e}")))
    }

    async fn end_session(&self, refresh_jwt: &str) -> Result<(), AuthError> {
        debug!(endpoint = %self.config.end_session_endpoint(), "ending provider session");

        let form = [
            ("client_id", self.config.client_id.as_str()),
            ("refresh_token", refresh_jwt),
        ];

        self.http
            .post(self.config.end_session_endpoint())
            .form(&form)
            .send()
            .await?
            .error_for_status()?;

        Ok(())
    }
}
