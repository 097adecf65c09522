use std::{collections::HashMap, io, path::Path, sync::Arc};

use async_trait::async_trait;
use axum::{
    extract::{Query, State},
    routing::get,
    Router,
};
use chrono::{DateTime, Duration, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::{
    net::TcpListener,
    sync::{oneshot, Mutex},
};
use tracing::{debug, info, warn};
use url::Url;

use crate::config::{CalendarSettings, ConfigError};

pub const CALENDAR_SCOPE: &str = "https://www.googleapis.com/auth/calendar.events";
pub const GOOGLE_AUTH_URI: &str = "https://accounts.google.com/o/oauth2/v2/auth";
pub const GOOGLE_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const AUTHORIZED_USER: &str = "authorized_user";
const EXPIRY_MARGIN_SECS: i64 = 60;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error(transparent)]
    Configuration(#[from] ConfigError),
    #[error("failed to access {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("client secrets file {path} has neither an `installed` nor a `web` section")]
    MissingClientKeys { path: String },
    #[error("malformed client secrets file {path}: {source}")]
    MalformedClientSecrets {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("token request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("token endpoint rejected the request: {message}")]
    TokenEndpoint { message: String },
    #[error("authorization flow failed: {0}")]
    Flow(String),
}

/// Persisted refresh credentials in Google's `authorized_user` layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizedUserToken {
    #[serde(rename = "type")]
    pub kind: String,
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClientKeys {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default)]
    pub auth_uri: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ClientSecretsFile {
    installed: Option<ClientKeys>,
    web: Option<ClientKeys>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    refresh_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenErrorResponse {
    error: Option<String>,
    error_description: Option<String>,
}

#[derive(Debug, Clone)]
struct CachedAccessToken {
    value: String,
    expires_at: DateTime<Utc>,
}

impl CachedAccessToken {
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now + Duration::seconds(EXPIRY_MARGIN_SECS) < self.expires_at
    }
}

/// Source of bearer tokens for calendar requests.
#[async_trait]
pub trait AccessTokenSource: Send + Sync {
    async fn access_token(&self) -> Result<String, AuthError>;
}

pub struct GoogleAuthorizer {
    http: Client,
    settings: CalendarSettings,
    token_uri: String,
    cached: Mutex<Option<CachedAccessToken>>,
}

impl GoogleAuthorizer {
    pub fn new(http: Client, settings: CalendarSettings) -> Self {
        Self {
            http,
            settings,
            token_uri: GOOGLE_TOKEN_URI.to_string(),
            cached: Mutex::new(None),
        }
    }

    pub fn with_token_uri(mut self, token_uri: impl Into<String>) -> Self {
        self.token_uri = token_uri.into();
        self
    }

    pub fn token_path(&self) -> &Path {
        &self.settings.token_path
    }

    /// Missing or unreadable token files count as "not yet authorized".
    pub async fn load_saved_token(&self) -> Option<AuthorizedUserToken> {
        let path = self.token_path();
        let contents = tokio::fs::read_to_string(path).await.ok()?;
        match serde_json::from_str::<AuthorizedUserToken>(&contents) {
            Ok(token) => Some(token),
            Err(err) => {
                warn!(path = %path.display(), error = %err, "ignoring unreadable calendar token file");
                None
            }
        }
    }

    pub async fn save_token(&self, token: &AuthorizedUserToken) -> Result<(), AuthError> {
        let path = self.token_path();
        let io_error = |source| AuthError::Io {
            path: path.display().to_string(),
            source,
        };

        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(io_error)?;
        }

        let contents = serde_json::to_string_pretty(token).expect("token serialization");
        tokio::fs::write(path, contents).await.map_err(io_error)?;
        Ok(())
    }

    pub async fn load_client_keys(&self) -> Result<ClientKeys, AuthError> {
        let path = self.settings.credentials_path()?;
        let display = path.display().to_string();
        let contents = tokio::fs::read_to_string(&path)
            .await
            .map_err(|source| AuthError::Io {
                path: display.clone(),
                source,
            })?;

        let secrets: ClientSecretsFile =
            serde_json::from_str(&contents).map_err(|source| AuthError::MalformedClientSecrets {
                path: display.clone(),
                source,
            })?;

        secrets
            .installed
            .or(secrets.web)
            .ok_or(AuthError::MissingClientKeys { path: display })
    }

    /// Saved token when present, otherwise the interactive consent flow.
    pub async fn authorize(&self) -> Result<AuthorizedUserToken, AuthError> {
        if let Some(token) = self.load_saved_token().await {
            return Ok(token);
        }

        let keys = self.load_client_keys().await?;
        let token = self.run_consent_flow(&keys).await?;
        self.save_token(&token).await?;
        info!(path = %self.token_path().display(), "saved calendar authorization");
        Ok(token)
    }

    async fn run_consent_flow(&self, keys: &ClientKeys) -> Result<AuthorizedUserToken, AuthError> {
        let listener = TcpListener::bind(("127.0.0.1", 0))
            .await
            .map_err(|err| AuthError::Flow(format!("cannot bind loopback listener: {err}")))?;
        let port = listener
            .local_addr()
            .map_err(|err| AuthError::Flow(err.to_string()))?
            .port();
        let redirect_uri = format!("http://127.0.0.1:{port}");

        let consent_url = consent_url(keys, &redirect_uri)?;
        info!(url = %consent_url, "open this URL in a browser to authorize calendar access");

        let code = receive_authorization_code(listener).await?;
        let tokens = self
            .token_request(&[
                ("code", code.as_str()),
                ("client_id", keys.client_id.as_str()),
                ("client_secret", keys.client_secret.as_str()),
                ("redirect_uri", redirect_uri.as_str()),
                ("grant_type", "authorization_code"),
            ])
            .await?;

        let refresh_token = tokens
            .refresh_token
            .ok_or_else(|| AuthError::Flow("no refresh token returned".to_string()))?;

        Ok(AuthorizedUserToken {
            kind: AUTHORIZED_USER.to_string(),
            client_id: keys.client_id.clone(),
            client_secret: keys.client_secret.clone(),
            refresh_token,
        })
    }

    async fn token_request(&self, form: &[(&str, &str)]) -> Result<TokenResponse, AuthError> {
        let response = self.http.post(&self.token_uri).form(form).send().await?;
        let status = response.status();
        let bytes = response.bytes().await?;

        if !status.is_success() {
            let message = serde_json::from_slice::<TokenErrorResponse>(&bytes)
                .ok()
                .and_then(|body| body.error_description.or(body.error))
                .unwrap_or_else(|| format!("HTTP {}", status.as_u16()));
            return Err(AuthError::TokenEndpoint { message });
        }

        serde_json::from_slice(&bytes).map_err(|err| AuthError::TokenEndpoint {
            message: format!("unexpected token response: {err}"),
        })
    }

    async fn refresh(&self, token: &AuthorizedUserToken) -> Result<CachedAccessToken, AuthError> {
        let response = self
            .token_request(&[
                ("client_id", token.client_id.as_str()),
                ("client_secret", token.client_secret.as_str()),
                ("refresh_token", token.refresh_token.as_str()),
                ("grant_type", "refresh_token"),
            ])
            .await?;

        Ok(CachedAccessToken {
            value: response.access_token,
            expires_at: Utc::now() + Duration::seconds(response.expires_in.unwrap_or(3600)),
        })
    }
}

#[async_trait]
impl AccessTokenSource for GoogleAuthorizer {
    async fn access_token(&self) -> Result<String, AuthError> {
        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref().filter(|token| token.is_fresh(Utc::now())) {
            return Ok(token.value.clone());
        }

        let authorized = self.authorize().await?;
        let fresh = self.refresh(&authorized).await?;
        let value = fresh.value.clone();
        *cached = Some(fresh);
        Ok(value)
    }
}

pub fn consent_url(keys: &ClientKeys, redirect_uri: &str) -> Result<Url, AuthError> {
    let base = keys.auth_uri.as_deref().unwrap_or(GOOGLE_AUTH_URI);
    Url::parse_with_params(
        base,
        &[
            ("client_id", keys.client_id.as_str()),
            ("redirect_uri", redirect_uri),
            ("response_type", "code"),
            ("scope", CALENDAR_SCOPE),
            ("access_type", "offline"),
            ("prompt", "consent"),
        ],
    )
    .map_err(|err| AuthError::Flow(format!("invalid auth uri {base}: {err}")))
}

type RedirectOutcome = Result<String, AuthError>;

#[derive(Clone)]
struct RedirectState {
    outcome: Arc<Mutex<Option<oneshot::Sender<RedirectOutcome>>>>,
}

/// Serves the loopback redirect until it carries a code or an error, then shuts down.
async fn receive_authorization_code(listener: TcpListener) -> RedirectOutcome {
    let (outcome_tx, outcome_rx) = oneshot::channel();
    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let router = Router::new()
        .route("/", get(redirect_handler))
        .with_state(RedirectState {
            outcome: Arc::new(Mutex::new(Some(outcome_tx))),
        });

    let server = tokio::spawn(async move {
        axum::serve(listener, router)
            .with_graceful_shutdown(async {
                stop_rx.await.ok();
            })
            .await
    });

    let outcome = outcome_rx
        .await
        .map_err(|_| AuthError::Flow("loopback listener stopped before the redirect".to_string()));
    stop_tx.send(()).ok();

    match server.await {
        Ok(Ok(())) => {}
        Ok(Err(err)) => warn!(error = %err, "loopback listener failed during shutdown"),
        Err(err) => warn!(error = %err, "loopback listener task aborted"),
    }
    outcome?
}

async fn redirect_handler(
    State(state): State<RedirectState>,
    Query(params): Query<HashMap<String, String>>,
) -> &'static str {
    let Some(outcome) = redirect_outcome(&params) else {
        return "Waiting for the authorization redirect.";
    };
    let page = match &outcome {
        Ok(_) => "Calendar authorization complete. You can close this window.",
        Err(_) => "Calendar authorization failed. Check the server logs.",
    };

    match state.outcome.lock().await.take() {
        Some(sender) => {
            if sender.send(outcome).is_err() {
                warn!("authorization redirect arrived after the flow was abandoned");
            }
        }
        None => debug!("ignoring repeated authorization redirect"),
    }
    page
}

/// `None` for redirects that carry neither `code` nor `error`.
fn redirect_outcome(params: &HashMap<String, String>) -> Option<RedirectOutcome> {
    match (params.get("code"), params.get("error")) {
        (_, Some(error)) => Some(Err(AuthError::Flow(format!("consent denied: {error}")))),
        (Some(code), None) => Some(Ok(code.clone())),
        (None, None) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn settings(dir: &Path) -> CalendarSettings {
        CalendarSettings {
            calendar_id: "primary".to_string(),
            default_time_zone: "America/Chicago".to_string(),
            token_path: dir.join("nested").join("token.json"),
            credentials_override: None,
            credential_candidates: vec![dir.join("credentials.json")],
        }
    }

    fn token() -> AuthorizedUserToken {
        AuthorizedUserToken {
            kind: "authorized_user".to_string(),
            client_id: "client-123".to_string(),
            client_secret: "secret-456".to_string(),
            refresh_token: "refresh-789".to_string(),
        }
    }

    #[tokio::test]
    async fn saved_token_round_trips_in_authorized_user_layout() {
        let dir = tempfile::tempdir().expect("tempdir");
        let authorizer = GoogleAuthorizer::new(Client::new(), settings(dir.path()));

        authorizer.save_token(&token()).await.expect("token saved");
        let raw: serde_json::Value = serde_json::from_str(
            &std::fs::read_to_string(authorizer.token_path()).expect("token file"),
        )
        .expect("token json");

        assert_eq!(raw["type"], "authorized_user");
        assert_eq!(raw["refresh_token"], "refresh-789");
        assert_eq!(authorizer.load_saved_token().await, Some(token()));
    }

    #[tokio::test]
    async fn missing_or_corrupt_token_file_is_not_authorized() {
        let dir = tempfile::tempdir().expect("tempdir");
        let authorizer = GoogleAuthorizer::new(Client::new(), settings(dir.path()));
        assert_eq!(authorizer.load_saved_token().await, None);

        std::fs::create_dir_all(dir.path().join("nested")).expect("mkdir");
        std::fs::write(authorizer.token_path(), "not json").expect("write");
        assert_eq!(authorizer.load_saved_token().await, None);
    }

    #[tokio::test]
    async fn client_keys_come_from_installed_or_web() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(
            dir.path().join("credentials.json"),
            r#"{"web":{"client_id":"web-id","client_secret":"web-secret"}}"#,
        )
        .expect("write credentials");

        let authorizer = GoogleAuthorizer::new(Client::new(), settings(dir.path()));
        let keys = authorizer.load_client_keys().await.expect("keys load");
        assert_eq!(keys.client_id, "web-id");
        assert_eq!(keys.client_secret, "web-secret");
    }

    #[tokio::test]
    async fn credentials_without_client_section_are_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("credentials.json"), r#"{"other":{}}"#)
            .expect("write credentials");

        let authorizer = GoogleAuthorizer::new(Client::new(), settings(dir.path()));
        let err = authorizer.load_client_keys().await.expect_err("no keys");
        assert!(matches!(err, AuthError::MissingClientKeys { .. }));
    }

    #[tokio::test]
    async fn unresolvable_credentials_are_a_configuration_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let authorizer = GoogleAuthorizer::new(Client::new(), settings(dir.path()));

        let err = authorizer.authorize().await.expect_err("nothing to authorize with");
        assert!(matches!(
            err,
            AuthError::Configuration(ConfigError::MissingCalendarCredentials { .. })
        ));
    }

    #[tokio::test]
    async fn access_token_is_refreshed_once_and_cached() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("grant_type=refresh_token"))
            .and(body_string_contains("refresh_token=refresh-789"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "ya29.access",
                "expires_in": 3599,
                "token_type": "Bearer"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().expect("tempdir");
        let authorizer = GoogleAuthorizer::new(Client::new(), settings(dir.path()))
            .with_token_uri(format!("{}/token", server.uri()));
        authorizer.save_token(&token()).await.expect("token saved");

        assert_eq!(authorizer.access_token().await.expect("first"), "ya29.access");
        assert_eq!(authorizer.access_token().await.expect("cached"), "ya29.access");
    }

    #[tokio::test]
    async fn refresh_rejection_reports_description() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": "invalid_grant",
                "error_description": "Token has been expired or revoked."
            })))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().expect("tempdir");
        let authorizer = GoogleAuthorizer::new(Client::new(), settings(dir.path()))
            .with_token_uri(format!("{}/token", server.uri()));
        authorizer.save_token(&token()).await.expect("token saved");

        let err = authorizer.access_token().await.expect_err("revoked");
        assert_eq!(
            err.to_string(),
            "token endpoint rejected the request: Token has been expired or revoked."
        );
    }

    #[test]
    fn consent_url_requests_offline_calendar_access() {
        let keys = ClientKeys {
            client_id: "client-123".to_string(),
            client_secret: "secret".to_string(),
            auth_uri: None,
        };
        let url = consent_url(&keys, "http://127.0.0.1:4567").expect("url builds");
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();

        assert!(url.as_str().starts_with(GOOGLE_AUTH_URI));
        assert!(pairs.contains(&("scope".to_string(), CALENDAR_SCOPE.to_string())));
        assert!(pairs.contains(&("access_type".to_string(), "offline".to_string())));
        assert!(pairs.contains(&("redirect_uri".to_string(), "http://127.0.0.1:4567".to_string())));
    }

    fn query(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect()
    }

    #[test]
    fn redirect_outcome_distinguishes_code_error_and_noise() {
        assert_eq!(
            redirect_outcome(&query(&[("code", "4/0Abc"), ("scope", "x")]))
                .expect("code present")
                .expect("ok"),
            "4/0Abc"
        );
        assert!(matches!(
            redirect_outcome(&query(&[("error", "access_denied")])),
            Some(Err(AuthError::Flow(_)))
        ));
        assert!(redirect_outcome(&query(&[])).is_none());
    }

    #[tokio::test]
    async fn loopback_listener_receives_code() {
        let listener = TcpListener::bind(("127.0.0.1", 0)).await.expect("bind");
        let base = format!("http://{}", listener.local_addr().expect("address"));

        let browser = tokio::spawn(async move {
            let http = Client::new();
            let waiting = http
                .get(format!("{base}/"))
                .send()
                .await
                .expect("bare redirect")
                .text()
                .await
                .expect("page");
            let done = http
                .get(format!("{base}/?code=4%2F0Abc&scope=x"))
                .send()
                .await
                .expect("code redirect")
                .text()
                .await
                .expect("page");
            (waiting, done)
        });

        let code = receive_authorization_code(listener).await.expect("code");
        let (waiting, done) = browser.await.expect("browser task");
        assert_eq!(code, "4/0Abc");
        assert!(waiting.starts_with("Waiting"));
        assert!(done.contains("complete"));
    }

    #[tokio::test]
    async fn loopback_listener_reports_denied_consent() {
        let listener = TcpListener::bind(("127.0.0.1", 0)).await.expect("bind");
        let url = format!(
            "http://{}/?error=access_denied",
            listener.local_addr().expect("address")
        );

        let browser = tokio::spawn(async move { Client::new().get(url).send().await });

        let error = receive_authorization_code(listener).await.expect_err("denied");
        browser.await.expect("browser task").expect("redirect request");
        assert!(error.to_string().contains("access_denied"));
    }

    #[test]
    fn expiring_tokens_are_not_fresh() {
        let now = Utc::now();
        let token = CachedAccessToken {
            value: "v".to_string(),
            expires_at: now + Duration::seconds(30),
        };
        assert!(!token.is_fresh(now));
    }
}
