//! Browser consent flow for installed applications.
//!
//! A loopback listener receives the redirect from Google's consent page and
//! the authorization code is exchanged for a credential at the token endpoint.

use super::token::{StoredCredential, TokenResponse, GOOGLE_TOKEN_URL};
use crate::error::{auth_error, AgentResult};
use chrono::Utc;
use reqwest::Client;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use url::Url;

pub const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";

/// How long to wait for the browser redirect
const CALLBACK_TIMEOUT: Duration = Duration::from_secs(300);

fn default_auth_uri() -> String {
    GOOGLE_AUTH_URL.to_string()
}

fn default_token_uri() -> String {
    GOOGLE_TOKEN_URL.to_string()
}

/// OAuth client registration from the Cloud console
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ClientSecret {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default = "default_auth_uri")]
    pub auth_uri: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

#[derive(Debug, Deserialize)]
struct ClientSecretFile {
    installed: Option<ClientSecret>,
    web: Option<ClientSecret>,
    client_id: Option<String>,
    client_secret: Option<String>,
}

impl ClientSecret {
    /// Read the client secret file
    pub fn from_file(path: &Path) -> AgentResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            auth_error(&format!(
                "Cannot read OAuth client secret file {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_json(&content)
    }

    /// Parse either the `installed`/`web` layout or a flat `client_id`/`client_secret` object
    pub fn from_json(json: &str) -> AgentResult<Self> {
        let file: ClientSecretFile = serde_json::from_str(json)
            .map_err(|e| auth_error(&format!("Invalid OAuth client secret file: {}", e)))?;

        if let Some(secret) = file.installed.or(file.web) {
            return Ok(secret);
        }

        match (file.client_id, file.client_secret) {
            (Some(client_id), Some(client_secret)) => Ok(Self {
                client_id,
                client_secret,
                auth_uri: default_auth_uri(),
                token_uri: default_token_uri(),
            }),
            _ => Err(auth_error(
                "OAuth client secret file has no 'installed' or 'web' section",
            )),
        }
    }
}

/// Consent page URL for the given redirect and state
pub fn authorization_url(
    secret: &ClientSecret,
    redirect_uri: &str,
    scopes: &[String],
    state: &str,
) -> AgentResult<Url> {
    let scope = scopes.join(" ");
    Url::parse_with_params(
        &secret.auth_uri,
        &[
            ("client_id", secret.client_id.as_str()),
            ("redirect_uri", redirect_uri),
            ("response_type", "code"),
            ("scope", scope.as_str()),
            ("access_type", "offline"),
            ("prompt", "consent"),
            ("state", state),
        ],
    )
    .map_err(|e| auth_error(&format!("Invalid authorization endpoint: {}", e)))
}

/// Extract the authorization code from a redirect request path.
///
/// Returns `None` for requests that are not the redirect (e.g. `/favicon.ico`).
pub fn parse_callback(request_path: &str, expected_state: &str) -> Option<AgentResult<String>> {
    let url = Url::parse("http://127.0.0.1")
        .and_then(|base| base.join(request_path))
        .ok()?;

    let mut code = None;
    let mut state = None;
    let mut error = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" => code = Some(value.into_owned()),
            "state" => state = Some(value.into_owned()),
            "error" => error = Some(value.into_owned()),
            _ => {}
        }
    }

    if let Some(error) = error {
        return Some(Err(auth_error(&format!("Authorization denied: {}", error))));
    }

    let code = code?;
    if state.as_deref() != Some(expected_state) {
        return Some(Err(auth_error("OAuth state mismatch in callback")));
    }

    Some(Ok(code))
}

/// Run the interactive consent flow and return the new credential
pub async fn run_consent_flow(
    client: &Client,
    secret: &ClientSecret,
    scopes: &[String],
) -> AgentResult<StoredCredential> {
    // Start local server to receive the callback on an OS-assigned port
    let server = tiny_http::Server::http("127.0.0.1:0")
        .map_err(|e| auth_error(&format!("Failed to start callback server: {}", e)))?;
    let port = server
        .server_addr()
        .to_ip()
        .map(|addr| addr.port())
        .ok_or_else(|| auth_error("Callback server has no TCP address"))?;
    let redirect_uri = format!("http://127.0.0.1:{}/", port);

    // Generate random state for security
    let state = uuid::Uuid::new_v4().to_string();
    let auth_url = authorization_url(secret, &redirect_uri, scopes, &state)?;

    println!("Opening browser for Google Calendar authorization...");
    if let Err(e) = webbrowser::open(auth_url.as_str()) {
        warn!("Failed to open browser: {}", e);
        println!("Please open this URL in your browser:\n\n{}\n", auth_url);
    }
    println!("Waiting for authorization callback...");

    let code = tokio::task::spawn_blocking(move || wait_for_code(server, &state))
        .await
        .map_err(|e| auth_error(&format!("Callback listener failed: {}", e)))??;

    info!("Received authorization code, exchanging for tokens");
    exchange_code(client, secret, &code, &redirect_uri, scopes).await
}

fn wait_for_code(server: tiny_http::Server, expected_state: &str) -> AgentResult<String> {
    let deadline = Instant::now() + CALLBACK_TIMEOUT;

    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(auth_error("Timed out waiting for the authorization callback"));
        }

        let Some(request) = server.recv_timeout(remaining)? else {
            continue;
        };

        match parse_callback(request.url(), expected_state) {
            None => {
                debug!("Ignoring request to {}", request.url());
                let _ = request.respond(tiny_http::Response::empty(404));
            }
            Some(Ok(code)) => {
                let response = tiny_http::Response::from_string(
                    "Authorization successful! You can close this window.",
                );
                let _ = request.respond(response);
                return Ok(code);
            }
            Some(Err(e)) => {
                let response = tiny_http::Response::from_string(
                    "Authorization failed. You can close this window.",
                )
                .with_status_code(400);
                let _ = request.respond(response);
                return Err(e);
            }
        }
    }
}

/// Exchange an authorization code for a credential
pub async fn exchange_code(
    client: &Client,
    secret: &ClientSecret,
    code: &str,
    redirect_uri: &str,
    scopes: &[String],
) -> AgentResult<StoredCredential> {
    let response = client
        .post(&secret.token_uri)
        .form(&[
            ("client_id", secret.client_id.as_str()),
            ("client_secret", secret.client_secret.as_str()),
            ("code", code),
            ("redirect_uri", redirect_uri),
            ("grant_type", "authorization_code"),
        ])
        .send()
        .await
        .map_err(|e| auth_error(&format!("Token exchange request failed: {}", e)))?;

    if !response.status().is_success() {
        let status = response.status();
        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Could not read error response".to_string());
        return Err(auth_error(&format!(
            "Failed to get token: HTTP {} - {}",
            status, error_text
        )));
    }

    let token: TokenResponse = response
        .json()
        .await
        .map_err(|e| auth_error(&format!("Failed to parse token response: {}", e)))?;

    if token.refresh_token.is_none() {
        warn!("Token response has no refresh token; consent will be needed again after expiry");
    }

    StoredCredential::from_response(token, secret, scopes, Utc::now())
}
