use super::oauth::{self, ClientSecret};
use crate::config::Config;
use crate::error::{auth_error, AgentResult};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Full read/write access to the user's calendars
pub const CALENDAR_SCOPE: &str = "https://www.googleapis.com/auth/calendar";
pub const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// Access tokens this close to expiry are treated as expired
const EXPIRY_MARGIN_SECS: i64 = 60;

fn default_token_uri() -> String {
    GOOGLE_TOKEN_URL.to_string()
}

/// OAuth credential persisted in the token file.
///
/// Field names follow the `authorized_user` JSON layout so an existing
/// token file from other Google tooling can be reused.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(from = "CredentialFile")]
pub struct StoredCredential {
    pub token: String,
    pub refresh_token: Option<String>,
    pub token_uri: String,
    pub client_id: String,
    pub client_secret: String,
    pub scopes: Vec<String>,
    pub expiry: Option<DateTime<Utc>>,
}

/// On-disk layouts accepted when loading: `authorized_user`, or the older
/// `access_token` + `expires_at` (epoch seconds) form.
#[derive(Debug, Deserialize)]
struct CredentialFile {
    #[serde(alias = "access_token")]
    token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default = "default_token_uri")]
    token_uri: String,
    #[serde(default)]
    client_id: String,
    #[serde(default)]
    client_secret: String,
    #[serde(default)]
    scopes: Vec<String>,
    #[serde(default)]
    expiry: Option<DateTime<Utc>>,
    #[serde(default)]
    expires_at: Option<i64>,
}

impl From<CredentialFile> for StoredCredential {
    fn from(file: CredentialFile) -> Self {
        // An out-of-range epoch still means "has an expiry", so it must not read as "never expires"
        let expires_at = file
            .expires_at
            .map(|secs| DateTime::<Utc>::from_timestamp(secs, 0).unwrap_or(DateTime::<Utc>::MIN_UTC));

        Self {
            token: file.token,
            refresh_token: file.refresh_token,
            token_uri: file.token_uri,
            client_id: file.client_id,
            client_secret: file.client_secret,
            scopes: file.scopes,
            expiry: file.expiry.or(expires_at),
        }
    }
}

/// Expiry instant for a token issued at `now` that lives `expires_in` seconds
pub fn expiry_after(now: DateTime<Utc>, expires_in: Option<i64>) -> AgentResult<Option<DateTime<Utc>>> {
    let Some(secs) = expires_in else {
        return Ok(None);
    };
    Duration::try_seconds(secs)
        .and_then(|lifetime| now.checked_add_signed(lifetime))
        .map(Some)
        .ok_or_else(|| auth_error(&format!("Token endpoint returned an invalid expires_in: {}", secs)))
}

impl StoredCredential {
    /// Build a credential from a token endpoint response
    pub fn from_response(
        response: TokenResponse,
        secret: &ClientSecret,
        scopes: &[String],
        now: DateTime<Utc>,
    ) -> AgentResult<Self> {
        Ok(Self {
            token: response.access_token,
            refresh_token: response.refresh_token,
            token_uri: secret.token_uri.clone(),
            client_id: secret.client_id.clone(),
            client_secret: secret.client_secret.clone(),
            scopes: scopes.to_vec(),
            expiry: expiry_after(now, response.expires_in)?,
        })
    }

    /// Whether the access token can still be used at `now`
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        if self.token.is_empty() {
            return false;
        }
        match self.expiry {
            Some(expiry) => expiry
                .checked_sub_signed(Duration::seconds(EXPIRY_MARGIN_SECS))
                .is_some_and(|usable_until| usable_until > now),
            None => true,
        }
    }

    pub fn can_refresh(&self) -> bool {
        self.refresh_token.as_deref().is_some_and(|t| !t.is_empty())
    }
}

/// Response of the OAuth token endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_in: Option<i64>,
}

/// Bearer token for Calendar API requests
#[derive(Debug, Clone, PartialEq)]
pub struct AuthenticatedSession {
    access_token: String,
}

impl AuthenticatedSession {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
        }
    }

    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.access_token)
    }
}

/// Source of sessions for provider calls
#[async_trait]
pub trait SessionProvider: Send + Sync {
    async fn session(&self) -> AgentResult<AuthenticatedSession>;
}

#[async_trait]
impl SessionProvider for AuthenticatedSession {
    async fn session(&self) -> AgentResult<AuthenticatedSession> {
        Ok(self.clone())
    }
}

/// JSON file holding the cached credential
#[derive(Debug, Clone)]
pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the credential; a missing or unreadable file yields `None`
    pub fn load(&self) -> Option<StoredCredential> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) => {
                debug!("No token file at {:?}: {}", self.path, e);
                return None;
            }
        };

        match serde_json::from_str(&content) {
            Ok(credential) => Some(credential),
            Err(e) => {
                warn!("Ignoring unreadable token file {:?}: {}", self.path, e);
                None
            }
        }
    }

    /// Write the credential, replacing any previous file
    pub fn save(&self, credential: &StoredCredential) -> AgentResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let temp_path = self.path.with_extension("json.tmp");
        let content = serde_json::to_string_pretty(credential)?;

        // Owner-only from creation; the file holds the refresh token and client secret
        let mut options = fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let mut file = options.open(&temp_path)?;

        // A leftover temp file keeps its old mode, so tighten it explicitly
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Err(e) = file.set_permissions(fs::Permissions::from_mode(0o600)) {
                warn!("Could not restrict permissions on {:?}: {}", temp_path, e);
            }
        }

        file.write_all(content.as_bytes())?;
        file.sync_all()?;
        drop(file);
        fs::rename(&temp_path, &self.path)?;

        debug!("Saved token to {:?}", self.path);
        Ok(())
    }
}

/// Loads, refreshes and persists the OAuth credential
pub struct CredentialManager {
    store: TokenStore,
    client_secret_path: PathBuf,
    scopes: Vec<String>,
    client: Client,
    cached: Mutex<Option<StoredCredential>>,
}

impl CredentialManager {
    pub fn new(config: &Config) -> Self {
        Self::with_paths(&config.token_path, &config.credentials_path)
    }

    pub fn with_paths(token_path: impl Into<PathBuf>, client_secret_path: impl Into<PathBuf>) -> Self {
        Self {
            store: TokenStore::new(token_path),
            client_secret_path: client_secret_path.into(),
            scopes: vec![CALENDAR_SCOPE.to_string()],
            client: Client::new(),
            cached: Mutex::new(None),
        }
    }

    /// Return a usable session, refreshing or running the consent flow as needed
    pub async fn obtain_session(&self) -> AgentResult<AuthenticatedSession> {
        let mut cached = self.cached.lock().await;
        if cached.is_none() {
            *cached = self.store.load();
        }

        if let Some(credential) = cached.as_ref() {
            if credential.is_valid_at(Utc::now()) {
                return Ok(AuthenticatedSession::new(credential.token.clone()));
            }
        }

        let credential = match cached.take() {
            Some(expired) if expired.can_refresh() => {
                info!("Access token expired, refreshing");
                self.refresh(&expired).await?
            }
            _ => {
                info!("No usable token, starting consent flow");
                self.consent().await?
            }
        };

        self.store.save(&credential)?;
        let session = AuthenticatedSession::new(credential.token.clone());
        *cached = Some(credential);
        Ok(session)
    }

    /// Run only the consent flow and persist the result
    pub async fn authorize(&self) -> AgentResult<StoredCredential> {
        let credential = self.consent().await?;
        self.store.save(&credential)?;
        *self.cached.lock().await = Some(credential.clone());
        Ok(credential)
    }

    pub fn token_path(&self) -> &Path {
        self.store.path()
    }

    async fn consent(&self) -> AgentResult<StoredCredential> {
        let secret = ClientSecret::from_file(&self.client_secret_path)?;
        oauth::run_consent_flow(&self.client, &secret, &self.scopes).await
    }

    async fn refresh(&self, credential: &StoredCredential) -> AgentResult<StoredCredential> {
        let refresh_token = credential
            .refresh_token
            .clone()
            .ok_or_else(|| auth_error("No refresh token in token data"))?;

        let params = [
            ("client_id", credential.client_id.as_str()),
            ("client_secret", credential.client_secret.as_str()),
            ("refresh_token", refresh_token.as_str()),
            ("grant_type", "refresh_token"),
        ];

        let response = self
            .client
            .post(&credential.token_uri)
            .form(&params)
            .send()
            .await
            .map_err(|e| auth_error(&format!("Failed to refresh token: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "Could not read error response".to_string());
            return Err(auth_error(&format!(
                "Failed to refresh token: HTTP {} - {}",
                status, error_body
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| auth_error(&format!("Failed to parse token response: {}", e)))?;

        let now = Utc::now();
        Ok(StoredCredential {
            token: token.access_token,
            // Google only returns a new refresh token when it rotates it
            refresh_token: token.refresh_token.or(Some(refresh_token)),
            expiry: expiry_after(now, token.expires_in)?,
            ..credential.clone()
        })
    }
}

#[async_trait]
impl SessionProvider for CredentialManager {
    async fn session(&self) -> AgentResult<AuthenticatedSession> {
        self.obtain_session().await
    }
}
