use crate::error::{config_error, env_error, AgentResult};
use chrono_tz::Tz;
use dotenvy::dotenv;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Default Gemini model for the chat session
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash-lite";
/// Calendar used when none is configured
pub const DEFAULT_CALENDAR_ID: &str = "primary";
pub const DEFAULT_TIMEZONE: &str = "Europe/London";
pub const DEFAULT_CREDENTIALS_FILE: &str = "credentials.json";
pub const DEFAULT_TOKEN_FILE: &str = "token.json";
pub const DEFAULT_CALENDAR_API_BASE: &str = "https://www.googleapis.com/calendar/v3";
pub const DEFAULT_GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com";

/// Optional settings file, read after the environment
pub const SETTINGS_FILE: &str = "config/agent.toml";

/// Main configuration structure for the agent
#[derive(Debug, Clone)]
pub struct Config {
    /// Gemini API key
    pub google_api_key: String,
    /// Gemini model name
    pub gemini_model: String,
    /// The single calendar every operation targets
    pub google_calendar_id: String,
    /// Timezone for event times and "now"
    pub timezone: Tz,
    /// OAuth client secret file downloaded from the Cloud console
    pub credentials_path: PathBuf,
    /// Cached OAuth credential
    pub token_path: PathBuf,
    /// Base URL of the Calendar v3 API
    pub calendar_api_base: String,
    /// Base URL of the Gemini API
    pub gemini_api_base: String,
}

/// Values that may come from `config/agent.toml`
#[derive(Debug, Default, Deserialize)]
pub struct FileSettings {
    pub gemini_model: Option<String>,
    pub calendar_id: Option<String>,
    pub timezone: Option<String>,
    pub credentials_file: Option<String>,
    pub token_file: Option<String>,
    pub calendar_api_base: Option<String>,
    pub gemini_api_base: Option<String>,
}

impl FileSettings {
    /// Read the settings file if it exists
    pub fn read(path: &Path) -> AgentResult<Self> {
        match fs::read_to_string(path) {
            Ok(content) => Ok(toml::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }
}

impl Config {
    /// Load configuration from environment and config file
    pub fn load() -> AgentResult<Self> {
        // Load .env file if it exists
        dotenv().ok();

        let file = FileSettings::read(Path::new(SETTINGS_FILE))?;
        Self::from_sources(|key| env::var(key).ok(), file)
    }

    /// Resolve every setting from a variable lookup, the settings file and defaults,
    /// in that order of precedence.
    pub fn from_sources<F>(lookup: F, file: FileSettings) -> AgentResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let google_api_key = get("GOOGLE_API_KEY").ok_or_else(|| env_error("GOOGLE_API_KEY"))?;

        let gemini_model = get("GEMINI_MODEL")
            .or(file.gemini_model)
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());

        let google_calendar_id = get("GOOGLE_CALENDAR_ID")
            .or(file.calendar_id)
            .unwrap_or_else(|| DEFAULT_CALENDAR_ID.to_string());

        let timezone_name = get("TIMEZONE")
            .or(file.timezone)
            .unwrap_or_else(|| DEFAULT_TIMEZONE.to_string());
        let timezone: Tz = timezone_name
            .parse()
            .map_err(|_| config_error(&format!("Invalid timezone: {}", timezone_name)))?;

        let credentials_path = get("GOOGLE_CREDENTIALS_FILE")
            .or(file.credentials_file)
            .unwrap_or_else(|| DEFAULT_CREDENTIALS_FILE.to_string());

        let token_path = get("GOOGLE_TOKEN_FILE")
            .or(file.token_file)
            .unwrap_or_else(|| DEFAULT_TOKEN_FILE.to_string());

        let calendar_api_base = get("CALENDAR_API_BASE")
            .or(file.calendar_api_base)
            .unwrap_or_else(|| DEFAULT_CALENDAR_API_BASE.to_string());

        let gemini_api_base = get("GEMINI_API_BASE")
            .or(file.gemini_api_base)
            .unwrap_or_else(|| DEFAULT_GEMINI_API_BASE.to_string());

        Ok(Config {
            google_api_key,
            gemini_model,
            google_calendar_id,
            timezone,
            credentials_path: PathBuf::from(credentials_path),
            token_path: PathBuf::from(token_path),
            calendar_api_base: calendar_api_base.trim_end_matches('/').to_string(),
            gemini_api_base: gemini_api_base.trim_end_matches('/').to_string(),
        })
    }
}

/// Client secret and token file locations, resolved like `Config::load`
/// but without requiring the Gemini API key.
pub fn load_credential_paths() -> AgentResult<(PathBuf, PathBuf)> {
    dotenv().ok();

    let file = FileSettings::read(Path::new(SETTINGS_FILE))?;
    let get = |key: &str| env::var(key).ok().filter(|v| !v.trim().is_empty());

    let credentials_path = get("GOOGLE_CREDENTIALS_FILE")
        .or(file.credentials_file)
        .unwrap_or_else(|| DEFAULT_CREDENTIALS_FILE.to_string());
    let token_path = get("GOOGLE_TOKEN_FILE")
        .or(file.token_file)
        .unwrap_or_else(|| DEFAULT_TOKEN_FILE.to_string());

    Ok((PathBuf::from(credentials_path), PathBuf::from(token_path)))
}
