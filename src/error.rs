use miette::Diagnostic;
use thiserror::Error;

/// Main error type for the application
#[derive(Debug, Error, Diagnostic)]
pub enum Error {
    #[error("Environment error: {0}")]
    #[diagnostic(
        code(calendar_agent::environment),
        help("Set the variable in the environment or in a .env file")
    )]
    Environment(String),

    #[error("Configuration error: {0}")]
    #[diagnostic(code(calendar_agent::config))]
    Config(String),

    #[error("Authorization error: {0}")]
    #[diagnostic(
        code(calendar_agent::auth),
        help("Delete the token file and run get_calendar_token to authorize again")
    )]
    Auth(String),

    #[error("Language model error: {0}")]
    #[diagnostic(code(calendar_agent::llm))]
    Llm(String),

    #[error("Conversation error: {0}")]
    #[diagnostic(code(calendar_agent::orchestrator))]
    Orchestrator(String),

    #[error("Prompt error: {0}")]
    #[diagnostic(code(calendar_agent::prompt))]
    Prompt(String),

    #[error(transparent)]
    #[diagnostic(code(calendar_agent::io))]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    #[diagnostic(code(calendar_agent::serialization))]
    Serialization(String),

    #[error("Other error: {0}")]
    #[diagnostic(code(calendar_agent::other))]
    Other(String),
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl From<inquire::InquireError> for Error {
    fn from(err: inquire::InquireError) -> Self {
        Error::Prompt(err.to_string())
    }
}

/// Type alias for Result with our Error type
pub type AgentResult<T> = Result<T, Error>;

/// Helper to create environment errors
pub fn env_error(var: &str) -> Error {
    Error::Environment(format!("Missing environment variable: {}", var))
}

/// Helper to create configuration errors
pub fn config_error(message: &str) -> Error {
    Error::Config(message.to_string())
}

/// Helper to create authorization errors
pub fn auth_error(message: &str) -> Error {
    Error::Auth(message.to_string())
}

/// Helper to create language model errors
pub fn llm_error(message: &str) -> Error {
    Error::Llm(message.to_string())
}

/// Helper to create conversation errors
pub fn orchestrator_error(message: &str) -> Error {
    Error::Orchestrator(message.to_string())
}
