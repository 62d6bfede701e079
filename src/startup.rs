use crate::components::assistant::{chat_loop, prompt, ChatSession, GeminiClient, TerminalConsole};
use crate::components::confirmation::ConsoleGate;
use crate::components::google_calendar::{CalendarClient, CredentialManager};
use crate::config::Config;
use crate::error::Error;
use crate::utils::time::current_datetime;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Initialize logging with environment-based configuration.
///
/// Logs go to stderr so the conversation on stdout stays readable.
pub fn init_logging() -> miette::Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| Error::Other(format!("Failed to set up logging: {}", e)))?;

    Ok(())
}

/// Load the application config
pub fn load_config() -> miette::Result<Config> {
    match Config::load() {
        Ok(config) => Ok(config),
        Err(e) => {
            error!("Failed to load configuration: {:?}", e);
            Err(e.into())
        }
    }
}

/// Authorize, wire the calendar tools to the model and run the chat until the user quits
pub async fn run_agent(config: Config) -> miette::Result<()> {
    let credentials = Arc::new(CredentialManager::new(&config));

    // Authorize before the first prompt so consent never interrupts a chat turn
    credentials.obtain_session().await?;
    info!("Authorized against Google Calendar");

    let calendar = CalendarClient::new(&config, credentials, Arc::new(ConsoleGate));
    let model = GeminiClient::new(&config);
    let instruction = prompt::system_instruction(&current_datetime(config.timezone), config.timezone);

    let mut session = ChatSession::new(Arc::new(model), Arc::new(calendar), instruction);

    println!(
        "Calendar agent ready (calendar '{}'). Type 'quit' or 'exit' to leave.",
        config.google_calendar_id
    );
    chat_loop::run(&mut session, &mut TerminalConsole).await;

    info!("Chat ended");
    Ok(())
}
