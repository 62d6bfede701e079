use calendar_agent::startup;
use tracing::info;

#[tokio::main(flavor = "current_thread")]
async fn main() -> miette::Result<()> {
    // Initialize logging
    startup::init_logging()?;

    info!("Starting calendar agent");

    // Load configuration
    let config = startup::load_config()?;

    // Authorize and chat
    startup::run_agent(config).await
}
