use calendar_agent::components::google_calendar::CredentialManager;
use calendar_agent::config::load_credential_paths;
use calendar_agent::error::AgentResult;

#[tokio::main(flavor = "current_thread")]
async fn main() -> AgentResult<()> {
    let (credentials_path, token_path) = load_credential_paths()?;

    // Always runs the consent flow, replacing any stored token
    let manager = CredentialManager::with_paths(&token_path, &credentials_path);
    let credential = manager.authorize().await?;

    println!("Token successfully saved to {}", manager.token_path().display());
    if credential.refresh_token.is_none() {
        println!("Warning: no refresh token was issued; you will need to authorize again after expiry.");
    }

    Ok(())
}
