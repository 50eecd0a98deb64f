use crate::auth::{self, CredentialStore, DeviceFlow, LongLivedCredential};
use crate::config::{Config, Paths};
use crate::llm::http;
use anyhow::{anyhow, Context, Result};
use colored::Colorize;
use tokio_util::sync::CancellationToken;

pub async fn handle_login(config: &Config, paths: &Paths, cancel: &CancellationToken) -> Result<()> {
    let store = CredentialStore::new(paths);
    let client = http::build_client()?;

    if let Some(existing) = store.load_for(&config.client_id).await {
        match auth::fetch_user(&client, &config.endpoints, cancel, &existing.oauth_token).await {
            Ok(user) => {
                println!("Already authenticated as: {}", user.login.green());
                return Ok(());
            }
            Err(e) => log::debug!("Stored credential rejected, starting a new login: {e}"),
        }
    }

    let flow = DeviceFlow::new(&client, &config.endpoints, &config.client_id);
    let token = flow
        .authorize(cancel, |code| {
            println!("Code: {}", code.user_code.bold().yellow());
            println!("Navigate to the URL and paste the code: {}", code.verification_uri.cyan());
        })
        .await
        .context("Failed to authenticate with GitHub. Please try again.")?;

    let user = auth::fetch_user(&client, &config.endpoints, cancel, &token)
        .await
        .context("Failed to fetch user info. Ensure your token is valid and try again.")?;

    let credential = LongLivedCredential {
        user: user.login,
        oauth_token: token,
        github_app_id: config.client_id.clone(),
    };
    store
        .save(&credential)
        .await
        .context("Failed to save the token. Check your file permissions and try again.")?;

    println!("{}", "Authentication successful.".green());
    Ok(())
}

pub async fn handle_logout(paths: &Paths) -> Result<()> {
    let removed = CredentialStore::new(paths)
        .delete()
        .await
        .context("Failed to remove the authentication file.")?;
    if !removed {
        return Err(anyhow!("no authentication found. You are not logged in."));
    }

    println!(
        "Logged out successfully. Please revoke the token manually from your GitHub account settings."
    );
    Ok(())
}
