use crate::config::{self, Paths};
use anyhow::{Context, Result};

pub async fn handle_init(paths: &Paths) -> Result<()> {
    config::create_default_config(paths)
        .await
        .context("Failed to initialize configuration.")?;
    Ok(())
}
