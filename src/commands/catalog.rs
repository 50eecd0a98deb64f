use super::spinner;
use crate::config::{Config, Paths};
use crate::llm::CopilotClient;
use anyhow::{Context, Result};
use colored::Colorize;
use tokio_util::sync::CancellationToken;

pub async fn handle_models(config: Config, paths: &Paths, cancel: &CancellationToken) -> Result<()> {
    let mut client = CopilotClient::new(config, paths).await?;
    let current = client.config().model.clone();

    let progress_bar = spinner("Fetching models...");
    let models = client.models(cancel).await;
    progress_bar.finish_and_clear();
    let models = models.context("Failed to fetch the model catalog.")?;

    for model in models.values() {
        let marker = if model.id == current { "*" } else { " " };
        let mut line = format!(
            "{marker} {}: {} ({}, {} prompt tokens)",
            model.id.bold(),
            model.name,
            model.vendor,
            model.capabilities.limits.max_prompt_tokens
        );
        if model.preview {
            line.push_str(&format!(" {}", "[preview]".yellow()));
        }
        println!("{line}");
    }
    Ok(())
}

pub async fn handle_agents(config: Config, paths: &Paths, cancel: &CancellationToken) -> Result<()> {
    let mut client = CopilotClient::new(config, paths).await?;

    let progress_bar = spinner("Fetching agents...");
    let agents = client.agents(cancel).await;
    progress_bar.finish_and_clear();
    let agents = agents.context("Failed to fetch the agent catalog.")?;

    for agent in agents.values() {
        let marker = if agent.default { "*" } else { " " };
        println!("{marker} {}: {}", agent.slug.bold(), agent.description);
    }
    Ok(())
}
