use super::spinner;
use crate::config::{Config, Paths};
use crate::git::{self, Git};
use crate::llm::{generate_commit_message, CopilotClient};
use crate::style::StyleRegistry;
use anyhow::{anyhow, Context, Result};
use colored::Colorize;
use std::io::Write;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

pub struct CommitOptions {
    pub path: Option<PathBuf>,
    pub stage: bool,
    pub title_only: bool,
    pub style: String,
    pub no_commit: bool,
    pub no_edit: bool,
}

/// Title, a blank line, then the body when there is one.
pub fn commit_file_content(message: &str) -> String {
    match message.split_once('\n') {
        Some((title, body)) if !body.trim().is_empty() => {
            format!("{}\n\n{}", title.trim_end(), body.trim_start_matches('\n'))
        }
        Some((title, _)) => title.trim_end().to_string(),
        None => message.to_string(),
    }
}

pub async fn handle_commit(
    options: CommitOptions,
    config: Config,
    paths: &Paths,
    cancel: &CancellationToken,
) -> Result<()> {
    let path = match options.path {
        Some(path) => path,
        None => std::env::current_dir().context("Failed to read the current directory.")?,
    };
    if !path.exists() {
        return Err(anyhow!(
            "The specified path '{}' is not valid or does not exist.",
            path.display()
        ));
    }

    git::ensure_git_available().context("git is not installed or not on PATH.")?;
    let repo = Git::new(&path);

    let diff = if options.stage {
        repo.stage().await.context("Failed to stage changes.")?;
        let diff = repo.diff(true).await.context("Failed to read the staged diff.")?;
        if diff.is_empty() {
            return Err(anyhow!(
                "No changes detected to commit after staging. Please make sure you have changes to commit."
            ));
        }
        diff
    } else {
        let diff = repo.diff(true).await.context("Failed to read the staged diff.")?;
        if diff.is_empty() {
            return Err(anyhow!(
                "No staged changes detected. Use the --stage flag to stage all changes before committing."
            ));
        }
        diff
    };

    let styles = StyleRegistry::open(paths.styles_file()).await;
    if !styles.is_valid(&options.style) {
        return Err(anyhow!(
            "Invalid style '{}'. Available styles: {}",
            options.style,
            styles.names().join(", ")
        ));
    }

    let mut client = CopilotClient::new(config, paths).await?;
    let progress_bar = spinner("Copilot is writing the commit message...");
    let message = generate_commit_message(
        &mut client,
        cancel,
        &diff,
        options.title_only,
        styles.prompt_for(&options.style),
    )
    .await;
    progress_bar.finish_and_clear();
    let message = message.context("Failed to generate commit message.")?;

    if options.no_commit {
        println!("{message}");
        return Ok(());
    }

    let mut commit_file = tempfile::Builder::new()
        .prefix("commitmsg")
        .tempfile()
        .context("Failed to create temporary file for commit message.")?;
    commit_file
        .write_all(commit_file_content(&message).as_bytes())
        .context("Failed to write the commit message file.")?;
    commit_file.flush()?;

    repo.commit(commit_file.path(), !options.no_edit)
        .await
        .context("Failed to commit changes.")?;
    println!("{}", "🚀 Committed.".green());
    Ok(())
}
