//! src/main.rs

use anyhow::Result;
use clap::Parser;
use colored::Colorize;
use tokio_util::sync::CancellationToken;

mod auth;
mod cli;
mod commands;
mod config;
mod errors;
mod git;
mod llm;
mod storage;
mod style;

use cli::{Cli, Commands};
use commands::commit::CommitOptions;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    pretty_env_logger::init();

    let cli = Cli::parse();

    // Ctrl-C 取消正在进行的网络请求
    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    let paths = config::Paths::discover();
    if paths.root().is_none() {
        log::warn!("No config directory found, running without persistent state");
    }

    if let Err(err) = run(cli.command, &paths, &cancel).await {
        if was_cancelled(&err) {
            eprintln!("{}", "Cancelled.".yellow());
            std::process::exit(130);
        }
        return Err(err);
    }
    Ok(())
}

fn was_cancelled(err: &anyhow::Error) -> bool {
    err.chain()
        .filter_map(|cause| cause.downcast_ref::<errors::Error>())
        .any(errors::Error::is_cancelled)
}

async fn run(command: Commands, paths: &config::Paths, cancel: &CancellationToken) -> Result<()> {
    match command {
        Commands::Login => {
            let config = config::load_config(paths)?;
            commands::auth::handle_login(&config, paths, cancel).await?;
        }
        Commands::Logout => {
            commands::auth::handle_logout(paths).await?;
        }
        Commands::Commit {
            path,
            stage,
            title_only,
            style,
            no_commit,
            no_edit,
        } => {
            let config = config::load_config(paths)?;
            let options = CommitOptions {
                path,
                stage,
                title_only,
                style,
                no_commit,
                no_edit,
            };
            commands::commit::handle_commit(options, config, paths, cancel).await?;
        }
        Commands::Style { command } => {
            commands::style::handle_style(command, paths).await?;
        }
        Commands::Models => {
            let config = config::load_config(paths)?;
            commands::catalog::handle_models(config, paths, cancel).await?;
        }
        Commands::Agents => {
            let config = config::load_config(paths)?;
            commands::catalog::handle_agents(config, paths, cancel).await?;
        }
        Commands::Init => {
            commands::init::handle_init(paths).await?;
        }
    }

    Ok(())
}
