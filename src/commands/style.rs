use crate::cli::StyleCommands;
use crate::config::Paths;
use crate::style::{StyleRecord, StyleRegistry, SyncAction};
use anyhow::{Context, Result};
use colored::Colorize;
use dialoguer::{theme::ColorfulTheme, Confirm};

pub async fn handle_style(command: StyleCommands, paths: &Paths) -> Result<()> {
    let mut registry = StyleRegistry::open(paths.styles_file()).await;

    match command {
        StyleCommands::List => {
            for style in registry.list() {
                println!("{}: {}", style.name, style.description);
            }
        }
        StyleCommands::Add {
            name,
            description,
            prompt,
        } => {
            registry
                .add(StyleRecord::new(name.clone(), description, prompt))
                .await
                .context("Error adding style")?;
            println!("Successfully added style '{}'", name.green());
        }
        StyleCommands::Remove { name } => {
            registry.remove(&name).await.context("Error removing style")?;
            println!("Successfully removed style '{}'", name.green());
        }
        StyleCommands::Sync { yes } => handle_sync(&mut registry, yes).await?,
    }
    Ok(())
}

async fn handle_sync(registry: &mut StyleRegistry, yes: bool) -> Result<()> {
    let changes: Vec<_> = registry
        .preview_sync()
        .into_iter()
        .filter(|change| change.action != SyncAction::Keep)
        .collect();

    if changes.is_empty() {
        println!("No changes needed. All styles are up to date.");
        return Ok(());
    }

    println!("The following changes will be made:");
    for change in &changes {
        match change.action {
            SyncAction::Update => println!("  • Update style: {}", change.name.yellow()),
            SyncAction::Add => println!("  • Add style: {}", change.name.green()),
            SyncAction::Keep => {}
        }
    }

    if !yes
        && !Confirm::with_theme(&ColorfulTheme::default())
            .with_prompt("Do you want to proceed?")
            .default(false)
            .interact()?
    {
        println!("Sync cancelled.");
        return Ok(());
    }

    let synced = registry.sync().await.context("Error syncing styles")?;
    println!("Successfully synced {} commit styles", synced.len());
    Ok(())
}
