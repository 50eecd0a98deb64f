//! src/cli.rs
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Writes git commit messages with GitHub Copilot
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Authenticate with GitHub using the device flow.
    Login,
    /// Remove the credential stored by `login`.
    Logout,
    /// Generate a commit message for the staged changes and commit.
    #[command(alias = "c")]
    Commit {
        /// Path to the git repository. Defaults to the current directory.
        #[arg(short, long)]
        path: Option<PathBuf>,

        /// Stage all changes before committing, same as `git add -A`
        #[arg(short, long)]
        stage: bool,

        /// Generate only the commit title
        #[arg(short, long)]
        title_only: bool,

        /// Style of the commit message, see `lazycopilot style list`
        #[arg(short = 'S', long, default_value = "normal")]
        style: String,

        /// Print the message instead of committing
        #[arg(short, long)]
        no_commit: bool,

        /// Commit without opening the editor
        #[arg(long)]
        no_edit: bool,
    },
    /// Manage commit message styles.
    Style {
        #[command(subcommand)]
        command: StyleCommands,
    },
    /// List the chat models available to this account.
    Models,
    /// List the Copilot agents available to this account.
    Agents,
    /// Initialize lazycopilot configuration file.
    #[command(alias = "i")]
    Init,
}

#[derive(Subcommand, Debug)]
pub enum StyleCommands {
    /// List all available commit styles
    List,
    /// Add a new commit style
    Add {
        name: String,
        description: String,
        prompt: String,
    },
    /// Remove a commit style
    Remove { name: String },
    /// Sync commit styles with the default styles
    Sync {
        /// Apply without asking for confirmation
        #[arg(short, long)]
        yes: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn commit_flags_parse() {
        let cli = Cli::try_parse_from(["lazycopilot", "commit", "-s", "-t", "-S", "funny", "-n"]).unwrap();
        match cli.command {
            Commands::Commit {
                path,
                stage,
                title_only,
                style,
                no_commit,
                no_edit,
            } => {
                assert!(path.is_none());
                assert!(stage && title_only && no_commit);
                assert!(!no_edit);
                assert_eq!(style, "funny");
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}
