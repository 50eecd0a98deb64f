//! src/git.rs

use crate::errors::{Error, Result};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

/// A working tree addressed with `git -C <repo>`.
#[derive(Debug, Clone)]
pub struct Git {
    repo: PathBuf,
}

pub fn ensure_git_available() -> Result<PathBuf> {
    which::which("git").map_err(|e| Error::git("lookup", e.to_string()))
}

impl Git {
    pub fn new(repo: impl Into<PathBuf>) -> Self {
        Self { repo: repo.into() }
    }

    fn command(&self) -> Command {
        let mut command = Command::new("git");
        command.arg("-C").arg(&self.repo);
        command
    }

    /// Runs git with captured output and returns stdout.
    pub async fn run(&self, step: &'static str, args: &[&str]) -> Result<String> {
        log::debug!("git -C {} {}", self.repo.display(), args.join(" "));
        let output = self
            .command()
            .args(args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| Error::git(step, e.to_string()))?;

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).into_owned())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(Error::git(
                step,
                format!("exited with {}: {}", output.status, stderr.trim()),
            ))
        }
    }

    /// Trimmed diff; empty means nothing to commit.
    pub async fn diff(&self, staged: bool) -> Result<String> {
        let mut args = vec!["diff"];
        if staged {
            args.push("--staged");
        }
        args.extend(["--no-color", "--no-ext-diff"]);
        let diff = self.run("diff", &args).await?;
        Ok(diff.trim().to_string())
    }

    pub async fn stage(&self) -> Result<()> {
        self.run("add", &["add", "-A"]).await.map(|_| ())
    }

    /// Commits with the message in `message_file`. The terminal is handed to
    /// git so the editor can open when `edit` is set.
    pub async fn commit(&self, message_file: &Path, edit: bool) -> Result<()> {
        let mut command = self.command();
        command.arg("commit");
        if edit {
            command.arg("-e");
        }
        command
            .arg("-F")
            .arg(message_file)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());

        let status = command
            .status()
            .await
            .map_err(|e| Error::git("commit", e.to_string()))?;
        if status.success() {
            Ok(())
        } else {
            Err(Error::git("commit", format!("exited with {status}")))
        }
    }
}
