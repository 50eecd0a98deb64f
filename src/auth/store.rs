//! src/auth/store.rs

use crate::config::Paths;
use crate::errors::{Error, Result};
use crate::storage;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io;
use std::path::PathBuf;
use tokio::fs;

pub const PROVIDER_HOST: &str = "github.com";

/// The OAuth token produced by the device flow. Replaced or deleted, never edited.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LongLivedCredential {
    #[serde(default)]
    pub user: String,
    pub oauth_token: String,
    #[serde(rename = "githubAppId", default)]
    pub github_app_id: String,
}

/// `"github.com:<client-id>"`
pub fn credential_key(client_id: &str) -> String {
    format!("{PROVIDER_HOST}:{client_id}")
}

type CredentialMap = BTreeMap<String, LongLivedCredential>;

/// Reads credentials from the files the Copilot editor plugins share, writes to `apps.json`.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    search_paths: Vec<PathBuf>,
    target: Option<PathBuf>,
}

impl CredentialStore {
    pub fn new(paths: &Paths) -> Self {
        Self {
            search_paths: paths.credential_files(),
            target: paths.apps_file(),
        }
    }

    /// First credential for the provider across the known cache files.
    pub async fn load(&self) -> Option<LongLivedCredential> {
        for path in &self.search_paths {
            let Some(entries) = storage::load_json::<CredentialMap>(path).await else {
                continue;
            };

            let found = entries
                .into_iter()
                .find(|(key, credential)| {
                    key.starts_with(PROVIDER_HOST) && !credential.oauth_token.is_empty()
                });
            if let Some((key, credential)) = found {
                log::debug!("Using credential '{}' from {}", key, path.display());
                return Some(credential);
            }
        }
        None
    }

    /// Exact lookup of the credential this tool stored for `client_id`.
    pub async fn load_for(&self, client_id: &str) -> Option<LongLivedCredential> {
        let path = self.target.as_ref()?;
        let mut entries = storage::load_json::<CredentialMap>(path).await?;
        entries.remove(&credential_key(client_id))
    }

    /// Upserts the credential, leaving entries for other apps untouched.
    pub async fn save(&self, credential: &LongLivedCredential) -> Result<()> {
        let path = self.target.as_ref().ok_or_else(|| {
            Error::io(
                "save credential",
                io::Error::new(io::ErrorKind::NotFound, "no config directory available"),
            )
        })?;

        let mut entries: CredentialMap = storage::load_json(path).await.unwrap_or_default();
        entries.insert(credential_key(&credential.github_app_id), credential.clone());
        storage::save_json("save credential", path, &entries).await
    }

    /// Removes `apps.json`. Returns `false` when there was nothing to remove.
    pub async fn delete(&self) -> Result<bool> {
        let Some(path) = &self.target else {
            return Ok(false);
        };
        match fs::remove_file(path).await {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(source) => Err(Error::io("remove credential", source)),
        }
    }
}
