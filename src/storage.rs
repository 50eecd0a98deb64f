//! src/storage.rs
//
// JSON cache files. Reads are opportunistic, writes are explicit.

use crate::errors::{Error, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;
use tokio::fs;

/// Reads and decodes a JSON file. Missing or malformed files count as absent.
pub async fn load_json<T: DeserializeOwned>(path: &Path) -> Option<T> {
    let content = match fs::read_to_string(path).await {
        Ok(content) => content,
        Err(err) => {
            log::debug!("Cache {} not loaded: {}", path.display(), err);
            return None;
        }
    };

    match serde_json::from_str(&content) {
        Ok(value) => Some(value),
        Err(err) => {
            log::debug!("Cache {} is malformed, ignoring it: {}", path.display(), err);
            None
        }
    }
}

/// Writes `value` as pretty JSON, creating parent directories as needed.
pub async fn save_json<T: Serialize + ?Sized>(step: &'static str, path: &Path, value: &T) -> Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)
            .await
            .map_err(|source| Error::io(step, source))?;
    }

    let content =
        serde_json::to_string_pretty(value).map_err(|source| Error::Decode { step, source })?;
    fs::write(path, content)
        .await
        .map_err(|source| Error::io(step, source))?;

    log::debug!("Saved {}", path.display());
    Ok(())
}
