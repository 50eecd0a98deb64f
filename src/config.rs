//! src/config.rs

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use tokio::fs;

pub const APP_DIR_NAME: &str = "lazycopilot";
pub const COPILOT_DIR_NAME: &str = "github-copilot";
pub const CONFIG_FILE_NAME: &str = "config.toml";
pub const TOKEN_FILE_NAME: &str = "token.json";
pub const MODELS_FILE_NAME: &str = "models.json";
pub const AGENTS_FILE_NAME: &str = "agents.json";
pub const STYLES_FILE_NAME: &str = "styles.json";

/// OAuth app id of the Copilot editor plugins; the token endpoint only accepts their tokens.
pub const DEFAULT_CLIENT_ID: &str = "Iv1.b507a08c87ecfe98";
pub const DEFAULT_MODEL: &str = "gpt-4o";

const ENV_PREFIX: &str = "LAZYCOPILOT";

/// Returns the base config directory: `$XDG_CONFIG_HOME`, then `~/.config`.
///
/// Only directories that already exist are accepted. `None` puts the tool in
/// degraded mode where nothing is persisted.
pub fn get_config_root() -> Option<PathBuf> {
    if let Some(xdg) = env::var_os("XDG_CONFIG_HOME") {
        let path = PathBuf::from(xdg);
        if path.exists() {
            return Some(path);
        }
    }

    let fallback = if cfg!(windows) {
        dirs::config_dir()
    } else {
        dirs::home_dir().map(|home| home.join(".config"))
    };
    fallback.filter(|path| path.exists())
}

/// Locations of every file the tool reads or writes.
#[derive(Debug, Clone)]
pub struct Paths {
    root: Option<PathBuf>,
}

impl Paths {
    pub fn discover() -> Self {
        Self {
            root: get_config_root(),
        }
    }

    #[cfg(test)]
    pub fn at(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
        }
    }

    #[cfg(test)]
    pub fn unavailable() -> Self {
        Self { root: None }
    }

    pub fn root(&self) -> Option<&PathBuf> {
        self.root.as_ref()
    }

    pub fn app_dir(&self) -> Option<PathBuf> {
        self.root.as_ref().map(|root| root.join(APP_DIR_NAME))
    }

    fn app_file(&self, name: &str) -> Option<PathBuf> {
        self.app_dir().map(|dir| dir.join(name))
    }

    pub fn config_file(&self) -> Option<PathBuf> {
        self.app_file(CONFIG_FILE_NAME)
    }

    pub fn token_file(&self) -> Option<PathBuf> {
        self.app_file(TOKEN_FILE_NAME)
    }

    pub fn models_file(&self) -> Option<PathBuf> {
        self.app_file(MODELS_FILE_NAME)
    }

    pub fn agents_file(&self) -> Option<PathBuf> {
        self.app_file(AGENTS_FILE_NAME)
    }

    pub fn styles_file(&self) -> Option<PathBuf> {
        self.app_file(STYLES_FILE_NAME)
    }

    /// Credential caches in lookup order. The editor plugins write either file.
    pub fn credential_files(&self) -> Vec<PathBuf> {
        match &self.root {
            Some(root) => vec![
                root.join(COPILOT_DIR_NAME).join("hosts.json"),
                root.join(COPILOT_DIR_NAME).join("apps.json"),
            ],
            None => Vec::new(),
        }
    }

    /// The credential file this tool writes to on login.
    pub fn apps_file(&self) -> Option<PathBuf> {
        self.root
            .as_ref()
            .map(|root| root.join(COPILOT_DIR_NAME).join("apps.json"))
    }
}

/// Represents the main configuration for the application.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct Config {
    /// Chat model used for commit messages.
    pub model: String,
    /// Sampling temperature, ignored for reasoning models.
    pub temperature: f64,
    /// OAuth client id used by the device flow.
    pub client_id: String,
    /// Base URLs of the remote services.
    pub endpoints: Endpoints,
}

/// Base URLs, overridable for proxies and tests.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct Endpoints {
    /// Device-flow host.
    pub github: String,
    /// Token exchange and user info.
    pub github_api: String,
    /// Models, agents and chat completions.
    pub copilot_api: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            temperature: 0.1,
            client_id: DEFAULT_CLIENT_ID.to_string(),
            endpoints: Endpoints::default(),
        }
    }
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            github: "https://github.com".to_string(),
            github_api: "https://api.github.com".to_string(),
            copilot_api: "https://api.githubcopilot.com".to_string(),
        }
    }
}

impl Endpoints {
    pub fn github_url(&self, path: &str) -> String {
        join_url(&self.github, path)
    }

    pub fn github_api_url(&self, path: &str) -> String {
        join_url(&self.github_api, path)
    }

    pub fn copilot_api_url(&self, path: &str) -> String {
        join_url(&self.copilot_api, path)
    }
}

fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// Loads defaults, then `config.toml`, then `LAZYCOPILOT_*` environment variables.
pub fn load_config(paths: &Paths) -> Result<Config> {
    let mut builder = ::config::Config::builder();

    if let Some(path) = paths.config_file() {
        builder = builder.add_source(::config::File::from(path).required(false));
    }

    builder = builder.add_source(
        ::config::Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true),
    );

    let config: Config = builder
        .build()
        .context("Could not read config file")?
        .try_deserialize()
        .context("Could not parse config file")?;

    log::debug!("Loaded config: model={} api={}", config.model, config.endpoints.copilot_api);
    Ok(config)
}

/// Creates a default configuration file if one does not exist.
pub async fn create_default_config(paths: &Paths) -> Result<PathBuf> {
    let config_path = paths
        .config_file()
        .ok_or_else(|| anyhow!("No config directory found, set XDG_CONFIG_HOME or create ~/.config"))?;

    if config_path.exists() {
        println!("Config file already exists at {:?}", config_path);
        return Ok(config_path);
    }

    if let Some(dir) = config_path.parent() {
        fs::create_dir_all(dir)
            .await
            .context("Could not create config directory")?;
    }

    let config_content = toml::to_string(&Config::default())?;
    fs::write(&config_path, config_content)
        .await
        .context("Could not write config file")?;

    println!("Created default config file at {:?}", config_path);
    Ok(config_path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_without_root_resolve_nothing() {
        let paths = Paths::unavailable();
        assert!(paths.token_file().is_none());
        assert!(paths.styles_file().is_none());
        assert!(paths.credential_files().is_empty());
    }

    #[test]
    fn credential_files_are_scanned_hosts_first() {
        let paths = Paths::at("/tmp/cfg");
        let files = paths.credential_files();
        assert_eq!(files[0], PathBuf::from("/tmp/cfg/github-copilot/hosts.json"));
        assert_eq!(files[1], PathBuf::from("/tmp/cfg/github-copilot/apps.json"));
        assert_eq!(
            paths.models_file(),
            Some(PathBuf::from("/tmp/cfg/lazycopilot/models.json"))
        );
    }

    #[test]
    fn endpoint_urls_are_joined_with_a_single_slash() {
        let endpoints = Endpoints {
            copilot_api: "http://127.0.0.1:1234/".to_string(),
            ..Endpoints::default()
        };
        assert_eq!(
            endpoints.copilot_api_url("/chat/completions"),
            "http://127.0.0.1:1234/chat/completions"
        );
        assert_eq!(
            endpoints.github_url("login/device/code"),
            "https://github.com/login/device/code"
        );
    }

    #[test]
    fn config_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let app_dir = dir.path().join(APP_DIR_NAME);
        std::fs::create_dir_all(&app_dir).unwrap();
        std::fs::write(
            app_dir.join(CONFIG_FILE_NAME),
            "model = \"o1-mini\"\n[endpoints]\ncopilot_api = \"http://localhost:9\"\n",
        )
        .unwrap();

        let config = load_config(&Paths::at(dir.path())).unwrap();
        assert_eq!(config.model, "o1-mini");
        assert_eq!(config.endpoints.copilot_api, "http://localhost:9");
        assert_eq!(config.endpoints.github, "https://github.com");
        assert_eq!(config.client_id, DEFAULT_CLIENT_ID);
    }
}
