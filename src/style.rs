//! src/style.rs
//
// Named commit styles. Each style contributes a prompt fragment that is
// appended to the commit instruction.

use crate::errors::{Error, Result};
use crate::storage;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

const STEP_SAVE: &str = "save commit styles";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StyleRecord {
    pub name: String,
    pub description: String,
    pub prompt: String,
}

impl StyleRecord {
    pub fn new(name: impl Into<String>, description: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            prompt: prompt.into(),
        }
    }
}

pub fn default_styles() -> Vec<StyleRecord> {
    vec![
        StyleRecord::new(
            "normal",
            "Standard commit message style",
            "\n\nWriting style clear, concise, and to the point. Focus on the technical change and why it was made.",
        ),
        StyleRecord::new(
            "funny",
            "Funny commit messages",
            "\n\nWriting style humorous, lighthearted, and potentially self-deprecating. Focus on making the reader smile while still conveying the essence of the change.",
        ),
        StyleRecord::new(
            "wise",
            "Wise and inspirational commit messages",
            "\n\nWriting style wise, inspirational, and potentially poetic. Focus on providing a deeper meaning to the technical change.",
        ),
        StyleRecord::new(
            "trolling",
            "Trolling commit messages",
            "\n\nWriting style playful, slightly provocative, and potentially sarcastic. Focus on A bit of a jab, but still conveys the technical change.",
        ),
    ]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncAction {
    Keep,
    Update,
    Add,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyleChange {
    pub name: String,
    pub action: SyncAction,
}

/// One entry per current style in list order, then one `Add` per missing default.
pub fn plan_sync(current: &[StyleRecord], defaults: &[StyleRecord]) -> Vec<StyleChange> {
    let mut changes: Vec<StyleChange> = current
        .iter()
        .map(|style| {
            let action = match defaults.iter().find(|d| d.name == style.name) {
                Some(d) if d.description != style.description || d.prompt != style.prompt => SyncAction::Update,
                _ => SyncAction::Keep,
            };
            StyleChange {
                name: style.name.clone(),
                action,
            }
        })
        .collect();

    changes.extend(
        defaults
            .iter()
            .filter(|d| !current.iter().any(|style| style.name == d.name))
            .map(|d| StyleChange {
                name: d.name.clone(),
                action: SyncAction::Add,
            }),
    );
    changes
}

/// Defaults overwrite same-named records in place, customs stay put,
/// missing defaults are appended in default order.
pub fn merge_with_defaults(current: &[StyleRecord], defaults: &[StyleRecord]) -> Vec<StyleRecord> {
    let mut merged: Vec<StyleRecord> = current
        .iter()
        .map(|style| {
            defaults
                .iter()
                .find(|d| d.name == style.name)
                .unwrap_or(style)
                .clone()
        })
        .collect();

    for d in defaults {
        if !merged.iter().any(|style| style.name == d.name) {
            merged.push(d.clone());
        }
    }
    merged
}

/// Keeps the first record for each name.
fn dedup_by_name(styles: Vec<StyleRecord>) -> Vec<StyleRecord> {
    let mut unique: Vec<StyleRecord> = Vec::with_capacity(styles.len());
    for style in styles {
        if unique.iter().any(|kept| kept.name == style.name) {
            log::warn!("Ignoring duplicate commit style '{}'", style.name);
        } else {
            unique.push(style);
        }
    }
    unique
}

/// Ordered style list backed by `styles.json`.
///
/// Without a backing file the registry serves the built-in defaults and
/// every write is silently dropped.
#[derive(Debug)]
pub struct StyleRegistry {
    path: Option<PathBuf>,
    defaults: Vec<StyleRecord>,
    styles: Vec<StyleRecord>,
}

impl StyleRegistry {
    pub async fn open(path: Option<PathBuf>) -> Self {
        Self::open_with_defaults(path, default_styles()).await
    }

    pub async fn open_with_defaults(path: Option<PathBuf>, defaults: Vec<StyleRecord>) -> Self {
        let mut registry = Self {
            path,
            styles: defaults.clone(),
            defaults,
        };

        let Some(path) = registry.path.clone() else {
            log::warn!("No config directory found, commit styles will not be saved");
            return registry;
        };

        match storage::load_json::<Vec<StyleRecord>>(&path).await {
            Some(styles) => registry.styles = dedup_by_name(styles),
            None => {
                log::debug!("Seeding {} with the default styles", path.display());
                if let Err(e) = storage::save_json(STEP_SAVE, &path, &registry.defaults).await {
                    log::warn!("Could not seed commit styles: {e}");
                }
            }
        }
        registry
    }

    pub fn list(&self) -> &[StyleRecord] {
        &self.styles
    }

    pub fn names(&self) -> Vec<&str> {
        self.styles.iter().map(|style| style.name.as_str()).collect()
    }

    pub fn is_valid(&self, name: &str) -> bool {
        self.find(name).is_some()
    }

    /// Empty when the style does not exist.
    pub fn prompt_for(&self, name: &str) -> &str {
        self.find(name).map(|style| style.prompt.as_str()).unwrap_or("")
    }

    fn find(&self, name: &str) -> Option<&StyleRecord> {
        self.styles.iter().find(|style| style.name == name)
    }

    pub async fn add(&mut self, style: StyleRecord) -> Result<()> {
        if self.is_valid(&style.name) {
            return Err(Error::Conflict(style.name));
        }
        let mut styles = self.styles.clone();
        styles.push(style);
        self.store(styles).await
    }

    pub async fn remove(&mut self, name: &str) -> Result<()> {
        if !self.is_valid(name) {
            return Err(Error::NotFound(name.to_string()));
        }
        let styles = self.styles.iter().filter(|style| style.name != name).cloned().collect();
        self.store(styles).await
    }

    pub fn preview_sync(&self) -> Vec<StyleChange> {
        plan_sync(&self.styles, &self.defaults)
    }

    pub async fn sync(&mut self) -> Result<&[StyleRecord]> {
        let merged = merge_with_defaults(&self.styles, &self.defaults);
        self.store(merged).await?;
        Ok(&self.styles)
    }

    // 先写入再重新加载，内存中的列表始终与文件一致；没有文件时写入被丢弃
    async fn store(&mut self, styles: Vec<StyleRecord>) -> Result<()> {
        let Some(path) = &self.path else {
            log::debug!("No styles file, discarding the change");
            return Ok(());
        };
        storage::save_json(STEP_SAVE, path, &styles).await?;
        let reloaded = storage::load_json(path).await.unwrap_or(styles);
        self.styles = dedup_by_name(reloaded);
        Ok(())
    }
}
