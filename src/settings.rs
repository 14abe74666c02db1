use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf, sync::RwLock};

use crate::capture::CaptureRegion;
use crate::ocr::tesseract::DEFAULT_LANGUAGE;
use crate::shortcut::ShortcutBinding;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SoundSettings {
    pub enabled: bool,
}

impl Default for SoundSettings {
    fn default() -> Self {
        Self { enabled: true }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrSettings {
    pub language: String,
}

impl Default for OcrSettings {
    fn default() -> Self {
        Self {
            language: DEFAULT_LANGUAGE.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureSettings {
    pub region: Option<CaptureRegion>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserSettings {
    pub shortcut: Option<ShortcutBinding>,
    pub sound: SoundSettings,
    pub ocr: OcrSettings,
    pub capture: CaptureSettings,
    pub knowledge_dir: Option<PathBuf>,
}

pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<UserSettings>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_else(|err| {
                log::warn!(
                    "Ignoring unparseable settings in {}: {err}",
                    path.display()
                );
                UserSettings::default()
            })
        } else {
            UserSettings::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    /// `<config_dir>/avr/settings.json`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("avr").join("settings.json"))
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    pub fn snapshot(&self) -> UserSettings {
        self.data
            .read()
            .map(|guard| guard.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }

    /// Applies `change` and writes the result to disk.
    pub fn update<F>(&self, change: F) -> Result<UserSettings>
    where
        F: FnOnce(&mut UserSettings),
    {
        let mut guard = self
            .data
            .write()
            .map_err(|_| anyhow::anyhow!("settings lock poisoned"))?;
        change(&mut *guard);
        self.persist(&guard)?;
        Ok(guard.clone())
    }

    fn persist(&self, data: &UserSettings) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }
}
