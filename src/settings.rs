use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf, sync::RwLock};

use crate::attention::{AttentionConfig, RewindPolicy};
use crate::playback::{clamp_font_size, clamp_units_per_step, clamp_wpm};
use crate::remote::{Comprehension, Goal, SummaryLength};

const ENABLE_LOGS: bool = true;

use crate::log_warn;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReaderSettings {
    pub wpm: u32,
    pub units_per_step: usize,
    pub font_size: u32,
    pub smart_pacer_default: bool,
    pub comprehension: Comprehension,
    pub goal: Goal,
    pub summary_length: SummaryLength,
    pub rewind_policy: RewindPolicy,
    pub attention: AttentionConfig,
}

impl Default for ReaderSettings {
    fn default() -> Self {
        Self {
            wpm: 300,
            units_per_step: 1,
            font_size: 48,
            smart_pacer_default: false,
            comprehension: Comprehension::default(),
            goal: Goal::default(),
            summary_length: SummaryLength::default(),
            rewind_policy: RewindPolicy::default(),
            attention: AttentionConfig::default(),
        }
    }
}

impl ReaderSettings {
    /// Pulls hand-edited values back into their allowed ranges.
    pub fn normalized(mut self) -> Self {
        self.wpm = clamp_wpm(self.wpm);
        self.units_per_step = clamp_units_per_step(self.units_per_step);
        self.font_size = clamp_font_size(self.font_size);
        self
    }
}

pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<ReaderSettings>,
}

impl SettingsStore {
    /// Opens the settings file, writing defaults when it does not exist yet.
    /// A file that fails to parse is ignored in favour of defaults.
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str::<ReaderSettings>(&contents)
                .map(ReaderSettings::normalized)
                .unwrap_or_else(|err| {
                    log_warn!("ignoring unreadable settings at {}: {err}", path.display());
                    ReaderSettings::default()
                })
        } else {
            ReaderSettings::default()
        };

        let store = Self {
            path,
            data: RwLock::new(data),
        };
        if !store.path.exists() {
            store.persist(&store.get()?)?;
        }
        Ok(store)
    }

    pub fn get(&self) -> Result<ReaderSettings> {
        self.data
            .read()
            .map(|guard| guard.clone())
            .map_err(|_| anyhow!("settings lock poisoned"))
    }

    pub fn update<F>(&self, apply: F) -> Result<ReaderSettings>
    where
        F: FnOnce(&mut ReaderSettings),
    {
        let mut guard = self
            .data
            .write()
            .map_err(|_| anyhow!("settings lock poisoned"))?;
        let mut next = guard.clone();
        apply(&mut next);
        let next = next.normalized();
        self.persist(&next)?;
        *guard = next.clone();
        Ok(next)
    }

    pub fn reload(&self) -> Result<ReaderSettings> {
        let contents = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read settings from {}", self.path.display()))?;
        let data = serde_json::from_str::<ReaderSettings>(&contents)
            .context("settings file is not valid JSON")?
            .normalized();
        let mut guard = self
            .data
            .write()
            .map_err(|_| anyhow!("settings lock poisoned"))?;
        *guard = data.clone();
        Ok(data)
    }

    fn persist(&self, data: &ReaderSettings) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create settings directory {}", parent.display())
                })?;
            }
        }
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_created_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");
        let store = SettingsStore::new(path.clone()).unwrap();
        assert_eq!(store.get().unwrap(), ReaderSettings::default());
        assert!(path.exists());
    }

    #[test]
    fn corrupt_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "{ not json").unwrap();
        let store = SettingsStore::new(path).unwrap();
        assert_eq!(store.get().unwrap().wpm, 300);
    }

    #[test]
    fn update_persists_and_clamps() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let store = SettingsStore::new(path.clone()).unwrap();
        let saved = store
            .update(|s| {
                s.wpm = 5000;
                s.units_per_step = 3;
                s.rewind_policy = RewindPolicy::WpmScaled;
            })
            .unwrap();
        assert_eq!(saved.wpm, 1500);

        let reopened = SettingsStore::new(path).unwrap().get().unwrap();
        assert_eq!(reopened.wpm, 1500);
        assert_eq!(reopened.units_per_step, 3);
        assert_eq!(reopened.rewind_policy, RewindPolicy::WpmScaled);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(
            &path,
            r#"{"wpm": 450, "comprehension": "skim", "attention": {"lostMs": 2000}}"#,
        )
        .unwrap();
        let settings = SettingsStore::new(path).unwrap().get().unwrap();
        assert_eq!(settings.wpm, 450);
        assert_eq!(settings.comprehension, Comprehension::Skim);
        assert_eq!(settings.attention.lost_ms, 2000);
        assert_eq!(settings.attention.recover_ms, 200);
        assert_eq!(settings.font_size, 48);
    }

    #[test]
    fn reload_picks_up_external_edits() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let store = SettingsStore::new(path.clone()).unwrap();
        fs::write(&path, r#"{"fontSize": 10}"#).unwrap();
        assert_eq!(store.reload().unwrap().font_size, 16);
    }
}
