use anyhow::{Context, Result};
use log::warn;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::PathBuf,
    sync::{PoisonError, RwLock},
};

use crate::ritual::{MiniGameKind, PhaseKind, RitualConfiguration};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserSettings {
    pub phase_order: Vec<PhaseKind>,
    pub mini_game: MiniGameKind,
    pub sound_enabled: bool,
    pub onboarding_complete: bool,
}

impl Default for UserSettings {
    fn default() -> Self {
        Self {
            phase_order: PhaseKind::ALL.to_vec(),
            mini_game: MiniGameKind::default(),
            sound_enabled: true,
            onboarding_complete: false,
        }
    }
}

impl UserSettings {
    /// Configuration for the next ritual. A stored order that is not a
    /// permutation of the three phases falls back to the default order.
    pub fn ritual_configuration(&self) -> RitualConfiguration {
        match RitualConfiguration::new(&self.phase_order, self.mini_game, self.sound_enabled) {
            Ok(config) => config,
            Err(err) => {
                warn!("Ignoring stored phase order {:?}: {err}", self.phase_order);
                let default_order = UserSettings::default().phase_order;
                RitualConfiguration::new(&default_order, self.mini_game, self.sound_enabled)
                    .unwrap_or_default()
            }
        }
    }
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
                warn!("Settings at {} unreadable, using defaults: {err}", path.display());
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

    pub fn user_settings(&self) -> UserSettings {
        self.data
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn ritual_configuration(&self) -> RitualConfiguration {
        self.user_settings().ritual_configuration()
    }

    /// Rejects anything that is not an ordering of all three phases, so an
    /// invalid order never reaches disk.
    pub fn set_phase_order(&self, order: &[PhaseKind]) -> Result<()> {
        let current = self.user_settings();
        RitualConfiguration::new(order, current.mini_game, current.sound_enabled)?;
        self.update(|settings| settings.phase_order = order.to_vec())
    }

    pub fn set_mini_game(&self, mini_game: MiniGameKind) -> Result<()> {
        self.update(|settings| settings.mini_game = mini_game)
    }

    pub fn set_sound_enabled(&self, enabled: bool) -> Result<()> {
        self.update(|settings| settings.sound_enabled = enabled)
    }

    pub fn complete_onboarding(&self) -> Result<()> {
        self.update(|settings| settings.onboarding_complete = true)
    }

    fn update<F>(&self, change: F) -> Result<()>
    where
        F: FnOnce(&mut UserSettings),
    {
        let mut guard = self.data.write().unwrap_or_else(PoisonError::into_inner);
        change(&mut guard);
        self.persist(&guard)
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
