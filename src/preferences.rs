// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::catalog::{SubscriptionFrequency, SubscriptionTier};
use crate::error::PreferenceError;

const PREFERENCES_FILENAME: &str = "upgrade-preferences.json";

/// The user's last explicit tier and frequency choice
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionPreference {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tier: Option<SubscriptionTier>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frequency: Option<SubscriptionFrequency>,
}

/// Durable storage for the last selected tier and frequency
///
/// Each setter is an independent upsert of its own field.
pub trait PreferenceStore: Send + Sync {
    fn last_tier(&self) -> Result<Option<SubscriptionTier>, PreferenceError>;
    fn last_frequency(&self) -> Result<Option<SubscriptionFrequency>, PreferenceError>;
    fn set_last_tier(&self, tier: SubscriptionTier) -> Result<(), PreferenceError>;
    fn set_last_frequency(&self, frequency: SubscriptionFrequency) -> Result<(), PreferenceError>;

    /// Read both fields at once
    fn load(&self) -> Result<SelectionPreference, PreferenceError> {
        Ok(SelectionPreference {
            tier: self.last_tier()?,
            frequency: self.last_frequency()?,
        })
    }
}

/// On-disk representation of the preference file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct PreferenceFile {
    #[serde(flatten)]
    selection: SelectionPreference,
    #[serde(skip_serializing_if = "Option::is_none")]
    updated_at: Option<DateTime<Utc>>,
}

/// Preference store backed by a JSON file in a directory
#[derive(Debug)]
pub struct JsonPreferenceStore {
    path: PathBuf,
    // Serializes read-modify-write cycles
    lock: Mutex<()>,
}

impl JsonPreferenceStore {
    /// Store preferences in `upgrade-preferences.json` inside the given directory
    pub fn in_dir(dir: &Path) -> Self {
        Self::at_path(dir.join(PREFERENCES_FILENAME))
    }

    pub fn at_path(path: PathBuf) -> Self {
        Self {
            path,
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<PreferenceFile, PreferenceError> {
        if !self.path.exists() {
            return Ok(PreferenceFile::default());
        }

        let content =
            std::fs::read_to_string(&self.path).map_err(|e| PreferenceError::ReadFailed {
                path: self.path.clone(),
                source: e,
            })?;

        serde_json::from_str(&content).map_err(|e| PreferenceError::JsonParseFailed {
            path: self.path.clone(),
            source: e,
        })
    }

    fn write(&self, mut file: PreferenceFile) -> Result<(), PreferenceError> {
        file.updated_at = Some(Utc::now());
        let json = serde_json::to_string_pretty(&file)?;

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| PreferenceError::WriteFailed {
                path: self.path.clone(),
                source: e,
            })?;
        }

        std::fs::write(&self.path, json).map_err(|e| PreferenceError::WriteFailed {
            path: self.path.clone(),
            source: e,
        })
    }

    fn update(&self, apply: impl FnOnce(&mut SelectionPreference)) -> Result<(), PreferenceError> {
        let _guard = self.lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut file = self.read()?;
        apply(&mut file.selection);
        self.write(file)
    }
}

impl PreferenceStore for JsonPreferenceStore {
    fn last_tier(&self) -> Result<Option<SubscriptionTier>, PreferenceError> {
        Ok(self.read()?.selection.tier)
    }

    fn last_frequency(&self) -> Result<Option<SubscriptionFrequency>, PreferenceError> {
        Ok(self.read()?.selection.frequency)
    }

    fn set_last_tier(&self, tier: SubscriptionTier) -> Result<(), PreferenceError> {
        self.update(|selection| selection.tier = Some(tier))
    }

    fn set_last_frequency(&self, frequency: SubscriptionFrequency) -> Result<(), PreferenceError> {
        self.update(|selection| selection.frequency = Some(frequency))
    }
}

/// Preference store that lives only as long as the process
#[derive(Debug, Default)]
pub struct MemoryPreferenceStore {
    selection: Mutex<SelectionPreference>,
}

impl MemoryPreferenceStore {
    pub fn new(selection: SelectionPreference) -> Self {
        Self {
            selection: Mutex::new(selection),
        }
    }

    /// Current contents, for inspection
    pub fn snapshot(&self) -> SelectionPreference {
        *self.lock()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SelectionPreference> {
        self.selection
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl PreferenceStore for MemoryPreferenceStore {
    fn last_tier(&self) -> Result<Option<SubscriptionTier>, PreferenceError> {
        Ok(self.lock().tier)
    }

    fn last_frequency(&self) -> Result<Option<SubscriptionFrequency>, PreferenceError> {
        Ok(self.lock().frequency)
    }

    fn set_last_tier(&self, tier: SubscriptionTier) -> Result<(), PreferenceError> {
        self.lock().tier = Some(tier);
        Ok(())
    }

    fn set_last_frequency(&self, frequency: SubscriptionFrequency) -> Result<(), PreferenceError> {
        self.lock().frequency = Some(frequency);
        Ok(())
    }
}
