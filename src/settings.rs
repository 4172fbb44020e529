//! Deployment settings for the DFU service, persisted as JSON.
//!
//! This module provides:
//! - `DfuSettings` with the device address policy and default tuning options
//! - Persistence to a JSON file in the app data directory
//!
//! ## Extensibility
//!
//! To add a new setting:
//! 1. Add the field to `DfuSettings` with `#[serde(default)]`
//! 2. Read it in `spawn_dfu_service`

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::dfu::{AddressPolicy, AddressPolicyKind, DfuOptions};

/// Settings applied to every DFU session started by this process.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DfuSettings {
    /// How device identifiers are validated on this platform.
    #[serde(default)]
    pub address_policy: AddressPolicyKind,

    /// Options used where a request leaves a field unset.
    #[serde(default)]
    pub default_options: DfuOptions,
}

impl DfuSettings {
    /// Address policy to build the coordinator with.
    pub fn address_policy(&self) -> AddressPolicy {
        self.address_policy.into()
    }
}

/// Settings file name stored in app data directory.
const SETTINGS_FILENAME: &str = "dfu_settings.json";

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Failed to read {}: {source}", .path.display())]
    Read { path: PathBuf, source: io::Error },

    #[error("Failed to write {}: {source}", .path.display())]
    Write { path: PathBuf, source: io::Error },

    #[error("Invalid DFU settings in {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Failed to serialize DFU settings: {0}")]
    Serialize(#[source] serde_json::Error),
}

/// Loads and stores [`DfuSettings`] in an app data directory.
pub struct SettingsManager {
    path: PathBuf,
}

impl SettingsManager {
    pub fn new(app_data_dir: &Path) -> Self {
        Self {
            path: app_data_dir.join(SETTINGS_FILENAME),
        }
    }

    /// Missing and blank files both yield defaults.
    pub fn load(&self) -> Result<DfuSettings, SettingsError> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No DFU settings file, using defaults");
                return Ok(DfuSettings::default());
            }
            Err(source) => {
                return Err(SettingsError::Read {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        if contents.trim().is_empty() {
            return Ok(DfuSettings::default());
        }

        let settings: DfuSettings =
            serde_json::from_str(&contents).map_err(|source| SettingsError::Parse {
                path: self.path.clone(),
                source,
            })?;
        debug!(
            path = %self.path.display(),
            address_policy = ?settings.address_policy,
            "Loaded DFU settings"
        );
        Ok(settings)
    }

    pub fn save(&self, settings: &DfuSettings) -> Result<(), SettingsError> {
        let write_error = |source: io::Error| SettingsError::Write {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(write_error)?;
        }
        let contents = serde_json::to_string_pretty(settings).map_err(SettingsError::Serialize)?;
        fs::write(&self.path, contents).map_err(write_error)
    }
}
