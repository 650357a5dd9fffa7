//! Console settings loaded once at start-up.
//!
//! Settings live in `settings.yaml` under the user's configuration directory
//! (`~/.config/nimbus/settings.yaml` on most platforms). `NIMBUS_SETTINGS_PATH`
//! overrides the location; a `.json` extension switches the parser. A missing
//! file means defaults.

use std::{
    cmp::Ordering,
    env, fs,
    path::{Path, PathBuf},
};

use dirs_next::config_dir;
use nimbus_types::Resource;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Environment variable allowing callers to override the settings file path.
pub const SETTINGS_PATH_ENV: &str = "NIMBUS_SETTINGS_PATH";

/// Default filename inside the configuration directory.
pub const SETTINGS_FILE_NAME: &str = "settings.yaml";

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read settings from {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid YAML settings in {path}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("invalid JSON settings in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Flavor attribute used to order flavor choices.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlavorSortKey {
    #[default]
    Ram,
    Vcpus,
    Disk,
    Name,
    Id,
}

/// Order of the flavor choices offered when launching an instance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlavorSort {
    pub key: FlavorSortKey,
    pub reverse: bool,
}

impl FlavorSort {
    /// Sorts flavors in place; ties keep their listing order.
    pub fn sort(&self, flavors: &mut [Resource]) {
        flavors.sort_by(|left, right| {
            let ordering = self.compare(left, right);
            if self.reverse { ordering.reverse() } else { ordering }
        });
    }

    fn compare(&self, left: &Resource, right: &Resource) -> Ordering {
        match self.key {
            FlavorSortKey::Ram => left.attribute_u64("ram").cmp(&right.attribute_u64("ram")),
            FlavorSortKey::Vcpus => left.attribute_u64("vcpus").cmp(&right.attribute_u64("vcpus")),
            FlavorSortKey::Disk => left.attribute_u64("disk").cmp(&right.attribute_u64("disk")),
            FlavorSortKey::Name => left.name.cmp(&right.name),
            FlavorSortKey::Id => left.id.cmp(&right.id),
        }
    }
}

/// Rule applied to the admin password of a launched instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PasswordPolicy {
    pub pattern: String,
    pub message: String,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self {
            pattern: ".*".to_string(),
            message: "Password is not accepted".to_string(),
        }
    }
}

/// Process-wide console configuration; read-only after start.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsoleSettings {
    pub flavor_sort: FlavorSort,
    pub password: PasswordPolicy,
}

impl ConsoleSettings {
    /// Loads settings from [`default_settings_path`].
    pub fn load() -> Result<Self, SettingsError> {
        Self::load_from_path(&default_settings_path())
    }

    /// Loads settings from `path`; a missing file yields defaults.
    pub fn load_from_path(path: &Path) -> Result<Self, SettingsError> {
        if !path.exists() {
            debug!(path = %path.display(), "no settings file; using defaults");
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        let is_json = path
            .extension()
            .and_then(|extension| extension.to_str())
            .is_some_and(|extension| extension.eq_ignore_ascii_case("json"));
        let settings = if is_json {
            serde_json::from_str(&content).map_err(|source| SettingsError::Json {
                path: path.to_path_buf(),
                source,
            })?
        } else {
            serde_yaml::from_str(&content).map_err(|source| SettingsError::Yaml {
                path: path.to_path_buf(),
                source,
            })?
        };

        debug!(path = %path.display(), "loaded console settings");
        Ok(settings)
    }
}

/// Returns the settings path, honoring [`SETTINGS_PATH_ENV`].
pub fn default_settings_path() -> PathBuf {
    if let Ok(path) = env::var(SETTINGS_PATH_ENV)
        && !path.trim().is_empty()
    {
        return PathBuf::from(path);
    }

    config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("nimbus")
        .join(SETTINGS_FILE_NAME)
}
