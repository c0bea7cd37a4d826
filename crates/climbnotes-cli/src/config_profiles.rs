//! Persistent CLI profile configuration.

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::CliError;

const CONFIG_FILE_NAME: &str = "cli-config.json";
const DEFAULT_USER_KEY: &str = "local";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CliProfilesConfig {
    #[serde(default = "default_config_version")]
    pub version: u32,
    #[serde(default)]
    pub active_profile: Option<String>,
    #[serde(default)]
    pub profiles: BTreeMap<String, CliProfile>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CliProfile {
    #[serde(default)]
    pub user_key: Option<String>,
    #[serde(default)]
    pub remote_path: Option<String>,
    #[serde(default)]
    pub data_path: Option<String>,
}

const fn default_config_version() -> u32 {
    1
}

pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("climbnotes")
        .join(CONFIG_FILE_NAME)
}

fn config_error(action: &str, path: &Path, error: &dyn std::fmt::Display) -> CliError {
    CliError::Config(format!("failed to {action} {}: {error}", path.display()))
}

pub fn normalize_text_option(value: Option<String>) -> Option<String> {
    climbnotes_core::util::normalize_text_option(value)
}

pub fn normalize_profile_name(value: Option<&str>) -> Option<String> {
    climbnotes_core::util::normalize_text_ref(value)
}

impl CliProfilesConfig {
    /// Load the profiles file from its default location.
    pub fn load() -> Result<Self, CliError> {
        Self::load_from_path(&default_config_path())
    }

    /// A missing file is an empty configuration, not an error.
    pub fn load_from_path(path: &Path) -> Result<Self, CliError> {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(error) => return Err(config_error("read", path, &error)),
        };
        let mut config: Self =
            serde_json::from_str(&raw).map_err(|error| config_error("parse", path, &error))?;
        config.normalize();
        Ok(config)
    }

    pub fn save(&self) -> Result<PathBuf, CliError> {
        let path = default_config_path();
        self.save_to_path(&path)?;
        Ok(path)
    }

    /// Written to a staging file, then renamed into place.
    pub fn save_to_path(&self, path: &Path) -> Result<(), CliError> {
        let mut normalized = self.clone();
        normalized.normalize();
        let raw = serde_json::to_string_pretty(&normalized)?;

        let write = || -> io::Result<()> {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let staging = path.with_extension("json.tmp");
            std::fs::write(&staging, raw)?;
            std::fs::rename(&staging, path)
        };
        write().map_err(|error| config_error("write", path, &error))
    }

    /// Explicit name, then `CLIMBNOTES_PROFILE`, then the active profile,
    /// then `default`.
    pub fn resolve_profile_name(&self, explicit: Option<&str>) -> String {
        if let Some(profile) = normalize_profile_name(explicit) {
            return profile;
        }
        if let Some(profile) =
            normalize_profile_name(std::env::var("CLIMBNOTES_PROFILE").ok().as_deref())
        {
            return profile;
        }
        if let Some(profile) = normalize_profile_name(self.active_profile.as_deref()) {
            return profile;
        }
        "default".to_string()
    }

    pub fn profile(&self, name: &str) -> Option<&CliProfile> {
        self.profiles.get(name)
    }

    pub fn profile_mut_or_default(&mut self, name: &str) -> &mut CliProfile {
        self.profiles.entry(name.to_string()).or_default()
    }

    fn normalize(&mut self) {
        self.active_profile = normalize_profile_name(self.active_profile.as_deref());
        for profile in self.profiles.values_mut() {
            profile.normalize();
        }
    }
}

impl CliProfile {
    /// Configured user key, or the shared `local` key
    pub fn user_key(&self) -> String {
        normalize_text_option(self.user_key.clone()).unwrap_or_else(|| DEFAULT_USER_KEY.to_string())
    }

    pub fn remote_path(&self) -> Option<PathBuf> {
        normalize_text_option(self.remote_path.clone()).map(PathBuf::from)
    }

    pub fn data_path(&self) -> Option<PathBuf> {
        normalize_text_option(self.data_path.clone()).map(PathBuf::from)
    }

    fn normalize(&mut self) {
        self.user_key = normalize_text_option(self.user_key.clone());
        self.remote_path = normalize_text_option(self.remote_path.clone());
        self.data_path = normalize_text_option(self.data_path.clone());
    }
}
