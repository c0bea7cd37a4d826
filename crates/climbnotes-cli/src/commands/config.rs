use std::path::{Path, PathBuf};

use crate::cli::ConfigCommands;
use crate::config_profiles::{normalize_text_option, CliProfilesConfig};
use crate::error::CliError;

pub fn run_config(command: ConfigCommands, global_profile: Option<&str>) -> Result<(), CliError> {
    match command {
        ConfigCommands::Init {
            profile,
            user_key,
            remote_path,
            data_path,
            no_activate,
        } => {
            let mut config = CliProfilesConfig::load()?;
            let profile_name = apply_config_init(
                &mut config,
                profile.as_deref().or(global_profile),
                ProfileUpdate {
                    user_key,
                    remote_path,
                    data_path,
                },
                no_activate,
            );
            let path = config.save()?;
            println!("Saved profile '{profile_name}' to {}", path.display());
            Ok(())
        }
    }
}

/// Values given to `config init`; absent ones keep the stored value
#[derive(Debug, Default)]
pub struct ProfileUpdate {
    pub user_key: Option<String>,
    pub remote_path: Option<PathBuf>,
    pub data_path: Option<PathBuf>,
}

/// Merge `update` into the resolved profile and return its name.
pub fn apply_config_init(
    config: &mut CliProfilesConfig,
    profile_name: Option<&str>,
    update: ProfileUpdate,
    no_activate: bool,
) -> String {
    let profile_name = config.resolve_profile_name(profile_name);
    config.version = config.version.max(1);

    let profile = config.profile_mut_or_default(&profile_name);
    if let Some(user_key) = normalize_text_option(update.user_key) {
        profile.user_key = Some(user_key);
    }
    if let Some(remote_path) = path_text(update.remote_path.as_deref()) {
        profile.remote_path = Some(remote_path);
    }
    if let Some(data_path) = path_text(update.data_path.as_deref()) {
        profile.data_path = Some(data_path);
    }

    if !no_activate || config.active_profile.is_none() {
        config.active_profile = Some(profile_name.clone());
    }
    profile_name
}

fn path_text(path: Option<&Path>) -> Option<String> {
    normalize_text_option(path.map(|path| path.to_string_lossy().into_owned()))
}
