// src/config/validate.rs

use globset::Glob;

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::{LaunchError, Result};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = LaunchError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    validate_app_names(cfg)?;
    validate_hook_patterns(cfg)?;
    validate_ignored_env(cfg)?;
    Ok(())
}

fn validate_app_names(cfg: &RawConfigFile) -> Result<()> {
    for (group, variants) in cfg.app.iter() {
        check_name_part("application group", group)?;
        for (variant, app) in variants.iter() {
            check_name_part(&format!("variant of group '{group}'"), variant)?;
            if let Some(host) = &app.host {
                if host.trim().is_empty() {
                    return Err(LaunchError::Config(format!(
                        "[app.{group}.{variant}].host must not be empty"
                    )));
                }
            }
        }
    }
    Ok(())
}

fn check_name_part(what: &str, name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(LaunchError::Config(format!("{what} name must not be empty")));
    }
    if name.contains('/') {
        return Err(LaunchError::Config(format!(
            "{what} name '{name}' must not contain '/'"
        )));
    }
    Ok(())
}

fn validate_hook_patterns(cfg: &RawConfigFile) -> Result<()> {
    for pattern in cfg.hooks.patterns.iter() {
        Glob::new(pattern).map_err(|e| {
            LaunchError::Config(format!("invalid hook manifest pattern '{pattern}': {e}"))
        })?;
    }
    Ok(())
}

fn validate_ignored_env(cfg: &RawConfigFile) -> Result<()> {
    if cfg.spawn.ignored_env.iter().any(|k| k.trim().is_empty()) {
        return Err(LaunchError::Config(
            "[spawn].ignored_env must not contain empty keys".to_string(),
        ));
    }
    Ok(())
}
