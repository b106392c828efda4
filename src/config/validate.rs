// src/config/validate.rs

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::{PlaybookdError, Result};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = PlaybookdError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    validate_dispatcher(cfg)?;
    validate_executor(cfg)?;
    validate_paths(cfg)?;
    Ok(())
}

fn validate_dispatcher(cfg: &RawConfigFile) -> Result<()> {
    if cfg.dispatcher.workers == 0 {
        return Err(PlaybookdError::ConfigError(
            "[dispatcher].workers must be >= 1 (got 0)".to_string(),
        ));
    }
    Ok(())
}

fn validate_executor(cfg: &RawConfigFile) -> Result<()> {
    if cfg.executor.binary.trim().is_empty() {
        return Err(PlaybookdError::ConfigError(
            "[executor].binary must not be empty".to_string(),
        ));
    }
    if cfg.executor.timeout_secs == Some(0) {
        return Err(PlaybookdError::ConfigError(
            "[executor].timeout_secs must be >= 1 when set (got 0)".to_string(),
        ));
    }
    Ok(())
}

fn validate_paths(cfg: &RawConfigFile) -> Result<()> {
    if cfg.projects.root.as_os_str().is_empty() {
        return Err(PlaybookdError::ConfigError(
            "[projects].root must not be empty".to_string(),
        ));
    }
    if let Some(path) = &cfg.store.path {
        if path.as_os_str().is_empty() {
            return Err(PlaybookdError::ConfigError(
                "[store].path must not be empty when set".to_string(),
            ));
        }
    }
    if let Some(root) = &cfg.workspace.root {
        if root.as_os_str().is_empty() {
            return Err(PlaybookdError::ConfigError(
                "[workspace].root must not be empty when set".to_string(),
            ));
        }
    }
    Ok(())
}
