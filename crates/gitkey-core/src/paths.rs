use directories::ProjectDirs;
use std::path::PathBuf;

use crate::error::{GitkeyError, Result};

pub const APP_QUALIFIER: &str = "com";
pub const APP_ORG: &str = "gitkey";
pub const APP_NAME: &str = "gitkey";

pub const SETTINGS_FILE: &str = "settings.json";

fn project_dirs() -> Result<ProjectDirs> {
    ProjectDirs::from(APP_QUALIFIER, APP_ORG, APP_NAME)
        .ok_or_else(|| GitkeyError::Settings("cannot determine home directory".into()))
}

pub fn data_dir() -> Result<PathBuf> {
    Ok(project_dirs()?.data_dir().to_path_buf())
}

pub fn config_dir() -> Result<PathBuf> {
    Ok(project_dirs()?.config_dir().to_path_buf())
}

pub fn settings_path() -> Result<PathBuf> {
    if let Ok(override_path) = std::env::var("GITKEY_CONFIG") {
        return Ok(PathBuf::from(override_path));
    }
    Ok(config_dir()?.join(SETTINGS_FILE))
}

pub fn default_store_dir() -> Result<PathBuf> {
    Ok(data_dir()?.join("tokens"))
}
