use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{GitkeyError, Result};
use crate::paths;

pub const DEFAULT_DOMAIN: &str = "github.com";
pub const DEFAULT_CACHE_TIMEOUT_SECS: u64 = 3600;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CipherKind {
    Native,
    Openssl,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub store_dir: Option<PathBuf>,
    pub default_domain: String,
    pub cache_timeout_secs: u64,
    pub cipher: CipherKind,
    pub openssl_program: String,
    pub git_program: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            store_dir: None,
            default_domain: DEFAULT_DOMAIN.into(),
            cache_timeout_secs: DEFAULT_CACHE_TIMEOUT_SECS,
            cipher: CipherKind::Native,
            openssl_program: "openssl".into(),
            git_program: "git".into(),
        }
    }
}

impl Settings {
    /// Loads the settings file (if any) and applies environment overrides.
    pub fn load() -> Result<Self> {
        let mut settings = Self::from_file(&paths::settings_path()?)?;
        settings.apply_env();
        Ok(settings)
    }

    /// Reads `path`; a missing file yields the defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = std::fs::read(path)?;
        serde_json::from_slice(&data)
            .map_err(|e| GitkeyError::Settings(format!("{}: {e}", path.display())))
    }

    fn apply_env(&mut self) {
        if let Some(dir) = non_empty_env("GITKEY_STORE_DIR") {
            self.store_dir = Some(PathBuf::from(dir));
        }
        if let Some(domain) = non_empty_env("GITKEY_DEFAULT_DOMAIN") {
            self.default_domain = domain;
        }
    }

    pub fn store_root(&self) -> Result<PathBuf> {
        match &self.store_dir {
            Some(dir) => Ok(dir.clone()),
            None => paths::default_store_dir(),
        }
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}
