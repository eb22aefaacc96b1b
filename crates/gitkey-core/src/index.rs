use std::collections::BTreeSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

use crate::error::Result;
use crate::store::{validate_component, TOKEN_FILE};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchResult {
    NotFound,
    Unique(String),
    Ambiguous(BTreeSet<String>),
}

impl MatchResult {
    /// Every domain holding the username, in sorted order.
    pub fn domains(&self) -> Vec<String> {
        match self {
            MatchResult::NotFound => Vec::new(),
            MatchResult::Unique(domain) => vec![domain.clone()],
            MatchResult::Ambiguous(domains) => domains.iter().cloned().collect(),
        }
    }
}

/// Read-only view over `{root}/{domain}/{username}/token`.
#[derive(Debug, Clone)]
pub struct StoreIndex {
    root: PathBuf,
}

impl StoreIndex {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Every domain directory under the store root.
    pub fn domains(&self) -> Result<BTreeSet<String>> {
        if !self.root.is_dir() {
            return Ok(BTreeSet::new());
        }
        let mut domains = BTreeSet::new();
        for entry in WalkDir::new(&self.root)
            .min_depth(1)
            .max_depth(1)
            .follow_links(false)
        {
            let entry = entry.map_err(|e| {
                e.into_io_error()
                    .unwrap_or_else(|| std::io::Error::new(ErrorKind::Other, "store walk failed"))
            })?;
            if !entry.file_type().is_dir() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                domains.insert(name.to_string());
            }
        }
        Ok(domains)
    }

    /// Classifies which domains hold a valid record for `username`.
    pub fn find(&self, username: &str) -> Result<MatchResult> {
        validate_component("username", username)?;
        let mut hits: BTreeSet<String> = self
            .domains()?
            .into_iter()
            .filter(|domain| self.root.join(domain).join(username).join(TOKEN_FILE).is_file())
            .collect();
        debug!("user {username} found under {} domain(s)", hits.len());
        Ok(match hits.len() {
            0 => MatchResult::NotFound,
            1 => match hits.pop_first() {
                Some(domain) => MatchResult::Unique(domain),
                None => MatchResult::NotFound,
            },
            _ => MatchResult::Ambiguous(hits),
        })
    }
}
