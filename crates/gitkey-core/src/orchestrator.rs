//! End-to-end flows: unlock-and-approve, store, remove.
//!
//! Domain resolution always happens before the passphrase prompt, so an
//! ambiguous or unknown username never costs the operator a passphrase entry.

use std::path::PathBuf;
use tracing::{info, warn};
use zeroize::Zeroizing;

use crate::cipher::Cipher;
use crate::error::{GitkeyError, Result};
use crate::host::CredentialHost;
use crate::index::{MatchResult, StoreIndex};
use crate::prompt::{FieldKey, PromptField, Prompter, RecordForm};
use crate::store::{validate_component, Identity, TokenStore};
use crate::worktree::find_work_tree;

/// Non-fatal findings reported after the main operation succeeded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Advisory {
    AuthorMismatch { expected: Identity, found: Identity },
    CacheHelperDisabled { current: Option<String> },
    ExistingUser { domains: Vec<String> },
}

impl std::fmt::Display for Advisory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Advisory::AuthorMismatch { expected, found } => write!(
                f,
                "last commit was authored by {found}, but this token belongs to {expected}; \
                 rerun with --redo-last-commit to fix the author"
            ),
            Advisory::CacheHelperDisabled { current: None } => write!(
                f,
                "no credential helper is configured, so git will not remember this token; \
                 run with --enable-cache"
            ),
            Advisory::CacheHelperDisabled {
                current: Some(helper),
            } => write!(
                f,
                "credential helper is '{helper}', not the cache helper; \
                 run with --enable-cache to cache this token"
            ),
            Advisory::ExistingUser { domains } => write!(
                f,
                "a token for this user already exists under: {}",
                domains.join(", ")
            ),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RetrieveOptions {
    /// Domain named by the operator; the record must exist there.
    pub domain: Option<String>,
    pub default_domain: String,
    /// Write the stored name/email into the global git config.
    pub sync_identity: bool,
    pub redo_last_commit: bool,
    pub work_dir: PathBuf,
}

#[derive(Debug)]
pub struct Retrieval {
    pub domain: String,
    pub username: String,
    pub token: Zeroizing<String>,
    pub identity: Identity,
    pub advisories: Vec<Advisory>,
    pub amended: bool,
}

#[derive(Debug, Clone)]
pub struct StoreRequest {
    pub username: String,
    pub token: Zeroizing<String>,
    pub default_domain: String,
    pub force: bool,
    /// Prompt for name/email. Off for `--only-token`.
    pub with_identity: bool,
}

#[derive(Debug, Clone)]
pub struct Stored {
    pub domain: String,
    pub username: String,
    pub identity: Identity,
    pub advisories: Vec<Advisory>,
}

pub struct Orchestrator<C: Cipher, H: CredentialHost, P: Prompter> {
    index: StoreIndex,
    store: TokenStore<C>,
    host: H,
    prompter: P,
}

impl<C: Cipher, H: CredentialHost, P: Prompter> Orchestrator<C, H, P> {
    pub fn new(store: TokenStore<C>, host: H, prompter: P) -> Self {
        Self {
            index: StoreIndex::new(store.root()),
            store,
            host,
            prompter,
        }
    }

    pub fn store(&self) -> &TokenStore<C> {
        &self.store
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn prompter(&self) -> &P {
        &self.prompter
    }

    /// Picks the domain holding `username`, asking only when several do.
    pub fn resolve(&mut self, username: &str, default_domain: &str) -> Result<String> {
        match self.index.find(username)? {
            MatchResult::NotFound => Err(GitkeyError::UserNotFound(username.into())),
            MatchResult::Unique(domain) => Ok(domain),
            MatchResult::Ambiguous(domains) => {
                let listed: Vec<&str> = domains.iter().map(String::as_str).collect();
                self.prompter.notice(&format!(
                    "'{username}' exists under several domains: {}",
                    listed.join(", ")
                ));
                let default = domains
                    .contains(default_domain)
                    .then(|| default_domain.to_string());
                let field = PromptField::new(FieldKey::Domain, "Domain", default);
                let answer = self.prompter.ask(&field)?;
                let answer = answer.trim();
                if !domains.contains(answer) {
                    return Err(GitkeyError::DomainNotFound {
                        domain: answer.into(),
                        username: username.into(),
                    });
                }
                Ok(answer.to_string())
            }
        }
    }

    /// Checks that `domain` holds `username` instead of searching for it.
    pub fn confirm(&self, username: &str, domain: &str) -> Result<String> {
        validate_component("domain", domain)?;
        let found = self.index.find(username)?;
        if found == MatchResult::NotFound {
            return Err(GitkeyError::UserNotFound(username.into()));
        }
        if !found.domains().iter().any(|d| d == domain) {
            return Err(GitkeyError::DomainNotFound {
                domain: domain.into(),
                username: username.into(),
            });
        }
        Ok(domain.to_string())
    }

    pub fn retrieve(&mut self, username: &str, opts: &RetrieveOptions) -> Result<Retrieval> {
        let domain = match &opts.domain {
            Some(domain) => self.confirm(username, domain)?,
            None => self.resolve(username, &opts.default_domain)?,
        };

        let identity = self.store.read_optional(&domain, username)?;
        if opts.sync_identity && !identity.is_empty() {
            self.host.set_global_identity(&identity)?;
            info!("global git identity set to {identity}");
        }

        let passphrase = self
            .prompter
            .ask_secret(&format!("Passphrase for {username}@{domain}"))?;
        let token = self.store.read_token(&domain, username, &passphrase)?;

        let url = format!("https://{domain}");
        self.host.approve(&url, username, &token)?;
        info!("approved credential for {username} at {url}");

        let work_tree = find_work_tree(&opts.work_dir);
        let mut advisories = Vec::new();
        // an amend rewrites the author, so a mismatch is moot
        if let (Some(tree), false) = (&work_tree, opts.redo_last_commit) {
            if let Some(advisory) = self.check_author(tree, &identity) {
                advisories.push(advisory);
            }
        }
        if let Some(advisory) = self.check_cache_helper() {
            advisories.push(advisory);
        }

        let mut amended = false;
        if opts.redo_last_commit {
            let tree = work_tree.ok_or_else(|| {
                GitkeyError::BadArguments(
                    "--redo-last-commit must be run inside a git work tree".into(),
                )
            })?;
            self.host.amend_reset_author(&tree)?;
            amended = true;
        }

        Ok(Retrieval {
            domain,
            username: username.into(),
            token,
            identity,
            advisories,
            amended,
        })
    }

    fn check_author(&self, tree: &std::path::Path, expected: &Identity) -> Option<Advisory> {
        if expected.is_empty() {
            return None;
        }
        let found = match self.host.last_commit_author(tree) {
            Ok(found) => found?,
            Err(e) => {
                warn!("could not read last commit author: {e}");
                return None;
            }
        };
        let differs = |want: &Option<String>, got: &Option<String>| match want {
            Some(want) => got.as_deref() != Some(want.as_str()),
            None => false,
        };
        if differs(&expected.name, &found.name) || differs(&expected.email, &found.email) {
            return Some(Advisory::AuthorMismatch {
                expected: expected.clone(),
                found,
            });
        }
        None
    }

    fn check_cache_helper(&self) -> Option<Advisory> {
        let current = match self.host.active_cache_helper() {
            Ok(current) => current,
            Err(e) => {
                warn!("could not query credential helper: {e}");
                return None;
            }
        };
        match &current {
            Some(helper) if helper.starts_with("cache") => None,
            _ => Some(Advisory::CacheHelperDisabled { current }),
        }
    }

    pub fn store_token(&mut self, req: &StoreRequest) -> Result<Stored> {
        validate_component("username", &req.username)?;

        let mut advisories = Vec::new();
        let existing = self.index.find(&req.username)?;
        if existing != MatchResult::NotFound {
            let advisory = Advisory::ExistingUser {
                domains: existing.domains(),
            };
            self.prompter.notice(&advisory.to_string());
            advisories.push(advisory);
        }

        let mut form = RecordForm::default();
        form.fill(
            &mut self.prompter,
            &[PromptField::new(
                FieldKey::Domain,
                "Domain",
                Some(req.default_domain.clone()),
            )],
        )?;
        let domain = form.domain.clone();
        validate_component("domain", &domain)?;
        let exists = self.store.exists(&domain, &req.username)?;
        if exists && !req.force {
            return Err(GitkeyError::AlreadyExists {
                domain,
                username: req.username.clone(),
            });
        }

        if req.with_identity {
            // Stored values are offered as defaults; a blank answer keeps them.
            let current = if exists {
                self.store.read_optional(&domain, &req.username)?
            } else {
                Identity::default()
            };
            form.fill(
                &mut self.prompter,
                &[
                    PromptField::new(FieldKey::Name, "Name (optional)", current.name),
                    PromptField::new(FieldKey::Email, "Email (optional)", current.email),
                ],
            )?;
        }

        let passphrase = self.prompter.ask_secret("Passphrase")?;
        if passphrase.is_empty() {
            return Err(GitkeyError::BadArguments("passphrase must not be empty".into()));
        }
        let confirm = self.prompter.ask_secret("Confirm passphrase")?;
        if *confirm != *passphrase {
            return Err(GitkeyError::BadArguments("passphrases do not match".into()));
        }

        let identity = Identity::new(form.name, form.email);
        self.store.create(
            &domain,
            &req.username,
            req.token.as_bytes(),
            &passphrase,
            &identity,
            req.force,
        )?;

        Ok(Stored {
            domain,
            username: req.username.clone(),
            identity,
            advisories,
        })
    }

    /// Deletes a record. With an explicit `domain` only that record is touched;
    /// otherwise the domain is resolved and announced before anything is deleted.
    pub fn remove(
        &mut self,
        username: &str,
        domain: Option<&str>,
        default_domain: &str,
    ) -> Result<String> {
        let domain = match domain {
            Some(domain) => domain.to_string(),
            None => {
                let domain = self.resolve(username, default_domain)?;
                self.prompter
                    .notice(&format!("removing token for {username}@{domain}"));
                domain
            }
        };
        self.store.remove(&domain, username)?;
        Ok(domain)
    }
}
