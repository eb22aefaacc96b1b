use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use zeroize::Zeroizing;

use crate::cipher::Cipher;
use crate::error::{GitkeyError, Result};

pub const TOKEN_FILE: &str = "token";
pub const NAME_FILE: &str = "name";
pub const EMAIL_FILE: &str = "email";

/// Optional author identity stored next to a token.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Identity {
    pub name: Option<String>,
    pub email: Option<String>,
}

impl Identity {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: non_empty(name.into()),
            email: non_empty(email.into()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.email.is_none()
    }
}

impl std::fmt::Display for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.name, &self.email) {
            (Some(name), Some(email)) => write!(f, "{name} <{email}>"),
            (Some(name), None) => write!(f, "{name}"),
            (None, Some(email)) => write!(f, "<{email}>"),
            (None, None) => write!(f, "(none)"),
        }
    }
}

fn non_empty(value: String) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

/// Domain and username become directory names, so they must be plain
/// single path components.
pub fn validate_component(what: &str, value: &str) -> Result<()> {
    if value.is_empty()
        || value == "."
        || value == ".."
        || value.contains('/')
        || value.contains('\\')
    {
        return Err(GitkeyError::BadArguments(format!("invalid {what} '{value}'")));
    }
    Ok(())
}

/// One directory per (domain, username) holding `token`, `name` and `email`.
pub struct TokenStore<C: Cipher> {
    root: PathBuf,
    cipher: C,
}

impl<C: Cipher> TokenStore<C> {
    pub fn new(root: impl Into<PathBuf>, cipher: C) -> Self {
        Self {
            root: root.into(),
            cipher,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn record_dir(&self, domain: &str, username: &str) -> Result<PathBuf> {
        validate_component("domain", domain)?;
        validate_component("username", username)?;
        Ok(self.root.join(domain).join(username))
    }

    pub fn exists(&self, domain: &str, username: &str) -> Result<bool> {
        Ok(self.record_dir(domain, username)?.is_dir())
    }

    /// Writes a record. Empty `name`/`email` leave any stored value in place.
    pub fn create(
        &self,
        domain: &str,
        username: &str,
        token: &[u8],
        passphrase: &str,
        identity: &Identity,
        force: bool,
    ) -> Result<()> {
        let dir = self.record_dir(domain, username)?;
        if dir.is_dir() && !force {
            return Err(GitkeyError::AlreadyExists {
                domain: domain.into(),
                username: username.into(),
            });
        }
        fs::create_dir_all(&dir)?;
        self.cipher
            .encrypt_to(token, passphrase, &dir.join(TOKEN_FILE))?;
        if let Some(name) = &identity.name {
            fs::write(dir.join(NAME_FILE), format!("{name}\n"))?;
        }
        if let Some(email) = &identity.email {
            fs::write(dir.join(EMAIL_FILE), format!("{email}\n"))?;
        }
        info!("stored token for {username}@{domain}");
        Ok(())
    }

    pub fn remove(&self, domain: &str, username: &str) -> Result<()> {
        let dir = self.record_dir(domain, username)?;
        if !dir.is_dir() {
            return Err(GitkeyError::RecordNotFound {
                domain: domain.into(),
                username: username.into(),
            });
        }
        fs::remove_dir_all(&dir)?;
        let domain_dir = self.root.join(domain);
        if fs::read_dir(&domain_dir)?.next().is_none() {
            fs::remove_dir(&domain_dir)?;
        }
        info!("removed token for {username}@{domain}");
        Ok(())
    }

    pub fn read_optional(&self, domain: &str, username: &str) -> Result<Identity> {
        let dir = self.record_dir(domain, username)?;
        Ok(Identity {
            name: read_field(&dir.join(NAME_FILE))?,
            email: read_field(&dir.join(EMAIL_FILE))?,
        })
    }

    /// Decrypts the token. Empty output counts as a wrong passphrase, which
    /// also means a stored empty token can never be read back.
    pub fn read_token(
        &self,
        domain: &str,
        username: &str,
        passphrase: &str,
    ) -> Result<Zeroizing<String>> {
        let dir = self.record_dir(domain, username)?;
        let plaintext = self.cipher.decrypt_from(&dir.join(TOKEN_FILE), passphrase)?;
        if plaintext.is_empty() {
            debug!("decryption of {username}@{domain} produced no output");
            return Err(GitkeyError::IncorrectPassword);
        }
        let token = std::str::from_utf8(&plaintext).map_err(|_| GitkeyError::IncorrectPassword)?;
        Ok(Zeroizing::new(token.to_string()))
    }
}

fn read_field(path: &Path) -> Result<Option<String>> {
    match fs::read_to_string(path) {
        Ok(raw) => Ok(non_empty(raw.trim_end_matches(['\n', '\r']).to_string())),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}
