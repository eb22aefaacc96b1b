//! Passphrase encryption of a single artifact on disk.
//!
//! Both backends follow the same contract: decrypting with the wrong
//! passphrase is not an error, it yields an empty plaintext. Callers treat
//! empty output as a failed unlock.

use argon2::{Algorithm, Argon2, Params, Version};
use chacha20poly1305::aead::{Aead, KeyInit, OsRng};
use chacha20poly1305::{Key, XChaCha20Poly1305, XNonce};
use rand::RngCore;
use std::fs::File;
use std::io::{ErrorKind, Read, Write};
use std::path::Path;
use std::process::{Command, Stdio};
use tracing::debug;
use zeroize::Zeroizing;

use crate::error::{GitkeyError, Result};

pub const TOKEN_MAGIC: &[u8; 8] = b"GITKEY1\0";
pub const KDF_TIME_COST: u32 = 3;
pub const KDF_MEMORY_COST: u32 = 65536; // 64MB
pub const KDF_PARALLELISM: u32 = 4;
pub const DERIVED_KEY_LEN: usize = 32;
pub const SALT_LEN: usize = 32;
pub const NONCE_LEN: usize = 24;
pub const HEADER_SIZE: usize = 8 + 12 + SALT_LEN + NONCE_LEN;

pub trait Cipher {
    /// Encrypts `plaintext` under `passphrase` and writes the artifact to `dest`.
    fn encrypt_to(&self, plaintext: &[u8], passphrase: &str, dest: &Path) -> Result<()>;

    /// Reads the artifact at `src`. A wrong passphrase yields an empty buffer.
    fn decrypt_from(&self, src: &Path, passphrase: &str) -> Result<Zeroizing<Vec<u8>>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KdfParams {
    pub time_cost: u32,
    pub memory_cost: u32,
    pub parallelism: u32,
}

impl KdfParams {
    pub fn new(time_cost: u32, memory_cost: u32, parallelism: u32) -> Self {
        Self {
            time_cost,
            memory_cost,
            parallelism,
        }
    }
}

impl KdfParams {
    /// Whether the costs are ones this crate could have written. Headers read
    /// from disk are untrusted and must not drive an unbounded allocation.
    pub fn within_limits(&self) -> bool {
        (1..=KDF_TIME_COST * 4).contains(&self.time_cost)
            && (1..=KDF_PARALLELISM * 4).contains(&self.parallelism)
            && (8 * self.parallelism..=KDF_MEMORY_COST * 4).contains(&self.memory_cost)
    }
}

impl Default for KdfParams {
    fn default() -> Self {
        Self::new(KDF_TIME_COST, KDF_MEMORY_COST, KDF_PARALLELISM)
    }
}

pub fn derive_key(passphrase: &str, salt: &[u8], params: KdfParams) -> Result<Zeroizing<Vec<u8>>> {
    let params = Params::new(
        params.memory_cost,
        params.time_cost,
        params.parallelism,
        Some(DERIVED_KEY_LEN),
    )
    .map_err(|e| GitkeyError::EncryptionFailed(format!("argon2 params: {e}")))?;
    let argon = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);
    let mut key = Zeroizing::new(vec![0u8; DERIVED_KEY_LEN]);
    argon
        .hash_password_into(passphrase.as_bytes(), salt, &mut key)
        .map_err(|e| GitkeyError::EncryptionFailed(format!("argon2 derive: {e}")))?;
    Ok(key)
}

fn random_bytes<const N: usize>() -> [u8; N] {
    let mut buf = [0u8; N];
    OsRng.fill_bytes(&mut buf);
    buf
}

#[derive(Debug, Clone)]
struct TokenHeader {
    kdf: KdfParams,
    salt: [u8; SALT_LEN],
    nonce: [u8; NONCE_LEN],
}

impl TokenHeader {
    fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(HEADER_SIZE);
        buf.extend_from_slice(TOKEN_MAGIC);
        buf.extend_from_slice(&self.kdf.time_cost.to_le_bytes());
        buf.extend_from_slice(&self.kdf.memory_cost.to_le_bytes());
        buf.extend_from_slice(&self.kdf.parallelism.to_le_bytes());
        buf.extend_from_slice(&self.salt);
        buf.extend_from_slice(&self.nonce);
        buf
    }

    fn from_bytes(buf: &[u8]) -> Option<Self> {
        if buf.len() < HEADER_SIZE || &buf[..TOKEN_MAGIC.len()] != TOKEN_MAGIC {
            return None;
        }
        let word = |at: usize| -> Option<u32> {
            let bytes: [u8; 4] = buf.get(at..at + 4)?.try_into().ok()?;
            Some(u32::from_le_bytes(bytes))
        };
        let base = TOKEN_MAGIC.len();
        let kdf = KdfParams::new(word(base)?, word(base + 4)?, word(base + 8)?);
        if !kdf.within_limits() {
            return None;
        }
        let salt_at = base + 12;
        let nonce_at = salt_at + SALT_LEN;
        Some(Self {
            kdf,
            salt: buf[salt_at..nonce_at].try_into().ok()?,
            nonce: buf[nonce_at..HEADER_SIZE].try_into().ok()?,
        })
    }
}

/// Argon2id key derivation feeding XChaCha20-Poly1305.
#[derive(Debug, Clone, Default)]
pub struct NativeCipher {
    params: KdfParams,
}

impl NativeCipher {
    pub fn new(params: KdfParams) -> Self {
        Self { params }
    }
}

impl Cipher for NativeCipher {
    fn encrypt_to(&self, plaintext: &[u8], passphrase: &str, dest: &Path) -> Result<()> {
        let header = TokenHeader {
            kdf: self.params,
            salt: random_bytes(),
            nonce: random_bytes(),
        };
        let key = derive_key(passphrase, &header.salt, header.kdf)?;
        let cipher = XChaCha20Poly1305::new(Key::from_slice(&key));
        let ciphertext = cipher
            .encrypt(XNonce::from_slice(&header.nonce), plaintext)
            .map_err(|e| GitkeyError::EncryptionFailed(format!("encrypt: {e}")))?;
        let mut file = create_private(dest)?;
        file.write_all(&header.to_bytes())?;
        file.write_all(&ciphertext)?;
        file.flush()?;
        Ok(())
    }

    fn decrypt_from(&self, src: &Path, passphrase: &str) -> Result<Zeroizing<Vec<u8>>> {
        let mut data = Vec::new();
        File::open(src)?.read_to_end(&mut data)?;
        let Some(header) = TokenHeader::from_bytes(&data) else {
            debug!("token artifact {} has no valid header", src.display());
            return Ok(Zeroizing::new(Vec::new()));
        };
        let key = derive_key(passphrase, &header.salt, header.kdf)?;
        let cipher = XChaCha20Poly1305::new(Key::from_slice(&key));
        match cipher.decrypt(XNonce::from_slice(&header.nonce), &data[HEADER_SIZE..]) {
            Ok(plaintext) => Ok(Zeroizing::new(plaintext)),
            Err(_) => Ok(Zeroizing::new(Vec::new())),
        }
    }
}

const OPENSSL_PASS_ENV: &str = "GITKEY_OPENSSL_PASS";

/// Delegates to an `openssl enc` binary (AES-256-CBC, PBKDF2).
#[derive(Debug, Clone)]
pub struct OpensslCipher {
    program: String,
}

impl OpensslCipher {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn command(&self, passphrase: &str) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(["enc", "-aes-256-cbc", "-pbkdf2", "-iter", "100000"])
            .env(OPENSSL_PASS_ENV, passphrase)
            .stderr(Stdio::piped());
        cmd
    }

    fn missing(&self, err: std::io::Error) -> GitkeyError {
        if err.kind() == ErrorKind::NotFound {
            GitkeyError::MissingDependency(self.program.clone())
        } else {
            GitkeyError::Io(err)
        }
    }
}

impl Cipher for OpensslCipher {
    fn encrypt_to(&self, plaintext: &[u8], passphrase: &str, dest: &Path) -> Result<()> {
        let mut child = self
            .command(passphrase)
            .arg("-salt")
            .arg("-out")
            .arg(dest)
            .arg("-pass")
            .arg(format!("env:{OPENSSL_PASS_ENV}"))
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .spawn()
            .map_err(|e| self.missing(e))?;
        let written = match child.stdin.take() {
            Some(mut stdin) => stdin.write_all(plaintext),
            None => Ok(()),
        };
        let output = child.wait_with_output()?;
        if output.status.success() {
            written?;
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(GitkeyError::EncryptionFailed(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            )));
        }
        restrict_permissions(dest)?;
        Ok(())
    }

    fn decrypt_from(&self, src: &Path, passphrase: &str) -> Result<Zeroizing<Vec<u8>>> {
        if !src.exists() {
            return Err(GitkeyError::Io(std::io::Error::new(
                ErrorKind::NotFound,
                format!("{} does not exist", src.display()),
            )));
        }
        let output = self
            .command(passphrase)
            .arg("-d")
            .arg("-in")
            .arg(src)
            .arg("-pass")
            .arg(format!("env:{OPENSSL_PASS_ENV}"))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .output()
            .map_err(|e| self.missing(e))?;
        if !output.status.success() {
            debug!("{} decrypt exited with {}", self.program, output.status);
            return Ok(Zeroizing::new(Vec::new()));
        }
        Ok(Zeroizing::new(output.stdout))
    }
}

fn create_private(path: &Path) -> Result<File> {
    let file = File::create(path)?;
    restrict_permissions(path)?;
    Ok(file)
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    Ok(())
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> Result<()> {
    Ok(())
}
