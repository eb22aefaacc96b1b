//! Passphrase-encrypted per-domain access tokens handed to git's credential cache.
//!
//! Records live at `{store_root}/{domain}/{username}/{token,name,email}`.

pub mod cipher;
pub mod error;
pub mod host;
pub mod index;
pub mod orchestrator;
pub mod paths;
pub mod prompt;
pub mod settings;
pub mod store;
pub mod worktree;

pub use cipher::{Cipher, KdfParams, NativeCipher, OpensslCipher};
pub use error::{GitkeyError, Result};
pub use host::{CredentialHost, GitCli};
pub use index::{MatchResult, StoreIndex};
pub use orchestrator::{Advisory, Orchestrator, RetrieveOptions, Retrieval, StoreRequest, Stored};
pub use prompt::{FieldKey, PromptField, Prompter, RecordForm};
pub use settings::{CipherKind, Settings};
pub use store::{Identity, TokenStore};
