use thiserror::Error;

pub type Result<T> = std::result::Result<T, GitkeyError>;

#[derive(Debug, Error)]
pub enum GitkeyError {
    #[error("no token stored for user '{0}' under any domain")]
    UserNotFound(String),

    #[error("no token stored for '{username}' under domain '{domain}'")]
    DomainNotFound { domain: String, username: String },

    #[error("a token for '{username}' already exists under '{domain}' (use --force to overwrite)")]
    AlreadyExists { domain: String, username: String },

    #[error("nothing to remove for '{username}' under '{domain}'")]
    RecordNotFound { domain: String, username: String },

    #[error("incorrect password")]
    IncorrectPassword,

    #[error("encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("git credential approve failed{}", exit_suffix(.code))]
    ApprovalFailed { code: Option<i32> },

    #[error("required program '{0}' was not found on PATH")]
    MissingDependency(String),

    #[error("{0}")]
    BadArguments(String),

    #[error("git {action} failed{}", exit_suffix(.code))]
    HostCommand { action: String, code: Option<i32> },

    #[error("prompt failed: {0}")]
    Prompt(String),

    #[error("invalid settings file: {0}")]
    Settings(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl GitkeyError {
    /// Process exit status for this failure. Host command failures carry the
    /// child's own status through.
    pub fn exit_code(&self) -> i32 {
        match self {
            GitkeyError::BadArguments(_) => 2,
            GitkeyError::ApprovalFailed { code } | GitkeyError::HostCommand { code, .. } => {
                code.filter(|c| *c != 0).unwrap_or(1)
            }
            _ => 1,
        }
    }
}

fn exit_suffix(code: &Option<i32>) -> String {
    match code {
        Some(c) => format!(" (exit code {c})"),
        None => String::new(),
    }
}
