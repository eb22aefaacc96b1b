//! The host version-control tool, reached through its command line.

use std::io::{ErrorKind, Write};
use std::path::Path;
use std::process::{Command, Output, Stdio};
use tracing::debug;

use crate::error::{GitkeyError, Result};
use crate::store::Identity;

pub trait CredentialHost {
    /// Marks the credential valid so a configured cache helper remembers it.
    fn approve(&self, url: &str, username: &str, password: &str) -> Result<()>;

    /// The configured `credential.helper`, if any.
    fn active_cache_helper(&self) -> Result<Option<String>>;

    fn set_global_identity(&self, identity: &Identity) -> Result<()>;

    /// Author of the last commit in `work_tree`; `None` when there are no commits.
    fn last_commit_author(&self, work_tree: &Path) -> Result<Option<Identity>>;

    fn amend_reset_author(&self, work_tree: &Path) -> Result<()>;

    fn enable_cache(&self, timeout_secs: u64) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct GitCli {
    program: String,
}

impl Default for GitCli {
    fn default() -> Self {
        Self::new("git")
    }
}

impl GitCli {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn run(&self, args: &[&str], cwd: Option<&Path>, stdin: Option<&[u8]>) -> Result<Output> {
        let mut cmd = Command::new(&self.program);
        cmd.args(args)
            .stdin(if stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = cwd {
            cmd.current_dir(dir);
        }
        debug!("running {} {}", self.program, args.first().copied().unwrap_or_default());
        let mut child = cmd.spawn().map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                GitkeyError::MissingDependency(self.program.clone())
            } else {
                GitkeyError::Io(e)
            }
        })?;
        let written = match (stdin, child.stdin.take()) {
            (Some(input), Some(mut pipe)) => pipe.write_all(input),
            _ => Ok(()),
        };
        let output = child.wait_with_output()?;
        // a child that died early explains a broken pipe better than the pipe does
        if let Err(e) = written {
            if output.status.success() {
                return Err(e.into());
            }
            debug!("{} closed its input early: {e}", self.program);
        }
        Ok(output)
    }

    fn run_checked(&self, action: &str, args: &[&str], cwd: Option<&Path>) -> Result<Output> {
        let output = self.run(args, cwd, None)?;
        if !output.status.success() {
            debug!(
                "git {action} failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            );
            return Err(GitkeyError::HostCommand {
                action: action.into(),
                code: output.status.code(),
            });
        }
        Ok(output)
    }
}

/// Input for `git credential approve`.
pub fn credential_request(url: &str, username: &str, password: &str) -> String {
    format!("url={url}\nusername={username}\npassword={password}\n\n")
}

/// Parses `%an%n%ae` output.
pub fn parse_author(stdout: &str) -> Option<Identity> {
    let mut lines = stdout.lines();
    let name = lines.next()?.trim();
    let email = lines.next().unwrap_or_default().trim();
    let identity = Identity::new(name, email);
    if identity.is_empty() {
        None
    } else {
        Some(identity)
    }
}

impl CredentialHost for GitCli {
    fn approve(&self, url: &str, username: &str, password: &str) -> Result<()> {
        let request = zeroize::Zeroizing::new(credential_request(url, username, password));
        let output = self.run(&["credential", "approve"], None, Some(request.as_bytes()))?;
        if !output.status.success() {
            return Err(GitkeyError::ApprovalFailed {
                code: output.status.code(),
            });
        }
        Ok(())
    }

    fn active_cache_helper(&self) -> Result<Option<String>> {
        let output = self.run(&["config", "--get", "credential.helper"], None, None)?;
        // exit status 1 means the key is unset
        if !output.status.success() {
            return Ok(None);
        }
        let helper = String::from_utf8_lossy(&output.stdout).trim().to_string();
        Ok(if helper.is_empty() { None } else { Some(helper) })
    }

    fn set_global_identity(&self, identity: &Identity) -> Result<()> {
        if let Some(name) = &identity.name {
            self.run_checked("config user.name", &["config", "--global", "user.name", name], None)?;
        }
        if let Some(email) = &identity.email {
            self.run_checked(
                "config user.email",
                &["config", "--global", "user.email", email],
                None,
            )?;
        }
        Ok(())
    }

    fn last_commit_author(&self, work_tree: &Path) -> Result<Option<Identity>> {
        let output = self.run(&["log", "-1", "--format=%an%n%ae"], Some(work_tree), None)?;
        if !output.status.success() {
            return Ok(None);
        }
        Ok(parse_author(&String::from_utf8_lossy(&output.stdout)))
    }

    fn amend_reset_author(&self, work_tree: &Path) -> Result<()> {
        self.run_checked(
            "commit --amend",
            &["commit", "--amend", "--no-edit", "--reset-author"],
            Some(work_tree),
        )?;
        Ok(())
    }

    fn enable_cache(&self, timeout_secs: u64) -> Result<()> {
        let helper = format!("cache --timeout={timeout_secs}");
        self.run_checked(
            "config credential.helper",
            &["config", "--global", "credential.helper", &helper],
            None,
        )?;
        Ok(())
    }
}
