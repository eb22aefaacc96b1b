use gitkey_core::{GitkeyError, PromptField, Prompter, Result};
use std::io::{self, BufRead, Write};
use zeroize::Zeroizing;

pub const PASSPHRASE_ENV: &str = "GITKEY_PASSPHRASE";

/// Prompts on stderr, reads answers from stdin and secrets from the tty.
pub struct TerminalPrompter;

impl Prompter for TerminalPrompter {
    fn ask(&mut self, field: &PromptField) -> Result<String> {
        match &field.default {
            Some(default) => eprint!("{} [{}]: ", field.label, default),
            None => eprint!("{}: ", field.label),
        }
        io::stderr()
            .flush()
            .map_err(|e| GitkeyError::Prompt(e.to_string()))?;
        let mut line = String::new();
        io::stdin()
            .lock()
            .read_line(&mut line)
            .map_err(|e| GitkeyError::Prompt(e.to_string()))?;
        let line = line.trim();
        if line.is_empty() {
            return Ok(field.default.clone().unwrap_or_default());
        }
        Ok(line.to_string())
    }

    fn ask_secret(&mut self, label: &str) -> Result<Zeroizing<String>> {
        if let Ok(pw) = std::env::var(PASSPHRASE_ENV) {
            if !pw.is_empty() {
                return Ok(Zeroizing::new(pw));
            }
        }
        rpassword::prompt_password(format!("{label}: "))
            .map(Zeroizing::new)
            .map_err(|e| GitkeyError::Prompt(format!("password prompt: {e}")))
    }

    fn notice(&mut self, message: &str) {
        eprintln!("{message}");
    }
}

/// First non-empty line of piped stdin, if any.
pub fn read_piped_token() -> Result<Option<Zeroizing<String>>> {
    let stdin = io::stdin();
    let mut lock = stdin.lock();
    loop {
        let mut line = Zeroizing::new(String::new());
        let read = lock
            .read_line(&mut line)
            .map_err(|e| GitkeyError::Prompt(e.to_string()))?;
        if read == 0 {
            return Ok(None);
        }
        let token = line.trim();
        if !token.is_empty() {
            return Ok(Some(Zeroizing::new(token.to_string())));
        }
    }
}
