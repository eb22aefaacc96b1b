mod terminal;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use gitkey_core::{
    Cipher, CipherKind, CredentialHost, GitCli, GitkeyError, NativeCipher, OpensslCipher,
    Orchestrator, RetrieveOptions, Settings, StoreRequest, TokenStore,
};
use std::io::IsTerminal;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::EnvFilter;
use zeroize::Zeroizing;

use crate::terminal::{read_piped_token, TerminalPrompter};

#[derive(Parser, Debug)]
#[command(name = "gitkey", version)]
#[command(
    about = "Keep git access tokens encrypted on disk and hand them to git's credential cache",
    long_about = None
)]
struct Cli {
    /// Account the token belongs to
    username: Option<String>,

    /// Token to store; may also be piped on stdin
    token: Option<String>,

    /// Turn on git's credential cache helper (e.g. --enable-cache=900)
    #[arg(short = 'c', long, value_name = "SECONDS", num_args = 0..=1, require_equals = true)]
    enable_cache: Option<Option<u64>>,

    /// Delete the stored token for USERNAME
    #[arg(short, long)]
    remove: bool,

    /// Overwrite an existing token
    #[arg(short, long)]
    force: bool,

    /// Only touch the token; leave name/email alone
    #[arg(short = 't', long)]
    only_token: bool,

    /// Reset the author of the last commit after unlocking
    #[arg(short = 'a', long)]
    redo_last_commit: bool,

    /// Domain of the record; when storing it is offered as the default answer
    #[arg(short, long)]
    domain: Option<String>,

    /// Token store location
    #[arg(long, value_name = "DIR")]
    store_dir: Option<PathBuf>,
}

enum Mode {
    Retrieve,
    Store(Zeroizing<String>),
    Remove,
}

fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            eprintln!("{}", Cli::command().render_usage());
            let code = err
                .downcast_ref::<GitkeyError>()
                .map(GitkeyError::exit_code)
                .unwrap_or(1);
            ExitCode::from(u8::try_from(code).unwrap_or(1))
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("GITKEY_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run(cli: Cli) -> Result<()> {
    let mut settings = Settings::load()?;
    if let Some(dir) = &cli.store_dir {
        settings.store_dir = Some(dir.clone());
    }
    let default_domain = cli
        .domain
        .clone()
        .unwrap_or_else(|| settings.default_domain.clone());
    let host = GitCli::new(settings.git_program.clone());

    if let Some(timeout) = cli.enable_cache {
        let secs = timeout.unwrap_or(settings.cache_timeout_secs);
        host.enable_cache(secs)?;
        println!("git credential cache enabled (timeout {secs}s)");
    }

    let Some(username) = cli.username.clone() else {
        if cli.enable_cache.is_some() {
            return Ok(());
        }
        return Err(GitkeyError::BadArguments("USERNAME is required".into()).into());
    };

    let mode = select_mode(&cli)?;
    let root = settings.store_root()?;
    debug!("using token store at {}", root.display());
    match settings.cipher {
        CipherKind::Native => dispatch(
            &cli,
            &username,
            &default_domain,
            mode,
            TokenStore::new(root, NativeCipher::default()),
            host,
        ),
        CipherKind::Openssl => dispatch(
            &cli,
            &username,
            &default_domain,
            mode,
            TokenStore::new(root, OpensslCipher::new(settings.openssl_program.clone())),
            host,
        ),
    }
}

fn select_mode(cli: &Cli) -> Result<Mode> {
    if cli.remove {
        return Ok(Mode::Remove);
    }
    if let Some(token) = &cli.token {
        if token.trim().is_empty() {
            return Err(GitkeyError::BadArguments("TOKEN must not be empty".into()).into());
        }
        return Ok(Mode::Store(Zeroizing::new(token.trim().to_string())));
    }
    if !std::io::stdin().is_terminal() {
        if let Some(token) = read_piped_token()? {
            return Ok(Mode::Store(token));
        }
    }
    Ok(Mode::Retrieve)
}

fn dispatch<C: Cipher>(
    cli: &Cli,
    username: &str,
    default_domain: &str,
    mode: Mode,
    store: TokenStore<C>,
    host: GitCli,
) -> Result<()> {
    let mut orch = Orchestrator::new(store, host, TerminalPrompter);
    match mode {
        Mode::Remove => {
            let domain = orch.remove(username, cli.domain.as_deref(), default_domain)?;
            println!("Removed token for {username}@{domain}");
        }
        Mode::Store(token) => {
            let stored = orch.store_token(&StoreRequest {
                username: username.into(),
                token,
                default_domain: default_domain.into(),
                force: cli.force,
                with_identity: !cli.only_token,
            })?;
            println!("Stored token for {}@{}", stored.username, stored.domain);
        }
        Mode::Retrieve => {
            let opts = RetrieveOptions {
                domain: cli.domain.clone(),
                default_domain: default_domain.into(),
                sync_identity: !cli.only_token,
                redo_last_commit: cli.redo_last_commit,
                work_dir: std::env::current_dir()?,
            };
            let out = orch.retrieve(username, &opts)?;
            println!(
                "Approved {} for https://{}. Token: {}",
                out.username,
                out.domain,
                out.token.as_str()
            );
            if !out.identity.is_empty() && opts.sync_identity {
                println!("git identity: {}", out.identity);
            }
            for advisory in &out.advisories {
                eprintln!("warning: {advisory}");
            }
            if out.amended {
                println!("Last commit author reset.");
            }
        }
    }
    Ok(())
}
