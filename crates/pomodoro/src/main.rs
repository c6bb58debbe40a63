//! pomodoro - Work/break timer that blocks distracting sites
//!
//! Usage:
//!   pomodoro [--timer MINS] [--break MINS] [--interval N] [--blocklist SITES]
//!   pomodoro unblock [--blocklist SITES] [--hosts PATH]
//!   pomodoro template [--blocklist SITES]

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

use pomodoro::backend::Backend;
use pomodoro::blocklist::BlockTemplate;
use pomodoro::cancel::CancelScope;
use pomodoro::cli::{Cli, Commands};
use pomodoro::config::{default_config_path, FileConfig, SessionConfig};
use pomodoro::hosts::{HostsFile, RevertOutcome};
use pomodoro::session::{Session, SessionOutcome};
use pomodoro::sound::{CueStore, SoundPlayer};

// ANSI color codes
const GREEN: &str = "\x1b[0;32m";
const CYAN: &str = "\x1b[0;36m";
const NC: &str = "\x1b[0m";

/// Check if stdout is a TTY and colors should be used
fn use_colors() -> bool {
    std::io::IsTerminal::is_terminal(&std::io::stdout())
}

/// Conditionally apply color
fn color(code: &str, text: &str) -> String {
    if use_colors() {
        format!("{}{}{}", code, text, NC)
    } else {
        text.to_string()
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so they never break the countdown line
    let filter = if cli.shared.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config_path = cli.shared.config.clone().unwrap_or_else(default_config_path);
    let file = FileConfig::load(&config_path)
        .with_context(|| format!("Failed to load config {}", config_path.display()))?;
    let config = SessionConfig::resolve(file, cli.overrides())?;
    debug!(?config, "resolved config");

    match cli.command {
        Some(Commands::Unblock) => cmd_unblock(&config),
        Some(Commands::Template) => cmd_template(&config),
        None => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(cmd_run(config))
        }
    }
}

/// Run the work/break cycles until done or interrupted
async fn cmd_run(config: SessionConfig) -> Result<()> {
    let scope = CancelScope::new();
    spawn_signal_handler(scope.clone());

    let backend = config
        .player_command
        .as_deref()
        .and_then(Backend::custom)
        .unwrap_or_else(Backend::detect);
    let player = SoundPlayer::new(backend, CueStore::new(config.sounds_dir.clone()));

    if config.blocks_sites() {
        println!(
            "{} {} site(s) in {}",
            color(CYAN, "Blocking:"),
            config.blocklist.len(),
            config.hosts_path.display()
        );
    }

    let mut session = Session::new(config, player, std::io::stdout());
    match session.run(&scope).await? {
        SessionOutcome::Completed { cycles } => debug!(cycles, "session complete"),
        SessionOutcome::Cancelled { phase, cycle } => {
            debug!(cycle, phase = phase.as_str(), "session cancelled")
        }
    }
    Ok(())
}

/// Remove a leftover block, e.g. after the timer was killed
fn cmd_unblock(config: &SessionConfig) -> Result<()> {
    if !config.blocks_sites() {
        println!(
            "{} No sites configured, nothing to unblock",
            color(CYAN, "[info]")
        );
        return Ok(());
    }

    let template = BlockTemplate::build(&config.blocklist);
    let mut hosts = HostsFile::open(&config.hosts_path)?;
    match hosts.revert(&template)? {
        RevertOutcome::Removed => println!(
            "{} Removed block from {}",
            color(GREEN, "[ok]"),
            config.hosts_path.display()
        ),
        RevertOutcome::NotPresent => println!(
            "{} No block found in {}",
            color(CYAN, "[info]"),
            config.hosts_path.display()
        ),
    }
    Ok(())
}

/// Print the hosts block for the configured sites
fn cmd_template(config: &SessionConfig) -> Result<()> {
    if !config.blocks_sites() {
        println!(
            "{} No sites configured, nothing would be blocked",
            color(CYAN, "[info]")
        );
        return Ok(());
    }
    print!("{}", BlockTemplate::build(&config.blocklist));
    Ok(())
}

/// Cancel the session on the first SIGINT or SIGTERM. Later signals are ignored.
fn spawn_signal_handler(scope: CancelScope) {
    tokio::spawn(async move {
        wait_for_signal().await;
        println!("\nReceived interrupt signal");
        scope.cancel();
    });
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut term) => {
            tokio::select! {
                _ = ctrl_c() => {}
                _ = term.recv() => {}
            }
        }
        Err(e) => {
            warn!("Could not listen for SIGTERM: {}", e);
            ctrl_c().await;
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    ctrl_c().await;
}

/// Resolve on Ctrl-C. Never resolves if the handler can't be installed.
async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Could not listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
}
