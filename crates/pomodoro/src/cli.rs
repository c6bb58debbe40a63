//! CLI definitions

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::config::Overrides;

/// pomodoro - Work/break timer that blocks distracting sites
#[derive(Parser, Debug)]
#[command(name = "pomodoro")]
#[command(version)]
#[command(about = "Pomodoro timer that blocks distracting sites during work sessions")]
#[command(after_help = r#"BLOCKING:
    Sites in --blocklist are redirected to 127.0.0.1 (plus their www.
    variant) through a marked block in the hosts file. The block is added for
    each work session and removed for breaks and on exit. Writing the hosts
    file usually needs root.

CONFIG:
    ~/.config/daedalos/pomodoro.json may set timer, break, interval, hosts,
    blocklist, silent, sounds_dir and player_command. Flags win over the file.

EXAMPLES:
    pomodoro                                   # One 25/5 cycle, no blocking
    pomodoro --timer 50 --break 10 --interval 4
    sudo pomodoro --blocklist reddit.com,news.ycombinator.com
    pomodoro --silent                          # No ticking
    sudo pomodoro unblock --blocklist reddit.com
    pomodoro template --blocklist reddit.com
"#)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Work session length in minutes [default: 25]
    #[arg(long, value_name = "MINS")]
    pub timer: Option<u64>,

    /// Break length in minutes [default: 5]
    #[arg(long = "break", value_name = "MINS")]
    pub break_minutes: Option<u64>,

    /// Number of work/break cycles; the last break of several is 3x longer [default: 1]
    #[arg(long, value_name = "COUNT")]
    pub interval: Option<u32>,

    /// Don't play the ticking sound during work sessions
    #[arg(long)]
    pub silent: bool,

    /// Directory with windup.wav, ticking.wav and ding.wav to use instead of the built-ins
    #[arg(long, value_name = "DIR")]
    pub sounds: Option<PathBuf>,

    #[command(flatten)]
    pub shared: SharedArgs,
}

/// Flags accepted by the timer and by every subcommand
#[derive(Args, Debug, Clone, Default)]
pub struct SharedArgs {
    /// Hosts file to patch [default: /etc/hosts]
    #[arg(long, global = true, value_name = "PATH")]
    pub hosts: Option<PathBuf>,

    /// Comma-separated sites to block; an empty value disables blocking
    #[arg(long, global = true, value_name = "SITES")]
    pub blocklist: Option<String>,

    /// Config file [default: ~/.config/daedalos/pomodoro.json]
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Remove a leftover block from the hosts file without starting a timer
    Unblock,

    /// Print the block that would be added to the hosts file
    Template,
}

impl Cli {
    /// Flag values to layer over the config file
    pub fn overrides(&self) -> Overrides {
        Overrides {
            timer: self.timer,
            break_minutes: self.break_minutes,
            interval: self.interval,
            hosts: self.shared.hosts.clone(),
            blocklist: self.shared.blocklist.clone(),
            silent: self.silent,
            sounds_dir: self.sounds.clone(),
        }
    }
}
