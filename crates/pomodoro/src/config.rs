//! Session configuration
//!
//! Values come from three layers, highest priority first: command-line flags,
//! the JSON config file (~/.config/daedalos/pomodoro.json) and built-in
//! defaults. The result is an immutable [`SessionConfig`].

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Result;
use daedalos_core::Paths;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::blocklist;

/// Default work phase length in minutes
pub const DEFAULT_TIMER: u64 = 25;
/// Default break length in minutes
pub const DEFAULT_BREAK: u64 = 5;
/// Default number of work/break cycles
pub const DEFAULT_INTERVAL: u32 = 1;
/// The last break of a multi-cycle session is this many times longer
pub const LONG_BREAK_FACTOR: u32 = 3;
/// Longest work or break phase accepted, in minutes (one day)
pub const MAX_MINUTES: u64 = 24 * 60;

/// Invalid configuration values
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Timer must be between 1 and 1440 minutes (got {0})")]
    InvalidTimer(u64),

    #[error("Break must be between 1 and 1440 minutes (got {0})")]
    InvalidBreak(u64),

    #[error("Interval count must be at least 1 (got {0})")]
    InvalidInterval(u32),

    #[error("Invalid site in blocklist: {0:?}")]
    InvalidSite(String),

    #[error("Hosts file path is empty")]
    EmptyHostsPath,
}

/// Platform location of the hosts file
pub fn default_hosts_path() -> PathBuf {
    if cfg!(windows) {
        PathBuf::from(r"C:\Windows\System32\drivers\etc\hosts")
    } else {
        PathBuf::from("/etc/hosts")
    }
}

/// Default location of the config file
pub fn default_config_path() -> PathBuf {
    Paths::new().tool_config("pomodoro")
}

/// Contents of the optional config file. Every field may be omitted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    /// Work phase length in minutes
    pub timer: Option<u64>,
    /// Break length in minutes
    #[serde(rename = "break")]
    pub break_minutes: Option<u64>,
    /// Number of work/break cycles
    pub interval: Option<u32>,
    /// Hosts file to patch
    pub hosts: Option<PathBuf>,
    /// Sites to block during work phases
    pub blocklist: Option<Vec<String>>,
    /// Suppress the ticking sound
    pub silent: Option<bool>,
    /// Directory with windup.wav, ticking.wav and ding.wav overrides
    pub sounds_dir: Option<PathBuf>,
    /// Player command used instead of the detected one, e.g. "mpv --no-video"
    pub player_command: Option<String>,
}

impl FileConfig {
    /// Load the config file, or defaults when it does not exist
    pub fn load(path: &Path) -> Result<Self> {
        daedalos_core::config::load_or_default(path)
    }
}

/// Values given on the command line
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub timer: Option<u64>,
    pub break_minutes: Option<u64>,
    pub interval: Option<u32>,
    pub hosts: Option<PathBuf>,
    /// Comma-separated list; `Some("")` explicitly disables blocking
    pub blocklist: Option<String>,
    pub silent: bool,
    pub sounds_dir: Option<PathBuf>,
}

/// Everything a session needs, fixed before it starts
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    pub work: Duration,
    pub break_duration: Duration,
    pub intervals: u32,
    pub blocklist: Vec<String>,
    pub hosts_path: PathBuf,
    pub silent: bool,
    pub sounds_dir: Option<PathBuf>,
    pub player_command: Option<String>,
}

impl SessionConfig {
    /// Create a config with explicit durations, no blocking and sound on
    pub fn new(work: Duration, break_duration: Duration, intervals: u32) -> Self {
        Self {
            work,
            break_duration,
            intervals,
            blocklist: Vec::new(),
            hosts_path: default_hosts_path(),
            silent: false,
            sounds_dir: None,
            player_command: None,
        }
    }

    /// Set the sites to block and the hosts file to patch
    pub fn with_blocklist(mut self, sites: Vec<String>, hosts_path: impl Into<PathBuf>) -> Self {
        self.blocklist = blocklist::normalize(sites);
        self.hosts_path = hosts_path.into();
        self
    }

    /// Suppress the ticking sound
    pub fn silent(mut self, silent: bool) -> Self {
        self.silent = silent;
        self
    }

    /// Merge flags over the config file over defaults, then validate
    pub fn resolve(file: FileConfig, overrides: Overrides) -> Result<Self, ConfigError> {
        let timer = overrides.timer.or(file.timer).unwrap_or(DEFAULT_TIMER);
        let break_minutes = overrides
            .break_minutes
            .or(file.break_minutes)
            .unwrap_or(DEFAULT_BREAK);
        let intervals = overrides
            .interval
            .or(file.interval)
            .unwrap_or(DEFAULT_INTERVAL);
        let hosts_path = overrides
            .hosts
            .or(file.hosts)
            .unwrap_or_else(default_hosts_path);
        let sites = match overrides.blocklist {
            Some(list) => blocklist::parse(&list),
            None => blocklist::normalize(file.blocklist.unwrap_or_default()),
        };

        if !(1..=MAX_MINUTES).contains(&timer) {
            return Err(ConfigError::InvalidTimer(timer));
        }
        if !(1..=MAX_MINUTES).contains(&break_minutes) {
            return Err(ConfigError::InvalidBreak(break_minutes));
        }

        let config = Self {
            work: Duration::from_secs(timer * 60),
            break_duration: Duration::from_secs(break_minutes * 60),
            intervals,
            blocklist: sites,
            hosts_path,
            silent: overrides.silent || file.silent.unwrap_or(false),
            sounds_dir: overrides.sounds_dir.or(file.sounds_dir),
            player_command: file.player_command.filter(|c| !c.trim().is_empty()),
        };

        config.validate()?;
        Ok(config)
    }

    /// Check the values a session relies on
    pub fn validate(&self) -> Result<(), ConfigError> {
        let max = Duration::from_secs(MAX_MINUTES * 60);
        if self.work.is_zero() || self.work > max {
            return Err(ConfigError::InvalidTimer(self.work.as_secs() / 60));
        }
        if self.break_duration.is_zero() || self.break_duration > max {
            return Err(ConfigError::InvalidBreak(self.break_duration.as_secs() / 60));
        }
        if self.intervals == 0 {
            return Err(ConfigError::InvalidInterval(self.intervals));
        }
        if let Some(site) = self.blocklist.iter().find(|s| !is_valid_site(s)) {
            return Err(ConfigError::InvalidSite(site.clone()));
        }
        if self.blocks_sites() && self.hosts_path.as_os_str().is_empty() {
            return Err(ConfigError::EmptyHostsPath);
        }
        Ok(())
    }

    /// Whether any site is to be blocked. When false the hosts file is
    /// never opened.
    pub fn blocks_sites(&self) -> bool {
        blocklist::has_sites(&self.blocklist)
    }

    /// Break length after the given cycle (1-based). The final break of a
    /// multi-cycle session is [`LONG_BREAK_FACTOR`] times longer.
    pub fn break_after(&self, cycle: u32) -> Duration {
        if self.intervals > 1 && cycle == self.intervals {
            self.break_duration
                .checked_mul(LONG_BREAK_FACTOR)
                .unwrap_or(Duration::MAX)
        } else {
            self.break_duration
        }
    }
}

fn is_valid_site(site: &str) -> bool {
    !site.is_empty()
        && !site
            .chars()
            .any(|c| c.is_whitespace() || c == '#' || c == '/')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SessionConfig::resolve(FileConfig::default(), Overrides::default()).unwrap();
        assert_eq!(config.work, Duration::from_secs(25 * 60));
        assert_eq!(config.break_duration, Duration::from_secs(5 * 60));
        assert_eq!(config.intervals, 1);
        assert!(config.blocklist.is_empty());
        assert!(!config.blocks_sites());
        assert_eq!(config.hosts_path, default_hosts_path());
        assert!(!config.silent);
    }

    #[test]
    fn test_flags_override_file() {
        let file = FileConfig {
            timer: Some(50),
            break_minutes: Some(10),
            interval: Some(4),
            blocklist: Some(vec!["reddit.com".to_string()]),
            ..Default::default()
        };
        let overrides = Overrides {
            timer: Some(15),
            blocklist: Some("example.com, news.example.org".to_string()),
            ..Default::default()
        };

        let config = SessionConfig::resolve(file, overrides).unwrap();
        assert_eq!(config.work, Duration::from_secs(15 * 60));
        assert_eq!(config.break_duration, Duration::from_secs(10 * 60));
        assert_eq!(config.intervals, 4);
        assert_eq!(
            config.blocklist,
            vec!["example.com".to_string(), "news.example.org".to_string()]
        );
    }

    #[test]
    fn test_empty_blocklist_flag_disables_file_list() {
        let file = FileConfig {
            blocklist: Some(vec!["reddit.com".to_string()]),
            ..Default::default()
        };
        let overrides = Overrides {
            blocklist: Some(String::new()),
            ..Default::default()
        };

        let config = SessionConfig::resolve(file, overrides).unwrap();
        assert!(!config.blocks_sites());
    }

    #[test]
    fn test_invalid_values() {
        let zero_timer = Overrides {
            timer: Some(0),
            ..Default::default()
        };
        assert_eq!(
            SessionConfig::resolve(FileConfig::default(), zero_timer),
            Err(ConfigError::InvalidTimer(0))
        );

        let zero_interval = Overrides {
            interval: Some(0),
            ..Default::default()
        };
        assert_eq!(
            SessionConfig::resolve(FileConfig::default(), zero_interval),
            Err(ConfigError::InvalidInterval(0))
        );

        let bad_site = Overrides {
            blocklist: Some("example.com/path".to_string()),
            ..Default::default()
        };
        assert_eq!(
            SessionConfig::resolve(FileConfig::default(), bad_site),
            Err(ConfigError::InvalidSite("example.com/path".to_string()))
        );
    }

    #[test]
    fn test_break_after_triples_last_of_many() {
        let config = SessionConfig::new(Duration::from_secs(60), Duration::from_secs(300), 4);
        assert_eq!(config.break_after(1), Duration::from_secs(300));
        assert_eq!(config.break_after(3), Duration::from_secs(300));
        assert_eq!(config.break_after(4), Duration::from_secs(900));
    }

    #[test]
    fn test_break_after_single_interval_not_tripled() {
        let config = SessionConfig::new(Duration::from_secs(60), Duration::from_secs(300), 1);
        assert_eq!(config.break_after(1), Duration::from_secs(300));
    }

    #[test]
    fn test_file_config_parses_break_key() {
        let file: FileConfig = serde_json::from_str(
            r#"{ "timer": 45, "break": 15, "blocklist": ["reddit.com"], "player_command": "mpv" }"#,
        )
        .unwrap();
        assert_eq!(file.timer, Some(45));
        assert_eq!(file.break_minutes, Some(15));
        assert_eq!(file.blocklist, Some(vec!["reddit.com".to_string()]));
        assert_eq!(file.player_command.as_deref(), Some("mpv"));
    }

    #[test]
    fn test_file_config_load_missing() {
        let dir = tempfile::tempdir().unwrap();
        let file = FileConfig::load(&dir.path().join("pomodoro.json")).unwrap();
        assert_eq!(file, FileConfig::default());
    }

    #[test]
    fn test_with_blocklist_normalizes() {
        let config = SessionConfig::new(Duration::from_secs(60), Duration::ZERO, 1)
            .with_blocklist(vec!["".to_string()], "/tmp/hosts");
        assert!(config.blocklist.is_empty());
        assert!(!config.blocks_sites());
    }

    #[test]
    fn test_rejects_phase_lengths_out_of_range() {
        let huge_timer = Overrides {
            timer: Some(u64::MAX),
            ..Default::default()
        };
        assert_eq!(
            SessionConfig::resolve(FileConfig::default(), huge_timer),
            Err(ConfigError::InvalidTimer(u64::MAX))
        );

        let huge_break = Overrides {
            break_minutes: Some(u64::MAX),
            interval: Some(2),
            ..Default::default()
        };
        assert_eq!(
            SessionConfig::resolve(FileConfig::default(), huge_break),
            Err(ConfigError::InvalidBreak(u64::MAX))
        );

        let zero_break = Overrides {
            break_minutes: Some(0),
            ..Default::default()
        };
        assert_eq!(
            SessionConfig::resolve(FileConfig::default(), zero_break),
            Err(ConfigError::InvalidBreak(0))
        );
    }

    #[test]
    fn test_longest_phases_accepted() {
        let overrides = Overrides {
            timer: Some(MAX_MINUTES),
            break_minutes: Some(MAX_MINUTES),
            interval: Some(4),
            ..Default::default()
        };
        let config = SessionConfig::resolve(FileConfig::default(), overrides).unwrap();
        assert_eq!(config.break_after(4), Duration::from_secs(3 * MAX_MINUTES * 60));
    }

    #[test]
    fn test_break_after_saturates() {
        let config = SessionConfig::new(Duration::from_secs(60), Duration::MAX, 2);
        assert_eq!(config.break_after(2), Duration::MAX);
        assert_eq!(
            config.validate(),
            Err(ConfigError::InvalidBreak(Duration::MAX.as_secs() / 60))
        );
    }
}
