//! Audio player backends for different platforms
//!
//! Playback is delegated to whatever command-line player the platform ships.
//! Nothing here decodes audio.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::{Child, Command};
use which::which;

use crate::sound::SoundError;
use crate::wav;

/// Available playback backends
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Backend {
    /// macOS afplay (duration probe through afinfo)
    Afplay,
    /// PipeWire pw-play
    PwPlay,
    /// PulseAudio paplay
    Paplay,
    /// ALSA aplay
    Aplay,
    /// FFmpeg ffplay
    Ffplay,
    /// User-supplied command; the cue path is appended as the last argument
    Custom { program: String, args: Vec<String> },
    /// No player found, cues are skipped
    Silent,
}

impl Backend {
    /// Detect the best available backend for the current platform
    pub fn detect() -> Self {
        #[cfg(target_os = "macos")]
        {
            if which("afplay").is_ok() {
                return Self::Afplay;
            }
            Self::Silent
        }

        #[cfg(not(target_os = "macos"))]
        {
            for backend in [Self::PwPlay, Self::Paplay, Self::Aplay, Self::Ffplay] {
                if which(backend.program()).is_ok() {
                    return backend;
                }
            }
            Self::Silent
        }
    }

    /// Parse a player command line such as `"mpv --no-video"`
    pub fn custom(command: &str) -> Option<Self> {
        let mut parts = command.split_whitespace().map(str::to_string);
        let program = parts.next()?;
        Some(Self::Custom {
            program,
            args: parts.collect(),
        })
    }

    /// Get the name of this backend
    pub fn name(&self) -> &str {
        match self {
            Self::Custom { program, .. } => program,
            Self::Silent => "silent",
            other => other.program(),
        }
    }

    fn program(&self) -> &str {
        match self {
            Self::Afplay => "afplay",
            Self::PwPlay => "pw-play",
            Self::Paplay => "paplay",
            Self::Aplay => "aplay",
            Self::Ffplay => "ffplay",
            Self::Custom { program, .. } => program,
            Self::Silent => "",
        }
    }

    /// Arguments placed before the cue path
    fn leading_args(&self) -> Vec<String> {
        match self {
            Self::Aplay => vec!["-q".to_string()],
            Self::Ffplay => ["-nodisp", "-autoexit", "-loglevel", "quiet"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            Self::Custom { args, .. } => args.clone(),
            _ => Vec::new(),
        }
    }

    pub fn is_silent(&self) -> bool {
        matches!(self, Self::Silent)
    }

    /// Build the player command for a cue file
    pub fn command(&self, path: &Path) -> Option<Command> {
        if self.is_silent() {
            return None;
        }
        let mut cmd = Command::new(self.program());
        cmd.args(self.leading_args())
            .arg(path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        Some(cmd)
    }

    /// Start playing a cue file
    pub fn spawn(&self, path: &Path, kill_on_drop: bool) -> Result<Child, SoundError> {
        let mut cmd = self.command(path).ok_or(SoundError::NoBackend)?;
        cmd.kill_on_drop(kill_on_drop)
            .spawn()
            .map_err(|source| SoundError::Spawn {
                program: self.name().to_string(),
                source,
            })
    }

    /// Find out how long a cue file plays
    pub async fn probe_duration(&self, path: &Path) -> Result<Duration, SoundError> {
        let duration = match self {
            Self::Afplay => afinfo_duration(path).await?,
            _ => {
                let bytes = tokio::fs::read(path).await.map_err(SoundError::Stage)?;
                wav::duration(&bytes)?
            }
        };
        if duration.is_zero() {
            return Err(SoundError::Probe("zero-length cue".to_string()));
        }
        Ok(duration)
    }
}

async fn afinfo_duration(path: &Path) -> Result<Duration, SoundError> {
    let output = Command::new("afinfo")
        .arg(path)
        .output()
        .await
        .map_err(|source| SoundError::Spawn {
            program: "afinfo".to_string(),
            source,
        })?;

    if !output.status.success() {
        return Err(SoundError::Probe(format!(
            "afinfo failed with status: {}",
            output.status
        )));
    }

    parse_afinfo(&String::from_utf8_lossy(&output.stdout))
        .ok_or_else(|| SoundError::Probe("could not parse duration from afinfo output".to_string()))
}

/// Pull the length out of afinfo's `estimated duration: 2.000000 sec` line
pub fn parse_afinfo(output: &str) -> Option<Duration> {
    output
        .lines()
        .find_map(|line| line.trim().strip_prefix("estimated duration:"))
        .and_then(|rest| rest.split_whitespace().next())
        .and_then(|secs| secs.parse::<f64>().ok())
        .filter(|secs| secs.is_finite() && *secs > 0.0)
        .map(Duration::from_secs_f64)
}
