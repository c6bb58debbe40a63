//! Audio cues
//!
//! Cues are staged as WAV files in a private temporary directory the first
//! time one is needed, then handed to the platform player. One-shot cues are
//! fire-and-forget. The ticking cue runs as a background task bound to a
//! [`CancelScope`] and restarts itself until that scope is cancelled.
//!
//! Playback problems are never fatal: they are logged and the session goes on.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tempfile::TempDir;
use thiserror::Error;
use tokio::process::Child;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::backend::Backend;
use crate::cancel::CancelScope;
use crate::wav::{self, WavError};

/// How early the next ticking play starts before the current one ends
pub const LOOP_OVERLAP: Duration = Duration::from_millis(200);

/// Errors from staging or playing cues
#[derive(Error, Debug)]
pub enum SoundError {
    #[error("No audio player available")]
    NoBackend,

    #[error("Failed to stage sound file: {0}")]
    Stage(#[source] std::io::Error),

    #[error("Failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Could not determine cue duration: {0}")]
    Probe(String),

    #[error("Invalid sound file: {0}")]
    Wav(#[from] WavError),

    #[error("Sound files already released")]
    Released,
}

/// A named audio clip
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Cue {
    /// Played when a work phase starts
    Windup,
    /// Looped through a work phase
    Ticking,
    /// Played when a work phase completes
    Ding,
}

impl Cue {
    pub const ALL: [Cue; 3] = [Cue::Windup, Cue::Ticking, Cue::Ding];

    /// File name used for staging and for custom sound directories
    pub fn file_name(&self) -> &'static str {
        match self {
            Cue::Windup => "windup.wav",
            Cue::Ticking => "ticking.wav",
            Cue::Ding => "ding.wav",
        }
    }

    /// Synthesize the built-in clip
    pub fn render(&self) -> Vec<u8> {
        match self {
            Cue::Windup => wav::windup(),
            Cue::Ticking => wav::ticking(),
            Cue::Ding => wav::ding(),
        }
    }
}

/// Staged cue files, keyed by cue.
///
/// The staging directory is created on first use and deleted exactly once,
/// by [`CueStore::release`] or, failing that, when the store is dropped.
#[derive(Debug, Default)]
pub struct CueStore {
    custom_dir: Option<PathBuf>,
    state: Mutex<StoreState>,
}

#[derive(Debug, Default)]
struct StoreState {
    dir: Option<TempDir>,
    files: HashMap<Cue, PathBuf>,
    released: bool,
}

impl CueStore {
    /// Create a store. Files in `custom_dir` named after a cue replace the
    /// built-in clip.
    pub fn new(custom_dir: Option<PathBuf>) -> Self {
        Self {
            custom_dir,
            state: Mutex::new(StoreState::default()),
        }
    }

    /// Get a playable file for the cue, staging all built-in cues on first use
    pub fn path(&self, cue: Cue) -> Result<PathBuf, SoundError> {
        if let Some(dir) = &self.custom_dir {
            let custom = dir.join(cue.file_name());
            if custom.is_file() {
                return Ok(custom);
            }
        }

        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if state.released {
            return Err(SoundError::Released);
        }
        if state.dir.is_none() {
            let dir = tempfile::Builder::new()
                .prefix("pomodoro-sounds-")
                .tempdir()
                .map_err(SoundError::Stage)?;
            for cue in Cue::ALL {
                let path = dir.path().join(cue.file_name());
                std::fs::write(&path, cue.render()).map_err(SoundError::Stage)?;
                state.files.insert(cue, path);
            }
            debug!(dir = %dir.path().display(), "staged sound files");
            state.dir = Some(dir);
        }

        state
            .files
            .get(&cue)
            .cloned()
            .ok_or(SoundError::Released)
    }

    /// Whether the built-in cues are currently staged on disk
    pub fn is_staged(&self) -> bool {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.dir.is_some()
    }

    /// Delete the staged files. Later calls are no-ops.
    pub fn release(&self) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.released = true;
        state.files.clear();
        if let Some(dir) = state.dir.take() {
            let path = dir.path().to_path_buf();
            if let Err(e) = dir.close() {
                warn!("Could not remove sound files in {}: {}", path.display(), e);
            }
        }
    }
}

/// Handle to a running loop. It can only ask the loop to stop.
#[derive(Debug, Clone)]
pub struct LoopHandle {
    scope: CancelScope,
}

impl LoopHandle {
    pub fn new(scope: CancelScope) -> Self {
        Self { scope }
    }

    /// Ask the loop to stop. Idempotent and does not wait for the loop.
    pub fn stop(&self) {
        self.scope.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.scope.is_cancelled()
    }
}

/// Something that can play cues for a session
pub trait CuePlayer: Send + Sync {
    /// Start a one-shot cue without waiting for it
    fn play_once(&self, cue: Cue);

    /// Repeat a cue in the background until `scope` is cancelled
    fn start_loop(&self, cue: Cue, scope: CancelScope) -> LoopHandle;

    /// Release staged resources. Called once when the session ends.
    fn release(&self);
}

/// Plays cues through the platform's command-line player
#[derive(Debug, Clone)]
pub struct SoundPlayer {
    backend: Backend,
    store: Arc<CueStore>,
}

impl SoundPlayer {
    pub fn new(backend: Backend, store: CueStore) -> Self {
        if backend.is_silent() {
            warn!("No audio player found, sound cues are disabled");
        } else {
            debug!(backend = backend.name(), "using audio backend");
        }
        Self {
            backend,
            store: Arc::new(store),
        }
    }

    /// Spawn the looping task and return its join handle
    pub fn spawn_loop(&self, cue: Cue, scope: CancelScope) -> Option<JoinHandle<()>> {
        if self.backend.is_silent() {
            return None;
        }
        let path = match self.store.path(cue) {
            Ok(path) => path,
            Err(e) => {
                warn!("Could not get sound file for {:?}: {}", cue, e);
                return None;
            }
        };

        let backend = self.backend.clone();
        Some(tokio::spawn(async move {
            match backend.probe_duration(&path).await {
                Ok(length) => loop_overlapped(&backend, &path, &scope, length).await,
                Err(e) => {
                    warn!(
                        "Could not get sound duration, falling back to sequential play: {}",
                        e
                    );
                    loop_sequential(&backend, &path, &scope).await;
                }
            }
            debug!(?cue, "sound loop stopped");
        }))
    }
}

impl CuePlayer for SoundPlayer {
    fn play_once(&self, cue: Cue) {
        if self.backend.is_silent() {
            return;
        }
        let path = match self.store.path(cue) {
            Ok(path) => path,
            Err(e) => {
                warn!("Could not get sound file for {:?}: {}", cue, e);
                return;
            }
        };

        match self.backend.spawn(&path, false) {
            // Reap the player in the background so it never lingers as a zombie.
            Ok(mut child) => {
                tokio::spawn(async move {
                    let _ = child.wait().await;
                });
            }
            Err(e) => warn!("Could not play sound: {}", e),
        }
    }

    fn start_loop(&self, cue: Cue, scope: CancelScope) -> LoopHandle {
        let _ = self.spawn_loop(cue, scope.clone());
        LoopHandle::new(scope)
    }

    fn release(&self) {
        self.store.release();
    }
}

/// Time between overlapped starts for a cue of the given length
pub fn restart_interval(length: Duration) -> Duration {
    if length > LOOP_OVERLAP {
        length - LOOP_OVERLAP
    } else {
        length / 2
    }
}

/// Restart the cue only after the previous play finished.
/// Stopping kills the current play right away.
async fn loop_sequential(backend: &Backend, path: &Path, scope: &CancelScope) {
    while !scope.is_cancelled() {
        let mut child = match backend.spawn(path, true) {
            Ok(child) => child,
            Err(e) => {
                warn!("Could not start ticking sound: {}", e);
                return;
            }
        };

        tokio::select! {
            _ = scope.cancelled() => {
                let _ = child.kill().await;
                return;
            }
            status = child.wait() => match status {
                Ok(status) if !status.success() => {
                    warn!("Ticking sound exited with {}", status);
                    return;
                }
                Ok(_) => {}
                Err(e) => {
                    warn!("Ticking sound failed: {}", e);
                    return;
                }
            }
        }
    }
}

/// Start the next play shortly before the current one ends to avoid gaps
async fn loop_overlapped(backend: &Backend, path: &Path, scope: &CancelScope, length: Duration) {
    let interval = restart_interval(length);
    let mut playing: Vec<Child> = Vec::new();

    while !scope.is_cancelled() {
        playing.retain_mut(|child| matches!(child.try_wait(), Ok(None)));

        match backend.spawn(path, true) {
            Ok(child) => playing.push(child),
            Err(e) => {
                warn!("Could not start ticking sound: {}", e);
                break;
            }
        }

        tokio::select! {
            _ = scope.cancelled() => break,
            _ = tokio::time::sleep(interval) => {}
        }
    }

    for mut child in playing {
        let _ = child.kill().await;
    }
}
