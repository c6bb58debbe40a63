//! Session orchestration
//!
//! A session runs `intervals` work/break cycles:
//!
//! ```text
//! Idle -> EnterWork -> Blocking -> Working -> Unblocking -> Breaking -> (EnterWork | Done)
//!                                    |                         |
//!                                    +------> Cancelled <------+
//! ```
//!
//! Sites are blocked only while a work phase runs. However the session ends
//! (completion, cancellation, hosts I/O failure or unwinding), the hosts file
//! is left without the block.

use std::io::Write;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Local;
use daedalos_core::format;
use tracing::{debug, error, info};

use crate::cancel::CancelScope;
use crate::config::SessionConfig;
use crate::countdown::Countdown;
use crate::hosts::HostsBlocker;
use crate::sound::{Cue, CuePlayer};

const RULE: &str = "═══════════════════════════════════════";

/// Which half of a cycle is running
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Work,
    Break,
}

impl SessionPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionPhase::Work => "work",
            SessionPhase::Break => "break",
        }
    }
}

/// How a session ended, when it did not fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    /// Every cycle ran to the end
    Completed { cycles: u32 },
    /// Cancelled during the given phase of the given cycle
    Cancelled { phase: SessionPhase, cycle: u32 },
}

/// Orchestrator states. Cycles are 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    EnterWork { cycle: u32 },
    Blocking { cycle: u32 },
    Working { cycle: u32 },
    Unblocking { cycle: u32 },
    Breaking { cycle: u32 },
    Done,
    Cancelled { phase: SessionPhase, cycle: u32 },
}

/// Runs the work/break cycles for one config
pub struct Session<P: CuePlayer, W: Write + Send> {
    config: SessionConfig,
    player: P,
    countdown: Countdown,
    out: W,
}

impl<P: CuePlayer, W: Write + Send> Session<P, W> {
    pub fn new(config: SessionConfig, player: P, out: W) -> Self {
        Self {
            config,
            player,
            countdown: Countdown::default(),
            out,
        }
    }

    pub fn output(&self) -> &W {
        &self.out
    }

    /// Run every cycle until done, cancelled or failed.
    ///
    /// Cancellation is a normal outcome. Errors are hosts file failures; the
    /// block is still reverted and sound files released before returning.
    pub async fn run(&mut self, scope: &CancelScope) -> Result<SessionOutcome> {
        // With nothing to block, the hosts file is never touched.
        let blocker = if self.config.blocks_sites() {
            match HostsBlocker::open(&self.config.hosts_path, &self.config.blocklist) {
                Ok(blocker) => Some(blocker),
                Err(e) => {
                    self.player.release();
                    return Err(e).context("Failed to open hosts file");
                }
            }
        } else {
            None
        };

        self.run_with(scope, blocker).await
    }

    /// Drive the cycles against an already-open blocker, then clean up
    async fn run_with(
        &mut self,
        scope: &CancelScope,
        mut blocker: Option<HostsBlocker>,
    ) -> Result<SessionOutcome> {
        let result = self.drive(scope, &mut blocker).await;
        let cleanup = self.finish(blocker);

        match (result, cleanup) {
            (Ok(outcome), Ok(())) => Ok(outcome),
            (Ok(_), Err(e)) => Err(e),
            (Err(e), Ok(())) => Err(e),
            (Err(e), Err(cleanup_err)) => {
                error!("Error during cleanup: {:#}", cleanup_err);
                Err(e)
            }
        }
    }

    async fn drive(
        &mut self,
        scope: &CancelScope,
        blocker: &mut Option<HostsBlocker>,
    ) -> Result<SessionOutcome> {
        let intervals = self.config.intervals;
        self.say(&format!("🍅 Starting {} Pomodoro cycle(s)\n", intervals));

        let mut state = State::EnterWork { cycle: 1 };
        loop {
            debug!(?state, "session state");
            state = match state {
                State::EnterWork { cycle } if scope.is_cancelled() => State::Cancelled {
                    phase: SessionPhase::Work,
                    cycle,
                },

                State::EnterWork { cycle } => {
                    self.say(RULE);
                    self.say(&format!("🍅 Pomodoro {} of {}", cycle, intervals));
                    self.say(&format!("{}\n", RULE));
                    State::Blocking { cycle }
                }

                State::Blocking { cycle } => {
                    if let Some(blocker) = blocker.as_mut() {
                        self.say("Blocking distracting sites...");
                        blocker.block().context("Failed to block sites")?;
                    }
                    State::Working { cycle }
                }

                State::Working { cycle } => {
                    let work = self.config.work;
                    self.player.play_once(Cue::Windup);
                    self.say(&format!(
                        "⏰ Work session ({}, ends at {})",
                        format::duration(work),
                        ends_at(work)
                    ));

                    let ticking = if self.config.silent {
                        None
                    } else {
                        Some(self.player.start_loop(Cue::Ticking, scope.child()))
                    };

                    let completed = self.countdown.wait(&mut self.out, scope, work, "🍅").await;

                    if let Some(ticking) = ticking {
                        ticking.stop();
                    }

                    if completed {
                        self.player.play_once(Cue::Ding);
                        self.say("✅ Work session complete!");
                        info!(cycle, "work phase complete");
                        State::Unblocking { cycle }
                    } else {
                        State::Cancelled {
                            phase: SessionPhase::Work,
                            cycle,
                        }
                    }
                }

                State::Unblocking { cycle } => {
                    if let Some(blocker) = blocker.as_mut() {
                        self.say("Unblocking sites for break...");
                        blocker.unblock().context("Failed to unblock sites")?;
                    }
                    State::Breaking { cycle }
                }

                State::Breaking { cycle } => {
                    let pause = self.config.break_after(cycle);
                    if pause > self.config.break_duration {
                        self.say("\n☕ Interval completed, taking a longer break!");
                    }
                    self.say(&format!("\n☕ Break time! ({})", format::duration(pause)));
                    if blocker.is_some() {
                        self.say("Sites are now unblocked. Take a break!");
                    }

                    if self.countdown.wait(&mut self.out, scope, pause, "☕").await {
                        self.say("⏰ Break finished!");
                        self.say(&format!("\n✨ Pomodoro {} complete!\n", cycle));
                        info!(cycle, "break complete");
                        if cycle >= intervals {
                            State::Done
                        } else {
                            State::EnterWork { cycle: cycle + 1 }
                        }
                    } else {
                        State::Cancelled {
                            phase: SessionPhase::Break,
                            cycle,
                        }
                    }
                }

                State::Done => {
                    self.say(RULE);
                    self.say(&format!("🎉 All {} Pomodoro cycles complete!", intervals));
                    self.say(RULE);
                    return Ok(SessionOutcome::Completed { cycles: intervals });
                }

                State::Cancelled { phase, cycle } => {
                    match phase {
                        SessionPhase::Work => self.say("❌ Pomodoro cancelled"),
                        SessionPhase::Break => self.say("❌ Break cancelled"),
                    }
                    info!(cycle, phase = phase.as_str(), "session cancelled");
                    return Ok(SessionOutcome::Cancelled { phase, cycle });
                }
            };
        }
    }

    /// Single exit path: revert the block if it may be active, then release
    /// the hosts file and the sound files.
    fn finish(&mut self, blocker: Option<HostsBlocker>) -> Result<()> {
        let result = match blocker {
            Some(blocker) => {
                let was_patched = blocker.is_patched();
                if was_patched {
                    self.say("Unblocking sites...");
                }
                blocker
                    .release()
                    .context("Failed to restore hosts file during cleanup")
            }
            None => Ok(()),
        };
        self.player.release();
        result
    }

    fn say(&mut self, line: &str) {
        // Output problems never stop the timer.
        let _ = writeln!(self.out, "{}", line);
        let _ = self.out.flush();
    }
}

fn ends_at(length: Duration) -> String {
    let end = chrono::Duration::from_std(length)
        .ok()
        .and_then(|d| Local::now().checked_add_signed(d));
    match end {
        Some(end) => end.format("%H:%M").to_string(),
        None => "--:--".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blocklist::BlockTemplate;
    use crate::hosts::test_storage::MemoryStorage;
    use crate::hosts::HostsFile;
    use crate::sound::LoopHandle;
    use std::fs;
    use std::path::{Path, PathBuf};
    use std::sync::{Arc, Mutex};
    use tokio::time::Instant;

    const ORIGINAL: &str = "127.0.0.1 localhost\n::1 localhost\n";

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Event {
        Once(Cue),
        Loop(Cue),
        Released,
    }

    /// Records every call instead of playing anything
    #[derive(Default, Clone)]
    struct RecordingPlayer {
        events: Arc<Mutex<Vec<Event>>>,
        loops: Arc<Mutex<Vec<CancelScope>>>,
    }

    impl RecordingPlayer {
        fn events(&self) -> Vec<Event> {
            self.events.lock().unwrap().clone()
        }

        fn all_loops_stopped(&self) -> bool {
            self.loops.lock().unwrap().iter().all(|s| s.is_cancelled())
        }
    }

    impl CuePlayer for RecordingPlayer {
        fn play_once(&self, cue: Cue) {
            self.events.lock().unwrap().push(Event::Once(cue));
        }

        fn start_loop(&self, cue: Cue, scope: CancelScope) -> LoopHandle {
            self.events.lock().unwrap().push(Event::Loop(cue));
            self.loops.lock().unwrap().push(scope.clone());
            LoopHandle::new(scope)
        }

        fn release(&self) {
            self.events.lock().unwrap().push(Event::Released);
        }
    }

    fn hosts_fixture() -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hosts");
        fs::write(&path, ORIGINAL).unwrap();
        (dir, path)
    }

    fn blocked(path: &Path) -> bool {
        let template = BlockTemplate::build(&["example.com"]);
        fs::read_to_string(path).unwrap().contains(template.as_str())
    }

    fn seconds(n: u64) -> Duration {
        Duration::from_secs(n)
    }

    fn output_of<P: CuePlayer>(session: &Session<P, Vec<u8>>) -> String {
        String::from_utf8_lossy(session.output()).to_string()
    }

    #[tokio::test(start_paused = true)]
    async fn test_two_cycles_block_only_during_work() {
        let (_dir, hosts) = hosts_fixture();
        let config = SessionConfig::new(seconds(1), seconds(1), 2)
            .with_blocklist(vec!["example.com".to_string()], &hosts);
        let player = RecordingPlayer::default();
        let mut session = Session::new(config, player.clone(), Vec::new());

        let scope = CancelScope::new();
        let start = Instant::now();
        let task = tokio::spawn(async move {
            let outcome = session.run(&scope).await;
            (outcome, session)
        });

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(blocked(&hosts), "work 1 should block");
        tokio::time::sleep(seconds(1)).await;
        assert!(!blocked(&hosts), "break 1 should unblock");
        tokio::time::sleep(seconds(1)).await;
        assert!(blocked(&hosts), "work 2 should block again");
        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert!(!blocked(&hosts), "break 2 should unblock");

        let (outcome, session) = task.await.unwrap();
        assert_eq!(outcome.unwrap(), SessionOutcome::Completed { cycles: 2 });

        // 1s work + 1s break + 1s work + 3s final break
        assert!(start.elapsed() >= seconds(6));
        assert!(start.elapsed() < Duration::from_millis(6500));
        assert_eq!(fs::read_to_string(&hosts).unwrap(), ORIGINAL);

        assert_eq!(
            player.events(),
            vec![
                Event::Once(Cue::Windup),
                Event::Loop(Cue::Ticking),
                Event::Once(Cue::Ding),
                Event::Once(Cue::Windup),
                Event::Loop(Cue::Ticking),
                Event::Once(Cue::Ding),
                Event::Released,
            ]
        );
        assert!(player.all_loops_stopped());

        let output = output_of(&session);
        assert!(output.contains("Interval completed, taking a longer break!"));
        assert!(output.contains("All 2 Pomodoro cycles complete!"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_work() {
        let (_dir, hosts) = hosts_fixture();
        let config = SessionConfig::new(seconds(1), seconds(1), 1)
            .with_blocklist(vec!["example.com".to_string()], &hosts);
        let player = RecordingPlayer::default();
        let mut session = Session::new(config, player.clone(), Vec::new());

        let scope = CancelScope::new();
        let trigger = scope.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(500)).await;
            trigger.cancel();
        });

        let start = Instant::now();
        let outcome = session.run(&scope).await.unwrap();

        assert_eq!(
            outcome,
            SessionOutcome::Cancelled {
                phase: SessionPhase::Work,
                cycle: 1
            }
        );
        assert!(start.elapsed() < seconds(1));
        assert_eq!(fs::read_to_string(&hosts).unwrap(), ORIGINAL);
        assert_eq!(
            player.events(),
            vec![
                Event::Once(Cue::Windup),
                Event::Loop(Cue::Ticking),
                Event::Released,
            ]
        );
        assert!(player.all_loops_stopped());
        assert!(output_of(&session).contains("Pomodoro cancelled"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_break() {
        let (_dir, hosts) = hosts_fixture();
        let config = SessionConfig::new(seconds(1), seconds(5), 1)
            .with_blocklist(vec!["example.com".to_string()], &hosts);
        let player = RecordingPlayer::default();
        let mut session = Session::new(config, player.clone(), Vec::new());

        let scope = CancelScope::new();
        let trigger = scope.clone();
        tokio::spawn(async move {
            tokio::time::sleep(seconds(2)).await;
            trigger.cancel();
        });

        let outcome = session.run(&scope).await.unwrap();

        assert_eq!(
            outcome,
            SessionOutcome::Cancelled {
                phase: SessionPhase::Break,
                cycle: 1
            }
        );
        assert_eq!(fs::read_to_string(&hosts).unwrap(), ORIGINAL);
        assert_eq!(player.events().last(), Some(&Event::Released));
        assert!(output_of(&session).contains("Break cancelled"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_blocklist_never_opens_hosts() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("does-not-exist");
        let config = SessionConfig::new(seconds(1), seconds(1), 1)
            .with_blocklist(vec![String::new()], &missing);
        let mut session = Session::new(config, RecordingPlayer::default(), Vec::new());

        let outcome = session.run(&CancelScope::new()).await.unwrap();

        assert_eq!(outcome, SessionOutcome::Completed { cycles: 1 });
        assert!(!missing.exists());
        assert!(!output_of(&session).contains("Blocking distracting sites"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_silent_skips_ticking_but_still_blocks() {
        let (_dir, hosts) = hosts_fixture();
        let config = SessionConfig::new(seconds(1), seconds(1), 1)
            .with_blocklist(vec!["example.com".to_string()], &hosts)
            .silent(true);
        let player = RecordingPlayer::default();
        let mut session = Session::new(config, player.clone(), Vec::new());

        let scope = CancelScope::new();
        let task = tokio::spawn(async move { session.run(&scope).await });

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(blocked(&hosts));

        task.await.unwrap().unwrap();
        assert!(!player.events().contains(&Event::Loop(Cue::Ticking)));
        assert!(player.events().contains(&Event::Once(Cue::Ding)));
        assert_eq!(fs::read_to_string(&hosts).unwrap(), ORIGINAL);
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_interval_break_not_tripled() {
        let config = SessionConfig::new(seconds(1), seconds(2), 1);
        let mut session = Session::new(config, RecordingPlayer::default(), Vec::new());

        let start = Instant::now();
        session.run(&CancelScope::new()).await.unwrap();

        assert!(start.elapsed() >= seconds(3));
        assert!(start.elapsed() < Duration::from_millis(3500));
        assert!(!output_of(&session).contains("longer break"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_hosts_file_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let config = SessionConfig::new(seconds(1), seconds(1), 1)
            .with_blocklist(vec!["example.com".to_string()], dir.path().join("missing"));
        let player = RecordingPlayer::default();
        let mut session = Session::new(config, player.clone(), Vec::new());

        let err = session.run(&CancelScope::new()).await.unwrap_err();

        assert!(format!("{:#}", err).contains("Failed to open hosts file"));
        assert_eq!(player.events(), vec![Event::Released]);
    }

    fn memory_blocker(storage: &MemoryStorage) -> HostsBlocker {
        HostsBlocker::new(
            HostsFile::with_storage(storage.clone(), "hosts"),
            BlockTemplate::build(&["example.com"]),
        )
    }

    fn blocking_config(intervals: u32) -> SessionConfig {
        SessionConfig::new(seconds(1), seconds(1), intervals)
            .with_blocklist(vec!["example.com".to_string()], "hosts")
    }

    #[tokio::test(start_paused = true)]
    async fn test_block_failure_aborts_and_cleans_up() {
        let storage = MemoryStorage::new(ORIGINAL.as_bytes());
        storage.fail_writes(true);
        let player = RecordingPlayer::default();
        let mut session = Session::new(blocking_config(3), player.clone(), Vec::new());

        let err = session
            .run_with(&CancelScope::new(), Some(memory_blocker(&storage)))
            .await
            .unwrap_err();

        assert!(format!("{:#}", err).contains("Failed to block sites"));
        assert_eq!(player.events(), vec![Event::Released]);
        assert_eq!(storage.contents(), ORIGINAL.as_bytes());
    }

    #[tokio::test(start_paused = true)]
    async fn test_unblock_failure_aborts_and_cleans_up() {
        let storage = MemoryStorage::new(ORIGINAL.as_bytes());
        let player = RecordingPlayer::default();
        let mut session = Session::new(blocking_config(3), player.clone(), Vec::new());

        // Writes start failing halfway through work 1, so the unblock before
        // break 1 fails.
        let flaky = storage.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(500)).await;
            flaky.fail_writes(true);
        });

        let err = session
            .run_with(&CancelScope::new(), Some(memory_blocker(&storage)))
            .await
            .unwrap_err();

        assert!(format!("{:#}", err).contains("Failed to unblock sites"));
        let events = player.events();
        assert_eq!(
            events.iter().filter(|e| **e == Event::Once(Cue::Windup)).count(),
            1
        );
        assert_eq!(events.last(), Some(&Event::Released));
        assert!(player.all_loops_stopped());
        let output = output_of(&session);
        assert!(!output.contains("Break time"));
        // The final revert was still attempted.
        assert!(output.ends_with("Unblocking sites...\n"));

        // Both reverts failed before writing, so the block is still there.
        storage.fail_writes(false);
        let mut hosts = HostsFile::with_storage(storage.clone(), "hosts");
        assert!(hosts.contains(&BlockTemplate::build(&["example.com"])).unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_already_cancelled_session_leaves_file_untouched() {
        let (_dir, hosts) = hosts_fixture();
        let config = SessionConfig::new(seconds(60), seconds(5), 4)
            .with_blocklist(vec!["example.com".to_string()], &hosts);
        let player = RecordingPlayer::default();
        let mut session = Session::new(config, player.clone(), Vec::new());

        let scope = CancelScope::new();
        scope.cancel();
        let outcome = session.run(&scope).await.unwrap();
        assert_eq!(player.events(), vec![Event::Released]);

        assert_eq!(
            outcome,
            SessionOutcome::Cancelled {
                phase: SessionPhase::Work,
                cycle: 1
            }
        );
        assert_eq!(fs::read_to_string(&hosts).unwrap(), ORIGINAL);
    }
}
