//! pomodoro - Work/break timer that blocks distracting sites
//!
//! "Keep the tab closed until the bell rings."
//!
//! A session runs one or more work/break cycles. During each work phase the
//! configured sites are pointed at 127.0.0.1 through a marked block in the
//! hosts file, and audio cues mark the start, the running clock and the end.
//! The block is removed for every break and whenever the session ends.
//!
//! Modules:
//! - blocklist: the exact text inserted into the hosts file
//! - hosts: apply and revert that text against an open hosts file
//! - cancel: hierarchical cancellation shared by every wait
//! - countdown: cancellable wait with a progress line
//! - wav, backend, sound: cue synthesis, platform players, looping
//! - config: file and flag layering into a validated session config
//! - session: the work/break state machine
//! - cli: command-line definitions

pub mod backend;
pub mod blocklist;
pub mod cancel;
pub mod cli;
pub mod config;
pub mod countdown;
pub mod hosts;
pub mod session;
pub mod sound;
pub mod wav;

pub use backend::Backend;
pub use blocklist::BlockTemplate;
pub use cancel::CancelScope;
pub use config::{FileConfig, Overrides, SessionConfig};
pub use hosts::{HostsBlocker, HostsFile};
pub use session::{Session, SessionOutcome, SessionPhase};
pub use sound::{Cue, CuePlayer, CueStore, SoundPlayer};
