// SPDX-License-Identifier: MPL-2.0
//! Playback state machine.
//!
//! States and their transitions:
//!
//! ```text
//! Idle --open()--> Opening --success--> Ready
//!                          \--failure--> Error
//! Ready --play()--> Playing --pause()--> Paused --play()--> Playing
//! Playing --EOF, not loop--> EndOfFile
//! Playing|Paused --stop()--> Stopped
//! Stopped|Paused|Playing|Ready --seek(t)--> (same state)
//! any --close()--> Idle
//! ```
//!
//! Transition predicates live here so they can be tested without media.

use std::fmt;

/// Lifecycle state of a player.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerState {
    /// No media is open.
    Idle,

    /// `open()` is in progress.
    Opening,

    /// Media is open; playback has not started.
    Ready,

    /// The decode worker is producing and the clock is running.
    Playing,

    /// Playback is suspended at the current position.
    Paused,

    /// Playback was stopped and rewound to the beginning.
    Stopped,

    /// Playback reached the end of a non-looping source.
    EndOfFile,

    /// A fatal error occurred; see the last error.
    Error,
}

impl PlayerState {
    /// Returns true while the decode worker should produce frames.
    #[must_use]
    pub fn is_playing(self) -> bool {
        self == PlayerState::Playing
    }

    /// Returns true if playback is suspended but resumable.
    #[must_use]
    pub fn is_paused(self) -> bool {
        self == PlayerState::Paused
    }

    /// Returns true once media has been opened and not yet closed.
    #[must_use]
    pub fn has_media(self) -> bool {
        !matches!(self, PlayerState::Idle | PlayerState::Opening)
    }

    /// States from which `play()` is accepted.
    pub(crate) fn accepts_play(self) -> bool {
        matches!(
            self,
            PlayerState::Ready | PlayerState::Paused | PlayerState::Stopped
        )
    }

    /// States from which `seek()` is accepted (live sources reject earlier).
    pub(crate) fn accepts_seek(self) -> bool {
        matches!(
            self,
            PlayerState::Ready | PlayerState::Playing | PlayerState::Paused | PlayerState::Stopped
        )
    }

    /// States from which `stop()` rewinds the source.
    ///
    /// EndOfFile is included: stop-then-play is the replay path.
    pub(crate) fn accepts_stop(self) -> bool {
        matches!(
            self,
            PlayerState::Ready
                | PlayerState::Playing
                | PlayerState::Paused
                | PlayerState::Stopped
                | PlayerState::EndOfFile
        )
    }
}

impl fmt::Display for PlayerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PlayerState::Idle => "idle",
            PlayerState::Opening => "opening",
            PlayerState::Ready => "ready",
            PlayerState::Playing => "playing",
            PlayerState::Paused => "paused",
            PlayerState::Stopped => "stopped",
            PlayerState::EndOfFile => "end-of-file",
            PlayerState::Error => "error",
        };
        write!(f, "{}", name)
    }
}
