// SPDX-License-Identifier: MPL-2.0
//! Error types for the playback engine.
//!
//! Every fallible operation returns [`PlayerError`], which carries a stable
//! numeric code for host bindings alongside a human-readable message. The
//! message stored as the player's last error is bounded to 255 bytes.

use std::fmt;

use crate::config::ERROR_MESSAGE_MAX_BYTES;

/// Errors surfaced by the player.
///
/// Variants that wrap a `String` carry the underlying library's message
/// where one is available.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayerError {
    /// Operation on a player with no usable session.
    InvalidPlayer,

    /// The input could not be opened or stream metadata could not be found.
    OpenFailed(String),

    /// The input contains neither a video nor an audio stream.
    NoVideoStream,

    /// The input contains no audio stream.
    NoAudioStream,

    /// No decoder is available for the stream's codec.
    CodecNotFound(String),

    /// A decoder was found but could not be opened.
    CodecOpenFailed(String),

    /// The demuxer or a decoder failed mid-playback.
    DecodeFailed(String),

    /// Seeking failed, or was requested on a live source.
    SeekFailed,

    /// An allocation or resource acquisition failed.
    OutOfMemory,

    /// The operation is not valid in the current state.
    NotReady,

    /// A parameter was outside its valid range.
    InvalidParameter(String),
}

impl PlayerError {
    /// Stable numeric code for host bindings. 0 is reserved for "no error".
    #[must_use]
    pub fn code(&self) -> i32 {
        match self {
            PlayerError::InvalidPlayer => -1,
            PlayerError::OpenFailed(_) => -2,
            PlayerError::NoVideoStream => -3,
            PlayerError::NoAudioStream => -4,
            PlayerError::CodecNotFound(_) => -5,
            PlayerError::CodecOpenFailed(_) => -6,
            PlayerError::DecodeFailed(_) => -7,
            PlayerError::SeekFailed => -8,
            PlayerError::OutOfMemory => -9,
            PlayerError::NotReady => -10,
            PlayerError::InvalidParameter(_) => -11,
        }
    }

    /// Returns a copy with its message truncated to the storage bound.
    ///
    /// Truncation is UTF-8 safe: the cut point backs up to a character
    /// boundary.
    #[must_use]
    pub(crate) fn bounded(self) -> Self {
        match self {
            PlayerError::OpenFailed(m) => PlayerError::OpenFailed(truncate_message(m)),
            PlayerError::CodecNotFound(m) => PlayerError::CodecNotFound(truncate_message(m)),
            PlayerError::CodecOpenFailed(m) => PlayerError::CodecOpenFailed(truncate_message(m)),
            PlayerError::DecodeFailed(m) => PlayerError::DecodeFailed(truncate_message(m)),
            PlayerError::InvalidParameter(m) => PlayerError::InvalidParameter(truncate_message(m)),
            other => other,
        }
    }
}

/// Truncates a message to [`ERROR_MESSAGE_MAX_BYTES`] on a char boundary.
fn truncate_message(mut message: String) -> String {
    if message.len() > ERROR_MESSAGE_MAX_BYTES {
        let mut cut = ERROR_MESSAGE_MAX_BYTES;
        while !message.is_char_boundary(cut) {
            cut -= 1;
        }
        message.truncate(cut);
    }
    message
}

impl fmt::Display for PlayerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlayerError::InvalidPlayer => write!(f, "invalid player"),
            PlayerError::OpenFailed(msg) => write!(f, "open failed: {}", msg),
            PlayerError::NoVideoStream => write!(f, "no video or audio streams found"),
            PlayerError::NoAudioStream => write!(f, "no audio stream found"),
            PlayerError::CodecNotFound(msg) => write!(f, "codec not found: {}", msg),
            PlayerError::CodecOpenFailed(msg) => write!(f, "codec open failed: {}", msg),
            PlayerError::DecodeFailed(msg) => write!(f, "decode failed: {}", msg),
            PlayerError::SeekFailed => write!(f, "seek failed"),
            PlayerError::OutOfMemory => write!(f, "out of memory"),
            PlayerError::NotReady => write!(f, "player is not ready"),
            PlayerError::InvalidParameter(msg) => write!(f, "invalid parameter: {}", msg),
        }
    }
}

impl std::error::Error for PlayerError {}

pub type Result<T> = std::result::Result<T, PlayerError>;
