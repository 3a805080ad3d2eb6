// SPDX-License-Identifier: MPL-2.0
//! `reel` is a pull-based media playback engine.
//!
//! It decodes an audio/video source (local file, direct HTTP URL, or live
//! HLS/RTMP stream) into two synchronized real-time streams: RGBA video
//! frames sized for GPU texture upload, and interleaved stereo f32 audio
//! samples sized for a host audio callback.
//!
//! The host drives presentation:
//!
//! ```no_run
//! use reel::Player;
//!
//! let mut player = Player::new();
//! player.open("movie.mp4")?;
//! player.play()?;
//!
//! // Render loop tick:
//! player.update(1.0 / 60.0);
//! if let Some(frame) = player.video_frame() {
//!     // Upload frame.data (frame.width x frame.height RGBA) to a texture.
//! }
//!
//! // Audio callback (on the audio thread, via a cloned reader):
//! let reader = player.audio_reader();
//! let mut samples = [0.0f32; 1024];
//! let filled = reader.read(&mut samples);
//! samples[filled..].fill(0.0);
//! # Ok::<(), reel::PlayerError>(())
//! ```
//!
//! URL resolution for third-party sites, texture upload, and the audio
//! device itself are host concerns; the engine accepts only direct URLs
//! and hands out raw buffers.

#![doc(html_root_url = "https://docs.rs/reel/0.1.0")]

pub mod config;
pub mod error;
pub mod player;

pub use error::{PlayerError, Result};
pub use player::{
    AudioCallback, AudioInfo, AudioReader, PixelFormat, PlaybackSpeed, Player, PlayerState,
    VideoCallback, VideoFrame, VideoInfo, Volume,
};

/// Library version string.
#[must_use]
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
