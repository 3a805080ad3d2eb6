// SPDX-License-Identifier: MPL-2.0
//! Media playback engine built on FFmpeg.
//!
//! A decode worker thread demuxes the source, drives the video and audio
//! decoders, and converts output into RGBA frames and interleaved stereo
//! f32 samples. The host pulls frames on its render tick and samples from
//! its audio callback; a wall-clock anchored scheduler keeps both on time,
//! with distinct policies for on-demand and live sources.

mod audio_ring;
mod clock;
mod frame_queue;
mod params;
#[allow(clippy::module_inception)]
mod player;
mod session;
mod shared;
mod state;
mod worker;

pub use params::{PixelFormat, PlaybackSpeed, Volume};
pub use player::{AudioReader, Player, VideoFrame};
pub use session::{AudioInfo, VideoInfo};
pub use shared::{AudioCallback, VideoCallback};
pub use state::PlayerState;
