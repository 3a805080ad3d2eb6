// SPDX-License-Identifier: MPL-2.0
//! State shared between the host threads and the decode worker.
//!
//! Exactly two mutexes guard a session's mutable data:
//!
//! - the **state lock** ([`StateShared`]): lifecycle state, last error, the
//!   playback clock and position fields, playback parameters, callbacks;
//! - the **queue lock** ([`QueueShared`]): the video frame queue and the
//!   audio ring.
//!
//! Lock ordering: when both are held, the state lock is acquired first.
//! The decode worker never holds the state lock across a blocking demuxer
//! read; cancellation goes through a separate atomic stop flag so joining
//! the worker never requires a lock.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::error::PlayerError;
use crate::player::audio_ring::AudioRing;
use crate::player::clock::PlaybackClock;
use crate::player::frame_queue::FrameQueue;
use crate::player::params::{PlaybackSpeed, Volume};
use crate::player::state::PlayerState;

/// Callback invoked from the decode worker for each converted video frame:
/// `(pixels, width, height, stride, pts_secs)`.
pub type VideoCallback = Arc<dyn Fn(&[u8], u32, u32, usize, f64) + Send + Sync>;

/// Callback invoked from the decode worker for each resampled audio chunk:
/// `(samples, sample_count, channels, pts_secs)`.
pub type AudioCallback = Arc<dyn Fn(&[f32], usize, u16, f64) + Send + Sync>;

/// Data guarded by the state lock.
pub(crate) struct StateShared {
    pub state: PlayerState,
    pub last_error: Option<PlayerError>,

    pub clock: PlaybackClock,
    /// Frozen media position used whenever the clock is not running.
    pub current_pts: f64,
    /// PTS of the most recently promoted video frame.
    pub video_pts: f64,
    /// PTS of the most recently decoded audio frame.
    pub audio_pts: f64,
    /// Cleared on open/seek/loop wrap; the first decoded frame afterwards
    /// re-anchors the clock to its own PTS.
    pub first_frame_decoded: bool,

    pub speed: PlaybackSpeed,
    pub volume: Volume,
    pub loop_enabled: bool,

    pub video_callback: Option<VideoCallback>,
    pub audio_callback: Option<AudioCallback>,
}

impl StateShared {
    fn new() -> Self {
        Self {
            state: PlayerState::Idle,
            last_error: None,
            clock: PlaybackClock::new(),
            current_pts: 0.0,
            video_pts: 0.0,
            audio_pts: 0.0,
            first_frame_decoded: false,
            speed: PlaybackSpeed::default(),
            volume: Volume::default(),
            loop_enabled: false,
            video_callback: None,
            audio_callback: None,
        }
    }

    /// Current media time: the running clock while playing, the frozen
    /// position otherwise.
    pub fn playback_time(&self) -> f64 {
        if self.state == PlayerState::Playing {
            self.clock.time(self.speed.value())
        } else {
            self.current_pts
        }
    }

    /// Records a fatal error and transitions to the Error state.
    pub fn set_error(&mut self, error: PlayerError) {
        let error = error.bounded();
        log::warn!("player error: {}", error);
        self.last_error = Some(error);
        self.state = PlayerState::Error;
    }

    /// Resets position tracking for a fresh decode segment (open/seek/wrap).
    pub fn reset_timeline(&mut self, position: f64) {
        self.clock.anchor_at(position);
        self.current_pts = position;
        self.video_pts = position;
        self.audio_pts = position;
        self.first_frame_decoded = false;
    }
}

/// Data guarded by the queue lock.
pub(crate) struct QueueShared {
    pub frames: FrameQueue,
    pub audio: AudioRing,
}

impl QueueShared {
    fn new() -> Self {
        Self {
            frames: FrameQueue::new(),
            audio: AudioRing::new(),
        }
    }

    pub fn clear(&mut self) {
        self.frames.clear();
        self.audio.clear();
    }
}

/// All state reachable from both the host and the decode worker.
pub(crate) struct Shared {
    pub state: Mutex<StateShared>,
    pub queues: Mutex<QueueShared>,
    stop: AtomicBool,
}

impl Shared {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(StateShared::new()),
            queues: Mutex::new(QueueShared::new()),
            stop: AtomicBool::new(false),
        })
    }

    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    pub fn clear_stop(&self) {
        self.stop.store(false, Ordering::SeqCst);
    }

    pub fn stop_requested(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }
}
