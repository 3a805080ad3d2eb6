// SPDX-License-Identifier: MPL-2.0
//! Centralized tuning constants for the playback engine.
//!
//! This module is the single source of truth for queue sizes, output formats,
//! and scheduling tolerances used across the decode pipeline.
//!
//! # Categories
//!
//! - **Video queue**: decoded frame buffering between worker and scheduler
//! - **Audio output**: fixed output format and ring sizing
//! - **Scheduling**: presentation tolerances and worker sleep intervals
//! - **Parameters**: playback speed and volume bounds

use std::time::Duration;

// ==========================================================================
// Video Queue
// ==========================================================================

/// Number of slots in the decoded video frame queue.
pub const VIDEO_QUEUE_CAPACITY: usize = 8;

// ==========================================================================
// Audio Output
// ==========================================================================

/// Output sample rate in Hz. All sources are resampled to this rate.
pub const OUTPUT_SAMPLE_RATE: u32 = 48_000;

/// Output channel count. All sources are downmixed/upmixed to stereo.
pub const OUTPUT_CHANNELS: u16 = 2;

/// Audio ring capacity in seconds of buffered output audio.
pub const AUDIO_RING_SECONDS: usize = 2;

/// Audio ring capacity in samples (not frames).
pub const AUDIO_RING_CAPACITY: usize =
    AUDIO_RING_SECONDS * OUTPUT_SAMPLE_RATE as usize * OUTPUT_CHANNELS as usize;

/// Ring fill fraction above which the VOD decoder throttles.
pub const RING_THROTTLE_FRACTION: f64 = 0.75;

// ==========================================================================
// Scheduling
// ==========================================================================

/// A queued frame whose PTS is within this many seconds of the playback
/// clock is considered due for display.
pub const FRAME_DUE_TOLERANCE_SECS: f64 = 0.016;

/// Frames older than the playback clock by more than this are dropped
/// during decode instead of being queued (bounded catch-up on VOD).
pub const LATE_FRAME_DROP_SECS: f64 = 0.5;

/// Worker sleep while the player is not in the Playing state.
pub const IDLE_SLEEP: Duration = Duration::from_millis(10);

/// Worker sleep while VOD backpressure holds decoding back.
pub const BACKPRESSURE_SLEEP: Duration = Duration::from_millis(5);

/// Maximum time to wait for the decode worker to observe a stop request.
pub const WORKER_JOIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Fallback frame interval when the container reports no usable frame rate.
pub const FALLBACK_FRAME_INTERVAL_SECS: f64 = 1.0 / 30.0;

// ==========================================================================
// Parameters
// ==========================================================================

/// Minimum playback speed multiplier.
pub const MIN_SPEED: f64 = 0.25;

/// Maximum playback speed multiplier.
pub const MAX_SPEED: f64 = 4.0;

/// Default playback speed (1.0 = real time).
pub const DEFAULT_SPEED: f64 = 1.0;

/// Minimum volume level.
pub const MIN_VOLUME: f32 = 0.0;

/// Maximum volume level.
pub const MAX_VOLUME: f32 = 1.0;

/// Default volume level.
pub const DEFAULT_VOLUME: f32 = 1.0;

/// Upper bound on stored error message length in bytes.
pub const ERROR_MESSAGE_MAX_BYTES: usize = 255;

// ==========================================================================
// Compile-time Validation
// ==========================================================================

const _: () = {
    assert!(VIDEO_QUEUE_CAPACITY >= 2);
    assert!(AUDIO_RING_SECONDS >= 2);
    assert!(AUDIO_RING_CAPACITY >= 2 * 48_000 * 2);
    assert!(OUTPUT_CHANNELS == 2);

    assert!(RING_THROTTLE_FRACTION > 0.0);
    assert!(RING_THROTTLE_FRACTION < 1.0);
    assert!(FRAME_DUE_TOLERANCE_SECS > 0.0);
    assert!(LATE_FRAME_DROP_SECS > FRAME_DUE_TOLERANCE_SECS);

    assert!(MIN_SPEED > 0.0);
    assert!(MAX_SPEED > MIN_SPEED);
    assert!(DEFAULT_SPEED >= MIN_SPEED);
    assert!(DEFAULT_SPEED <= MAX_SPEED);

    assert!(MIN_VOLUME >= 0.0);
    assert!(MAX_VOLUME >= MIN_VOLUME);
    assert!(DEFAULT_VOLUME >= MIN_VOLUME);
    assert!(DEFAULT_VOLUME <= MAX_VOLUME);
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ring_holds_at_least_two_seconds_of_stereo_output() {
        let samples_per_second = OUTPUT_SAMPLE_RATE as usize * OUTPUT_CHANNELS as usize;
        assert!(AUDIO_RING_CAPACITY >= 2 * samples_per_second);
    }

    #[test]
    fn sleep_intervals_are_short_enough_for_prompt_cancellation() {
        assert!(IDLE_SLEEP <= Duration::from_millis(10));
        assert!(BACKPRESSURE_SLEEP <= IDLE_SLEEP);
        assert!(WORKER_JOIN_TIMEOUT >= Duration::from_millis(100));
    }

    #[test]
    fn fallback_frame_interval_is_thirty_fps() {
        assert!((FALLBACK_FRAME_INTERVAL_SECS - 1.0 / 30.0).abs() < 1e-12);
    }
}
