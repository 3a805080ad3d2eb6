// SPDX-License-Identifier: MPL-2.0
//! Wall-clock anchored playback timeline.
//!
//! The clock is a pair of fields: a monotonic anchor instant and the media
//! PTS at that anchor. While playing, the current media time is
//! `start_pts + elapsed * speed`. The clock is re-anchored on play, seek,
//! loop wrap, and the first decoded frame after each of those.

use std::time::Instant;

/// Wall-clock anchored media timeline.
#[derive(Debug, Clone)]
pub(crate) struct PlaybackClock {
    /// Monotonic instant of the last (re)anchor.
    anchor: Instant,

    /// Media PTS at the anchor, in seconds.
    start_pts: f64,
}

impl PlaybackClock {
    pub fn new() -> Self {
        Self {
            anchor: Instant::now(),
            start_pts: 0.0,
        }
    }

    /// Re-anchors the timeline: media time `pts` corresponds to "now".
    pub fn anchor_at(&mut self, pts: f64) {
        self.anchor = Instant::now();
        self.start_pts = pts;
    }

    /// Current media time assuming playback has run since the anchor.
    ///
    /// Callers freeze time themselves when not playing (the frozen position
    /// lives outside the clock).
    pub fn time(&self, speed: f64) -> f64 {
        self.start_pts + self.anchor.elapsed().as_secs_f64() * speed
    }

    /// Media PTS at the anchor.
    #[cfg(test)]
    pub fn start_pts(&self) -> f64 {
        self.start_pts
    }
}
