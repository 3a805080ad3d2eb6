// SPDX-License-Identifier: MPL-2.0
//! Bounded ring buffer of interleaved stereo f32 samples.
//!
//! Single producer (the decode worker) and single consumer (the host audio
//! callback), both serialized by the queue lock. The ring stores samples
//! already converted to the output format; volume is never pre-applied.
//!
//! Capacity is counted in samples, not frames. Indices are always taken
//! modulo the capacity and `available` stays within `0..=capacity`.

use crate::config;

pub(crate) struct AudioRing {
    buf: Box<[f32]>,
    read: usize,
    write: usize,
    available: usize,
}

impl AudioRing {
    pub fn new() -> Self {
        Self::with_capacity(config::AUDIO_RING_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: vec![0.0; capacity].into_boxed_slice(),
            read: 0,
            write: 0,
            available: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    pub fn available(&self) -> usize {
        self.available
    }

    /// Fraction of the ring currently occupied, in `0.0..=1.0`.
    pub fn fill_fraction(&self) -> f64 {
        self.available as f64 / self.buf.len() as f64
    }

    /// Writes samples into the ring and returns how many were stored.
    ///
    /// With `overwrite_oldest` (live sources) the oldest samples are dropped
    /// to make room, so the ring always ends up holding the most recent
    /// audio. Without it (VOD) excess samples are discarded; the decoder's
    /// backpressure keeps that path rare.
    pub fn write(&mut self, samples: &[f32], overwrite_oldest: bool) -> usize {
        let capacity = self.buf.len();
        if capacity == 0 || samples.is_empty() {
            return 0;
        }

        // Live keeps the newest samples (dropping oldest buffered data and,
        // for oversized chunks, the chunk's own head); VOD keeps the
        // earliest and discards the excess.
        let src = if overwrite_oldest {
            let wanted = samples.len().min(capacity);
            let free = capacity - self.available;
            if wanted > free {
                self.drop_oldest(wanted - free);
            }
            &samples[samples.len() - wanted..]
        } else {
            let wanted = samples.len().min(capacity - self.available);
            &samples[..wanted]
        };
        let to_store = src.len();
        for &sample in src {
            self.buf[self.write] = sample;
            self.write = (self.write + 1) % capacity;
        }
        self.available += to_store;
        to_store
    }

    /// Copies up to `dst.len()` samples out of the ring, returning the count.
    ///
    /// Short reads are expected; the caller zero-fills the remainder.
    pub fn read_into(&mut self, dst: &mut [f32]) -> usize {
        let capacity = self.buf.len();
        let count = dst.len().min(self.available);
        for slot in dst.iter_mut().take(count) {
            *slot = self.buf[self.read];
            self.read = (self.read + 1) % capacity;
        }
        self.available -= count;
        count
    }

    /// Advances the read index past the oldest `count` samples.
    fn drop_oldest(&mut self, count: usize) {
        let dropped = count.min(self.available);
        self.read = (self.read + dropped) % self.buf.len();
        self.available -= dropped;
    }

    pub fn clear(&mut self) {
        self.read = 0;
        self.write = 0;
        self.available = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(n: usize, start: f32) -> Vec<f32> {
        (0..n).map(|i| start + i as f32).collect()
    }

    #[test]
    fn write_then_read_round_trips_in_order() {
        let mut ring = AudioRing::with_capacity(16);
        assert_eq!(ring.write(&ramp(6, 1.0), false), 6);
        assert_eq!(ring.available(), 6);

        let mut out = [0.0; 6];
        assert_eq!(ring.read_into(&mut out), 6);
        assert_eq!(out, [1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        assert_eq!(ring.available(), 0);
    }

    #[test]
    fn indices_wrap_around_capacity() {
        let mut ring = AudioRing::with_capacity(8);
        let mut out = [0.0; 8];

        // Cycle more samples through than the capacity several times over.
        for round in 0..5 {
            let chunk = ramp(6, round as f32 * 10.0);
            assert_eq!(ring.write(&chunk, false), 6);
            assert_eq!(ring.read_into(&mut out[..6]), 6);
            assert_eq!(&out[..6], chunk.as_slice());
        }
        assert_eq!(ring.available(), 0);
    }

    #[test]
    fn vod_write_discards_excess_when_full() {
        let mut ring = AudioRing::with_capacity(8);
        assert_eq!(ring.write(&ramp(8, 1.0), false), 8);
        assert_eq!(ring.write(&ramp(4, 100.0), false), 0);
        assert_eq!(ring.available(), 8);

        // The original samples survive untouched.
        let mut out = [0.0; 8];
        ring.read_into(&mut out);
        assert_eq!(out[0], 1.0);
        assert_eq!(out[7], 8.0);
    }

    #[test]
    fn vod_partial_write_keeps_earliest_samples() {
        let mut ring = AudioRing::with_capacity(8);
        assert_eq!(ring.write(&ramp(5, 1.0), false), 5);
        assert_eq!(ring.write(&ramp(5, 100.0), false), 3);
        assert_eq!(ring.available(), 8);

        let mut out = [0.0; 8];
        ring.read_into(&mut out);
        assert_eq!(out, [1.0, 2.0, 3.0, 4.0, 5.0, 100.0, 101.0, 102.0]);
    }

    #[test]
    fn live_write_overwrites_oldest() {
        let mut ring = AudioRing::with_capacity(8);
        assert_eq!(ring.write(&ramp(8, 1.0), true), 8);
        assert_eq!(ring.write(&ramp(4, 100.0), true), 4);
        assert_eq!(ring.available(), 8);

        // The ring now holds the 4 newest of the old chunk then the new one.
        let mut out = [0.0; 8];
        ring.read_into(&mut out);
        assert_eq!(out, [5.0, 6.0, 7.0, 8.0, 100.0, 101.0, 102.0, 103.0]);
    }

    #[test]
    fn live_write_larger_than_capacity_keeps_newest_tail() {
        let mut ring = AudioRing::with_capacity(4);
        assert_eq!(ring.write(&ramp(10, 1.0), true), 4);

        let mut out = [0.0; 4];
        ring.read_into(&mut out);
        assert_eq!(out, [7.0, 8.0, 9.0, 10.0]);
    }

    #[test]
    fn short_reads_return_what_is_available() {
        let mut ring = AudioRing::with_capacity(8);
        ring.write(&ramp(3, 1.0), false);

        let mut out = [0.0; 8];
        assert_eq!(ring.read_into(&mut out), 3);
        assert_eq!(ring.read_into(&mut out), 0);
    }

    #[test]
    fn available_never_exceeds_capacity() {
        let mut ring = AudioRing::with_capacity(8);
        for i in 0..20 {
            ring.write(&ramp(7, i as f32), true);
            assert!(ring.available() <= ring.capacity());
        }
    }

    #[test]
    fn clear_resets_state() {
        let mut ring = AudioRing::with_capacity(8);
        ring.write(&ramp(5, 1.0), false);
        ring.clear();
        assert_eq!(ring.available(), 0);
        assert_eq!(ring.fill_fraction(), 0.0);

        let mut out = [0.0; 4];
        assert_eq!(ring.read_into(&mut out), 0);
    }

    #[test]
    fn fill_fraction_tracks_occupancy() {
        let mut ring = AudioRing::with_capacity(8);
        ring.write(&ramp(6, 1.0), false);
        assert!((ring.fill_fraction() - 0.75).abs() < 1e-12);
    }

    #[test]
    fn default_capacity_matches_config() {
        let ring = AudioRing::new();
        assert_eq!(ring.capacity(), config::AUDIO_RING_CAPACITY);
    }
}
