// SPDX-License-Identifier: MPL-2.0
//! The player facade: lifecycle control and the presentation scheduler.
//!
//! A [`Player`] owns one media session at a time. The decode worker runs on
//! its own thread while media is open for playback; the host drives
//! presentation by calling [`Player::update`] on its tick and pulling the
//! display frame with [`Player::video_frame`]. Audio is pulled from the
//! host's audio thread through an [`AudioReader`].
//!
//! Control methods take `&mut self` and belong on the host's presentation
//! thread; [`AudioReader`] is the only handle meant to cross threads.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::config;
use crate::error::{PlayerError, Result};
use crate::player::frame_queue::DisplayFrame;
use crate::player::params::{PixelFormat, PlaybackSpeed, Volume};
use crate::player::session::{AudioInfo, MediaSession, VideoInfo};
use crate::player::shared::{AudioCallback, Shared, VideoCallback};
use crate::player::state::PlayerState;
use crate::player::worker;

/// Borrowed view of the current display frame.
///
/// Valid until the next call to `update`, `seek`, or `close`; the borrow
/// checker enforces this because all of those take `&mut Player`.
#[derive(Debug)]
pub struct VideoFrame<'a> {
    /// Tightly packed pixel data (`stride == width * 4`).
    pub data: &'a [u8],
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Row stride in bytes.
    pub stride: usize,
    /// Presentation timestamp in seconds.
    pub pts: f64,
}

/// Cloneable handle for draining decoded audio from the host audio thread.
///
/// Reads never block beyond a brief queue-lock acquisition. Short reads are
/// normal; the host zero-fills the remainder and applies volume while
/// mixing.
#[derive(Clone)]
pub struct AudioReader {
    shared: Arc<Shared>,
}

impl AudioReader {
    /// Copies up to `dst.len()` interleaved samples, returning the count.
    pub fn read(&self, dst: &mut [f32]) -> usize {
        self.shared.queues.lock().unwrap().audio.read_into(dst)
    }
}

/// Either the parked session or the handle of the running worker.
enum Worker {
    Parked(Box<MediaSession>),
    Running(JoinHandle<Box<MediaSession>>),
    /// The worker missed the join deadline and was abandoned; see
    /// [`Player::join_worker`].
    Detached,
}

/// Metadata and worker bookkeeping for the currently open source.
struct ActiveSession {
    video: Option<VideoInfo>,
    audio: Option<AudioInfo>,
    duration: f64,
    is_live: bool,
    worker: Worker,
}

/// Media player decoding one source into pull-based video and audio streams.
pub struct Player {
    shared: Arc<Shared>,
    session: Option<ActiveSession>,
    display: DisplayFrame,
    pixel_format: PixelFormat,
    hw_accel_hint: bool,
}

impl Player {
    /// Creates an idle player.
    #[must_use]
    pub fn new() -> Self {
        Self {
            shared: Shared::new(),
            session: None,
            display: DisplayFrame::new(),
            pixel_format: PixelFormat::default(),
            hw_accel_hint: false,
        }
    }

    // ======================================================================
    // Lifecycle
    // ======================================================================

    /// Opens a local file, direct HTTP URL, or live stream URL.
    pub fn open(&mut self, url: &str) -> Result<()> {
        self.open_with_options(url, &[])
    }

    /// Opens a source with extra demuxer options as `key=value` pairs.
    ///
    /// Any previously open media is closed first. On failure the player is
    /// left in the Error state with the failure recorded as the last error.
    pub fn open_with_options(&mut self, url: &str, options: &[(&str, &str)]) -> Result<()> {
        self.close();

        self.shared.state.lock().unwrap().state = PlayerState::Opening;
        log::info!("opening {}", url);

        match MediaSession::open(url, options, self.pixel_format) {
            Ok((session, info)) => {
                if let Some(video) = &info.video {
                    log::info!(
                        "video: {}x{} {:.2} fps, codec {}",
                        video.width,
                        video.height,
                        video.fps,
                        video.codec_name
                    );
                }
                if let Some(audio) = &info.audio {
                    log::info!(
                        "audio: {} Hz, {} ch, codec {}",
                        audio.source_rate,
                        audio.source_channels,
                        audio.codec_name
                    );
                }
                {
                    let mut st = self.shared.state.lock().unwrap();
                    st.reset_timeline(0.0);
                    st.last_error = None;
                    st.state = PlayerState::Ready;
                }
                self.session = Some(ActiveSession {
                    video: info.video,
                    audio: info.audio,
                    duration: info.duration,
                    is_live: info.is_live,
                    worker: Worker::Parked(Box::new(session)),
                });
                Ok(())
            }
            Err(e) => {
                self.shared.state.lock().unwrap().set_error(e.clone());
                Err(e)
            }
        }
    }

    /// Closes the current media, releasing every decode resource.
    ///
    /// Safe from any state and idempotent. Playback parameters (loop,
    /// speed, volume) and callbacks survive; the last error does too, so a
    /// failed open can still be inspected afterwards.
    pub fn close(&mut self) {
        if let Some(active) = self.session.take() {
            let session = self.join_worker(active.worker);
            drop(session);
            log::info!("closed");
        }

        {
            let mut st = self.shared.state.lock().unwrap();
            st.state = PlayerState::Idle;
            st.reset_timeline(0.0);
        }
        self.shared.queues.lock().unwrap().clear();
        self.display.reset();
    }

    /// Starts or resumes playback.
    ///
    /// Accepted from Ready, Paused, and Stopped; rejected with `NotReady`
    /// elsewhere. The clock re-anchors at the current position.
    pub fn play(&mut self) -> Result<()> {
        if self.session.is_none() {
            return Err(PlayerError::NotReady);
        }

        {
            let mut st = self.shared.state.lock().unwrap();
            if !st.state.accepts_play() {
                return Err(PlayerError::NotReady);
            }
            let resume_at = st.current_pts;
            st.clock.anchor_at(resume_at);
            st.state = PlayerState::Playing;
        }

        if let Err(e) = self.ensure_worker_running() {
            self.shared.state.lock().unwrap().set_error(e.clone());
            return Err(e);
        }
        log::info!("playback started");
        Ok(())
    }

    /// Pauses playback, freezing the position. Idempotent.
    pub fn pause(&mut self) {
        let mut st = self.shared.state.lock().unwrap();
        if st.state == PlayerState::Playing {
            let mut position = st.clock.time(st.speed.value());
            if let Some(active) = &self.session {
                if !active.is_live && active.duration > 0.0 {
                    position = position.clamp(0.0, active.duration);
                }
            }
            st.current_pts = position;
            st.state = PlayerState::Paused;
        }
    }

    /// Stops playback and rewinds to the beginning.
    ///
    /// Unlike `pause`, the worker is parked and the source repositioned, so
    /// a following `play` starts over. This is also the replay path after
    /// EndOfFile.
    pub fn stop(&mut self) {
        let Some(active) = self.session.as_mut() else {
            return;
        };
        if !self.shared.state.lock().unwrap().state.accepts_stop() {
            return;
        }

        let worker = std::mem::replace(&mut active.worker, Worker::Detached);
        let worker = match self.join_worker(worker) {
            Some(mut session) => {
                session.rewind();
                Worker::Parked(session)
            }
            None => Worker::Detached,
        };
        if let Some(active) = self.session.as_mut() {
            active.worker = worker;
        }

        {
            let mut st = self.shared.state.lock().unwrap();
            st.reset_timeline(0.0);
            st.state = PlayerState::Stopped;
        }
        self.shared.queues.lock().unwrap().clear();
        self.display.reset();
        log::info!("playback stopped");
    }

    /// Seeks to `seconds`, clamped to the media duration.
    ///
    /// Rejected with `SeekFailed` on live sources (no side effects) and
    /// with `NotReady` outside Ready/Playing/Paused/Stopped. The worker is
    /// parked across the seek and restarted only if it was playing.
    pub fn seek(&mut self, seconds: f64) -> Result<()> {
        let Some(active) = self.session.as_mut() else {
            return Err(PlayerError::NotReady);
        };
        if active.is_live {
            return Err(PlayerError::SeekFailed);
        }

        let was_playing = {
            let st = self.shared.state.lock().unwrap();
            if !st.state.accepts_seek() {
                return Err(PlayerError::NotReady);
            }
            st.state == PlayerState::Playing
        };

        let target = if active.duration > 0.0 {
            seconds.clamp(0.0, active.duration)
        } else {
            seconds.max(0.0)
        };

        let worker = std::mem::replace(&mut active.worker, Worker::Detached);
        let Some(mut session) = self.join_worker(worker) else {
            return Err(PlayerError::SeekFailed);
        };

        let result = session.seek_to(target);
        // The session goes back regardless; a failed seek leaves position
        // untouched.
        let restart = result.is_ok() && was_playing;
        if result.is_ok() {
            {
                let mut st = self.shared.state.lock().unwrap();
                st.reset_timeline(target);
            }
            self.shared.queues.lock().unwrap().clear();
        }

        let worker = if restart {
            match worker::spawn(session, Arc::clone(&self.shared)) {
                Ok(handle) => Worker::Running(handle),
                Err(_) => return Err(PlayerError::OutOfMemory),
            }
        } else {
            Worker::Parked(session)
        };
        if let Some(active) = self.session.as_mut() {
            active.worker = worker;
        }

        result.map(|_| log::debug!("seek to {:.3}s", target))
    }

    // ======================================================================
    // Presentation
    // ======================================================================

    /// Advances presentation by one host tick.
    ///
    /// Never blocks beyond brief lock acquisitions. Returns the number of
    /// frames promoted to the display (0 or 1). VOD promotes the oldest
    /// frame once its PTS is due; live drains the queue to the newest frame
    /// unconditionally.
    pub fn update(&mut self, _dt: f64) -> usize {
        let Some(active) = &self.session else {
            return 0;
        };

        let mut st = self.shared.state.lock().unwrap();
        if st.state != PlayerState::Playing {
            return 0;
        }
        let now = st.clock.time(st.speed.value());

        // State lock is held across the queue lock; ordering is state -> queue.
        let mut queues = self.shared.queues.lock().unwrap();
        let promoted = if active.is_live {
            queues.frames.drain_to_newest()
        } else {
            match queues.frames.peek_oldest_pts() {
                Some(pts) if pts - now <= config::FRAME_DUE_TOLERANCE_SECS => {
                    queues.frames.take_oldest()
                }
                _ => None,
            }
        };

        match promoted {
            Some(slot) => {
                self.display.copy_from(slot);
                let pts = slot.pts();
                drop(queues);
                st.video_pts = pts;
                st.current_pts = pts;
                1
            }
            None => 0,
        }
    }

    /// Returns the display frame if one was promoted since the last call.
    ///
    /// The ready flag is consumed, so each promoted frame is handed out at
    /// most once.
    pub fn video_frame(&mut self) -> Option<VideoFrame<'_>> {
        if !self.display.take_ready() {
            return None;
        }
        Some(VideoFrame {
            data: self.display.data(),
            width: self.display.width(),
            height: self.display.height(),
            stride: self.display.stride(),
            pts: self.display.pts(),
        })
    }

    /// Copies up to `dst.len()` interleaved stereo samples, returning the
    /// count. Volume is not applied; see [`Player::volume`].
    pub fn read_audio(&self, dst: &mut [f32]) -> usize {
        self.shared.queues.lock().unwrap().audio.read_into(dst)
    }

    /// Returns a handle for draining audio from another thread.
    #[must_use]
    pub fn audio_reader(&self) -> AudioReader {
        AudioReader {
            shared: Arc::clone(&self.shared),
        }
    }

    // ======================================================================
    // State and info
    // ======================================================================

    /// Current lifecycle state.
    pub fn state(&self) -> PlayerState {
        self.shared.state.lock().unwrap().state
    }

    /// The most recent error, if any.
    pub fn last_error(&self) -> Option<PlayerError> {
        self.shared.state.lock().unwrap().last_error.clone()
    }

    /// Video stream properties, if the open media has video.
    pub fn video_info(&self) -> Option<&VideoInfo> {
        self.session.as_ref().and_then(|s| s.video.as_ref())
    }

    /// Audio stream properties, if the open media has audio.
    pub fn audio_info(&self) -> Option<&AudioInfo> {
        self.session.as_ref().and_then(|s| s.audio.as_ref())
    }

    /// Current playback position in seconds.
    pub fn position(&self) -> f64 {
        let position = self.shared.state.lock().unwrap().playback_time();
        match &self.session {
            Some(active) if !active.is_live && active.duration > 0.0 => {
                position.clamp(0.0, active.duration)
            }
            _ => position.max(0.0),
        }
    }

    /// Total duration in seconds, 0 for live sources and when closed.
    pub fn duration(&self) -> f64 {
        self.session.as_ref().map_or(0.0, |s| s.duration)
    }

    /// True when the open source has no known duration.
    pub fn is_live(&self) -> bool {
        self.session.as_ref().is_some_and(|s| s.is_live)
    }

    // ======================================================================
    // Parameters
    // ======================================================================

    /// Enables or disables looping for non-live sources.
    pub fn set_loop(&self, enabled: bool) {
        self.shared.state.lock().unwrap().loop_enabled = enabled;
    }

    /// Returns whether looping is enabled.
    pub fn is_loop_enabled(&self) -> bool {
        self.shared.state.lock().unwrap().loop_enabled
    }

    /// Sets the playback speed, clamped to 0.25–4.0.
    ///
    /// Takes effect immediately; while playing, the clock re-anchors so the
    /// position stays continuous across the change.
    pub fn set_speed(&self, speed: f64) {
        let mut st = self.shared.state.lock().unwrap();
        if st.state == PlayerState::Playing {
            let now = st.clock.time(st.speed.value());
            st.clock.anchor_at(now);
        }
        st.speed = PlaybackSpeed::new(speed);
    }

    /// Current playback speed.
    pub fn speed(&self) -> f64 {
        self.shared.state.lock().unwrap().speed.value()
    }

    /// Stores the volume, clamped to 0.0–1.0.
    ///
    /// The engine never applies volume to decoded samples; hosts read this
    /// value and apply it when mixing.
    pub fn set_volume(&self, volume: f32) {
        self.shared.state.lock().unwrap().volume = Volume::new(volume);
    }

    /// Current volume.
    pub fn volume(&self) -> f32 {
        self.shared.state.lock().unwrap().volume.value()
    }

    /// Selects the output pixel format. Applies at the next `open`.
    pub fn set_pixel_format(&mut self, format: PixelFormat) {
        self.pixel_format = format;
    }

    /// The output pixel format used for new sessions.
    pub fn pixel_format(&self) -> PixelFormat {
        self.pixel_format
    }

    /// Stores the hardware acceleration preference.
    ///
    /// Accepted for API compatibility; decoding is currently always done in
    /// software.
    pub fn set_hw_accel_hint(&mut self, enabled: bool) {
        self.hw_accel_hint = enabled;
    }

    /// The stored hardware acceleration preference.
    pub fn hw_accel_hint(&self) -> bool {
        self.hw_accel_hint
    }

    // ======================================================================
    // Callbacks
    // ======================================================================

    /// Installs a callback invoked from the decode worker for every
    /// converted video frame. Must not block.
    pub fn set_video_callback<F>(&self, callback: F)
    where
        F: Fn(&[u8], u32, u32, usize, f64) + Send + Sync + 'static,
    {
        let callback: VideoCallback = Arc::new(callback);
        self.shared.state.lock().unwrap().video_callback = Some(callback);
    }

    /// Removes the video callback.
    pub fn clear_video_callback(&self) {
        self.shared.state.lock().unwrap().video_callback = None;
    }

    /// Installs a callback invoked from the decode worker for every
    /// resampled audio chunk. Must not block.
    pub fn set_audio_callback<F>(&self, callback: F)
    where
        F: Fn(&[f32], usize, u16, f64) + Send + Sync + 'static,
    {
        let callback: AudioCallback = Arc::new(callback);
        self.shared.state.lock().unwrap().audio_callback = Some(callback);
    }

    /// Removes the audio callback.
    pub fn clear_audio_callback(&self) {
        self.shared.state.lock().unwrap().audio_callback = None;
    }

    // ======================================================================
    // Worker management
    // ======================================================================

    /// Spawns the decode worker if it is not already running.
    fn ensure_worker_running(&mut self) -> Result<()> {
        let Some(active) = self.session.as_mut() else {
            return Err(PlayerError::NotReady);
        };

        // A finished handle means the worker exited on its own (EOF or
        // error); reclaim the session so it can be relaunched.
        if let Worker::Running(handle) = &active.worker {
            if handle.is_finished() {
                let worker = std::mem::replace(&mut active.worker, Worker::Detached);
                if let Worker::Running(handle) = worker {
                    if let Ok(session) = handle.join() {
                        active.worker = Worker::Parked(session);
                    }
                }
            }
        }

        match std::mem::replace(&mut active.worker, Worker::Detached) {
            Worker::Parked(session) => {
                self.shared.clear_stop();
                match worker::spawn(session, Arc::clone(&self.shared)) {
                    Ok(handle) => {
                        active.worker = Worker::Running(handle);
                        Ok(())
                    }
                    Err(e) => {
                        log::warn!("failed to spawn decode worker: {}", e);
                        Err(PlayerError::OutOfMemory)
                    }
                }
            }
            running @ Worker::Running(_) => {
                active.worker = running;
                Ok(())
            }
            Worker::Detached => Err(PlayerError::InvalidPlayer),
        }
    }

    /// Requests a stop and joins the worker within the safety timeout.
    ///
    /// Returns the reclaimed session, or `None` when the worker is stuck in
    /// a blocking demuxer read past the deadline. In that case the handle
    /// is abandoned with the stop flag left set so the thread exits once
    /// the read returns.
    fn join_worker(&mut self, worker: Worker) -> Option<Box<MediaSession>> {
        match worker {
            Worker::Parked(session) => Some(session),
            Worker::Detached => None,
            Worker::Running(handle) => {
                self.shared.request_stop();
                let deadline = Instant::now() + config::WORKER_JOIN_TIMEOUT;
                while !handle.is_finished() && Instant::now() < deadline {
                    thread::sleep(Duration::from_millis(1));
                }
                if !handle.is_finished() {
                    log::warn!("decode worker unresponsive, abandoning its thread");
                    self.replace_shared_after_detach();
                    return None;
                }
                let session = handle.join().ok();
                self.shared.clear_stop();
                session
            }
        }
    }

    /// Swaps in fresh shared state after abandoning an unresponsive worker.
    ///
    /// The stray thread keeps the old allocation, whose stop flag stays
    /// set, so it exits once its blocking read returns and can never write
    /// into a later session's buffers. Parameters and callbacks carry over.
    fn replace_shared_after_detach(&mut self) {
        let fresh = Shared::new();
        {
            let old = self.shared.state.lock().unwrap();
            let mut new_state = fresh.state.lock().unwrap();
            new_state.speed = old.speed;
            new_state.volume = old.volume;
            new_state.loop_enabled = old.loop_enabled;
            new_state.video_callback = old.video_callback.clone();
            new_state.audio_callback = old.audio_callback.clone();
            new_state.last_error = old.last_error.clone();
        }
        self.shared = fresh;
    }
}

impl Default for Player {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Player {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_player_is_idle_with_defaults() {
        let player = Player::new();
        assert_eq!(player.state(), PlayerState::Idle);
        assert_eq!(player.position(), 0.0);
        assert_eq!(player.duration(), 0.0);
        assert!(!player.is_live());
        assert!(player.video_info().is_none());
        assert!(player.audio_info().is_none());
        assert!(player.last_error().is_none());
        assert_eq!(player.speed(), 1.0);
        assert_eq!(player.volume(), 1.0);
        assert!(!player.is_loop_enabled());
    }

    #[test]
    fn control_operations_require_open_media() {
        let mut player = Player::new();
        assert_eq!(player.play(), Err(PlayerError::NotReady));
        assert_eq!(player.seek(1.0), Err(PlayerError::NotReady));
        player.pause();
        player.stop();
        assert_eq!(player.state(), PlayerState::Idle);
    }

    #[test]
    fn update_and_frame_access_are_empty_when_idle() {
        let mut player = Player::new();
        assert_eq!(player.update(0.016), 0);
        assert!(player.video_frame().is_none());

        let mut buf = [0.0f32; 64];
        assert_eq!(player.read_audio(&mut buf), 0);
        assert_eq!(player.audio_reader().read(&mut buf), 0);
    }

    #[test]
    fn parameters_clamp_and_survive_close() {
        let mut player = Player::new();
        player.set_speed(99.0);
        player.set_volume(-3.0);
        player.set_loop(true);

        assert_eq!(player.speed(), config::MAX_SPEED);
        assert_eq!(player.volume(), config::MIN_VOLUME);
        assert!(player.is_loop_enabled());

        player.close();
        assert_eq!(player.speed(), config::MAX_SPEED);
        assert!(player.is_loop_enabled());
    }

    #[test]
    fn pixel_format_and_hw_hint_are_stored() {
        let mut player = Player::new();
        assert_eq!(player.pixel_format(), PixelFormat::Rgba);
        player.set_pixel_format(PixelFormat::Bgra);
        assert_eq!(player.pixel_format(), PixelFormat::Bgra);

        assert!(!player.hw_accel_hint());
        player.set_hw_accel_hint(true);
        assert!(player.hw_accel_hint());
    }

    #[test]
    fn open_failure_sets_error_state_and_last_error() {
        let mut player = Player::new();
        let result = player.open("/definitely/not/a/real/file.mp4");

        assert!(matches!(result, Err(PlayerError::OpenFailed(_))));
        assert_eq!(player.state(), PlayerState::Error);
        let err = player.last_error().unwrap();
        assert_eq!(err.code(), -2);
    }

    #[test]
    fn close_is_idempotent_and_returns_to_idle() {
        let mut player = Player::new();
        let _ = player.open("/definitely/not/a/real/file.mp4");
        player.close();
        assert_eq!(player.state(), PlayerState::Idle);
        assert_eq!(player.position(), 0.0);
        assert!(player.video_frame().is_none());

        player.close();
        assert_eq!(player.state(), PlayerState::Idle);
    }

    #[test]
    fn callbacks_can_be_set_and_cleared_without_media() {
        let player = Player::new();
        player.set_video_callback(|_, _, _, _, _| {});
        player.set_audio_callback(|_, _, _, _| {});
        player.clear_video_callback();
        player.clear_audio_callback();
    }
}
