// SPDX-License-Identifier: MPL-2.0
//! The decode worker: demuxes packets, drives both decoders, converts
//! frames, and feeds the video queue and audio ring.
//!
//! The worker is the sole producer for both buffers. It runs while the
//! session is open for playback and returns the [`MediaSession`] when it
//! exits so the control side can mutate demuxer state (seek, rewind).
//!
//! Policies:
//! - VOD sources throttle when the video queue and audio ring are both
//!   nearly full, and block on a full queue; frames older than the clock by
//!   more than 500 ms are dropped for bounded catch-up.
//! - Live sources never throttle; both buffers overwrite their oldest data.
//! - Per-frame decode errors skip the frame. Demuxer errors other than EOF
//!   are fatal and surface through the Error state.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use ffmpeg_next as ffmpeg;

use crate::config;
use crate::error::PlayerError;
use crate::player::session::{timestamp_secs, AudioPipeline, MediaSession, VideoPipeline};
use crate::player::shared::Shared;
use crate::player::state::PlayerState;

/// Spawns the decode worker. The handle yields the session back on join.
pub(crate) fn spawn(
    session: Box<MediaSession>,
    shared: Arc<Shared>,
) -> std::io::Result<JoinHandle<Box<MediaSession>>> {
    thread::Builder::new()
        .name("reel-decode".to_string())
        .spawn(move || run(session, shared))
}

/// Scratch frames reused across the worker's lifetime.
///
/// The decoders unref these before each receive, and the converted video
/// frame keeps constant dimensions, so all three are safe to reuse.
/// Resampler output is allocated per frame because its sample count varies.
struct WorkFrames {
    decoded_video: ffmpeg::frame::Video,
    converted: ffmpeg::frame::Video,
    decoded_audio: ffmpeg::frame::Audio,
}

impl WorkFrames {
    fn new() -> Self {
        Self {
            decoded_video: ffmpeg::frame::Video::empty(),
            converted: ffmpeg::frame::Video::empty(),
            decoded_audio: ffmpeg::frame::Audio::empty(),
        }
    }
}

fn run(mut session: Box<MediaSession>, shared: Arc<Shared>) -> Box<MediaSession> {
    log::debug!("decode worker started");
    let mut frames = WorkFrames::new();

    loop {
        if shared.stop_requested() {
            break;
        }

        let (playing, looping) = {
            let st = shared.state.lock().unwrap();
            (st.state == PlayerState::Playing, st.loop_enabled)
        };
        if !playing {
            thread::sleep(config::IDLE_SLEEP);
            continue;
        }

        if should_throttle(&session, &shared) {
            thread::sleep(config::BACKPRESSURE_SLEEP);
            continue;
        }

        match session.read_packet() {
            Ok(Some(packet)) => {
                let is_live = session.is_live;
                if let Some(video) = session.video.as_mut() {
                    if packet.stream() == video.stream_index {
                        decode_video_packet(video, Some(&packet), is_live, &shared, &mut frames);
                        continue;
                    }
                }
                let anchor_from_audio = session.video.is_none();
                if let Some(audio) = session.audio.as_mut() {
                    if packet.stream() == audio.stream_index {
                        decode_audio_packet(
                            audio,
                            Some(&packet),
                            is_live,
                            anchor_from_audio,
                            &shared,
                            &mut frames,
                        );
                    }
                }
            }
            Ok(None) => {
                if looping && !session.is_live {
                    log::debug!("end of stream, looping");
                    session.rewind();
                    reset_after_wrap(&shared);
                    continue;
                }
                finish_playback(&mut session, &shared, &mut frames);
                break;
            }
            Err(e) => {
                shared
                    .state
                    .lock()
                    .unwrap()
                    .set_error(PlayerError::DecodeFailed(e.to_string()));
                break;
            }
        }
    }

    log::debug!("decode worker exited");
    session
}

/// VOD backpressure: hold off while the video queue is nearly full and the
/// audio ring is at least three-quarters occupied. A missing stream waives
/// its half of the condition. Live sources never back off.
fn should_throttle(session: &MediaSession, shared: &Shared) -> bool {
    if session.is_live {
        return false;
    }
    let queues = shared.queues.lock().unwrap();
    let video_pressed = match session.video {
        Some(_) => queues.frames.count() >= queues.frames.capacity() - 1,
        None => true,
    };
    let audio_pressed = match session.audio {
        Some(_) => queues.audio.fill_fraction() >= config::RING_THROTTLE_FRACTION,
        None => true,
    };
    video_pressed && audio_pressed
}

/// Sends one packet (or EOF when `packet` is `None`) to the video decoder
/// and drains every frame it produces into the queue.
fn decode_video_packet(
    video: &mut VideoPipeline,
    packet: Option<&ffmpeg::Packet>,
    is_live: bool,
    shared: &Shared,
    frames: &mut WorkFrames,
) {
    let sent = match packet {
        Some(packet) => video.decoder.send_packet(packet),
        None => video.decoder.send_eof(),
    };
    if let Err(e) = sent {
        log::debug!("video packet rejected: {}", e);
        return;
    }

    while video.decoder.receive_frame(&mut frames.decoded_video).is_ok() {
        let pts = timestamp_secs(
            frames.decoded_video.pts(),
            frames.decoded_video.timestamp(),
            video.time_base,
        );

        // Bounded catch-up: late frames are dropped at the source.
        if !is_live {
            let now = shared.state.lock().unwrap().playback_time();
            if pts < now - config::LATE_FRAME_DROP_SECS {
                continue;
            }
        }

        if let Err(e) = video.scaler.run(&frames.decoded_video, &mut frames.converted) {
            log::debug!("pixel conversion failed: {}", e);
            continue;
        }

        let callback = {
            let mut st = shared.state.lock().unwrap();
            if !st.first_frame_decoded {
                // The first frame of a segment defines where media time
                // meets the wall clock.
                st.first_frame_decoded = true;
                st.clock.anchor_at(pts);
            }
            st.video_callback.clone()
        };

        let width = frames.converted.width();
        let height = frames.converted.height();
        let stride = frames.converted.stride(0);
        let data = frames.converted.data(0);
        enqueue_frame(shared, width, height, pts, data, stride, is_live);

        if let Some(callback) = callback {
            callback(data, width, height, stride, pts);
        }
    }
}

/// Appends a converted frame to the queue. Live sources overwrite the
/// oldest entry; VOD blocks until a slot frees up, playback leaves the
/// Playing state, or a stop is requested.
fn enqueue_frame(
    shared: &Shared,
    width: u32,
    height: u32,
    pts: f64,
    data: &[u8],
    stride: usize,
    is_live: bool,
) {
    loop {
        {
            let mut queues = shared.queues.lock().unwrap();
            if is_live {
                queues.frames.push_overwrite(width, height, pts, data, stride);
                return;
            }
            if queues.frames.try_push(width, height, pts, data, stride) {
                return;
            }
        }
        if shared.stop_requested() {
            return;
        }
        if shared.state.lock().unwrap().state != PlayerState::Playing {
            return;
        }
        thread::sleep(config::BACKPRESSURE_SLEEP);
    }
}

/// Sends one packet (or EOF when `packet` is `None`) to the audio decoder,
/// resamples everything it produces, and writes into the ring.
fn decode_audio_packet(
    audio: &mut AudioPipeline,
    packet: Option<&ffmpeg::Packet>,
    is_live: bool,
    anchor_from_audio: bool,
    shared: &Shared,
    frames: &mut WorkFrames,
) {
    let sent = match packet {
        Some(packet) => audio.decoder.send_packet(packet),
        None => audio.decoder.send_eof(),
    };
    if let Err(e) = sent {
        log::debug!("audio packet rejected: {}", e);
        return;
    }

    while audio.decoder.receive_frame(&mut frames.decoded_audio).is_ok() {
        let pts = timestamp_secs(
            frames.decoded_audio.pts(),
            frames.decoded_audio.timestamp(),
            audio.time_base,
        );

        let mut resampled = ffmpeg::frame::Audio::empty();
        if let Err(e) = audio.resampler.run(&frames.decoded_audio, &mut resampled) {
            log::debug!("resampling failed: {}", e);
            continue;
        }

        let samples = interleaved_samples(&resampled);
        if samples.is_empty() {
            continue;
        }

        let callback = {
            let mut st = shared.state.lock().unwrap();
            st.audio_pts = pts;
            if anchor_from_audio && !st.first_frame_decoded {
                // With no video stream, the audio timeline anchors the clock.
                st.first_frame_decoded = true;
                st.clock.anchor_at(pts);
            }
            st.audio_callback.clone()
        };

        {
            let mut queues = shared.queues.lock().unwrap();
            queues.audio.write(&samples, is_live);
        }

        if let Some(callback) = callback {
            callback(&samples, samples.len(), config::OUTPUT_CHANNELS, pts);
        }
    }
}

/// Extracts interleaved f32 samples from a packed resampler output frame.
fn interleaved_samples(frame: &ffmpeg::frame::Audio) -> Vec<f32> {
    let total = frame.samples() * config::OUTPUT_CHANNELS as usize;
    let data = frame.data(0);

    let mut samples = Vec::with_capacity(total);
    for chunk in data.chunks_exact(4).take(total) {
        samples.push(f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]));
    }
    samples
}

/// Loop wrap: clear both buffers and restart the timeline at zero before
/// any frame of the new segment becomes visible.
fn reset_after_wrap(shared: &Shared) {
    let mut st = shared.state.lock().unwrap();
    st.reset_timeline(0.0);
    // State lock is held across the queue lock; ordering is state -> queue.
    shared.queues.lock().unwrap().clear();
}

/// Demuxer EOF on a non-looping source: flush both decoders, let the video
/// queue drain, then declare EndOfFile.
fn finish_playback(session: &mut MediaSession, shared: &Shared, frames: &mut WorkFrames) {
    let is_live = session.is_live;
    if let Some(video) = session.video.as_mut() {
        decode_video_packet(video, None, is_live, shared, frames);
    }
    let anchor_from_audio = session.video.is_none();
    if let Some(audio) = session.audio.as_mut() {
        decode_audio_packet(audio, None, is_live, anchor_from_audio, shared, frames);
    }

    if let Some(video) = session.video.as_ref() {
        let wait = Duration::from_secs_f64(video.frame_interval / 4.0)
            .max(config::BACKPRESSURE_SLEEP);
        loop {
            if shared.stop_requested() {
                return;
            }
            if shared.state.lock().unwrap().state != PlayerState::Playing {
                return;
            }
            if shared.queues.lock().unwrap().frames.count() == 0 {
                break;
            }
            thread::sleep(wait);
        }
    }

    let mut st = shared.state.lock().unwrap();
    if st.state == PlayerState::Playing {
        st.current_pts = st.video_pts.max(st.audio_pts);
        st.state = PlayerState::EndOfFile;
        log::info!("end of file at {:.3}s", st.current_pts);
    }
}
