// SPDX-License-Identifier: MPL-2.0
//! Integration tests for the playback engine.
//!
//! Tests that need real media use `tests/data/sample.mp4` (a short clip
//! with both video and audio) and skip silently when it is absent, so the
//! suite stays runnable on machines without fixtures.

use std::path::Path;
use std::time::{Duration, Instant};

use reel::{PixelFormat, Player, PlayerError, PlayerState};

const SAMPLE: &str = "tests/data/sample.mp4";

fn sample_available() -> bool {
    Path::new(SAMPLE).exists()
}

#[test]
fn idle_player_reports_defaults() {
    let mut player = Player::new();

    assert_eq!(player.state(), PlayerState::Idle);
    assert_eq!(player.position(), 0.0);
    assert_eq!(player.duration(), 0.0);
    assert!(!player.is_live());
    assert!(player.video_info().is_none());
    assert!(player.audio_info().is_none());
    assert!(player.video_frame().is_none());
    assert_eq!(player.update(0.016), 0);

    let mut samples = [0.0f32; 256];
    assert_eq!(player.read_audio(&mut samples), 0);
}

#[test]
fn open_failure_surfaces_code_and_error_state() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("missing.mp4");

    let mut player = Player::new();
    let result = player.open(missing.to_str().unwrap());

    match result {
        Err(PlayerError::OpenFailed(_)) => {}
        other => panic!("expected OpenFailed, got {:?}", other),
    }
    assert_eq!(player.state(), PlayerState::Error);
    assert_eq!(player.last_error().unwrap().code(), -2);

    // Playback controls stay rejected.
    assert_eq!(player.play(), Err(PlayerError::NotReady));
    assert_eq!(player.seek(2.0), Err(PlayerError::NotReady));
}

#[test]
fn open_rejects_non_media_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("noise.mp4");
    std::fs::write(&path, vec![0u8; 4096]).unwrap();

    let mut player = Player::new();
    assert!(player.open(path.to_str().unwrap()).is_err());
    assert_eq!(player.state(), PlayerState::Error);
}

#[test]
fn close_returns_player_to_idle_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("missing.mp4");

    let mut player = Player::new();
    let _ = player.open(missing.to_str().unwrap());
    player.close();

    assert_eq!(player.state(), PlayerState::Idle);
    assert_eq!(player.position(), 0.0);
    assert!(player.video_frame().is_none());

    // close is idempotent
    player.close();
    assert_eq!(player.state(), PlayerState::Idle);
}

#[test]
fn open_sample_reports_stream_info() {
    if !sample_available() {
        return;
    }

    let mut player = Player::new();
    player.open(SAMPLE).unwrap();

    assert_eq!(player.state(), PlayerState::Ready);
    assert!(!player.is_live());
    assert!(player.duration() > 0.0);

    let video = player.video_info().expect("sample has video");
    assert!(video.width > 0);
    assert!(video.height > 0);
    assert!(video.fps > 0.0);
    assert_eq!(video.pixel_format, PixelFormat::Rgba);
    assert!(!video.codec_name.is_empty());

    if let Some(audio) = player.audio_info() {
        assert!(audio.source_rate > 0);
        assert_eq!(audio.output_rate, 48_000);
        assert_eq!(audio.output_channels, 2);
    }
}

#[test]
fn reopening_yields_identical_info() {
    if !sample_available() {
        return;
    }

    let mut player = Player::new();
    player.open(SAMPLE).unwrap();
    let video = player.video_info().cloned();
    let audio = player.audio_info().cloned();
    player.close();

    player.open(SAMPLE).unwrap();
    assert_eq!(player.video_info().cloned(), video);
    assert_eq!(player.audio_info().cloned(), audio);
}

#[test]
fn playback_delivers_frames_and_reaches_end_of_file() {
    if !sample_available() {
        return;
    }

    let mut player = Player::new();
    player.open(SAMPLE).unwrap();
    let duration = player.duration();
    player.play().unwrap();

    let mut promoted = 0usize;
    let mut first_frame_checked = false;
    // Allow generous wall time: duration plus startup slack.
    let deadline = Instant::now() + Duration::from_secs_f64(duration + 10.0);

    loop {
        promoted += player.update(0.016);

        if let Some(frame) = player.video_frame() {
            if !first_frame_checked {
                assert_eq!(frame.stride, frame.width as usize * 4);
                assert_eq!(frame.data.len(), frame.stride * frame.height as usize);
                first_frame_checked = true;
            }
            assert!(frame.pts >= 0.0);
        }

        match player.state() {
            PlayerState::EndOfFile => break,
            PlayerState::Error => panic!("playback error: {:?}", player.last_error()),
            _ => {}
        }
        if Instant::now() > deadline {
            panic!("playback did not finish within the deadline");
        }
        std::thread::sleep(Duration::from_millis(16));
    }

    assert!(promoted > 0, "no frames were promoted");
    assert!(first_frame_checked, "no frame was handed out");
    // Position lands near the end of the clip.
    assert!(player.position() > duration - 0.5);
    assert!(player.position() <= duration + 0.001);
}

#[test]
fn pause_freezes_position() {
    if !sample_available() {
        return;
    }

    let mut player = Player::new();
    player.open(SAMPLE).unwrap();
    player.play().unwrap();

    // Let some media play.
    let start = Instant::now();
    while start.elapsed() < Duration::from_millis(400) {
        player.update(0.016);
        std::thread::sleep(Duration::from_millis(16));
    }

    player.pause();
    assert_eq!(player.state(), PlayerState::Paused);
    let frozen = player.position();
    std::thread::sleep(Duration::from_millis(200));
    assert_eq!(player.position(), frozen);

    // pause is idempotent
    player.pause();
    assert_eq!(player.position(), frozen);
}

#[test]
fn stop_rewinds_and_allows_replay() {
    if !sample_available() {
        return;
    }

    let mut player = Player::new();
    player.open(SAMPLE).unwrap();
    player.play().unwrap();
    std::thread::sleep(Duration::from_millis(200));

    player.stop();
    assert_eq!(player.state(), PlayerState::Stopped);
    assert_eq!(player.position(), 0.0);

    player.play().unwrap();
    assert_eq!(player.state(), PlayerState::Playing);
}

#[test]
fn seek_repositions_within_a_frame() {
    if !sample_available() {
        return;
    }

    let mut player = Player::new();
    player.open(SAMPLE).unwrap();
    let duration = player.duration();
    let target = (duration * 0.5).min(2.0);

    player.seek(target).unwrap();
    assert_eq!(player.state(), PlayerState::Ready);
    // Until the next frame is promoted, position reports the seek target.
    assert!((player.position() - target).abs() < 0.001);

    // Seeks past the end clamp to the duration.
    player.seek(duration + 100.0).unwrap();
    assert!(player.position() <= duration + 0.001);
}

#[test]
fn audio_backpressure_fills_the_ring() {
    if !sample_available() {
        return;
    }

    let mut player = Player::new();
    player.open(SAMPLE).unwrap();
    if player.audio_info().is_none() {
        return;
    }
    player.play().unwrap();

    // Never read audio; drive video normally for a while.
    let start = Instant::now();
    while start.elapsed() < Duration::from_secs(3) {
        player.update(0.016);
        if player.state() == PlayerState::EndOfFile {
            break;
        }
        std::thread::sleep(Duration::from_millis(16));
    }

    // The ring should have accumulated a healthy amount of audio, and a
    // read drains it in output format (interleaved stereo at 48 kHz).
    let mut samples = vec![0.0f32; 9600]; // 100 ms
    let got = player.read_audio(&mut samples);
    assert!(got > 0, "no audio was buffered");
}

#[test]
fn callbacks_fire_from_the_worker() {
    if !sample_available() {
        return;
    }

    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    let frames = Arc::new(AtomicUsize::new(0));
    let chunks = Arc::new(AtomicUsize::new(0));

    let mut player = Player::new();
    {
        let frames = Arc::clone(&frames);
        player.set_video_callback(move |data, w, h, stride, _pts| {
            assert!(stride >= w as usize * 4);
            assert!(data.len() >= stride * h as usize);
            frames.fetch_add(1, Ordering::Relaxed);
        });
    }
    {
        let chunks = Arc::clone(&chunks);
        player.set_audio_callback(move |samples, count, channels, _pts| {
            assert_eq!(channels, 2);
            assert_eq!(samples.len(), count);
            chunks.fetch_add(1, Ordering::Relaxed);
        });
    }

    player.open(SAMPLE).unwrap();
    let has_audio = player.audio_info().is_some();
    player.play().unwrap();

    let start = Instant::now();
    while start.elapsed() < Duration::from_secs(2) {
        player.update(0.016);
        if player.state() == PlayerState::EndOfFile {
            break;
        }
        std::thread::sleep(Duration::from_millis(16));
    }

    assert!(frames.load(Ordering::Relaxed) > 0);
    if has_audio {
        assert!(chunks.load(Ordering::Relaxed) > 0);
    }
}
