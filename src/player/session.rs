// SPDX-License-Identifier: MPL-2.0
//! Media session: the FFmpeg demuxer, decoders, and conversion contexts.
//!
//! A [`MediaSession`] is created by `open`, moved into the decode worker
//! while playing, and handed back when the worker is joined so that `seek`
//! and `stop` can mutate demuxer state directly. All contexts are freed
//! when the session drops on `close`.

use std::sync::Once;

use ffmpeg_next as ffmpeg;

use crate::config;
use crate::error::{PlayerError, Result};
use crate::player::params::PixelFormat;

static FFMPEG_INIT: Once = Once::new();

/// Initializes FFmpeg once per process, quieting its native log output.
fn init_ffmpeg() -> Result<()> {
    let mut init_result: Result<()> = Ok(());

    FFMPEG_INIT.call_once(|| {
        if let Err(e) = ffmpeg::init() {
            init_result = Err(PlayerError::OpenFailed(format!(
                "FFmpeg initialization failed: {e}"
            )));
            return;
        }

        // Set log level to ERROR to suppress warning messages
        // SAFETY: av_log_set_level is thread-safe and only affects logging
        unsafe {
            ffmpeg::ffi::av_log_set_level(ffmpeg::ffi::AV_LOG_ERROR);
        }
    });

    init_result
}

/// Properties of the opened video stream.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoInfo {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Average frame rate.
    pub fps: f64,
    /// Duration in seconds, 0 for live sources.
    pub duration: f64,
    /// Container-reported frame count, 0 when unknown.
    pub total_frames: i64,
    /// Output pixel format frames are converted to.
    pub pixel_format: PixelFormat,
    /// True when the source has no known duration.
    pub is_live: bool,
    /// Decoder name, e.g. "h264".
    pub codec_name: String,
}

/// Properties of the opened audio stream.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioInfo {
    /// Source sample rate in Hz.
    pub source_rate: u32,
    /// Source channel count.
    pub source_channels: u16,
    /// Output sample rate (always 48000).
    pub output_rate: u32,
    /// Output channel count (always 2).
    pub output_channels: u16,
    /// Decoder name, e.g. "aac".
    pub codec_name: String,
}

/// Stream metadata captured at open time.
pub(crate) struct SessionInfo {
    pub video: Option<VideoInfo>,
    pub audio: Option<AudioInfo>,
    pub duration: f64,
    pub is_live: bool,
}

/// Video decode half: decoder plus pixel converter.
pub(crate) struct VideoPipeline {
    pub stream_index: usize,
    pub decoder: ffmpeg::decoder::Video,
    pub scaler: ffmpeg::software::scaling::Context,
    pub time_base: f64,
    pub frame_interval: f64,
}

/// Audio decode half: decoder plus resampler to f32 stereo 48 kHz.
pub(crate) struct AudioPipeline {
    pub stream_index: usize,
    pub decoder: ffmpeg::decoder::Audio,
    pub resampler: ffmpeg::software::resampling::Context,
    pub time_base: f64,
}

/// The demuxer and both decode pipelines for one opened source.
pub(crate) struct MediaSession {
    pub input: ffmpeg::format::context::Input,
    pub video: Option<VideoPipeline>,
    pub audio: Option<AudioPipeline>,
    pub is_live: bool,
}

// SAFETY: MediaSession contains FFmpeg types with internal raw pointers.
// These are safe to send between threads because:
// 1. FFmpeg's contexts are thread-safe for single-threaded access per instance
// 2. We maintain exclusive access through Rust's ownership model
// 3. The session is only used from one thread at a time (move semantics)
unsafe impl Send for MediaSession {}

impl MediaSession {
    /// Opens a source and builds both decode pipelines.
    ///
    /// Default demuxer options enable streamed reconnect with a 5 s maximum
    /// backoff; HLS URLs additionally get a protocol whitelist. Custom
    /// `key=value` options are merged over the defaults.
    pub fn open(
        url: &str,
        options: &[(&str, &str)],
        pixel_format: PixelFormat,
    ) -> Result<(Self, SessionInfo)> {
        init_ffmpeg()?;

        let mut demux_options = ffmpeg::Dictionary::new();
        demux_options.set("reconnect", "1");
        demux_options.set("reconnect_streamed", "1");
        demux_options.set("reconnect_delay_max", "5");
        if url.contains("m3u8") {
            demux_options.set("protocol_whitelist", "file,http,https,tcp,tls,crypto");
        }
        for (key, value) in options {
            demux_options.set(key, value);
        }

        let input = ffmpeg::format::input_with_dictionary(&url, demux_options)
            .map_err(|e| PlayerError::OpenFailed(e.to_string()))?;

        // A source without a known duration is treated as live.
        let raw_duration = input.duration();
        let is_live = raw_duration <= 0;
        let duration = if is_live {
            0.0
        } else {
            raw_duration as f64 / f64::from(ffmpeg::ffi::AV_TIME_BASE)
        };

        // The first video stream and the first audio stream are used.
        let mut video_index = None;
        let mut audio_index = None;
        for stream in input.streams() {
            match stream.parameters().medium() {
                ffmpeg::media::Type::Video if video_index.is_none() => {
                    video_index = Some(stream.index());
                }
                ffmpeg::media::Type::Audio if audio_index.is_none() => {
                    audio_index = Some(stream.index());
                }
                _ => {}
            }
        }

        if video_index.is_none() && audio_index.is_none() {
            return Err(PlayerError::NoVideoStream);
        }

        let mut video = None;
        let mut video_info = None;
        if let Some(index) = video_index {
            let (pipeline, info) =
                Self::open_video(&input, index, pixel_format, duration, is_live)?;
            video = Some(pipeline);
            video_info = Some(info);
        }

        // A broken audio stream downgrades to video-only playback.
        let mut audio = None;
        let mut audio_info = None;
        if let Some(index) = audio_index {
            match Self::open_audio(&input, index) {
                Ok((pipeline, info)) => {
                    audio = Some(pipeline);
                    audio_info = Some(info);
                }
                Err(e) if video.is_some() => {
                    log::warn!("audio stream unavailable, continuing without audio: {}", e);
                }
                Err(e) => return Err(e),
            }
        }

        let session = MediaSession {
            input,
            video,
            audio,
            is_live,
        };
        let info = SessionInfo {
            video: video_info,
            audio: audio_info,
            duration,
            is_live,
        };
        Ok((session, info))
    }

    fn open_video(
        input: &ffmpeg::format::context::Input,
        index: usize,
        pixel_format: PixelFormat,
        duration: f64,
        is_live: bool,
    ) -> Result<(VideoPipeline, VideoInfo)> {
        let stream = input
            .streams()
            .find(|s| s.index() == index)
            .ok_or(PlayerError::NoVideoStream)?;

        let codec_id = stream.parameters().id();
        if ffmpeg::decoder::find(codec_id).is_none() {
            return Err(PlayerError::CodecNotFound(format!("{:?}", codec_id)));
        }

        let context = ffmpeg::codec::context::Context::from_parameters(stream.parameters())
            .map_err(|e| PlayerError::CodecOpenFailed(e.to_string()))?;
        let decoder = context
            .decoder()
            .video()
            .map_err(|e| PlayerError::CodecOpenFailed(e.to_string()))?;

        let width = decoder.width();
        let height = decoder.height();
        if width == 0 || height == 0 {
            return Err(PlayerError::CodecOpenFailed(format!(
                "invalid video dimensions {width}x{height}"
            )));
        }

        let rate = stream.avg_frame_rate();
        let fps = if rate.denominator() != 0 {
            f64::from(rate.numerator()) / f64::from(rate.denominator())
        } else {
            0.0
        };
        let frame_interval = if fps > 1.0 {
            1.0 / fps
        } else {
            config::FALLBACK_FRAME_INTERVAL_SECS
        };

        let time_base = stream.time_base();
        let time_base = f64::from(time_base.numerator()) / f64::from(time_base.denominator());

        let destination = match pixel_format {
            PixelFormat::Rgba => ffmpeg::format::Pixel::RGBA,
            PixelFormat::Bgra => ffmpeg::format::Pixel::BGRA,
        };
        let scaler = ffmpeg::software::scaling::Context::get(
            decoder.format(),
            width,
            height,
            destination,
            width,
            height,
            ffmpeg::software::scaling::Flags::BILINEAR,
        )
        .map_err(|e| PlayerError::OpenFailed(format!("failed to create scaler: {e}")))?;

        let codec_name = decoder
            .codec()
            .map_or_else(|| "unknown".to_string(), |c| c.name().to_string());

        let info = VideoInfo {
            width,
            height,
            fps,
            duration,
            total_frames: stream.frames().max(0),
            pixel_format,
            is_live,
            codec_name,
        };
        let pipeline = VideoPipeline {
            stream_index: index,
            decoder,
            scaler,
            time_base,
            frame_interval,
        };
        Ok((pipeline, info))
    }

    fn open_audio(
        input: &ffmpeg::format::context::Input,
        index: usize,
    ) -> Result<(AudioPipeline, AudioInfo)> {
        let stream = input
            .streams()
            .find(|s| s.index() == index)
            .ok_or(PlayerError::NoAudioStream)?;

        let codec_id = stream.parameters().id();
        if ffmpeg::decoder::find(codec_id).is_none() {
            return Err(PlayerError::CodecNotFound(format!("{:?}", codec_id)));
        }

        let context = ffmpeg::codec::context::Context::from_parameters(stream.parameters())
            .map_err(|e| PlayerError::CodecOpenFailed(e.to_string()))?;
        let decoder = context
            .decoder()
            .audio()
            .map_err(|e| PlayerError::CodecOpenFailed(e.to_string()))?;

        let time_base = stream.time_base();
        let time_base = f64::from(time_base.numerator()) / f64::from(time_base.denominator());

        // Everything converges on interleaved f32 stereo at the output rate.
        let resampler = ffmpeg::software::resampling::Context::get(
            decoder.format(),
            decoder.channel_layout(),
            decoder.rate(),
            ffmpeg::format::Sample::F32(ffmpeg::format::sample::Type::Packed),
            ffmpeg::ChannelLayout::STEREO,
            config::OUTPUT_SAMPLE_RATE,
        )
        .map_err(|e| PlayerError::CodecOpenFailed(format!("failed to create resampler: {e}")))?;

        let codec_name = decoder
            .codec()
            .map_or_else(|| "unknown".to_string(), |c| c.name().to_string());

        let info = AudioInfo {
            source_rate: decoder.rate(),
            source_channels: decoder.channels(),
            output_rate: config::OUTPUT_SAMPLE_RATE,
            output_channels: config::OUTPUT_CHANNELS,
            codec_name,
        };
        let pipeline = AudioPipeline {
            stream_index: index,
            decoder,
            resampler,
            time_base,
        };
        Ok((pipeline, info))
    }

    /// Reads the next compressed packet.
    ///
    /// Returns `Ok(None)` at end of stream; other demuxer errors are fatal
    /// and bubble up to the worker.
    pub fn read_packet(&mut self) -> std::result::Result<Option<ffmpeg::Packet>, ffmpeg::Error> {
        let mut packet = ffmpeg::Packet::empty();
        match packet.read(&mut self.input) {
            Ok(()) => Ok(Some(packet)),
            Err(ffmpeg::Error::Eof) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Seeks the demuxer to `seconds` and flushes both decoders.
    pub fn seek_to(&mut self, seconds: f64) -> Result<()> {
        let timestamp = (seconds * f64::from(ffmpeg::ffi::AV_TIME_BASE)) as i64;
        self.input
            .seek(timestamp, ..timestamp)
            .map_err(|_| PlayerError::SeekFailed)?;
        self.flush();
        Ok(())
    }

    /// Rewinds to the beginning; used by stop and loop wrap.
    pub fn rewind(&mut self) {
        if let Err(e) = self.input.seek(0, ..0) {
            log::warn!("rewind seek failed: {}", e);
        }
        self.flush();
    }

    fn flush(&mut self) {
        if let Some(video) = &mut self.video {
            video.decoder.flush();
        }
        if let Some(audio) = &mut self.audio {
            audio.decoder.flush();
        }
    }
}

/// Scales a stream-native timestamp into seconds, preferring the explicit
/// PTS, then the best-effort timestamp, then zero.
pub(crate) fn timestamp_secs(pts: Option<i64>, best_effort: Option<i64>, time_base: f64) -> f64 {
    pts.or(best_effort)
        .map_or(0.0, |ticks| ticks as f64 * time_base)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamp_prefers_explicit_pts() {
        assert_eq!(timestamp_secs(Some(3000), Some(9000), 0.001), 3.0);
    }

    #[test]
    fn timestamp_falls_back_to_best_effort() {
        assert_eq!(timestamp_secs(None, Some(9000), 0.001), 9.0);
    }

    #[test]
    fn timestamp_defaults_to_zero() {
        assert_eq!(timestamp_secs(None, None, 0.001), 0.0);
    }

    #[test]
    fn open_rejects_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.mp4");
        let result = MediaSession::open(path.to_str().unwrap(), &[], PixelFormat::Rgba);
        assert!(matches!(result, Err(PlayerError::OpenFailed(_))));
    }

    #[test]
    fn open_rejects_garbage_input() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("garbage.mp4");
        std::fs::write(&path, b"not a media file").unwrap();
        let result = MediaSession::open(path.to_str().unwrap(), &[], PixelFormat::Rgba);
        assert!(result.is_err());
    }
}
