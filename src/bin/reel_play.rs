// SPDX-License-Identifier: MPL-2.0
//! Minimal command-line host for the playback engine.
//!
//! Opens a source, plays it to the end, and demonstrates the full pull
//! API: presentation ticks on the main thread, audio drained from the
//! cpal callback with host-side volume, and progress reported on stderr.

use std::time::Duration;

use reel::{Player, PlayerState};

const TICK: Duration = Duration::from_millis(16);

struct Args {
    url: String,
    loop_playback: bool,
    speed: f64,
    volume: f32,
    no_audio: bool,
}

const HELP: &str = "\
reel-play: play a media file or stream URL

USAGE:
  reel-play [OPTIONS] <URL>

OPTIONS:
  --loop           Restart playback at end of file
  --speed <f64>    Playback speed (0.25 - 4.0, default 1.0)
  --volume <f32>   Output volume (0.0 - 1.0, default 1.0)
  --no-audio       Decode audio but do not open an output device
  -h, --help       Print this help
";

fn parse_args(mut args: pico_args::Arguments) -> Result<Args, pico_args::Error> {
    Ok(Args {
        loop_playback: args.contains("--loop"),
        speed: args.opt_value_from_str("--speed")?.unwrap_or(1.0),
        volume: args.opt_value_from_str("--volume")?.unwrap_or(1.0),
        no_audio: args.contains("--no-audio"),
        url: args.free_from_str()?,
    })
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut raw_args = pico_args::Arguments::from_env();
    if raw_args.contains(["-h", "--help"]) {
        print!("{}", HELP);
        return;
    }
    let args = match parse_args(raw_args) {
        Ok(args) => args,
        Err(e) => {
            eprintln!("error: {e}\n\n{HELP}");
            std::process::exit(2);
        }
    };

    if let Err(e) = run(&args) {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

fn run(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let mut player = Player::new();
    player.set_loop(args.loop_playback);
    player.set_speed(args.speed);
    player.set_volume(args.volume);

    player.open(&args.url)?;

    if let Some(video) = player.video_info() {
        println!(
            "video: {}x{} @ {:.2} fps ({}){}",
            video.width,
            video.height,
            video.fps,
            video.codec_name,
            if video.is_live { " [live]" } else { "" },
        );
    }
    if let Some(audio) = player.audio_info() {
        println!(
            "audio: {} Hz {} ch ({}) -> {} Hz stereo f32",
            audio.source_rate, audio.source_channels, audio.codec_name, audio.output_rate,
        );
    }

    // The stream must stay alive for the duration of playback.
    let _audio_stream = if player.audio_info().is_some() && !args.no_audio {
        match start_audio(&player) {
            Ok(stream) => Some(stream),
            Err(e) => {
                log::warn!("audio output unavailable, playing silently: {e}");
                None
            }
        }
    } else {
        None
    };

    player.play()?;

    let duration = player.duration();
    loop {
        if player.update(TICK.as_secs_f64()) > 0 {
            if let Some(frame) = player.video_frame() {
                eprint!(
                    "\r{:7.2}s / {:.2}s  ({}x{})   ",
                    frame.pts, duration, frame.width, frame.height,
                );
            }
        }

        match player.state() {
            PlayerState::EndOfFile => {
                eprintln!();
                println!("done at {:.2}s", player.position());
                return Ok(());
            }
            PlayerState::Error => {
                eprintln!();
                let err = player.last_error().map_or_else(
                    || "unknown playback error".to_string(),
                    |e| e.to_string(),
                );
                return Err(err.into());
            }
            _ => {}
        }

        std::thread::sleep(TICK);
    }
}

/// Opens the default output device and wires the engine's audio reader into
/// its callback. Volume is applied here, at mix time.
fn start_audio(player: &Player) -> Result<cpal::Stream, Box<dyn std::error::Error>> {
    use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or("no audio output device found")?;

    // Prefer a config matching the engine's fixed output format.
    let output_rate = cpal::SampleRate(reel::config::OUTPUT_SAMPLE_RATE);
    let config = device
        .supported_output_configs()?
        .find(|c| {
            c.channels() == reel::config::OUTPUT_CHANNELS
                && c.sample_format() == cpal::SampleFormat::F32
                && c.min_sample_rate() <= output_rate
                && c.max_sample_rate() >= output_rate
        })
        .map(|c| c.with_sample_rate(output_rate))
        .ok_or("no supported f32 stereo output config at 48 kHz")?;

    let reader = player.audio_reader();
    let volume = player.volume();

    let stream = device.build_output_stream(
        &config.into(),
        move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
            let filled = reader.read(data);
            data[filled..].fill(0.0);
            for sample in data.iter_mut() {
                *sample *= volume;
            }
        },
        |err| {
            log::warn!("audio output error: {err}");
        },
        None,
    )?;
    stream.play()?;
    Ok(stream)
}
