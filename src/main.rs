//! recordmic - record from the microphone and report what was captured
//!
//! Usage: recordmic --seconds 3 --mode left
//!
//! Settings are read from `~/.config/recordmic/settings.json` and can be
//! overridden on the command line.

use std::process::ExitCode;
use std::thread;
use std::time::{Duration, TryFromFloatSecsError};

use clap::Parser;
use recordmic::audio::MicInput;
use recordmic::{Channel, ChannelMode, Recorder, RecorderSettings};

#[derive(Parser)]
#[command(name = "recordmic")]
#[command(about = "Record from the microphone into memory")]
struct Args {
    /// Duration to record in seconds
    #[arg(short, long, default_value = "3")]
    seconds: f32,

    /// Recording volume (usually 0 to 1)
    #[arg(short, long)]
    volume: Option<f32>,

    /// Samples per channel in each block
    #[arg(short, long)]
    buffer_size: Option<usize>,

    /// Channels to record: stereo, left or right
    #[arg(short, long)]
    mode: Option<String>,

    /// Input device name
    #[arg(short, long)]
    device: Option<String>,

    /// List input devices and exit
    #[arg(long)]
    list_devices: bool,

    /// Persist the effective settings
    #[arg(long)]
    save_settings: bool,
}

fn main() -> ExitCode {
    env_logger::init();

    match run(Args::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            eprintln!("recordmic: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let duration = record_duration(args.seconds)?;

    if args.list_devices {
        for name in MicInput::device_names()? {
            println!("{}", name);
        }
        return Ok(());
    }

    let mut settings = RecorderSettings::load();
    if let Some(volume) = args.volume {
        settings.volume = volume;
    }
    if let Some(buffer_size) = args.buffer_size {
        settings.buffer_size = buffer_size;
    }
    if let Some(mode) = args.mode.as_deref() {
        settings.channel_mode = ChannelMode::from(mode);
    }
    if args.device.is_some() {
        settings.device = args.device.clone();
    }

    let mut recorder = Recorder::open(settings.to_config())?;

    if args.save_settings {
        RecorderSettings::from_recorder(&recorder).save();
    }

    log::info!(
        "Recording {:.1}s from {} ({})",
        args.seconds,
        recorder.device_name(),
        recorder.channel_mode()
    );

    recorder.start();
    thread::sleep(duration);
    recorder.stop();

    println!("device:      {}", recorder.device_name());
    println!("mode:        {}", recorder.channel_mode());
    println!("block size:  {}", recorder.buffer_size());
    println!("samples:     {} per channel", recorder.recorded_len());

    let stereo = recorder.get_stereo_data(None)?;
    println!("stereo:      {} interleaved samples", stereo.len());

    for channel in [Channel::Left, Channel::Right] {
        match recorder.get_mono_data(Some(channel)) {
            Ok(samples) => {
                let (peak, rms) = levels(&samples);
                println!("{:<6} peak {:.4}  rms {:.4}", channel.name(), peak, rms);
            }
            Err(e) => println!("{:<6} {}", channel.name(), e),
        }
    }

    recorder.destroy();
    Ok(())
}

/// Recording length for `--seconds`. Negative, NaN and out of range values
/// are rejected.
fn record_duration(seconds: f32) -> Result<Duration, TryFromFloatSecsError> {
    Duration::try_from_secs_f32(seconds)
}

/// Peak and RMS level of a buffer
fn levels(samples: &[f32]) -> (f32, f32) {
    if samples.is_empty() {
        return (0.0, 0.0);
    }

    let peak = samples.iter().fold(0.0_f32, |m, s| m.max(s.abs()));
    let sum_sq: f64 = samples.iter().map(|&s| (s as f64) * (s as f64)).sum();
    let rms = (sum_sq / samples.len() as f64).sqrt() as f32;
    (peak, rms)
}
