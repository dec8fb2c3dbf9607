//! `rgbd-record`: record a synthetic sensor session to disk.
//!
//! ```text
//! rgbd-record <session-folder> [seconds=5] [source-bits=0xff]
//! ```
//!
//! Source bits: color 0x01, infrared 0x02, long exposure 0x04, depth 0x08,
//! body index 0x10, body 0x20, audio 0x40, face 0x80.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use rgbd_capture_core::{CaptureConfiguration, CaptureError, Listeners, MultiSourceSynchronizer, SourceSet};
use rgbd_capture_synthetic::SyntheticDevice;

struct Args {
    folder: PathBuf,
    duration: Duration,
    sources: SourceSet,
}

fn parse_bits(text: &str) -> Option<u32> {
    match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16).ok(),
        None => text.parse().ok(),
    }
}

fn parse_args() -> Result<Args, CaptureError> {
    let mut args = std::env::args().skip(1);
    let folder = args
        .next()
        .map(PathBuf::from)
        .ok_or_else(|| CaptureError::ConfigurationFailed("usage: rgbd-record <session-folder> [seconds] [source-bits]".into()))?;
    let seconds: f64 = match args.next() {
        Some(text) => text
            .parse()
            .map_err(|_| CaptureError::ConfigurationFailed(format!("invalid duration '{}'", text)))?,
        None => 5.0,
    };
    if !seconds.is_finite() || seconds <= 0.0 {
        return Err(CaptureError::ConfigurationFailed("duration must be positive".into()));
    }
    let sources = match args.next() {
        Some(text) => SourceSet::from_bits(
            parse_bits(&text).ok_or_else(|| CaptureError::ConfigurationFailed(format!("invalid source bits '{}'", text)))?,
        ),
        None => SourceSet::ALL,
    };
    Ok(Args {
        folder,
        duration: Duration::from_secs_f64(seconds),
        sources,
    })
}

fn run() -> Result<(), CaptureError> {
    let args = parse_args()?;
    let device = Arc::new(SyntheticDevice::default());
    let mut sync = MultiSourceSynchronizer::new(device, CaptureConfiguration::default(), Listeners::new());

    sync.init(args.sources)?;
    log::info!("acquiring {}", sync.sources());
    if let Some(intrinsics) = sync.depth_intrinsics() {
        log::info!("depth intrinsics: {:?}", intrinsics);
    }

    sync.start_recording(&args.folder)?;
    thread::sleep(args.duration);
    let stats = sync.stream_stats();
    sync.stop_recording();
    sync.shutdown();

    for stream in stats {
        log::info!(
            "{}: {} records in {} events ({:.1} fps)",
            stream.prefix,
            stream.input_number,
            stream.event_count,
            stream.frame_rate
        );
    }
    log::info!("session written to {}", args.folder.display());
    Ok(())
}

fn main() -> ExitCode {
    env_logger::init();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
