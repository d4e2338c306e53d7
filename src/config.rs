use std::{path::PathBuf, time::Duration};

use clap::Parser;

pub const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:7123/predict";
const FPS_REPORT_INTERVAL: Duration = Duration::from_secs(1);
const MIN_TICK_INTERVAL: Duration = Duration::from_millis(1);
const MAX_TICK_INTERVAL: Duration = Duration::from_secs(60 * 60);

#[derive(Parser, Clone, Debug)]
#[command(
    author,
    version,
    about = "Overlay face attributes from a remote inference service on a live webcam feed"
)]
pub struct Config {
    /// Inference endpoint that accepts `{"base64_image": ...}` POST bodies.
    #[arg(long, env = "FACE_LENS_ENDPOINT", default_value = DEFAULT_ENDPOINT)]
    pub endpoint: String,

    /// Index of the camera to open.
    #[arg(long, env = "FACE_LENS_CAMERA", default_value_t = 0)]
    pub camera_index: u32,

    /// Capture ticks requested per second, between one per hour and 1000.
    #[arg(long, env = "FACE_LENS_TICK_RATE", default_value_t = 30.0, value_parser = parse_tick_rate)]
    pub tick_rate: f64,

    /// JPEG quality used when uploading frames.
    #[arg(long, default_value_t = 95, value_parser = clap::value_parser!(u8).range(1..=100))]
    pub jpeg_quality: u8,

    /// Abort inference requests after this many seconds. Unset waits forever.
    #[arg(long)]
    pub request_timeout_secs: Option<u64>,

    /// TrueType font used for the attribute labels.
    #[arg(long, env = "FACE_LENS_FONT")]
    pub font: Option<PathBuf>,
}

impl Config {
    pub fn tick_interval(&self) -> Duration {
        tick_interval_for(self.tick_rate)
            .unwrap_or(MAX_TICK_INTERVAL)
            .clamp(MIN_TICK_INTERVAL, MAX_TICK_INTERVAL)
    }

    pub fn fps_report_interval(&self) -> Duration {
        FPS_REPORT_INTERVAL
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }
}

fn parse_tick_rate(raw: &str) -> Result<f64, String> {
    let rate: f64 = raw
        .parse()
        .map_err(|err| format!("invalid tick rate {raw:?}: {err}"))?;
    if !rate.is_finite() || rate <= 0.0 {
        return Err(format!("tick rate must be positive, got {rate}"));
    }
    match tick_interval_for(rate) {
        Some(interval) if (MIN_TICK_INTERVAL..=MAX_TICK_INTERVAL).contains(&interval) => Ok(rate),
        _ => Err(format!(
            "tick rate {rate} is outside {:.6}..=1000 ticks/s",
            1.0 / MAX_TICK_INTERVAL.as_secs_f64()
        )),
    }
}

fn tick_interval_for(rate: f64) -> Option<Duration> {
    Duration::try_from_secs_f64(1.0 / rate).ok()
}
