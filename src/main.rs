#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]

mod config;
mod pipeline;
mod types;
mod ui;

use anyhow::Result;
use clap::Parser;
use gpui::Application;

use config::Config;
use pipeline::{CaptureController, HttpInferenceClient, NokhwaSource, OverlayRenderer};

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Config::parse();
    log::info!(
        "sending frames to {} at {} ticks/s",
        config.endpoint,
        config.tick_rate
    );

    let engine = HttpInferenceClient::new(
        config.endpoint.clone(),
        config.jpeg_quality,
        config.request_timeout(),
    )?;
    let overlay = OverlayRenderer::new(config.font.as_deref());
    let labels_enabled = overlay.has_font();

    Application::new()
        .with_assets(gpui_component_assets::Assets)
        .run(move |app| {
            gpui_component::init(app);

            let endpoint = engine.endpoint().to_string();
            let source = NokhwaSource::open(config.camera_index);
            let controller = CaptureController::new(
                source,
                engine,
                overlay,
                config.tick_interval(),
                config.fps_report_interval(),
            );

            if let Err(err) = ui::launch_ui(app, controller, endpoint, labels_enabled) {
                log::error!("failed to launch ui: {err:?}");
            }
        });

    Ok(())
}
