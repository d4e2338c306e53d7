use std::time::Instant;

use anyhow::{Result, anyhow};
use nokhwa::{
    Camera,
    pixel_format::RgbFormat,
    utils::{CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType},
};
use thiserror::Error;

use super::rgba_converter;
use crate::types::Frame;

// Prefer pixel formats that are widely supported on macOS (the built-in cameras
// often reject YUYV even though Nokhwa reports it).
const PREFERRED_PIXEL_FORMATS: &[FrameFormat] = &[
    FrameFormat::RAWRGB,
    FrameFormat::RAWBGR,
    FrameFormat::GRAY,
    FrameFormat::YUYV,
    FrameFormat::NV12,
    FrameFormat::MJPEG,
];

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("camera is not open")]
    NotOpen,
    #[error("camera frame read failed: {0}")]
    Device(String),
    #[error("failed to decode camera frame: {0}")]
    Decode(String),
}

pub trait FrameSource {
    fn read(&mut self) -> Result<Frame, CaptureError>;
}

fn requested_formats() -> [RequestedFormat<'static>; 3] {
    [
        RequestedFormat::with_formats(
            RequestedFormatType::AbsoluteHighestFrameRate,
            PREFERRED_PIXEL_FORMATS,
        ),
        RequestedFormat::new::<RgbFormat>(RequestedFormatType::AbsoluteHighestFrameRate),
        RequestedFormat::new::<RgbFormat>(RequestedFormatType::None),
    ]
}

fn build_camera(index: CameraIndex) -> Result<Camera> {
    let mut last_err = None;

    for requested in requested_formats() {
        match Camera::new(index.clone(), requested) {
            Ok(mut camera) => match camera.open_stream() {
                Ok(()) => return Ok(camera),
                Err(err) => last_err = Some(err.into()),
            },
            Err(err) => last_err = Some(err.into()),
        }
    }

    Err(last_err.unwrap_or_else(|| anyhow!("failed to open camera with any supported format")))
}

/// A single camera opened once at startup. A device that fails to open stays
/// closed; reads then fail with [`CaptureError::NotOpen`].
pub struct NokhwaSource {
    camera: Option<Camera>,
    open_error: Option<String>,
}

impl NokhwaSource {
    pub fn open(index: u32) -> Self {
        match build_camera(CameraIndex::Index(index)) {
            Ok(camera) => {
                log::info!("camera {index} opened ({})", camera.info().human_name());
                Self {
                    camera: Some(camera),
                    open_error: None,
                }
            }
            Err(err) => {
                log::error!("failed to open camera {index}: {err:?}");
                Self {
                    camera: None,
                    open_error: Some(format!("camera {index} unavailable: {err}")),
                }
            }
        }
    }

    pub fn open_error(&self) -> Option<&str> {
        self.open_error.as_deref()
    }
}

impl FrameSource for NokhwaSource {
    fn read(&mut self) -> Result<Frame, CaptureError> {
        let camera = self.camera.as_mut().ok_or(CaptureError::NotOpen)?;
        let buffer = camera
            .frame()
            .map_err(|err| CaptureError::Device(err.to_string()))?;
        let timestamp = Instant::now();

        let converted = rgba_converter::convert_camera_frame(&buffer)
            .map_err(|err| CaptureError::Decode(format!("{err:?}")))?;

        Ok(Frame {
            rgba: converted.rgba,
            width: converted.width,
            height: converted.height,
            timestamp,
        })
    }
}

impl Drop for NokhwaSource {
    fn drop(&mut self) {
        if let Some(camera) = self.camera.as_mut() {
            if let Err(err) = camera.stop_stream() {
                log::warn!("failed to stop camera stream: {err:?}");
            }
        }
    }
}
