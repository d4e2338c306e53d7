use std::{collections::BTreeMap, time::Duration};

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64_STANDARD};
use image::{
    ExtendedColorType, ImageError,
    codecs::jpeg::JpegEncoder,
    error::{ParameterError, ParameterErrorKind},
};
use reqwest::{StatusCode, blocking::Client};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::types::{Attributes, BoundingBox, Frame, InferenceResult};

/// Only the first detected subject is consumed.
const SUBJECT_INDEX: &str = "0";

#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("failed to encode frame as JPEG")]
    Encode(#[from] ImageError),
    #[error("inference request failed")]
    Transport(#[from] reqwest::Error),
    #[error("inference service returned a malformed response")]
    MalformedResponse(#[from] serde_json::Error),
}

pub trait InferenceEngine {
    /// `Ok(None)` means the service answered with a non-200 status or an empty
    /// `{}` body.
    fn infer(&mut self, frame: &Frame) -> Result<Option<InferenceResult>, InferenceError>;
}

#[derive(Serialize)]
struct PredictRequest {
    base64_image: String,
}

#[derive(Debug, Default, Deserialize)]
struct PredictResponse {
    #[serde(default)]
    result: Option<BTreeMap<String, Value>>,
    #[serde(default)]
    bounding_box: Option<WireBoundingBox>,
}

#[derive(Debug, Default, Deserialize)]
struct WireBoundingBox {
    x: Option<f64>,
    y: Option<f64>,
    width: Option<f64>,
    height: Option<f64>,
}

impl WireBoundingBox {
    fn into_bounding_box(self) -> Option<BoundingBox> {
        if self.x.is_none() && self.y.is_none() && self.width.is_none() && self.height.is_none() {
            return None;
        }
        Some(BoundingBox {
            x: self.x.unwrap_or(0.0),
            y: self.y.unwrap_or(0.0),
            width: self.width.unwrap_or(0.0),
            height: self.height.unwrap_or(0.0),
        })
    }
}

/// Decodes a 200 reply. The literal `{}` body means "nothing detected" and
/// yields `None`; any other object is a result, even if every field is blank.
pub fn parse_response(body: &[u8]) -> Result<Option<InferenceResult>, serde_json::Error> {
    let object: Map<String, Value> = serde_json::from_slice(body)?;
    if object.is_empty() {
        return Ok(None);
    }
    let response: PredictResponse = serde_json::from_value(Value::Object(object))?;
    let result = response.result.unwrap_or_default();

    // Keys whose value is not keyed by subject index read as empty.
    let attribute = |name: &str| -> String {
        match result.get(name).and_then(|by_index| by_index.get(SUBJECT_INDEX)) {
            None | Some(Value::Null) => String::new(),
            Some(Value::String(text)) => text.clone(),
            Some(other) => other.to_string(),
        }
    };

    Ok(Some(InferenceResult {
        bounding_box: response
            .bounding_box
            .and_then(WireBoundingBox::into_bounding_box),
        attributes: Attributes {
            age: attribute("age"),
            race: attribute("race"),
            masked: attribute("masked"),
            skintone: attribute("skintone"),
            emotion: attribute("emotion"),
            gender: attribute("gender"),
        },
    }))
}

pub fn encode_jpeg(frame: &Frame, quality: u8) -> Result<Vec<u8>, ImageError> {
    let expected_len = (frame.width as usize)
        .saturating_mul(frame.height as usize)
        .saturating_mul(4);
    if frame.rgba.len() != expected_len {
        return Err(ImageError::Parameter(ParameterError::from_kind(
            ParameterErrorKind::DimensionMismatch,
        )));
    }

    let rgb: Vec<u8> = frame
        .rgba
        .chunks_exact(4)
        .flat_map(|px| [px[0], px[1], px[2]])
        .collect();

    let mut jpeg = Vec::new();
    JpegEncoder::new_with_quality(&mut jpeg, quality).encode(
        &rgb,
        frame.width,
        frame.height,
        ExtendedColorType::Rgb8,
    )?;
    Ok(jpeg)
}

pub struct HttpInferenceClient {
    client: Client,
    endpoint: String,
    jpeg_quality: u8,
}

impl HttpInferenceClient {
    pub fn new(
        endpoint: impl Into<String>,
        jpeg_quality: u8,
        timeout: Option<Duration>,
    ) -> Result<Self, InferenceError> {
        // reqwest's blocking client defaults to a 30s timeout; `None` disables it.
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            jpeg_quality,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl InferenceEngine for HttpInferenceClient {
    fn infer(&mut self, frame: &Frame) -> Result<Option<InferenceResult>, InferenceError> {
        let jpeg = encode_jpeg(frame, self.jpeg_quality)?;
        let request = PredictRequest {
            base64_image: BASE64_STANDARD.encode(jpeg),
        };

        let response = self.client.post(&self.endpoint).json(&request).send()?;
        let status = response.status();
        if status != StatusCode::OK {
            log::warn!("Request failed with status code {}", status.as_u16());
            return Ok(None);
        }

        let body = response.bytes()?;
        Ok(parse_response(&body)?)
    }
}
