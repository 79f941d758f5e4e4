//! Pairing payload rendering.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use qrcode::render::svg;
use qrcode::QrCode;

use crate::error::{Result, WaSenderError};

/// Turns a pairing payload into something a browser can display.
pub trait QrEncoder: Send + Sync {
    fn encode(&self, payload: &str) -> Result<String>;
}

/// Renders an SVG QR code wrapped in a `data:` URL.
#[derive(Debug, Clone, Copy)]
pub struct SvgDataUrlEncoder {
    min_dimension: u32,
}

impl Default for SvgDataUrlEncoder {
    fn default() -> Self {
        Self { min_dimension: 256 }
    }
}

impl SvgDataUrlEncoder {
    pub fn new(min_dimension: u32) -> Self {
        Self { min_dimension }
    }
}

impl QrEncoder for SvgDataUrlEncoder {
    fn encode(&self, payload: &str) -> Result<String> {
        let code = QrCode::new(payload.as_bytes())
            .map_err(|e| WaSenderError::QrEncode(e.to_string()))?;
        let image = code
            .render::<svg::Color<'_>>()
            .min_dimensions(self.min_dimension, self.min_dimension)
            .build();

        Ok(format!("data:image/svg+xml;base64,{}", STANDARD.encode(image)))
    }
}
