//! Pairing challenge rendering.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Utc};
use qrcode::render::{svg, unicode};
use qrcode::QrCode;
use serde::Serialize;
use tracing::{info, warn};

use crate::error::QrError;

/// Renders pairing payloads for display.
pub trait QrEncoder: Send + Sync {
    /// Encode as an image data URI for the admin page.
    fn encode_image(&self, payload: &str) -> Result<String, QrError>;

    /// Render as text, used when image encoding fails.
    fn render_text(&self, payload: &str) -> Result<String, QrError>;
}

/// Default encoder: SVG data URIs and unicode block text.
#[derive(Debug, Clone)]
pub struct SvgQrEncoder {
    /// Minimum rendered width/height in pixels.
    pub size: u32,
    /// Draw the quiet zone border.
    pub quiet_zone: bool,
}

impl Default for SvgQrEncoder {
    fn default() -> Self {
        Self {
            size: 300,
            quiet_zone: true,
        }
    }
}

impl SvgQrEncoder {
    fn code(payload: &str) -> Result<QrCode, QrError> {
        QrCode::new(payload.as_bytes()).map_err(|e| QrError::Encode(e.to_string()))
    }
}

impl QrEncoder for SvgQrEncoder {
    fn encode_image(&self, payload: &str) -> Result<String, QrError> {
        let image = Self::code(payload)?
            .render::<svg::Color>()
            .min_dimensions(self.size, self.size)
            .quiet_zone(self.quiet_zone)
            .build();
        Ok(format!("data:image/svg+xml;base64,{}", STANDARD.encode(image)))
    }

    fn render_text(&self, payload: &str) -> Result<String, QrError> {
        // inverted so it scans on dark terminals
        Ok(Self::code(payload)?
            .render::<unicode::Dense1x2>()
            .dark_color(unicode::Dense1x2::Light)
            .light_color(unicode::Dense1x2::Dark)
            .quiet_zone(self.quiet_zone)
            .build())
    }
}

/// How a challenge payload is encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QrFormat {
    /// `data:image/...;base64,` URI.
    DataUri,
    /// Multi-line text rendering.
    Text,
}

/// The latest pairing challenge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QrChallenge {
    /// Encoded payload.
    pub payload: String,
    /// Payload encoding.
    pub format: QrFormat,
    /// When the challenge was received.
    pub issued_at: DateTime<Utc>,
}

impl QrChallenge {
    /// Render a raw challenge, falling back to text if image encoding fails.
    ///
    /// Returns `None` only if both renderings fail.
    pub fn render(code: &str, encoder: &dyn QrEncoder) -> Option<Self> {
        let issued_at = Utc::now();
        match encoder.encode_image(code) {
            Ok(payload) => {
                info!(issued_at = %issued_at, "QR code ready for display");
                Some(Self {
                    payload,
                    format: QrFormat::DataUri,
                    issued_at,
                })
            }
            Err(e) => {
                warn!(error = %e, "Failed to generate QR code image, falling back to text");
                match encoder.render_text(code) {
                    Ok(payload) => {
                        info!("\n{}", payload);
                        Some(Self {
                            payload,
                            format: QrFormat::Text,
                            issued_at,
                        })
                    }
                    Err(e) => {
                        warn!(error = %e, "Failed to render QR code as text");
                        None
                    }
                }
            }
        }
    }
}
