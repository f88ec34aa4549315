//! Parameter types for image operations.
//!
//! These structs describe *what* to produce, not *how*. They are the
//! interface between the orchestrator (which decides sizes, formats and
//! quality) and the [`backend`](super::backend) (which does the pixel work),
//! so a mock backend can stand in for the real encoder in tests.
//!
//! ## Types
//!
//! - [`Quality`]: Lossy encoding quality (0–100, default 90). Clamped on construction.
//! - [`OutputFormat`]: Encode target: WebP, JPEG or PNG.
//! - [`EncodeParams`]: Full specification of one conversion: source bytes, output size, format, quality.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Quality setting for lossy image encoding (0-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "u32", into = "u32")]
pub struct Quality(u8);

impl Quality {
    pub fn new(value: u32) -> Self {
        Self(value.min(100) as u8)
    }

    pub fn value(self) -> u8 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(90)
    }
}

impl From<u32> for Quality {
    fn from(value: u32) -> Self {
        Self::new(value)
    }
}

impl From<Quality> for u32 {
    fn from(quality: Quality) -> Self {
        u32::from(quality.0)
    }
}

/// Encode target for converted images.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    WebP,
    Jpeg,
    Png,
}

impl OutputFormat {
    /// Whether a quality setting applies to this format.
    ///
    /// PNG is lossless: quality never shows up in its labels or file names.
    pub fn accepts_quality(self) -> bool {
        matches!(self, Self::WebP | Self::Jpeg)
    }

    pub fn mime(self) -> &'static str {
        match self {
            Self::WebP => "image/webp",
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::WebP => "webp",
            Self::Jpeg => "jpg",
            Self::Png => "png",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::WebP => "webp",
            Self::Jpeg => "jpeg",
            Self::Png => "png",
        })
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "webp" => Ok(Self::WebP),
            "jpeg" | "jpg" => Ok(Self::Jpeg),
            "png" => Ok(Self::Png),
            other => Err(format!(
                "unsupported output format '{other}' (expected webp, jpeg or png)"
            )),
        }
    }
}

/// Parameters for one decode → draw → encode conversion.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodeParams {
    pub source: Arc<[u8]>,
    /// Output surface size.
    pub width: u32,
    pub height: u32,
    pub format: OutputFormat,
    pub quality: Quality,
}
