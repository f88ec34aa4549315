//! Guard chain: size, sniffed format and dimension checks.
//!
//! Every upload passes three checks, in this order, before any expensive
//! decoding happens. The first failure wins:
//!
//! 1. **Size**: the buffer must not exceed [`Limits::max_file_size`], and
//!    the length the host declared must match the buffer.
//! 2. **Format**: the [sniffed](crate::sniff) format must be in
//!    [`Limits::supported_formats`]. File names and declared types are
//!    never consulted.
//! 3. **Dimensions**: both sides non-zero and at most
//!    [`Limits::max_dimension`].
//!
//! The checks are pure. The orchestrator calls them one by one so that the
//! dimension probe only runs for uploads that passed the cheap checks;
//! [`evaluate`] runs the whole chain over facts the caller already has.

use crate::imaging::Dimensions;
use crate::naming::{format_bytes, format_thousands};
use crate::sniff::SniffedFormat;
use crate::types::InputFile;
use thiserror::Error;

/// Why an upload was rejected. `Display` is the user-facing reason.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("File size exceeds {}", format_bytes(*limit))]
    TooLarge { limit: u64 },
    #[error("Invalid file size")]
    InvalidSize,
    #[error("Unsupported or spoofed format")]
    UnsupportedFormat { sniffed: SniffedFormat },
    #[error("Invalid dimensions")]
    InvalidDimensions,
    #[error("Dimensions exceed {}px", format_thousands(u64::from(*limit)))]
    DimensionTooLarge { limit: u32 },
}

/// Outcome of the guard chain for one upload.
pub type GuardVerdict = Result<(), ValidationError>;

/// Injectable acceptance limits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Limits {
    pub max_file_size: u64,
    pub max_dimension: u32,
    pub supported_formats: Vec<SniffedFormat>,
}

impl Limits {
    pub const DEFAULT_MAX_FILE_SIZE: u64 = 50 * 1024 * 1024;
    pub const DEFAULT_MAX_DIMENSION: u32 = 20_000;
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_file_size: Self::DEFAULT_MAX_FILE_SIZE,
            max_dimension: Self::DEFAULT_MAX_DIMENSION,
            supported_formats: vec![SniffedFormat::Png, SniffedFormat::Jpeg],
        }
    }
}

/// Size check: too-large uploads are rejected before length mismatches.
pub fn check_size(file: &InputFile, limits: &Limits) -> GuardVerdict {
    let actual = file.byte_len();
    if actual > limits.max_file_size || file.declared_len() > limits.max_file_size {
        return Err(ValidationError::TooLarge {
            limit: limits.max_file_size,
        });
    }
    if file.declared_len() != actual {
        return Err(ValidationError::InvalidSize);
    }
    Ok(())
}

pub fn check_format(sniffed: SniffedFormat, limits: &Limits) -> GuardVerdict {
    if sniffed == SniffedFormat::Unknown || !limits.supported_formats.contains(&sniffed) {
        return Err(ValidationError::UnsupportedFormat { sniffed });
    }
    Ok(())
}

pub fn check_dimensions(dimensions: Dimensions, limits: &Limits) -> GuardVerdict {
    let Dimensions { width, height } = dimensions;
    if width == 0 || height == 0 {
        return Err(ValidationError::InvalidDimensions);
    }
    if width > limits.max_dimension || height > limits.max_dimension {
        return Err(ValidationError::DimensionTooLarge {
            limit: limits.max_dimension,
        });
    }
    Ok(())
}

/// Run the full chain over already-gathered facts.
pub fn evaluate(
    file: &InputFile,
    sniffed: SniffedFormat,
    dimensions: Dimensions,
    limits: &Limits,
) -> GuardVerdict {
    check_size(file, limits)?;
    check_format(sniffed, limits)?;
    check_dimensions(dimensions, limits)
}
