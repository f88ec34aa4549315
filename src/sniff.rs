//! Content-based format detection.
//!
//! The only thing trusted for acceptance decisions is the leading byte
//! signature of the upload. File names and declared MIME types are ignored,
//! so a `.png` that is really a text file (or an executable) is reported as
//! [`SniffedFormat::Unknown`] and rejected by the guard chain.
//!
//! | Format | Signature |
//! |---|---|
//! | PNG | `89 50 4E 47 0D 0A 1A 0A` (8 bytes) |
//! | JPEG | `FF D8 FF` (3 bytes) |

use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of leading bytes the sniffer looks at.
pub const SNIFF_LEN: usize = 12;

const PNG_SIGNATURE: [u8; 8] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
const JPEG_SIGNATURE: [u8; 3] = [0xFF, 0xD8, 0xFF];

/// True type of an upload, derived from its bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SniffedFormat {
    Png,
    Jpeg,
    Unknown,
}

impl SniffedFormat {
    /// MIME type of a recognized format; `None` for [`SniffedFormat::Unknown`].
    pub fn mime(self) -> Option<&'static str> {
        match self {
            Self::Png => Some("image/png"),
            Self::Jpeg => Some("image/jpeg"),
            Self::Unknown => None,
        }
    }
}

impl fmt::Display for SniffedFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Png => "png",
            Self::Jpeg => "jpeg",
            Self::Unknown => "unknown",
        })
    }
}

/// Detect the format of `bytes` from its first [`SNIFF_LEN`] bytes.
///
/// Short or empty input yields [`SniffedFormat::Unknown`].
pub fn sniff(bytes: &[u8]) -> SniffedFormat {
    let head = &bytes[..bytes.len().min(SNIFF_LEN)];
    if head.starts_with(&PNG_SIGNATURE) {
        SniffedFormat::Png
    } else if head.starts_with(&JPEG_SIGNATURE) {
        SniffedFormat::Jpeg
    } else {
        SniffedFormat::Unknown
    }
}
