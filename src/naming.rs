//! File naming and human-readable labels for converted images.
//!
//! Every converted file gets two names derived from the upload's file name:
//!
//! - a **display name** for the UI: extension stripped, whitespace trimmed,
//!   capped at 120 characters;
//! - a **download stem** safe for any filesystem: lowercase, runs of
//!   characters outside `[a-z0-9_-]` collapsed to `-`, edge dashes removed.
//!
//! Both fall back to `converted-image` when nothing usable is left.
//!
//! ## Download File Names
//!
//! Suffixes are appended in a fixed order before the extension:
//!
//! - `My Photo!!.png`, WebP q90, original size → `my-photo-q90.webp`
//! - `dawn.jpg`, WebP q75, max 1024px → `dawn-q75-1024px.webp`
//! - `dawn.jpg`, PNG (lossless), max 64px → `dawn-64px.png`

use crate::imaging::{OutputFormat, Quality, ResizeSpec};

/// Fallback used when a file name has no usable characters.
pub const FALLBACK_NAME: &str = "converted-image";

/// Maximum number of characters kept in a display name.
const MAX_DISPLAY_CHARS: usize = 120;

/// Names derived from an uploaded file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileNameData {
    /// Human-facing name, original casing preserved.
    pub display_name: String,
    /// Filesystem-safe stem used to build download file names.
    pub download_stem: String,
}

/// Derive display and download names from an uploaded file name.
pub fn create_file_name_data(original_name: &str) -> FileNameData {
    let source = if original_name.is_empty() {
        FALLBACK_NAME
    } else {
        original_name
    };
    let base = strip_extension(source);
    let trimmed: String = base.trim().chars().take(MAX_DISPLAY_CHARS).collect();
    let display_name = if trimmed.is_empty() {
        FALLBACK_NAME.to_string()
    } else {
        trimmed
    };

    let slug = slugify(&display_name);
    let download_stem = if slug.is_empty() {
        FALLBACK_NAME.to_string()
    } else {
        slug
    };

    FileNameData {
        display_name,
        download_stem,
    }
}

/// Remove a trailing `.ext` where `ext` contains neither `.` nor `/`.
fn strip_extension(name: &str) -> &str {
    match name.rfind('.') {
        Some(dot) => {
            let ext = &name[dot + 1..];
            if ext.is_empty() || ext.contains('/') {
                name
            } else {
                &name[..dot]
            }
        }
        None => name,
    }
}

fn slugify(name: &str) -> String {
    let lowered = name.to_lowercase();
    let mut slug = String::with_capacity(lowered.len());
    let mut in_run = false;
    for c in lowered.chars() {
        if c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-' {
            slug.push(c);
            in_run = false;
        } else if !in_run {
            slug.push('-');
            in_run = true;
        }
    }
    slug.trim_matches('-').to_string()
}

/// Suggested download file name for a converted image.
///
/// `-q{quality}` is only added for formats that accept a quality setting;
/// `-{n}px` only when the image was converted with a size bound.
pub fn download_file_name(
    stem: &str,
    format: OutputFormat,
    quality: Quality,
    resize: ResizeSpec,
) -> String {
    let mut name = stem.to_string();
    if format.accepts_quality() {
        name.push_str(&format!("-q{}", quality.value()));
    }
    if let Some(n) = resize.max_dimension() {
        name.push_str(&format!("-{n}px"));
    }
    name.push('.');
    name.push_str(format.extension());
    name
}

/// `"Quality 90%"` for lossy formats, `None` for lossless ones.
pub fn quality_label(format: OutputFormat, quality: Quality) -> Option<String> {
    format
        .accepts_quality()
        .then(|| format!("Quality {}%", quality.value()))
}

/// Card title: display name, with the quality label in parentheses when present.
pub fn display_label(display_name: &str, format: OutputFormat, quality: Quality) -> String {
    match quality_label(format, quality) {
        Some(label) => format!("{display_name} ({label})"),
        None => display_name.to_string(),
    }
}

/// One-line summary of an image: `"1.5 MB • image/png • 800 × 600"`.
pub fn describe(byte_len: u64, mime: &str, width: u32, height: u32) -> String {
    format!("{} • {} • {} × {}", format_bytes(byte_len), mime, width, height)
}

/// Format a byte count as `B`, `KB`, `MB` or `GB` (1024-based).
///
/// One decimal is shown below 10 units, none above; plain bytes never
/// carry decimals.
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    if bytes == 0 {
        return "0 B".to_string();
    }
    let mut index = 0;
    while index < UNITS.len() - 1 && bytes >= 1u64 << (10 * (index + 1)) {
        index += 1;
    }
    let size = bytes as f64 / (1u64 << (10 * index)) as f64;
    if size >= 10.0 || index == 0 {
        format!("{:.0} {}", size, UNITS[index])
    } else {
        format!("{:.1} {}", size, UNITS[index])
    }
}

/// Format an integer with `,` thousands separators (`20000` → `"20,000"`).
pub fn format_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}
