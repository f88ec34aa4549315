//! Converter configuration.
//!
//! Handles loading, validating, and merging `pixelgate.toml`. Stock defaults
//! are the base layer; a user file only needs the keys it wants to change.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [limits]
//! max_file_size = 52428800           # Bytes (50 MiB)
//! max_dimension = 20000              # Pixels, either side
//! supported_formats = ["png", "jpeg"]
//!
//! [rate_limit]
//! max_admissions = 20                # Conversions per window
//! window_ms = 60000
//!
//! [resize]
//! catalog = [16, 32, 48, 64, 128, 256, 320, 512, 640, 800, 1024, 1280, 1920, 2048, 2560, 4096]
//! # target = 1024                    # Omit to keep the original size
//!
//! [output]
//! format = "webp"                    # webp, jpeg or png
//! quality = 90                       # 0-100, ignored for png
//!
//! [integrity]
//! enabled = true                     # Background SHA-256 of every output
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::convert::Converter;
use crate::guard::Limits;
use crate::imaging::{ImageBackend, OutputFormat, Quality, ResizeCatalog, ResizeSpec};
use crate::integrity::Integrity;
use crate::rate_limit::{RateLimiter, RatePolicy};
use crate::sniff::SniffedFormat;
use crate::types::ConversionSettings;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// File name looked up in the working directory when no `--config` is given.
pub const DEFAULT_CONFIG_FILE: &str = "pixelgate.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    TomlSer(#[from] toml::ser::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Full converter configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConverterConfig {
    /// Upload acceptance limits.
    pub limits: LimitsConfig,
    /// Sliding-window admission policy.
    pub rate_limit: RateLimitConfig,
    /// Allowed resize bounds and the default choice.
    pub resize: ResizeConfig,
    /// Encode target and quality.
    pub output: OutputConfig,
    /// Background checksum settings.
    pub integrity: IntegrityConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LimitsConfig {
    pub max_file_size: u64,
    pub max_dimension: u32,
    pub supported_formats: Vec<SniffedFormat>,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        let limits = Limits::default();
        Self {
            max_file_size: limits.max_file_size,
            max_dimension: limits.max_dimension,
            supported_formats: limits.supported_formats,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RateLimitConfig {
    pub max_admissions: usize,
    pub window_ms: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        let policy = RatePolicy::default();
        Self {
            max_admissions: policy.max_admissions,
            window_ms: policy.window.as_millis() as u64,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ResizeConfig {
    /// Longer-edge bounds a user may pick from.
    pub catalog: Vec<u32>,
    /// Default bound; must be one of `catalog`. `None` keeps the original size.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<u32>,
}

impl Default for ResizeConfig {
    fn default() -> Self {
        Self {
            catalog: ResizeCatalog::default().sizes().to_vec(),
            target: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    pub format: OutputFormat,
    /// Plain integer: values over 100 fail validation rather than clamp.
    pub quality: u32,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::default(),
            quality: u32::from(Quality::default()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IntegrityConfig {
    pub enabled: bool,
}

impl Default for IntegrityConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl ConverterConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.limits.max_file_size == 0 {
            return Err(ConfigError::Validation(
                "limits.max_file_size must be at least 1".into(),
            ));
        }
        if self.limits.max_dimension == 0 {
            return Err(ConfigError::Validation(
                "limits.max_dimension must be at least 1".into(),
            ));
        }
        if self.limits.supported_formats.is_empty() {
            return Err(ConfigError::Validation(
                "limits.supported_formats must not be empty".into(),
            ));
        }
        if self
            .limits
            .supported_formats
            .contains(&SniffedFormat::Unknown)
        {
            return Err(ConfigError::Validation(
                "limits.supported_formats may only list png and jpeg".into(),
            ));
        }
        if self.rate_limit.max_admissions == 0 {
            return Err(ConfigError::Validation(
                "rate_limit.max_admissions must be at least 1".into(),
            ));
        }
        if self.rate_limit.window_ms == 0 {
            return Err(ConfigError::Validation(
                "rate_limit.window_ms must be at least 1".into(),
            ));
        }
        if self.resize.catalog.is_empty() || self.resize.catalog.contains(&0) {
            return Err(ConfigError::Validation(
                "resize.catalog must be a non-empty list of positive sizes".into(),
            ));
        }
        if let Some(target) = self.resize.target
            && !self.resize.catalog.contains(&target)
        {
            return Err(ConfigError::Validation(format!(
                "resize.target {target} is not in resize.catalog"
            )));
        }
        if self.output.quality > 100 {
            return Err(ConfigError::Validation(
                "output.quality must be 0-100".into(),
            ));
        }
        Ok(())
    }

    pub fn limits(&self) -> Limits {
        Limits {
            max_file_size: self.limits.max_file_size,
            max_dimension: self.limits.max_dimension,
            supported_formats: self.limits.supported_formats.clone(),
        }
    }

    pub fn rate_policy(&self) -> RatePolicy {
        RatePolicy::new(
            self.rate_limit.max_admissions,
            Duration::from_millis(self.rate_limit.window_ms),
        )
    }

    pub fn resize_catalog(&self) -> ResizeCatalog {
        ResizeCatalog::new(self.resize.catalog.clone())
    }

    /// Default conversion settings: output format, quality and resize target.
    pub fn settings(&self) -> ConversionSettings {
        ConversionSettings {
            format: self.output.format,
            quality: Quality::new(self.output.quality),
            resize: self
                .resize
                .target
                .map_or(ResizeSpec::Original, ResizeSpec::MaxDimension),
        }
    }

    pub fn integrity(&self) -> Integrity {
        if self.integrity.enabled {
            Integrity::new()
        } else {
            Integrity::unavailable()
        }
    }

    /// A converter wired with these limits, a fresh rate limiter and the
    /// integrity setting.
    pub fn converter<B: ImageBackend>(&self, backend: B) -> Converter<B> {
        Converter::new(backend)
            .with_limits(self.limits())
            .with_rate_limiter(Arc::new(RateLimiter::new(self.rate_policy())))
            .with_integrity(self.integrity())
    }
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the canonical representation of all default values, used as the
/// base layer for merging user overrides on top.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    Ok(toml::Value::try_from(ConverterConfig::default())?)
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Read a config file as a raw TOML value.
///
/// Returns `Ok(None)` if the file does not exist.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<ConverterConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: ConverterConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from a TOML file, falling back to stock defaults when the
/// file is absent.
pub fn load_config(path: &Path) -> Result<ConverterConfig, ConfigError> {
    let base = stock_defaults_value()?;
    let overlay = load_raw_config(path)?;
    resolve_config(base, overlay)
}

/// Parse config from a TOML string layered over stock defaults.
pub fn load_config_str(content: &str) -> Result<ConverterConfig, ConfigError> {
    let overlay: toml::Value = toml::from_str(content)?;
    resolve_config(stock_defaults_value()?, Some(overlay))
}

/// Returns a fully-commented stock `pixelgate.toml` with all keys and
/// explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# pixelgate configuration
# =======================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
# Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Upload limits
# ---------------------------------------------------------------------------
[limits]
# Largest accepted upload, in bytes (50 MiB).
max_file_size = 52428800

# Largest accepted width or height, in pixels.
max_dimension = 20000

# Formats accepted after sniffing the file's leading bytes.
# File names and declared types are never trusted.
supported_formats = ["png", "jpeg"]

# ---------------------------------------------------------------------------
# Rate limiting
# ---------------------------------------------------------------------------
[rate_limit]
# At most this many conversions...
max_admissions = 20

# ...within this sliding window, in milliseconds.
window_ms = 60000

# ---------------------------------------------------------------------------
# Resize
# ---------------------------------------------------------------------------
[resize]
# Longer-edge bounds that may be requested. Images are never upscaled.
catalog = [16, 32, 48, 64, 128, 256, 320, 512, 640, 800, 1024, 1280, 1920, 2048, 2560, 4096]

# Default bound, one of the catalog values. Omit to keep the original size.
# target = 1024

# ---------------------------------------------------------------------------
# Output
# ---------------------------------------------------------------------------
[output]
# Encode target: "webp", "jpeg" or "png".
format = "webp"

# Encoding quality (0 = worst, 100 = best). Ignored for png.
quality = 90

# ---------------------------------------------------------------------------
# Integrity
# ---------------------------------------------------------------------------
[integrity]
# Compute a SHA-256 checksum of every output in the background.
enabled = true
"##
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config_matches_component_defaults() {
        let config = ConverterConfig::default();
        assert_eq!(config.limits(), Limits::default());
        assert_eq!(config.rate_policy(), RatePolicy::default());
        assert_eq!(config.resize_catalog(), ResizeCatalog::default());
        assert_eq!(config.settings(), ConversionSettings::default());
        assert!(config.integrity().is_available());
    }

    #[test]
    fn default_config_validates() {
        assert!(ConverterConfig::default().validate().is_ok());
    }

    #[test]
    fn parse_partial_config() {
        let config = load_config_str(
            r#"
[output]
quality = 75
"#,
        )
        .unwrap();
        assert_eq!(config.output.quality, 75);
        // Defaults preserved
        assert_eq!(config.output.format, OutputFormat::WebP);
        assert_eq!(config.rate_limit.max_admissions, 20);
    }

    #[test]
    fn parse_full_config() {
        let config = load_config_str(
            r#"
[limits]
max_file_size = 1048576
max_dimension = 4000
supported_formats = ["jpeg"]

[rate_limit]
max_admissions = 15
window_ms = 30000

[resize]
catalog = [64, 512]
target = 512

[output]
format = "jpeg"
quality = 60

[integrity]
enabled = false
"#,
        )
        .unwrap();

        assert_eq!(config.limits().max_file_size, 1_048_576);
        assert_eq!(config.limits().supported_formats, vec![SniffedFormat::Jpeg]);
        assert_eq!(
            config.rate_policy(),
            RatePolicy::new(15, Duration::from_secs(30))
        );
        assert_eq!(config.resize_catalog().sizes(), &[64, 512]);
        let settings = config.settings();
        assert_eq!(settings.format, OutputFormat::Jpeg);
        assert_eq!(settings.quality, Quality::new(60));
        assert_eq!(settings.resize, ResizeSpec::MaxDimension(512));
        assert!(!config.integrity().is_available());
    }

    // =========================================================================
    // Validation
    // =========================================================================

    fn assert_invalid(toml: &str, needle: &str) {
        match load_config_str(toml) {
            Err(ConfigError::Validation(msg)) => {
                assert!(msg.contains(needle), "{msg:?} should mention {needle:?}")
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn quality_over_100_is_rejected() {
        assert_invalid("[output]\nquality = 101", "output.quality");
    }

    #[test]
    fn zero_admissions_is_rejected() {
        assert_invalid("[rate_limit]\nmax_admissions = 0", "max_admissions");
    }

    #[test]
    fn zero_window_is_rejected() {
        assert_invalid("[rate_limit]\nwindow_ms = 0", "window_ms");
    }

    #[test]
    fn empty_catalog_is_rejected() {
        assert_invalid("[resize]\ncatalog = []", "resize.catalog");
    }

    #[test]
    fn target_outside_catalog_is_rejected() {
        assert_invalid("[resize]\ntarget = 1000", "not in resize.catalog");
    }

    #[test]
    fn unknown_supported_format_is_rejected() {
        assert_invalid(
            "[limits]\nsupported_formats = [\"png\", \"unknown\"]",
            "supported_formats",
        );
    }

    #[test]
    fn empty_supported_formats_is_rejected() {
        assert_invalid("[limits]\nsupported_formats = []", "must not be empty");
    }

    #[test]
    fn zero_file_size_is_rejected() {
        assert_invalid("[limits]\nmax_file_size = 0", "max_file_size");
    }

    #[test]
    fn unsupported_format_name_is_a_parse_error() {
        let result = load_config_str("[limits]\nsupported_formats = [\"gif\"]");
        assert!(matches!(result, Err(ConfigError::Toml(_))));
    }

    #[test]
    fn unsupported_output_format_is_a_parse_error() {
        let result = load_config_str("[output]\nformat = \"avif\"");
        assert!(matches!(result, Err(ConfigError::Toml(_))));
    }

    // =========================================================================
    // Unknown key rejection
    // =========================================================================

    #[test]
    fn unknown_key_rejected() {
        let result = load_config_str("[output]\nqualty = 90");
        let err = result.unwrap_err().to_string();
        assert!(err.contains("unknown field"), "{err}");
    }

    #[test]
    fn unknown_section_rejected() {
        assert!(load_config_str("[outputs]\nquality = 90").is_err());
    }

    // =========================================================================
    // load_config
    // =========================================================================

    #[test]
    fn load_config_returns_default_when_no_file() {
        let tmp = TempDir::new().unwrap();
        let config = load_config(&tmp.path().join(DEFAULT_CONFIG_FILE)).unwrap();
        assert_eq!(config, ConverterConfig::default());
    }

    #[test]
    fn load_config_reads_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(DEFAULT_CONFIG_FILE);
        fs::write(
            &path,
            r#"
[rate_limit]
max_admissions = 5
"#,
        )
        .unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.rate_limit.max_admissions, 5);
        assert_eq!(config.rate_limit.window_ms, 60_000);
    }

    #[test]
    fn load_config_invalid_toml_is_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(DEFAULT_CONFIG_FILE);
        fs::write(&path, "this is not valid toml [[[").unwrap();
        assert!(matches!(load_config(&path), Err(ConfigError::Toml(_))));
    }

    // =========================================================================
    // merge_toml
    // =========================================================================

    #[test]
    fn merge_toml_table_merge() {
        let base: toml::Value = toml::from_str(
            r#"
[output]
format = "webp"
quality = 90
"#,
        )
        .unwrap();
        let overlay: toml::Value = toml::from_str("[output]\nquality = 70").unwrap();
        let merged = merge_toml(base, overlay);
        let output = merged.get("output").unwrap();
        assert_eq!(output.get("quality").unwrap().as_integer(), Some(70));
        assert_eq!(output.get("format").unwrap().as_str(), Some("webp"));
    }

    #[test]
    fn merge_toml_array_replaces() {
        let base: toml::Value = toml::from_str("catalog = [1, 2, 3]").unwrap();
        let overlay: toml::Value = toml::from_str("catalog = [9]").unwrap();
        let merged = merge_toml(base, overlay);
        assert_eq!(merged.get("catalog").unwrap().as_array().unwrap().len(), 1);
    }

    #[test]
    fn stock_defaults_omit_resize_target() {
        let value = stock_defaults_value().unwrap();
        assert!(value.get("resize").unwrap().get("target").is_none());
    }

    // =========================================================================
    // Stock config
    // =========================================================================

    #[test]
    fn stock_config_toml_is_valid_and_matches_defaults() {
        let config: ConverterConfig = toml::from_str(stock_config_toml()).unwrap();
        config.validate().unwrap();
        assert_eq!(config, ConverterConfig::default());
    }

    #[test]
    fn converter_uses_configured_policy() {
        use crate::imaging::RustBackend;
        let config = load_config_str("[rate_limit]\nmax_admissions = 3").unwrap();
        let converter = config.converter(RustBackend::new());
        assert_eq!(converter.rate_limiter().policy().max_admissions, 3);
        assert_eq!(converter.limits(), &config.limits());
    }
}
