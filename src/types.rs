//! Shared value types passed between the guard chain, the orchestrator and
//! the host.

use crate::imaging::{OutputFormat, Quality, ResizeSpec};
use serde::Serialize;
use std::sync::Arc;

/// An uploaded file, as handed over by the host.
///
/// The bytes are shared (`Arc<[u8]>`), so retaining a file for later
/// regeneration or cloning it into a request is cheap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputFile {
    name: String,
    declared_len: u64,
    last_modified: u64,
    bytes: Arc<[u8]>,
}

impl InputFile {
    /// Build a file whose declared length is the buffer length.
    pub fn new(name: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        let bytes = bytes.into();
        Self {
            name: name.into(),
            declared_len: bytes.len() as u64,
            last_modified: 0,
            bytes,
        }
    }

    /// Override the length the host reported for this file.
    pub fn with_declared_len(mut self, len: u64) -> Self {
        self.declared_len = len;
        self
    }

    /// Last-modified time in milliseconds since the Unix epoch.
    pub fn with_last_modified(mut self, millis: u64) -> Self {
        self.last_modified = millis;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn shared_bytes(&self) -> Arc<[u8]> {
        Arc::clone(&self.bytes)
    }

    pub fn byte_len(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn declared_len(&self) -> u64 {
        self.declared_len
    }

    pub fn last_modified(&self) -> u64 {
        self.last_modified
    }

    /// Same name, declared size and modification time.
    pub fn same_identity(&self, other: &InputFile) -> bool {
        self.name == other.name
            && self.declared_len == other.declared_len
            && self.last_modified == other.last_modified
    }
}

/// Batch-wide conversion choices: the template every request is built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConversionSettings {
    pub format: OutputFormat,
    pub quality: Quality,
    pub resize: ResizeSpec,
}

/// One conversion attempt for one file.
#[derive(Debug, Clone)]
pub struct ConversionRequest {
    pub file: InputFile,
    pub settings: ConversionSettings,
}

/// Encoded output of one successful conversion.
#[derive(Debug, Clone, Serialize)]
pub struct ConversionResult {
    #[serde(skip)]
    pub bytes: Arc<[u8]>,
    pub width: u32,
    pub height: u32,
    pub mime: &'static str,
    /// Summary of the source: size, type and dimensions.
    pub source_descriptor: String,
}
