//! Image backend trait and shared types.
//!
//! The [`ImageBackend`] trait is the host-supplied pixel capability: it can
//! read an image's dimensions from its header and turn source bytes into
//! encoded output bytes at a given size, format and quality. The rest of the
//! crate never touches pixels directly.
//!
//! The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend), built on the `image`
//! crate. Tests use the `MockBackend` from this module.

use super::params::EncodeParams;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Decode failed: {0}")]
    Decode(String),
    #[error("Encode failed: {0}")]
    Encode(String),
}

/// Result of an identify operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

/// Trait for image backends.
pub trait ImageBackend {
    /// Read image dimensions without decoding pixel data.
    fn identify(&self, bytes: &[u8]) -> Result<Dimensions, BackendError>;

    /// Decode the source, draw it onto a surface of the requested size and
    /// encode that surface in the requested format.
    fn convert(&self, params: &EncodeParams) -> Result<Vec<u8>, BackendError>;
}

impl<B: ImageBackend + ?Sized> ImageBackend for &B {
    fn identify(&self, bytes: &[u8]) -> Result<Dimensions, BackendError> {
        (**self).identify(bytes)
    }

    fn convert(&self, params: &EncodeParams) -> Result<Vec<u8>, BackendError> {
        (**self).convert(params)
    }
}
