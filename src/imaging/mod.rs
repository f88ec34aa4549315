//! Image processing in pure Rust, with no system libraries.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Identify** | `image::ImageReader::into_dimensions` |
//! | **Resize math** | [`calculate_resize`] (pure) |
//! | **Decode → draw → encode** | `image` crate, Lanczos3 |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for dimension math (unit testable)
//! - **Parameters**: Data structures describing conversions
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`]

pub mod backend;
mod calculations;
mod params;
pub mod rust_backend;

pub use backend::{BackendError, Dimensions, ImageBackend};
pub use calculations::{ResizeCatalog, ResizeSpec, calculate_resize};
pub use params::{EncodeParams, OutputFormat, Quality};
pub use rust_backend::RustBackend;
