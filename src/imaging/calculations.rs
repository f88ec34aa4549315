//! Pure calculation functions for output dimensions.
//!
//! All functions here are pure and testable without any I/O or images.

/// Requested output size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResizeSpec {
    /// Keep the source dimensions.
    #[default]
    Original,
    /// Bound the longer edge to `n` pixels (never upscales).
    MaxDimension(u32),
}

impl ResizeSpec {
    /// Leniently interpret a user-supplied size.
    ///
    /// - `"1024"` → `MaxDimension(1024)`
    /// - `"original"`, `""`, `"0"`, `"-100"`, `"invalid"` → `Original`
    pub fn parse(raw: &str) -> Self {
        match raw.trim().parse::<u32>() {
            Ok(n) if n > 0 => Self::MaxDimension(n),
            _ => Self::Original,
        }
    }

    /// The bound in pixels, if this spec actually resizes.
    pub fn max_dimension(self) -> Option<u32> {
        match self {
            Self::MaxDimension(n) if n > 0 => Some(n),
            _ => None,
        }
    }
}

/// Ordered list of size bounds a user may pick from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResizeCatalog(Vec<u32>);

impl ResizeCatalog {
    pub fn new(mut sizes: Vec<u32>) -> Self {
        sizes.retain(|&n| n > 0);
        sizes.sort_unstable();
        sizes.dedup();
        Self(sizes)
    }

    pub fn sizes(&self) -> &[u32] {
        &self.0
    }

    pub fn contains(&self, size: u32) -> bool {
        self.0.binary_search(&size).is_ok()
    }

    /// Resolve a user selection against the catalog.
    ///
    /// Returns `None` when the selection names a size the catalog does not
    /// offer; anything [`ResizeSpec::parse`] reads as `Original` is accepted.
    pub fn select(&self, raw: &str) -> Option<ResizeSpec> {
        match ResizeSpec::parse(raw) {
            ResizeSpec::Original => Some(ResizeSpec::Original),
            ResizeSpec::MaxDimension(n) if self.contains(n) => Some(ResizeSpec::MaxDimension(n)),
            ResizeSpec::MaxDimension(_) => None,
        }
    }
}

impl Default for ResizeCatalog {
    fn default() -> Self {
        Self(vec![
            16, 32, 48, 64, 128, 256, 320, 512, 640, 800, 1024, 1280, 1920, 2048, 2560, 4096,
        ])
    }
}

/// Calculate output dimensions for a source image and a resize spec.
///
/// The longer edge is set to exactly `n`; the shorter edge is scaled by the
/// same factor and rounded half-up. Sources already within the bound, and
/// specs that do not resize, return the source dimensions unchanged.
///
/// # Examples
/// ```
/// # use pixelgate::imaging::{ResizeSpec, calculate_resize};
/// assert_eq!(calculate_resize(2000, 1000, ResizeSpec::MaxDimension(1024)), (1024, 512));
/// assert_eq!(calculate_resize(800, 600, ResizeSpec::MaxDimension(1024)), (800, 600));
/// ```
pub fn calculate_resize(width: u32, height: u32, spec: ResizeSpec) -> (u32, u32) {
    let Some(bound) = spec.max_dimension() else {
        return (width, height);
    };
    if width == 0 || height == 0 {
        return (width, height);
    }

    let longest = width.max(height);
    if longest <= bound {
        return (width, height);
    }

    let scale = bound as f64 / longest as f64;
    let scaled = |side: u32| ((side as f64 * scale).round() as u32).max(1);

    if width >= height {
        // Landscape or square
        (bound, scaled(height))
    } else {
        // Portrait
        (scaled(width), bound)
    }
}
