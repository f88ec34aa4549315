//! Conversion orchestrator.
//!
//! [`Converter`] drives a batch of uploads through the pipeline, strictly
//! one file at a time and in input order:
//!
//! ```text
//! rate window ─▶ size ─▶ sniff/format ─▶ probe ─▶ dimensions ─▶ reserve
//!     ─▶ resize math ─▶ decode/draw/encode ─▶ handle ─▶ checksum (async)
//! ```
//!
//! A rejected or failing file becomes a `Skipped` outcome plus a notice and
//! the batch moves on. The only thing that stops a batch is the rate
//! limiter: the remaining file names are reported as unprocessed, with a
//! single notice for the whole batch. Checksums are submitted and never
//! awaited here; each [`ConvertedFile`] carries its own record.
//!
//! Files that converted successfully are retained (de-duplicated by name,
//! declared size and modification time) so [`Converter::regenerate`] can
//! run them again with different settings until [`Converter::clear`].

use crate::guard::{self, Limits, ValidationError};
use crate::handles::{HandleRegistry, ManagedHandle};
use crate::imaging::{BackendError, Dimensions, EncodeParams, ImageBackend, calculate_resize};
use crate::integrity::{ChecksumRecord, Integrity};
use crate::naming::{create_file_name_data, describe, display_label, download_file_name};
use crate::rate_limit::{RateLimiter, RatePolicy};
use crate::sniff::{SniffedFormat, sniff};
use crate::types::{ConversionRequest, ConversionResult, ConversionSettings, InputFile};
use log::{debug, info};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;

/// A file passed the guards but the backend could not handle it.
#[derive(Error, Debug)]
pub enum ConvertError {
    #[error("could not read image: {0}")]
    Probe(BackendError),
    #[error("could not encode image: {0}")]
    Encode(BackendError),
}

#[derive(Debug)]
pub enum SkipReason {
    Rejected(ValidationError),
    Failed(ConvertError),
}

impl SkipReason {
    /// Text shown to the user. Backend failures stay generic.
    pub fn summary(&self) -> String {
        match self {
            SkipReason::Rejected(e) => e.to_string(),
            SkipReason::Failed(_) => "Conversion failed".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeKind {
    Skipped,
    Failed,
    RateLimited,
    Summary,
}

/// One human-readable message for the host to announce.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub kind: NoticeKind,
    pub message: String,
}

impl Notice {
    fn new(kind: NoticeKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

#[derive(Debug)]
pub struct ConvertedFile {
    pub source_name: String,
    pub display_name: String,
    /// Display name plus the quality label for lossy formats.
    pub label: String,
    pub download_file_name: String,
    pub handle: ManagedHandle,
    pub result: ConversionResult,
    /// Summary of the output: size, type and dimensions.
    pub converted_descriptor: String,
    pub checksum: ChecksumRecord,
}

#[derive(Debug)]
pub struct SkippedFile {
    pub name: String,
    pub reason: SkipReason,
}

#[derive(Debug)]
pub enum FileOutcome {
    Converted(Box<ConvertedFile>),
    Skipped(SkippedFile),
}

/// Everything a batch produced, in input order.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub outcomes: Vec<FileOutcome>,
    pub notices: Vec<Notice>,
    /// Files never looked at because the rate window was full.
    pub unprocessed: Vec<String>,
    pub rate_limited: bool,
}

impl BatchReport {
    pub fn converted(&self) -> impl Iterator<Item = &ConvertedFile> {
        self.outcomes.iter().filter_map(|o| match o {
            FileOutcome::Converted(c) => Some(c.as_ref()),
            FileOutcome::Skipped(_) => None,
        })
    }

    pub fn skipped(&self) -> impl Iterator<Item = &SkippedFile> {
        self.outcomes.iter().filter_map(|o| match o {
            FileOutcome::Skipped(s) => Some(s),
            FileOutcome::Converted(_) => None,
        })
    }
}

/// What `inspect` learned about one file without converting it.
#[derive(Debug)]
pub struct Inspection {
    pub name: String,
    pub byte_len: u64,
    pub sniffed: SniffedFormat,
    pub verdict: Result<Dimensions, SkipReason>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pass {
    Upload,
    Regenerate,
}

enum Step {
    Done(FileOutcome),
    RateLimited,
}

pub struct Converter<B: ImageBackend> {
    backend: B,
    limits: Limits,
    limiter: Arc<RateLimiter>,
    integrity: Integrity,
    handles: HandleRegistry,
    retained: Vec<InputFile>,
}

impl<B: ImageBackend> Converter<B> {
    /// A converter with default limits, its own rate limiter and checksums on.
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            limits: Limits::default(),
            limiter: Arc::new(RateLimiter::new(RatePolicy::default())),
            integrity: Integrity::new(),
            handles: HandleRegistry::new(),
            retained: Vec::new(),
        }
    }

    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    /// Share a limiter with other converters.
    pub fn with_rate_limiter(mut self, limiter: Arc<RateLimiter>) -> Self {
        self.limiter = limiter;
        self
    }

    pub fn with_integrity(mut self, integrity: Integrity) -> Self {
        self.integrity = integrity;
        self
    }

    pub fn limits(&self) -> &Limits {
        &self.limits
    }

    pub fn rate_limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    pub fn handles(&self) -> &HandleRegistry {
        &self.handles
    }

    pub fn retained(&self) -> &[InputFile] {
        &self.retained
    }

    /// Convert `files` in order with the same settings.
    pub fn convert_batch(&mut self, files: &[InputFile], settings: &ConversionSettings) -> BatchReport {
        self.run(files, settings, Pass::Upload)
    }

    /// Run every retained file through the pipeline again with new settings.
    ///
    /// Previous outputs stay live; regenerated files are not retained twice.
    pub fn regenerate(&mut self, settings: &ConversionSettings) -> BatchReport {
        let files = self.retained.clone();
        let mut report = self.run(&files, settings, Pass::Regenerate);
        let count = report.converted().count();
        if count > 0 {
            let noun = if count == 1 { "image" } else { "images" };
            let message = if settings.format.accepts_quality() {
                format!(
                    "Regenerated {count} {noun} at {}% quality.",
                    settings.quality.value()
                )
            } else {
                format!("Regenerated {count} {noun}.")
            };
            report.notices.push(Notice::new(NoticeKind::Summary, message));
        }
        report
    }

    /// Release every live handle and forget retained files.
    pub fn clear(&mut self) -> Notice {
        let released = self.handles.release_all();
        let forgotten = self.retained.len();
        self.retained.clear();
        debug!("Cleared {released} handle(s) and {forgotten} retained file(s)");
        Notice::new(NoticeKind::Summary, "Cleared converted images.")
    }

    /// The host removed the element showing `handle`.
    pub fn detach(&mut self, handle: ManagedHandle) -> bool {
        self.handles.detached(handle)
    }

    /// Run the guards and the dimension probe without converting or
    /// touching the rate window.
    pub fn inspect(&self, file: &InputFile) -> Inspection {
        let sniffed = sniff(file.bytes());
        Inspection {
            name: file.name().to_string(),
            byte_len: file.byte_len(),
            sniffed,
            verdict: self.admit(file, sniffed),
        }
    }

    fn run(&mut self, files: &[InputFile], settings: &ConversionSettings, pass: Pass) -> BatchReport {
        let mut report = BatchReport::default();

        for (index, file) in files.iter().enumerate() {
            let request = ConversionRequest {
                file: file.clone(),
                settings: *settings,
            };
            match self.process(&request, pass) {
                Step::Done(outcome) => {
                    if let FileOutcome::Skipped(s) = &outcome {
                        report.notices.push(skip_notice(s, pass));
                    } else if pass == Pass::Upload {
                        self.retain(file);
                    }
                    report.outcomes.push(outcome);
                }
                Step::RateLimited => {
                    report.unprocessed = files[index..]
                        .iter()
                        .map(|f| f.name().to_string())
                        .collect();
                    report.rate_limited = true;
                    report
                        .notices
                        .push(self.rate_limit_notice(report.unprocessed.len()));
                    break;
                }
            }
        }

        report
    }

    fn process(&mut self, request: &ConversionRequest, pass: Pass) -> Step {
        let file = &request.file;
        let settings = request.settings;

        if !self.limiter.has_capacity(Instant::now()) {
            return Step::RateLimited;
        }

        let sniffed = sniff(file.bytes());
        let dimensions = match self.admit(file, sniffed) {
            Ok(dimensions) => dimensions,
            Err(reason) => return Step::Done(skipped(file, reason)),
        };

        if !self.limiter.reserve(Instant::now()) {
            return Step::RateLimited;
        }

        let (width, height) = calculate_resize(dimensions.width, dimensions.height, settings.resize);
        debug!(
            "{}: {}x{} -> {}x{} {}",
            file.name(),
            dimensions.width,
            dimensions.height,
            width,
            height,
            settings.format
        );

        let params = EncodeParams {
            source: file.shared_bytes(),
            width,
            height,
            format: settings.format,
            quality: settings.quality,
        };
        let encoded = match self.backend.convert(&params) {
            Ok(bytes) => bytes,
            Err(e) => {
                return Step::Done(skipped(file, SkipReason::Failed(ConvertError::Encode(e))));
            }
        };

        let bytes: Arc<[u8]> = Arc::from(encoded);
        let mime = settings.format.mime();
        let source_mime = sniffed.mime().unwrap_or("application/octet-stream");
        let result = ConversionResult {
            bytes: Arc::clone(&bytes),
            width,
            height,
            mime,
            source_descriptor: describe(file.byte_len(), source_mime, dimensions.width, dimensions.height),
        };

        let handle = self.handles.register(Arc::clone(&bytes));
        let checksum = self.integrity.compute_digest(Arc::clone(&bytes));

        let names = create_file_name_data(file.name());
        let converted = ConvertedFile {
            source_name: file.name().to_string(),
            label: display_label(&names.display_name, settings.format, settings.quality),
            download_file_name: download_file_name(
                &names.download_stem,
                settings.format,
                settings.quality,
                settings.resize,
            ),
            display_name: names.display_name,
            handle,
            converted_descriptor: describe(bytes.len() as u64, mime, width, height),
            result,
            checksum,
        };

        let verb = match pass {
            Pass::Upload => "Converted",
            Pass::Regenerate => "Regenerated",
        };
        info!(
            "{verb} {} -> {} ({})",
            file.name(),
            converted.download_file_name,
            converted.handle
        );
        Step::Done(FileOutcome::Converted(Box::new(converted)))
    }

    /// Size and format guards, the dimension probe, then the dimension guard.
    fn admit(&self, file: &InputFile, sniffed: SniffedFormat) -> Result<Dimensions, SkipReason> {
        guard::check_size(file, &self.limits).map_err(SkipReason::Rejected)?;
        guard::check_format(sniffed, &self.limits).map_err(SkipReason::Rejected)?;
        let dimensions = self
            .backend
            .identify(file.bytes())
            .map_err(|e| SkipReason::Failed(ConvertError::Probe(e)))?;
        guard::check_dimensions(dimensions, &self.limits).map_err(SkipReason::Rejected)?;
        Ok(dimensions)
    }

    fn retain(&mut self, file: &InputFile) {
        if !self.retained.iter().any(|kept| kept.same_identity(file)) {
            self.retained.push(file.clone());
        }
    }

    fn rate_limit_notice(&self, remaining: usize) -> Notice {
        let policy = self.limiter.policy();
        Notice::new(
            NoticeKind::RateLimited,
            format!(
                "Rate limit reached: at most {} conversions per {} s. {} file(s) not processed.",
                policy.max_admissions,
                policy.window.as_secs(),
                remaining
            ),
        )
    }
}

fn skipped(file: &InputFile, reason: SkipReason) -> FileOutcome {
    debug!("{} skipped: {:?}", file.name(), reason);
    FileOutcome::Skipped(SkippedFile {
        name: file.name().to_string(),
        reason,
    })
}

fn skip_notice(skipped: &SkippedFile, pass: Pass) -> Notice {
    let name = &skipped.name;
    match (&skipped.reason, pass) {
        (SkipReason::Rejected(e), Pass::Upload) => Notice::new(
            NoticeKind::Skipped,
            format!("{name} skipped ({}).", lower_first(&e.to_string())),
        ),
        (SkipReason::Rejected(e), Pass::Regenerate) => Notice::new(
            NoticeKind::Skipped,
            format!(
                "{name} skipped during regenerate ({}).",
                lower_first(&e.to_string())
            ),
        ),
        (SkipReason::Failed(_), Pass::Upload) => Notice::new(
            NoticeKind::Failed,
            format!("Something went wrong converting {name}."),
        ),
        (SkipReason::Failed(_), Pass::Regenerate) => {
            Notice::new(NoticeKind::Failed, format!("Failed to regenerate {name}."))
        }
    }
}

fn lower_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::backend::tests::{MockBackend, RecordedOp};
    use crate::imaging::{OutputFormat, Quality, ResizeSpec};
    use crate::integrity::ChecksumStatus;
    use std::time::Duration;

    const PNG_SIGNATURE: [u8; 8] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];

    fn png(name: &str) -> InputFile {
        let mut bytes = PNG_SIGNATURE.to_vec();
        bytes.extend_from_slice(&[0, 0, 0, 13, b'I', b'H', b'D', b'R']);
        bytes.extend_from_slice(name.as_bytes());
        InputFile::new(name, bytes)
    }

    fn jpeg(name: &str) -> InputFile {
        let mut bytes = vec![0xFF, 0xD8, 0xFF, 0xE0, 0, 16];
        bytes.extend_from_slice(name.as_bytes());
        InputFile::new(name, bytes)
    }

    fn webp_q(quality: u32) -> ConversionSettings {
        ConversionSettings {
            format: OutputFormat::WebP,
            quality: Quality::new(quality),
            resize: ResizeSpec::Original,
        }
    }

    fn limited(max: usize) -> Arc<RateLimiter> {
        Arc::new(RateLimiter::new(RatePolicy::new(max, Duration::from_secs(60))))
    }

    fn converter(backend: MockBackend) -> Converter<MockBackend> {
        Converter::new(backend).with_integrity(Integrity::unavailable())
    }

    fn only_converted(report: &BatchReport) -> &ConvertedFile {
        let converted: Vec<_> = report.converted().collect();
        assert_eq!(converted.len(), 1);
        converted[0]
    }

    // =========================================================================
    // Happy path
    // =========================================================================

    #[test]
    fn converts_one_file_with_names_and_descriptors() {
        let mut converter = converter(MockBackend::with_dimensions(800, 600));
        let report = converter.convert_batch(&[png("Holiday Photo.PNG")], &webp_q(90));

        let converted = only_converted(&report);
        assert_eq!(converted.display_name, "Holiday Photo");
        assert_eq!(converted.label, "Holiday Photo (Quality 90%)");
        assert_eq!(converted.download_file_name, "holiday-photo-q90.webp");
        assert_eq!(converted.result.mime, "image/webp");
        assert_eq!((converted.result.width, converted.result.height), (800, 600));
        assert!(converted.result.source_descriptor.ends_with("image/png • 800 × 600"));
        assert!(converted.converted_descriptor.ends_with("image/webp • 800 × 600"));
        assert_eq!(&*converted.result.bytes, b"800x600.webp");
        assert!(report.notices.is_empty());
        assert!(!report.rate_limited);
    }

    #[test]
    fn resize_flows_into_backend_and_file_name() {
        let backend = MockBackend::with_dimensions(2000, 1000);
        let mut converter = converter(backend);
        let settings = ConversionSettings {
            format: OutputFormat::Jpeg,
            quality: Quality::new(75),
            resize: ResizeSpec::MaxDimension(1024),
        };
        let report = converter.convert_batch(&[png("wide.png")], &settings);

        let converted = only_converted(&report);
        assert_eq!(converted.download_file_name, "wide-q75-1024px.jpg");
        assert_eq!((converted.result.width, converted.result.height), (1024, 512));
        assert_eq!(
            converter.backend.get_operations().last(),
            Some(&RecordedOp::Convert {
                width: 1024,
                height: 512,
                format: OutputFormat::Jpeg,
                quality: 75,
            })
        );
    }

    #[test]
    fn png_output_carries_no_quality() {
        let mut converter = converter(MockBackend::with_dimensions(10, 10));
        let settings = ConversionSettings {
            format: OutputFormat::Png,
            ..webp_q(40)
        };
        let report = converter.convert_batch(&[jpeg("a.jpg")], &settings);
        let converted = only_converted(&report);
        assert_eq!(converted.label, "a");
        assert_eq!(converted.download_file_name, "a.png");
    }

    #[test]
    fn each_conversion_registers_a_live_handle() {
        let mut converter = converter(MockBackend::with_dimensions(10, 10));
        let report = converter.convert_batch(&[png("a.png"), png("b.png")], &webp_q(90));
        let handles: Vec<_> = report.converted().map(|c| c.handle).collect();
        assert_eq!(handles.len(), 2);
        assert_ne!(handles[0], handles[1]);
        assert_eq!(converter.handles().live_count(), 2);
        let bytes = converter.handles().resolve(handles[0]).unwrap();
        assert_eq!(&*bytes, b"10x10.webp");
    }

    #[test]
    fn checksum_is_submitted_for_each_result() {
        let mut converter =
            Converter::new(MockBackend::with_dimensions(4, 4)).with_integrity(Integrity::new());
        let report = converter.convert_batch(&[png("a.png")], &webp_q(90));
        let converted = only_converted(&report);
        let expected = crate::integrity::sha256_hex(&converted.result.bytes);
        assert_eq!(
            converted.checksum.wait(Duration::from_secs(5)),
            ChecksumStatus::Ready(expected)
        );
    }

    #[test]
    fn missing_integrity_degrades_only_the_checksum() {
        let mut converter = converter(MockBackend::with_dimensions(4, 4));
        let report = converter.convert_batch(&[png("a.png")], &webp_q(90));
        let converted = only_converted(&report);
        assert_eq!(converted.checksum.status(), ChecksumStatus::Unavailable);
    }

    // =========================================================================
    // Skips
    // =========================================================================

    #[test]
    fn spoofed_file_is_skipped_without_probing() {
        let mut converter = converter(MockBackend::with_dimensions(10, 10));
        let spoofed = InputFile::new("cat.png", b"GIF89a not really a png".to_vec());
        let report = converter.convert_batch(&[spoofed, png("ok.png")], &webp_q(90));

        assert_eq!(report.outcomes.len(), 2);
        let skipped: Vec<_> = report.skipped().collect();
        assert_eq!(skipped.len(), 1);
        assert!(matches!(
            skipped[0].reason,
            SkipReason::Rejected(ValidationError::UnsupportedFormat { .. })
        ));
        assert_eq!(
            report.notices,
            vec![Notice::new(
                NoticeKind::Skipped,
                "cat.png skipped (unsupported or spoofed format)."
            )]
        );
        // Only the real PNG reached the backend
        let identifies = converter
            .backend
            .get_operations()
            .iter()
            .filter(|op| matches!(op, RecordedOp::Identify(_)))
            .count();
        assert_eq!(identifies, 1);
    }

    #[test]
    fn oversize_file_is_skipped_with_limit_in_notice() {
        let limits = Limits {
            max_file_size: 8,
            ..Limits::default()
        };
        let mut converter = converter(MockBackend::with_dimensions(10, 10)).with_limits(limits);
        let report = converter.convert_batch(&[png("big.png")], &webp_q(90));
        assert_eq!(report.converted().count(), 0);
        assert_eq!(report.notices[0].message, "big.png skipped (file size exceeds 8 B).");
    }

    #[test]
    fn probe_failure_is_a_generic_failure() {
        let mut converter = converter(MockBackend::default());
        let report = converter.convert_batch(&[png("broken.png")], &webp_q(90));
        let skipped: Vec<_> = report.skipped().collect();
        assert!(matches!(
            skipped[0].reason,
            SkipReason::Failed(ConvertError::Probe(_))
        ));
        assert_eq!(skipped[0].reason.summary(), "Conversion failed");
        assert_eq!(
            report.notices[0],
            Notice::new(
                NoticeKind::Failed,
                "Something went wrong converting broken.png."
            )
        );
    }

    #[test]
    fn oversized_dimensions_are_rejected_after_probe() {
        let mut converter = converter(MockBackend::with_dimensions(30_000, 10));
        let report = converter.convert_batch(&[png("huge.png")], &webp_q(90));
        assert!(matches!(
            report.skipped().next().unwrap().reason,
            SkipReason::Rejected(ValidationError::DimensionTooLarge { limit: 20_000 })
        ));
        assert_eq!(
            report.notices[0].message,
            "huge.png skipped (dimensions exceed 20,000px)."
        );
    }

    #[test]
    fn encode_failure_skips_and_batch_continues() {
        let mut converter = converter(MockBackend::failing_convert(10, 10));
        let report = converter.convert_batch(&[png("a.png"), png("b.png")], &webp_q(90));
        assert_eq!(report.outcomes.len(), 2);
        assert_eq!(report.skipped().count(), 2);
        assert_eq!(report.notices.len(), 2);
        assert_eq!(converter.handles().live_count(), 0);
        assert!(converter.retained().is_empty());
    }

    #[test]
    fn rejected_files_do_not_consume_rate_slots() {
        let limiter = limited(1);
        let mut converter = converter(MockBackend::with_dimensions(10, 10))
            .with_rate_limiter(Arc::clone(&limiter));
        let spoofed = InputFile::new("x.png", b"plain text".to_vec());
        let report = converter.convert_batch(&[spoofed, png("ok.png")], &webp_q(90));
        assert_eq!(report.converted().count(), 1);
        assert!(!report.rate_limited);
        assert_eq!(limiter.in_window(Instant::now()), 1);
    }

    // =========================================================================
    // Rate limiting
    // =========================================================================

    #[test]
    fn batch_stops_when_window_is_full() {
        let mut converter =
            converter(MockBackend::with_dimensions(10, 10)).with_rate_limiter(limited(15));
        let files: Vec<_> = (0..16).map(|i| png(&format!("img-{i}.png"))).collect();
        let report = converter.convert_batch(&files, &webp_q(90));

        assert_eq!(report.converted().count(), 15);
        assert_eq!(report.outcomes.len(), 15);
        assert!(report.rate_limited);
        assert_eq!(report.unprocessed, vec!["img-15.png".to_string()]);
        let rate_notices: Vec<_> = report
            .notices
            .iter()
            .filter(|n| n.kind == NoticeKind::RateLimited)
            .collect();
        assert_eq!(rate_notices.len(), 1);
        assert_eq!(
            rate_notices[0].message,
            "Rate limit reached: at most 15 conversions per 60 s. 1 file(s) not processed."
        );
    }

    #[test]
    fn exhausted_limiter_processes_nothing() {
        let limiter = limited(2);
        limiter.reserve(Instant::now());
        limiter.reserve(Instant::now());
        let mut converter =
            converter(MockBackend::with_dimensions(10, 10)).with_rate_limiter(limiter);
        let report = converter.convert_batch(&[png("a.png"), png("b.png")], &webp_q(90));
        assert!(report.outcomes.is_empty());
        assert_eq!(report.unprocessed.len(), 2);
        assert_eq!(report.notices.len(), 1);
        assert!(converter.backend.get_operations().is_empty());
    }

    #[test]
    fn shared_limiter_spans_converters() {
        let limiter = limited(3);
        let mut first = converter(MockBackend::with_dimensions(10, 10))
            .with_rate_limiter(Arc::clone(&limiter));
        let mut second = converter(MockBackend::with_dimensions(10, 10))
            .with_rate_limiter(Arc::clone(&limiter));
        assert_eq!(
            first
                .convert_batch(&[png("a.png"), png("b.png")], &webp_q(90))
                .converted()
                .count(),
            2
        );
        let report = second.convert_batch(&[png("c.png"), png("d.png")], &webp_q(90));
        assert_eq!(report.converted().count(), 1);
        assert_eq!(report.unprocessed, vec!["d.png".to_string()]);
    }

    // =========================================================================
    // Retention, regenerate, clear, detach
    // =========================================================================

    #[test]
    fn successful_files_are_retained_once() {
        let mut converter = converter(MockBackend::with_dimensions(10, 10));
        let a = png("a.png").with_last_modified(5);
        converter.convert_batch(&[a.clone(), a.clone()], &webp_q(90));
        converter.convert_batch(&[a], &webp_q(50));
        assert_eq!(converter.retained().len(), 1);
    }

    #[test]
    fn touched_file_is_retained_separately() {
        let mut converter = converter(MockBackend::with_dimensions(10, 10));
        converter.convert_batch(
            &[png("a.png").with_last_modified(1), png("a.png").with_last_modified(2)],
            &webp_q(90),
        );
        assert_eq!(converter.retained().len(), 2);
    }

    #[test]
    fn regenerate_reruns_retained_files_with_new_settings() {
        let mut converter = converter(MockBackend::with_dimensions(10, 10));
        converter.convert_batch(&[png("a.png"), png("b.png")], &webp_q(90));
        let report = converter.regenerate(&webp_q(60));

        let names: Vec<_> = report
            .converted()
            .map(|c| c.download_file_name.as_str())
            .collect();
        assert_eq!(names, vec!["a-q60.webp", "b-q60.webp"]);
        assert_eq!(
            report.notices.last().unwrap().message,
            "Regenerated 2 images at 60% quality."
        );
        assert_eq!(converter.retained().len(), 2);
        assert_eq!(converter.handles().live_count(), 4);
    }

    #[test]
    fn regenerate_summary_for_lossless_output() {
        let mut converter = converter(MockBackend::with_dimensions(10, 10));
        converter.convert_batch(&[png("a.png")], &webp_q(90));
        let settings = ConversionSettings {
            format: OutputFormat::Png,
            ..webp_q(90)
        };
        let report = converter.regenerate(&settings);
        assert_eq!(report.notices[0].message, "Regenerated 1 image.");
    }

    #[test]
    fn regenerate_goes_through_the_rate_limiter() {
        let limiter = limited(2);
        let mut converter = converter(MockBackend::with_dimensions(10, 10))
            .with_rate_limiter(Arc::clone(&limiter));
        converter.convert_batch(&[png("a.png")], &webp_q(90));
        let report = converter.regenerate(&webp_q(50));
        assert_eq!(report.converted().count(), 1);
        let report = converter.regenerate(&webp_q(40));
        assert!(report.rate_limited);
        assert_eq!(report.notices.len(), 1);
        assert_eq!(report.notices[0].kind, NoticeKind::RateLimited);
    }

    #[test]
    fn regenerate_with_nothing_retained_is_empty() {
        let mut converter = converter(MockBackend::with_dimensions(10, 10));
        let report = converter.regenerate(&webp_q(90));
        assert!(report.outcomes.is_empty());
        assert!(report.notices.is_empty());
    }

    #[test]
    fn regenerate_failure_uses_regenerate_wording() {
        let mut converter = converter(MockBackend::with_dimensions(10, 10));
        converter.convert_batch(&[png("a.png")], &webp_q(90));
        converter.limits.max_file_size = 4;
        let report = converter.regenerate(&webp_q(90));
        assert_eq!(
            report.notices[0].message,
            "a.png skipped during regenerate (file size exceeds 4 B)."
        );
    }

    #[test]
    fn clear_releases_handles_and_retained_files() {
        let mut converter = converter(MockBackend::with_dimensions(10, 10));
        let report = converter.convert_batch(&[png("a.png"), png("b.png")], &webp_q(90));
        let notice = converter.clear();
        assert_eq!(notice.message, "Cleared converted images.");
        assert_eq!(converter.handles().live_count(), 0);
        assert!(converter.retained().is_empty());
        for converted in report.converted() {
            assert!(converter.handles().resolve(converted.handle).is_none());
        }
    }

    #[test]
    fn detach_releases_exactly_once() {
        let mut converter = converter(MockBackend::with_dimensions(10, 10));
        let report = converter.convert_batch(&[png("a.png")], &webp_q(90));
        let handle = only_converted(&report).handle;
        assert!(converter.detach(handle));
        assert!(!converter.detach(handle));
        converter.clear();
        assert_eq!(converter.handles().live_count(), 0);
    }

    // =========================================================================
    // Inspect
    // =========================================================================

    #[test]
    fn inspect_reports_without_converting() {
        let limiter = limited(1);
        let converter = converter(MockBackend::with_dimensions(640, 480))
            .with_rate_limiter(Arc::clone(&limiter));
        let inspection = converter.inspect(&jpeg("p.jpg"));
        assert_eq!(inspection.sniffed, SniffedFormat::Jpeg);
        assert_eq!(
            inspection.verdict.unwrap(),
            Dimensions {
                width: 640,
                height: 480
            }
        );
        assert_eq!(limiter.in_window(Instant::now()), 0);
        assert!(
            converter
                .backend
                .get_operations()
                .iter()
                .all(|op| matches!(op, RecordedOp::Identify(_)))
        );
    }

    #[test]
    fn inspect_reports_rejection() {
        let converter = converter(MockBackend::with_dimensions(10, 10));
        let inspection = converter.inspect(&InputFile::new("x.png", b"nope".to_vec()));
        assert_eq!(inspection.sniffed, SniffedFormat::Unknown);
        assert_eq!(
            inspection.verdict.unwrap_err().summary(),
            "Unsupported or spoofed format"
        );
    }

    #[test]
    fn lower_first_handles_edges() {
        assert_eq!(lower_first(""), "");
        assert_eq!(lower_first("Abc"), "abc");
        assert_eq!(lower_first("éclair"), "éclair");
    }
}
