//! # pixelgate
//!
//! Guarded re-encoding of user-submitted PNG and JPEG images. A file goes in
//! with a name, a declared size and its bytes; what comes out is a re-encoded
//! variant (WebP, JPEG or PNG, optionally size-bounded) with a handle to its
//! bytes and a SHA-256 checksum that settles in the background.
//!
//! # Architecture: Guard, Convert, Verify
//!
//! ```text
//! InputFile ─▶ guard (size, sniff, probe, dimensions) ─▶ rate limiter
//!           ─▶ resize math ─▶ backend decode/draw/encode
//!           ─▶ handle registry ─▶ ConvertedFile
//!                                   └─▶ integrity worker ─▶ checksum
//! ```
//!
//! Each batch is processed sequentially and in input order. A file that fails
//! a check or fails to decode is skipped with a notice; only a full rate
//! window stops a batch early.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`sniff`] | True format from the first 12 bytes; names are never trusted |
//! | [`guard`] | Size, format and dimension checks with injectable [`guard::Limits`] |
//! | [`imaging`] | Resize math, encode parameters, the [`imaging::ImageBackend`] trait and the `image`-crate backend |
//! | [`rate_limit`] | Sliding-window admission control |
//! | [`convert`] | The orchestrator: batches, regenerate, clear |
//! | [`integrity`] | One-shot background SHA-256 workers |
//! | [`handles`] | `blob:pixelgate/<n>` handles, each released exactly once |
//! | [`naming`] | Display names, download file names, labels and descriptors |
//! | [`types`] | Shared value types (`InputFile`, settings, results) |
//! | [`config`] | `pixelgate.toml` loading, merging and validation |
//! | [`output`] | CLI output formatting and the JSON summary |
//!
//! # Design Decisions
//!
//! ## Bytes Decide the Format
//!
//! Uploads are identified by their magic bytes. A text file renamed to
//! `photo.png` is rejected as "Unsupported or spoofed format" before any
//! decoder sees it. The cheap checks (size, sniff) run before the dimension
//! probe, and the probe only reads the header, so an oversized or hostile
//! file is turned away before a full decode.
//!
//! ## Explicit State, No Globals
//!
//! The rate window belongs to one [`rate_limit::RateLimiter`]; converters
//! take it as an `Arc` so several can share a budget, and tests can build as
//! many independent ones as they like. Time is passed in, never read from a
//! global clock inside the limiter.
//!
//! ## Checksums Never Block Delivery
//!
//! A converted file is returned as soon as it is encoded. Its checksum runs on
//! a dedicated thread that replies once over a channel; the record moves from
//! pending to ready (or unavailable) the next time it is looked at.

pub mod config;
pub mod convert;
pub mod guard;
pub mod handles;
pub mod imaging;
pub mod integrity;
pub mod naming;
pub mod output;
pub mod rate_limit;
pub mod sniff;
pub mod types;
