//! S3-style multipart uploads over a bounded fan-in compose backend.
//!
//! The backend can only concatenate a few objects per `compose` call and
//! needs a multi-step `rewrite` to change storage class. This crate builds
//! the multipart upload lifecycle on top of those primitives: session
//! tracking through an init marker, a two-pass reduction tree for up to
//! 10,000 parts, survivor migration, the S3 multipart ETag, and cleanup of
//! the scratch namespace.
//!
//! # Architecture
//!
//! ```text
//! MpuEngine (initiate / upload-part / list-parts / complete / abort)
//!        |
//!        v
//! SessionVerifier -> PartStore | ComposeTree -> OverflowConsolidator
//!                                -> Finalizer -> Cleanup
//!        |
//!        v
//! BackendClient (InMemoryBackend for tests and local runs)
//! ```

pub mod backend;
pub mod checksums;
pub mod cleanup;
pub mod compose;
pub mod config;
pub mod engine;
pub mod error;
pub mod finalize;
pub mod keys;
pub mod memory;
pub mod overflow;
pub mod parts;
pub mod retry;
pub mod session;
#[cfg(test)]
mod testing;
pub mod validation;

pub use backend::BackendClient;
pub use config::MpuConfig;
pub use engine::MpuEngine;
pub use error::{BackendError, EngineResult, MpuError, Stage};
pub use memory::InMemoryBackend;
