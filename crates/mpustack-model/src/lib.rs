//! Request and response types for the MpuStack multipart compose engine.
//!
//! These are plain data carriers with no I/O. The engine in `mpustack-core`
//! consumes the input types and produces the output types; callers that sit
//! in front of it (an HTTP gateway, a CLI, a test) build them directly.
//!
//! # Scratch layout
//!
//! Every upload owns the key prefix `<Key>-<UploadId>/` inside the scratch
//! and overflow buckets. [`UploadSession`] carries everything needed to
//! derive that prefix.

pub mod input;
pub mod output;
pub mod session;

pub use input::{
    CompleteMpuInput, InitiateMpuInput, ListPartsInput, UploadPartCopyInput, UploadPartInput,
};
pub use output::{
    CopyPartResult, InitiateMpuOutput, ListPartsOutput, MpuResult, PartSummary, UploadPartOutput,
};
pub use session::{CompletedPart, ObjectMetadata, UploadSession};
