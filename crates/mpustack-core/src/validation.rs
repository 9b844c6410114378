//! Request validation.
//!
//! Every check here runs before the engine touches the backend, so a request
//! that fails validation performs no I/O at all.

use mpustack_model::{CompletedPart, UploadSession};

use crate::checksums;
use crate::error::{EngineResult, MpuError};

/// Maximum object key length in bytes.
const MAX_KEY_BYTES: usize = 1024;

/// Fail with `InvalidRequest` if `value` is empty.
///
/// # Examples
///
/// ```
/// use mpustack_core::validation::require;
///
/// assert!(require("Bucket", "b").is_ok());
/// assert!(require("Bucket", "").is_err());
/// ```
pub fn require(name: &str, value: &str) -> EngineResult<()> {
    if value.is_empty() {
        return Err(MpuError::invalid_request(format!(
            "Missing required parameter: {name}"
        )));
    }
    Ok(())
}

/// Validate an object key: non-empty and at most 1024 bytes.
pub fn validate_object_key(key: &str) -> EngineResult<()> {
    require("Key", key)?;
    if key.len() > MAX_KEY_BYTES {
        return Err(MpuError::invalid_request(format!(
            "Key is longer than {MAX_KEY_BYTES} bytes"
        )));
    }
    Ok(())
}

/// Validate the identifying fields of a session.
///
/// The overflow bucket is only needed by completion and abort, so it is
/// checked only when `with_overflow` is set.
pub fn validate_session(session: &UploadSession, with_overflow: bool) -> EngineResult<()> {
    require("Bucket", &session.bucket)?;
    require("ScratchBucket", &session.scratch_bucket)?;
    if with_overflow {
        require("OverflowBucket", &session.overflow_bucket)?;
    }
    validate_object_key(&session.key)?;
    require("UploadId", &session.upload_id)
}

/// Validate a part number. Part numbers start at 1.
pub fn validate_part_number(part_number: u32) -> EngineResult<()> {
    if part_number == 0 {
        return Err(MpuError::invalid_request(
            "Part number must be a positive integer",
        ));
    }
    Ok(())
}

/// Validate the part list of a completion request.
///
/// Order is checked right after emptiness, so a list that is both out of
/// order and otherwise malformed reports the order fault.
///
/// # Errors
///
/// - [`MpuError::InvalidRequest`] for an empty list, more than `max_parts`
///   entries, a part number of 0, or an ETag that is not hex.
/// - [`MpuError::InvalidPartOrder`] if part numbers are not strictly
///   increasing.
///
/// # Examples
///
/// ```
/// use mpustack_core::validation::validate_completed_parts;
/// use mpustack_model::CompletedPart;
///
/// let etag = "\"5d41402abc4b2a76b9719d911017c592\"";
/// let ok = [CompletedPart::new(1, etag), CompletedPart::new(3, etag)];
/// assert!(validate_completed_parts(&ok, 10_000).is_ok());
///
/// let unordered = [CompletedPart::new(2, etag), CompletedPart::new(2, etag)];
/// assert!(validate_completed_parts(&unordered, 10_000).is_err());
/// ```
pub fn validate_completed_parts(parts: &[CompletedPart], max_parts: usize) -> EngineResult<()> {
    if parts.is_empty() {
        return Err(MpuError::invalid_request(
            "You must specify at least one part",
        ));
    }
    if parts
        .windows(2)
        .any(|pair| pair[0].part_number >= pair[1].part_number)
    {
        return Err(MpuError::InvalidPartOrder);
    }
    if parts.len() > max_parts {
        return Err(MpuError::invalid_request(format!(
            "Too many parts: {} (maximum {max_parts})",
            parts.len()
        )));
    }

    for part in parts {
        validate_part_number(part.part_number)?;
        let valid_etag = checksums::decode_etag(&part.etag).is_ok_and(|raw| !raw.is_empty());
        if !valid_etag {
            return Err(MpuError::invalid_request(format!(
                "Invalid ETag for part {}",
                part.part_number
            )));
        }
    }
    Ok(())
}
