//! ETag computation.
//!
//! Single objects carry the quoted hex MD5 of their content. Completed
//! multipart uploads carry the S3 multipart form: the MD5 of the
//! concatenated binary part digests, hex-encoded and suffixed with
//! `-<part count>`.

use digest::Digest;

/// Compute the hex-encoded MD5 digest of `data`.
///
/// # Examples
///
/// ```
/// use mpustack_core::checksums::compute_md5;
///
/// assert_eq!(compute_md5(b"hello"), "5d41402abc4b2a76b9719d911017c592");
/// ```
#[must_use]
pub fn compute_md5(data: &[u8]) -> String {
    hex::encode(md5::Md5::digest(data))
}

/// Compute the quoted hex MD5 of `data`, suitable for use as an ETag.
///
/// # Examples
///
/// ```
/// use mpustack_core::checksums::compute_etag;
///
/// assert_eq!(compute_etag(b""), "\"d41d8cd98f00b204e9800998ecf8427e\"");
/// ```
#[must_use]
pub fn compute_etag(data: &[u8]) -> String {
    format!("\"{}\"", compute_md5(data))
}

/// Decode the hex payload of an ETag, ignoring surrounding quotes.
pub fn decode_etag(etag: &str) -> Result<Vec<u8>, hex::FromHexError> {
    hex::decode(etag.trim_matches('"'))
}

/// Compute the multipart ETag for an ordered list of part ETags.
///
/// Part ETags may be quoted or bare. Any ETag whose payload is not valid hex
/// is an error rather than being skipped, since skipping would silently yield
/// a digest no client can reproduce.
///
/// # Examples
///
/// ```
/// use mpustack_core::checksums::compute_multipart_etag;
///
/// let etag = compute_multipart_etag(&["\"5d41402abc4b2a76b9719d911017c592\""]).unwrap();
/// assert!(etag.starts_with('"'));
/// assert!(etag.ends_with("-1\""));
/// ```
pub fn compute_multipart_etag(part_etags: &[impl AsRef<str>]) -> Result<String, hex::FromHexError> {
    let mut hasher = md5::Md5::new();
    for etag in part_etags {
        hasher.update(decode_etag(etag.as_ref())?);
    }
    let digest = hex::encode(hasher.finalize());
    Ok(format!("\"{digest}-{}\"", part_etags.len()))
}
