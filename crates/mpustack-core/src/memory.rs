//! In-memory [`BackendClient`] implementation.
//!
//! Objects live in a [`DashMap`] keyed by `(bucket, key)`; buckets are
//! implicit. The backend enforces the same limits the engine must respect
//! (compose fan-in, missing sources, content-length mismatch) and splits
//! rewrites into fixed-size steps so continuation handling is exercised.
//!
//! Two test facilities are built in:
//!
//! - **fault injection**: [`InMemoryBackend::inject_fault`] makes the next
//!   `n` matching calls of an [`Op`] fail with a chosen error;
//! - **call accounting**: [`InMemoryBackend::stats`] reports per-primitive
//!   call counts and the widest compose seen.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD as BASE64_URL;
use bytes::{Bytes, BytesMut};
use chrono::Utc;
use dashmap::DashMap;
use mpustack_model::ObjectMetadata;
use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::backend::{
    BackendClient, BackendResult, CopyRequest, ListPage, ListRequest, ObjectInfo,
    PutObjectRequest, RewriteProgress, RewriteRequest,
};
use crate::checksums;
use crate::error::BackendError;

/// Default compose fan-in limit.
const DEFAULT_FAN_IN: usize = 32;

/// Default bytes copied per rewrite step.
const DEFAULT_REWRITE_CHUNK: u64 = 1024 * 1024;

/// Default listing page size.
const DEFAULT_PAGE_SIZE: usize = 1000;

/// Composite key identifying a stored object: `(bucket, key)`.
type ObjectKey = (String, String);

/// A backend primitive, used to target fault injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    /// `put_object`.
    Put,
    /// `head_object`.
    Head,
    /// `get_object`.
    Get,
    /// `list_objects`.
    List,
    /// `delete_object`.
    Delete,
    /// `compose`.
    Compose,
    /// `copy_object`.
    Copy,
    /// `rewrite_step`.
    Rewrite,
}

/// Snapshot of backend call counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BackendStats {
    /// `put_object` calls.
    pub puts: u64,
    /// `delete_object` calls.
    pub deletes: u64,
    /// `compose` calls.
    pub composes: u64,
    /// `copy_object` calls.
    pub copies: u64,
    /// `rewrite_step` calls.
    pub rewrites: u64,
    /// Largest source count passed to a single compose.
    pub max_compose_sources: usize,
}

impl BackendStats {
    /// Total calls that can modify the store.
    #[must_use]
    pub fn writes(&self) -> u64 {
        self.puts + self.deletes + self.composes + self.copies + self.rewrites
    }
}

#[derive(Debug)]
struct Fault {
    op: Op,
    key_contains: Option<String>,
    remaining: u32,
    error: BackendError,
}

#[derive(Debug)]
struct StoredObject {
    data: Bytes,
    info: ObjectInfo,
}

#[derive(Debug, Default)]
struct Counters {
    puts: AtomicU64,
    deletes: AtomicU64,
    composes: AtomicU64,
    copies: AtomicU64,
    rewrites: AtomicU64,
    max_compose_sources: AtomicUsize,
}

/// Thread-safe in-memory object store.
///
/// # Examples
///
/// ```
/// use bytes::Bytes;
/// use mpustack_core::backend::{BackendClient, PutObjectRequest};
/// use mpustack_core::memory::InMemoryBackend;
///
/// # tokio_test::block_on(async {
/// let backend = InMemoryBackend::new();
/// let info = backend
///     .put_object(PutObjectRequest {
///         bucket: "b".to_owned(),
///         key: "hello.txt".to_owned(),
///         body: Bytes::from("hello"),
///         content_length: None,
///         metadata: Default::default(),
///     })
///     .await
///     .unwrap();
/// assert_eq!(info.size, 5);
/// assert_eq!(backend.get_object("b", "hello.txt").await.unwrap(), "hello");
/// # });
/// ```
#[derive(Debug)]
pub struct InMemoryBackend {
    objects: DashMap<ObjectKey, StoredObject>,
    generation: AtomicU64,
    fan_in: usize,
    rewrite_chunk: u64,
    page_size: usize,
    faults: Mutex<Vec<Fault>>,
    counters: Counters,
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryBackend {
    /// Create an empty backend with default limits.
    #[must_use]
    pub fn new() -> Self {
        Self {
            objects: DashMap::new(),
            generation: AtomicU64::new(1),
            fan_in: DEFAULT_FAN_IN,
            rewrite_chunk: DEFAULT_REWRITE_CHUNK,
            page_size: DEFAULT_PAGE_SIZE,
            faults: Mutex::new(Vec::new()),
            counters: Counters::default(),
        }
    }

    /// Set the maximum number of sources accepted by `compose`.
    #[must_use]
    pub fn with_fan_in(mut self, fan_in: usize) -> Self {
        self.fan_in = fan_in;
        self
    }

    /// Set how many bytes a single rewrite step copies.
    #[must_use]
    pub fn with_rewrite_chunk(mut self, bytes: u64) -> Self {
        self.rewrite_chunk = bytes.max(1);
        self
    }

    /// Set the maximum page size returned by `list_objects`.
    #[must_use]
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Make the next `times` calls of `op` fail with `error`.
    ///
    /// When `key_contains` is set, only calls whose target key (the
    /// destination for compose, copy and rewrite) contains it are affected.
    pub fn inject_fault(
        &self,
        op: Op,
        key_contains: Option<&str>,
        times: u32,
        error: BackendError,
    ) {
        self.faults.lock().push(Fault {
            op,
            key_contains: key_contains.map(str::to_owned),
            remaining: times,
            error,
        });
    }

    /// Snapshot the call counters.
    #[must_use]
    pub fn stats(&self) -> BackendStats {
        BackendStats {
            puts: self.counters.puts.load(Ordering::SeqCst),
            deletes: self.counters.deletes.load(Ordering::SeqCst),
            composes: self.counters.composes.load(Ordering::SeqCst),
            copies: self.counters.copies.load(Ordering::SeqCst),
            rewrites: self.counters.rewrites.load(Ordering::SeqCst),
            max_compose_sources: self.counters.max_compose_sources.load(Ordering::SeqCst),
        }
    }

    /// All keys in `bucket` starting with `prefix`, in lexical order.
    #[must_use]
    pub fn keys(&self, bucket: &str, prefix: &str) -> Vec<String> {
        let mut keys: Vec<String> = self
            .objects
            .iter()
            .filter(|e| e.key().0 == bucket && e.key().1.starts_with(prefix))
            .map(|e| e.key().1.clone())
            .collect();
        keys.sort();
        keys
    }

    /// Whether an object exists.
    #[must_use]
    pub fn contains(&self, bucket: &str, key: &str) -> bool {
        self.objects
            .contains_key(&(bucket.to_owned(), key.to_owned()))
    }

    // -----------------------------------------------------------------------
    // Private helpers
    // -----------------------------------------------------------------------

    fn check_fault(&self, op: Op, key: &str) -> BackendResult<()> {
        let mut faults = self.faults.lock();
        let hit = faults.iter_mut().find(|f| {
            f.op == op
                && f.remaining > 0
                && f.key_contains.as_deref().is_none_or(|s| key.contains(s))
        });
        if let Some(fault) = hit {
            fault.remaining -= 1;
            trace!(?op, key, status = fault.error.status, "injected fault");
            return Err(fault.error.clone());
        }
        faults.retain(|f| f.remaining > 0);
        Ok(())
    }

    fn next_generation(&self) -> String {
        self.generation.fetch_add(1, Ordering::SeqCst).to_string()
    }

    fn store(&self, bucket: &str, key: &str, data: Bytes, metadata: ObjectMetadata) -> ObjectInfo {
        let info = ObjectInfo {
            bucket: bucket.to_owned(),
            key: key.to_owned(),
            etag: checksums::compute_etag(&data),
            size: data.len() as u64,
            version_id: Some(self.next_generation()),
            last_modified: Utc::now(),
            metadata,
        };
        trace!(bucket, key, size = info.size, "stored object data");
        self.objects.insert(
            (bucket.to_owned(), key.to_owned()),
            StoredObject {
                data,
                info: info.clone(),
            },
        );
        info
    }

    fn load(&self, bucket: &str, key: &str) -> BackendResult<(Bytes, ObjectInfo)> {
        self.objects
            .get(&(bucket.to_owned(), key.to_owned()))
            .map(|e| (e.data.clone(), e.info.clone()))
            .ok_or_else(|| BackendError::not_found(key))
    }
}

fn encode_token(value: &str) -> String {
    BASE64_URL.encode(value)
}

fn decode_token(token: &str) -> BackendResult<String> {
    BASE64_URL
        .decode(token)
        .ok()
        .and_then(|raw| String::from_utf8(raw).ok())
        .ok_or_else(|| BackendError::new(400, "invalidArgument", "malformed token"))
}

#[async_trait]
impl BackendClient for InMemoryBackend {
    async fn put_object(&self, req: PutObjectRequest) -> BackendResult<ObjectInfo> {
        self.counters.puts.fetch_add(1, Ordering::SeqCst);
        self.check_fault(Op::Put, &req.key)?;
        if let Some(declared) = req.content_length {
            if declared != req.body.len() as u64 {
                return Err(BackendError::new(
                    400,
                    "invalidArgument",
                    format!(
                        "content length {declared} does not match body length {}",
                        req.body.len()
                    ),
                ));
            }
        }
        Ok(self.store(&req.bucket, &req.key, req.body, req.metadata))
    }

    async fn head_object(&self, bucket: &str, key: &str) -> BackendResult<ObjectInfo> {
        self.check_fault(Op::Head, key)?;
        self.load(bucket, key).map(|(_, info)| info)
    }

    async fn get_object(&self, bucket: &str, key: &str) -> BackendResult<Bytes> {
        self.check_fault(Op::Get, key)?;
        self.load(bucket, key).map(|(data, _)| data)
    }

    async fn list_objects(&self, req: ListRequest) -> BackendResult<ListPage> {
        self.check_fault(Op::List, &req.prefix)?;
        let start_after = req.page_token.as_deref().map(decode_token).transpose()?;
        let limit = req.max_keys.unwrap_or(self.page_size).min(self.page_size);

        let matching: BTreeMap<String, ObjectInfo> = self
            .objects
            .iter()
            .filter(|e| e.key().0 == req.bucket && e.key().1.starts_with(&req.prefix))
            .filter(|e| start_after.as_ref().is_none_or(|after| e.key().1 > *after))
            .map(|e| (e.key().1.clone(), e.info.clone()))
            .collect();

        let truncated = matching.len() > limit;
        let objects: Vec<ObjectInfo> = matching.into_values().take(limit).collect();
        let next_page_token = if truncated {
            objects.last().map(|o| encode_token(&o.key))
        } else {
            None
        };

        Ok(ListPage {
            objects,
            next_page_token,
        })
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> BackendResult<()> {
        self.counters.deletes.fetch_add(1, Ordering::SeqCst);
        self.check_fault(Op::Delete, key)?;
        self.objects
            .remove(&(bucket.to_owned(), key.to_owned()))
            .map(|_| trace!(bucket, key, "deleted object"))
            .ok_or_else(|| BackendError::not_found(key))
    }

    async fn compose(
        &self,
        bucket: &str,
        sources: &[String],
        dest: &str,
    ) -> BackendResult<ObjectInfo> {
        self.counters.composes.fetch_add(1, Ordering::SeqCst);
        self.counters
            .max_compose_sources
            .fetch_max(sources.len(), Ordering::SeqCst);
        self.check_fault(Op::Compose, dest)?;

        if sources.is_empty() || sources.len() > self.fan_in {
            return Err(BackendError::new(
                400,
                "invalid",
                format!(
                    "compose accepts 1 to {} sources, got {}",
                    self.fan_in,
                    sources.len()
                ),
            ));
        }

        let mut combined = BytesMut::new();
        for source in sources {
            let (data, _) = self.load(bucket, source)?;
            combined.extend_from_slice(&data);
        }
        Ok(self.store(bucket, dest, combined.freeze(), ObjectMetadata::new()))
    }

    async fn copy_object(&self, req: CopyRequest) -> BackendResult<ObjectInfo> {
        self.counters.copies.fetch_add(1, Ordering::SeqCst);
        self.check_fault(Op::Copy, &req.dst_key)?;
        let (data, info) = self.load(&req.src_bucket, &req.src_key)?;
        let metadata = req.replace_metadata.unwrap_or(info.metadata);
        debug!(
            src_bucket = %req.src_bucket,
            src_key = %req.src_key,
            dst_bucket = %req.dst_bucket,
            dst_key = %req.dst_key,
            size = data.len(),
            "copying object data"
        );
        Ok(self.store(&req.dst_bucket, &req.dst_key, data, metadata))
    }

    async fn rewrite_step(&self, req: RewriteRequest) -> BackendResult<RewriteProgress> {
        self.counters.rewrites.fetch_add(1, Ordering::SeqCst);
        self.check_fault(Op::Rewrite, &req.dst_key)?;
        let (data, info) = self.load(&req.src_bucket, &req.src_key)?;

        let done_so_far = match req.token.as_deref() {
            Some(token) => decode_token(token)?
                .parse::<u64>()
                .map_err(|_| BackendError::new(400, "invalidArgument", "malformed token"))?,
            None => 0,
        };
        let total = data.len() as u64;
        let next = done_so_far.saturating_add(self.rewrite_chunk);
        if next < total {
            return Ok(RewriteProgress::Pending {
                token: encode_token(&next.to_string()),
                bytes_rewritten: next,
            });
        }
        Ok(RewriteProgress::Done(self.store(
            &req.dst_bucket,
            &req.dst_key,
            data,
            info.metadata,
        )))
    }
}
