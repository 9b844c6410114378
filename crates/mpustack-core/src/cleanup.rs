//! Scratch namespace purge.
//!
//! Deletes every object under an upload's prefix in both the scratch and the
//! overflow bucket. The init marker goes last: until it is gone the session
//! stays Open, so a cleanup that fails halfway can be finished by a later
//! abort.

use futures::{StreamExt, TryStreamExt, stream};
use tracing::{debug, trace};

use crate::backend::{BackendClient, BackendResult, ListRequest};
use crate::keys::ScratchLayout;

/// Removes every scratch object of one upload.
#[derive(Debug)]
pub struct Cleanup<'a> {
    backend: &'a dyn BackendClient,
    max_in_flight: usize,
}

impl<'a> Cleanup<'a> {
    /// Create a cleanup issuing at most `max_in_flight` deletes at once.
    #[must_use]
    pub fn new(backend: &'a dyn BackendClient, max_in_flight: usize) -> Self {
        Self {
            backend,
            max_in_flight: max_in_flight.max(1),
        }
    }

    /// Delete everything under `layout`'s prefix in both buckets.
    ///
    /// Objects that vanish between listing and deletion are ignored. Returns
    /// the number of objects deleted.
    pub async fn remove_parts(
        &self,
        scratch_bucket: &str,
        overflow_bucket: &str,
        layout: &ScratchLayout,
    ) -> BackendResult<usize> {
        let marker = layout.init_marker();
        let mut targets: Vec<(&str, String)> = self
            .list_all(scratch_bucket, layout.prefix())
            .await?
            .into_iter()
            .filter(|key| *key != marker)
            .map(|key| (scratch_bucket, key))
            .collect();
        if overflow_bucket != scratch_bucket {
            targets.extend(
                self.list_all(overflow_bucket, layout.prefix())
                    .await?
                    .into_iter()
                    .map(|key| (overflow_bucket, key)),
            );
        }

        let deleted = stream::iter(&targets)
            .map(|(bucket, key)| self.delete_if_present(bucket, key))
            .buffer_unordered(self.max_in_flight)
            .try_collect::<Vec<bool>>()
            .await?
            .into_iter()
            .filter(|removed| *removed)
            .count();

        let marker_removed = self.delete_if_present(scratch_bucket, &marker).await?;
        let total = deleted + usize::from(marker_removed);
        debug!(prefix = layout.prefix(), deleted = total, "removed scratch objects");
        Ok(total)
    }

    async fn list_all(&self, bucket: &str, prefix: &str) -> BackendResult<Vec<String>> {
        let mut keys = Vec::new();
        let mut page_token = None;
        loop {
            let page = self
                .backend
                .list_objects(ListRequest {
                    bucket: bucket.to_owned(),
                    prefix: prefix.to_owned(),
                    max_keys: None,
                    page_token,
                })
                .await?;
            keys.extend(page.objects.into_iter().map(|o| o.key));
            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => return Ok(keys),
            }
        }
    }

    async fn delete_if_present(&self, bucket: &str, key: &str) -> BackendResult<bool> {
        match self.backend.delete_object(bucket, key).await {
            Ok(()) => Ok(true),
            Err(e) if e.is_not_found() => {
                trace!(bucket, key, "already deleted");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }
}
