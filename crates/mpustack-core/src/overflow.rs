//! Survivor migration and final merge.
//!
//! Compose cannot change storage class or location, so pass2 survivors are
//! rewritten into the overflow bucket (which matches the destination class)
//! and merged there. A rewrite may take several continuation calls; each
//! loop is bounded by `max_rewrite_steps` and rewrite steps are never
//! retried.

use futures::{StreamExt, TryStreamExt, stream};
use mpustack_model::UploadSession;
use tracing::{debug, trace};

use crate::backend::{BackendClient, RewriteProgress, RewriteRequest};
use crate::config::MpuConfig;
use crate::error::{EngineResult, MpuError, Stage};
use crate::keys::{LevelTag, ScratchLayout};
use crate::retry::RetryPolicy;

/// Moves survivors into the overflow bucket and merges them.
#[derive(Debug)]
pub struct OverflowConsolidator<'a> {
    backend: &'a dyn BackendClient,
    session: &'a UploadSession,
    layout: &'a ScratchLayout,
    retry: RetryPolicy,
    fan_in: usize,
    max_in_flight: usize,
    max_rewrite_steps: u32,
}

impl<'a> OverflowConsolidator<'a> {
    /// Create a consolidator for `session`.
    #[must_use]
    pub fn new(
        backend: &'a dyn BackendClient,
        config: &MpuConfig,
        session: &'a UploadSession,
        layout: &'a ScratchLayout,
    ) -> Self {
        Self {
            backend,
            session,
            layout,
            retry: RetryPolicy::from_config(config),
            fan_in: config.compose_fan_in,
            max_in_flight: config.max_in_flight,
            max_rewrite_steps: config.max_rewrite_steps,
        }
    }

    /// Rewrite every survivor from the scratch bucket into the overflow
    /// bucket, concurrently.
    ///
    /// Returns the overflow keys in survivor order.
    ///
    /// # Errors
    ///
    /// [`MpuError::Backend`] with [`Stage::Migrate`] if any rewrite step
    /// fails, or [`MpuError::RewriteIncomplete`] if a survivor is still
    /// pending after `max_rewrite_steps` calls.
    pub async fn migrate(&self, survivors: &[String]) -> EngineResult<Vec<String>> {
        let targets = self.layout.nodes(LevelTag::Overflow, survivors.len());
        stream::iter(survivors.iter().zip(&targets))
            .map(|(src, dst)| self.rewrite(src, dst))
            .buffer_unordered(self.max_in_flight)
            .try_collect::<Vec<_>>()
            .await?;

        debug!(
            upload_id = %self.session.upload_id,
            survivors = survivors.len(),
            "migrated survivors to overflow bucket"
        );
        Ok(targets)
    }

    /// Merge migrated survivors into one object in the overflow bucket.
    ///
    /// A single survivor is returned as is without a compose call.
    ///
    /// # Errors
    ///
    /// [`MpuError::Internal`] if there is nothing to merge or more survivors
    /// than one compose accepts.
    pub async fn merge(&self, migrated: &[String]) -> EngineResult<String> {
        match migrated {
            [] => Err(MpuError::Internal(anyhow::anyhow!("no survivors to merge"))),
            [only] => Ok(only.clone()),
            _ if migrated.len() > self.fan_in => Err(MpuError::Internal(anyhow::anyhow!(
                "{} survivors exceed compose fan-in {}",
                migrated.len(),
                self.fan_in
            ))),
            _ => {
                let dest = self.layout.final_object();
                self.retry
                    .retry_compose(self.backend, &self.session.overflow_bucket, migrated, &dest)
                    .await
                    .map_err(|e| MpuError::backend(Stage::Merge, e))?;
                debug!(
                    upload_id = %self.session.upload_id,
                    sources = migrated.len(),
                    "merged survivors"
                );
                Ok(dest)
            }
        }
    }

    async fn rewrite(&self, src: &str, dst: &str) -> EngineResult<()> {
        let mut token = None;
        for step in 1..=self.max_rewrite_steps {
            let progress = self
                .backend
                .rewrite_step(RewriteRequest {
                    src_bucket: self.session.scratch_bucket.clone(),
                    src_key: src.to_owned(),
                    dst_bucket: self.session.overflow_bucket.clone(),
                    dst_key: dst.to_owned(),
                    token: token.take(),
                })
                .await
                .map_err(|e| MpuError::backend(Stage::Migrate, e))?;

            match progress {
                RewriteProgress::Done(_) => {
                    trace!(src, dst, steps = step, "rewrite complete");
                    return Ok(());
                }
                RewriteProgress::Pending {
                    token: next,
                    bytes_rewritten,
                } => {
                    trace!(src, step, bytes_rewritten, "rewrite pending");
                    token = Some(next);
                }
            }
        }
        Err(MpuError::RewriteIncomplete {
            object: src.to_owned(),
            steps: self.max_rewrite_steps,
        })
    }
}
