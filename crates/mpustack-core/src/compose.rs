//! Bounded fan-in reduction tree.
//!
//! The backend's `compose` merges at most `C` sources, so up to 10,000 parts
//! are reduced in two passes: pass1 turns `N` parts into `ceil(N/C)` nodes,
//! pass2 turns those into `ceil(ceil(N/C)/C)` survivors. Groups are
//! contiguous runs of the input so concatenation order equals part order.

use futures::{StreamExt, TryStreamExt, stream};
use mpustack_model::CompletedPart;
use tracing::{debug, trace};

use crate::backend::BackendClient;
use crate::config::MpuConfig;
use crate::error::{EngineResult, MpuError, Stage};
use crate::keys::{LevelTag, ScratchLayout};
use crate::retry::RetryPolicy;

/// One of the two reduction passes run inside the scratch bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReductionPass {
    /// Parts to pass1 nodes.
    Pass1,
    /// Pass1 nodes to pass2 survivors.
    Pass2,
}

impl ReductionPass {
    /// Key level the pass writes its nodes under.
    #[must_use]
    pub fn level(self) -> LevelTag {
        match self {
            Self::Pass1 => LevelTag::Pass1,
            Self::Pass2 => LevelTag::Pass2,
        }
    }

    /// Stage reported when the pass fails.
    #[must_use]
    pub fn stage(self) -> Stage {
        match self {
            Self::Pass1 => Stage::ComposePass1,
            Self::Pass2 => Stage::ComposePass2,
        }
    }
}

/// Reduces ordered source lists to at most one node per group of `C`.
#[derive(Debug)]
pub struct ComposeTree<'a> {
    backend: &'a dyn BackendClient,
    retry: RetryPolicy,
    layout: &'a ScratchLayout,
    bucket: &'a str,
    fan_in: usize,
    max_in_flight: usize,
}

impl<'a> ComposeTree<'a> {
    /// Create a tree writing nodes for `layout` into `bucket`.
    #[must_use]
    pub fn new(
        backend: &'a dyn BackendClient,
        config: &MpuConfig,
        layout: &'a ScratchLayout,
        bucket: &'a str,
    ) -> Self {
        Self {
            backend,
            retry: RetryPolicy::from_config(config),
            layout,
            bucket,
            fan_in: config.compose_fan_in,
            max_in_flight: config.max_in_flight,
        }
    }

    /// Compose `sources` in groups of at most `C` into `<pass>/1..=n`.
    ///
    /// Returns the number of nodes produced, `ceil(len / C)`. Groups are
    /// composed concurrently, at most `max_in_flight` at a time. If any group
    /// fails after retry the whole call fails; nodes already written are left
    /// for cleanup.
    pub async fn split_merge(
        &self,
        sources: &[String],
        pass: ReductionPass,
    ) -> EngineResult<usize> {
        let level = pass.level();
        let stage = pass.stage();
        let produced = stream::iter(sources.chunks(self.fan_in).enumerate())
            .map(|(index, group)| {
                let dest = self.layout.node(level, index + 1);
                async move {
                    trace!(%dest, sources = group.len(), "composing group");
                    self.retry
                        .retry_compose(self.backend, self.bucket, group, &dest)
                        .await
                        .map_err(|e| MpuError::backend(stage, e))
                }
            })
            .buffer_unordered(self.max_in_flight)
            .try_collect::<Vec<_>>()
            .await?;

        debug!(%level, inputs = sources.len(), produced = produced.len(), "reduction pass done");
        Ok(produced.len())
    }

    /// Run pass1 over the parts and pass2 over its output.
    ///
    /// Returns the survivor keys in order.
    ///
    /// # Errors
    ///
    /// [`MpuError::Internal`] if a pass produces a node count other than
    /// `ceil(inputs / C)`.
    pub async fn reduce(&self, parts: &[CompletedPart]) -> EngineResult<Vec<String>> {
        let part_keys: Vec<String> = parts
            .iter()
            .map(|p| self.layout.part(p.part_number))
            .collect();
        let pass1 = self.run_pass(&part_keys, ReductionPass::Pass1).await?;
        let pass2 = self.run_pass(&pass1, ReductionPass::Pass2).await?;
        Ok(pass2)
    }

    async fn run_pass(
        &self,
        sources: &[String],
        pass: ReductionPass,
    ) -> EngineResult<Vec<String>> {
        let expected = sources.len().div_ceil(self.fan_in);
        let produced = self.split_merge(sources, pass).await?;
        if produced != expected {
            return Err(MpuError::Internal(anyhow::anyhow!(
                "{} produced {produced} nodes, expected {expected}",
                pass.level()
            )));
        }
        Ok(self.layout.nodes(pass.level(), produced))
    }
}
