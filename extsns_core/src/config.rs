//! Configuration types for the reconciler.

use crate::transport::RequestContext;
use serde::{Deserialize, Serialize};

/// The deployment the hooks run for, as passed by the host.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DeploymentContext {
    /// Deployment stage
    pub stage: Option<String>,
    /// Deployment region
    pub region: Option<String>,
    /// Skip every remote write; subscribe becomes a no-op
    pub no_deploy: bool,
}

impl DeploymentContext {
    /// Creates a context with no stage, no region and writes enabled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the stage.
    pub fn stage(mut self, stage: impl Into<String>) -> Self {
        self.stage = Some(stage.into());
        self
    }

    /// Sets the region.
    pub fn region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    /// Sets the `noDeploy` flag.
    pub fn no_deploy(mut self, no_deploy: bool) -> Self {
        self.no_deploy = no_deploy;
        self
    }

    /// The context attached to every remote call.
    pub fn request_context(&self) -> RequestContext {
        RequestContext {
            stage: self.stage.clone(),
            region: self.region.clone(),
        }
    }
}

/// What a pass over the manifest does after a binding fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FailurePolicy {
    /// Stop at the first failed binding.
    #[default]
    Abort,
    /// Attempt every binding, then report the first failure.
    Continue,
}

/// Configuration for the reconciler.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReconcilerConfig {
    /// How a pass reacts to a failed binding.
    pub failure_policy: FailurePolicy,

    /// Hold an in-process lock per resolved (function ARN, topic ARN) pair from the
    /// subscription listing through the write.
    ///
    /// Without it, two overlapping reconciliations of the same pair may both decide to write,
    /// producing a duplicate subscribe or a second unsubscribe of an already deleted
    /// subscription. The lock only covers reconcilers sharing this instance; it is not a
    /// fencing mechanism across processes.
    ///
    /// Default: `false`
    pub serialize_same_pair: bool,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            failure_policy: FailurePolicy::Abort,
            serialize_same_pair: false,
        }
    }
}

impl std::fmt::Debug for ReconcilerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReconcilerConfig")
            .field("failure_policy", &self.failure_policy)
            .field("serialize_same_pair", &self.serialize_same_pair)
            .finish()
    }
}
