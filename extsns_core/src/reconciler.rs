//! Subscription reconciliation.
//!
//! A [`Reconciler`] converges one binding at a time: subscribe when the topic does not yet
//! deliver to the function, unsubscribe when it does. Each flow inspects first and issues at
//! most one write, so re-running a flow against a converged platform is a no-op.

use crate::authorization::{write_authorization, CompiledTemplate};
use crate::config::{DeploymentContext, FailurePolicy, ReconcilerConfig};
use crate::error::ReconcileError;
use crate::identity::TopicReference;
use crate::inspector::{self, Inspection, ResolvedIdentity, DIRECT_INVOKE_PROTOCOL};
use crate::manifest::{Binding, FunctionDefinition, Manifest};
use crate::status::{LogStatusSink, StatusSink};
use crate::transport::{PlatformClient, PlatformTransport, RequestContext, SubscribeInput};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// What to do with every binding of a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    /// Write the permission resource into the compiled template
    Synthesize,
    /// Make sure the topic delivers to the function
    Subscribe,
    /// Make sure the topic no longer delivers to the function
    Unsubscribe,
}

/// The terminal state reached for one binding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The permission was written under this resource name
    Synthesized {
        /// Logical id of the permission
        resource_name: String,
    },
    /// `noDeploy` was set; nothing was inspected or written
    Skipped,
    /// A matching subscription already existed
    AlreadyBound(ResolvedIdentity),
    /// A subscription was created
    Bound {
        /// Resolved ARNs
        identity: ResolvedIdentity,
        /// The created subscription, when the platform reported it
        subscription_arn: Option<String>,
    },
    /// No matching subscription existed
    NotBound(ResolvedIdentity),
    /// The matching subscription was deleted
    Unbound {
        /// Resolved ARNs
        identity: ResolvedIdentity,
        /// The deleted subscription
        subscription_arn: String,
    },
}

impl Outcome {
    /// Whether reaching this state issued a remote write.
    pub fn wrote(&self) -> bool {
        matches!(self, Outcome::Bound { .. } | Outcome::Unbound { .. })
    }
}

/// The result of one binding within a pass.
#[derive(Debug)]
pub struct BindingReport {
    /// The manifest's function name
    pub function_name: String,
    /// The bound topic
    pub topic: TopicReference,
    /// The terminal state, or why the binding failed
    pub result: Result<Outcome, ReconcileError>,
}

type PairKey = (String, String);

/// Converges declared bindings against the platform.
pub struct Reconciler<T, S = LogStatusSink> {
    transport: T,
    sink: S,
    context: DeploymentContext,
    request_context: RequestContext,
    config: ReconcilerConfig,
    pair_locks: Mutex<HashMap<PairKey, Arc<Mutex<()>>>>,
}

impl<T> Reconciler<T, LogStatusSink>
where
    T: PlatformTransport,
{
    /// Creates a reconciler reporting progress through the `log` facade.
    pub fn with_log_sink(transport: T, context: DeploymentContext) -> Self {
        Self::new(transport, LogStatusSink, context)
    }
}

impl<T, S> Reconciler<T, S>
where
    T: PlatformTransport,
    S: StatusSink,
{
    /// Creates a new reconciler with the default configuration.
    pub fn new(transport: T, sink: S, context: DeploymentContext) -> Self {
        let request_context = context.request_context();
        Self {
            transport,
            sink,
            context,
            request_context,
            config: ReconcilerConfig::default(),
            pair_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Replaces the configuration.
    pub fn with_config(mut self, config: ReconcilerConfig) -> Self {
        self.config = config;
        self
    }

    /// The transport used for remote calls.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// The status sink.
    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// The deployment context.
    pub fn context(&self) -> &DeploymentContext {
        &self.context
    }

    /// The active configuration.
    pub fn config(&self) -> &ReconcilerConfig {
        &self.config
    }

    /// Inspects the live state of a binding. See [`inspector::inspect`].
    pub async fn inspect(
        &self,
        function: &FunctionDefinition,
        topic: &TopicReference,
    ) -> Result<Inspection, ReconcileError> {
        inspector::inspect(
            &self.transport,
            &self.request_context,
            &self.sink,
            function,
            topic,
        )
        .await
    }

    /// Writes the permission for a binding into `template`.
    pub fn synthesize(
        &self,
        function_name: &str,
        topic: &TopicReference,
        template: &mut CompiledTemplate,
    ) -> Result<Outcome, ReconcileError> {
        let resource_name = write_authorization(template, function_name, topic)?;
        Ok(Outcome::Synthesized { resource_name })
    }

    /// Subscribes the function to the topic unless it already is.
    ///
    /// With `noDeploy` set nothing is inspected or written.
    pub async fn subscribe(
        &self,
        function: &FunctionDefinition,
        topic: &TopicReference,
    ) -> Result<Outcome, ReconcileError> {
        if self.context.no_deploy {
            self.sink.status(&format!(
                "Not subscribing {} to {} because of the noDeploy flag",
                function.name, topic
            ));
            return Ok(Outcome::Skipped);
        }

        self.sink
            .status(&format!("Need to subscribe {} to {}", function.name, topic));

        let (inspection, _guard) = self.inspect_guarded(function, topic).await?;
        let identity = inspection.identity;

        if inspection.subscription.is_some() {
            self.sink.status(&format!(
                "Function {} is already subscribed to {}",
                identity.function_arn, identity.topic_arn
            ));
            return Ok(Outcome::AlreadyBound(identity));
        }

        let input = SubscribeInput {
            topic_arn: identity.topic_arn.clone(),
            protocol: DIRECT_INVOKE_PROTOCOL.to_string(),
            endpoint: identity.function_arn.clone(),
        };
        let output = PlatformClient::new(&self.transport, &self.request_context)
            .subscribe(&input)
            .await?;

        self.sink.status(&format!(
            "Function {} is now subscribed to {}",
            identity.function_arn, identity.topic_arn
        ));
        Ok(Outcome::Bound {
            identity,
            subscription_arn: output.subscription_arn,
        })
    }

    /// Removes the function's subscription to the topic if there is one.
    pub async fn unsubscribe(
        &self,
        function: &FunctionDefinition,
        topic: &TopicReference,
    ) -> Result<Outcome, ReconcileError> {
        self.sink.status(&format!(
            "Need to unsubscribe {} from {}",
            function.name, topic
        ));

        let (inspection, _guard) = self.inspect_guarded(function, topic).await?;
        let identity = inspection.identity;

        let Some(subscription) = inspection.subscription else {
            self.sink.status(&format!(
                "Function {} is not subscribed to {}",
                identity.function_arn, identity.topic_arn
            ));
            return Ok(Outcome::NotBound(identity));
        };

        PlatformClient::new(&self.transport, &self.request_context)
            .unsubscribe(&subscription.subscription_arn)
            .await?;

        self.sink.status(&format!(
            "Function {} is no longer subscribed to {} (deleted {})",
            identity.function_arn, identity.topic_arn, subscription.subscription_arn
        ));
        Ok(Outcome::Unbound {
            identity,
            subscription_arn: subscription.subscription_arn,
        })
    }

    /// Runs `action` for a single binding.
    pub async fn apply(
        &self,
        action: Action,
        binding: &Binding<'_>,
        template: &mut CompiledTemplate,
    ) -> Result<Outcome, ReconcileError> {
        match action {
            Action::Synthesize => self.synthesize(binding.function_name, binding.topic, template),
            Action::Subscribe => self.subscribe(binding.function, binding.topic).await,
            Action::Unsubscribe => self.unsubscribe(binding.function, binding.topic).await,
        }
    }

    /// Runs `action` once per declared binding, sequentially and in declaration order.
    ///
    /// With [`FailurePolicy::Abort`] the pass ends after the first failed binding; the failed
    /// binding is the last report.
    pub async fn for_each_binding(
        &self,
        manifest: &Manifest,
        action: Action,
        template: &mut CompiledTemplate,
    ) -> Vec<BindingReport> {
        let mut reports = Vec::new();
        for binding in manifest.bindings() {
            let result = self.apply(action, &binding, template).await;
            let failed = result.is_err();
            if let Err(err) = &result {
                log::debug!(
                    "{:?} failed for {} and {}: {}",
                    action,
                    binding.function_name,
                    binding.topic,
                    err
                );
            }
            reports.push(BindingReport {
                function_name: binding.function_name.to_string(),
                topic: binding.topic.clone(),
                result,
            });
            if failed && self.config.failure_policy == FailurePolicy::Abort {
                break;
            }
        }
        reports
    }

    /// Inspects the pair, holding its lock from the subscription listing until the guard drops.
    ///
    /// The lock is keyed by the resolved function and topic ARNs, so every spelling of the same
    /// topic shares it.
    async fn inspect_guarded(
        &self,
        function: &FunctionDefinition,
        topic: &TopicReference,
    ) -> Result<(Inspection, Option<OwnedMutexGuard<()>>), ReconcileError> {
        let identity = inspector::resolve_identity(
            &self.transport,
            &self.request_context,
            &self.sink,
            function,
            topic,
        )
        .await?;
        let guard = self.pair_guard(&identity).await;
        let inspection = inspector::lookup(&self.transport, &self.request_context, identity).await?;
        Ok((inspection, guard))
    }

    async fn pair_guard(&self, identity: &ResolvedIdentity) -> Option<OwnedMutexGuard<()>> {
        if !self.config.serialize_same_pair {
            return None;
        }
        let lock = {
            let mut locks = self.pair_locks.lock().await;
            locks
                .entry((identity.function_arn.clone(), identity.topic_arn.clone()))
                .or_default()
                .clone()
        };
        Some(lock.lock_owned().await)
    }
}
