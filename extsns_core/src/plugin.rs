//! The surface exposed to the host framework: lifecycle hooks and standalone commands.

use crate::authorization::CompiledTemplate;
use crate::error::ReconcileError;
use crate::manifest::Manifest;
use crate::reconciler::{Action, BindingReport, Outcome, Reconciler};
use crate::status::StatusSink;
use crate::transport::PlatformTransport;
use std::str::FromStr;

/// A lifecycle hook this plugin registers with the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Hook {
    /// Static resources are compiled
    CompileEvents,
    /// The stack has been deployed
    Deploy,
    /// The stack is about to be removed
    BeforeRemove,
    /// The `subscribeExternalSNS` command
    SubscribeCommand,
    /// The `unsubscribeExternalSNS` command
    UnsubscribeCommand,
}

impl Hook {
    /// Every registered hook.
    pub const ALL: [Hook; 5] = [
        Hook::CompileEvents,
        Hook::Deploy,
        Hook::BeforeRemove,
        Hook::SubscribeCommand,
        Hook::UnsubscribeCommand,
    ];

    /// The host's name for the hook.
    pub fn name(&self) -> &'static str {
        match self {
            Hook::CompileEvents => "deploy:compileEvents",
            Hook::Deploy => "deploy:deploy",
            Hook::BeforeRemove => "before:remove:remove",
            Hook::SubscribeCommand => "subscribeExternalSNS:subscribe",
            Hook::UnsubscribeCommand => "unsubscribeExternalSNS:unsubscribe",
        }
    }

    /// The action run for every binding when the hook fires.
    pub fn action(&self) -> Action {
        match self {
            Hook::CompileEvents => Action::Synthesize,
            Hook::Deploy | Hook::SubscribeCommand => Action::Subscribe,
            Hook::BeforeRemove | Hook::UnsubscribeCommand => Action::Unsubscribe,
        }
    }
}

impl FromStr for Hook {
    type Err = ReconcileError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Hook::ALL
            .into_iter()
            .find(|hook| hook.name() == s)
            .ok_or_else(|| ReconcileError::UnknownHook(s.to_string()))
    }
}

/// A standalone command registered with the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandSpec {
    /// Command name
    pub name: &'static str,
    /// One line usage text
    pub usage: &'static str,
    /// Lifecycle events of the command, without the command prefix
    pub lifecycle_events: &'static [&'static str],
}

/// The commands this plugin adds. Neither takes positional arguments.
pub const COMMANDS: [CommandSpec; 2] = [
    CommandSpec {
        name: "subscribeExternalSNS",
        usage: "Adds subscriptions to any SNS Topics defined by externalSNS.",
        lifecycle_events: &["subscribe"],
    },
    CommandSpec {
        name: "unsubscribeExternalSNS",
        usage: "Removes subscriptions from any SNS Topics defined by externalSNS.",
        lifecycle_events: &["unsubscribe"],
    },
];

/// Binds the reconciler to the host's lifecycle.
pub struct ExternalSnsPlugin<T, S> {
    reconciler: Reconciler<T, S>,
}

impl<T, S> ExternalSnsPlugin<T, S>
where
    T: PlatformTransport,
    S: StatusSink,
{
    /// Wraps a configured reconciler.
    pub fn new(reconciler: Reconciler<T, S>) -> Self {
        Self { reconciler }
    }

    /// The wrapped reconciler.
    pub fn reconciler(&self) -> &Reconciler<T, S> {
        &self.reconciler
    }

    /// Hook names and the action each one runs.
    pub fn hooks(&self) -> impl Iterator<Item = (&'static str, Action)> {
        Hook::ALL.into_iter().map(|hook| (hook.name(), hook.action()))
    }

    /// The commands this plugin adds.
    pub fn commands(&self) -> &'static [CommandSpec] {
        &COMMANDS
    }

    /// Runs one pass over the manifest for the named hook.
    ///
    /// Returns the outcome of every binding, or the first failure once the pass is over.
    pub async fn run_hook(
        &self,
        hook: &str,
        manifest: &Manifest,
        template: &mut CompiledTemplate,
    ) -> Result<Vec<Outcome>, ReconcileError> {
        let hook: Hook = hook.parse()?;
        log::debug!("Running {} over {} functions", hook.name(), manifest.functions.len());
        let reports = self
            .reconciler
            .for_each_binding(manifest, hook.action(), template)
            .await;
        collect_outcomes(reports)
    }
}

fn collect_outcomes(reports: Vec<BindingReport>) -> Result<Vec<Outcome>, ReconcileError> {
    let mut outcomes = Vec::with_capacity(reports.len());
    let mut first_error = None;
    for report in reports {
        match report.result {
            Ok(outcome) => outcomes.push(outcome),
            Err(err) => {
                log::debug!(
                    "Binding of {} to {} failed: {}",
                    report.function_name,
                    report.topic,
                    err
                );
                first_error.get_or_insert(err);
            }
        }
    }
    match first_error {
        Some(err) => Err(err),
        None => Ok(outcomes),
    }
}
