//! # extsns core
//!
//! Binds functions to topics the stack does not own. For every `externalSNS` event declared in
//! the host manifest the crate can
//!
//! - compile an `AWS::Lambda::Permission` letting the topic invoke the function
//!   ([`authorization`]),
//! - subscribe the function to the topic after a deploy, unless it already is
//!   ([`reconciler`]),
//! - unsubscribe it again before the stack is removed.
//!
//! All remote calls go through a [`PlatformTransport`](transport::PlatformTransport); the
//! platform is the only source of truth and nothing is cached between calls.

#![deny(missing_docs)]

pub mod authorization;
pub mod config;
pub mod error;
pub mod identity;
pub mod inspector;
pub mod manifest;
pub mod plugin;
pub mod reconciler;
pub mod status;
pub mod transport;

pub mod prelude {
    //! The prelude module for the `extsns_core` crate.
    pub use super::authorization::{
        synthesize_authorization, write_authorization, AuthorizationResource, CompiledTemplate,
    };
    pub use super::config::{DeploymentContext, FailurePolicy, ReconcilerConfig};
    pub use super::error::{ConfigurationError, ReconcileError, RemoteError};
    pub use super::identity::{
        normalize_name, normalize_topic_token, resolve_topic_reference, JoinExpression,
        JoinSegment, TopicReference,
    };
    pub use super::inspector::{Inspection, ResolvedIdentity, DIRECT_INVOKE_PROTOCOL};
    pub use super::manifest::{Binding, EventDeclaration, FunctionDefinition, Manifest};
    pub use super::plugin::{CommandSpec, ExternalSnsPlugin, Hook};
    pub use super::reconciler::{Action, BindingReport, Outcome, Reconciler};
    pub use super::status::{LogStatusSink, StatusSink};
    pub use super::transport::{
        Operation, PlatformTransport, RequestContext, Service, SubscriptionRecord,
    };
}
