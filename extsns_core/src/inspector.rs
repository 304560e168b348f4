//! Observation of the live subscription state of one binding.

use crate::error::ReconcileError;
use crate::identity::{Arn, TopicReference, TopicScope};
use crate::manifest::FunctionDefinition;
use crate::status::StatusSink;
use crate::transport::{PlatformClient, PlatformTransport, RequestContext, SubscriptionRecord};

/// Subscription protocol for direct function invocation.
pub const DIRECT_INVOKE_PROTOCOL: &str = "lambda";

/// The platform identifiers of a binding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedIdentity {
    /// Fully qualified function ARN, as reported by the platform
    pub function_arn: String,
    /// Fully qualified topic ARN
    pub topic_arn: String,
}

/// The result of inspecting a binding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inspection {
    /// Resolved function and topic ARNs
    pub identity: ResolvedIdentity,
    /// The live subscription, if one exists
    pub subscription: Option<SubscriptionRecord>,
}

impl Inspection {
    /// Whether a matching subscription exists.
    pub fn is_bound(&self) -> bool {
        self.subscription.is_some()
    }
}

/// Returns the first record delivering `topic_arn` to `function_arn` by direct invocation.
///
/// Records that do not report their topic are assumed to come from a listing already scoped
/// to `topic_arn`.
pub fn find_subscription<'a>(
    records: &'a [SubscriptionRecord],
    function_arn: &str,
    topic_arn: &str,
) -> Option<&'a SubscriptionRecord> {
    records.iter().find(|record| {
        record.protocol == DIRECT_INVOKE_PROTOCOL
            && record.endpoint == function_arn
            && record
                .topic_arn
                .as_deref()
                .is_none_or(|topic| topic == topic_arn)
    })
}

/// Looks up the function's ARN and resolves the topic within the function's account, region
/// and partition. Issues one remote read.
pub async fn resolve_identity<T, S>(
    transport: &T,
    context: &RequestContext,
    sink: &S,
    function: &FunctionDefinition,
    topic: &TopicReference,
) -> Result<ResolvedIdentity, ReconcileError>
where
    T: PlatformTransport + ?Sized,
    S: StatusSink + ?Sized,
{
    let function_arn = PlatformClient::new(transport, context)
        .get_function(&function.name)
        .await?;
    let arn = Arn::parse(&function_arn)
        .ok_or_else(|| ReconcileError::MalformedArn(function_arn.clone()))?;
    let topic_arn = topic.resolve(&TopicScope::from(&arn))?;

    sink.status(&format!("Function ARN: {function_arn}"));
    sink.status(&format!("Topic ARN: {topic_arn}"));

    Ok(ResolvedIdentity {
        function_arn,
        topic_arn,
    })
}

/// Searches the first page of the topic's subscriptions for `identity`. Issues one remote read.
pub async fn lookup<T>(
    transport: &T,
    context: &RequestContext,
    identity: ResolvedIdentity,
) -> Result<Inspection, ReconcileError>
where
    T: PlatformTransport + ?Sized,
{
    let page = PlatformClient::new(transport, context)
        .list_subscriptions_by_topic(&identity.topic_arn)
        .await?;
    if page.next_token.is_some() {
        log::debug!(
            "Subscriptions of {} span more than one page; only the first {} were examined",
            identity.topic_arn,
            page.subscriptions.len()
        );
    }
    let subscription =
        find_subscription(&page.subscriptions, &identity.function_arn, &identity.topic_arn)
            .cloned();

    Ok(Inspection {
        identity,
        subscription,
    })
}

/// Looks up the function's ARN, resolves the topic and searches the topic's subscriptions.
///
/// Exactly two remote reads are issued. Only the first page of subscriptions is examined, so a
/// subscription beyond it is reported as absent.
pub async fn inspect<T, S>(
    transport: &T,
    context: &RequestContext,
    sink: &S,
    function: &FunctionDefinition,
    topic: &TopicReference,
) -> Result<Inspection, ReconcileError>
where
    T: PlatformTransport + ?Sized,
    S: StatusSink + ?Sized,
{
    let identity = resolve_identity(transport, context, sink, function, topic).await?;
    lookup(transport, context, identity).await
}
