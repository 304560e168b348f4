//! This module defines the `PlatformTransport` trait, the seam through which every remote call to
//! the compute and messaging platforms is made, together with the wire shapes of the four
//! operations used by the reconciler and a typed `PlatformClient` on top of the raw transport.

use crate::error::{ReconcileError, RemoteError};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// The remote services the reconciler talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Service {
    /// The compute platform
    Lambda,
    /// The messaging platform
    Sns,
}

impl Service {
    /// The name of the service as the provider expects it.
    pub fn as_str(&self) -> &'static str {
        match self {
            Service::Lambda => "Lambda",
            Service::Sns => "SNS",
        }
    }
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The remote operations issued by the reconciler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Describes a function, yielding its ARN
    GetFunction,
    /// Lists the first page of subscriptions of a topic
    ListSubscriptionsByTopic,
    /// Creates a subscription
    Subscribe,
    /// Deletes a subscription
    Unsubscribe,
}

impl Operation {
    /// The name of the operation as the provider expects it.
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::GetFunction => "getFunction",
            Operation::ListSubscriptionsByTopic => "listSubscriptionsByTopic",
            Operation::Subscribe => "subscribe",
            Operation::Unsubscribe => "unsubscribe",
        }
    }

    /// The service this operation belongs to.
    pub fn service(&self) -> Service {
        match self {
            Operation::GetFunction => Service::Lambda,
            Operation::ListSubscriptionsByTopic | Operation::Subscribe | Operation::Unsubscribe => {
                Service::Sns
            }
        }
    }

    /// Whether the operation mutates remote state.
    pub fn is_write(&self) -> bool {
        matches!(self, Operation::Subscribe | Operation::Unsubscribe)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The stage and region a request is issued for.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestContext {
    /// Deployment stage
    pub stage: Option<String>,
    /// Deployment region
    pub region: Option<String>,
}

/// A trait that defines the behavior of a remote call transport.
///
/// Credentials, retries and timeouts belong to the implementation; the reconciler issues each
/// call exactly once and propagates any failure.
#[async_trait]
pub trait PlatformTransport: Send + Sync {
    /// Issues a single remote call and returns the raw response document.
    async fn request(
        &self,
        service: Service,
        operation: Operation,
        params: Value,
        context: &RequestContext,
    ) -> Result<Value, RemoteError>;
}

/// Parameters of `Lambda.getFunction`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct GetFunctionInput {
    /// The platform-side function name
    pub function_name: String,
}

/// Response of `Lambda.getFunction`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct GetFunctionOutput {
    /// The function configuration
    pub configuration: FunctionConfiguration,
}

/// The part of a function configuration the reconciler reads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct FunctionConfiguration {
    /// Fully qualified function ARN
    pub function_arn: String,
}

/// Parameters of `SNS.listSubscriptionsByTopic`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ListSubscriptionsByTopicInput {
    /// The topic to list
    pub topic_arn: String,
    /// Continuation token; never sent by the reconciler
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_token: Option<String>,
}

/// Response of `SNS.listSubscriptionsByTopic`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ListSubscriptionsByTopicOutput {
    /// One page of subscriptions
    #[serde(default)]
    pub subscriptions: Vec<SubscriptionRecord>,
    /// Token for the next page, if the listing was truncated
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_token: Option<String>,
}

/// A live subscription as reported by the messaging platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SubscriptionRecord {
    /// Delivery protocol, `lambda` for direct invocation
    pub protocol: String,
    /// Delivery target, the function ARN for `lambda`
    pub endpoint: String,
    /// Handle used to delete the subscription
    pub subscription_arn: String,
    /// The topic, when the listing reports it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic_arn: Option<String>,
}

/// Parameters of `SNS.subscribe`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SubscribeInput {
    /// Topic to subscribe to
    pub topic_arn: String,
    /// Delivery protocol
    pub protocol: String,
    /// Delivery target
    pub endpoint: String,
}

/// Response of `SNS.subscribe`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SubscribeOutput {
    /// The created subscription
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subscription_arn: Option<String>,
}

/// Parameters of `SNS.unsubscribe`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct UnsubscribeInput {
    /// The subscription to delete
    pub subscription_arn: String,
}

/// Typed access to the four operations on top of a raw transport.
pub struct PlatformClient<'a, T: ?Sized> {
    transport: &'a T,
    context: &'a RequestContext,
}

impl<'a, T> PlatformClient<'a, T>
where
    T: PlatformTransport + ?Sized,
{
    /// Creates a client issuing every call with `context`.
    pub fn new(transport: &'a T, context: &'a RequestContext) -> Self {
        Self { transport, context }
    }

    async fn call<I, O>(&self, operation: Operation, input: &I) -> Result<O, ReconcileError>
    where
        I: Serialize + Sync,
        O: DeserializeOwned,
    {
        let params = serde_json::to_value(input).map_err(|source| ReconcileError::Codec {
            what: format!("{operation} parameters"),
            source,
        })?;
        log::debug!("{}.{} {}", operation.service(), operation, params);
        let response = self
            .transport
            .request(operation.service(), operation, params, self.context)
            .await?;
        serde_json::from_value(response).map_err(|source| ReconcileError::Codec {
            what: format!("{operation} response"),
            source,
        })
    }

    /// Resolves the ARN of a function by its platform-side name.
    pub async fn get_function(&self, function_name: &str) -> Result<String, ReconcileError> {
        let input = GetFunctionInput {
            function_name: function_name.to_string(),
        };
        match self
            .call::<_, GetFunctionOutput>(Operation::GetFunction, &input)
            .await
        {
            Ok(output) => Ok(output.configuration.function_arn),
            Err(ReconcileError::Remote(err)) if err.is_not_found() => {
                Err(ReconcileError::FunctionNotFound(function_name.to_string()))
            }
            Err(err) => Err(err),
        }
    }

    /// Lists the first page of subscriptions of a topic.
    pub async fn list_subscriptions_by_topic(
        &self,
        topic_arn: &str,
    ) -> Result<ListSubscriptionsByTopicOutput, ReconcileError> {
        let input = ListSubscriptionsByTopicInput {
            topic_arn: topic_arn.to_string(),
            next_token: None,
        };
        self.call(Operation::ListSubscriptionsByTopic, &input).await
    }

    /// Creates a subscription.
    pub async fn subscribe(&self, input: &SubscribeInput) -> Result<SubscribeOutput, ReconcileError> {
        self.call(Operation::Subscribe, input).await
    }

    /// Deletes a subscription.
    pub async fn unsubscribe(&self, subscription_arn: &str) -> Result<(), ReconcileError> {
        let input = UnsubscribeInput {
            subscription_arn: subscription_arn.to_string(),
        };
        self.call::<_, Value>(Operation::Unsubscribe, &input).await?;
        Ok(())
    }
}
