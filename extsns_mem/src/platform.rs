use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

use extsns_core::error::RemoteError;
use extsns_core::transport::{
    FunctionConfiguration, GetFunctionInput, GetFunctionOutput, ListSubscriptionsByTopicInput,
    ListSubscriptionsByTopicOutput, Operation, PlatformTransport, RequestContext, Service,
    SubscribeInput, SubscribeOutput, SubscriptionRecord, UnsubscribeInput,
};

/// Page size of `listSubscriptionsByTopic`, as on the real platform.
pub const DEFAULT_PAGE_SIZE: usize = 100;

/// A call received by an [`InMemoryPlatform`].
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    /// The called service
    pub service: Service,
    /// The called operation
    pub operation: Operation,
    /// The raw parameters
    pub params: Value,
    /// The context the call was issued with
    pub context: RequestContext,
}

/// The in-memory platform state.
#[derive(Debug, Default)]
struct PlatformData {
    functions: HashMap<String, String>,
    topics: HashMap<String, Vec<SubscriptionRecord>>,
    calls: Vec<RecordedCall>,
    failures: HashMap<Operation, RemoteError>,
}

/// An in-memory compute and messaging platform.
///
/// Useful for testing and development: functions and topics are registered up front, and the
/// four operations behave like the real services, including first-page-only listings and
/// idempotent subscribe. Clones share the same state.
#[derive(Clone, Debug)]
pub struct InMemoryPlatform {
    data: Arc<Mutex<PlatformData>>,
    partition: String,
    region: String,
    account: String,
    page_size: usize,
    yield_between_calls: bool,
}

impl InMemoryPlatform {
    /// Creates an empty platform for an account in a region of the `aws` partition.
    pub fn new(region: impl Into<String>, account: impl Into<String>) -> Self {
        log::debug!("Creating a new InMemoryPlatform");
        Self {
            data: Arc::new(Mutex::new(PlatformData::default())),
            partition: "aws".to_string(),
            region: region.into(),
            account: account.into(),
            page_size: DEFAULT_PAGE_SIZE,
            yield_between_calls: false,
        }
    }

    /// Sets the partition used for generated ARNs.
    pub fn with_partition(mut self, partition: impl Into<String>) -> Self {
        self.partition = partition.into();
        self
    }

    /// Sets the number of subscriptions returned per listing page.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Yields to the scheduler before handling each call, so concurrent reconciliations
    /// interleave at every remote call.
    pub fn with_yielding(mut self, yield_between_calls: bool) -> Self {
        self.yield_between_calls = yield_between_calls;
        self
    }

    /// The ARN a function deployed under `name` gets on this platform.
    pub fn function_arn(&self, name: &str) -> String {
        format!(
            "arn:{}:lambda:{}:{}:function:{}",
            self.partition, self.region, self.account, name
        )
    }

    /// The ARN a topic named `name` gets on this platform.
    pub fn topic_arn(&self, name: &str) -> String {
        format!(
            "arn:{}:sns:{}:{}:{}",
            self.partition, self.region, self.account, name
        )
    }

    /// Deploys a function and returns its ARN.
    pub async fn add_function(&self, name: &str) -> String {
        let arn = self.function_arn(name);
        self.data
            .lock()
            .await
            .functions
            .insert(name.to_string(), arn.clone());
        arn
    }

    /// Creates a topic in this account and returns its ARN.
    pub async fn add_topic(&self, name: &str) -> String {
        let arn = self.topic_arn(name);
        self.add_topic_arn(&arn).await;
        arn
    }

    /// Creates a topic under an arbitrary ARN, e.g. one owned by another account.
    pub async fn add_topic_arn(&self, topic_arn: &str) {
        self.data
            .lock()
            .await
            .topics
            .entry(topic_arn.to_string())
            .or_default();
    }

    /// Adds a subscription directly, bypassing the call log. Returns the subscription ARN.
    pub async fn seed_subscription(&self, topic_arn: &str, protocol: &str, endpoint: &str) -> String {
        let mut data = self.data.lock().await;
        push_subscription(&mut data, topic_arn, protocol, endpoint)
    }

    /// The subscriptions of a topic, in creation order.
    pub async fn subscriptions(&self, topic_arn: &str) -> Vec<SubscriptionRecord> {
        self.data
            .lock()
            .await
            .topics
            .get(topic_arn)
            .cloned()
            .unwrap_or_default()
    }

    /// Makes the next call of `operation` fail with `error`.
    pub async fn fail_next(&self, operation: Operation, error: RemoteError) {
        self.data.lock().await.failures.insert(operation, error);
    }

    /// Every call received so far.
    pub async fn calls(&self) -> Vec<RecordedCall> {
        self.data.lock().await.calls.clone()
    }

    /// Number of calls of `operation` received so far.
    pub async fn call_count(&self, operation: Operation) -> usize {
        self.data
            .lock()
            .await
            .calls
            .iter()
            .filter(|call| call.operation == operation)
            .count()
    }

    /// Number of read calls received so far.
    pub async fn read_count(&self) -> usize {
        self.count_where(|operation| !operation.is_write()).await
    }

    /// Number of write calls received so far.
    pub async fn write_count(&self) -> usize {
        self.count_where(Operation::is_write).await
    }

    /// Forgets every recorded call.
    pub async fn clear_calls(&self) {
        self.data.lock().await.calls.clear();
    }

    async fn count_where(&self, predicate: impl Fn(&Operation) -> bool) -> usize {
        self.data
            .lock()
            .await
            .calls
            .iter()
            .filter(|call| predicate(&call.operation))
            .count()
    }

    fn handle(
        &self,
        data: &mut PlatformData,
        operation: Operation,
        params: Value,
    ) -> Result<Value, RemoteError> {
        match operation {
            Operation::GetFunction => {
                let input: GetFunctionInput = decode(operation, params)?;
                let function_arn = data
                    .functions
                    .get(&input.function_name)
                    .cloned()
                    .ok_or_else(|| {
                        RemoteError::new(
                            operation.service(),
                            operation,
                            format!(
                                "Function not found: {}",
                                self.function_arn(&input.function_name)
                            ),
                        )
                        .with_code("ResourceNotFoundException")
                    })?;
                encode(
                    operation,
                    &GetFunctionOutput {
                        configuration: FunctionConfiguration { function_arn },
                    },
                )
            }
            Operation::ListSubscriptionsByTopic => {
                let input: ListSubscriptionsByTopicInput = decode(operation, params)?;
                let subscriptions = data
                    .topics
                    .get(&input.topic_arn)
                    .ok_or_else(|| topic_not_found(operation))?;
                let start = match input.next_token.as_deref() {
                    Some(token) => token
                        .parse::<usize>()
                        .map_err(|_| invalid_parameter(operation, "NextToken"))?,
                    None => 0,
                };
                let end = (start + self.page_size).min(subscriptions.len());
                let page = subscriptions.get(start..end).unwrap_or_default().to_vec();
                let next_token = (end < subscriptions.len()).then(|| end.to_string());
                encode(
                    operation,
                    &ListSubscriptionsByTopicOutput {
                        subscriptions: page,
                        next_token,
                    },
                )
            }
            Operation::Subscribe => {
                let input: SubscribeInput = decode(operation, params)?;
                if !data.topics.contains_key(&input.topic_arn) {
                    return Err(topic_not_found(operation));
                }
                let existing = data.topics.get(&input.topic_arn).and_then(|subscriptions| {
                    subscriptions
                        .iter()
                        .find(|s| s.protocol == input.protocol && s.endpoint == input.endpoint)
                        .map(|s| s.subscription_arn.clone())
                });
                let subscription_arn = match existing {
                    Some(arn) => arn,
                    None => push_subscription(data, &input.topic_arn, &input.protocol, &input.endpoint),
                };
                encode(
                    operation,
                    &SubscribeOutput {
                        subscription_arn: Some(subscription_arn),
                    },
                )
            }
            Operation::Unsubscribe => {
                let input: UnsubscribeInput = decode(operation, params)?;
                let removed = data.topics.values_mut().any(|subscriptions| {
                    let before = subscriptions.len();
                    subscriptions.retain(|s| s.subscription_arn != input.subscription_arn);
                    subscriptions.len() != before
                });
                if !removed {
                    return Err(RemoteError::new(
                        operation.service(),
                        operation,
                        "Subscription does not exist",
                    )
                    .with_code("NotFound"));
                }
                Ok(Value::Object(Default::default()))
            }
        }
    }
}

fn push_subscription(
    data: &mut PlatformData,
    topic_arn: &str,
    protocol: &str,
    endpoint: &str,
) -> String {
    let subscription_arn = format!("{}:{}", topic_arn, Uuid::new_v4());
    data.topics
        .entry(topic_arn.to_string())
        .or_default()
        .push(SubscriptionRecord {
            protocol: protocol.to_string(),
            endpoint: endpoint.to_string(),
            subscription_arn: subscription_arn.clone(),
            topic_arn: Some(topic_arn.to_string()),
        });
    subscription_arn
}

fn decode<I: DeserializeOwned>(operation: Operation, params: Value) -> Result<I, RemoteError> {
    serde_json::from_value(params)
        .map_err(|err| invalid_parameter(operation, &err.to_string()))
}

fn encode<O: Serialize>(operation: Operation, output: &O) -> Result<Value, RemoteError> {
    serde_json::to_value(output).map_err(|err| {
        RemoteError::new(operation.service(), operation, err.to_string()).with_code("InternalError")
    })
}

fn invalid_parameter(operation: Operation, detail: &str) -> RemoteError {
    RemoteError::new(
        operation.service(),
        operation,
        format!("Invalid parameter: {detail}"),
    )
    .with_code("InvalidParameter")
}

fn topic_not_found(operation: Operation) -> RemoteError {
    RemoteError::new(operation.service(), operation, "Topic does not exist").with_code("NotFound")
}

#[async_trait]
impl PlatformTransport for InMemoryPlatform {
    async fn request(
        &self,
        service: Service,
        operation: Operation,
        params: Value,
        context: &RequestContext,
    ) -> Result<Value, RemoteError> {
        if self.yield_between_calls {
            tokio::task::yield_now().await;
        }

        let mut data = self.data.lock().await;
        log::debug!("InMemoryPlatform: {service}.{operation} {params}");
        data.calls.push(RecordedCall {
            service,
            operation,
            params: params.clone(),
            context: context.clone(),
        });

        if service != operation.service() {
            return Err(RemoteError::new(
                service,
                operation,
                format!("{service} does not support {operation}"),
            )
            .with_code("InvalidAction"));
        }
        if let Some(error) = data.failures.remove(&operation) {
            log::debug!("InMemoryPlatform: injected failure for {operation}");
            return Err(error);
        }

        self.handle(&mut data, operation, params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn context() -> RequestContext {
        RequestContext {
            stage: Some("test1".to_string()),
            region: Some("us-west-42".to_string()),
        }
    }

    #[tokio::test]
    async fn in_memory_platform_new() {
        let platform = InMemoryPlatform::new("us-west-42", "12349");
        assert!(platform.data.lock().await.functions.is_empty());
        assert!(platform.calls().await.is_empty());
    }

    #[tokio::test]
    async fn get_function_returns_the_arn() {
        let platform = InMemoryPlatform::new("us-west-42", "12349");
        let arn = platform.add_function("myFunc").await;
        assert_eq!(arn, "arn:aws:lambda:us-west-42:12349:function:myFunc");

        let response = platform
            .request(
                Service::Lambda,
                Operation::GetFunction,
                json!({ "FunctionName": "myFunc" }),
                &context(),
            )
            .await
            .unwrap();
        assert_eq!(response, json!({ "Configuration": { "FunctionArn": arn } }));
    }

    #[tokio::test]
    async fn get_function_reports_missing_functions() {
        let platform = InMemoryPlatform::new("us-west-42", "12349");
        let err = platform
            .request(
                Service::Lambda,
                Operation::GetFunction,
                json!({ "FunctionName": "ghost" }),
                &context(),
            )
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn listing_returns_the_first_page_with_a_token() {
        let platform = InMemoryPlatform::new("us-west-42", "12349").with_page_size(2);
        let topic = platform.add_topic("busy").await;
        for i in 0..3 {
            platform
                .seed_subscription(&topic, "lambda", &format!("endpoint-{i}"))
                .await;
        }

        let response = platform
            .request(
                Service::Sns,
                Operation::ListSubscriptionsByTopic,
                json!({ "TopicArn": topic }),
                &context(),
            )
            .await
            .unwrap();
        let page: ListSubscriptionsByTopicOutput = serde_json::from_value(response).unwrap();
        assert_eq!(page.subscriptions.len(), 2);
        assert_eq!(page.next_token.as_deref(), Some("2"));

        let response = platform
            .request(
                Service::Sns,
                Operation::ListSubscriptionsByTopic,
                json!({ "TopicArn": topic, "NextToken": "2" }),
                &context(),
            )
            .await
            .unwrap();
        let page: ListSubscriptionsByTopicOutput = serde_json::from_value(response).unwrap();
        assert_eq!(page.subscriptions[0].endpoint, "endpoint-2");
        assert_eq!(page.next_token, None);
    }

    #[tokio::test]
    async fn subscribe_is_idempotent_per_endpoint() {
        let platform = InMemoryPlatform::new("us-west-42", "12349");
        let topic = platform.add_topic("t").await;
        let params = json!({ "TopicArn": topic, "Protocol": "lambda", "Endpoint": "fn" });

        let first = platform
            .request(Service::Sns, Operation::Subscribe, params.clone(), &context())
            .await
            .unwrap();
        let second = platform
            .request(Service::Sns, Operation::Subscribe, params, &context())
            .await
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(platform.subscriptions(&topic).await.len(), 1);
        assert_eq!(platform.write_count().await, 2);
    }

    #[tokio::test]
    async fn unsubscribe_of_unknown_subscription_fails() {
        let platform = InMemoryPlatform::new("us-west-42", "12349");
        let err = platform
            .request(
                Service::Sns,
                Operation::Unsubscribe,
                json!({ "SubscriptionArn": "arn:aws:sns:us-west-42:12349:t:nope" }),
                &context(),
            )
            .await
            .unwrap_err();
        assert_eq!(err.code.as_deref(), Some("NotFound"));
    }

    #[tokio::test]
    async fn injected_failure_applies_once() {
        let platform = InMemoryPlatform::new("us-west-42", "12349");
        platform.add_function("f").await;
        platform
            .fail_next(
                Operation::GetFunction,
                RemoteError::new(Service::Lambda, Operation::GetFunction, "Rate exceeded")
                    .with_code("ThrottlingException"),
            )
            .await;
        let params = json!({ "FunctionName": "f" });

        let err = platform
            .request(Service::Lambda, Operation::GetFunction, params.clone(), &context())
            .await
            .unwrap_err();
        assert_eq!(err.code.as_deref(), Some("ThrottlingException"));
        assert!(platform
            .request(Service::Lambda, Operation::GetFunction, params, &context())
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn rejects_operations_sent_to_the_wrong_service() {
        let platform = InMemoryPlatform::new("us-west-42", "12349");
        let err = platform
            .request(Service::Lambda, Operation::Subscribe, json!({}), &context())
            .await
            .unwrap_err();
        assert_eq!(err.code.as_deref(), Some("InvalidAction"));
        assert_eq!(platform.calls().await[0].context, context());
    }
}
