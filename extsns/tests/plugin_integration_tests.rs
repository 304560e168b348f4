//! Full hook passes over a manifest, as the host framework drives them.

use extsns::prelude::*;
use extsns_mem::{InMemoryPlatform, InMemoryStatusSink};
use serde_json::json;

const MANIFEST: &str = r#"{
    "functions": {
        "myFunc": {
            "name": "myFunc",
            "handler": "handler.run",
            "events": [
                { "externalSNS": "cooltopic" }
            ]
        }
    }
}"#;

fn plugin(
    platform: &InMemoryPlatform,
    sink: &InMemoryStatusSink,
    context: DeploymentContext,
) -> ExternalSnsPlugin<InMemoryPlatform, InMemoryStatusSink> {
    ExternalSnsPlugin::new(Reconciler::new(platform.clone(), sink.clone(), context))
}

fn context() -> DeploymentContext {
    DeploymentContext::new().stage("test1").region("us-west-42")
}

#[tokio::test]
async fn deploy_hook_subscribes_declared_binding() {
    let _ = env_logger::builder().is_test(true).try_init();
    let platform = InMemoryPlatform::new("us-west-42", "12349");
    let function_arn = platform.add_function("myFunc").await;
    let topic_arn = platform.add_topic("cooltopic").await;
    let sink = InMemoryStatusSink::new();
    let manifest = Manifest::from_json(MANIFEST).unwrap();

    let outcomes = plugin(&platform, &sink, context())
        .run_hook("deploy:deploy", &manifest, &mut CompiledTemplate::new())
        .await
        .unwrap();

    assert_eq!(outcomes.len(), 1);
    let subscribes: Vec<_> = platform
        .calls()
        .await
        .into_iter()
        .filter(|call| call.operation == Operation::Subscribe)
        .collect();
    assert_eq!(subscribes.len(), 1);
    assert_eq!(
        subscribes[0].params,
        json!({ "TopicArn": topic_arn, "Protocol": "lambda", "Endpoint": function_arn })
    );
    assert_eq!(subscribes[0].context.stage.as_deref(), Some("test1"));
    assert!(sink.contains(&format!(
        "Function {function_arn} is now subscribed to {topic_arn}"
    )));
}

#[tokio::test]
async fn deploy_then_remove_converges_back() {
    let platform = InMemoryPlatform::new("us-west-42", "12349");
    platform.add_function("myFunc").await;
    let topic_arn = platform.add_topic("cooltopic").await;
    let sink = InMemoryStatusSink::new();
    let manifest = Manifest::from_json(MANIFEST).unwrap();
    let plugin = plugin(&platform, &sink, context());
    let mut template = CompiledTemplate::new();

    plugin
        .run_hook("deploy:deploy", &manifest, &mut template)
        .await
        .unwrap();
    plugin
        .run_hook("subscribeExternalSNS:subscribe", &manifest, &mut template)
        .await
        .unwrap();
    assert_eq!(platform.call_count(Operation::Subscribe).await, 1);
    assert_eq!(platform.subscriptions(&topic_arn).await.len(), 1);

    plugin
        .run_hook("before:remove:remove", &manifest, &mut template)
        .await
        .unwrap();
    plugin
        .run_hook("unsubscribeExternalSNS:unsubscribe", &manifest, &mut template)
        .await
        .unwrap();
    assert_eq!(platform.call_count(Operation::Unsubscribe).await, 1);
    assert!(platform.subscriptions(&topic_arn).await.is_empty());
}

#[tokio::test]
async fn compile_hook_writes_permissions_without_remote_calls() {
    let platform = InMemoryPlatform::new("us-west-42", "12349");
    let sink = InMemoryStatusSink::new();
    let manifest = Manifest::from_json(
        r#"{
            "functions": {
                "myFunc": {
                    "name": "svc-dev-myFunc",
                    "events": [
                        { "externalSNS": "cool-Topic" },
                        { "externalSNS": "arn:aws:sns:us-east-1:555:fancy-topic" }
                    ]
                }
            }
        }"#,
    )
    .unwrap();
    let mut template = CompiledTemplate::new();

    let outcomes = plugin(&platform, &sink, context())
        .run_hook("deploy:compileEvents", &manifest, &mut template)
        .await
        .unwrap();

    assert_eq!(
        outcomes,
        vec![
            Outcome::Synthesized {
                resource_name: "MyFuncLambdaPermissionCoolTopic".to_string()
            },
            Outcome::Synthesized {
                resource_name: "MyFuncLambdaPermissionFancytopic".to_string()
            },
        ]
    );
    assert!(platform.calls().await.is_empty());
    assert_eq!(
        template.resource("MyFuncLambdaPermissionFancytopic").unwrap()["Properties"]["SourceArn"],
        json!("arn:aws:sns:us-east-1:555:fancy-topic")
    );
}

#[tokio::test]
async fn compile_hook_is_idempotent() {
    let platform = InMemoryPlatform::new("us-west-42", "12349");
    let sink = InMemoryStatusSink::new();
    let manifest = Manifest::from_json(MANIFEST).unwrap();
    let plugin = plugin(&platform, &sink, context());

    let mut first = CompiledTemplate::new();
    plugin
        .run_hook("deploy:compileEvents", &manifest, &mut first)
        .await
        .unwrap();
    let mut second = first.clone();
    plugin
        .run_hook("deploy:compileEvents", &manifest, &mut second)
        .await
        .unwrap();

    assert_eq!(
        serde_json::to_vec(&first).unwrap(),
        serde_json::to_vec(&second).unwrap()
    );
}

#[tokio::test]
async fn no_deploy_skips_every_binding() {
    let platform = InMemoryPlatform::new("us-west-42", "12349");
    platform.add_function("myFunc").await;
    platform.add_topic("cooltopic").await;
    let sink = InMemoryStatusSink::new();
    let manifest = Manifest::from_json(MANIFEST).unwrap();

    let outcomes = plugin(&platform, &sink, context().no_deploy(true))
        .run_hook("deploy:deploy", &manifest, &mut CompiledTemplate::new())
        .await
        .unwrap();

    assert_eq!(outcomes, vec![Outcome::Skipped]);
    assert!(platform.calls().await.is_empty());
}

#[tokio::test]
async fn failed_binding_fails_the_hook() {
    let platform = InMemoryPlatform::new("us-west-42", "12349");
    platform.add_topic("cooltopic").await;
    let sink = InMemoryStatusSink::new();
    let manifest = Manifest::from_json(MANIFEST).unwrap();

    let err = plugin(&platform, &sink, context())
        .run_hook("deploy:deploy", &manifest, &mut CompiledTemplate::new())
        .await
        .unwrap_err();

    assert!(matches!(err, ReconcileError::FunctionNotFound(ref name) if name == "myFunc"));
}

#[tokio::test]
async fn continue_policy_reconciles_the_remaining_bindings() {
    let platform = InMemoryPlatform::new("us-west-42", "12349");
    platform.add_function("second").await;
    let topic_arn = platform.add_topic("cooltopic").await;
    let sink = InMemoryStatusSink::new();
    let manifest = Manifest::new()
        .with_function("first", FunctionDefinition::new("first").with_binding("cooltopic"))
        .with_function("second", FunctionDefinition::new("second").with_binding("cooltopic"));
    let plugin = ExternalSnsPlugin::new(
        Reconciler::new(platform.clone(), sink.clone(), context()).with_config(ReconcilerConfig {
            failure_policy: FailurePolicy::Continue,
            ..ReconcilerConfig::default()
        }),
    );

    let err = plugin
        .run_hook("deploy:deploy", &manifest, &mut CompiledTemplate::new())
        .await
        .unwrap_err();

    assert!(matches!(err, ReconcileError::FunctionNotFound(ref name) if name == "first"));
    assert_eq!(platform.subscriptions(&topic_arn).await.len(), 1);
}

#[tokio::test]
async fn unsupported_topic_shape_fails_only_its_binding() {
    let platform = InMemoryPlatform::new("us-west-42", "12349");
    platform.add_function("myFunc").await;
    let topic_arn = platform.add_topic("cooltopic").await;
    let sink = InMemoryStatusSink::new();
    let manifest = Manifest::from_json(
        r#"{
            "functions": {
                "myFunc": {
                    "name": "myFunc",
                    "events": [
                        { "externalSNS": { "Ref": "SharedTopicParam" } },
                        { "externalSNS": "cooltopic" }
                    ]
                }
            }
        }"#,
    )
    .unwrap();
    let plugin = ExternalSnsPlugin::new(
        Reconciler::new(platform.clone(), sink.clone(), context()).with_config(ReconcilerConfig {
            failure_policy: FailurePolicy::Continue,
            ..ReconcilerConfig::default()
        }),
    );

    let err = plugin
        .run_hook("deploy:deploy", &manifest, &mut CompiledTemplate::new())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ReconcileError::Configuration(ConfigurationError::UnsupportedSegment(_))
    ));
    assert!(err.to_string().contains("SharedTopicParam"));
    assert_eq!(platform.subscriptions(&topic_arn).await.len(), 1);
}

#[tokio::test]
async fn unknown_hook_is_rejected() {
    let platform = InMemoryPlatform::new("us-west-42", "12349");
    let sink = InMemoryStatusSink::new();

    let err = plugin(&platform, &sink, context())
        .run_hook("package:finalize", &Manifest::new(), &mut CompiledTemplate::new())
        .await
        .unwrap_err();

    assert!(matches!(err, ReconcileError::UnknownHook(_)));
    assert!(platform.calls().await.is_empty());
}

#[test]
fn registers_hooks_and_commands() {
    let platform = InMemoryPlatform::new("us-west-42", "12349");
    let sink = InMemoryStatusSink::new();
    let plugin = plugin(&platform, &sink, context());

    let hooks: Vec<_> = plugin.hooks().collect();
    assert_eq!(
        hooks,
        vec![
            ("deploy:compileEvents", Action::Synthesize),
            ("deploy:deploy", Action::Subscribe),
            ("before:remove:remove", Action::Unsubscribe),
            ("subscribeExternalSNS:subscribe", Action::Subscribe),
            ("unsubscribeExternalSNS:unsubscribe", Action::Unsubscribe),
        ]
    );
    let commands: Vec<_> = plugin.commands().iter().map(|c| c.name).collect();
    assert_eq!(commands, vec!["subscribeExternalSNS", "unsubscribeExternalSNS"]);
}
