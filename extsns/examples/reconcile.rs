use extsns::prelude::*;
use extsns::mem::{InMemoryPlatform, InMemoryStatusSink};

const MANIFEST: &str = r#"{
    "functions": {
        "ingest": {
            "name": "orders-dev-ingest",
            "events": [
                { "externalSNS": "order-created" },
                { "externalSNS": { "Fn::Join": [":", ["arn:aws:sns", { "Ref": "AWS::Region" }, { "Ref": "AWS::AccountId" }, "order-cancelled"]] } }
            ]
        },
        "audit": {
            "name": "orders-dev-audit",
            "events": [
                { "externalSNS": "arn:aws:sns:us-east-1:210987654321:compliance-feed" }
            ]
        }
    }
}"#;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let platform = InMemoryPlatform::new("us-east-1", "123456789012");
    platform.add_function("orders-dev-ingest").await;
    platform.add_function("orders-dev-audit").await;
    platform.add_topic("order-created").await;
    platform.add_topic("order-cancelled").await;
    platform
        .add_topic_arn("arn:aws:sns:us-east-1:210987654321:compliance-feed")
        .await;

    let manifest = Manifest::from_json(MANIFEST)?;
    let sink = InMemoryStatusSink::new();
    let context = DeploymentContext::new().stage("dev").region("us-east-1");
    let plugin = ExternalSnsPlugin::new(Reconciler::new(platform.clone(), sink.clone(), context));
    let mut template = CompiledTemplate::new();

    for hook in [
        "deploy:compileEvents",
        "deploy:deploy",
        "subscribeExternalSNS:subscribe",
        "before:remove:remove",
    ] {
        let outcomes = plugin.run_hook(hook, &manifest, &mut template).await?;
        println!("{hook}: {outcomes:?}");
    }

    println!("{}", serde_json::to_string_pretty(&template)?);
    for line in sink.lines() {
        println!("{line}");
    }
    log::info!(
        "{} reads, {} writes",
        platform.read_count().await,
        platform.write_count().await
    );
    Ok(())
}
