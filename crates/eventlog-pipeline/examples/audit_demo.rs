//! Audit pipeline demo
//!
//! Composes a few object changes, writes them through a JSON-lines sink,
//! switches collections mid-stream and stops gracefully.
//!
//! Run with `cargo run -p eventlog-pipeline --example audit_demo`.

use eventlog_core::logging_facility::{init, Profile};
use eventlog_core::{LoggingOptions, ObjectChange, PayloadComposer};
use eventlog_pipeline::{Pipeline, PipelineConfig};
use serde_json::json;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init(Profile::Development);

    let dir = std::env::temp_dir().join("eventlog-demo");
    let target = format!("file://{}", dir.display());
    let composer = PayloadComposer::new(LoggingOptions::default());
    let pipeline = Pipeline::new();
    pipeline.init(PipelineConfig::new(&target, "orders")).await?;

    let changes = [
        ObjectChange::created("Order", json!({"_id": "o1", "__v": 0, "status": "open"})),
        ObjectChange::updated(
            "Order",
            json!({"_id": "o1", "__v": 0, "status": "open"}),
            json!({"_id": "o1", "__v": 1, "status": "paid"}),
        )
        .with_actor(json!({"id": "u1", "providerData": {"sub": "google|1"}})),
        // Only the timestamp moved: not logged
        ObjectChange::updated(
            "Order",
            json!({"_id": "o1", "__v": 1, "status": "paid", "updatedAt": 1}),
            json!({"_id": "o1", "__v": 1, "status": "paid", "updatedAt": 2}),
        ),
    ];
    for change in changes {
        if let Some(event) = composer.compose(change) {
            pipeline.log(event).await?;
        }
    }

    pipeline
        .reconfigure(PipelineConfig::new(&target, "archive"))
        .await?;
    let fetched = composer.compose(ObjectChange::fetched("Order", json!({"_id": "o1", "__v": 1})));
    if let Some(event) = fetched {
        pipeline.log(event).await?;
    }
    pipeline.stop().await?;

    for collection in ["orders", "archive"] {
        let path = dir.join(format!("{}.jsonl", collection));
        println!("== {}", path.display());
        print!("{}", std::fs::read_to_string(&path)?);
    }
    println!("pipeline {} is {:?}", pipeline.id(), pipeline.state());
    Ok(())
}
