//! Order document publisher for manual testing.
//!
//! Sends one order document to the `orders` topic: either a JSON file given
//! as the first argument, or the built-in reference document. Useful for
//! exercising a running server without wiring a real upstream.
//!
//! # Usage
//!
//! ```bash
//! # Publish the reference document
//! KAFKA_BROKERS=localhost:9092 cargo run --bin orderhub-publisher
//!
//! # Publish a document from disk (also works for intentionally broken
//! # payloads when testing the rejection path)
//! cargo run --bin orderhub-publisher -- my-order.json
//! ```

use anyhow::Context;
use rdkafka::config::ClientConfig;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout;
use std::time::Duration;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let brokers =
        std::env::var("KAFKA_BROKERS").unwrap_or_else(|_| "localhost:9092".to_string());
    let topic = std::env::var("ORDERS_TOPIC").unwrap_or_else(|_| "orders".to_string());

    let payload = match std::env::args().nth(1) {
        Some(path) => std::fs::read(&path)
            .with_context(|| format!("Failed to read payload from {path}"))?,
        None => orderhub_testing::sample_order_json("b563feb7b2b84b6test"),
    };

    // Key by order_uid so redeliveries of the same order share a partition;
    // payloads that do not parse get an empty key and land anywhere.
    let key = serde_json::from_slice::<serde_json::Value>(&payload)
        .ok()
        .and_then(|doc| {
            doc.get("order_uid")
                .and_then(|uid| uid.as_str())
                .map(String::from)
        })
        .unwrap_or_default();

    let producer: FutureProducer = ClientConfig::new()
        .set("bootstrap.servers", &brokers)
        .set("message.timeout.ms", "5000")
        .set("acks", "all")
        .create()
        .context("Failed to create producer")?;

    let record = FutureRecord::to(&topic).payload(&payload).key(&key);

    match producer
        .send(record, Timeout::After(Duration::from_secs(5)))
        .await
    {
        Ok((partition, offset)) => {
            tracing::info!(
                topic = %topic,
                partition,
                offset,
                order_uid = %key,
                "Order document published"
            );
            Ok(())
        },
        Err((e, _)) => anyhow::bail!("Failed to publish order document: {e}"),
    }
}
