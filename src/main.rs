use std::sync::Arc;
use tracing::{error, info};
use webhook_idempotency::cache::RedisCacheStore;
use webhook_idempotency::config::Settings;
use webhook_idempotency::error::AppError;
use webhook_idempotency::gateway::{PaymentRequest, SimulatedGateway};
use webhook_idempotency::observability::{init_logging, init_metrics, redact_url, LogConfig};
use webhook_idempotency::webhook::WebhookProcessor;

/// Parses an `event_id:amount` argument.
fn parse_event(arg: &str) -> Result<(String, PaymentRequest), AppError> {
    let (event_id, amount) = arg
        .rsplit_once(':')
        .ok_or_else(|| AppError::Validation(format!("Expected event_id:amount, got '{}'", arg)))?;
    let amount = amount
        .parse::<i64>()
        .map_err(|e| AppError::Validation(format!("Invalid amount in '{}': {}", arg, e)))?;
    Ok((event_id.to_string(), PaymentRequest::new(amount)))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let settings = Settings::new()?;
    init_logging(&LogConfig::from(&settings.logging));
    let metrics_handle = init_metrics()?;
    info!("Configuration loaded");

    let events = std::env::args()
        .skip(1)
        .map(|arg| parse_event(&arg))
        .collect::<Result<Vec<_>, _>>()?;

    info!("Connecting to Redis at {}...", redact_url(&settings.redis.url));
    let store = RedisCacheStore::open(&settings.redis.url)?;
    store.ping().await?;
    info!("Redis connection established");

    let processor = WebhookProcessor::with_settings(
        Arc::new(store),
        Arc::new(SimulatedGateway::new()),
        settings.idempotency.clone(),
    );

    for (event_id, request) in &events {
        match processor.process_event(event_id, request).await {
            Ok(outcome) => println!("{}", serde_json::to_string(&outcome)?),
            Err(e) => {
                error!(event_id = %event_id, error = %e, "Webhook event not processed");
                println!(
                    "{}",
                    serde_json::json!({ "status": "error", "event_id": event_id, "error": e.to_string() })
                );
            }
        }
    }

    info!(stats = ?processor.metrics().snapshot(), "Done");
    // Prometheus exposition goes to stderr so stdout stays one JSON outcome per line.
    eprint!("{}", metrics_handle.render());
    Ok(())
}
