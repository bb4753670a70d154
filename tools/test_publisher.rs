//! Test Request Publisher
//!
//! Reads a leaf image from disk, publishes diagnosis requests to NATS, and
//! prints the reports the pipeline sends back.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::Utc;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{info, warn};

/// Request structure matching the pipeline's expected format
#[derive(Debug, Clone, Serialize, Deserialize)]
struct DiagnosisRequest {
    request_id: String,
    image_base64: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_k: Option<usize>,
    timestamp: chrono::DateTime<Utc>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("test_publisher=info".parse()?),
        )
        .init();

    info!("Starting Test Request Publisher");

    // Parse arguments
    let args: Vec<String> = std::env::args().collect();
    let Some(image_path) = args.get(1) else {
        eprintln!(
            "Usage: test_publisher <image> [nats_url] [request_subject] [report_subject] [count] [delay_ms]"
        );
        std::process::exit(1);
    };
    let nats_url = args
        .get(2)
        .map(|s| s.as_str())
        .unwrap_or("nats://localhost:4222");
    let request_subject = args.get(3).map(|s| s.as_str()).unwrap_or("plants.requests");
    let report_subject = args.get(4).map(|s| s.as_str()).unwrap_or("plants.diagnosis");
    let count: u64 = args.get(5).and_then(|s| s.parse().ok()).unwrap_or(1);
    let delay_ms: u64 = args.get(6).and_then(|s| s.parse().ok()).unwrap_or(100);

    info!(
        image = %image_path,
        nats_url = %nats_url,
        request_subject = %request_subject,
        report_subject = %report_subject,
        count = count,
        delay_ms = delay_ms,
        "Configuration loaded"
    );

    let image_bytes = std::fs::read(image_path)?;
    let image_base64 = BASE64.encode(&image_bytes);
    info!(
        bytes = image_bytes.len(),
        encoded = image_base64.len(),
        "Image encoded"
    );

    // Connect to NATS
    let client = match async_nats::connect(nats_url).await {
        Ok(c) => {
            info!("Connected to NATS");
            c
        }
        Err(e) => {
            warn!(error = %e, "Failed to connect to NATS. Running in dry-run mode.");
            // Continue in dry-run mode
            return run_dry_mode(&image_base64, count);
        }
    };

    // Subscribe for reports before publishing so none are missed
    let mut reports = client.subscribe(report_subject.to_string()).await?;

    info!("Publishing {} diagnosis requests...", count);

    for i in 0..count {
        let request = DiagnosisRequest {
            request_id: format!("req_{:06}", i + 1),
            image_base64: image_base64.clone(),
            top_k: None,
            timestamp: Utc::now(),
        };

        let payload = serde_json::to_vec(&request)?;
        client
            .publish(request_subject.to_string(), payload.into())
            .await?;
        info!(request_id = %request.request_id, "Request published");

        match tokio::time::timeout(Duration::from_secs(30), reports.next()).await {
            Ok(Some(message)) => match serde_json::from_slice::<serde_json::Value>(&message.payload)
            {
                Ok(report) => {
                    info!(
                        "Diagnosis report:\n{}",
                        serde_json::to_string_pretty(&report)?
                    );
                }
                Err(e) => warn!(error = %e, "Received unparseable report"),
            },
            Ok(None) => {
                warn!("Report subscription closed");
                break;
            }
            Err(_) => warn!(request_id = %request.request_id, "Timed out waiting for report"),
        }

        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
    }

    info!("Completed! Published {} requests", count);

    Ok(())
}

fn run_dry_mode(image_base64: &str, count: u64) -> anyhow::Result<()> {
    info!("Running in dry-run mode (no NATS connection)");

    for i in 0..count {
        let request = DiagnosisRequest {
            request_id: format!("req_{:06}", i + 1),
            image_base64: image_base64.to_string(),
            top_k: None,
            timestamp: Utc::now(),
        };

        info!(
            request_id = %request.request_id,
            payload_bytes = request.image_base64.len(),
            "Would publish diagnosis request"
        );
    }

    Ok(())
}
