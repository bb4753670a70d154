//! Plant Diagnosis Pipeline - Main Entry Point
//!
//! Consumes leaf-image requests from NATS, runs the classifier cascade, and
//! publishes diagnosis reports. Requests are processed in parallel; the
//! blocking inference itself runs on dedicated worker threads.

use anyhow::{Context, Result};
use futures::StreamExt;
use plant_diagnosis_pipeline::{
    config::AppConfig,
    consumer::RequestConsumer,
    metrics::{MetricsReporter, PipelineMetrics},
    models::{CascadeController, ModelLoader, ModelStore},
    preprocess::ImagePreprocessor,
    producer::ReportProducer,
    registry::Registry,
    types::{DiagnosisReport, DiagnosisRequest},
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("plant_diagnosis_pipeline=info".parse()?),
        )
        .init();

    info!("Starting Plant Diagnosis Pipeline");

    // Load configuration
    let config = AppConfig::load()?;
    info!("Configuration loaded successfully");

    // Load and validate the model registry
    let registry =
        Registry::load(&config.registry.path).context("Failed to load model registry")?;

    // Resolve every registered classifier up front
    let loader = ModelLoader::with_threads(config.models.onnx_threads)?;
    let store = Arc::new(ModelStore::build(&registry, &loader)?);
    info!(
        species_classes = store.species_labels().len(),
        disease_models = ?store.disease_species(),
        nutrients = store.nutrient_classifier().is_some(),
        "Model store initialized"
    );

    let controller = Arc::new(CascadeController::new(store));
    let preprocessor = Arc::new(ImagePreprocessor::new());

    // Initialize metrics
    let metrics = Arc::new(PipelineMetrics::new());

    // Connect to NATS
    let client = async_nats::connect(&config.nats.url).await?;
    info!("Connected to NATS at {}", config.nats.url);

    // Initialize consumer and producer
    let consumer = RequestConsumer::new(client.clone(), &config.nats.request_subject);
    let producer = Arc::new(ReportProducer::new(client.clone(), &config.nats.report_subject));

    // Parallel processing configuration
    let num_workers = config.pipeline.workers;
    info!(
        "Starting diagnosis loop with {} parallel workers",
        num_workers
    );
    info!("Listening on subject: {}", config.nats.request_subject);
    info!("Publishing reports to: {}", config.nats.report_subject);

    // Semaphore to limit concurrent in-flight requests
    let semaphore = Arc::new(Semaphore::new(num_workers));
    let processed_count = Arc::new(AtomicU64::new(0));

    // Wrap config in Arc for sharing
    let config = Arc::new(config);

    // Start metrics reporter (prints summary every 30 seconds)
    let metrics_clone = metrics.clone();
    tokio::spawn(async move {
        let reporter = MetricsReporter::new(metrics_clone, 30);
        reporter.start().await;
    });

    // Process requests in parallel
    let mut subscription = consumer.subscribe().await?;

    while let Some(message) = subscription.next().await {
        // Acquire permit (limits concurrent tasks)
        let permit = semaphore.clone().acquire_owned().await?;

        // Clone shared resources for the spawned task
        let controller = controller.clone();
        let preprocessor = preprocessor.clone();
        let producer = producer.clone();
        let metrics = metrics.clone();
        let config = config.clone();
        let processed_count = processed_count.clone();

        // Spawn task to process this request
        tokio::spawn(async move {
            let start_time = Instant::now();

            let request = match serde_json::from_slice::<DiagnosisRequest>(&message.payload) {
                Ok(request) => request,
                Err(e) => {
                    warn!(error = %e, "Failed to deserialize diagnosis request");
                    drop(permit);
                    return;
                }
            };

            let request_id = request.request_id.clone();
            let k = request.top_k.unwrap_or(config.pipeline.top_k);

            // Decode and inference are blocking compute; keep both off the
            // async runtime.
            let outcome = tokio::task::spawn_blocking(move || {
                let preprocess_start = Instant::now();
                let tensor = preprocessor.from_base64(&request.image_base64)?;
                let preprocess_time = preprocess_start.elapsed();

                let inference_start = Instant::now();
                let result = controller.recognize(&tensor, k);
                Ok::<_, anyhow::Error>((preprocess_time, inference_start.elapsed(), result))
            })
            .await;

            let (preprocess_time, inference_time, result) = match outcome {
                Ok(Ok(timed)) => timed,
                Ok(Err(e)) => {
                    warn!(
                        request_id = %request_id,
                        error = %e,
                        "Failed to decode image payload"
                    );
                    drop(permit);
                    return;
                }
                Err(e) => {
                    error!(
                        request_id = %request_id,
                        error = %e,
                        "Diagnosis task failed to complete"
                    );
                    drop(permit);
                    return;
                }
            };
            metrics.record_stage_time("preprocess", preprocess_time);

            match result {
                Ok(diagnosis) => {
                    metrics.record_stage_time("inference", inference_time);
                    let processing_time = start_time.elapsed();
                    let report = DiagnosisReport::new(request_id.clone(), diagnosis, processing_time);

                    // Record metrics
                    metrics.record_image(processing_time, report.species_confidence());
                    metrics.record_report(&report.resolved_species);

                    if let Err(e) = producer.publish(&report).await {
                        error!(
                            request_id = %request_id,
                            error = %e,
                            "Failed to publish diagnosis report"
                        );
                    } else {
                        info!(
                            request_id = %request_id,
                            species = %report.resolved_species,
                            disease_detected = report.disease_detected,
                            deficiency_detected = report.deficiency_detected,
                            processing_time_us = processing_time.as_micros() as u64,
                            "Diagnosis report published"
                        );
                    }

                    let count = processed_count.fetch_add(1, Ordering::Relaxed) + 1;

                    // Log progress every 100 images
                    if count % 100 == 0 {
                        let throughput = metrics.get_throughput();
                        let processing_stats = metrics.get_processing_stats();
                        info!(
                            processed = count,
                            throughput = format!("{:.1} img/s", throughput),
                            avg_latency_us = processing_stats.mean_us,
                            "Processing milestone"
                        );
                    }
                }
                Err(e) => {
                    error!(
                        request_id = %request_id,
                        error = %e,
                        "Inference failed"
                    );
                }
            }

            // Release permit when done
            drop(permit);
        });
    }

    // Print final summary
    info!("Pipeline shutting down...");
    metrics.print_summary();

    Ok(())
}
