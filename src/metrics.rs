//! Performance metrics and statistics tracking for the diagnosis pipeline.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use std::time::{Duration, Instant};
use tracing::info;

/// Metrics collector for pipeline performance
pub struct PipelineMetrics {
    /// Total images processed
    pub images_processed: AtomicU64,
    /// Total diagnosis reports published
    pub reports_published: AtomicU64,
    /// Reports by resolved species
    reports_by_species: RwLock<HashMap<String, u64>>,
    /// End-to-end processing times (in microseconds)
    processing_times: RwLock<Vec<u64>>,
    /// Per-stage inference times (in microseconds)
    stage_times: RwLock<HashMap<String, Vec<u64>>>,
    /// Top-1 species confidence distribution buckets
    confidence_buckets: RwLock<[u64; 10]>,
    /// Start time for rate calculation
    start_time: Instant,
}

impl PipelineMetrics {
    /// Create a new metrics collector
    pub fn new() -> Self {
        Self {
            images_processed: AtomicU64::new(0),
            reports_published: AtomicU64::new(0),
            reports_by_species: RwLock::new(HashMap::new()),
            processing_times: RwLock::new(Vec::with_capacity(1000)),
            stage_times: RwLock::new(HashMap::new()),
            confidence_buckets: RwLock::new([0; 10]),
            start_time: Instant::now(),
        }
    }

    /// Record one processed image with its end-to-end time and the top-1
    /// species confidence
    pub fn record_image(&self, processing_time: Duration, species_confidence: f64) {
        self.images_processed.fetch_add(1, Ordering::Relaxed);

        if let Ok(mut times) = self.processing_times.write() {
            times.push(processing_time.as_micros() as u64);
            // Keep only last 10000 for memory efficiency
            if times.len() > 10000 {
                times.drain(0..5000);
            }
        }

        let bucket = (species_confidence.clamp(0.0, 1.0) * 10.0).min(9.0) as usize;
        if let Ok(mut buckets) = self.confidence_buckets.write() {
            buckets[bucket] += 1;
        }
    }

    /// Record a published report
    pub fn record_report(&self, resolved_species: &str) {
        self.reports_published.fetch_add(1, Ordering::Relaxed);

        if let Ok(mut by_species) = self.reports_by_species.write() {
            *by_species.entry(resolved_species.to_string()).or_insert(0) += 1;
        }
    }

    /// Record a single cascade stage's inference time
    pub fn record_stage_time(&self, stage: &str, duration: Duration) {
        if let Ok(mut times) = self.stage_times.write() {
            let stage_times = times.entry(stage.to_string()).or_insert_with(Vec::new);
            stage_times.push(duration.as_micros() as u64);
            // Keep only last 1000 per stage
            if stage_times.len() > 1000 {
                stage_times.drain(0..500);
            }
        }
    }

    /// Get processing time statistics
    pub fn get_processing_stats(&self) -> ProcessingStats {
        let times = match self.processing_times.read() {
            Ok(times) => times,
            Err(_) => return ProcessingStats::default(),
        };
        if times.is_empty() {
            return ProcessingStats::default();
        }

        let mut sorted: Vec<u64> = times.clone();
        sorted.sort();

        let sum: u64 = sorted.iter().sum();
        let count = sorted.len();

        ProcessingStats {
            count: count as u64,
            mean_us: sum / count as u64,
            p50_us: sorted[count / 2],
            p95_us: sorted[(count as f64 * 0.95) as usize],
            p99_us: sorted[(count as f64 * 0.99) as usize],
            max_us: *sorted.last().unwrap_or(&0),
        }
    }

    /// Get per-stage inference statistics
    pub fn get_stage_stats(&self) -> HashMap<String, StageStats> {
        let times = match self.stage_times.read() {
            Ok(times) => times,
            Err(_) => return HashMap::new(),
        };
        let mut stats = HashMap::new();

        for (stage, stage_times) in times.iter() {
            if stage_times.is_empty() {
                continue;
            }

            let mut sorted: Vec<u64> = stage_times.clone();
            sorted.sort();

            let sum: u64 = sorted.iter().sum();
            let count = sorted.len();

            stats.insert(
                stage.clone(),
                StageStats {
                    calls: count as u64,
                    mean_us: sum / count as u64,
                    p50_us: sorted[count / 2],
                    p99_us: sorted[(count as f64 * 0.99) as usize],
                },
            );
        }

        stats
    }

    /// Get current throughput (images per second)
    pub fn get_throughput(&self) -> f64 {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.images_processed.load(Ordering::Relaxed) as f64 / elapsed
        } else {
            0.0
        }
    }

    /// Get the species confidence distribution
    pub fn get_confidence_distribution(&self) -> [u64; 10] {
        self.confidence_buckets
            .read()
            .map(|buckets| *buckets)
            .unwrap_or([0; 10])
    }

    /// Get report counts by resolved species
    pub fn get_reports_by_species(&self) -> HashMap<String, u64> {
        self.reports_by_species
            .read()
            .map(|by_species| by_species.clone())
            .unwrap_or_default()
    }

    /// Print summary statistics
    pub fn print_summary(&self) {
        let image_count = self.images_processed.load(Ordering::Relaxed);
        let report_count = self.reports_published.load(Ordering::Relaxed);

        let processing = self.get_processing_stats();
        let throughput = self.get_throughput();
        let by_species = self.get_reports_by_species();
        let confidence_dist = self.get_confidence_distribution();

        info!("════════ PLANT DIAGNOSIS PIPELINE - METRICS SUMMARY ════════");
        info!(
            "Images processed: {} | Reports published: {} | Throughput: {:.1} img/s",
            image_count, report_count, throughput
        );
        info!(
            "Processing time (μs): mean={} p50={} p95={} p99={} max={}",
            processing.mean_us,
            processing.p50_us,
            processing.p95_us,
            processing.p99_us,
            processing.max_us
        );

        if !by_species.is_empty() {
            info!("Reports by species:");
            for (species, count) in &by_species {
                let pct = if report_count > 0 {
                    (*count as f64 / report_count as f64) * 100.0
                } else {
                    0.0
                };
                info!("  {}: {} ({:.1}%)", species, count, pct);
            }
        }

        let total: u64 = confidence_dist.iter().sum();
        if total > 0 {
            info!("Species confidence distribution:");
            for (i, &count) in confidence_dist.iter().enumerate() {
                let pct = (count as f64 / total as f64) * 100.0;
                let bar_len = (pct / 2.0) as usize;
                let bar: String = "█".repeat(bar_len.min(20));
                info!(
                    "  {:.1}-{:.1}: {} ({:.1}%) {}",
                    i as f64 / 10.0,
                    (i + 1) as f64 / 10.0,
                    count,
                    pct,
                    bar
                );
            }
        }

        let stage_stats = self.get_stage_stats();
        if !stage_stats.is_empty() {
            info!("Stage inference times (μs):");
            for (stage, stats) in &stage_stats {
                info!(
                    "  {}: mean={} p50={} p99={} (calls={})",
                    stage, stats.mean_us, stats.p50_us, stats.p99_us, stats.calls
                );
            }
        }
        info!("════════════════════════════════════════════════════════════");
    }
}

impl Default for PipelineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Processing time statistics
#[derive(Debug, Default)]
pub struct ProcessingStats {
    pub count: u64,
    pub mean_us: u64,
    pub p50_us: u64,
    pub p95_us: u64,
    pub p99_us: u64,
    pub max_us: u64,
}

/// Per-stage inference statistics
#[derive(Debug)]
pub struct StageStats {
    pub calls: u64,
    pub mean_us: u64,
    pub p50_us: u64,
    pub p99_us: u64,
}

/// Real-time metrics reporter that prints periodic summaries
pub struct MetricsReporter {
    metrics: std::sync::Arc<PipelineMetrics>,
    interval_secs: u64,
}

impl MetricsReporter {
    pub fn new(metrics: std::sync::Arc<PipelineMetrics>, interval_secs: u64) -> Self {
        Self {
            metrics,
            interval_secs,
        }
    }

    /// Start the periodic reporting task
    pub async fn start(self) {
        let mut interval = tokio::time::interval(Duration::from_secs(self.interval_secs));
        loop {
            interval.tick().await;
            self.metrics.print_summary();
        }
    }
}
