//! Configuration management for the plant diagnosis pipeline

use anyhow::{Context, Result};
use config::{Config, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub nats: NatsConfig,
    pub registry: RegistryConfig,
    pub models: ModelsConfig,
    pub pipeline: PipelineConfig,
    pub logging: LoggingConfig,
}

/// NATS connection configuration
#[derive(Debug, Clone, Deserialize)]
pub struct NatsConfig {
    /// NATS server URL
    pub url: String,
    /// Subject for incoming leaf-image requests
    pub request_subject: String,
    /// Subject for outgoing diagnosis reports
    pub report_subject: String,
}

/// Model registry configuration
#[derive(Debug, Clone, Deserialize)]
pub struct RegistryConfig {
    /// Path to the model registry JSON document
    pub path: PathBuf,
}

/// ONNX session configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ModelsConfig {
    /// Number of threads for ONNX inference per model (default: 1)
    #[serde(default = "default_onnx_threads")]
    pub onnx_threads: usize,
}

fn default_onnx_threads() -> usize {
    1
}

/// Pipeline configuration
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    /// Number of concurrent diagnosis workers
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Ranked pairs returned per stage when a request carries no override
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

fn default_workers() -> usize {
    4
}

fn default_top_k() -> usize {
    2
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Log format (json, pretty)
    pub format: String,
}

impl AppConfig {
    /// Load configuration from file
    pub fn load() -> Result<Self> {
        Self::load_from_path("config/config.toml")
    }

    /// Load configuration from a specific path
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from(path.as_ref()))
            .build()
            .context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            nats: NatsConfig {
                url: "nats://localhost:4222".to_string(),
                request_subject: "plants.requests".to_string(),
                report_subject: "plants.diagnosis".to_string(),
            },
            registry: RegistryConfig {
                path: PathBuf::from("config/model_registry.json"),
            },
            models: ModelsConfig { onnx_threads: 1 },
            pipeline: PipelineConfig {
                workers: 4,
                top_k: 2,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                format: "json".to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.nats.url, "nats://localhost:4222");
        assert_eq!(config.nats.request_subject, "plants.requests");
        assert_eq!(config.nats.report_subject, "plants.diagnosis");
        assert_eq!(
            config.registry.path,
            PathBuf::from("config/model_registry.json")
        );
        assert_eq!(config.models.onnx_threads, 1);
        assert_eq!(config.pipeline.workers, 4);
        assert_eq!(config.pipeline.top_k, 2);
    }

    #[test]
    fn test_defaults_match_serde_fallbacks() {
        assert_eq!(default_onnx_threads(), 1);
        assert_eq!(default_workers(), 4);
        assert_eq!(default_top_k(), 2);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        assert!(AppConfig::load_from_path("does/not/exist.toml").is_err());
    }
}
