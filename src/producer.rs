//! NATS message producer for diagnosis reports

use crate::types::diagnosis::DiagnosisReport;
use anyhow::Result;
use async_nats::Client;
use tracing::debug;

/// Producer for publishing diagnosis reports to NATS
#[derive(Clone)]
pub struct ReportProducer {
    client: Client,
    subject: String,
}

impl ReportProducer {
    /// Create a new report producer
    pub fn new(client: Client, subject: &str) -> Self {
        Self {
            client,
            subject: subject.to_string(),
        }
    }

    /// Publish a diagnosis report
    pub async fn publish(&self, report: &DiagnosisReport) -> Result<()> {
        let payload = serde_json::to_vec(report)?;

        self.client
            .publish(self.subject.clone(), payload.into())
            .await?;

        debug!(
            report_id = %report.report_id,
            request_id = %report.request_id,
            species = %report.resolved_species,
            "Published diagnosis report"
        );

        Ok(())
    }

    /// Get the subject name
    pub fn subject(&self) -> &str {
        &self.subject
    }
}

#[cfg(test)]
mod tests {
    // Integration tests would require a running NATS server
}
