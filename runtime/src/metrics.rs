//! Prometheus metrics for the publish loop.
//!
//! The loop records through the `metrics` facade; without an installed
//! recorder every call is a no-op. A hosting process that wants Prometheus
//! exposition installs the recorder once with [`MetricsExporter::install`]
//! and serves [`MetricsExporter::render`] however it likes.
//!
//! # Example
//!
//! ```rust,no_run
//! use publisher_runtime::metrics::MetricsExporter;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let exporter = MetricsExporter::install()?;
//!
//! // ... publish requests ...
//!
//! if let Some(text) = exporter.render() {
//!     println!("{text}");
//! }
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use metrics::{describe_counter, describe_histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use publisher_core::ErrorKind;
use thiserror::Error;

// Re-export metrics macros for use in other modules
pub use metrics::{counter, histogram};

/// Errors from metrics operations.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// Failed to build metrics exporter
    #[error("Failed to build metrics exporter: {0}")]
    Build(String),
    /// Failed to install metrics exporter
    #[error("Failed to install metrics exporter: {0}")]
    Install(String),
}

/// Installed Prometheus recorder.
pub struct MetricsExporter {
    handle: Option<PrometheusHandle>,
}

impl MetricsExporter {
    /// Register metric descriptions and install the Prometheus recorder.
    ///
    /// # Errors
    ///
    /// Returns error if the exporter cannot be built or installed.
    ///
    /// # Note
    ///
    /// If a recorder is already installed (e.g., in tests), the exporter is
    /// returned without a handle and metrics keep flowing to the existing
    /// recorder.
    pub fn install() -> Result<Self, MetricsError> {
        register_metrics();

        let builder = PrometheusBuilder::new()
            .set_buckets_for_metric(
                Matcher::Suffix("duration_seconds".to_string()),
                &[
                    0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0,
                ],
            )
            .map_err(|e| MetricsError::Build(e.to_string()))?;

        match builder.install_recorder() {
            Ok(handle) => {
                tracing::info!("Prometheus metrics recorder installed");
                Ok(Self {
                    handle: Some(handle),
                })
            }
            Err(e) => {
                let err_msg = e.to_string();
                if err_msg.contains("already initialized") {
                    tracing::warn!("Metrics recorder already initialized, skipping re-initialization");
                    Ok(Self { handle: None })
                } else {
                    Err(MetricsError::Install(err_msg))
                }
            }
        }
    }

    /// Get the metrics handle for rendering.
    #[must_use]
    pub const fn handle(&self) -> Option<&PrometheusHandle> {
        self.handle.as_ref()
    }

    /// Render current metrics in Prometheus format.
    ///
    /// Returns `None` if another recorder was already installed.
    #[must_use]
    pub fn render(&self) -> Option<String> {
        self.handle.as_ref().map(PrometheusHandle::render)
    }
}

/// Register all metric descriptions.
pub fn register_metrics() {
    describe_counter!(
        "publisher_requests_total",
        "Total number of publish calls"
    );
    describe_counter!(
        "publisher_attempts_total",
        "Total number of publish attempts, retries included"
    );
    describe_counter!(
        "publisher_retries_total",
        "Total number of fresh attempts started after a retry signal"
    );
    describe_counter!(
        "publisher_failures_total",
        "Total number of failed attempts, by error kind"
    );
    describe_counter!(
        "publisher_handler_failures_total",
        "Total number of failures raised by the exception hook or cleanup"
    );
    describe_histogram!(
        "publisher_publish_duration_seconds",
        "Time taken by a publish call, retries included"
    );
}

/// Publish loop metrics recorder.
pub struct PublishMetrics;

impl PublishMetrics {
    /// Record a finished publish call.
    pub fn record_request(duration: Duration) {
        counter!("publisher_requests_total").increment(1);
        histogram!("publisher_publish_duration_seconds").record(duration.as_secs_f64());
    }

    /// Record the start of an attempt.
    pub fn record_attempt() {
        counter!("publisher_attempts_total").increment(1);
    }

    /// Record a fresh attempt after a retry signal.
    pub fn record_retry() {
        counter!("publisher_retries_total").increment(1);
    }

    /// Record a failed attempt.
    pub fn record_failure(kind: ErrorKind) {
        counter!("publisher_failures_total", "kind" => kind.as_str()).increment(1);
    }

    /// Record a failure of the exception hook or of cleanup.
    pub fn record_handler_failure() {
        counter!("publisher_handler_failures_total").increment(1);
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn test_render_after_recording() {
        let exporter = MetricsExporter::install().unwrap();

        PublishMetrics::record_attempt();
        PublishMetrics::record_failure(ErrorKind::NotFound);
        PublishMetrics::record_request(Duration::from_millis(3));

        // If another test installed the recorder first, handle is None.
        if let Some(rendered) = exporter.render() {
            assert!(rendered.contains("publisher_attempts_total"));
            assert!(rendered.contains("kind=\"not_found\""));
        }
    }

    #[test]
    fn test_recording_without_recorder_is_harmless() {
        PublishMetrics::record_retry();
        PublishMetrics::record_handler_failure();
    }
}
