//! Threshold alerts with cooldown suppression and best-effort dispatch.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, info, warn};

use crate::config::AlertConfig;
use crate::emit;
use crate::error::NotifyError;
use crate::metrics::events::AlertRaised;

/// Severity of an alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertLevel {
    Info,
    Warning,
    Error,
}

impl AlertLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertLevel::Info => "info",
            AlertLevel::Warning => "warning",
            AlertLevel::Error => "error",
        }
    }
}

/// A raised alert, kept in history and handed to notification sinks.
#[derive(Debug, Clone, Serialize)]
pub struct Alert {
    pub level: AlertLevel,
    pub source: String,
    pub message: String,
    /// Metric that crossed its threshold, e.g. `error_rate`.
    pub metric: String,
    pub value: f64,
    pub threshold: f64,
    pub timestamp: DateTime<Utc>,
}

/// Delivery channel for alerts. Dispatch is best-effort: failures are
/// logged and never fail the run.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn send(&self, alert: &Alert) -> Result<(), NotifyError>;
}

/// Point-in-time resource usage, as fractions in `[0, 1]`.
#[derive(Debug, Clone, Copy)]
pub struct ResourceUsage {
    pub cpu: f64,
    pub memory: f64,
    pub disk: f64,
}

#[derive(Default)]
struct AlertState {
    history: Vec<Alert>,
    /// Last fire time per (source, metric), for cooldown suppression.
    last_fired: HashMap<(String, String), DateTime<Utc>>,
}

/// Evaluates metric values against configured thresholds and manages
/// alert history.
///
/// A repeat alert for the same source and metric within the cooldown
/// window is suppressed.
pub struct AlertManager {
    config: AlertConfig,
    sinks: Vec<Arc<dyn NotificationSink>>,
    state: Mutex<AlertState>,
}

impl AlertManager {
    pub fn new(config: AlertConfig) -> Self {
        Self {
            config,
            sinks: Vec::new(),
            state: Mutex::new(AlertState::default()),
        }
    }

    pub fn add_sink(&mut self, sink: Arc<dyn NotificationSink>) {
        self.sinks.push(sink);
    }

    /// Check ingestion-level metrics against thresholds.
    pub async fn check_ingestion(
        &self,
        source: &str,
        error_rate: f64,
        avg_latency_secs: f64,
        avg_quality_score: Option<f64>,
    ) {
        if error_rate > self.config.error_rate_threshold {
            self.raise(
                AlertLevel::Error,
                source,
                "error_rate",
                error_rate,
                self.config.error_rate_threshold,
                format!("Error rate {error_rate:.3} exceeds threshold"),
            )
            .await;
        }

        if avg_latency_secs > self.config.latency_threshold_secs {
            self.raise(
                AlertLevel::Warning,
                source,
                "latency",
                avg_latency_secs,
                self.config.latency_threshold_secs,
                format!("Average batch latency {avg_latency_secs:.2}s exceeds threshold"),
            )
            .await;
        }

        if let Some(score) = avg_quality_score
            && score < self.config.quality_score_threshold
        {
            self.raise(
                AlertLevel::Warning,
                source,
                "quality_score",
                score,
                self.config.quality_score_threshold,
                format!("Average quality score {score:.3} below threshold"),
            )
            .await;
        }
    }

    /// Check host resource usage against thresholds.
    pub async fn check_resources(&self, source: &str, usage: ResourceUsage) {
        for (metric, value, threshold) in [
            ("cpu", usage.cpu, self.config.cpu_threshold),
            ("memory", usage.memory, self.config.memory_threshold),
            ("disk", usage.disk, self.config.disk_threshold),
        ] {
            if value > threshold {
                self.raise(
                    AlertLevel::Warning,
                    source,
                    metric,
                    value,
                    threshold,
                    format!("{metric} usage {value:.2} exceeds threshold"),
                )
                .await;
            }
        }
    }

    /// Record an alert, subject to cooldown suppression, and dispatch it
    /// to notification sinks when enabled.
    pub async fn raise(
        &self,
        level: AlertLevel,
        source: &str,
        metric: &str,
        value: f64,
        threshold: f64,
        message: String,
    ) {
        let now = Utc::now();
        let alert = {
            let mut state = self.state.lock().unwrap();

            let key = (source.to_string(), metric.to_string());
            if let Some(last) = state.last_fired.get(&key)
                && (now - *last).num_seconds() < self.config.cooldown_secs as i64
            {
                return;
            }
            state.last_fired.insert(key, now);

            let alert = Alert {
                level,
                source: source.to_string(),
                message,
                metric: metric.to_string(),
                value,
                threshold,
                timestamp: now,
            };
            state.history.push(alert.clone());
            alert
        };

        match level {
            AlertLevel::Error => {
                error!(source, metric, value, threshold, "{}", alert.message);
            }
            AlertLevel::Warning => {
                warn!(source, metric, value, threshold, "{}", alert.message);
            }
            AlertLevel::Info => {
                info!(source, metric, value, threshold, "{}", alert.message);
            }
        }
        emit!(AlertRaised {
            level: level.as_str(),
            source: source.to_string(),
        });

        if self.config.enable_notifications {
            for sink in &self.sinks {
                if let Err(e) = sink.send(&alert).await {
                    warn!(source, metric, error = %e, "Notification dispatch failed");
                }
            }
        }
    }

    /// Alerts within the inclusive time range, optionally filtered by
    /// level.
    pub fn history(
        &self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
        level: Option<AlertLevel>,
    ) -> Vec<Alert> {
        let state = self.state.lock().unwrap();
        state
            .history
            .iter()
            .filter(|alert| {
                start.is_none_or(|s| alert.timestamp >= s)
                    && end.is_none_or(|e| alert.timestamp <= e)
                    && level.is_none_or(|l| alert.level == l)
            })
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn manager() -> AlertManager {
        AlertManager::new(AlertConfig::default())
    }

    struct CountingSink {
        sent: AtomicUsize,
    }

    #[async_trait]
    impl NotificationSink for CountingSink {
        async fn send(&self, _alert: &Alert) -> Result<(), NotifyError> {
            self.sent.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_error_rate_above_threshold_fires_error_alert() {
        let manager = manager();

        // 6 errors out of 100 records.
        manager.check_ingestion("events", 0.06, 0.5, None).await;

        let alerts = manager.history(None, None, None);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].level, AlertLevel::Error);
        assert_eq!(alerts[0].metric, "error_rate");
        assert!((alerts[0].value - 0.06).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_healthy_metrics_fire_nothing() {
        let manager = manager();

        manager.check_ingestion("events", 0.01, 0.5, Some(0.95)).await;

        assert!(manager.history(None, None, None).is_empty());
    }

    #[tokio::test]
    async fn test_latency_and_quality_fire_warnings() {
        let manager = manager();

        manager.check_ingestion("events", 0.0, 3.5, Some(0.7)).await;

        let warnings = manager.history(None, None, Some(AlertLevel::Warning));
        assert_eq!(warnings.len(), 2);
        let metrics: Vec<_> = warnings.iter().map(|a| a.metric.as_str()).collect();
        assert!(metrics.contains(&"latency"));
        assert!(metrics.contains(&"quality_score"));
    }

    #[tokio::test]
    async fn test_cooldown_suppresses_repeat_alerts() {
        let manager = manager();

        manager.check_ingestion("events", 0.5, 0.0, None).await;
        manager.check_ingestion("events", 0.5, 0.0, None).await;
        manager.check_ingestion("events", 0.5, 0.0, None).await;

        assert_eq!(manager.history(None, None, None).len(), 1);
    }

    #[tokio::test]
    async fn test_cooldown_is_per_source_and_metric() {
        let manager = manager();

        manager.check_ingestion("a", 0.5, 0.0, None).await;
        manager.check_ingestion("b", 0.5, 0.0, None).await;
        // Different metric for the same source also fires.
        manager.check_ingestion("a", 0.0, 9.0, None).await;

        assert_eq!(manager.history(None, None, None).len(), 3);
    }

    #[tokio::test]
    async fn test_resource_usage_above_thresholds() {
        let manager = manager();

        manager
            .check_resources(
                "host",
                ResourceUsage {
                    cpu: 0.9,
                    memory: 0.5,
                    disk: 0.99,
                },
            )
            .await;

        let alerts = manager.history(None, None, None);
        assert_eq!(alerts.len(), 2);
        assert!(alerts.iter().all(|a| a.level == AlertLevel::Warning));
    }

    #[tokio::test]
    async fn test_notifications_dispatch_when_enabled() {
        let config = AlertConfig {
            enable_notifications: true,
            ..AlertConfig::default()
        };
        let mut manager = AlertManager::new(config);
        let sink = Arc::new(CountingSink {
            sent: AtomicUsize::new(0),
        });
        manager.add_sink(sink.clone());

        manager.check_ingestion("events", 0.5, 0.0, None).await;

        assert_eq!(sink.sent.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_history_time_range_is_inclusive() {
        let manager = manager();
        manager.check_ingestion("events", 0.5, 0.0, None).await;

        let ts = manager.history(None, None, None)[0].timestamp;
        assert_eq!(manager.history(Some(ts), Some(ts), None).len(), 1);
        assert!(
            manager
                .history(Some(ts + chrono::Duration::seconds(1)), None, None)
                .is_empty()
        );
    }
}
