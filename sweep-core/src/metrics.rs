use crate::error::SweepError;
use crate::request::SettlementReceipt;
use chrono::Utc;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub timestamp: String,
    pub batches: BatchMetrics,
    pub performance: PerformanceMetrics,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchMetrics {
    pub total: u64,
    pub settled: u64,
    pub reverted: u64,
    pub bridged: u64,
    pub entries_converted: u64,
    pub success_rate: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PerformanceMetrics {
    pub total_duration_ms: u64,
    pub avg_batch_duration_ms: f64,
    pub min_batch_duration_ms: u64,
    pub max_batch_duration_ms: u64,
}

#[derive(Debug)]
pub struct MetricsCollector {
    batches_total: AtomicU64,
    batches_settled: AtomicU64,
    batches_reverted: AtomicU64,
    batches_bridged: AtomicU64,
    entries_converted: AtomicU64,
    duration_sum_ms: AtomicU64,
    min_duration_ms: AtomicU64,
    max_duration_ms: AtomicU64,
    start_time: Instant,
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self {
            batches_total: AtomicU64::new(0),
            batches_settled: AtomicU64::new(0),
            batches_reverted: AtomicU64::new(0),
            batches_bridged: AtomicU64::new(0),
            entries_converted: AtomicU64::new(0),
            duration_sum_ms: AtomicU64::new(0),
            min_duration_ms: AtomicU64::new(u64::MAX),
            max_duration_ms: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }
}

impl MetricsCollector {
    /// Record one finished batch. Conversions of a reverted batch are not
    /// counted since they were undone.
    pub fn record_batch(
        &self,
        duration: Duration,
        entries_converted: usize,
        outcome: &Result<SettlementReceipt, SweepError>,
    ) {
        self.batches_total.fetch_add(1, Ordering::SeqCst);

        let duration_ms = duration.as_millis() as u64;
        self.duration_sum_ms
            .fetch_add(duration_ms, Ordering::SeqCst);
        self.min_duration_ms.fetch_min(duration_ms, Ordering::SeqCst);
        self.max_duration_ms.fetch_max(duration_ms, Ordering::SeqCst);

        match outcome {
            Ok(receipt) => {
                self.batches_settled.fetch_add(1, Ordering::SeqCst);
                self.entries_converted
                    .fetch_add(entries_converted as u64, Ordering::SeqCst);
                if receipt.bridged {
                    self.batches_bridged.fetch_add(1, Ordering::SeqCst);
                }
            }
            Err(_) => {
                self.batches_reverted.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let total = self.batches_total.load(Ordering::SeqCst);
        let settled = self.batches_settled.load(Ordering::SeqCst);
        let duration_sum = self.duration_sum_ms.load(Ordering::SeqCst);
        let min_duration = self.min_duration_ms.load(Ordering::SeqCst);

        MetricsSnapshot {
            timestamp: Utc::now().to_rfc3339(),
            batches: BatchMetrics {
                total,
                settled,
                reverted: self.batches_reverted.load(Ordering::SeqCst),
                bridged: self.batches_bridged.load(Ordering::SeqCst),
                entries_converted: self.entries_converted.load(Ordering::SeqCst),
                success_rate: if total > 0 {
                    settled as f64 / total as f64 * 100.0
                } else {
                    0.0
                },
            },
            performance: PerformanceMetrics {
                total_duration_ms: duration_sum,
                avg_batch_duration_ms: if total > 0 {
                    duration_sum as f64 / total as f64
                } else {
                    0.0
                },
                min_batch_duration_ms: if min_duration == u64::MAX {
                    0
                } else {
                    min_duration
                },
                max_batch_duration_ms: self.max_duration_ms.load(Ordering::SeqCst),
            },
        }
    }

    pub fn to_json(&self) -> String {
        let snapshot = self.snapshot();
        serde_json::to_string_pretty(&snapshot).unwrap_or_else(|_| "{}".to_string())
    }

    pub async fn export_to_file(&self, path: &str) -> std::io::Result<()> {
        let json = self.to_json();
        tokio::fs::write(path, json).await
    }

    pub fn batches_total(&self) -> u64 {
        self.batches_total.load(Ordering::SeqCst)
    }

    pub fn batches_settled(&self) -> u64 {
        self.batches_settled.load(Ordering::SeqCst)
    }

    pub fn batches_reverted(&self) -> u64 {
        self.batches_reverted.load(Ordering::SeqCst)
    }

    pub fn entries_converted(&self) -> u64 {
        self.entries_converted.load(Ordering::SeqCst)
    }

    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ShapeError;
    use ethers::types::U256;

    fn receipt(bridged: bool) -> SettlementReceipt {
        SettlementReceipt {
            bridged,
            total_output: U256::from(10),
            sequence_id: bridged.then_some(0),
        }
    }

    #[test]
    fn test_metrics_collector() {
        let metrics = MetricsCollector::default();

        metrics.record_batch(Duration::from_millis(10), 3, &Ok(receipt(false)));
        metrics.record_batch(Duration::from_millis(30), 2, &Ok(receipt(true)));
        metrics.record_batch(
            Duration::from_millis(20),
            1,
            &Err(SweepError::Shape(ShapeError::EmptyBatch)),
        );

        assert_eq!(metrics.batches_total(), 3);
        assert_eq!(metrics.batches_settled(), 2);
        assert_eq!(metrics.batches_reverted(), 1);
        assert_eq!(metrics.entries_converted(), 5);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.batches.bridged, 1);
        assert_eq!(snapshot.performance.min_batch_duration_ms, 10);
        assert_eq!(snapshot.performance.max_batch_duration_ms, 30);
        assert!((snapshot.batches.success_rate - 66.67).abs() < 0.1);
    }

    #[tokio::test]
    async fn test_json_export() {
        let metrics = MetricsCollector::default();
        metrics.record_batch(Duration::from_millis(5), 1, &Ok(receipt(false)));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metrics.json");
        metrics
            .export_to_file(path.to_str().unwrap())
            .await
            .unwrap();

        let json = tokio::fs::read_to_string(&path).await.unwrap();
        assert!(json.contains("batches"));
        assert!(json.contains("performance"));
    }
}
