//! Point-in-time statistics read from the warehouse.
//!
//! Both types are snapshots: they may be stale and are never written back.

use serde::{Deserialize, Serialize};

/// Row count and byte size of a referenced table
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TableStatistics {
    /// Number of rows
    pub row_count: u64,

    /// Storage size in bytes
    pub bytes: u64,

    /// Average clustering depth, when the warehouse reports one (lower is better)
    #[serde(default)]
    pub clustering_depth: Option<f64>,
}

impl TableStatistics {
    pub fn new(row_count: u64, bytes: u64) -> Self {
        Self {
            row_count,
            bytes,
            clustering_depth: None,
        }
    }

    /// Sum rows and bytes over a set of tables.
    pub fn total<'a, I>(tables: I) -> TableStatistics
    where
        I: IntoIterator<Item = &'a TableStatistics>,
    {
        tables
            .into_iter()
            .fold(TableStatistics::default(), |acc, t| TableStatistics {
                row_count: acc.row_count.saturating_add(t.row_count),
                bytes: acc.bytes.saturating_add(t.bytes),
                clustering_depth: None,
            })
    }
}

/// Execution history for one query fingerprint within a lookback window
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct HistoricalStats {
    /// Number of successful executions observed
    pub sample_count: u64,
    pub median_seconds: f64,
    pub average_seconds: f64,
    pub min_seconds: f64,
    pub max_seconds: f64,
}

impl HistoricalStats {
    /// No recorded executions.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build statistics from raw durations. Non-finite and negative samples are dropped.
    pub fn from_durations(durations: &[f64]) -> Self {
        let mut samples: Vec<f64> = durations
            .iter()
            .copied()
            .filter(|d| d.is_finite() && *d >= 0.0)
            .collect();
        if samples.is_empty() {
            return Self::empty();
        }
        samples.sort_by(|a, b| a.total_cmp(b));

        let n = samples.len();
        let median = if n % 2 == 1 {
            samples[n / 2]
        } else {
            (samples[n / 2 - 1] + samples[n / 2]) / 2.0
        };

        Self {
            sample_count: n as u64,
            median_seconds: median,
            average_seconds: samples.iter().sum::<f64>() / n as f64,
            min_seconds: samples[0],
            max_seconds: samples[n - 1],
        }
    }

    pub fn is_empty(&self) -> bool {
        self.sample_count == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_history_from_odd_durations() {
        let stats = HistoricalStats::from_durations(&[30.0, 10.0, 20.0]);
        assert_eq!(stats.sample_count, 3);
        assert_eq!(stats.median_seconds, 20.0);
        assert_eq!(stats.average_seconds, 20.0);
        assert_eq!(stats.min_seconds, 10.0);
        assert_eq!(stats.max_seconds, 30.0);
    }

    #[test]
    fn test_history_from_even_durations() {
        let stats = HistoricalStats::from_durations(&[10.0, 40.0, 20.0, 30.0]);
        assert_eq!(stats.median_seconds, 25.0);
    }

    #[test]
    fn test_history_drops_bad_samples() {
        let stats = HistoricalStats::from_durations(&[f64::NAN, -1.0]);
        assert!(stats.is_empty());
    }

    #[test]
    fn test_table_total() {
        let tables = [TableStatistics::new(10, 100), TableStatistics::new(5, 50)];
        let total = TableStatistics::total(&tables);
        assert_eq!(total.row_count, 15);
        assert_eq!(total.bytes, 150);
    }
}
