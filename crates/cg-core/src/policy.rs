//! Cost policy parsed from costguard.yml
//!
//! The policy is loaded once per run and is read-only afterwards. All
//! validation (glob syntax, warehouse size, rates) happens here so that a bad
//! configuration fails the run before any job is estimated.

use crate::error::{CoreError, CoreResult};
use crate::pattern::GlobPattern;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// File names searched for in the project directory, in order.
pub const POLICY_FILE_NAMES: &[&str] = &["costguard.yml", "costguard.yaml"];

/// Run-scoped cost policy
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Policy {
    /// Master switch; when off nothing is estimated and `run` goes straight
    /// to the command
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Dollars per warehouse credit
    #[serde(default = "default_cost_per_credit")]
    pub cost_per_credit: f64,

    /// Static warehouse rate; disables size detection when set
    #[serde(default)]
    pub warehouse_credits_per_hour: Option<f64>,

    /// Warehouse size (e.g. `MEDIUM`, `X-LARGE`); used when no static rate is set
    #[serde(default)]
    pub warehouse_size: Option<String>,

    /// Warehouse whose size is looked up when neither rate nor size is configured
    #[serde(default)]
    pub warehouse_name: Option<String>,

    /// Dollar thresholds and verdict posture
    #[serde(default)]
    pub thresholds: ThresholdConfig,

    /// Ordered per-job overrides; the first matching pattern wins
    #[serde(default)]
    pub overrides: Vec<OverrideRule>,

    /// Jobs matching any of these patterns are neither estimated nor counted
    #[serde(default)]
    pub skip: Vec<GlobPattern>,

    /// Estimation tiers, windows, timeouts and constants
    #[serde(default)]
    pub estimation: EstimationConfig,
}

/// Dollar thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ThresholdConfig {
    /// Default per-job threshold in dollars
    #[serde(default = "default_threshold")]
    pub per_job: f64,

    /// Threshold for the sum over all non-skipped jobs
    #[serde(default = "default_threshold")]
    pub total_run: f64,

    /// Block instead of warn when a threshold is exceeded
    #[serde(default)]
    pub fail_on_violation: bool,

    /// Complexity score above which a job is flagged as an expensive pattern
    #[serde(default = "default_complexity_warning")]
    pub complexity_warning: u8,

    /// Scaled cost above which a job is flagged as an expensive pattern
    #[serde(default = "default_scaled_cost_limit")]
    pub scaled_cost_limit: f64,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            per_job: default_threshold(),
            total_run: default_threshold(),
            fail_on_violation: false,
            complexity_warning: default_complexity_warning(),
            scaled_cost_limit: default_scaled_cost_limit(),
        }
    }
}

/// One entry of the ordered override list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OverrideRule {
    /// Job name pattern; a pattern without wildcards is an exact-name override
    pub pattern: GlobPattern,

    /// Per-job threshold for matching jobs
    #[serde(default)]
    pub threshold: Option<f64>,

    /// Skip matching jobs entirely
    #[serde(default)]
    pub skip: bool,
}

/// Estimation behaviour
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EstimationConfig {
    /// Try the EXPLAIN-plan tier
    #[serde(default = "default_true")]
    pub use_explain_plans: bool,

    /// Try the execution-history tier
    #[serde(default = "default_true")]
    pub use_historical_data: bool,

    /// Look up recent executions for a result-cache discount
    #[serde(default = "default_true")]
    pub cache_detection: bool,

    /// Lookback window for the history tier, in days
    #[serde(default = "default_history_days")]
    pub history_days: u32,

    /// Window for the result-cache signal, in hours
    #[serde(default = "default_cache_window_hours")]
    pub cache_window_hours: u32,

    /// Timeout for each individual warehouse call
    #[serde(default = "default_call_timeout_secs")]
    pub call_timeout_secs: u64,

    /// Deadline for the whole estimation pass; unfinished jobs mark the verdict incomplete
    #[serde(default)]
    pub run_timeout_secs: Option<u64>,

    /// Jobs estimated concurrently
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Concurrent warehouse sessions
    #[serde(default = "default_workers")]
    pub pool_size: usize,

    /// Empirical constants
    #[serde(default)]
    pub constants: EstimationConstants,
}

impl Default for EstimationConfig {
    fn default() -> Self {
        Self {
            use_explain_plans: true,
            use_historical_data: true,
            cache_detection: true,
            history_days: default_history_days(),
            cache_window_hours: default_cache_window_hours(),
            call_timeout_secs: default_call_timeout_secs(),
            run_timeout_secs: None,
            workers: default_workers(),
            pool_size: default_workers(),
            constants: EstimationConstants::default(),
        }
    }
}

/// Empirically chosen constants. They are not derived from a model of the
/// warehouse and are exposed so they can be recalibrated per account.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EstimationConstants {
    #[serde(default)]
    pub weights: ScoringWeights,

    #[serde(default)]
    pub throughput: ThroughputConstants,
}

/// Points contributed by each syntactic feature to the complexity score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct ScoringWeights {
    pub join: u32,
    pub window: u32,
    pub aggregation: u32,
    /// Per nesting level beyond the first
    pub nesting: u32,
    /// Per referenced table larger than `large_table_rows`
    pub large_table: u32,
    pub large_table_rows: u64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            join: 10,
            window: 8,
            aggregation: 5,
            nesting: 3,
            large_table: 0,
            large_table_rows: 100_000_000,
        }
    }
}

/// Throughput assumptions for converting data volume into seconds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct ThroughputConstants {
    /// MB/s assumed when converting EXPLAIN byte estimates
    pub plan_mb_per_sec: f64,
    /// Rows/s baseline for the heuristic tier, before the complexity penalty
    pub heuristic_rows_per_sec: f64,
    /// MB/s assumed by the heuristic tier
    pub heuristic_mb_per_sec: f64,
    /// Seconds per 30 complexity points when no table statistics exist
    pub no_stats_base_seconds: f64,
}

impl Default for ThroughputConstants {
    fn default() -> Self {
        Self {
            plan_mb_per_sec: 15.0,
            heuristic_rows_per_sec: 2000.0,
            heuristic_mb_per_sec: 10.0,
            no_stats_base_seconds: 5.0,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_cost_per_credit() -> f64 {
    3.0
}

fn default_threshold() -> f64 {
    5.0
}

fn default_complexity_warning() -> u8 {
    60
}

fn default_scaled_cost_limit() -> f64 {
    10.0
}

fn default_history_days() -> u32 {
    30
}

fn default_cache_window_hours() -> u32 {
    24
}

fn default_call_timeout_secs() -> u64 {
    10
}

fn default_workers() -> usize {
    4
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            enabled: true,
            cost_per_credit: default_cost_per_credit(),
            warehouse_credits_per_hour: None,
            warehouse_size: None,
            warehouse_name: None,
            thresholds: ThresholdConfig::default(),
            overrides: Vec::new(),
            skip: Vec::new(),
            estimation: EstimationConfig::default(),
        }
    }
}

impl Policy {
    /// Load the policy from a file path
    pub fn load(path: &Path) -> CoreResult<Self> {
        if !path.exists() {
            return Err(CoreError::ConfigNotFound {
                path: path.display().to_string(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| CoreError::IoWithPath {
            path: path.display().to_string(),
            source: e,
        })?;
        let policy = Self::from_yaml(&content)?;
        log::debug!("Loaded cost policy from {}", path.display());
        Ok(policy)
    }

    /// Parse and validate a policy from YAML text. Empty text yields the defaults.
    pub fn from_yaml(content: &str) -> CoreResult<Self> {
        let policy: Policy = if content.trim().is_empty() {
            Policy::default()
        } else {
            serde_yaml::from_str(content)?
        };
        policy.validate()?;
        Ok(policy)
    }

    /// Load the policy from a project directory.
    ///
    /// A missing policy file is not an error: the defaults apply.
    pub fn load_from_dir(dir: &Path) -> CoreResult<Self> {
        if let Some(path) = Self::find_in_dir(dir) {
            return Self::load(&path);
        }
        log::debug!(
            "No policy file in {}, using default thresholds",
            dir.display()
        );
        Ok(Self::default())
    }

    /// First policy file present in `dir`, if any.
    pub fn find_in_dir(dir: &Path) -> Option<PathBuf> {
        POLICY_FILE_NAMES
            .iter()
            .map(|name| dir.join(name))
            .find(|path| path.exists())
    }

    /// Render the policy back to YAML, defaults filled in.
    pub fn to_yaml(&self) -> CoreResult<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Apply command-line overrides, which take precedence over the file.
    ///
    /// A threshold override replaces both the per-job and total-run thresholds.
    pub fn with_overrides(
        mut self,
        cost_per_credit: Option<f64>,
        threshold: Option<f64>,
    ) -> CoreResult<Self> {
        if let Some(cost) = cost_per_credit {
            self.cost_per_credit = cost;
        }
        if let Some(threshold) = threshold {
            self.thresholds.per_job = threshold;
            self.thresholds.total_run = threshold;
        }
        self.validate()?;
        Ok(self)
    }

    /// Validate the policy
    pub fn validate(&self) -> CoreResult<()> {
        let invalid = |message: String| Err(CoreError::ConfigInvalid { message });

        if !(self.cost_per_credit.is_finite() && self.cost_per_credit > 0.0) {
            return invalid(format!(
                "cost_per_credit must be positive, got {}",
                self.cost_per_credit
            ));
        }

        if let Some(rate) = self.warehouse_credits_per_hour {
            if !(rate.is_finite() && rate > 0.0) {
                return invalid(format!(
                    "warehouse_credits_per_hour must be positive, got {}",
                    rate
                ));
            }
        }

        if let Some(size) = &self.warehouse_size {
            credits_per_hour_for_size(size)?;
        }

        for (label, value) in [
            ("thresholds.per_job", self.thresholds.per_job),
            ("thresholds.total_run", self.thresholds.total_run),
            ("thresholds.scaled_cost_limit", self.thresholds.scaled_cost_limit),
        ] {
            if !(value.is_finite() && value >= 0.0) {
                return invalid(format!("{} must be a non-negative number", label));
            }
        }

        for rule in &self.overrides {
            if let Some(threshold) = rule.threshold {
                if !(threshold.is_finite() && threshold >= 0.0) {
                    return invalid(format!(
                        "override '{}' has an invalid threshold {}",
                        rule.pattern, threshold
                    ));
                }
            }
            if rule.threshold.is_none() && !rule.skip {
                return invalid(format!(
                    "override '{}' must set a threshold or skip: true",
                    rule.pattern
                ));
            }
        }

        let est = &self.estimation;
        if est.workers == 0 || est.pool_size == 0 {
            return invalid("estimation.workers and estimation.pool_size must be at least 1".into());
        }
        if est.call_timeout_secs == 0 {
            return invalid("estimation.call_timeout_secs must be at least 1".into());
        }
        if est.run_timeout_secs == Some(0) {
            return invalid("estimation.run_timeout_secs must be at least 1 when set".into());
        }
        if est.history_days == 0 || est.cache_window_hours == 0 {
            return invalid(
                "estimation.history_days and estimation.cache_window_hours must be at least 1"
                    .into(),
            );
        }

        let tp = &est.constants.throughput;
        for (label, value) in [
            ("plan_mb_per_sec", tp.plan_mb_per_sec),
            ("heuristic_rows_per_sec", tp.heuristic_rows_per_sec),
            ("heuristic_mb_per_sec", tp.heuristic_mb_per_sec),
            ("no_stats_base_seconds", tp.no_stats_base_seconds),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return invalid(format!(
                    "estimation.constants.throughput.{} must be positive",
                    label
                ));
            }
        }

        Ok(())
    }
}

/// Credits per hour billed for a named warehouse size.
///
/// Accepts both dashed (`X-LARGE`) and compact (`XLARGE`) spellings,
/// case-insensitively.
pub fn credits_per_hour_for_size(size: &str) -> CoreResult<f64> {
    let normalized: String = size
        .trim()
        .to_ascii_uppercase()
        .chars()
        .filter(|c| *c != '-' && *c != '_' && *c != ' ')
        .collect();

    let credits = match normalized.as_str() {
        "XSMALL" => 1.0,
        "SMALL" => 2.0,
        "MEDIUM" => 4.0,
        "LARGE" => 8.0,
        "XLARGE" => 16.0,
        "2XLARGE" | "XXLARGE" => 32.0,
        "3XLARGE" | "XXXLARGE" => 64.0,
        "4XLARGE" => 128.0,
        "5XLARGE" => 256.0,
        "6XLARGE" => 512.0,
        _ => {
            return Err(CoreError::UnknownWarehouseSize {
                size: size.to_string(),
            })
        }
    };
    Ok(credits)
}

#[cfg(test)]
#[path = "policy_test.rs"]
mod tests;
