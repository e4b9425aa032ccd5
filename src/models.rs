use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Default number of samples kept per metric for charting
pub const DEFAULT_HISTORY_CAPACITY: usize = 20;

fn default_history_capacity() -> usize {
    DEFAULT_HISTORY_CAPACITY
}

/// Registry entry for a bounded, time-varying health measurement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricDefinition {
    /// Unique metric name, e.g. "heart_rate"
    pub name: String,

    /// Display unit, e.g. "bpm"
    pub unit: String,

    /// Lower bound (inclusive)
    pub min: f64,

    /// Upper bound (inclusive)
    pub max: f64,

    /// Value the metric starts the session with
    pub seed: f64,

    /// Maximum number of history samples retained
    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,
}

impl MetricDefinition {
    pub fn new(name: impl Into<String>, unit: impl Into<String>, min: f64, max: f64, seed: f64) -> Self {
        Self {
            name: name.into(),
            unit: unit.into(),
            min,
            max,
            seed,
            history_capacity: DEFAULT_HISTORY_CAPACITY,
        }
    }

    pub fn with_history_capacity(mut self, capacity: usize) -> Self {
        self.history_capacity = capacity;
        self
    }

    /// Clamp a value into this metric's range
    pub fn clamp(&self, value: f64) -> f64 {
        value.clamp(self.min, self.max)
    }
}

/// How a metric family's step function perturbs the current value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum UpdatePolicy {
    /// Bounded random walk: `current + U(-delta, delta)`
    RandomWalk {
        delta: f64,
        #[serde(default)]
        integral: bool,
    },
    /// Monotonic accumulation: `current + U(min_increment, max_increment)`
    Accumulate {
        min_increment: f64,
        max_increment: f64,
        #[serde(default)]
        integral: bool,
    },
}

/// One independently scheduled update timeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FamilyDefinition {
    /// Family name (unique per scheduler)
    pub name: String,

    /// Metric this family mutates
    pub metric: String,

    /// Tick interval in milliseconds
    pub interval_ms: u64,

    /// Step function parameters
    pub policy: UpdatePolicy,
}

/// Formula for a derived metric
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DerivedFormula {
    /// `trunc(source * kcal_per_step)`
    StepsCalories { source: String, kcal_per_step: f64 },
    /// `floor(source / target * 100)`, 0 when target <= 0
    Progress { source: String, target: f64 },
    /// Position of `source` inside `[low, high]` as a percentage
    RangePosition { source: String, low: f64, high: f64 },
}

impl DerivedFormula {
    /// Metric this formula reads
    pub fn source(&self) -> &str {
        match self {
            DerivedFormula::StepsCalories { source, .. }
            | DerivedFormula::Progress { source, .. }
            | DerivedFormula::RangePosition { source, .. } => source,
        }
    }
}

/// Registry entry for a metric computed from other metrics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DerivedDefinition {
    pub name: String,
    pub unit: String,
    pub formula: DerivedFormula,
}

/// Notification delivered to the presentation sink
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricUpdate {
    pub name: String,
    pub value: f64,
    pub unit: String,
    pub timestamp: DateTime<Utc>,
    /// True when the value was recomputed from another metric
    pub derived: bool,
}

/// Point-in-time view of a single metric
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricReading {
    pub name: String,
    pub value: f64,
    pub unit: String,
    pub derived: bool,
    /// History oldest first, empty for derived metrics
    pub history: Vec<f64>,
}

/// Every metric in a store at one instant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardSnapshot {
    pub taken_at: DateTime<Utc>,
    pub readings: Vec<MetricReading>,
}

impl DashboardSnapshot {
    /// Find a reading by metric name
    pub fn reading(&self, name: &str) -> Option<&MetricReading> {
        self.readings.iter().find(|r| r.name == name)
    }
}

/// Summary of a metric's history buffer, used for chart axes
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HistoryStats {
    pub samples: usize,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
}
