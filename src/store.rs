//! Current values and rolling history for the tracked metrics
//!
//! The store has no internal synchronization. The scheduler owns it behind a
//! single mutex so ticks from different families never interleave.

use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet, VecDeque};
use tracing::{debug, trace};

use crate::derived::DerivedMetricCalculator;
use crate::error::MetricError;
use crate::models::{
    DashboardSnapshot, DerivedDefinition, HistoryStats, MetricDefinition, MetricReading,
};

/// A registered base metric
#[derive(Debug, Clone)]
struct Metric {
    definition: MetricDefinition,
    current: f64,
    history: VecDeque<f64>,
}

/// A registered derived metric and its last computed value
#[derive(Debug, Clone)]
struct DerivedMetric {
    definition: DerivedDefinition,
    value: f64,
}

/// Registry of base and derived metrics
#[derive(Debug, Clone, Default)]
pub struct MetricStore {
    metrics: HashMap<String, Metric>,
    /// Base metric names in registration order
    order: Vec<String>,
    /// Derived metrics in registration order, which is also evaluation order
    derived: Vec<DerivedMetric>,
}

impl MetricStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a base metric, seeding its current value and history
    pub fn register(&mut self, definition: MetricDefinition) -> Result<(), MetricError> {
        let name = definition.name.clone();
        if self.contains(&name) {
            return Err(MetricError::DuplicateMetric { name });
        }
        if !(definition.min < definition.max) {
            return Err(MetricError::InvalidRange {
                name,
                min: definition.min,
                max: definition.max,
            });
        }
        if !(definition.min..=definition.max).contains(&definition.seed) {
            return Err(MetricError::InvalidSeed {
                name,
                seed: definition.seed,
                min: definition.min,
                max: definition.max,
            });
        }
        if definition.history_capacity == 0 {
            return Err(MetricError::InvalidCapacity { name });
        }

        let mut history = VecDeque::with_capacity(definition.history_capacity);
        history.push_back(definition.seed);

        debug!(metric = %name, seed = definition.seed, "Registered metric");
        self.order.push(name.clone());
        self.metrics.insert(
            name,
            Metric {
                current: definition.seed,
                definition,
                history,
            },
        );
        Ok(())
    }

    /// Register a derived metric; its source must already be registered
    pub fn register_derived(
        &mut self,
        definition: DerivedDefinition,
        calculator: &DerivedMetricCalculator,
    ) -> Result<(), MetricError> {
        if self.contains(&definition.name) {
            return Err(MetricError::DuplicateMetric {
                name: definition.name,
            });
        }

        let value = calculator.evaluate(&definition.formula, |name| self.current(name))?;

        debug!(metric = %definition.name, source = definition.formula.source(), value, "Registered derived metric");
        self.derived.push(DerivedMetric { definition, value });
        Ok(())
    }

    /// Whether a base or derived metric with this name exists
    pub fn contains(&self, name: &str) -> bool {
        self.metrics.contains_key(name) || self.derived.iter().any(|d| d.definition.name == name)
    }

    /// Current value of a base or derived metric
    pub fn get(&self, name: &str) -> Result<f64, MetricError> {
        self.current(name).ok_or_else(|| MetricError::UnknownMetric {
            name: name.to_string(),
        })
    }

    /// Clamp and store a new value, returning what was actually stored
    ///
    /// The history buffer evicts its oldest sample once it is at capacity.
    pub fn set(&mut self, name: &str, value: f64) -> Result<f64, MetricError> {
        let metric = match self.metrics.get_mut(name) {
            Some(metric) => metric,
            None if self.derived.iter().any(|d| d.definition.name == name) => {
                return Err(MetricError::ReadOnlyMetric {
                    name: name.to_string(),
                })
            }
            None => {
                return Err(MetricError::UnknownMetric {
                    name: name.to_string(),
                })
            }
        };

        if value.is_nan() {
            return Err(MetricError::InvalidValue {
                name: name.to_string(),
                value,
            });
        }

        let stored = metric.definition.clamp(value);
        metric.current = stored;
        if metric.history.len() == metric.definition.history_capacity {
            metric.history.pop_front();
        }
        metric.history.push_back(stored);

        trace!(metric = name, requested = value, stored, "Metric set");
        Ok(stored)
    }

    /// History of a base metric, oldest first
    pub fn history(&self, name: &str) -> Result<Vec<f64>, MetricError> {
        self.metric(name)
            .map(|metric| metric.history.iter().copied().collect())
    }

    /// Min/max/mean of a base metric's history
    pub fn history_stats(&self, name: &str) -> Result<HistoryStats, MetricError> {
        let metric = self.metric(name)?;
        let samples = metric.history.len();
        let (min, max, sum) = metric.history.iter().fold(
            (f64::INFINITY, f64::NEG_INFINITY, 0.0),
            |(min, max, sum), &v| (min.min(v), max.max(v), sum + v),
        );

        Ok(HistoryStats {
            samples,
            min,
            max,
            mean: sum / samples as f64,
        })
    }

    /// Definition of a base metric
    pub fn definition(&self, name: &str) -> Result<&MetricDefinition, MetricError> {
        self.metric(name).map(|metric| &metric.definition)
    }

    /// Unit of a base or derived metric
    pub fn unit(&self, name: &str) -> Result<&str, MetricError> {
        if let Some(metric) = self.metrics.get(name) {
            return Ok(&metric.definition.unit);
        }
        self.derived
            .iter()
            .find(|d| d.definition.name == name)
            .map(|d| d.definition.unit.as_str())
            .ok_or_else(|| MetricError::UnknownMetric {
                name: name.to_string(),
            })
    }

    /// Base metric names followed by derived metric names, in registration order
    pub fn names(&self) -> Vec<&str> {
        self.order
            .iter()
            .map(String::as_str)
            .chain(self.derived.iter().map(|d| d.definition.name.as_str()))
            .collect()
    }

    /// Recompute every derived metric that depends on `name`, directly or
    /// through another derived metric, returning the new values
    pub fn recompute_dependents(
        &mut self,
        name: &str,
        calculator: &DerivedMetricCalculator,
    ) -> Result<Vec<(String, f64)>, MetricError> {
        let mut changed: HashSet<String> = HashSet::from([name.to_string()]);
        let mut updates = Vec::new();

        for i in 0..self.derived.len() {
            let depends = changed.contains(self.derived[i].definition.formula.source());
            if !depends {
                continue;
            }

            let value = calculator
                .evaluate(&self.derived[i].definition.formula, |source| self.current(source))?;

            let derived = &mut self.derived[i];
            derived.value = value;
            changed.insert(derived.definition.name.clone());
            updates.push((derived.definition.name.clone(), value));
        }

        Ok(updates)
    }

    /// Every metric's value at `taken_at`
    pub fn snapshot(&self, taken_at: DateTime<Utc>) -> DashboardSnapshot {
        let base = self.order.iter().filter_map(|name| self.metrics.get(name)).map(|m| {
            MetricReading {
                name: m.definition.name.clone(),
                value: m.current,
                unit: m.definition.unit.clone(),
                derived: false,
                history: m.history.iter().copied().collect(),
            }
        });
        let derived = self.derived.iter().map(|d| MetricReading {
            name: d.definition.name.clone(),
            value: d.value,
            unit: d.definition.unit.clone(),
            derived: true,
            history: Vec::new(),
        });

        DashboardSnapshot {
            taken_at,
            readings: base.chain(derived).collect(),
        }
    }

    fn metric(&self, name: &str) -> Result<&Metric, MetricError> {
        self.metrics.get(name).ok_or_else(|| MetricError::UnknownMetric {
            name: name.to_string(),
        })
    }

    fn current(&self, name: &str) -> Option<f64> {
        self.metrics.get(name).map(|m| m.current).or_else(|| {
            self.derived
                .iter()
                .find(|d| d.definition.name == name)
                .map(|d| d.value)
        })
    }
}
