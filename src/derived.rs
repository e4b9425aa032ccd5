use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::MetricError;
use crate::models::DerivedFormula;

/// MET used when an activity type is not in the table
pub const FALLBACK_MET: f64 = 4.0;

/// Body weight assumed for calorie estimates (kg)
pub const ASSUMED_WEIGHT_KG: f64 = 70.0;

/// Calories burned per step on the dashboard
pub const KCAL_PER_STEP: f64 = 0.04;

/// Activity type to MET (Metabolic Equivalent of Task) coefficients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetTable {
    pub fallback: f64,
    pub values: BTreeMap<String, f64>,
}

impl Default for MetTable {
    fn default() -> Self {
        let values = [
            ("Walking", 3.5),
            ("Running", 8.0),
            ("Cycling", 6.0),
            ("Swimming", 7.0),
            ("Gym / Weights", 5.0),
            ("Yoga", 2.5),
            ("Pilates", 3.0),
            ("Dancing", 4.5),
            ("Sports", 6.0),
            ("Hiking", 6.5),
            ("Other", 4.0),
        ]
        .into_iter()
        .map(|(name, met)| (name.to_string(), met))
        .collect();

        Self {
            fallback: FALLBACK_MET,
            values,
        }
    }
}

impl MetTable {
    /// MET value for an activity, falling back for unknown types
    pub fn met_value(&self, activity: &str) -> f64 {
        self.values.get(activity).copied().unwrap_or(self.fallback)
    }

    /// Known activity types in table order
    pub fn activities(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }
}

/// Pure derived-metric arithmetic over a static coefficient table
///
/// None of these calculations fail: a zero or negative divisor yields 0.
#[derive(Debug, Clone, PartialEq)]
pub struct DerivedMetricCalculator {
    met_table: MetTable,
    assumed_weight_kg: f64,
}

impl Default for DerivedMetricCalculator {
    fn default() -> Self {
        Self::new(MetTable::default(), ASSUMED_WEIGHT_KG)
    }
}

impl DerivedMetricCalculator {
    pub fn new(met_table: MetTable, assumed_weight_kg: f64) -> Self {
        Self {
            met_table,
            assumed_weight_kg,
        }
    }

    pub fn met_table(&self) -> &MetTable {
        &self.met_table
    }

    pub fn assumed_weight_kg(&self) -> f64 {
        self.assumed_weight_kg
    }

    /// Estimate calories burned by an activity
    ///
    /// `calories = MET × weight(kg) × duration(hours)`, truncated.
    pub fn calories_from_activity(&self, activity: &str, duration_minutes: f64) -> i64 {
        let met = self.met_table.met_value(activity);
        (met * self.assumed_weight_kg * (duration_minutes / 60.0)) as i64
    }

    /// Progress toward a goal as a whole percentage
    ///
    /// Not clamped: exceeding the target reports more than 100.
    pub fn progress_percentage(current: f64, target: f64) -> i64 {
        if target > 0.0 {
            ((current / target) * 100.0).floor() as i64
        } else {
            0
        }
    }

    /// Calories attributed to a step count
    pub fn calories_from_steps(steps: f64, kcal_per_step: f64) -> i64 {
        (steps * kcal_per_step) as i64
    }

    /// Where `value` sits within `[low, high]`, as a percentage
    pub fn range_position(value: f64, low: f64, high: f64) -> i64 {
        if high > low {
            (((value - low) / (high - low)) * 100.0) as i64
        } else {
            0
        }
    }

    /// Evaluate a derived formula, reading its source through `lookup`
    pub fn evaluate<F>(&self, formula: &DerivedFormula, lookup: F) -> Result<f64, MetricError>
    where
        F: Fn(&str) -> Option<f64>,
    {
        let source = formula.source();
        let input = lookup(source).ok_or_else(|| MetricError::UnknownMetric {
            name: source.to_string(),
        })?;

        let value = match formula {
            DerivedFormula::StepsCalories { kcal_per_step, .. } => {
                Self::calories_from_steps(input, *kcal_per_step)
            }
            DerivedFormula::Progress { target, .. } => Self::progress_percentage(input, *target),
            DerivedFormula::RangePosition { low, high, .. } => {
                Self::range_position(input, *low, *high)
            }
        };

        Ok(value as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_running_calories() {
        let calc = DerivedMetricCalculator::default();
        assert_eq!(calc.calories_from_activity("Running", 30.0), 280);
    }

    #[test]
    fn test_unknown_activity_uses_fallback() {
        let calc = DerivedMetricCalculator::default();
        assert_eq!(calc.calories_from_activity("UnknownSport", 60.0), 280);
        assert_eq!(calc.met_table().met_value("UnknownSport"), FALLBACK_MET);
    }

    #[test]
    fn test_calories_truncate() {
        let calc = DerivedMetricCalculator::default();
        // 3.5 * 70 * (45 / 60) = 183.75
        assert_eq!(calc.calories_from_activity("Walking", 45.0), 183);
    }

    #[test]
    fn test_progress_percentage() {
        assert_eq!(DerivedMetricCalculator::progress_percentage(5420.0, 10000.0), 54);
        assert_eq!(DerivedMetricCalculator::progress_percentage(12000.0, 10000.0), 120);
        assert_eq!(DerivedMetricCalculator::progress_percentage(5.0, 0.0), 0);
        assert_eq!(DerivedMetricCalculator::progress_percentage(5.0, -10.0), 0);
    }

    #[test]
    fn test_steps_calories_and_range_position() {
        assert_eq!(DerivedMetricCalculator::calories_from_steps(5420.0, KCAL_PER_STEP), 216);
        assert_eq!(DerivedMetricCalculator::range_position(72.0, 60.0, 100.0), 30);
        assert_eq!(DerivedMetricCalculator::range_position(72.0, 100.0, 60.0), 0);
    }

    #[test]
    fn test_evaluate_missing_source() {
        let calc = DerivedMetricCalculator::default();
        let formula = DerivedFormula::Progress {
            source: "water".to_string(),
            target: 2000.0,
        };
        let err = calc.evaluate(&formula, |_| None).unwrap_err();
        assert_eq!(
            err,
            MetricError::UnknownMetric {
                name: "water".to_string()
            }
        );

        let value = calc.evaluate(&formula, |_| Some(500.0)).unwrap();
        assert_eq!(value, 25.0);
    }
}
