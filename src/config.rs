use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

use crate::derived::{DerivedMetricCalculator, MetTable, ASSUMED_WEIGHT_KG, KCAL_PER_STEP};
use crate::error::HealthPulseError;
use crate::logging::LogConfig;
use crate::models::{
    DerivedDefinition, DerivedFormula, FamilyDefinition, MetricDefinition, UpdatePolicy,
};
use crate::scheduler::MetricUpdateScheduler;
use crate::sink::PresentationSink;
use crate::store::MetricStore;

/// Main application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Configuration metadata
    pub metadata: ConfigMetadata,

    /// Simulation settings
    #[serde(default)]
    pub simulation: SimulationSettings,

    /// Activity calorie estimation settings
    #[serde(default)]
    pub activity: ActivitySettings,

    /// Daily goals
    #[serde(default)]
    pub goals: GoalSettings,

    /// Logging settings
    #[serde(default)]
    pub logging: LogConfig,

    /// Base metric registry
    pub metrics: Vec<MetricDefinition>,

    /// Metrics computed from the registry
    #[serde(default)]
    pub derived: Vec<DerivedDefinition>,

    /// Periodic update families
    #[serde(default)]
    pub families: Vec<FamilyDefinition>,
}

/// Configuration metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigMetadata {
    /// Configuration format version
    pub version: String,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last modification timestamp
    pub updated_at: DateTime<Utc>,
}

/// Simulation settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SimulationSettings {
    /// Fixed RNG seed; each family derives its own seed from it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

/// Activity calorie estimation settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivitySettings {
    /// Body weight used for MET calorie estimates (kg)
    pub assumed_weight_kg: f64,

    /// Activity type to MET coefficients
    pub met: MetTable,
}

impl Default for ActivitySettings {
    fn default() -> Self {
        Self {
            assumed_weight_kg: ASSUMED_WEIGHT_KG,
            met: MetTable::default(),
        }
    }
}

/// Daily health targets
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GoalSettings {
    pub steps: f64,
    /// Active calories burned (kcal)
    pub active_calories: f64,
    /// Nutrition intake (kcal)
    pub calories: f64,
    pub water_ml: f64,
    pub sleep_hours: f64,
    pub protein_g: f64,
    pub carbs_g: f64,
    pub fat_g: f64,
}

impl Default for GoalSettings {
    fn default() -> Self {
        Self {
            steps: 10000.0,
            active_calories: 1000.0,
            calories: 2000.0,
            water_ml: 2000.0,
            sleep_hours: 8.0,
            protein_g: 150.0,
            carbs_g: 250.0,
            fat_g: 70.0,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        let now = Utc::now();
        let goals = GoalSettings::default();

        let metrics = vec![
            MetricDefinition::new("steps", "steps", 0.0, 100000.0, 5420.0),
            MetricDefinition::new("heart_rate", "bpm", 60.0, 100.0, 72.0),
            MetricDefinition::new("sleep", "hours", 0.0, 24.0, 7.5),
        ];

        let derived = vec![
            DerivedDefinition {
                name: "calories_burned".to_string(),
                unit: "kcal".to_string(),
                formula: DerivedFormula::StepsCalories {
                    source: "steps".to_string(),
                    kcal_per_step: KCAL_PER_STEP,
                },
            },
            DerivedDefinition {
                name: "steps_progress".to_string(),
                unit: "%".to_string(),
                formula: DerivedFormula::Progress {
                    source: "steps".to_string(),
                    target: goals.steps,
                },
            },
            DerivedDefinition {
                name: "calories_progress".to_string(),
                unit: "%".to_string(),
                formula: DerivedFormula::Progress {
                    source: "calories_burned".to_string(),
                    target: goals.active_calories,
                },
            },
            DerivedDefinition {
                name: "heart_rate_position".to_string(),
                unit: "%".to_string(),
                formula: DerivedFormula::RangePosition {
                    source: "heart_rate".to_string(),
                    low: 60.0,
                    high: 100.0,
                },
            },
            DerivedDefinition {
                name: "sleep_progress".to_string(),
                unit: "%".to_string(),
                formula: DerivedFormula::Progress {
                    source: "sleep".to_string(),
                    target: goals.sleep_hours,
                },
            },
        ];

        let families = vec![
            FamilyDefinition {
                name: "steps".to_string(),
                metric: "steps".to_string(),
                interval_ms: 3000,
                policy: UpdatePolicy::Accumulate {
                    min_increment: 5.0,
                    max_increment: 50.0,
                    integral: true,
                },
            },
            FamilyDefinition {
                name: "heart_rate".to_string(),
                metric: "heart_rate".to_string(),
                interval_ms: 1000,
                policy: UpdatePolicy::RandomWalk {
                    delta: 3.0,
                    integral: true,
                },
            },
        ];

        AppConfig {
            metadata: ConfigMetadata {
                version: "1.0".to_string(),
                created_at: now,
                updated_at: now,
            },
            simulation: SimulationSettings::default(),
            activity: ActivitySettings::default(),
            goals,
            logging: LogConfig::default(),
            metrics,
            derived,
            families,
        }
    }
}

/// Configuration management implementation
impl AppConfig {
    /// Load configuration from TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: AppConfig = toml::from_str(&content)
            .with_context(|| "Failed to parse TOML configuration")?;

        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn save_to_file<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        self.metadata.updated_at = Utc::now();

        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {}", parent.display()))?;
        }

        let toml_content = toml::to_string_pretty(self)
            .with_context(|| "Failed to serialize configuration to TOML")?;

        fs::write(&path, toml_content)
            .with_context(|| format!("Failed to write config file: {}", path.as_ref().display()))?;

        Ok(())
    }

    /// Get default configuration file path
    pub fn default_config_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".healthpulse")
            .join("config.toml")
    }

    /// Load an explicit path, or the default path when it exists
    ///
    /// Defaults are used only when no path was given and nothing exists at
    /// the default location. An explicit path must be readable and valid.
    pub fn resolve(path: Option<&Path>) -> Result<(PathBuf, Self)> {
        match path {
            Some(path) => Ok((path.to_path_buf(), Self::load_from_file(path)?)),
            None => {
                let path = Self::default_config_path();
                let config = if path.exists() {
                    Self::load_from_file(&path)?
                } else {
                    Self::default()
                };
                Ok((path, config))
            }
        }
    }

    /// Calculator built from the activity settings
    pub fn build_calculator(&self) -> crate::Result<DerivedMetricCalculator> {
        let weight = self.activity.assumed_weight_kg;
        if !(weight.is_finite() && weight > 0.0) {
            return Err(HealthPulseError::Configuration(format!(
                "assumed_weight_kg must be positive, got {}",
                weight
            )));
        }
        Ok(DerivedMetricCalculator::new(self.activity.met.clone(), weight))
    }

    /// Store with every base and derived metric registered
    pub fn build_store(&self, calculator: &DerivedMetricCalculator) -> crate::Result<MetricStore> {
        let mut store = MetricStore::new();
        for definition in &self.metrics {
            store.register(definition.clone())?;
        }
        for definition in &self.derived {
            store.register_derived(definition.clone(), calculator)?;
        }
        Ok(store)
    }

    /// Scheduler with the registry and every configured family, not yet started
    pub fn build_scheduler(&self, sink: Arc<dyn PresentationSink>) -> crate::Result<MetricUpdateScheduler> {
        let calculator = self.build_calculator()?;
        let store = self.build_store(&calculator)?;
        let mut scheduler = MetricUpdateScheduler::new(store, calculator, sink);

        for (index, family) in self.families.iter().enumerate() {
            let seed = self.simulation.seed.map(|seed| seed.wrapping_add(index as u64));
            scheduler.add_simulated_family(family.clone(), seed)?;
        }

        info!(
            metrics = self.metrics.len(),
            derived = self.derived.len(),
            families = self.families.len(),
            "Built scheduler from configuration"
        );
        Ok(scheduler)
    }

    /// Check the whole registry without starting anything
    pub fn validate(&self) -> crate::Result<()> {
        let sink: Arc<dyn PresentationSink> = Arc::new(crate::sink::TracingSink);
        self.build_scheduler(sink).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{MetricError, SchedulerError};
    use tempfile::tempdir;

    #[test]
    fn test_config_serialization() {
        let config = AppConfig::default();
        let toml_str = toml::to_string(&config).unwrap();
        let deserialized: AppConfig = toml::from_str(&toml_str).unwrap();

        assert_eq!(config.metadata.version, deserialized.metadata.version);
        assert_eq!(config.metrics, deserialized.metrics);
        assert_eq!(config.derived, deserialized.derived);
        assert_eq!(config.families, deserialized.families);
        assert_eq!(config.activity, deserialized.activity);
    }

    #[test]
    fn test_config_file_io() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("nested").join("config.toml");

        let mut original = AppConfig::default();
        original.simulation.seed = Some(99);
        original.goals.steps = 12000.0;
        original.save_to_file(&config_path).unwrap();

        let loaded = AppConfig::load_from_file(&config_path).unwrap();
        assert_eq!(loaded.simulation.seed, Some(99));
        assert_eq!(loaded.goals.steps, 12000.0);
    }

    #[test]
    fn test_missing_file_has_context() {
        let err = AppConfig::load_from_file("/definitely/not/here.toml").unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }

    #[test]
    fn test_explicit_path_never_falls_back() {
        let temp_dir = tempdir().unwrap();
        let missing = temp_dir.path().join("missing.toml");
        let err = AppConfig::resolve(Some(missing.as_path())).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));

        let broken = temp_dir.path().join("broken.toml");
        fs::write(&broken, "metrics = [").unwrap();
        let err = AppConfig::resolve(Some(broken.as_path())).unwrap_err();
        assert!(err.to_string().contains("Failed to parse TOML configuration"));

        let valid = temp_dir.path().join("valid.toml");
        let mut config = AppConfig::default();
        config.goals.fat_g = 60.0;
        config.save_to_file(&valid).unwrap();
        let (path, loaded) = AppConfig::resolve(Some(valid.as_path())).unwrap();
        assert_eq!(path, valid);
        assert_eq!(loaded.goals.fat_g, 60.0);
    }

    #[test]
    fn test_default_config_is_valid() {
        AppConfig::default().validate().unwrap();
    }

    #[test]
    fn test_invalid_range_aborts_build() {
        let mut config = AppConfig::default();
        config.metrics[1].min = 120.0;

        let err = config.validate().unwrap_err();
        assert!(matches!(
            err,
            HealthPulseError::Metric(MetricError::InvalidRange { .. })
        ));
    }

    #[test]
    fn test_family_for_unknown_metric_aborts_build() {
        let mut config = AppConfig::default();
        config.families[0].metric = "water".to_string();

        let err = config.validate().unwrap_err();
        assert!(matches!(
            err,
            HealthPulseError::Metric(MetricError::UnknownMetric { .. })
        ));

        let mut config = AppConfig::default();
        config.families[1].interval_ms = 0;
        assert!(matches!(
            config.validate().unwrap_err(),
            HealthPulseError::Scheduler(SchedulerError::InvalidPolicy { .. })
        ));
    }

    #[test]
    fn test_invalid_weight() {
        let mut config = AppConfig::default();
        config.activity.assumed_weight_kg = 0.0;
        assert!(matches!(
            config.build_calculator(),
            Err(HealthPulseError::Configuration(_))
        ));
    }

    #[test]
    fn test_minimal_toml_uses_defaults() {
        let config: AppConfig = toml::from_str(
            r#"
            [metadata]
            version = "1.0"
            created_at = "2026-01-01T00:00:00Z"
            updated_at = "2026-01-01T00:00:00Z"

            [[metrics]]
            name = "heart_rate"
            unit = "bpm"
            min = 60.0
            max = 100.0
            seed = 72.0
            "#,
        )
        .unwrap();

        assert!(config.families.is_empty());
        assert_eq!(config.activity.assumed_weight_kg, 70.0);
        assert_eq!(config.goals.water_ml, 2000.0);
        config.validate().unwrap();
    }

    #[test]
    fn test_partial_goals_keep_macro_defaults() {
        let config: AppConfig = toml::from_str(
            r#"
            metrics = []

            [metadata]
            version = "1.0"
            created_at = "2026-01-01T00:00:00Z"
            updated_at = "2026-01-01T00:00:00Z"

            [goals]
            steps = 8000.0
            "#,
        )
        .unwrap();

        assert_eq!(config.goals.steps, 8000.0);
        assert_eq!(config.goals.calories, 2000.0);
        assert_eq!(config.goals.protein_g, 150.0);
        assert_eq!(config.goals.carbs_g, 250.0);
        assert_eq!(config.goals.fat_g, 70.0);
    }
}
