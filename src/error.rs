//! Unified error hierarchy for HealthPulse
//!
//! Registry and scheduler errors are configuration errors detected at
//! startup. None of them are expected once the metric registry is fixed.

use thiserror::Error;

/// Top-level error type for all HealthPulse operations
#[derive(Debug, Error)]
pub enum HealthPulseError {
    /// Metric registry and store errors
    #[error("Metric error: {0}")]
    Metric(#[from] MetricError),

    /// Update scheduler errors
    #[error("Scheduler error: {0}")]
    Scheduler(#[from] SchedulerError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Metric registry and store errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MetricError {
    /// Lookup of a name that was never registered
    #[error("Unknown metric: {name}")]
    UnknownMetric { name: String },

    /// Registration with min >= max
    #[error("Invalid range for {name}: min={min}, max={max}")]
    InvalidRange { name: String, min: f64, max: f64 },

    /// Seed value outside the metric's range
    #[error("Seed {seed} for {name} is outside [{min}, {max}]")]
    InvalidSeed {
        name: String,
        seed: f64,
        min: f64,
        max: f64,
    },

    /// History buffer must hold at least one sample
    #[error("History capacity for {name} must be at least 1")]
    InvalidCapacity { name: String },

    /// Name already registered
    #[error("Duplicate metric: {name}")]
    DuplicateMetric { name: String },

    /// Derived metrics are recomputed, never written
    #[error("Metric {name} is derived and cannot be set")]
    ReadOnlyMetric { name: String },

    /// Value that cannot be clamped (NaN)
    #[error("Invalid value for {name}: {value}")]
    InvalidValue { name: String, value: f64 },
}

/// Metric update scheduler errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SchedulerError {
    /// Family name was never registered
    #[error("Unknown update family: {name}")]
    UnknownFamily { name: String },

    /// Family name already registered
    #[error("Duplicate update family: {name}")]
    DuplicateFamily { name: String },

    /// Interval or step parameters rejected at registration
    #[error("Invalid update policy for {family}: {reason}")]
    InvalidPolicy { family: String, reason: String },

    /// Family has reached its terminal state
    #[error("Update family {name} is stopped")]
    FamilyStopped { name: String },

    /// Families can only be added before start
    #[error("Scheduler already started")]
    AlreadyStarted,

    /// A family task panicked or was aborted
    #[error("Update task for {family} failed: {reason}")]
    TaskFailed { family: String, reason: String },
}

/// Result type alias for HealthPulse operations
pub type Result<T> = std::result::Result<T, HealthPulseError>;

impl HealthPulseError {
    /// Get error severity level
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            HealthPulseError::Metric(MetricError::UnknownMetric { .. }) => ErrorSeverity::Critical,
            HealthPulseError::Metric(MetricError::InvalidValue { .. }) => ErrorSeverity::Warning,
            HealthPulseError::Metric(_) => ErrorSeverity::Error,
            HealthPulseError::Scheduler(SchedulerError::FamilyStopped { .. }) => {
                ErrorSeverity::Warning
            }
            HealthPulseError::Scheduler(_) => ErrorSeverity::Error,
            HealthPulseError::Configuration(_) => ErrorSeverity::Error,
            HealthPulseError::Io(_) => ErrorSeverity::Error,
            HealthPulseError::Internal(_) => ErrorSeverity::Critical,
        }
    }

    /// Get user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            HealthPulseError::Metric(MetricError::UnknownMetric { name }) => {
                format!("Metric '{}' is not part of the configured registry.", name)
            }
            HealthPulseError::Metric(MetricError::InvalidRange { name, .. }) => {
                format!(
                    "Metric '{}' has an invalid range. The minimum must be below the maximum.",
                    name
                )
            }
            HealthPulseError::Scheduler(SchedulerError::InvalidPolicy { family, reason }) => {
                format!("Update family '{}' is misconfigured: {}", family, reason)
            }
            _ => self.to_string(),
        }
    }
}

/// Error severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    /// Critical system error requiring immediate attention
    Critical,
    /// Error that prevents operation but system can continue
    Error,
    /// Warning that doesn't prevent operation
    Warning,
}

impl ErrorSeverity {
    /// Convert to tracing level
    pub fn to_tracing_level(&self) -> tracing::Level {
        match self {
            ErrorSeverity::Critical => tracing::Level::ERROR,
            ErrorSeverity::Error => tracing::Level::ERROR,
            ErrorSeverity::Warning => tracing::Level::WARN,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_severity() {
        let err = HealthPulseError::Metric(MetricError::UnknownMetric {
            name: "heart_rate".to_string(),
        });
        assert_eq!(err.severity(), ErrorSeverity::Critical);

        let err = HealthPulseError::Scheduler(SchedulerError::FamilyStopped {
            name: "steps".to_string(),
        });
        assert_eq!(err.severity(), ErrorSeverity::Warning);
        assert_eq!(err.severity().to_tracing_level(), tracing::Level::WARN);

        // A poisoned store lock is what a failed tick reports at ERROR
        let err = HealthPulseError::Internal("metric store lock poisoned".to_string());
        assert_eq!(err.severity().to_tracing_level(), tracing::Level::ERROR);

        let err = HealthPulseError::Metric(MetricError::InvalidValue {
            name: "heart_rate".to_string(),
            value: f64::NAN,
        });
        assert_eq!(err.severity().to_tracing_level(), tracing::Level::WARN);
    }

    #[test]
    fn test_user_messages() {
        let err = HealthPulseError::Metric(MetricError::InvalidRange {
            name: "sleep".to_string(),
            min: 10.0,
            max: 2.0,
        });
        assert!(err.user_message().contains("invalid range"));

        let err = HealthPulseError::Internal("boom".to_string());
        assert_eq!(err.user_message(), "Internal error: boom");
    }

    #[test]
    fn test_from_conversions() {
        let err: HealthPulseError = MetricError::DuplicateMetric {
            name: "steps".to_string(),
        }
        .into();
        assert!(matches!(err, HealthPulseError::Metric(_)));

        let err: HealthPulseError = SchedulerError::AlreadyStarted.into();
        assert_eq!(err.to_string(), "Scheduler error: Scheduler already started");
    }
}
