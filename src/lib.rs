// Library interface for HealthPulse modules
// This allows integration tests to access the core functionality

pub mod config;
pub mod derived;
pub mod error;
pub mod foods;
pub mod logging;
pub mod models;
pub mod scheduler;
pub mod simulation;
pub mod sink;
pub mod store;

// Re-export commonly used types for convenience
pub use models::*;
pub use config::AppConfig;
pub use derived::{DerivedMetricCalculator, MetTable};
pub use error::{HealthPulseError, MetricError, Result, SchedulerError};
pub use logging::{LogConfig, LogFormat, LogLevel};
pub use scheduler::{FamilyState, MetricUpdateScheduler, SharedStore};
pub use simulation::StepFunction;
pub use sink::{ChannelSink, MemorySink, PresentationSink, TracingSink};
pub use store::MetricStore;
