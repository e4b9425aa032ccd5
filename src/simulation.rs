//! Step functions that produce a metric's next value on each tick
//!
//! The scheduler only sees the [`StepFunction`] trait, so a real device
//! reader can replace the randomized simulators without touching it.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::SchedulerError;
use crate::models::{MetricDefinition, UpdatePolicy};

/// Produces the next value of a metric from its current value
pub trait StepFunction: Send {
    /// Compute the next value. The store clamps the result to the metric's range.
    fn next_value(&mut self, current: f64, definition: &MetricDefinition) -> f64;

    /// Short description for logs
    fn describe(&self) -> String;
}

/// Oscillating metric: `clamp(current + U(-delta, delta))`
#[derive(Debug)]
pub struct RandomWalk {
    delta: f64,
    integral: bool,
    rng: StdRng,
}

impl RandomWalk {
    pub fn new(delta: f64, integral: bool, rng: StdRng) -> Self {
        Self { delta, integral, rng }
    }
}

impl StepFunction for RandomWalk {
    fn next_value(&mut self, current: f64, definition: &MetricDefinition) -> f64 {
        let change = if self.delta == 0.0 {
            0.0
        } else if self.integral {
            let delta = self.delta.trunc() as i64;
            self.rng.gen_range(-delta..=delta) as f64
        } else {
            self.rng.gen_range(-self.delta..=self.delta)
        };
        definition.clamp(current + change)
    }

    fn describe(&self) -> String {
        format!("random walk ±{}", self.delta)
    }
}

/// Monotonic accumulator: `current + U(min_increment, max_increment)`
#[derive(Debug)]
pub struct Accumulator {
    min_increment: f64,
    max_increment: f64,
    integral: bool,
    rng: StdRng,
}

impl Accumulator {
    pub fn new(min_increment: f64, max_increment: f64, integral: bool, rng: StdRng) -> Self {
        Self {
            min_increment,
            max_increment,
            integral,
            rng,
        }
    }
}

impl StepFunction for Accumulator {
    fn next_value(&mut self, current: f64, _definition: &MetricDefinition) -> f64 {
        let increment = if self.integral {
            let low = self.min_increment.trunc() as i64;
            let high = self.max_increment.trunc() as i64;
            self.rng.gen_range(low..=high) as f64
        } else {
            self.rng.gen_range(self.min_increment..=self.max_increment)
        };
        current + increment
    }

    fn describe(&self) -> String {
        format!("accumulate +{}..{}", self.min_increment, self.max_increment)
    }
}

/// Reject policies the step functions cannot sample from
pub fn validate_policy(family: &str, policy: &UpdatePolicy) -> Result<(), SchedulerError> {
    let invalid = |reason: String| SchedulerError::InvalidPolicy {
        family: family.to_string(),
        reason,
    };

    match policy {
        UpdatePolicy::RandomWalk { delta, integral } => {
            if !delta.is_finite() || *delta < 0.0 {
                return Err(invalid(format!("delta must be a non-negative number, got {}", delta)));
            }
            if !sampleable(2.0 * delta) {
                return Err(invalid(format!("delta {} is too large to sample", delta)));
            }
            if *integral && *delta > 0.0 && delta.trunc() == 0.0 {
                return Err(invalid(format!(
                    "integral walk with delta {} never moves",
                    delta
                )));
            }
        }
        UpdatePolicy::Accumulate {
            min_increment,
            max_increment,
            integral,
        } => {
            if !min_increment.is_finite() || !max_increment.is_finite() {
                return Err(invalid("increments must be finite".to_string()));
            }
            if *min_increment < 0.0 {
                return Err(invalid(format!(
                    "accumulation must be monotonic, min_increment={}",
                    min_increment
                )));
            }
            if min_increment > max_increment {
                return Err(invalid(format!(
                    "min_increment {} exceeds max_increment {}",
                    min_increment, max_increment
                )));
            }
            if !sampleable(max_increment - min_increment) {
                return Err(invalid(format!(
                    "increment range {}..{} is too wide to sample",
                    min_increment, max_increment
                )));
            }
            if *integral && max_increment.trunc() < 1.0 {
                return Err(invalid(format!(
                    "integral accumulation up to {} never moves",
                    max_increment
                )));
            }
        }
    }
    Ok(())
}

/// `rand` scales a float span by slightly more than 1 before sampling
fn sampleable(span: f64) -> bool {
    (2.0 * span).is_finite()
}

/// Build the simulator for a policy
///
/// A fixed `seed` makes the sequence reproducible.
pub fn step_function_for(
    family: &str,
    policy: &UpdatePolicy,
    seed: Option<u64>,
) -> Result<Box<dyn StepFunction>, SchedulerError> {
    validate_policy(family, policy)?;

    let rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let step: Box<dyn StepFunction> = match *policy {
        UpdatePolicy::RandomWalk { delta, integral } => Box::new(RandomWalk::new(delta, integral, rng)),
        UpdatePolicy::Accumulate {
            min_increment,
            max_increment,
            integral,
        } => Box::new(Accumulator::new(min_increment, max_increment, integral, rng)),
    };
    Ok(step)
}
