//! Periodic metric update scheduling
//!
//! Each family runs its own tokio task on a fixed-rate interval:
//!
//! ```text
//! Idle --start--> Armed --tick--> Firing --> Armed ...
//!   \               \                          /
//!    `----stop-------`---------stop-----------'--> Stopped
//! ```
//!
//! All families share one `Arc<Mutex<MetricStore>>`. A tick holds the lock
//! for the whole read-step-write-recompute sequence and never across an
//! `.await`, so ticks are serialized even on a multi-threaded runtime.

use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant};
use tracing::{debug, error, info, instrument, warn, Level};

use crate::derived::DerivedMetricCalculator;
use crate::error::{HealthPulseError, Result, SchedulerError};
use crate::models::{DashboardSnapshot, FamilyDefinition, MetricUpdate};
use crate::simulation::{step_function_for, validate_policy, StepFunction};
use crate::sink::PresentationSink;
use crate::store::MetricStore;

/// Store shared between the scheduler's family tasks
pub type SharedStore = Arc<Mutex<MetricStore>>;

/// Lifecycle of one update family
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FamilyState {
    /// Registered, not yet started
    Idle,
    /// Waiting for the next tick
    Armed,
    /// Step function running
    Firing,
    /// Terminal; no further ticks
    Stopped,
}

/// Everything a single tick needs, cloned into the family's task
#[derive(Clone)]
struct FamilyRunner {
    family: String,
    metric: String,
    store: SharedStore,
    calculator: Arc<DerivedMetricCalculator>,
    sink: Arc<dyn PresentationSink>,
    step: Arc<Mutex<Box<dyn StepFunction>>>,
    state: Arc<Mutex<FamilyState>>,
    // Held from store write through sink notification
    delivery: Arc<Mutex<()>>,
}

impl FamilyRunner {
    /// Run one tick: step the metric, recompute dependents, notify the sink
    ///
    /// The family returns to the state it was in before firing, so a manual
    /// tick leaves an idle family idle. The store lock is released before the
    /// sink runs; the family's delivery lock keeps a manual tick racing a timer
    /// tick from reaching the sink out of store order.
    fn fire(&self) -> Result<Vec<MetricUpdate>> {
        let _delivery = lock(&self.delivery, "delivery order")?;
        let previous = self.current_state();
        self.set_state(FamilyState::Firing);
        let result = self.apply_step();
        self.set_state(previous);

        let updates = result?;
        for update in &updates {
            self.sink.on_metric_updated(update);
        }
        Ok(updates)
    }

    fn apply_step(&self) -> Result<Vec<MetricUpdate>> {
        let timestamp = Utc::now();
        let mut store = lock(&self.store, "metric store")?;

        let current = store.get(&self.metric)?;
        let definition = store.definition(&self.metric)?.clone();
        let next = lock(&self.step, "step function")?.next_value(current, &definition);
        let stored = store.set(&self.metric, next)?;
        let dependents = store.recompute_dependents(&self.metric, &self.calculator)?;

        let mut updates = Vec::with_capacity(dependents.len() + 1);
        updates.push(MetricUpdate {
            name: self.metric.clone(),
            value: stored,
            unit: definition.unit,
            timestamp,
            derived: false,
        });
        for (name, value) in dependents {
            let unit = store.unit(&name)?.to_string();
            updates.push(MetricUpdate {
                name,
                value,
                unit,
                timestamp,
                derived: true,
            });
        }

        debug!(family = %self.family, metric = %self.metric, previous = current, stored, "Tick applied");
        Ok(updates)
    }

    async fn run(self, period: Duration, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = interval_at(Instant::now() + period, period);

        loop {
            tokio::select! {
                biased;
                changed = shutdown.changed() => {
                    let stopping = changed.is_err() || *shutdown.borrow();
                    if stopping {
                        break;
                    }
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.fire() {
                        if e.severity().to_tracing_level() == Level::ERROR {
                            error!(family = %self.family, error = %e, "Tick failed");
                        } else {
                            warn!(family = %self.family, error = %e, "Tick failed");
                        }
                    }
                }
            }
        }

        debug!(family = %self.family, "Update task exited");
    }

    fn current_state(&self) -> FamilyState {
        self.state
            .lock()
            .map(|state| *state)
            .unwrap_or(FamilyState::Stopped)
    }

    fn set_state(&self, state: FamilyState) {
        if let Ok(mut current) = self.state.lock() {
            // Stopped is terminal
            if *current != FamilyState::Stopped {
                *current = state;
            }
        }
    }
}

struct Family {
    definition: FamilyDefinition,
    runner: FamilyRunner,
    shutdown: Option<watch::Sender<bool>>,
    handle: Option<JoinHandle<()>>,
}

/// Drives independent metric families on fixed intervals
pub struct MetricUpdateScheduler {
    store: SharedStore,
    calculator: Arc<DerivedMetricCalculator>,
    sink: Arc<dyn PresentationSink>,
    families: BTreeMap<String, Family>,
    started: bool,
}

impl MetricUpdateScheduler {
    pub fn new(
        store: MetricStore,
        calculator: DerivedMetricCalculator,
        sink: Arc<dyn PresentationSink>,
    ) -> Self {
        Self {
            store: Arc::new(Mutex::new(store)),
            calculator: Arc::new(calculator),
            sink,
            families: BTreeMap::new(),
            started: false,
        }
    }

    /// Register a family with an explicit step function
    pub fn add_family(
        &mut self,
        definition: FamilyDefinition,
        step: Box<dyn StepFunction>,
    ) -> Result<()> {
        if self.started {
            return Err(SchedulerError::AlreadyStarted.into());
        }
        if self.families.contains_key(&definition.name) {
            return Err(SchedulerError::DuplicateFamily {
                name: definition.name,
            }
            .into());
        }
        if definition.interval_ms == 0 {
            return Err(SchedulerError::InvalidPolicy {
                family: definition.name,
                reason: "interval must be greater than zero".to_string(),
            }
            .into());
        }
        validate_policy(&definition.name, &definition.policy)?;

        {
            let store = lock(&self.store, "metric store")?;
            // Derived metrics are not writable, so the target must be a base metric
            store.definition(&definition.metric)?;
        }

        info!(
            family = %definition.name,
            metric = %definition.metric,
            interval_ms = definition.interval_ms,
            step = %step.describe(),
            "Registered update family"
        );

        let runner = FamilyRunner {
            family: definition.name.clone(),
            metric: definition.metric.clone(),
            store: Arc::clone(&self.store),
            calculator: Arc::clone(&self.calculator),
            sink: Arc::clone(&self.sink),
            step: Arc::new(Mutex::new(step)),
            state: Arc::new(Mutex::new(FamilyState::Idle)),
            delivery: Arc::new(Mutex::new(())),
        };

        self.families.insert(
            definition.name.clone(),
            Family {
                definition,
                runner,
                shutdown: None,
                handle: None,
            },
        );
        Ok(())
    }

    /// Register a family using the simulator built from its policy
    pub fn add_simulated_family(&mut self, definition: FamilyDefinition, seed: Option<u64>) -> Result<()> {
        let step = step_function_for(&definition.name, &definition.policy, seed)?;
        self.add_family(definition, step)
    }

    /// Arm every idle family on the current tokio runtime
    pub fn start(&mut self) -> Result<()> {
        if self.started {
            return Err(SchedulerError::AlreadyStarted.into());
        }
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| HealthPulseError::Internal(format!("no tokio runtime: {}", e)))?;

        for family in self.families.values_mut() {
            if family.state() != FamilyState::Idle {
                continue;
            }

            let (tx, rx) = watch::channel(false);
            let period = Duration::from_millis(family.definition.interval_ms);
            family.runner.set_state(FamilyState::Armed);
            family.handle = Some(runtime.spawn(family.runner.clone().run(period, rx)));
            family.shutdown = Some(tx);
        }

        self.started = true;
        info!(families = self.families.len(), "Scheduler started");
        Ok(())
    }

    /// Fire a family once, outside its timer
    #[instrument(skip(self))]
    pub fn tick(&self, family: &str) -> Result<Vec<MetricUpdate>> {
        let family = self.family(family)?;
        if family.state() == FamilyState::Stopped {
            return Err(SchedulerError::FamilyStopped {
                name: family.definition.name.clone(),
            }
            .into());
        }
        family.runner.fire()
    }

    /// Stop one family; in-flight ticks finish before this returns
    pub async fn stop_family(&mut self, name: &str) -> Result<()> {
        let family = self
            .families
            .get_mut(name)
            .ok_or_else(|| SchedulerError::UnknownFamily {
                name: name.to_string(),
            })?;
        family.stop().await
    }

    /// Stop every family and wait for their tasks to drain
    pub async fn stop(&mut self) -> Result<()> {
        let mut first_error = None;
        for family in self.families.values_mut() {
            if let Err(e) = family.stop().await {
                warn!(family = %family.definition.name, error = %e, "Family did not stop cleanly");
                first_error.get_or_insert(e);
            }
        }
        info!("Scheduler stopped");
        first_error.map_or(Ok(()), Err)
    }

    /// Current state of a family
    pub fn state(&self, family: &str) -> Result<FamilyState> {
        self.family(family).map(Family::state)
    }

    /// Registered family names
    pub fn families(&self) -> Vec<&str> {
        self.families.keys().map(String::as_str).collect()
    }

    /// Shared handle to the store, for reads by the host
    pub fn store(&self) -> SharedStore {
        Arc::clone(&self.store)
    }

    pub fn calculator(&self) -> &DerivedMetricCalculator {
        &self.calculator
    }

    /// Snapshot of every metric under the store lock
    pub fn snapshot(&self) -> Result<DashboardSnapshot> {
        Ok(lock(&self.store, "metric store")?.snapshot(Utc::now()))
    }

    fn family(&self, name: &str) -> Result<&Family> {
        self.families.get(name).ok_or_else(|| {
            SchedulerError::UnknownFamily {
                name: name.to_string(),
            }
            .into()
        })
    }
}

impl Family {
    fn state(&self) -> FamilyState {
        self.runner.current_state()
    }

    async fn stop(&mut self) -> Result<()> {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(true);
        }
        let joined = match self.handle.take() {
            Some(handle) => handle.await,
            None => Ok(()),
        };

        if let Ok(mut state) = self.runner.state.lock() {
            *state = FamilyState::Stopped;
        }

        joined.map_err(|e| {
            SchedulerError::TaskFailed {
                family: self.definition.name.clone(),
                reason: e.to_string(),
            }
            .into()
        })
    }
}

fn lock<'a, T: ?Sized>(mutex: &'a Mutex<T>, what: &str) -> Result<MutexGuard<'a, T>> {
    mutex
        .lock()
        .map_err(|_| HealthPulseError::Internal(format!("{} lock poisoned", what)))
}
