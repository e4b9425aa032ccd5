use healthpulse::{
    AppConfig, FamilyDefinition, FamilyState, HealthPulseError, MemorySink, MetricDefinition,
    MetricStore, MetricUpdateScheduler, DerivedMetricCalculator, SchedulerError, StepFunction,
    UpdatePolicy,
};
use std::sync::Arc;
use std::time::Duration;

// Scheduler tests run on a paused clock so tick counts are exact

fn seeded_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.simulation.seed = Some(7);
    config
}

#[tokio::test(start_paused = true)]
async fn test_families_tick_on_independent_intervals() {
    let sink = Arc::new(MemorySink::new());
    let mut scheduler = seeded_config().build_scheduler(sink.clone()).unwrap();

    scheduler.start().unwrap();
    assert_eq!(scheduler.state("heart_rate").unwrap(), FamilyState::Armed);

    tokio::time::sleep(Duration::from_millis(3500)).await;
    scheduler.stop().await.unwrap();

    // Heart rate every second, steps every three seconds
    assert_eq!(sink.updates_for("heart_rate").len(), 3);
    assert_eq!(sink.updates_for("steps").len(), 1);
    assert_eq!(sink.updates_for("heart_rate_position").len(), 3);
    assert_eq!(sink.updates_for("calories_burned").len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_no_updates_after_stop() {
    let sink = Arc::new(MemorySink::new());
    let mut scheduler = seeded_config().build_scheduler(sink.clone()).unwrap();

    scheduler.start().unwrap();
    tokio::time::sleep(Duration::from_millis(2500)).await;
    scheduler.stop().await.unwrap();

    let delivered = sink.len();
    assert!(delivered > 0);

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(sink.len(), delivered);
    assert_eq!(scheduler.state("heart_rate").unwrap(), FamilyState::Stopped);
    assert_eq!(scheduler.state("steps").unwrap(), FamilyState::Stopped);
    assert!(matches!(
        scheduler.tick("heart_rate"),
        Err(HealthPulseError::Scheduler(SchedulerError::FamilyStopped { .. }))
    ));
}

#[tokio::test(start_paused = true)]
async fn test_stop_family_leaves_others_running() {
    let sink = Arc::new(MemorySink::new());
    let mut scheduler = seeded_config().build_scheduler(sink.clone()).unwrap();

    scheduler.start().unwrap();
    scheduler.stop_family("steps").await.unwrap();
    assert_eq!(scheduler.state("steps").unwrap(), FamilyState::Stopped);

    tokio::time::sleep(Duration::from_millis(6500)).await;

    assert!(sink.updates_for("steps").is_empty());
    assert_eq!(sink.updates_for("heart_rate").len(), 6);

    scheduler.stop().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_values_stay_in_range_and_history_is_bounded() {
    let sink = Arc::new(MemorySink::new());
    let mut scheduler = seeded_config().build_scheduler(sink.clone()).unwrap();

    scheduler.start().unwrap();
    tokio::time::sleep(Duration::from_millis(60_500)).await;
    scheduler.stop().await.unwrap();

    let heart = sink.updates_for("heart_rate");
    assert_eq!(heart.len(), 60);
    assert!(heart.iter().all(|u| (60.0..=100.0).contains(&u.value)));

    let store = scheduler.store();
    let store = store.lock().unwrap();
    let history = store.history("heart_rate").unwrap();
    assert_eq!(history.len(), 20);
    assert_eq!(history.last().copied(), heart.last().map(|u| u.value));
}

#[tokio::test(start_paused = true)]
async fn test_steps_accumulate_and_derived_follow() {
    let sink = Arc::new(MemorySink::new());
    let mut scheduler = seeded_config().build_scheduler(sink.clone()).unwrap();

    scheduler.start().unwrap();
    tokio::time::sleep(Duration::from_millis(9500)).await;
    scheduler.stop().await.unwrap();

    let steps = sink.updates_for("steps");
    assert_eq!(steps.len(), 3);

    let mut previous = 5420.0;
    for update in &steps {
        let increment = update.value - previous;
        assert!((5.0..=50.0).contains(&increment), "increment {}", increment);
        previous = update.value;
    }

    let calories = sink.updates_for("calories_burned");
    let progress = sink.updates_for("steps_progress");
    for ((step, kcal), pct) in steps.iter().zip(&calories).zip(&progress) {
        assert!(kcal.derived);
        assert_eq!(kcal.timestamp, step.timestamp);
        assert_eq!(kcal.value, (step.value * 0.04).trunc());
        assert_eq!(pct.value, (step.value / 10000.0 * 100.0).floor());
    }
}

#[tokio::test(start_paused = true)]
async fn test_base_update_precedes_derived() {
    let sink = Arc::new(MemorySink::new());
    let scheduler = seeded_config().build_scheduler(sink.clone()).unwrap();

    let updates = scheduler.tick("steps").unwrap();
    let names: Vec<&str> = updates.iter().map(|u| u.name.as_str()).collect();
    assert_eq!(
        names,
        vec!["steps", "calories_burned", "steps_progress", "calories_progress"]
    );
    assert_eq!(sink.updates(), updates);
}

/// Replays a fixed sequence of readings, standing in for a device
struct Replay {
    readings: Vec<f64>,
}

impl StepFunction for Replay {
    fn next_value(&mut self, current: f64, _definition: &MetricDefinition) -> f64 {
        if self.readings.is_empty() {
            current
        } else {
            self.readings.remove(0)
        }
    }

    fn describe(&self) -> String {
        "replay".to_string()
    }
}

#[tokio::test(start_paused = true)]
async fn test_custom_step_function_is_clamped() {
    let mut store = MetricStore::new();
    store
        .register(MetricDefinition::new("heart_rate", "bpm", 60.0, 100.0, 72.0))
        .unwrap();

    let sink = Arc::new(MemorySink::new());
    let mut scheduler =
        MetricUpdateScheduler::new(store, DerivedMetricCalculator::default(), sink.clone());
    scheduler
        .add_family(
            FamilyDefinition {
                name: "device".to_string(),
                metric: "heart_rate".to_string(),
                interval_ms: 500,
                policy: UpdatePolicy::RandomWalk {
                    delta: 0.0,
                    integral: false,
                },
            },
            Box::new(Replay {
                readings: vec![80.0, 140.0, 55.0],
            }),
        )
        .unwrap();

    scheduler.start().unwrap();
    tokio::time::sleep(Duration::from_millis(1600)).await;
    scheduler.stop().await.unwrap();

    let values: Vec<f64> = sink.updates().iter().map(|u| u.value).collect();
    assert_eq!(values, vec![80.0, 100.0, 60.0]);
}

#[tokio::test(start_paused = true)]
async fn test_start_twice_and_add_after_start() {
    let sink = Arc::new(MemorySink::new());
    let mut scheduler = seeded_config().build_scheduler(sink).unwrap();

    scheduler.start().unwrap();
    assert!(matches!(
        scheduler.start(),
        Err(HealthPulseError::Scheduler(SchedulerError::AlreadyStarted))
    ));

    let family = FamilyDefinition {
        name: "sleep".to_string(),
        metric: "sleep".to_string(),
        interval_ms: 1000,
        policy: UpdatePolicy::RandomWalk {
            delta: 0.1,
            integral: false,
        },
    };
    assert!(matches!(
        scheduler.add_simulated_family(family, None),
        Err(HealthPulseError::Scheduler(SchedulerError::AlreadyStarted))
    ));

    scheduler.stop().await.unwrap();
}
