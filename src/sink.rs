//! Receivers for metric update notifications

use std::sync::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::models::MetricUpdate;

/// Consumer of metric updates, e.g. whatever renders metric cards and charts
pub trait PresentationSink: Send + Sync {
    fn on_metric_updated(&self, update: &MetricUpdate);
}

/// Forwards updates into a tokio channel
#[derive(Debug, Clone)]
pub struct ChannelSink {
    sender: mpsc::UnboundedSender<MetricUpdate>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<MetricUpdate>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl PresentationSink for ChannelSink {
    fn on_metric_updated(&self, update: &MetricUpdate) {
        if self.sender.send(update.clone()).is_err() {
            warn!(metric = %update.name, "Update receiver dropped");
        }
    }
}

/// Emits each update as a structured tracing event
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl PresentationSink for TracingSink {
    fn on_metric_updated(&self, update: &MetricUpdate) {
        debug!(
            metric = %update.name,
            value = update.value,
            unit = %update.unit,
            derived = update.derived,
            timestamp = %update.timestamp,
            "Metric updated"
        );
    }
}

/// Keeps every update in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    updates: Mutex<Vec<MetricUpdate>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of all updates received so far
    pub fn updates(&self) -> Vec<MetricUpdate> {
        self.lock().clone()
    }

    /// Updates received for one metric
    pub fn updates_for(&self, name: &str) -> Vec<MetricUpdate> {
        self.lock().iter().filter(|u| u.name == name).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<MetricUpdate>> {
        // Poisoning cannot leave the buffer half-written; keep recording
        self.updates.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl PresentationSink for MemorySink {
    fn on_metric_updated(&self, update: &MetricUpdate) {
        self.lock().push(update.clone());
    }
}
