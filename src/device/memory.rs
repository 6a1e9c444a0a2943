//! In-memory collaborators for testing.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};

use crate::types::{NodeId, TimeFlowEntry};

use super::{CircuitLoader, DeviceManager, DeviceMetrics, OcsSchedule, QueueSample, TableKind, TableLoader};

/// Error type for in-memory collaborators.
#[derive(Debug, Clone, thiserror::Error)]
pub enum InMemoryDeviceError {
    /// Failure switched on by the test.
    #[error("Injected failure: {0}")]
    Injected(&'static str),
}

/// Table loader keeping entries per `(node, table)`.
#[derive(Debug, Default)]
pub struct InMemoryTableLoader {
    tables: Mutex<BTreeMap<(NodeId, TableKind), Vec<TimeFlowEntry>>>,
    clears: Mutex<Vec<(NodeId, TableKind)>>,
    failing: AtomicBool,
}

impl InMemoryTableLoader {
    /// Create an empty loader.
    pub fn new() -> Self {
        Self::default()
    }

    /// Entries currently installed in a node's table.
    pub fn entries(&self, node: NodeId, table: TableKind) -> Vec<TimeFlowEntry> {
        self.tables.lock().get(&(node, table)).cloned().unwrap_or_default()
    }

    /// Clear calls received so far, in order.
    pub fn clears(&self) -> Vec<(NodeId, TableKind)> {
        self.clears.lock().clone()
    }

    /// Make every subsequent call fail (or succeed again).
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), InMemoryDeviceError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(InMemoryDeviceError::Injected("table loader"));
        }
        Ok(())
    }
}

#[async_trait]
impl TableLoader for InMemoryTableLoader {
    type Error = InMemoryDeviceError;

    async fn load_entries(
        &self,
        node: NodeId,
        table: TableKind,
        entries: &[TimeFlowEntry],
    ) -> Result<(), Self::Error> {
        self.check()?;
        self.tables
            .lock()
            .entry((node, table))
            .or_default()
            .extend(entries.iter().cloned());
        Ok(())
    }

    async fn clear_table(&self, node: NodeId, table: TableKind) -> Result<(), Self::Error> {
        self.check()?;
        self.tables.lock().remove(&(node, table));
        self.clears.lock().push((node, table));
        Ok(())
    }
}

/// Circuit loader holding the last installed schedule.
#[derive(Debug, Default)]
pub struct InMemoryCircuitLoader {
    schedule: Mutex<Option<OcsSchedule>>,
    loads: Mutex<usize>,
    clears: Mutex<usize>,
    failing: AtomicBool,
}

impl InMemoryCircuitLoader {
    /// Create an empty loader.
    pub fn new() -> Self {
        Self::default()
    }

    /// Currently installed schedule.
    pub fn schedule(&self) -> Option<OcsSchedule> {
        self.schedule.lock().clone()
    }

    /// Number of successful loads.
    pub fn load_count(&self) -> usize {
        *self.loads.lock()
    }

    /// Number of successful clears.
    pub fn clear_count(&self) -> usize {
        *self.clears.lock()
    }

    /// Make every subsequent call fail (or succeed again).
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl CircuitLoader for InMemoryCircuitLoader {
    type Error = InMemoryDeviceError;

    async fn load_schedule(&self, schedule: &OcsSchedule) -> Result<(), Self::Error> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(InMemoryDeviceError::Injected("circuit loader"));
        }
        *self.schedule.lock() = Some(schedule.clone());
        *self.loads.lock() += 1;
        Ok(())
    }

    async fn clear_schedule(&self) -> Result<(), Self::Error> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(InMemoryDeviceError::Injected("circuit loader"));
        }
        *self.schedule.lock() = None;
        *self.clears.lock() += 1;
        Ok(())
    }
}

/// Device manager replaying scripted metric snapshots.
///
/// Each `device_metrics` call consumes the next scripted snapshot; once the
/// script runs out the last snapshot is repeated.
#[derive(Debug, Default)]
pub struct InMemoryDeviceManager {
    current: Mutex<BTreeMap<String, DeviceMetrics>>,
    script: Mutex<VecDeque<BTreeMap<String, DeviceMetrics>>>,
    active: Mutex<BTreeMap<String, u32>>,
    history: Mutex<Vec<(String, u32)>>,
    failing_metrics: AtomicBool,
}

impl InMemoryDeviceManager {
    /// Create a manager reporting no devices.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a snapshot for a later `device_metrics` call.
    pub fn push_metrics(&self, metrics: BTreeMap<String, DeviceMetrics>) {
        self.script.lock().push_back(metrics);
    }

    /// Queue a snapshot built from `(src, dst, depth)` triples on port 0.
    pub fn push_traffic(&self, traffic: &[(NodeId, NodeId, u64)]) {
        let mut metrics: BTreeMap<String, DeviceMetrics> = BTreeMap::new();
        for (src, dst, depth) in traffic {
            metrics
                .entry(super::device_name(*src))
                .or_default()
                .queues
                .push(QueueSample {
                    port: 0,
                    queue: *dst,
                    depth: *depth,
                });
        }
        self.push_metrics(metrics);
    }

    /// Queue currently active on a device.
    pub fn active_queue(&self, device: &str) -> Option<u32> {
        self.active.lock().get(device).copied()
    }

    /// Every `set_active_queue` call, in order.
    pub fn queue_history(&self) -> Vec<(String, u32)> {
        self.history.lock().clone()
    }

    /// Make `device_metrics` fail (or succeed again).
    pub fn set_failing_metrics(&self, failing: bool) {
        self.failing_metrics.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl DeviceManager for InMemoryDeviceManager {
    type Error = InMemoryDeviceError;

    async fn device_metrics(&self) -> Result<BTreeMap<String, DeviceMetrics>, Self::Error> {
        if self.failing_metrics.load(Ordering::SeqCst) {
            return Err(InMemoryDeviceError::Injected("telemetry"));
        }
        let mut current = self.current.lock();
        if let Some(next) = self.script.lock().pop_front() {
            *current = next;
        }
        Ok(current.clone())
    }

    async fn set_active_queue(&self, device: &str, queue: u32) -> Result<(), Self::Error> {
        self.active.lock().insert(device.to_string(), queue);
        self.history.lock().push((device.to_string(), queue));
        Ok(())
    }
}
