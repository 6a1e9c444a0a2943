//! External collaborators: table loaders, the circuit switch, telemetry.
//!
//! The core only needs "submit, get success or failure" from each of them.
//! All methods are async so implementations can talk to real devices.

pub mod memory;
pub mod ocs;
pub mod table;
pub mod telemetry;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::compiler::RoutingMode;
use crate::types::{NodeId, TimeFlowEntry};

pub use memory::{InMemoryCircuitLoader, InMemoryDeviceManager, InMemoryDeviceError, InMemoryTableLoader};
pub use ocs::{ocs_port, OcsAction, OcsEntry, OcsSchedule};
pub use table::{slot_lookup_entries, TableWrite};
pub use telemetry::{node_of_device, traffic_matrix_from_metrics, DeviceMetrics, QueueSample};

/// Forwarding tables a node exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableKind {
    /// Single-hop routing entries.
    PerHopRouting,
    /// Full source routes.
    SourceRouting,
    /// `(dst, arrival) -> (port, send slice)` for the next direct circuit.
    SlotLookup,
}

impl TableKind {
    /// Device-side table name.
    pub fn name(self) -> &'static str {
        match self {
            Self::PerHopRouting => "per_hop_routing",
            Self::SourceRouting => "source_routing",
            Self::SlotLookup => "slot_lookup",
        }
    }

    /// Routing table used for a routing mode.
    pub fn for_routing(mode: RoutingMode) -> Self {
        match mode {
            RoutingMode::PerHop => Self::PerHopRouting,
            RoutingMode::Source => Self::SourceRouting,
        }
    }
}

/// Device name of a node.
pub fn device_name(node: NodeId) -> String {
    format!("tor{}", node)
}

/// Installs compiled entries into a node's forwarding device.
#[async_trait]
pub trait TableLoader: Send + Sync {
    /// Error type for loader operations.
    type Error: std::error::Error + Send + Sync;

    /// Install entries into one table of a node.
    async fn load_entries(
        &self,
        node: NodeId,
        table: TableKind,
        entries: &[TimeFlowEntry],
    ) -> Result<(), Self::Error>;

    /// Remove every entry of one table. Idempotent.
    async fn clear_table(&self, node: NodeId, table: TableKind) -> Result<(), Self::Error>;
}

/// Programs the circuit switch with the slice schedule.
#[async_trait]
pub trait CircuitLoader: Send + Sync {
    /// Error type for loader operations.
    type Error: std::error::Error + Send + Sync;

    /// Install a full schedule.
    async fn load_schedule(&self, schedule: &OcsSchedule) -> Result<(), Self::Error>;

    /// Remove the installed schedule. Idempotent.
    async fn clear_schedule(&self) -> Result<(), Self::Error>;
}

/// Telemetry and queue control of the node devices.
#[async_trait]
pub trait DeviceManager: Send + Sync {
    /// Error type for device operations.
    type Error: std::error::Error + Send + Sync;

    /// Current metrics keyed by device name.
    async fn device_metrics(&self) -> Result<BTreeMap<String, DeviceMetrics>, Self::Error>;

    /// Select the queue a device currently drains.
    async fn set_active_queue(&self, device: &str, queue: u32) -> Result<(), Self::Error>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_names() {
        assert_eq!(TableKind::for_routing(RoutingMode::PerHop).name(), "per_hop_routing");
        assert_eq!(TableKind::for_routing(RoutingMode::Source), TableKind::SourceRouting);
        assert_eq!(device_name(7), "tor7");
    }
}
