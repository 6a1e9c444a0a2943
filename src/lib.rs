//! # timeslice-fabric
//!
//! Circuit schedules, routing and flow tables for time-sliced optical networks.
//!
//! In a time-sliced fabric the physical topology changes on a fixed cycle:
//! during each slice a circuit switch connects node uplinks pairwise, and a
//! packet that has no circuit to where it is going waits in a queue for the
//! next slice that has one.
//!
//! ## Pipeline
//!
//! ```text
//! TopologySpec → Vec<Circuit> → TopologyStore → RoutingStrategy → Vec<Path>
//!                                     ↓                               ↓
//!                               OcsSchedule                  FlowTableCompiler
//!                                     ↓                               ↓
//!                               CircuitLoader                    TableLoader
//! ```
//!
//! The [`NetworkController`] owns the store and drives the device
//! collaborators; the [`AdaptiveScheduler`] rematches a traffic-aware fabric
//! to measured load.
//!
//! ## Determinism Guarantees
//!
//! - Same parameters + same seed → identical circuit list
//! - Store, path and table iteration follow node, port and slice order
//! - Fingerprints hash canonical JSON with xxh64

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod types;
pub mod error;
pub mod canonical;
pub mod topology;
pub mod store;
pub mod routing;
pub mod compiler;
pub mod device;
pub mod controller;
pub mod scheduler;
pub mod config;

// Re-exports
pub use types::{
    Circuit, NodeId, PortId, SliceIndex, WILDCARD, MAX_NODES,
    SliceSel, NodeSel, Step, StepKind, Path,
    SendSlot, HopTarget, TimeFlowHop, TimeFlowEntry,
};
pub use error::{Result, ScheduleError};
pub use canonical::{to_canonical_bytes, canonical_hash, canonical_hash_hex, circuits_fingerprint};
pub use topology::{TopologySpec, TrafficMatrix, bipartite_matching};
pub use store::{Direction, TimeSliceGraph, TopologyStore};
pub use routing::{HopSearch, RoutingStrategy};
pub use compiler::{AddressingMode, FlowTableCompiler, FlowTables, RoutingMode};
pub use device::{
    CircuitLoader, DeviceManager, TableLoader, TableKind, TableWrite,
    DeviceMetrics, OcsSchedule,
};
pub use controller::{Deployment, NetworkController, RoutingReport, TopoReport};
pub use scheduler::{adapt_once, AdaptiveScheduler, RoundOutcome, SchedulerStats};
pub use config::{ArchMode, ConfigError, FabricConfig};

/// Schema version of the serialized schedule and table formats.
pub const FABRIC_SCHEMA_VERSION: &str = "1.0.0";
