//! Core types for the fabric scheduler.

pub mod circuit;
pub mod path;
pub mod flow;

pub use circuit::{Circuit, NodeId, PortId, SliceIndex, WILDCARD, MAX_NODES, cycle_length_of, link_count_of};
pub use path::{Path, Step, StepKind, SliceSel, NodeSel};
pub use flow::{TimeFlowEntry, TimeFlowHop, HopTarget, SendSlot};
