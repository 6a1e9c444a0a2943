//! Topology storage: per-slice graphs and the slice-indexed store.

pub mod slice_graph;
pub mod topology;

pub use slice_graph::{DirectedLink, Endpoint, TimeSliceGraph};
pub use topology::{Direction, TopologyStore};
