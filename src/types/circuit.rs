//! Circuit and identifier types.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a node (top-of-rack switch) in the fabric.
pub type NodeId = u32;

/// Identifier of an uplink port on a node.
pub type PortId = u32;

/// Index of a time slice within the schedule cycle.
pub type SliceIndex = u32;

/// Wire value meaning "not indexed by time" (or "any node").
///
/// Real slice indices and node ids are always strictly below this value.
pub const WILDCARD: u32 = 255;

/// Maximum number of nodes a fabric may hold (ids `0..MAX_NODES`).
pub const MAX_NODES: usize = WILDCARD as usize;

/// One physical point-to-point connection active during one slice.
///
/// Ordered by (slice, node_a, node_b, port_a, port_b) for deterministic output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Circuit {
    /// Slice during which the circuit exists.
    pub slice: SliceIndex,
    /// First endpoint.
    pub node_a: NodeId,
    /// Second endpoint.
    pub node_b: NodeId,
    /// Port used by `node_a`.
    pub port_a: PortId,
    /// Port used by `node_b`.
    pub port_b: PortId,
}

impl Circuit {
    /// Create a new circuit.
    pub fn new(slice: SliceIndex, node_a: NodeId, node_b: NodeId, port_a: PortId, port_b: PortId) -> Self {
        Self {
            slice,
            node_a,
            node_b,
            port_a,
            port_b,
        }
    }

    /// Whether both endpoints are the same node (idle "loop-back" circuit).
    pub fn is_self_loop(&self) -> bool {
        self.node_a == self.node_b
    }

    /// The endpoints as an unordered pair `(min, max)`.
    pub fn unordered_pair(&self) -> (NodeId, NodeId) {
        if self.node_a <= self.node_b {
            (self.node_a, self.node_b)
        } else {
            (self.node_b, self.node_a)
        }
    }

    /// Copy of this circuit moved to another slice.
    pub fn at_slice(&self, slice: SliceIndex) -> Self {
        Self { slice, ..*self }
    }
}

impl fmt::Display for Circuit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "slice {}: node {} port {} <-> node {} port {}",
            self.slice, self.node_a, self.port_a, self.node_b, self.port_b
        )
    }
}

/// Number of slices spanned by a circuit list (highest slice + 1).
pub fn cycle_length_of(circuits: &[Circuit]) -> usize {
    circuits
        .iter()
        .map(|c| c.slice as usize + 1)
        .max()
        .unwrap_or(0)
}

/// Number of links used by a circuit list (highest port + 1).
pub fn link_count_of(circuits: &[Circuit]) -> usize {
    circuits
        .iter()
        .map(|c| c.port_a.max(c.port_b) as usize + 1)
        .max()
        .unwrap_or(0)
}
