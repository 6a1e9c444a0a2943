//! Time flow table entries: the wire-level unit loaded into a node's forwarding table.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::circuit::{NodeId, PortId, SliceIndex, WILDCARD};
use super::path::NodeSel;

/// Queue selector of a hop.
///
/// Time-indexed fabrics queue by send slice; traffic-aware fabrics queue by destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SendSlot {
    /// Calendar queue of a slice.
    Slice(SliceIndex),
    /// Queue dedicated to a destination node.
    Destination(NodeId),
    /// Not indexed by time (node-indexed hop).
    Wildcard,
}

impl SendSlot {
    /// Wire value (255 for `Wildcard`).
    pub fn wire(self) -> u32 {
        match self {
            Self::Slice(slice) => slice,
            Self::Destination(node) => node,
            Self::Wildcard => WILDCARD,
        }
    }
}

/// Where a hop sends the packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HopTarget {
    /// Out of an uplink port.
    Port(PortId),
    /// Toward a node.
    Node(NodeId),
}

impl HopTarget {
    /// Wire value (port or node id).
    pub fn wire(self) -> u32 {
        match self {
            Self::Port(port) => port,
            Self::Node(node) => node,
        }
    }
}

/// One hop of a compiled entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeFlowHop {
    /// Node executing the hop.
    pub cur_node: NodeSel,
    /// Port or node the packet is sent to.
    pub target: HopTarget,
    /// Queue selector.
    pub send_slot: SendSlot,
}

impl TimeFlowHop {
    /// Create a new hop.
    pub fn new(cur_node: NodeSel, target: HopTarget, send_slot: SendSlot) -> Self {
        Self {
            cur_node,
            target,
            send_slot,
        }
    }

    /// Wire triple `(cur_node, send_slot, port_or_node)`.
    pub fn wire(&self) -> (u32, u32, u32) {
        (self.cur_node.wire(), self.send_slot.wire(), self.target.wire())
    }
}

impl fmt::Display for TimeFlowHop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (node, slot, target) = self.wire();
        write!(f, "node {} slot {} via {}", node, slot, target)
    }
}

/// A routing table entry keyed by `(dst, arrival_slice)` at the node that owns it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeFlowEntry {
    /// Destination node.
    pub dst: NodeId,
    /// Arrival slice the entry matches.
    pub arrival_slice: SliceIndex,
    /// Ordered hops (exactly one in per-hop mode).
    pub hops: Vec<TimeFlowHop>,
}

impl TimeFlowEntry {
    /// Create a new entry.
    pub fn new(dst: NodeId, arrival_slice: SliceIndex, hops: Vec<TimeFlowHop>) -> Self {
        Self {
            dst,
            arrival_slice,
            hops,
        }
    }

    /// Table key.
    pub fn key(&self) -> (NodeId, SliceIndex) {
        (self.dst, self.arrival_slice)
    }
}

impl fmt::Display for TimeFlowEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "entry dst {} arrival {}:", self.dst, self.arrival_slice)?;
        for hop in &self.hops {
            write!(f, " [{}]", hop)?;
        }
        Ok(())
    }
}
