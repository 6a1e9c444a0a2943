//! Forwarding paths through the slice cycle.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::circuit::{NodeId, PortId, SliceIndex, WILDCARD};

/// Slice at which a step transmits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SliceSel {
    /// Transmit during a specific slice.
    At(SliceIndex),
    /// Not indexed by time.
    Wildcard,
}

impl SliceSel {
    /// Wire value (255 for `Wildcard`).
    pub fn wire(self) -> u32 {
        match self {
            Self::At(slice) => slice,
            Self::Wildcard => WILDCARD,
        }
    }

    /// The concrete slice, if any.
    pub fn slice(self) -> Option<SliceIndex> {
        match self {
            Self::At(slice) => Some(slice),
            Self::Wildcard => None,
        }
    }
}

/// Node at which a step executes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum NodeSel {
    /// A specific node.
    Node(NodeId),
    /// Whichever node currently holds the packet.
    Any,
}

impl NodeSel {
    /// Wire value (255 for `Any`).
    pub fn wire(self) -> u32 {
        match self {
            Self::Node(id) => id,
            Self::Any => WILDCARD,
        }
    }
}

impl fmt::Display for NodeSel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Node(id) => write!(f, "{}", id),
            Self::Any => write!(f, "*"),
        }
    }
}

/// How a step forwards the packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StepKind {
    /// Send out a port during a slice.
    Port {
        /// Egress port.
        send_port: PortId,
        /// Slice of transmission.
        send_slice: SliceSel,
        /// Node expected on the other end, when known.
        next_node: Option<NodeId>,
    },
    /// Deliver toward a node, leaving port and slice to the fabric.
    Node {
        /// Node the packet is forwarded to.
        send_node: NodeId,
    },
}

/// One hop of a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Step {
    /// Node executing the step.
    pub cur_node: NodeSel,
    /// Forwarding action.
    pub kind: StepKind,
}

impl Step {
    /// Port-indexed step sent during `slice`.
    pub fn port(cur_node: NodeId, send_port: PortId, send_slice: SliceSel, next_node: Option<NodeId>) -> Self {
        Self {
            cur_node: NodeSel::Node(cur_node),
            kind: StepKind::Port {
                send_port,
                send_slice,
                next_node,
            },
        }
    }

    /// Node-indexed step.
    pub fn node(cur_node: NodeSel, send_node: NodeId) -> Self {
        Self {
            cur_node,
            kind: StepKind::Node { send_node },
        }
    }

    /// Slice of transmission, when this step is time-indexed.
    pub fn send_slice(&self) -> Option<SliceIndex> {
        match self.kind {
            StepKind::Port { send_slice, .. } => send_slice.slice(),
            StepKind::Node { .. } => None,
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            StepKind::Port {
                send_port,
                send_slice,
                next_node,
            } => {
                write!(f, "node {} port {} slice ", self.cur_node, send_port)?;
                match send_slice {
                    SliceSel::At(s) => write!(f, "{}", s)?,
                    SliceSel::Wildcard => write!(f, "*")?,
                }
                if let Some(next) = next_node {
                    write!(f, " -> {}", next)?;
                }
                Ok(())
            }
            StepKind::Node { send_node } => write!(f, "node {} -> node {}", self.cur_node, send_node),
        }
    }
}

/// A forwarding plan for packets to `dst` that are ready at `src` during `arrival_slice`.
///
/// Paths recur every cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Path {
    /// Originating node.
    pub src: NodeId,
    /// Destination node.
    pub dst: NodeId,
    /// Slice in which the packet is presented to the routing entry.
    pub arrival_slice: SliceIndex,
    /// Hops from `src` to `dst`.
    pub steps: Vec<Step>,
}

impl Path {
    /// Create a new path.
    pub fn new(src: NodeId, dst: NodeId, arrival_slice: SliceIndex, steps: Vec<Step>) -> Self {
        Self {
            src,
            dst,
            arrival_slice,
            steps,
        }
    }

    /// Number of hops.
    pub fn hop_count(&self) -> usize {
        self.steps.len()
    }

    /// Copy of this path reused for a different arrival slice.
    pub fn with_arrival(&self, arrival_slice: SliceIndex) -> Self {
        Self {
            arrival_slice,
            ..self.clone()
        }
    }

    /// Slices the packet waits at `src` before the first transmission.
    ///
    /// A first hop sent in the arrival slice itself counts as a full cycle when
    /// `full_cycle_on_same_slice` is set (direct-path semantics), zero otherwise.
    /// Returns `None` when the first hop is not time-indexed.
    pub fn wait_slices(&self, cycle_length: usize, full_cycle_on_same_slice: bool) -> Option<usize> {
        let send = self.steps.first()?.send_slice()? as usize;
        if cycle_length == 0 {
            return None;
        }
        let arrival = self.arrival_slice as usize % cycle_length;
        let wait = (send % cycle_length + cycle_length - arrival) % cycle_length;
        if wait == 0 && full_cycle_on_same_slice {
            Some(cycle_length)
        } else {
            Some(wait)
        }
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "path {} -> {} arriving slice {}:",
            self.src, self.dst, self.arrival_slice
        )?;
        for step in &self.steps {
            write!(f, " [{}]", step)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_values() {
        assert_eq!(SliceSel::At(3).wire(), 3);
        assert_eq!(SliceSel::Wildcard.wire(), 255);
        assert_eq!(NodeSel::Any.wire(), 255);
        assert_eq!(NodeSel::Node(7).wire(), 7);
    }

    #[test]
    fn test_wait_slices() {
        let path = Path::new(0, 1, 0, vec![Step::port(0, 0, SliceSel::At(1), Some(1))]);
        assert_eq!(path.wait_slices(2, true), Some(1));

        let same = path.with_arrival(1);
        assert_eq!(same.wait_slices(2, true), Some(2));
        assert_eq!(same.wait_slices(2, false), Some(0));

        let node_only = Path::new(0, 1, 0, vec![Step::node(NodeSel::Any, 1)]);
        assert_eq!(node_only.wait_slices(2, true), None);
    }

    #[test]
    fn test_step_serde_tagged() {
        let step = Step::node(NodeSel::Any, 4);
        let json = serde_json::to_string(&step).unwrap();
        assert!(json.contains("\"kind\":\"node\""));
        let back: Step = serde_json::from_str(&json).unwrap();
        assert_eq!(back, step);
    }
}
