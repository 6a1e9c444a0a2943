//! Circuit-switch schedule derived from a topology store.

use serde::{Deserialize, Serialize};

use crate::store::TopologyStore;
use crate::types::{NodeId, PortId, SliceIndex};

/// Circuit-switch port wired to `node`'s uplink `port`.
pub fn ocs_port(nb_node: usize, node: NodeId, port: PortId) -> u32 {
    port * nb_node as u32 + node
}

/// Action for `(port, slice)` pairs without a scheduled circuit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OcsAction {
    /// Discard the packet.
    #[default]
    Drop,
}

/// One directed circuit instance: traffic entering `ingress` in `slice` leaves at `egress`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OcsEntry {
    /// Slice of the circuit.
    pub slice: SliceIndex,
    /// Circuit-switch ingress port.
    pub ingress: u32,
    /// Circuit-switch egress port.
    pub egress: u32,
}

/// Full circuit-switch program.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OcsSchedule {
    /// Number of slices in the cycle.
    pub cycle_length: usize,
    /// Scheduled circuits, ordered by slice then ingress.
    pub entries: Vec<OcsEntry>,
    /// Action for everything else.
    pub default_action: OcsAction,
}

impl OcsSchedule {
    /// One entry per directed link in every slice of `store`.
    pub fn from_store(store: &TopologyStore) -> Self {
        let nb_node = store.nb_node();
        let mut entries: Vec<OcsEntry> = store
            .graphs()
            .iter()
            .enumerate()
            .flat_map(|(slice, graph)| {
                graph.links().map(move |link| OcsEntry {
                    slice: slice as SliceIndex,
                    ingress: ocs_port(nb_node, link.from.node, link.from.port),
                    egress: ocs_port(nb_node, link.to.node, link.to.port),
                })
            })
            .collect();
        entries.sort();
        Self {
            cycle_length: store.cycle_length(),
            entries,
            default_action: OcsAction::Drop,
        }
    }
}
