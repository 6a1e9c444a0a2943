//! Device-level table records and the per-node slot lookup table.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::warn;

use crate::compiler::{AddressingMode, FlowTableCompiler, RoutingMode};
use crate::error::Result;
use crate::routing::{find_direct_path, node_count};
use crate::store::TimeSliceGraph;
use crate::types::{NodeId, TimeFlowEntry};

use super::TableKind;

/// One table write as a device control channel would receive it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableWrite {
    /// Table name.
    pub table: String,
    /// Action name.
    pub action: String,
    /// Match key fields.
    pub key: BTreeMap<String, u32>,
    /// Action parameters.
    pub data: Vec<u32>,
}

impl TableWrite {
    /// Render one entry for a table.
    ///
    /// Per-hop and slot lookup tables use the first hop only; a longer entry
    /// is logged and truncated.
    pub fn render(kind: TableKind, entry: &TimeFlowEntry) -> Self {
        let mut key = BTreeMap::new();
        key.insert("dst".to_string(), entry.dst);
        key.insert("arrival_slice".to_string(), entry.arrival_slice);

        if kind != TableKind::SourceRouting && entry.hops.len() > 1 {
            warn!(table = kind.name(), %entry, "multi-hop entry in a single-hop table, truncating");
        }

        let (action, data) = match kind {
            TableKind::PerHopRouting => (
                "write_time_flow_entry".to_string(),
                entry
                    .hops
                    .first()
                    .map(|hop| {
                        let (node, slot, target) = hop.wire();
                        vec![node, slot, target]
                    })
                    .unwrap_or_default(),
            ),
            TableKind::SourceRouting => (
                format!("write_source_route_{}", entry.hops.len().saturating_sub(1)),
                entry
                    .hops
                    .iter()
                    .flat_map(|hop| {
                        let (node, slot, target) = hop.wire();
                        [node, slot, target]
                    })
                    .collect(),
            ),
            TableKind::SlotLookup => (
                "to_calendar_queue".to_string(),
                entry
                    .hops
                    .first()
                    .map(|hop| vec![hop.target.wire(), hop.send_slot.wire()])
                    .unwrap_or_default(),
            ),
        };

        Self {
            table: kind.name().to_string(),
            action,
            key,
            data,
        }
    }

    /// Render a node's entries for a table.
    pub fn render_all(kind: TableKind, entries: &[TimeFlowEntry]) -> Vec<Self> {
        entries.iter().map(|entry| Self::render(kind, entry)).collect()
    }
}

/// Slot lookup entries of `node`: the next direct circuit to every other node.
pub fn slot_lookup_entries(graphs: &[TimeSliceGraph], node: NodeId) -> Result<Vec<TimeFlowEntry>> {
    let nb_node = node_count(graphs)?;
    let compiler = FlowTableCompiler::new(RoutingMode::PerHop, AddressingMode::TimeIndexed);
    let mut entries = Vec::new();
    for dst in (0..nb_node as NodeId).filter(|dst| *dst != node) {
        for path in find_direct_path(graphs, node, dst)? {
            entries.push(compiler.compile_path(&path)?);
        }
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::TopologyStore;
    use crate::types::{Circuit, HopTarget, NodeSel, SendSlot, TimeFlowHop};

    fn entry(hops: usize) -> TimeFlowEntry {
        let hops = (0..hops as u32)
            .map(|i| TimeFlowHop::new(NodeSel::Node(i), HopTarget::Port(1), SendSlot::Slice(i + 2)))
            .collect();
        TimeFlowEntry::new(5, 1, hops)
    }

    #[test]
    fn test_render_per_hop() {
        let write = TableWrite::render(TableKind::PerHopRouting, &entry(2));
        assert_eq!(write.table, "per_hop_routing");
        assert_eq!(write.key["dst"], 5);
        assert_eq!(write.key["arrival_slice"], 1);
        assert_eq!(write.data, vec![0, 2, 1]);
    }

    #[test]
    fn test_render_source() {
        let write = TableWrite::render(TableKind::SourceRouting, &entry(2));
        assert_eq!(write.action, "write_source_route_1");
        assert_eq!(write.data, vec![0, 2, 1, 1, 3, 1]);

        let json = serde_json::to_value(&write).unwrap();
        assert_eq!(json["table"], "source_routing");
    }

    #[test]
    fn test_slot_lookup() {
        let mut store = TopologyStore::new(3).unwrap();
        store
            .deploy_topo(&[Circuit::new(0, 0, 1, 0, 0), Circuit::new(1, 0, 2, 0, 0)], true)
            .unwrap();
        let entries = slot_lookup_entries(store.graphs(), 0).unwrap();
        // Two destinations x two arrival slices.
        assert_eq!(entries.len(), 4);
        let to_one: Vec<_> = entries.iter().filter(|e| e.dst == 1).collect();
        assert!(to_one.iter().all(|e| e.hops[0].send_slot == SendSlot::Slice(0)));

        let writes = TableWrite::render_all(TableKind::SlotLookup, &entries);
        assert_eq!(writes[0].data, vec![0, 0]);
    }
}
