//! Path to flow-table compilation.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

use crate::error::{Result, ScheduleError};
use crate::types::{
    HopTarget, NodeId, Path, SendSlot, SliceIndex, SliceSel, Step, StepKind, TimeFlowEntry,
    TimeFlowHop,
};

/// How much of a path a node's table holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutingMode {
    /// The whole route, carried from the source.
    Source,
    /// Only the first hop; later nodes decide from their own tables.
    #[default]
    PerHop,
}

/// How a hop picks the queue it waits in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AddressingMode {
    /// One calendar queue per send slice.
    #[default]
    TimeIndexed,
    /// One queue per destination node.
    PerDestinationQueue,
}

/// Compiled entries per node, each list in path order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FlowTables(BTreeMap<NodeId, Vec<TimeFlowEntry>>);

impl FlowTables {
    /// Entries owned by `node`.
    pub fn get(&self, node: NodeId) -> &[TimeFlowEntry] {
        self.0.get(&node).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Nodes with at least one entry, ascending.
    pub fn nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.0.keys().copied()
    }

    /// `(node, entries)` pairs, ascending by node.
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &[TimeFlowEntry])> {
        self.0.iter().map(|(node, entries)| (*node, entries.as_slice()))
    }

    /// Total number of entries.
    pub fn entry_count(&self) -> usize {
        self.0.values().map(Vec::len).sum()
    }

    /// Whether no node has entries.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Turns [`Path`]s into per-node [`TimeFlowEntry`] lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FlowTableCompiler {
    /// Source or per-hop tables.
    pub routing_mode: RoutingMode,
    /// Queue selection scheme.
    pub addressing_mode: AddressingMode,
}

impl FlowTableCompiler {
    /// Create a compiler for the given modes.
    pub fn new(routing_mode: RoutingMode, addressing_mode: AddressingMode) -> Self {
        Self {
            routing_mode,
            addressing_mode,
        }
    }

    /// Compile paths, grouped by source node.
    ///
    /// Each path yields one entry keyed `(dst, arrival_slice)` at its source.
    /// Fails with [`ScheduleError::InvariantViolation`] on an empty path, a
    /// node-indexed step under per-destination queues, or a key used twice
    /// at one node.
    pub fn compile(&self, paths: &[Path]) -> Result<FlowTables> {
        let mut tables: BTreeMap<NodeId, Vec<TimeFlowEntry>> = BTreeMap::new();
        let mut keys: BTreeSet<(NodeId, NodeId, SliceIndex)> = BTreeSet::new();

        for path in paths {
            let entry = self.compile_path(path)?;
            if !keys.insert((path.src, entry.dst, entry.arrival_slice)) {
                return Err(ScheduleError::invariant(format!(
                    "node {} has two entries for dst {} arrival {}",
                    path.src, entry.dst, entry.arrival_slice
                )));
            }
            tables.entry(path.src).or_default().push(entry);
        }

        debug!(
            paths = paths.len(),
            nodes = tables.len(),
            routing_mode = ?self.routing_mode,
            addressing_mode = ?self.addressing_mode,
            "flow tables compiled"
        );
        Ok(FlowTables(tables))
    }

    /// Compile a single path into its entry.
    pub fn compile_path(&self, path: &Path) -> Result<TimeFlowEntry> {
        let steps: &[Step] = match self.routing_mode {
            RoutingMode::Source => &path.steps,
            RoutingMode::PerHop => {
                if path.steps.len() > 1 {
                    warn!(
                        src = path.src,
                        dst = path.dst,
                        arrival = path.arrival_slice,
                        hops = path.steps.len(),
                        "per-hop routing keeps only the first hop"
                    );
                }
                path.steps.get(..1).unwrap_or(&[])
            }
        };
        if steps.is_empty() {
            return Err(ScheduleError::invariant(format!(
                "path {} -> {} arrival {} has no steps",
                path.src, path.dst, path.arrival_slice
            )));
        }

        let hops = steps
            .iter()
            .map(|step| self.compile_step(path, step))
            .collect::<Result<Vec<_>>>()?;
        Ok(TimeFlowEntry::new(path.dst, path.arrival_slice, hops))
    }

    fn compile_step(&self, path: &Path, step: &Step) -> Result<TimeFlowHop> {
        match step.kind {
            StepKind::Port {
                send_port,
                send_slice,
                ..
            } => {
                let slot = match self.addressing_mode {
                    AddressingMode::TimeIndexed => match send_slice {
                        SliceSel::At(slice) => SendSlot::Slice(slice),
                        SliceSel::Wildcard => SendSlot::Wildcard,
                    },
                    AddressingMode::PerDestinationQueue => SendSlot::Destination(path.dst),
                };
                Ok(TimeFlowHop::new(step.cur_node, HopTarget::Port(send_port), slot))
            }
            StepKind::Node { send_node } => match self.addressing_mode {
                AddressingMode::TimeIndexed => Ok(TimeFlowHop::new(
                    step.cur_node,
                    HopTarget::Node(send_node),
                    SendSlot::Wildcard,
                )),
                AddressingMode::PerDestinationQueue => Err(ScheduleError::invariant(format!(
                    "node-indexed step toward {} cannot use per-destination queues",
                    send_node
                ))),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::NodeSel;

    fn two_hop(arrival: SliceIndex) -> Path {
        Path::new(
            0,
            2,
            arrival,
            vec![
                Step::port(0, 1, SliceSel::At(0), Some(1)),
                Step::port(1, 0, SliceSel::At(1), Some(2)),
            ],
        )
    }

    #[test]
    fn test_source_keeps_all_hops() {
        let compiler = FlowTableCompiler::new(RoutingMode::Source, AddressingMode::TimeIndexed);
        let tables = compiler.compile(&[two_hop(0)]).unwrap();
        let entries = tables.get(0);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].key(), (2, 0));
        assert_eq!(
            entries[0].hops,
            vec![
                TimeFlowHop::new(NodeSel::Node(0), HopTarget::Port(1), SendSlot::Slice(0)),
                TimeFlowHop::new(NodeSel::Node(1), HopTarget::Port(0), SendSlot::Slice(1)),
            ]
        );
    }

    #[test]
    fn test_per_hop_truncates() {
        let compiler = FlowTableCompiler::default();
        let entry = compiler.compile_path(&two_hop(0)).unwrap();
        assert_eq!(entry.hops.len(), 1);
        assert_eq!(entry.hops[0].wire(), (0, 0, 1));
    }

    #[test]
    fn test_destination_queues() {
        let compiler = FlowTableCompiler::new(RoutingMode::PerHop, AddressingMode::PerDestinationQueue);
        let path = Path::new(3, 1, 0, vec![Step::port(3, 0, SliceSel::Wildcard, None)]);
        let entry = compiler.compile_path(&path).unwrap();
        assert_eq!(entry.hops[0].send_slot, SendSlot::Destination(1));
        assert_eq!(entry.hops[0].wire(), (3, 1, 0));
    }

    #[test]
    fn test_node_steps() {
        let path = Path::new(
            0,
            3,
            1,
            vec![
                Step::port(0, 0, SliceSel::At(1), None),
                Step::node(NodeSel::Any, 3),
            ],
        );
        let source = FlowTableCompiler::new(RoutingMode::Source, AddressingMode::TimeIndexed);
        let entry = source.compile_path(&path).unwrap();
        assert_eq!(entry.hops[1].wire(), (255, 255, 3));

        let ta = FlowTableCompiler::new(RoutingMode::Source, AddressingMode::PerDestinationQueue);
        assert!(matches!(
            ta.compile_path(&path),
            Err(ScheduleError::InvariantViolation(_))
        ));
    }

    #[test]
    fn test_duplicate_key_rejected() {
        let compiler = FlowTableCompiler::default();
        let err = compiler.compile(&[two_hop(0), two_hop(0)]).unwrap_err();
        assert!(matches!(err, ScheduleError::InvariantViolation(_)));

        let ok = compiler.compile(&[two_hop(0), two_hop(1)]).unwrap();
        assert_eq!(ok.entry_count(), 2);
        assert_eq!(ok.nodes().collect::<Vec<_>>(), vec![0]);
    }

    #[test]
    fn test_empty_path_rejected() {
        let compiler = FlowTableCompiler::default();
        assert!(compiler.compile(&[Path::new(0, 1, 0, vec![])]).is_err());
        assert!(compiler.compile(&[]).unwrap().is_empty());
    }
}
