//! Path search through the slice cycle.
//!
//! Every strategy reads per-slice graphs (usually [`TopologyStore::graphs`])
//! and returns [`Path`]s. Strategies are pure: they never touch the store.
//!
//! [`TopologyStore::graphs`]: crate::store::TopologyStore::graphs

pub mod bounded_hop;
pub mod direct;
pub mod per_slice;

use serde::{Deserialize, Serialize};

use crate::error::{Result, ScheduleError};
use crate::store::TimeSliceGraph;
use crate::types::{NodeId, Path, PortId};

pub use bounded_hop::{extend_paths_to_full_cycle, find_bounded_hop_paths, routing_bounded_hop, HopSearch};
pub use direct::{find_direct_path, routing_direct, routing_direct_ta};
pub use per_slice::{routing_ksp, routing_vlb, shortest_path_steps};

/// Routing strategy selected by configuration.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RoutingStrategy {
    /// One hop over the next direct circuit.
    #[default]
    Direct,
    /// Multi-hop search with waiting at intermediate nodes.
    BoundedHop(HopSearch),
    /// Shortest path inside each slice independently.
    ShortestPerSlice,
    /// Uplink first, node-indexed delivery second.
    Valiant,
    /// Single-slice direct routing for per-destination queues.
    DirectTrafficAware,
}

impl RoutingStrategy {
    /// Compute paths for every ordered node pair.
    ///
    /// `uplinks` lists the ports a node may use as its first Valiant hop.
    pub fn compute(&self, graphs: &[TimeSliceGraph], uplinks: &[PortId]) -> Result<Vec<Path>> {
        match self {
            Self::Direct => routing_direct(graphs),
            Self::BoundedHop(search) => routing_bounded_hop(graphs, search),
            Self::ShortestPerSlice => routing_ksp(graphs),
            Self::Valiant => routing_vlb(graphs, uplinks),
            Self::DirectTrafficAware => routing_direct_ta(graphs),
        }
    }

    /// Short name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Direct => "direct",
            Self::BoundedHop(_) => "bounded_hop",
            Self::ShortestPerSlice => "shortest_per_slice",
            Self::Valiant => "valiant",
            Self::DirectTrafficAware => "direct_traffic_aware",
        }
    }
}

/// Node count shared by all slices.
pub(crate) fn node_count(graphs: &[TimeSliceGraph]) -> Result<usize> {
    graphs
        .first()
        .map(|g| g.nb_node())
        .ok_or_else(|| ScheduleError::invalid("topology has no slices"))
}

/// Ordered pairs `(src, dst)` with `src != dst`, ascending.
pub(crate) fn ordered_pairs(nb_node: usize) -> impl Iterator<Item = (NodeId, NodeId)> {
    let n = nb_node as NodeId;
    (0..n).flat_map(move |src| (0..n).filter(move |dst| *dst != src).map(move |dst| (src, dst)))
}

pub(crate) fn check_pair(nb_node: usize, src: NodeId, dst: NodeId) -> Result<()> {
    if src == dst {
        return Err(ScheduleError::invalid(format!(
            "source and destination are both node {}",
            src
        )));
    }
    for node in [src, dst] {
        if node as usize >= nb_node {
            return Err(ScheduleError::invalid(format!(
                "node {} outside 0..{}",
                node, nb_node
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordered_pairs() {
        let pairs: Vec<_> = ordered_pairs(3).collect();
        assert_eq!(pairs, vec![(0, 1), (0, 2), (1, 0), (1, 2), (2, 0), (2, 1)]);
    }

    #[test]
    fn test_check_pair() {
        assert!(check_pair(3, 0, 2).is_ok());
        assert!(check_pair(3, 1, 1).is_err());
        assert!(check_pair(3, 0, 3).is_err());
    }

    #[test]
    fn test_strategy_serde() {
        let s: RoutingStrategy =
            serde_json::from_str(r#"{"kind":"bounded_hop","max_hops":3}"#).unwrap();
        assert_eq!(
            s,
            RoutingStrategy::BoundedHop(HopSearch {
                max_hops: 3,
                search_cycles: 1
            })
        );
        let s: RoutingStrategy = serde_json::from_str(r#"{"kind":"valiant"}"#).unwrap();
        assert_eq!(s.name(), "valiant");
    }

    #[test]
    fn test_empty_topology_rejected() {
        assert!(RoutingStrategy::Direct.compute(&[], &[0]).is_err());
    }
}
