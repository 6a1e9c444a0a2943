//! Strategies that solve each slice on its own.

use tracing::debug;

use crate::error::{Result, ScheduleError};
use crate::store::TimeSliceGraph;
use crate::types::{NodeId, NodeSel, Path, PortId, SliceIndex, SliceSel, Step};

use super::{node_count, ordered_pairs};

/// Fewest-hop steps from `src` to `dst` inside one slice, all sent in that slice.
pub fn shortest_path_steps(
    graph: &TimeSliceGraph,
    slice: SliceIndex,
    src: NodeId,
    dst: NodeId,
) -> Result<Vec<Step>> {
    let not_found = || ScheduleError::PathNotFound { src, dst, slice };
    let nodes = graph.shortest_path(src, dst).ok_or_else(not_found)?;
    nodes
        .windows(2)
        .map(|w| {
            graph
                .send_port(w[0], w[1])
                .map(|port| Step::port(w[0], port, SliceSel::At(slice), Some(w[1])))
                .ok_or_else(not_found)
        })
        .collect()
}

/// Shortest path per ordered pair and slice, with no carry-over between slices.
///
/// `(pair, slice)` combinations without a path are logged and skipped.
pub fn routing_ksp(graphs: &[TimeSliceGraph]) -> Result<Vec<Path>> {
    let nb_node = node_count(graphs)?;
    let mut paths = Vec::new();
    for (src, dst) in ordered_pairs(nb_node) {
        for (slice, graph) in graphs.iter().enumerate() {
            let slice = slice as SliceIndex;
            match shortest_path_steps(graph, slice, src, dst) {
                Ok(steps) => paths.push(Path::new(src, dst, slice, steps)),
                Err(e) if e.is_recoverable() => debug!(error = %e, "skipping slice"),
                Err(e) => return Err(e),
            }
        }
    }
    Ok(paths)
}

/// Valiant load balancing: out the first uplink now, then deliver by node id.
///
/// The second hop runs at whichever node received the packet and is not
/// tied to a slice.
pub fn routing_vlb(graphs: &[TimeSliceGraph], uplinks: &[PortId]) -> Result<Vec<Path>> {
    let nb_node = node_count(graphs)?;
    let uplink = *uplinks
        .first()
        .ok_or_else(|| ScheduleError::invalid("valiant routing needs at least one uplink port"))?;

    let mut paths = Vec::with_capacity(nb_node * nb_node.saturating_sub(1) * graphs.len());
    for (src, dst) in ordered_pairs(nb_node) {
        for slice in 0..graphs.len() as SliceIndex {
            paths.push(Path::new(
                src,
                dst,
                slice,
                vec![
                    Step::port(src, uplink, SliceSel::At(slice), None),
                    Step::node(NodeSel::Any, dst),
                ],
            ));
        }
    }
    Ok(paths)
}
