//! Multi-hop search backward through slice time, with waiting at intermediate nodes.
//!
//! ## Algorithm
//!
//! 1. Seed a work queue with a partial path holding only `dst`, searched in
//!    the last slice of the cycle
//! 2. Pop a partial path; if `src` reaches its frontier node inside the
//!    searched slice within the hop budget, emit a completed path arriving
//!    in that slice
//! 3. Whether or not a path was emitted, enqueue
//!    - a wait variant: same hops, previous slice
//!    - one neighbour variant per unvisited in-neighbour of the frontier,
//!      with that hop prepended, previous slice
//! 4. Drop variants once the walk spans `search_cycles` full cycles
//!
//! Partial paths are plain values, so sibling branches never share state.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::{trace, warn};

use crate::error::{Result, ScheduleError};
use crate::store::TimeSliceGraph;
use crate::types::{NodeId, Path, SliceIndex, SliceSel, Step};

use super::{check_pair, node_count, ordered_pairs};

fn default_search_cycles() -> usize {
    1
}

/// Bounds of the backward search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HopSearch {
    /// Maximum hops per path.
    pub max_hops: usize,
    /// How many full cycles the search may walk back.
    ///
    /// With 1, a path whose hops would span more than one cycle is not found.
    #[serde(default = "default_search_cycles")]
    pub search_cycles: usize,
}

impl HopSearch {
    /// One-cycle search with the given hop budget.
    pub fn new(max_hops: usize) -> Self {
        Self {
            max_hops,
            search_cycles: default_search_cycles(),
        }
    }

    /// Override the search depth.
    pub fn with_search_cycles(mut self, search_cycles: usize) -> Self {
        self.search_cycles = search_cycles;
        self
    }

    fn validate(&self) -> Result<()> {
        if self.max_hops == 0 || self.search_cycles == 0 {
            return Err(ScheduleError::invalid(format!(
                "hop search needs max_hops >= 1 and search_cycles >= 1, got {} and {}",
                self.max_hops, self.search_cycles
            )));
        }
        Ok(())
    }
}

impl Default for HopSearch {
    fn default() -> Self {
        Self::new(2)
    }
}

#[derive(Debug, Clone)]
struct Partial {
    /// Node the rest of the route must reach.
    frontier: NodeId,
    /// Slice being searched.
    slice: usize,
    /// Slices walked back so far.
    elapsed: usize,
    /// Hops from `frontier` to the destination.
    steps: Vec<Step>,
    /// Nodes already on the path, `dst` included.
    visited: Vec<NodeId>,
}

/// Every path from `src` to `dst` the backward search discovers.
///
/// Paths may share an arrival slice and may leave slices uncovered; see
/// [`extend_paths_to_full_cycle`]. Returns
/// [`ScheduleError::HopBudgetExceeded`] when nothing is found.
pub fn find_bounded_hop_paths(
    graphs: &[TimeSliceGraph],
    src: NodeId,
    dst: NodeId,
    search: &HopSearch,
) -> Result<Vec<Path>> {
    check_pair(node_count(graphs)?, src, dst)?;
    search.validate()?;

    let len = graphs.len();
    let horizon = search.search_cycles * len;
    let mut paths = Vec::new();
    let mut queue: VecDeque<Partial> = VecDeque::new();
    queue.push_back(Partial {
        frontier: dst,
        slice: len - 1,
        elapsed: 0,
        steps: Vec::new(),
        visited: vec![dst],
    });

    while let Some(partial) = queue.pop_front() {
        let graph = &graphs[partial.slice];
        let slice = partial.slice as SliceIndex;

        match graph.shortest_path(src, partial.frontier) {
            Some(nodes) => {
                let hops = nodes.len() - 1 + partial.steps.len();
                let revisits = nodes[..nodes.len() - 1]
                    .iter()
                    .any(|node| partial.visited.contains(node));
                if hops == 0 || hops > search.max_hops {
                    trace!(src, dst, slice, hops, "hop budget exceeded");
                } else if revisits {
                    trace!(src, dst, slice, "prefix revisits a node on the suffix");
                } else {
                    let prefix: Option<Vec<Step>> = nodes
                        .windows(2)
                        .map(|w| {
                            graph
                                .send_port(w[0], w[1])
                                .map(|port| Step::port(w[0], port, SliceSel::At(slice), Some(w[1])))
                        })
                        .collect();
                    if let Some(mut steps) = prefix {
                        steps.extend(partial.steps.iter().copied());
                        paths.push(Path::new(src, dst, slice, steps));
                    }
                }
            }
            None => trace!(src, frontier = partial.frontier, slice, "frontier unreachable in slice"),
        }

        if partial.elapsed + 1 >= horizon {
            trace!(src, dst, hops = partial.steps.len(), "search horizon reached, dropping branch");
            continue;
        }
        let prev = (partial.slice + len - 1) % len;

        queue.push_back(Partial {
            slice: prev,
            elapsed: partial.elapsed + 1,
            ..partial.clone()
        });

        if partial.steps.len() < search.max_hops {
            for neighbour in graph.predecessors(partial.frontier) {
                if partial.visited.contains(&neighbour) {
                    continue;
                }
                let Some(port) = graph.send_port(neighbour, partial.frontier) else {
                    continue;
                };
                let mut steps = Vec::with_capacity(partial.steps.len() + 1);
                steps.push(Step::port(neighbour, port, SliceSel::At(slice), Some(partial.frontier)));
                steps.extend(partial.steps.iter().copied());
                let mut visited = partial.visited.clone();
                visited.push(neighbour);
                queue.push_back(Partial {
                    frontier: neighbour,
                    slice: prev,
                    elapsed: partial.elapsed + 1,
                    steps,
                    visited,
                });
            }
        }
    }

    if paths.is_empty() {
        return Err(ScheduleError::HopBudgetExceeded {
            src,
            dst,
            max_hops: search.max_hops,
        });
    }
    Ok(paths)
}

/// One path per arrival slice `0..cycle_length`, filling gaps by waiting.
///
/// Among paths discovered for the same slice the one with the fewest hops
/// wins, the earliest on ties. A slice without a path reuses the path of
/// the next covered slice, walking forward and wrapping. All input paths must
/// share one `(src, dst)` pair.
pub fn extend_paths_to_full_cycle(paths: &[Path], cycle_length: usize) -> Result<Vec<Path>> {
    let first = paths
        .first()
        .ok_or_else(|| ScheduleError::invalid("no paths to extend"))?;
    if cycle_length == 0 {
        return Err(ScheduleError::invalid("cycle length must be positive"));
    }

    let mut best: Vec<Option<&Path>> = vec![None; cycle_length];
    for path in paths {
        if path.src != first.src || path.dst != first.dst {
            return Err(ScheduleError::invalid(format!(
                "paths mix pairs {}->{} and {}->{}",
                first.src, first.dst, path.src, path.dst
            )));
        }
        let slot = best.get_mut(path.arrival_slice as usize).ok_or_else(|| {
            ScheduleError::invalid(format!(
                "arrival slice {} outside cycle of {}",
                path.arrival_slice, cycle_length
            ))
        })?;
        match slot {
            Some(current) if current.hop_count() <= path.hop_count() => {}
            _ => *slot = Some(path),
        }
    }

    let mut extended = Vec::with_capacity(cycle_length);
    for slice in 0..cycle_length {
        let chosen = (0..cycle_length)
            .map(|offset| (slice + offset) % cycle_length)
            .find_map(|s| best[s]);
        if let Some(path) = chosen {
            extended.push(path.with_arrival(slice as SliceIndex));
        }
    }
    Ok(extended)
}

/// Bounded-hop paths for every ordered pair, extended to the full cycle.
///
/// Pairs with no path within the budget are skipped with a warning.
pub fn routing_bounded_hop(graphs: &[TimeSliceGraph], search: &HopSearch) -> Result<Vec<Path>> {
    let nb_node = node_count(graphs)?;
    let mut paths = Vec::new();
    for (src, dst) in ordered_pairs(nb_node) {
        match find_bounded_hop_paths(graphs, src, dst, search) {
            Ok(found) => paths.extend(extend_paths_to_full_cycle(&found, graphs.len())?),
            Err(e) if e.is_recoverable() => warn!(src, dst, error = %e, "skipping pair"),
            Err(e) => return Err(e),
        }
    }
    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::TopologyStore;
    use crate::types::{Circuit, NodeSel};

    fn graphs(nb_node: usize, circuits: &[Circuit]) -> Vec<TimeSliceGraph> {
        let mut store = TopologyStore::new(nb_node).unwrap();
        store.deploy_topo(circuits, true).unwrap();
        store.graphs().to_vec()
    }

    // ────────────────────────────────────────────────────────────────
    // Search
    // ────────────────────────────────────────────────────────────────

    #[test]
    fn test_relay_through_intermediate() {
        // Slice 0: 0-1. Slice 1: 1-2. Node 0 reaches 2 only by waiting at 1.
        let g = graphs(3, &[Circuit::new(0, 0, 1, 0, 0), Circuit::new(1, 1, 2, 0, 0)]);
        let paths = find_bounded_hop_paths(&g, 0, 2, &HopSearch::new(2)).unwrap();

        assert_eq!(paths.len(), 1);
        let path = &paths[0];
        assert_eq!(path.arrival_slice, 0);
        assert_eq!(
            path.steps,
            vec![
                Step::port(0, 0, SliceSel::At(0), Some(1)),
                Step::port(1, 0, SliceSel::At(1), Some(2)),
            ]
        );
    }

    #[test]
    fn test_hop_budget() {
        let g = graphs(3, &[Circuit::new(0, 0, 1, 0, 0), Circuit::new(1, 1, 2, 0, 0)]);
        let err = find_bounded_hop_paths(&g, 0, 2, &HopSearch::new(1)).unwrap_err();
        assert!(matches!(err, ScheduleError::HopBudgetExceeded { max_hops: 1, .. }));
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_multi_hop_within_one_slice() {
        // A line 0-1-2 in a single slice.
        let g = graphs(3, &[Circuit::new(0, 0, 1, 0, 0), Circuit::new(0, 1, 2, 1, 1)]);
        let paths = find_bounded_hop_paths(&g, 0, 2, &HopSearch::new(2)).unwrap();
        assert!(paths.iter().all(|p| p.hop_count() <= 2));
        assert!(paths.iter().any(|p| p.arrival_slice == 0 && p.hop_count() == 2));
    }

    #[test]
    fn test_prefix_never_passes_through_destination() {
        // Slice 0: line 0-2-1. Slice 1: 1-2. Reaching relay 1 in slice 0
        // would go through 2 first, then come back to it.
        let g = graphs(
            3,
            &[
                Circuit::new(0, 0, 2, 0, 0),
                Circuit::new(0, 2, 1, 1, 1),
                Circuit::new(1, 1, 2, 0, 0),
            ],
        );
        let paths = find_bounded_hop_paths(&g, 0, 2, &HopSearch::new(3)).unwrap();

        assert_eq!(paths.len(), 1);
        assert_eq!(paths[0].steps, vec![Step::port(0, 0, SliceSel::At(0), Some(2))]);
        for path in &paths {
            let mut nodes: Vec<_> = path.steps.iter().map(|s| s.cur_node).collect();
            nodes.push(NodeSel::Node(path.dst));
            let unique: std::collections::BTreeSet<_> = nodes.iter().collect();
            assert_eq!(unique.len(), nodes.len());
        }
    }

    #[test]
    fn test_search_cycles_finds_wrapped_routes() {
        // Slice 0: 1-2. Slice 1: 0-1. The relay at 1 must wait across the cycle boundary.
        let g = graphs(3, &[Circuit::new(0, 1, 2, 0, 0), Circuit::new(1, 0, 1, 0, 0)]);
        let one = HopSearch::new(2);
        assert!(find_bounded_hop_paths(&g, 0, 2, &one).is_err());

        let two = HopSearch::new(2).with_search_cycles(2);
        let paths = find_bounded_hop_paths(&g, 0, 2, &two).unwrap();
        assert!(paths.iter().any(|p| {
            p.arrival_slice == 1
                && p.steps
                    == vec![
                        Step::port(0, 0, SliceSel::At(1), Some(1)),
                        Step::port(1, 0, SliceSel::At(0), Some(2)),
                    ]
        }));
    }

    #[test]
    fn test_invalid_search() {
        let g = graphs(2, &[Circuit::new(0, 0, 1, 0, 0)]);
        assert!(matches!(
            find_bounded_hop_paths(&g, 0, 1, &HopSearch::new(0)),
            Err(ScheduleError::InvalidParameter(_))
        ));
        assert!(find_bounded_hop_paths(&g, 0, 0, &HopSearch::new(1)).is_err());
    }

    // ────────────────────────────────────────────────────────────────
    // Cycle extension
    // ────────────────────────────────────────────────────────────────

    fn one_hop(arrival: SliceIndex, send: SliceIndex) -> Path {
        Path::new(0, 1, arrival, vec![Step::port(0, 0, SliceSel::At(send), Some(1))])
    }

    #[test]
    fn test_extend_fills_gaps_forward() {
        let found = vec![one_hop(1, 1), one_hop(3, 3)];
        let full = extend_paths_to_full_cycle(&found, 5).unwrap();

        let arrivals: Vec<_> = full.iter().map(|p| p.arrival_slice).collect();
        assert_eq!(arrivals, vec![0, 1, 2, 3, 4]);
        let sends: Vec<_> = full.iter().map(|p| p.steps[0].send_slice().unwrap()).collect();
        assert_eq!(sends, vec![1, 1, 3, 3, 1]);
    }

    #[test]
    fn test_extend_prefers_fewer_hops() {
        let long = Path::new(
            0,
            1,
            2,
            vec![
                Step::port(0, 0, SliceSel::At(2), Some(2)),
                Step::port(2, 0, SliceSel::At(2), Some(1)),
            ],
        );
        let full = extend_paths_to_full_cycle(&[long, one_hop(2, 2), one_hop(2, 0)], 3).unwrap();
        assert_eq!(full.len(), 3);
        assert!(full.iter().all(|p| p.steps == one_hop(2, 2).steps));
    }

    #[test]
    fn test_extend_rejects_bad_input() {
        assert!(extend_paths_to_full_cycle(&[], 3).is_err());
        assert!(extend_paths_to_full_cycle(&[one_hop(3, 3)], 3).is_err());
        let other = Path::new(1, 0, 0, vec![]);
        assert!(extend_paths_to_full_cycle(&[one_hop(0, 0), other], 3).is_err());
    }

    #[test]
    fn test_routing_bounded_hop_covers_cycle() {
        let circuits = crate::topology::round_robin(4, false).unwrap();
        let g = graphs(4, &circuits);
        let paths = routing_bounded_hop(&g, &HopSearch::new(2)).unwrap();
        assert_eq!(paths.len(), 12 * 3);
        assert!(paths.iter().all(|p| p.hop_count() <= 2));
    }
}
