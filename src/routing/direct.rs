//! Single-hop routing over the next direct circuit.

use tracing::debug;

use crate::error::{Result, ScheduleError};
use crate::store::TimeSliceGraph;
use crate::types::{NodeId, Path, PortId, SliceIndex, SliceSel, Step};

use super::{check_pair, node_count, ordered_pairs};

/// One-hop paths from `src` to `dst` for every arrival slice.
///
/// A packet arriving in slice `a` is sent at the first slice strictly after
/// `a` (wrapping) in which `src` has a circuit to `dst`. An arrival in the
/// only slice with such a circuit therefore waits a full cycle. Returns an
/// empty list when the two nodes are never directly connected.
pub fn find_direct_path(graphs: &[TimeSliceGraph], src: NodeId, dst: NodeId) -> Result<Vec<Path>> {
    check_pair(node_count(graphs)?, src, dst)?;

    let ports: Vec<Option<PortId>> = graphs.iter().map(|g| g.send_port(src, dst)).collect();
    if ports.iter().all(Option::is_none) {
        debug!(src, dst, "no direct circuit in any slice");
        return Ok(Vec::new());
    }

    let len = graphs.len();
    let mut paths = Vec::with_capacity(len);
    for arrival in 0..len {
        let next = (1..=len)
            .map(|offset| (arrival + offset) % len)
            .find_map(|slice| ports[slice].map(|port| (slice, port)));
        if let Some((slice, port)) = next {
            let step = Step::port(src, port, SliceSel::At(slice as SliceIndex), Some(dst));
            paths.push(Path::new(src, dst, arrival as SliceIndex, vec![step]));
        }
    }
    Ok(paths)
}

/// [`find_direct_path`] for every ordered node pair.
pub fn routing_direct(graphs: &[TimeSliceGraph]) -> Result<Vec<Path>> {
    let nb_node = node_count(graphs)?;
    let mut paths = Vec::new();
    for (src, dst) in ordered_pairs(nb_node) {
        paths.extend(find_direct_path(graphs, src, dst)?);
    }
    Ok(paths)
}

/// Direct routing for a single-slice traffic-aware fabric.
///
/// Every pair gets one path sending out port 0 without a time index; the
/// destination queue decides when the packet leaves.
pub fn routing_direct_ta(graphs: &[TimeSliceGraph]) -> Result<Vec<Path>> {
    let nb_node = node_count(graphs)?;
    if graphs.len() != 1 {
        return Err(ScheduleError::invalid(format!(
            "traffic-aware routing needs exactly one slice, found {}",
            graphs.len()
        )));
    }
    Ok(ordered_pairs(nb_node)
        .map(|(src, dst)| Path::new(src, dst, 0, vec![Step::port(src, 0, SliceSel::Wildcard, None)]))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{Direction, TopologyStore};
    use crate::types::Circuit;

    fn store(nb_node: usize, circuits: &[Circuit]) -> TopologyStore {
        let mut store = TopologyStore::new(nb_node).unwrap();
        store.deploy_topo(circuits, true).unwrap();
        store
    }

    #[test]
    fn test_waits_for_next_occurrence() {
        // 0-1 only in slice 1 of 2.
        let s = store(2, &[Circuit::new(1, 0, 1, 0, 0)]);
        let paths = find_direct_path(s.graphs(), 0, 1).unwrap();
        assert_eq!(paths.len(), 2);

        assert_eq!(paths[0].arrival_slice, 0);
        assert_eq!(paths[0].steps, vec![Step::port(0, 0, SliceSel::At(1), Some(1))]);
        assert_eq!(paths[0].wait_slices(2, true), Some(1));

        assert_eq!(paths[1].arrival_slice, 1);
        assert_eq!(paths[1].steps[0].send_slice(), Some(1));
        assert_eq!(paths[1].wait_slices(2, true), Some(2));
    }

    #[test]
    fn test_multiple_occurrences() {
        let mut s = TopologyStore::new(3).unwrap();
        s.connect(1, 0, 1, 0, 0, Direction::Bidirectional).unwrap();
        s.connect(3, 0, 1, 1, 1, Direction::Bidirectional).unwrap();
        let paths = find_direct_path(s.graphs(), 0, 1).unwrap();
        let sends: Vec<_> = paths.iter().map(|p| p.steps[0].send_slice().unwrap()).collect();
        assert_eq!(sends, vec![1, 3, 3, 1]);
        assert!(matches!(
            paths[1].steps[0].kind,
            crate::types::StepKind::Port { send_port: 1, .. }
        ));
    }

    #[test]
    fn test_never_connected() {
        let s = store(3, &[Circuit::new(0, 0, 1, 0, 0)]);
        assert!(find_direct_path(s.graphs(), 0, 2).unwrap().is_empty());
        assert!(find_direct_path(s.graphs(), 1, 1).is_err());
    }

    #[test]
    fn test_routing_direct_round_robin() {
        let circuits = crate::topology::round_robin(4, false).unwrap();
        let s = store(4, &circuits);
        let paths = routing_direct(s.graphs()).unwrap();
        // 12 ordered pairs x 3 arrival slices.
        assert_eq!(paths.len(), 36);
        assert!(paths.iter().all(|p| p.hop_count() == 1));
    }

    #[test]
    fn test_direct_ta() {
        let s = store(4, &[Circuit::new(0, 0, 1, 0, 0), Circuit::new(0, 2, 3, 0, 0)]);
        let paths = routing_direct_ta(s.graphs()).unwrap();
        assert_eq!(paths.len(), 12);
        assert!(paths
            .iter()
            .all(|p| p.arrival_slice == 0 && p.steps[0].send_slice().is_none()));

        let two = store(2, &[Circuit::new(1, 0, 1, 0, 0)]);
        assert!(routing_direct_ta(two.graphs()).is_err());
    }
}
