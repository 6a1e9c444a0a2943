//! Circle-method one-factorization.

use crate::error::{Result, ScheduleError};
use crate::types::{Circuit, NodeId, PortId, SliceIndex};

/// Round-robin schedule over nodes `0..nb_node` on port 0.
///
/// Every unordered pair of nodes is connected in exactly one slice. Even
/// counts produce `nb_node - 1` slices; odd counts produce `nb_node` slices,
/// each leaving one node idle. With `self_loop`, one extra slice connects
/// every node to itself.
pub fn round_robin(nb_node: usize, self_loop: bool) -> Result<Vec<Circuit>> {
    if nb_node < 2 {
        return Err(ScheduleError::invalid(format!(
            "round robin needs at least 2 nodes, got {}",
            nb_node
        )));
    }
    let nodes: Vec<NodeId> = (0..nb_node as NodeId).collect();
    Ok(round_robin_over(&nodes, 0, 0, self_loop))
}

/// Round-robin schedule over an arbitrary node list.
///
/// `port_a` is used by the node at the fixed half of the circle, `port_b` by
/// its partner.
pub fn round_robin_over(nodes: &[NodeId], port_a: PortId, port_b: PortId, self_loop: bool) -> Vec<Circuit> {
    // None marks the dummy partner of an odd circle.
    let mut circle: Vec<Option<NodeId>> = nodes.iter().copied().map(Some).collect();
    if circle.len() % 2 == 1 {
        circle.push(None);
    }
    let size = circle.len();
    let mut circuits = Vec::new();

    for slice in 0..size.saturating_sub(1) {
        for i in 0..size / 2 {
            if let (Some(a), Some(b)) = (circle[i], circle[size - 1 - i]) {
                circuits.push(Circuit::new(slice as SliceIndex, a, b, port_a, port_b));
            }
        }
        if let Some(last) = circle.pop() {
            circle.insert(1, last);
        }
    }

    if self_loop {
        let slice = size.saturating_sub(1) as SliceIndex;
        for node in circle.iter().flatten() {
            circuits.push(Circuit::new(slice, *node, *node, port_a, port_b));
        }
    }
    circuits
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::cycle_length_of;
    use std::collections::BTreeSet;

    fn pairs(circuits: &[Circuit]) -> Vec<(NodeId, NodeId)> {
        circuits.iter().map(|c| c.unordered_pair()).collect()
    }

    #[test]
    fn test_four_nodes() {
        let circuits = round_robin(4, false).unwrap();
        assert_eq!(
            circuits,
            vec![
                Circuit::new(0, 0, 3, 0, 0),
                Circuit::new(0, 1, 2, 0, 0),
                Circuit::new(1, 0, 2, 0, 0),
                Circuit::new(1, 3, 1, 0, 0),
                Circuit::new(2, 0, 1, 0, 0),
                Circuit::new(2, 2, 3, 0, 0),
            ]
        );
    }

    #[test]
    fn test_odd_count_idles_one_node() {
        let circuits = round_robin(5, false).unwrap();
        assert_eq!(cycle_length_of(&circuits), 5);
        for slice in 0..5 {
            let in_slice = circuits.iter().filter(|c| c.slice == slice).count();
            assert_eq!(in_slice, 2);
        }
        let unique: BTreeSet<_> = pairs(&circuits).into_iter().collect();
        assert_eq!(unique.len(), 10);
        assert_eq!(circuits.len(), 10);
    }

    #[test]
    fn test_self_loop_slice() {
        let circuits = round_robin(4, true).unwrap();
        assert_eq!(cycle_length_of(&circuits), 4);
        let loops: Vec<_> = circuits.iter().filter(|c| c.is_self_loop()).collect();
        assert_eq!(loops.len(), 4);
        assert!(loops.iter().all(|c| c.slice == 3));

        // The dummy node never gets a loop-back.
        let odd = round_robin(3, true).unwrap();
        assert_eq!(odd.iter().filter(|c| c.is_self_loop()).count(), 3);
    }

    #[test]
    fn test_custom_nodes_and_ports() {
        let circuits = round_robin_over(&[10, 20], 2, 3, false);
        assert_eq!(circuits, vec![Circuit::new(0, 10, 20, 2, 3)]);
        assert!(round_robin_over(&[7], 0, 0, false).is_empty());
    }

    #[test]
    fn test_too_few_nodes() {
        assert!(round_robin(1, false).is_err());
        assert!(round_robin(0, true).is_err());
    }
}
