//! Static single-slice topology from a random regular graph.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::collections::{BTreeMap, BTreeSet};
use tracing::trace;

use crate::error::{Result, ScheduleError};
use crate::types::{Circuit, NodeId, PortId};

/// Seed used when a configuration does not pick one.
pub const DEFAULT_STATIC_SEED: u64 = 1;

const MAX_ATTEMPTS: usize = 1_000;

/// Single-slice schedule where every node uses all `nb_link` ports.
///
/// Builds a random `nb_link`-regular simple graph seeded with `seed`, then
/// hands out ports sequentially per node while walking edges in ascending
/// order. Fails when `nb_node * nb_link` is odd or `nb_link >= nb_node`.
pub fn static_topo(nb_node: usize, nb_link: usize, seed: u64) -> Result<Vec<Circuit>> {
    if nb_link == 0 || nb_link >= nb_node || (nb_node * nb_link) % 2 == 1 {
        return Err(ScheduleError::invalid(format!(
            "no {}-regular graph on {} nodes",
            nb_link, nb_node
        )));
    }
    let edges = random_regular_graph(nb_node, nb_link, seed)?;

    let mut next_port: Vec<PortId> = vec![0; nb_node];
    let mut circuits = Vec::with_capacity(edges.len());
    for (a, b) in edges {
        let port_a = next_port[a as usize];
        let port_b = next_port[b as usize];
        circuits.push(Circuit::new(0, a, b, port_a, port_b));
        next_port[a as usize] += 1;
        next_port[b as usize] += 1;
    }

    if next_port.iter().any(|p| *p as usize != nb_link) {
        return Err(ScheduleError::invariant("regular graph left a port unassigned"));
    }
    Ok(circuits)
}

/// Edge set `(min, max)` of a random `degree`-regular simple graph.
///
/// Pairs shuffled stubs, re-pairing only the stubs that formed loops or
/// parallel edges, and restarts whenever the leftovers cannot be completed.
pub fn random_regular_graph(nb_node: usize, degree: usize, seed: u64) -> Result<BTreeSet<(NodeId, NodeId)>> {
    let mut rng = StdRng::seed_from_u64(seed);
    for attempt in 0..MAX_ATTEMPTS {
        if let Some(edges) = try_pairing(nb_node, degree, &mut rng) {
            trace!(attempt, edges = edges.len(), "regular graph built");
            return Ok(edges);
        }
    }
    Err(ScheduleError::invariant(format!(
        "no {}-regular graph on {} nodes after {} attempts",
        degree, nb_node, MAX_ATTEMPTS
    )))
}

fn try_pairing(nb_node: usize, degree: usize, rng: &mut StdRng) -> Option<BTreeSet<(NodeId, NodeId)>> {
    let mut edges: BTreeSet<(NodeId, NodeId)> = BTreeSet::new();
    let mut stubs: Vec<NodeId> = (0..nb_node as NodeId)
        .flat_map(|node| std::iter::repeat(node).take(degree))
        .collect();

    while !stubs.is_empty() {
        let mut leftover: BTreeMap<NodeId, usize> = BTreeMap::new();
        stubs.shuffle(rng);
        for pair in stubs.chunks(2) {
            let (a, b) = match pair {
                [x, y] => (*x.min(y), *x.max(y)),
                _ => return None,
            };
            if a != b && edges.insert((a, b)) {
                continue;
            }
            *leftover.entry(a).or_default() += 1;
            *leftover.entry(b).or_default() += 1;
        }

        if !completable(&edges, &leftover) {
            return None;
        }
        stubs = leftover
            .iter()
            .flat_map(|(node, count)| std::iter::repeat(*node).take(*count))
            .collect();
    }
    Some(edges)
}

/// Whether some pair of leftover nodes can still be joined.
fn completable(edges: &BTreeSet<(NodeId, NodeId)>, leftover: &BTreeMap<NodeId, usize>) -> bool {
    if leftover.is_empty() {
        return true;
    }
    let nodes: Vec<NodeId> = leftover.keys().copied().collect();
    nodes
        .iter()
        .enumerate()
        .any(|(i, a)| nodes[i + 1..].iter().any(|b| !edges.contains(&(*a, *b))))
}
