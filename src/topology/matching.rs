//! Traffic-weighted rematching for the traffic-aware fabric.

use std::collections::BTreeMap;
use tracing::debug;

use crate::error::{Result, ScheduleError};
use crate::types::{Circuit, NodeId};

use super::blossom::max_weight_matching;

/// Measured demand `(src, dst) -> weight`. Missing pairs count as zero.
pub type TrafficMatrix = BTreeMap<(NodeId, NodeId), u64>;

/// Single-slice circuits from a maximum-cardinality, maximum-weight matching.
///
/// Every node pair is a candidate, weighted by its symmetrized demand
/// (`w(a,b) + w(b,a)`). Entries naming a node outside `0..nb_node` are
/// ignored. When every remaining weight is zero the previous circuits are
/// returned unchanged. Only one link per node is supported. Output circuits
/// are `(0, a, b, 0, 0)` with `a < b`, sorted.
pub fn bipartite_matching(
    nb_node: usize,
    nb_link: usize,
    traffic: &TrafficMatrix,
    prev_circuits: &[Circuit],
) -> Result<Vec<Circuit>> {
    if nb_link != 1 {
        return Err(ScheduleError::invalid(format!(
            "traffic-aware matching supports exactly one link, got {}",
            nb_link
        )));
    }

    let in_range = |(src, dst): &(NodeId, NodeId)| (*src as usize) < nb_node && (*dst as usize) < nb_node;
    let ignored = traffic.keys().filter(|pair| !in_range(pair)).count();
    if ignored > 0 {
        debug!(ignored, nb_node, "ignoring traffic for nodes outside the fabric");
    }
    if traffic
        .iter()
        .filter(|(pair, _)| in_range(pair))
        .all(|(_, w)| *w == 0)
    {
        debug!("no traffic, keeping previous circuits");
        return Ok(prev_circuits.to_vec());
    }

    let weight = |a: usize, b: usize| -> u64 {
        let ab = traffic.get(&(a as NodeId, b as NodeId)).copied().unwrap_or(0);
        let ba = traffic.get(&(b as NodeId, a as NodeId)).copied().unwrap_or(0);
        ab.saturating_add(ba)
    };
    let mut edges = Vec::with_capacity(nb_node * nb_node.saturating_sub(1) / 2);
    for a in 0..nb_node {
        for b in a + 1..nb_node {
            edges.push((a, b, i128::from(weight(a, b))));
        }
    }

    let mates = max_weight_matching(nb_node, &edges)?;
    let mut circuits = Vec::new();
    let mut matched_weight: u128 = 0;
    for (a, mate) in mates.iter().enumerate() {
        if let Some(b) = *mate {
            if a < b {
                matched_weight += u128::from(weight(a, b));
                circuits.push(Circuit::new(0, a as NodeId, b as NodeId, 0, 0));
            }
        }
    }
    circuits.sort();

    debug!(
        pairs = circuits.len(),
        weight = %matched_weight,
        "traffic matching computed"
    );
    Ok(circuits)
}
