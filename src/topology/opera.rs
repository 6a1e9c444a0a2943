//! Multi-link rotor schedule: shuffled round robin, merged onto links, port-staggered.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::collections::BTreeMap;

use crate::error::{Result, ScheduleError};
use crate::types::{cycle_length_of, link_count_of, Circuit, PortId, SliceIndex};

use super::round_robin::round_robin;

/// Opera schedule for `nb_node` nodes with `nb_link` uplinks each.
///
/// Every link rotates through a share of the round robin, and only one port
/// of each node reconfigures per slice. The cycle has
/// `ceil(L / nb_link) * nb_link` slices, where `L` is the round-robin length
/// including its loop-back slice.
pub fn opera(nb_node: usize, nb_link: usize, seed: u64) -> Result<Vec<Circuit>> {
    if nb_link == 0 {
        return Err(ScheduleError::invalid("opera needs at least one link"));
    }
    let base = round_robin(nb_node, true)?;
    let shuffled = shuffle_slices(&base, seed);
    let merged = merge_links(&shuffled, nb_link);
    port_offset(&merged)
}

/// Permute slice labels with a seeded RNG.
///
/// The contents of each slice stay together; output is sorted.
pub fn shuffle_slices(circuits: &[Circuit], seed: u64) -> Vec<Circuit> {
    let mut groups: BTreeMap<SliceIndex, Vec<Circuit>> = BTreeMap::new();
    for circuit in circuits {
        groups.entry(circuit.slice).or_default().push(*circuit);
    }
    let mut labels: Vec<SliceIndex> = groups.keys().copied().collect();
    let mut rng = StdRng::seed_from_u64(seed);
    labels.shuffle(&mut rng);

    let mut out: Vec<Circuit> = groups
        .into_values()
        .zip(labels)
        .flat_map(|(group, label)| group.into_iter().map(move |c| c.at_slice(label)))
        .collect();
    out.sort();
    out
}

/// Fold `nb_link` consecutive slices into one, one slice per port.
///
/// Slice `s` becomes slice `s / nb_link` on port `s % nb_link` for both ends.
pub fn merge_links(circuits: &[Circuit], nb_link: usize) -> Vec<Circuit> {
    let nb_link = nb_link.max(1) as SliceIndex;
    circuits
        .iter()
        .map(|c| {
            let port: PortId = c.slice % nb_link;
            Circuit::new(c.slice / nb_link, c.node_a, c.node_b, port, port)
        })
        .collect()
}

/// Stagger circuits so that one port reconfigures per slice.
///
/// A circuit at slice `ts` on port `p` is held for slices
/// `[ts * links + p, (ts + 1) * links + p)` modulo `cycle * links`. Both
/// ends of every circuit must use the same port.
pub fn port_offset(circuits: &[Circuit]) -> Result<Vec<Circuit>> {
    let cycle = cycle_length_of(circuits) as SliceIndex;
    let links = link_count_of(circuits) as SliceIndex;
    let total = cycle * links;

    let mut out = Vec::with_capacity(circuits.len() * links as usize);
    for c in circuits {
        if c.port_a != c.port_b {
            return Err(ScheduleError::invariant(format!(
                "port offset needs symmetric ports, got {}",
                c
            )));
        }
        let start = c.slice * links + c.port_a;
        for slice in start..start + links {
            out.push(c.at_slice(slice % total));
        }
    }
    Ok(out)
}
