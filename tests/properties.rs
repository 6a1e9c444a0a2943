//! Property tests over generated schedules, stores, routes and tables.

use proptest::prelude::*;
use std::collections::BTreeMap;

use timeslice_fabric::routing::{extend_paths_to_full_cycle, routing_bounded_hop};
use timeslice_fabric::topology::round_robin;
use timeslice_fabric::{
    bipartite_matching, to_canonical_bytes, AddressingMode, Circuit, Direction, FlowTableCompiler,
    HopSearch, HopTarget, NodeSel, Path, RoutingMode, SendSlot, SliceSel, Step, TopologyStore,
    TrafficMatrix,
};

fn circuit_strategy(nb_node: u32, slices: u32, ports: u32) -> impl Strategy<Value = Circuit> {
    (0..slices, 0..nb_node, 0..nb_node, 0..ports, 0..ports)
        .prop_map(|(slice, a, b, pa, pb)| Circuit::new(slice, a, b, pa, pb))
}

fn step_strategy() -> impl Strategy<Value = Step> {
    (0u32..16, 0u32..4, 0u32..8, prop::option::of(0u32..16)).prop_map(|(cur, port, slice, next)| {
        Step::port(cur, port, SliceSel::At(slice), next)
    })
}

/// `(pairs, weight)` of the best matching by exhaustive subset search.
fn reference_matching(nb_node: usize, traffic: &TrafficMatrix) -> (usize, u64) {
    let weight = |a: usize, b: usize| {
        traffic.get(&(a as u32, b as u32)).copied().unwrap_or(0)
            + traffic.get(&(b as u32, a as u32)).copied().unwrap_or(0)
    };
    let size = 1usize << nb_node;
    let mut best = vec![(0usize, 0u64); size];
    for mask in 1..size {
        let low = mask.trailing_zeros() as usize;
        let rest = mask & !(1 << low);
        let mut top = best[rest];
        let mut others = rest;
        while others != 0 {
            let partner = others.trailing_zeros() as usize;
            others &= others - 1;
            let (pairs, w) = best[rest & !(1 << partner)];
            top = top.max((pairs + 1, w + weight(low, partner)));
        }
        best[mask] = top;
    }
    best[size - 1]
}

proptest! {
    #[test]
    fn prop_matching_is_optimal(
        nb_node in 2usize..=10,
        demand in prop::collection::vec(((0u32..10, 0u32..10), 0u64..1000), 1..30)
    ) {
        let mut traffic: TrafficMatrix = demand
            .into_iter()
            .map(|((a, b), w)| ((a % nb_node as u32, b % nb_node as u32), w))
            .filter(|((a, b), _)| a != b)
            .collect();
        traffic.insert((0, 1), 1);

        let circuits = bipartite_matching(nb_node, 1, &traffic, &[]).unwrap();
        let mut seen = std::collections::BTreeSet::new();
        for c in &circuits {
            prop_assert!(c.node_a < c.node_b);
            prop_assert!(seen.insert(c.node_a) && seen.insert(c.node_b));
        }
        let weight: u64 = circuits
            .iter()
            .map(|c| {
                traffic.get(&(c.node_a, c.node_b)).copied().unwrap_or(0)
                    + traffic.get(&(c.node_b, c.node_a)).copied().unwrap_or(0)
            })
            .sum();
        prop_assert_eq!((circuits.len(), weight), reference_matching(nb_node, &traffic));
    }


    #[test]
    fn prop_round_robin_is_one_factorization(nb_node in 2usize..40) {
        let circuits = round_robin(nb_node, false).unwrap();

        let mut seen: BTreeMap<(u32, u32), usize> = BTreeMap::new();
        for circuit in &circuits {
            prop_assert!(!circuit.is_self_loop());
            *seen.entry(circuit.unordered_pair()).or_default() += 1;
        }
        prop_assert_eq!(seen.len(), nb_node * (nb_node - 1) / 2);
        prop_assert!(seen.values().all(|count| *count == 1));

        let expected_slices = if nb_node % 2 == 0 { nb_node - 1 } else { nb_node };
        let store = {
            let mut store = TopologyStore::new(nb_node).unwrap();
            store.deploy_topo(&circuits, true).unwrap();
            store
        };
        prop_assert_eq!(store.cycle_length(), expected_slices);
    }

    #[test]
    fn prop_conflicting_connect_leaves_store_identical(
        circuits in prop::collection::vec(circuit_strategy(6, 3, 2), 1..40)
    ) {
        let mut store = TopologyStore::new(6).unwrap();
        for circuit in &circuits {
            let before = to_canonical_bytes(&store).unwrap();
            let result = store.connect(
                circuit.slice,
                circuit.node_a,
                circuit.node_b,
                circuit.port_a,
                circuit.port_b,
                Direction::Bidirectional,
            );
            if result.is_err() {
                prop_assert_eq!(to_canonical_bytes(&store).unwrap(), before);
            }

            // Every occupied port points back at its peer.
            for graph in store.graphs() {
                for link in graph.links() {
                    prop_assert_eq!(graph.link(link.to.node, link.to.port), Some(link.from));
                }
            }
        }
    }

    #[test]
    fn prop_extend_covers_every_slice(
        cycle_length in 1usize..12,
        arrivals in prop::collection::vec(0usize..12, 1..8)
    ) {
        let paths: Vec<Path> = arrivals
            .iter()
            .map(|a| {
                let slice = (*a % cycle_length) as u32;
                Path::new(0, 1, slice, vec![Step::port(0, 0, SliceSel::At(slice), Some(1))])
            })
            .collect();
        let full = extend_paths_to_full_cycle(&paths, cycle_length).unwrap();

        prop_assert_eq!(full.len(), cycle_length);
        for (slice, path) in full.iter().enumerate() {
            prop_assert_eq!(path.arrival_slice as usize, slice);
        }
    }

    #[test]
    fn prop_bounded_hop_respects_budget(
        circuits in prop::collection::vec(circuit_strategy(5, 3, 2), 1..20),
        max_hops in 1usize..4
    ) {
        let mut store = TopologyStore::new(5).unwrap();
        store.connect(0, 0, 1, 0, 0, Direction::Bidirectional).unwrap();
        for c in &circuits {
            let _ = store.connect(c.slice, c.node_a, c.node_b, c.port_a, c.port_b, Direction::Bidirectional);
        }

        let paths = routing_bounded_hop(store.graphs(), &HopSearch::new(max_hops)).unwrap();
        prop_assert!(paths.iter().all(|p| p.hop_count() >= 1 && p.hop_count() <= max_hops));
    }

    #[test]
    fn prop_per_hop_keeps_only_first_step(steps in prop::collection::vec(step_strategy(), 1..6)) {
        let path = Path::new(0, 9, 2, steps.clone());
        let compiler = FlowTableCompiler::new(RoutingMode::PerHop, AddressingMode::TimeIndexed);
        let entry = compiler.compile_path(&path).unwrap();

        prop_assert_eq!(entry.hops.len(), 1);
        let first = steps[0];
        let (port, slice) = match first.kind {
            timeslice_fabric::StepKind::Port { send_port, send_slice, .. } => (send_port, send_slice),
            timeslice_fabric::StepKind::Node { .. } => unreachable!(),
        };
        prop_assert_eq!(entry.hops[0].cur_node, first.cur_node);
        prop_assert_eq!(entry.hops[0].target, HopTarget::Port(port));
        prop_assert_eq!(entry.hops[0].send_slot, SendSlot::Slice(slice.slice().unwrap()));
    }

    #[test]
    fn prop_source_mode_keeps_every_step(steps in prop::collection::vec(step_strategy(), 1..6)) {
        let path = Path::new(0, 9, 2, steps.clone());
        let compiler = FlowTableCompiler::new(RoutingMode::Source, AddressingMode::PerDestinationQueue);
        let entry = compiler.compile_path(&path).unwrap();

        prop_assert_eq!(entry.hops.len(), steps.len());
        prop_assert!(entry.hops.iter().all(|h| h.send_slot == SendSlot::Destination(9)));
        prop_assert!(entry.hops.iter().zip(&steps).all(|(h, s)| h.cur_node == s.cur_node));
        prop_assert!(entry.hops.iter().all(|h| h.cur_node != NodeSel::Any));
    }

    #[test]
    fn prop_zero_traffic_keeps_previous_circuits(
        nb_node in 2usize..=20,
        prev in prop::collection::vec(circuit_strategy(20, 1, 1), 0..10),
        zero_pairs in prop::collection::vec((0u32..20, 0u32..20), 0..10)
    ) {
        let traffic: TrafficMatrix = zero_pairs
            .into_iter()
            .map(|(a, b)| ((a % nb_node as u32, b % nb_node as u32), 0))
            .collect();
        let next = bipartite_matching(nb_node, 1, &traffic, &prev).unwrap();
        prop_assert_eq!(next, prev);
    }
}
