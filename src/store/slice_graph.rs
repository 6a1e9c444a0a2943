//! Connectivity snapshot of a single time slice.

use petgraph::algo::dijkstra;
use petgraph::graphmap::DiGraphMap;
use petgraph::Direction::{Incoming, Outgoing};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{Result, ScheduleError};
use crate::types::{NodeId, PortId, SliceIndex};

/// A `(node, port)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Endpoint {
    /// Node.
    pub node: NodeId,
    /// Port on the node.
    pub port: PortId,
}

impl Endpoint {
    /// Create a new endpoint.
    pub fn new(node: NodeId, port: PortId) -> Self {
        Self { node, port }
    }
}

/// One directed link instance in a slice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DirectedLink {
    /// Sending endpoint.
    pub from: Endpoint,
    /// Receiving endpoint.
    pub to: Endpoint,
}

/// Send port -> receive port for every link instance on one node pair.
type PortPairs = BTreeMap<PortId, PortId>;

/// node -> port -> endpoint.
type PortMap = BTreeMap<NodeId, BTreeMap<PortId, Endpoint>>;

/// Directed connectivity of one slice, annotated with per-endpoint ports.
///
/// Links live in a `DiGraphMap` whose edge weight holds the port pairs of
/// every link between two nodes. A `(node, port)` is occupied by at most one
/// peer endpoint; occupancy is tracked for both ends of a link even when
/// only one direction is installed. Serializes as sorted port maps.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(into = "SliceGraphRepr", from = "SliceGraphRepr")]
pub struct TimeSliceGraph {
    nb_node: usize,
    graph: DiGraphMap<NodeId, PortPairs>,
    /// node -> port -> endpoint it is paired with.
    occupancy: PortMap,
}

#[derive(Serialize, Deserialize)]
struct SliceGraphRepr {
    nb_node: usize,
    /// node -> egress port -> receiving endpoint.
    links: PortMap,
    occupancy: PortMap,
}

impl From<TimeSliceGraph> for SliceGraphRepr {
    fn from(graph: TimeSliceGraph) -> Self {
        Self {
            nb_node: graph.nb_node,
            links: graph.link_map(),
            occupancy: graph.occupancy,
        }
    }
}

impl From<SliceGraphRepr> for TimeSliceGraph {
    fn from(repr: SliceGraphRepr) -> Self {
        let mut graph = TimeSliceGraph::new(repr.nb_node);
        for (node, ports) in repr.links {
            for (port, to) in ports {
                graph.insert_link(Endpoint::new(node, port), to);
            }
        }
        graph.occupancy = repr.occupancy;
        graph
    }
}

impl PartialEq for TimeSliceGraph {
    fn eq(&self, other: &Self) -> bool {
        self.nb_node == other.nb_node
            && self.occupancy == other.occupancy
            && self.link_map() == other.link_map()
    }
}

impl Eq for TimeSliceGraph {}

impl TimeSliceGraph {
    /// Create an empty graph over nodes `0..nb_node`.
    pub fn new(nb_node: usize) -> Self {
        let mut graph = DiGraphMap::with_capacity(nb_node, 0);
        for node in 0..nb_node as NodeId {
            graph.add_node(node);
        }
        Self {
            nb_node,
            graph,
            occupancy: BTreeMap::new(),
        }
    }

    /// Number of nodes.
    pub fn nb_node(&self) -> usize {
        self.nb_node
    }

    /// All node ids, ascending.
    pub fn nodes(&self) -> impl Iterator<Item = NodeId> {
        0..self.nb_node as NodeId
    }

    /// Whether the graph has no links.
    pub fn is_empty(&self) -> bool {
        self.graph.edge_count() == 0
    }

    /// Number of directed links.
    pub fn link_count(&self) -> usize {
        self.graph.all_edges().map(|(_, _, ports)| ports.len()).sum()
    }

    /// The endpoint `node`'s `port` sends to, if connected.
    pub fn link(&self, node: NodeId, port: PortId) -> Option<Endpoint> {
        if !self.graph.contains_node(node) {
            return None;
        }
        self.graph
            .edges(node)
            .find_map(|(_, to, ports)| ports.get(&port).map(|recv| Endpoint::new(to, *recv)))
    }

    /// The endpoint `(node, port)` is paired with, in either direction.
    pub fn peer_of(&self, node: NodeId, port: PortId) -> Option<Endpoint> {
        self.occupancy.get(&node).and_then(|ports| ports.get(&port)).copied()
    }

    /// Whether a directed link from `from` to `to` exists.
    pub fn has_edge(&self, from: NodeId, to: NodeId) -> bool {
        self.graph.contains_edge(from, to)
    }

    /// Lowest port on which `from` sends to `to`.
    pub fn send_port(&self, from: NodeId, to: NodeId) -> Option<PortId> {
        self.graph
            .edge_weight(from, to)
            .and_then(|ports| ports.keys().next().copied())
    }

    /// Nodes `node` can send to, ascending.
    pub fn successors(&self, node: NodeId) -> Vec<NodeId> {
        self.neighbours(node, Outgoing)
    }

    /// Nodes that can send to `node`, ascending.
    pub fn predecessors(&self, node: NodeId) -> Vec<NodeId> {
        self.neighbours(node, Incoming)
    }

    fn neighbours(&self, node: NodeId, dir: petgraph::Direction) -> Vec<NodeId> {
        if !self.graph.contains_node(node) {
            return Vec::new();
        }
        let mut nodes: Vec<NodeId> = self.graph.neighbors_directed(node, dir).collect();
        nodes.sort_unstable();
        nodes.dedup();
        nodes
    }

    /// Every directed link, ordered by sending endpoint.
    pub fn links(&self) -> impl Iterator<Item = DirectedLink> + '_ {
        let mut links: Vec<DirectedLink> = self
            .graph
            .all_edges()
            .flat_map(|(from, to, ports)| {
                ports.iter().map(move |(send, recv)| DirectedLink {
                    from: Endpoint::new(from, *send),
                    to: Endpoint::new(to, *recv),
                })
            })
            .collect();
        links.sort_unstable();
        links.into_iter()
    }

    fn link_map(&self) -> PortMap {
        let mut map = PortMap::new();
        for link in self.links() {
            map.entry(link.from.node)
                .or_default()
                .insert(link.from.port, link.to);
        }
        map
    }

    /// Fewest-hop node sequence from `src` to `dst` (inclusive).
    ///
    /// Hop distances come from a unit-cost Dijkstra run; the path is rebuilt
    /// backward from `dst` through the lowest-id predecessor one hop closer,
    /// so ties resolve the same way regardless of link insertion order.
    pub fn shortest_path(&self, src: NodeId, dst: NodeId) -> Option<Vec<NodeId>> {
        if !self.graph.contains_node(src) || !self.graph.contains_node(dst) {
            return None;
        }
        if src == dst {
            return Some(vec![src]);
        }
        let dist = dijkstra(&self.graph, src, None, |_| 1usize);
        let mut remaining = *dist.get(&dst)?;

        let mut path = vec![dst];
        let mut cur = dst;
        while remaining > 0 {
            remaining -= 1;
            cur = self
                .predecessors(cur)
                .into_iter()
                .find(|p| dist.get(p) == Some(&remaining))?;
            path.push(cur);
        }
        path.reverse();
        Some(path)
    }

    /// Install a link, failing without side effects on a port conflict.
    pub(crate) fn connect(
        &mut self,
        slice: SliceIndex,
        a: Endpoint,
        b: Endpoint,
        bidirectional: bool,
    ) -> Result<()> {
        for (end, expected) in [(a, b), (b, a)] {
            if let Some(current) = self.peer_of(end.node, end.port) {
                if current != expected {
                    return Err(ScheduleError::PortConflict {
                        slice,
                        node: end.node,
                        port: end.port,
                        peer: current.node,
                        peer_port: current.port,
                    });
                }
            }
        }

        self.occupancy.entry(a.node).or_default().insert(a.port, b);
        self.occupancy.entry(b.node).or_default().insert(b.port, a);
        self.insert_link(a, b);
        if bidirectional {
            self.insert_link(b, a);
        }
        Ok(())
    }

    /// Remove a link previously installed with [`connect`](Self::connect).
    pub(crate) fn disconnect(&mut self, a: Endpoint, b: Endpoint, bidirectional: bool) -> Result<()> {
        if self.link(a.node, a.port) != Some(b) {
            return Err(ScheduleError::invalid(format!(
                "no link from node {} port {} to node {} port {}",
                a.node, a.port, b.node, b.port
            )));
        }
        if bidirectional && self.link(b.node, b.port) != Some(a) {
            return Err(ScheduleError::invalid(format!(
                "no link from node {} port {} to node {} port {}",
                b.node, b.port, a.node, a.port
            )));
        }

        self.remove_link(a);
        if bidirectional {
            self.remove_link(b);
        }
        // A surviving reverse direction keeps both ports occupied.
        if self.link(a.node, a.port).is_none() && self.link(b.node, b.port) != Some(a) {
            self.clear_occupancy(a);
            self.clear_occupancy(b);
        }
        Ok(())
    }

    fn insert_link(&mut self, from: Endpoint, to: Endpoint) {
        match self.graph.edge_weight_mut(from.node, to.node) {
            Some(ports) => {
                ports.insert(from.port, to.port);
            }
            None => {
                self.graph
                    .add_edge(from.node, to.node, PortPairs::from([(from.port, to.port)]));
            }
        }
    }

    fn remove_link(&mut self, end: Endpoint) {
        let Some(to) = self.link(end.node, end.port) else {
            return;
        };
        let emptied = match self.graph.edge_weight_mut(end.node, to.node) {
            Some(ports) => {
                ports.remove(&end.port);
                ports.is_empty()
            }
            None => false,
        };
        if emptied {
            self.graph.remove_edge(end.node, to.node);
        }
    }

    fn clear_occupancy(&mut self, end: Endpoint) {
        if let Some(ports) = self.occupancy.get_mut(&end.node) {
            ports.remove(&end.port);
            if ports.is_empty() {
                self.occupancy.remove(&end.node);
            }
        }
    }
}
