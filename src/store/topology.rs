//! Slice-indexed topology store with transactional deployment.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::canonical::canonical_hash_hex;
use crate::error::{Result, ScheduleError};
use crate::types::{Circuit, NodeId, PortId, SliceIndex, MAX_NODES, WILDCARD};

use super::slice_graph::{Endpoint, TimeSliceGraph};

/// Whether a connect installs one or both directed links.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// `a -> b` and `b -> a`.
    #[default]
    Bidirectional,
    /// `a -> b` only. Both ports are still occupied.
    Unidirectional,
}

impl Direction {
    fn is_bidirectional(self) -> bool {
        matches!(self, Self::Bidirectional)
    }
}

/// Mapping slice index -> [`TimeSliceGraph`], dense from slice 0.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopologyStore {
    nb_node: usize,
    slices: Vec<TimeSliceGraph>,
}

impl TopologyStore {
    /// Create an empty store over nodes `0..nb_node`.
    pub fn new(nb_node: usize) -> Result<Self> {
        if nb_node == 0 || nb_node > MAX_NODES {
            return Err(ScheduleError::invalid(format!(
                "node count {} outside 1..={}",
                nb_node, MAX_NODES
            )));
        }
        Ok(Self {
            nb_node,
            slices: Vec::new(),
        })
    }

    /// Number of nodes.
    pub fn nb_node(&self) -> usize {
        self.nb_node
    }

    /// Number of populated slices.
    pub fn cycle_length(&self) -> usize {
        self.slices.len()
    }

    /// Per-slice graphs, indexed by slice.
    pub fn graphs(&self) -> &[TimeSliceGraph] {
        &self.slices
    }

    /// Graph of one slice.
    pub fn graph(&self, slice: SliceIndex) -> Option<&TimeSliceGraph> {
        self.slices.get(slice as usize)
    }

    /// Drop every slice.
    pub fn reset(&mut self) {
        self.slices.clear();
    }

    /// Canonical hash of the store contents.
    pub fn fingerprint(&self) -> Result<String> {
        canonical_hash_hex(self)
    }

    /// Connect `(node_a, port_a)` to `(node_b, port_b)` during `slice`.
    ///
    /// Missing lower slices are backfilled with empty graphs. On
    /// [`ScheduleError::PortConflict`] the store is left unchanged.
    pub fn connect(
        &mut self,
        slice: SliceIndex,
        node_a: NodeId,
        node_b: NodeId,
        port_a: PortId,
        port_b: PortId,
        direction: Direction,
    ) -> Result<()> {
        self.validate(slice, node_a, node_b)?;
        let a = Endpoint::new(node_a, port_a);
        let b = Endpoint::new(node_b, port_b);

        match self.slices.get_mut(slice as usize) {
            Some(graph) => graph.connect(slice, a, b, direction.is_bidirectional()),
            None => {
                let mut graph = TimeSliceGraph::new(self.nb_node);
                graph.connect(slice, a, b, direction.is_bidirectional())?;
                while self.slices.len() < slice as usize {
                    self.slices.push(TimeSliceGraph::new(self.nb_node));
                }
                self.slices.push(graph);
                Ok(())
            }
        }
        .map_err(|e| {
            warn!(slice, node_a, port_a, node_b, port_b, error = %e, "connect rejected");
            e
        })
    }

    /// Remove a link installed by [`connect`](Self::connect).
    pub fn disconnect(
        &mut self,
        slice: SliceIndex,
        node_a: NodeId,
        node_b: NodeId,
        port_a: PortId,
        port_b: PortId,
        direction: Direction,
    ) -> Result<()> {
        self.validate(slice, node_a, node_b)?;
        let graph = self.slices.get_mut(slice as usize).ok_or_else(|| {
            ScheduleError::invalid(format!("slice {} is not populated", slice))
        })?;
        graph.disconnect(
            Endpoint::new(node_a, port_a),
            Endpoint::new(node_b, port_b),
            direction.is_bidirectional(),
        )
    }

    /// Apply a circuit list as a single transaction.
    ///
    /// With `start_fresh` the existing slices are discarded first. Circuits
    /// are applied to a working copy in order; the first failure is reported
    /// as [`ScheduleError::CircuitRejected`] and the store is left untouched.
    /// Returns the resulting cycle length.
    pub fn deploy_topo(&mut self, circuits: &[Circuit], start_fresh: bool) -> Result<usize> {
        let mut working = if start_fresh {
            Self::new(self.nb_node)?
        } else {
            self.clone()
        };

        for (index, circuit) in circuits.iter().enumerate() {
            working
                .connect(
                    circuit.slice,
                    circuit.node_a,
                    circuit.node_b,
                    circuit.port_a,
                    circuit.port_b,
                    Direction::Bidirectional,
                )
                .map_err(|e| ScheduleError::CircuitRejected {
                    index,
                    circuit: *circuit,
                    source: Box::new(e),
                })?;
        }

        if working.cycle_length() == 0 {
            return Err(ScheduleError::invariant("deployment produced zero slices"));
        }

        debug!(
            circuits = circuits.len(),
            cycle_length = working.cycle_length(),
            start_fresh,
            "topology deployed"
        );
        *self = working;
        Ok(self.cycle_length())
    }

    fn validate(&self, slice: SliceIndex, node_a: NodeId, node_b: NodeId) -> Result<()> {
        for node in [node_a, node_b] {
            if node as usize >= self.nb_node {
                return Err(ScheduleError::invalid(format!(
                    "node {} outside 0..{}",
                    node, self.nb_node
                )));
            }
        }
        if slice >= WILDCARD {
            return Err(ScheduleError::invalid(format!(
                "slice {} collides with the wildcard value",
                slice
            )));
        }
        Ok(())
    }
}
