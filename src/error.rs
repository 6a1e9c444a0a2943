//! Error taxonomy shared by every component.

use crate::types::{Circuit, NodeId, PortId, SliceIndex};

/// Result alias for fabric operations.
pub type Result<T> = std::result::Result<T, ScheduleError>;

/// Error type for topology, routing and compilation operations.
#[derive(Debug, thiserror::Error)]
pub enum ScheduleError {
    /// Out-of-range id, unsupported link count, `src == dst`, ...
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// A connect would double-occupy a port. The store is left unchanged.
    #[error("Port conflict at slice {slice}: node {node} port {port} already connected to node {peer} port {peer_port}")]
    PortConflict {
        /// Slice of the attempted connect.
        slice: SliceIndex,
        /// Endpoint whose port is occupied.
        node: NodeId,
        /// Occupied port.
        port: PortId,
        /// Current peer of the occupied port.
        peer: NodeId,
        /// Port of the current peer.
        peer_port: PortId,
    },

    /// No path exists between two nodes within one slice.
    #[error("No path from node {src} to node {dst} in slice {slice}")]
    PathNotFound {
        /// Source node.
        src: NodeId,
        /// Destination node.
        dst: NodeId,
        /// Slice searched.
        slice: SliceIndex,
    },

    /// The bounded-hop search found nothing within the hop budget.
    #[error("No path from node {src} to node {dst} within {max_hops} hops")]
    HopBudgetExceeded {
        /// Source node.
        src: NodeId,
        /// Destination node.
        dst: NodeId,
        /// Hop budget.
        max_hops: usize,
    },

    /// Malformed input that must abort deployment.
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    /// A circuit in a deployment was rejected.
    #[error("Circuit #{index} ({circuit}) rejected: {source}")]
    CircuitRejected {
        /// Position of the circuit in the deployed list.
        index: usize,
        /// The rejected circuit.
        circuit: Circuit,
        /// Why it was rejected.
        #[source]
        source: Box<ScheduleError>,
    },

    /// A value could not be serialized for hashing.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// An external collaborator call failed.
    #[error("{collaborator} error: {message}")]
    Device {
        /// Which collaborator failed.
        collaborator: &'static str,
        /// Collaborator's message.
        message: String,
    },
}

impl ScheduleError {
    /// Shorthand for [`ScheduleError::InvalidParameter`].
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidParameter(message.into())
    }

    /// Shorthand for [`ScheduleError::InvariantViolation`].
    pub fn invariant(message: impl Into<String>) -> Self {
        Self::InvariantViolation(message.into())
    }

    /// Wrap a collaborator error.
    pub fn from_device<E: std::error::Error>(collaborator: &'static str, e: E) -> Self {
        Self::Device {
            collaborator,
            message: e.to_string(),
        }
    }

    /// Whether the caller may proceed (skip, retry, accept partial results).
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::PortConflict { .. }
            | Self::PathNotFound { .. }
            | Self::HopBudgetExceeded { .. }
            | Self::Device { .. } => true,
            Self::CircuitRejected { source, .. } => source.is_recoverable(),
            Self::InvalidParameter(_) | Self::InvariantViolation(_) | Self::Serialization(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverable_classification() {
        let conflict = ScheduleError::PortConflict {
            slice: 0,
            node: 0,
            port: 0,
            peer: 1,
            peer_port: 0,
        };
        assert!(conflict.is_recoverable());
        assert!(!ScheduleError::invariant("zero slices").is_recoverable());
        assert!(!ScheduleError::invalid("src == dst").is_recoverable());

        let rejected = ScheduleError::CircuitRejected {
            index: 3,
            circuit: Circuit::new(0, 0, 2, 0, 0),
            source: Box::new(conflict),
        };
        assert!(rejected.is_recoverable());
        assert!(rejected.to_string().contains("#3"));
    }

    #[test]
    fn test_from_device() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "thrift down");
        let err = ScheduleError::from_device("table loader", io);
        assert_eq!(err.to_string(), "table loader error: thrift down");
    }
}
