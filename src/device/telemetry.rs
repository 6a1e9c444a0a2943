//! Telemetry samples and their conversion into a traffic matrix.

use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::OnceLock;
use tracing::warn;

use crate::error::{Result, ScheduleError};
use crate::topology::TrafficMatrix;
use crate::types::{NodeId, PortId};

/// Depth of one `(port, queue)` on a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueSample {
    /// Egress port.
    pub port: PortId,
    /// Queue id. In traffic-aware mode this is the destination node.
    pub queue: u32,
    /// Queued packets.
    pub depth: u64,
}

/// Snapshot of one device.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceMetrics {
    /// Per-queue depths.
    pub queues: Vec<QueueSample>,
    /// Packets dropped since start.
    pub drop_count: u64,
}

fn device_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^tor(\d+)$").ok()).as_ref()
}

/// Node id of a `tor<N>` device name.
pub fn node_of_device(name: &str) -> Option<NodeId> {
    device_pattern()?
        .captures(name)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Traffic matrix `(src, dst) -> depth` from per-device queue depths.
///
/// Devices that are not nodes are ignored. Queue ids are destinations; a
/// queue on any port other than 0 is rejected. Devices and queues naming a
/// node outside `0..nb_node` are skipped with a warning.
pub fn traffic_matrix_from_metrics(
    metrics: &BTreeMap<String, DeviceMetrics>,
    nb_node: usize,
) -> Result<TrafficMatrix> {
    let mut matrix = TrafficMatrix::new();
    for (name, device) in metrics {
        let Some(src) = node_of_device(name) else {
            continue;
        };
        if src as usize >= nb_node {
            warn!(device = %name, nb_node, "device outside the fabric, skipping");
            continue;
        }
        for sample in &device.queues {
            if sample.port != 0 {
                return Err(ScheduleError::invalid(format!(
                    "device {} reports queue {} on port {}; only port 0 is supported",
                    name, sample.queue, sample.port
                )));
            }
            if sample.queue as usize >= nb_node {
                warn!(device = %name, queue = sample.queue, nb_node, "queue outside the fabric, skipping");
                continue;
            }
            matrix.insert((src, sample.queue), sample.depth);
        }
    }
    Ok(matrix)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device(samples: &[(PortId, u32, u64)]) -> DeviceMetrics {
        DeviceMetrics {
            queues: samples
                .iter()
                .map(|(port, queue, depth)| QueueSample {
                    port: *port,
                    queue: *queue,
                    depth: *depth,
                })
                .collect(),
            drop_count: 0,
        }
    }

    #[test]
    fn test_node_of_device() {
        assert_eq!(node_of_device("tor12"), Some(12));
        assert_eq!(node_of_device("ocs"), None);
        assert_eq!(node_of_device("tor"), None);
        assert_eq!(node_of_device("xtor1"), None);
    }

    #[test]
    fn test_matrix() {
        let mut metrics = BTreeMap::new();
        metrics.insert("tor0".to_string(), device(&[(0, 1, 40), (0, 2, 0)]));
        metrics.insert("tor2".to_string(), device(&[(0, 0, 7)]));
        metrics.insert("ocs".to_string(), device(&[(3, 3, 99)]));

        let matrix = traffic_matrix_from_metrics(&metrics, 4).unwrap();
        assert_eq!(matrix.len(), 3);
        assert_eq!(matrix[&(0, 1)], 40);
        assert_eq!(matrix[&(2, 0)], 7);
    }

    #[test]
    fn test_rejects_other_ports() {
        let mut metrics = BTreeMap::new();
        metrics.insert("tor0".to_string(), device(&[(1, 1, 40)]));
        assert!(matches!(
            traffic_matrix_from_metrics(&metrics, 4),
            Err(ScheduleError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_foreign_nodes_skipped() {
        let mut metrics = BTreeMap::new();
        metrics.insert("tor0".to_string(), device(&[(0, 2, 50), (0, 9, 1)]));
        metrics.insert("tor7".to_string(), device(&[(0, 1, 30)]));

        let matrix = traffic_matrix_from_metrics(&metrics, 4).unwrap();
        assert_eq!(matrix.len(), 1);
        assert_eq!(matrix[&(0, 2)], 50);
    }
}
