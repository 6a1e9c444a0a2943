//! Fabric configuration.
//!
//! A [`FabricConfig`] is read from JSON. Every field has a default, so a
//! config only needs to name what differs:
//!
//! ```json
//! {
//!   "name": "opera-8",
//!   "nb_node": 8,
//!   "nb_link": 2,
//!   "topology": { "kind": "opera", "seed": 7 },
//!   "routing": { "kind": "bounded_hop", "max_hops": 2 }
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::canonical::canonical_hash_hex;
use crate::compiler::{AddressingMode, FlowTableCompiler, RoutingMode};
use crate::routing::RoutingStrategy;
use crate::topology::TopologySpec;
use crate::types::{PortId, MAX_NODES};

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Config file could not be read.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// Config is not valid JSON for [`FabricConfig`].
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    /// Values are inconsistent.
    #[error("Invalid config: {0}")]
    Validation(String),
}

/// Queue addressing architecture of the fabric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArchMode {
    /// Fixed schedule, calendar queue per send slice.
    #[default]
    TrafficOblivious,
    /// Single-slice schedule rematched from traffic, queue per destination.
    TrafficAware,
}

/// Complete description of a fabric.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FabricConfig {
    /// Name used in logs.
    pub name: String,
    /// Number of nodes.
    pub nb_node: usize,
    /// Uplinks per node.
    pub nb_link: usize,
    /// Duration of one slice.
    pub time_slice_duration_ms: u64,
    /// Queue architecture.
    pub arch_mode: ArchMode,
    /// Source or per-hop tables.
    pub routing_mode: RoutingMode,
    /// Initial schedule.
    pub topology: TopologySpec,
    /// Path search strategy.
    pub routing: RoutingStrategy,
    /// Interval between adaptive rounds.
    pub update_interval_ms: u64,
}

impl Default for FabricConfig {
    fn default() -> Self {
        Self {
            name: "fabric".to_string(),
            nb_node: 4,
            nb_link: 1,
            time_slice_duration_ms: 128,
            arch_mode: ArchMode::TrafficOblivious,
            routing_mode: RoutingMode::PerHop,
            topology: TopologySpec::default(),
            routing: RoutingStrategy::default(),
            update_interval_ms: 1000,
        }
    }
}

impl FabricConfig {
    /// Parse and validate a JSON config.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON config file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Check value ranges and mode consistency.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.nb_node == 0 || self.nb_node > MAX_NODES {
            return Err(ConfigError::Validation(format!(
                "nb_node {} outside 1..={}",
                self.nb_node, MAX_NODES
            )));
        }
        if self.nb_link == 0 {
            return Err(ConfigError::Validation("nb_link must be at least 1".to_string()));
        }
        if self.time_slice_duration_ms == 0 {
            return Err(ConfigError::Validation("time_slice_duration_ms must be positive".to_string()));
        }
        if self.update_interval_ms == 0 {
            return Err(ConfigError::Validation("update_interval_ms must be positive".to_string()));
        }

        let traffic_aware = self.arch_mode == ArchMode::TrafficAware;
        if traffic_aware && self.nb_link != 1 {
            return Err(ConfigError::Validation(format!(
                "traffic-aware fabrics use exactly one link, got {}",
                self.nb_link
            )));
        }
        if self.topology.is_traffic_aware() && !traffic_aware {
            return Err(ConfigError::Validation(
                "traffic_aware topology requires arch_mode traffic_aware".to_string(),
            ));
        }
        if self.routing == RoutingStrategy::DirectTrafficAware && !traffic_aware {
            return Err(ConfigError::Validation(
                "direct_traffic_aware routing requires arch_mode traffic_aware".to_string(),
            ));
        }
        Ok(())
    }

    /// Canonical hash of the configuration.
    pub fn params_hash(&self) -> crate::error::Result<String> {
        canonical_hash_hex(self)
    }

    /// Queue addressing implied by the architecture.
    pub fn addressing_mode(&self) -> AddressingMode {
        match self.arch_mode {
            ArchMode::TrafficOblivious => AddressingMode::TimeIndexed,
            ArchMode::TrafficAware => AddressingMode::PerDestinationQueue,
        }
    }

    /// Compiler for this fabric's routing and addressing modes.
    pub fn compiler(&self) -> FlowTableCompiler {
        FlowTableCompiler::new(self.routing_mode, self.addressing_mode())
    }

    /// Uplink ports `0..nb_link`.
    pub fn uplink_ports(&self) -> Vec<PortId> {
        (0..self.nb_link as PortId).collect()
    }

    /// Queues per port: one per slice, or one per destination in traffic-aware mode.
    pub fn queue_count(&self, cycle_length: usize) -> usize {
        match self.arch_mode {
            ArchMode::TrafficOblivious => cycle_length,
            ArchMode::TrafficAware => self.nb_node,
        }
    }

    /// Slice duration.
    pub fn time_slice_duration(&self) -> Duration {
        Duration::from_millis(self.time_slice_duration_ms)
    }

    /// Adaptive round interval.
    pub fn update_interval(&self) -> Duration {
        Duration::from_millis(self.update_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::HopSearch;

    #[test]
    fn test_defaults_fill_missing_fields() {
        let config = FabricConfig::from_json_str(r#"{"nb_node": 8}"#).unwrap();
        assert_eq!(config.nb_node, 8);
        assert_eq!(config.nb_link, 1);
        assert_eq!(config.time_slice_duration_ms, 128);
        assert_eq!(config.routing_mode, RoutingMode::PerHop);
        assert_eq!(config.topology, TopologySpec::RoundRobin { self_loop: false });
        assert_eq!(config.update_interval(), Duration::from_secs(1));
    }

    #[test]
    fn test_tagged_sections() {
        let json = r#"{
            "nb_node": 8,
            "nb_link": 2,
            "routing_mode": "source",
            "topology": {"kind": "opera", "seed": 7},
            "routing": {"kind": "bounded_hop", "max_hops": 3}
        }"#;
        let config = FabricConfig::from_json_str(json).unwrap();
        assert_eq!(config.topology, TopologySpec::Opera { seed: 7 });
        assert_eq!(config.routing, RoutingStrategy::BoundedHop(HopSearch::new(3)));
        assert_eq!(config.routing_mode, RoutingMode::Source);
        assert_eq!(config.uplink_ports(), vec![0, 1]);
    }

    #[test]
    fn test_validation() {
        let too_many = FabricConfig {
            nb_node: 300,
            ..Default::default()
        };
        assert!(matches!(too_many.validate(), Err(ConfigError::Validation(_))));

        let ta_two_links = FabricConfig {
            arch_mode: ArchMode::TrafficAware,
            nb_link: 2,
            ..Default::default()
        };
        assert!(ta_two_links.validate().is_err());

        let ta_topology_in_to = FabricConfig {
            topology: TopologySpec::TrafficAware,
            ..Default::default()
        };
        assert!(ta_topology_in_to.validate().is_err());

        assert!(matches!(
            FabricConfig::from_json_str("{not json"),
            Err(ConfigError::Json(_))
        ));
    }

    #[test]
    fn test_derived_values() {
        let ta = FabricConfig {
            nb_node: 6,
            arch_mode: ArchMode::TrafficAware,
            topology: TopologySpec::TrafficAware,
            routing: RoutingStrategy::DirectTrafficAware,
            ..Default::default()
        };
        ta.validate().unwrap();
        assert_eq!(ta.addressing_mode(), AddressingMode::PerDestinationQueue);
        assert_eq!(ta.queue_count(1), 6);
        assert_eq!(FabricConfig::default().queue_count(3), 3);
    }

    #[test]
    fn test_params_hash_tracks_values() {
        let a = FabricConfig::default();
        let b = FabricConfig {
            update_interval_ms: 500,
            ..Default::default()
        };
        assert_eq!(a.params_hash().unwrap(), FabricConfig::default().params_hash().unwrap());
        assert_ne!(a.params_hash().unwrap(), b.params_hash().unwrap());
        assert_eq!(a.params_hash().unwrap().len(), 16);
    }
}
