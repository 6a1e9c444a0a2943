//! Topology schedule generators.
//!
//! Every generator is a pure function from node and link counts to a list of
//! [`Circuit`]s. Randomized generators take an explicit seed, so a given
//! input always yields the same schedule.

mod blossom;
pub mod matching;
pub mod opera;
pub mod regular;
pub mod round_robin;
pub mod shale;

use serde::{Deserialize, Serialize};

use crate::error::{Result, ScheduleError};
use crate::types::Circuit;

pub use matching::{bipartite_matching, TrafficMatrix};
pub use opera::{merge_links, opera, port_offset, shuffle_slices};
pub use regular::{random_regular_graph, static_topo, DEFAULT_STATIC_SEED};
pub use round_robin::{round_robin, round_robin_over};
pub use shale::shale;

fn default_seed() -> u64 {
    DEFAULT_STATIC_SEED
}

/// Which schedule a fabric starts from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TopologySpec {
    /// Single-slice random regular graph.
    Static {
        /// RNG seed.
        #[serde(default = "default_seed")]
        seed: u64,
    },
    /// Round robin on port 0.
    RoundRobin {
        /// Append a loop-back slice.
        #[serde(default)]
        self_loop: bool,
    },
    /// Multi-link rotor schedule.
    Opera {
        /// RNG seed for the slice shuffle.
        #[serde(default = "default_seed")]
        seed: u64,
    },
    /// One round robin per cube dimension.
    Shale {
        /// Number of dimensions (one port each).
        dimensions: usize,
    },
    /// Explicit circuit list.
    Circuits {
        /// The circuits, deployed as given.
        circuits: Vec<Circuit>,
    },
    /// Static start, then rematched from traffic by the adaptive scheduler.
    TrafficAware,
}

impl Default for TopologySpec {
    fn default() -> Self {
        Self::RoundRobin { self_loop: false }
    }
}

impl TopologySpec {
    /// Generate the initial circuit list.
    pub fn generate(&self, nb_node: usize, nb_link: usize) -> Result<Vec<Circuit>> {
        match self {
            Self::Static { seed } => static_topo(nb_node, nb_link, *seed),
            Self::RoundRobin { self_loop } => {
                require_single_link("round robin", nb_link)?;
                round_robin(nb_node, *self_loop)
            }
            Self::Opera { seed } => opera(nb_node, nb_link, *seed),
            Self::Shale { dimensions } => {
                if *dimensions > nb_link {
                    return Err(ScheduleError::invalid(format!(
                        "shale with {} dimensions needs {} links, got {}",
                        dimensions, dimensions, nb_link
                    )));
                }
                shale(nb_node, *dimensions)
            }
            Self::Circuits { circuits } => {
                if let Some(c) = circuits
                    .iter()
                    .find(|c| c.port_a as usize >= nb_link || c.port_b as usize >= nb_link)
                {
                    return Err(ScheduleError::invalid(format!(
                        "circuit ({}) uses a port outside 0..{}",
                        c, nb_link
                    )));
                }
                Ok(circuits.clone())
            }
            Self::TrafficAware => {
                require_single_link("traffic-aware topology", nb_link)?;
                static_topo(nb_node, 1, DEFAULT_STATIC_SEED)
            }
        }
    }

    /// Whether the schedule is rematched at runtime.
    pub fn is_traffic_aware(&self) -> bool {
        matches!(self, Self::TrafficAware)
    }
}

fn require_single_link(what: &str, nb_link: usize) -> Result<()> {
    if nb_link != 1 {
        return Err(ScheduleError::invalid(format!(
            "{} supports exactly one link, got {}",
            what, nb_link
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spec_serde_tagged() {
        let spec: TopologySpec = serde_json::from_str(r#"{"kind":"opera"}"#).unwrap();
        assert_eq!(spec, TopologySpec::Opera { seed: 1 });

        let spec: TopologySpec =
            serde_json::from_str(r#"{"kind":"shale","dimensions":2}"#).unwrap();
        assert_eq!(spec, TopologySpec::Shale { dimensions: 2 });

        let json = serde_json::to_string(&TopologySpec::TrafficAware).unwrap();
        assert_eq!(json, r#"{"kind":"traffic_aware"}"#);
    }

    #[test]
    fn test_generate_dispatch() {
        let rr = TopologySpec::default().generate(4, 1).unwrap();
        assert_eq!(rr, round_robin(4, false).unwrap());

        assert!(TopologySpec::RoundRobin { self_loop: false }.generate(4, 2).is_err());
        assert!(TopologySpec::Shale { dimensions: 2 }.generate(4, 1).is_err());
        assert_eq!(TopologySpec::Shale { dimensions: 2 }.generate(4, 2).unwrap().len(), 4);
        assert!(TopologySpec::TrafficAware.generate(4, 2).is_err());
        assert_eq!(TopologySpec::TrafficAware.generate(4, 1).unwrap().len(), 2);
    }

    #[test]
    fn test_explicit_circuits_port_check() {
        let spec = TopologySpec::Circuits {
            circuits: vec![Circuit::new(0, 0, 1, 0, 1)],
        };
        assert!(spec.generate(2, 1).is_err());
        assert_eq!(spec.generate(2, 2).unwrap().len(), 1);
    }
}
