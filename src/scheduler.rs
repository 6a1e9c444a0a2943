//! Adaptive reconfiguration loop for traffic-aware fabrics.
//!
//! Each round reads queue depths, rematches the single-slice schedule to the
//! measured traffic and redeploys only when the matching changed:
//!
//! ```text
//! telemetry → traffic matrix → bipartite_matching(prev) → changed?
//!                                                         ├─ no:  skip
//!                                                         └─ yes: pause → deploy → activate
//! ```
//!
//! The loop runs as its own tokio task. It checks for a stop request before
//! every round and while waiting for the next one.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::canonical::circuits_fingerprint;
use crate::controller::{NetworkController, TopoReport};
use crate::device::{CircuitLoader, DeviceManager, TableLoader};
use crate::error::{Result, ScheduleError};
use crate::topology::{bipartite_matching, TrafficMatrix};

/// Counters of a running scheduler.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerStats {
    /// Rounds started.
    pub rounds: u64,
    /// Rounds that redeployed the topology.
    pub reconfigurations: u64,
    /// Rounds whose matching equalled the deployed circuits.
    pub unchanged: u64,
    /// Rounds skipped because telemetry was unavailable.
    pub telemetry_failures: u64,
}

/// Result of one adaptive round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoundOutcome {
    /// The matching equals the deployed circuits; nothing was touched.
    Unchanged,
    /// A new matching was deployed.
    Reconfigured(TopoReport),
}

/// Rematch the deployed topology to `traffic` and redeploy if it changed.
pub async fn adapt_once<T, C, D>(
    controller: &NetworkController<T, C, D>,
    traffic: &TrafficMatrix,
) -> Result<RoundOutcome>
where
    T: TableLoader,
    C: CircuitLoader,
    D: DeviceManager,
{
    let config = controller.config();
    let previous = controller.deployed_circuits();
    let next = bipartite_matching(config.nb_node, config.nb_link, traffic, &previous)?;

    if circuits_fingerprint(&next)? == circuits_fingerprint(&previous)? {
        return Ok(RoundOutcome::Unchanged);
    }
    controller.reconfigure(&next).await.map(RoundOutcome::Reconfigured)
}

/// Handle to a running adaptive loop.
pub struct AdaptiveScheduler {
    stop_tx: watch::Sender<bool>,
    handle: JoinHandle<Result<()>>,
    stats: Arc<Mutex<SchedulerStats>>,
}

impl AdaptiveScheduler {
    /// Start the loop on the current tokio runtime.
    ///
    /// The first round runs immediately; later rounds follow the configured
    /// update interval. Fails if the fabric has more than one link.
    pub fn spawn<T, C, D>(controller: Arc<NetworkController<T, C, D>>) -> Result<Self>
    where
        T: TableLoader + 'static,
        C: CircuitLoader + 'static,
        D: DeviceManager + 'static,
    {
        let nb_link = controller.config().nb_link;
        if nb_link != 1 {
            return Err(ScheduleError::invalid(format!(
                "adaptive scheduling needs exactly one link, got {}",
                nb_link
            )));
        }

        let (stop_tx, stop_rx) = watch::channel(false);
        let stats = Arc::new(Mutex::new(SchedulerStats::default()));
        let handle = tokio::spawn(run_loop(controller, stop_rx, stats.clone()));
        Ok(Self {
            stop_tx,
            handle,
            stats,
        })
    }

    /// Counters so far.
    pub fn stats(&self) -> SchedulerStats {
        *self.stats.lock()
    }

    /// Whether the loop has exited (stopped or failed).
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Request a stop and wait for the loop to exit.
    ///
    /// Returns the final counters, or the error that ended the loop early.
    pub async fn stop(self) -> Result<SchedulerStats> {
        // The loop may already be gone; then there is no receiver to notify.
        let _ = self.stop_tx.send(true);
        match self.handle.await {
            Ok(Ok(())) => Ok(*self.stats.lock()),
            Ok(Err(e)) => Err(e),
            Err(join) => Err(ScheduleError::invariant(format!("adaptive loop aborted: {}", join))),
        }
    }
}

async fn run_loop<T, C, D>(
    controller: Arc<NetworkController<T, C, D>>,
    mut stop_rx: watch::Receiver<bool>,
    stats: Arc<Mutex<SchedulerStats>>,
) -> Result<()>
where
    T: TableLoader,
    C: CircuitLoader,
    D: DeviceManager,
{
    let interval = controller.config().update_interval();
    let mut round: u64 = 0;

    loop {
        let stopped = *stop_rx.borrow();
        if stopped {
            break;
        }
        round += 1;
        stats.lock().rounds += 1;

        match controller.traffic_matrix().await {
            Err(e) => {
                warn!(round, error = %e, "telemetry unavailable, skipping round");
                stats.lock().telemetry_failures += 1;
            }
            Ok(traffic) => match adapt_once(&*controller, &traffic).await {
                Ok(RoundOutcome::Unchanged) => {
                    stats.lock().unchanged += 1;
                }
                Ok(RoundOutcome::Reconfigured(report)) => {
                    stats.lock().reconfigurations += 1;
                    info!(
                        round,
                        circuits = report.circuits,
                        fingerprint = %report.fingerprint,
                        "reconfigured"
                    );
                }
                Err(e) => {
                    error!(round, error = %e, "reconfiguration failed, stopping adaptive loop");
                    return Err(e);
                }
            },
        }

        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            changed = stop_rx.changed() => {
                // Handle dropped without an explicit stop.
                if changed.is_err() {
                    break;
                }
            }
        }
    }

    info!(rounds = round, "adaptive loop stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ArchMode, FabricConfig};
    use crate::device::{InMemoryCircuitLoader, InMemoryDeviceManager, InMemoryTableLoader};
    use crate::routing::RoutingStrategy;
    use crate::topology::TopologySpec;
    use crate::types::Circuit;

    fn controller(
        nb_node: usize,
    ) -> (
        NetworkController<InMemoryTableLoader, InMemoryCircuitLoader, InMemoryDeviceManager>,
        Arc<InMemoryDeviceManager>,
    ) {
        let config = FabricConfig {
            nb_node,
            arch_mode: ArchMode::TrafficAware,
            topology: TopologySpec::TrafficAware,
            routing: RoutingStrategy::DirectTrafficAware,
            ..Default::default()
        };
        let devices = Arc::new(InMemoryDeviceManager::new());
        let controller = NetworkController::new(
            config,
            Arc::new(InMemoryTableLoader::new()),
            Arc::new(InMemoryCircuitLoader::new()),
            devices.clone(),
        )
        .unwrap();
        (controller, devices)
    }

    #[tokio::test]
    async fn test_zero_traffic_is_unchanged() {
        let (controller, _) = controller(4);
        controller
            .deploy_topo(&[Circuit::new(0, 0, 1, 0, 0), Circuit::new(0, 2, 3, 0, 0)], true)
            .await
            .unwrap();
        let outcome = adapt_once(&controller, &TrafficMatrix::new()).await.unwrap();
        assert_eq!(outcome, RoundOutcome::Unchanged);
    }

    #[tokio::test]
    async fn test_new_matching_is_deployed() {
        let (controller, devices) = controller(4);
        controller
            .deploy_topo(&[Circuit::new(0, 0, 1, 0, 0), Circuit::new(0, 2, 3, 0, 0)], true)
            .await
            .unwrap();

        let mut traffic = TrafficMatrix::new();
        traffic.insert((0, 2), 50);
        traffic.insert((1, 3), 40);
        let outcome = adapt_once(&controller, &traffic).await.unwrap();
        assert!(matches!(outcome, RoundOutcome::Reconfigured(_)));
        assert_eq!(
            controller.deployed_circuits(),
            vec![Circuit::new(0, 0, 2, 0, 0), Circuit::new(0, 1, 3, 0, 0)]
        );
        assert_eq!(devices.active_queue("tor0"), Some(2));

        // Same traffic again: matching is stable.
        let again = adapt_once(&controller, &traffic).await.unwrap();
        assert_eq!(again, RoundOutcome::Unchanged);
    }

    #[tokio::test]
    async fn test_spawn_rejects_multiple_links() {
        let config = FabricConfig {
            nb_node: 4,
            nb_link: 2,
            ..Default::default()
        };
        let controller = Arc::new(
            NetworkController::new(
                config,
                Arc::new(InMemoryTableLoader::new()),
                Arc::new(InMemoryCircuitLoader::new()),
                Arc::new(InMemoryDeviceManager::new()),
            )
            .unwrap(),
        );
        assert!(AdaptiveScheduler::spawn(controller).is_err());
    }
}
