//! Network controller: owns the deployed topology and drives the collaborators.
//!
//! ## Concurrency
//!
//! Readers call [`NetworkController::snapshot`] and get an immutable
//! [`Deployment`] they may hold across any number of path computations.
//! Writers serialize on an async lock, build the next [`TopologyStore`] off
//! to the side, push it to the devices and only then swap the snapshot, so
//! no reader ever sees a half-applied schedule.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::config::FabricConfig;
use crate::device::{
    device_name, slot_lookup_entries, traffic_matrix_from_metrics, CircuitLoader, DeviceManager,
    DeviceMetrics, OcsSchedule, TableKind, TableLoader,
};
use crate::error::{Result, ScheduleError};
use crate::store::TopologyStore;
use crate::topology::TrafficMatrix;
use crate::types::{Circuit, NodeId, Path, TimeFlowEntry};

/// Immutable view of what is currently deployed.
#[derive(Debug, Clone)]
pub struct Deployment {
    /// The deployed slice graphs.
    pub store: Arc<TopologyStore>,
    /// Circuits that produced `store`, in deployment order.
    pub circuits: Arc<Vec<Circuit>>,
    /// [`TopologyStore::fingerprint`] of `store`.
    pub fingerprint: String,
}

/// Outcome of a topology deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopoReport {
    /// Circuits applied in this call.
    pub circuits: usize,
    /// Slices in the resulting cycle.
    pub cycle_length: usize,
    /// Circuit-switch entries loaded.
    pub ocs_entries: usize,
    /// Slot lookup entries loaded over all nodes.
    pub slot_entries: usize,
    /// Fingerprint of the new store.
    pub fingerprint: String,
    /// When the new store was committed.
    pub deployed_at: DateTime<Utc>,
}

/// Outcome of a routing deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingReport {
    /// Table the entries went to.
    pub table: TableKind,
    /// Nodes that received entries.
    pub nodes: usize,
    /// Entries loaded over all nodes.
    pub entries: usize,
    /// When the last table was loaded.
    pub deployed_at: DateTime<Utc>,
}

/// Owns the [`TopologyStore`] of one fabric and keeps devices in sync with it.
pub struct NetworkController<T, C, D> {
    config: FabricConfig,
    tables: Arc<T>,
    circuit_loader: Arc<C>,
    devices: Arc<D>,
    current: Arc<RwLock<Arc<Deployment>>>,
    writer: Mutex<()>,
}

impl<T, C, D> NetworkController<T, C, D>
where
    T: TableLoader,
    C: CircuitLoader,
    D: DeviceManager,
{
    /// Create a controller with an empty topology.
    pub fn new(config: FabricConfig, tables: Arc<T>, circuit_loader: Arc<C>, devices: Arc<D>) -> Result<Self> {
        config
            .validate()
            .map_err(|e| ScheduleError::invalid(e.to_string()))?;
        let store = TopologyStore::new(config.nb_node)?;
        let deployment = Deployment {
            fingerprint: store.fingerprint()?,
            store: Arc::new(store),
            circuits: Arc::new(Vec::new()),
        };
        Ok(Self {
            config,
            tables,
            circuit_loader,
            devices,
            current: Arc::new(RwLock::new(Arc::new(deployment))),
            writer: Mutex::new(()),
        })
    }

    /// Fabric configuration.
    pub fn config(&self) -> &FabricConfig {
        &self.config
    }

    /// Current deployment.
    pub fn snapshot(&self) -> Arc<Deployment> {
        self.current.read().clone()
    }

    /// Circuits of the current deployment.
    pub fn deployed_circuits(&self) -> Vec<Circuit> {
        self.snapshot().circuits.as_ref().clone()
    }

    /// Apply circuits and program the circuit switch and slot lookup tables.
    ///
    /// With `start_fresh` the current schedule is discarded first; otherwise
    /// the circuits are added on top of it. The snapshot is swapped only
    /// after every device accepted the new schedule.
    pub async fn deploy_topo(&self, circuits: &[Circuit], start_fresh: bool) -> Result<TopoReport> {
        let _writer = self.writer.lock().await;
        self.deploy_topo_locked(circuits, start_fresh).await
    }

    /// Compile paths and load every node's routing table.
    ///
    /// The table is chosen by the configured routing mode. With
    /// `start_fresh` that table is cleared on every node before loading.
    pub async fn deploy_routing(&self, paths: &[Path], start_fresh: bool) -> Result<RoutingReport> {
        let _writer = self.writer.lock().await;

        let nb_node = self.config.nb_node;
        if let Some(path) = paths
            .iter()
            .find(|p| p.src as usize >= nb_node || p.dst as usize >= nb_node)
        {
            return Err(ScheduleError::invalid(format!(
                "path {} -> {} outside a {}-node fabric",
                path.src, path.dst, nb_node
            )));
        }
        let compiled = self.config.compiler().compile(paths)?;
        let table = TableKind::for_routing(self.config.routing_mode);

        if start_fresh {
            for node in 0..nb_node as NodeId {
                self.tables
                    .clear_table(node, table)
                    .await
                    .map_err(|e| device_error("table loader", e))?;
            }
        }
        for (node, entries) in compiled.iter() {
            self.tables
                .load_entries(node, table, entries)
                .await
                .map_err(|e| device_error("table loader", e))?;
        }

        let report = RoutingReport {
            table,
            nodes: compiled.nodes().count(),
            entries: compiled.entry_count(),
            deployed_at: Utc::now(),
        };
        info!(
            fabric = %self.config.name,
            table = table.name(),
            nodes = report.nodes,
            entries = report.entries,
            start_fresh,
            "routing deployed"
        );
        Ok(report)
    }

    /// Compute paths over the current deployment with the configured strategy.
    pub fn compute_routes(&self) -> Result<Vec<Path>> {
        let deployment = self.snapshot();
        self.config
            .routing
            .compute(deployment.store.graphs(), &self.config.uplink_ports())
    }

    /// Freeze delivery: every node drains its own-id queue, which never holds traffic.
    pub async fn pause_calendar_queues(&self) -> Result<()> {
        let _writer = self.writer.lock().await;
        self.pause_locked().await
    }

    /// Point every node's active queue at its slice-0 peer.
    ///
    /// Needs a single-slice schedule on port 0.
    pub async fn activate_calendar_queues(&self) -> Result<()> {
        let _writer = self.writer.lock().await;
        self.activate_locked().await
    }

    /// Pause, deploy `circuits` from scratch, activate; as one writer transaction.
    ///
    /// If the deploy fails the queues are re-activated for the deployment
    /// that is still current, and the deploy error is returned.
    pub async fn reconfigure(&self, circuits: &[Circuit]) -> Result<TopoReport> {
        let _writer = self.writer.lock().await;
        self.pause_locked().await?;
        let report = match self.deploy_topo_locked(circuits, true).await {
            Ok(report) => report,
            Err(e) => {
                warn!(fabric = %self.config.name, error = %e, "reconfiguration failed, resuming current queues");
                if let Err(resume) = self.activate_locked().await {
                    error!(fabric = %self.config.name, error = %resume, "queues left paused");
                }
                return Err(e);
            }
        };
        self.activate_locked().await?;
        Ok(report)
    }

    /// Raw device metrics.
    pub async fn device_metrics(&self) -> Result<BTreeMap<String, DeviceMetrics>> {
        self.devices
            .device_metrics()
            .await
            .map_err(|e| device_error("device manager", e))
    }

    /// Traffic matrix from the current device metrics.
    pub async fn traffic_matrix(&self) -> Result<TrafficMatrix> {
        traffic_matrix_from_metrics(&self.device_metrics().await?, self.config.nb_node)
    }

    async fn deploy_topo_locked(&self, circuits: &[Circuit], start_fresh: bool) -> Result<TopoReport> {
        let previous = self.snapshot();
        let mut next = previous.store.as_ref().clone();
        next.deploy_topo(circuits, start_fresh)?;

        let schedule = OcsSchedule::from_store(&next);
        let slot_tables: Vec<(NodeId, Vec<TimeFlowEntry>)> = (0..next.nb_node() as NodeId)
            .map(|node| slot_lookup_entries(next.graphs(), node).map(|entries| (node, entries)))
            .collect::<Result<_>>()?;
        let fingerprint = next.fingerprint()?;

        if start_fresh {
            self.circuit_loader
                .clear_schedule()
                .await
                .map_err(|e| device_error("circuit loader", e))?;
        }
        self.circuit_loader
            .load_schedule(&schedule)
            .await
            .map_err(|e| device_error("circuit loader", e))?;

        // Slot lookup tables are derived from the whole store, so they are always replaced.
        for (node, entries) in &slot_tables {
            self.tables
                .clear_table(*node, TableKind::SlotLookup)
                .await
                .map_err(|e| device_error("table loader", e))?;
            self.tables
                .load_entries(*node, TableKind::SlotLookup, entries)
                .await
                .map_err(|e| device_error("table loader", e))?;
        }

        let mut deployed = if start_fresh {
            Vec::new()
        } else {
            previous.circuits.as_ref().clone()
        };
        deployed.extend_from_slice(circuits);

        let report = TopoReport {
            circuits: circuits.len(),
            cycle_length: next.cycle_length(),
            ocs_entries: schedule.entries.len(),
            slot_entries: slot_tables.iter().map(|(_, entries)| entries.len()).sum(),
            fingerprint: fingerprint.clone(),
            deployed_at: Utc::now(),
        };
        *self.current.write() = Arc::new(Deployment {
            store: Arc::new(next),
            circuits: Arc::new(deployed),
            fingerprint,
        });

        info!(
            fabric = %self.config.name,
            circuits = report.circuits,
            cycle_length = report.cycle_length,
            fingerprint = %report.fingerprint,
            start_fresh,
            "topology deployed"
        );
        Ok(report)
    }

    async fn pause_locked(&self) -> Result<()> {
        for node in 0..self.config.nb_node as NodeId {
            self.devices
                .set_active_queue(&device_name(node), node)
                .await
                .map_err(|e| device_error("device manager", e))?;
        }
        Ok(())
    }

    async fn activate_locked(&self) -> Result<()> {
        let deployment = self.snapshot();
        let store = &deployment.store;
        if store.cycle_length() != 1 {
            return Err(ScheduleError::invalid(format!(
                "queue activation needs a single-slice schedule, got {} slices",
                store.cycle_length()
            )));
        }

        let mut targets = Vec::new();
        if let Some(graph) = store.graph(0) {
            for link in graph.links() {
                if link.from.port != 0 {
                    return Err(ScheduleError::invalid(format!(
                        "queue activation supports port 0 only, node {} uses port {}",
                        link.from.node, link.from.port
                    )));
                }
                targets.push((link.from.node, link.to.node));
            }
        }

        for (node, peer) in targets {
            self.devices
                .set_active_queue(&device_name(node), peer)
                .await
                .map_err(|e| device_error("device manager", e))?;
        }
        Ok(())
    }
}

fn device_error<E: std::error::Error>(collaborator: &'static str, e: E) -> ScheduleError {
    let err = ScheduleError::from_device(collaborator, e);
    error!(error = %err, "collaborator call failed");
    err
}
