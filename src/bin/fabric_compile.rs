//! Fabric Compile Binary
//!
//! Compiles a fabric config into its full device program:
//! - Circuit list and circuit-switch schedule
//! - Slot lookup table per node
//! - Routing table per node (per-hop or source, from the config)
//!
//! ## Configuration
//!
//! - First argument, or `FABRIC_CONFIG`: path of the JSON config (required)
//! - Second argument: output file (default: stdout)
//! - `RUST_LOG`: Log level filter (default: info)
//! - `LOG_FORMAT`: "json" for structured logs, "pretty" for development (default: json)
//!
//! Logs go to stderr so stdout carries only the program.
//!
//! ## Usage
//!
//! ```bash
//! cargo run --bin fabric_compile -- fabric.json program.json
//! ```

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::{info, warn};
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

use timeslice_fabric::device::{device_name, slot_lookup_entries};
use timeslice_fabric::{
    Circuit, FabricConfig, OcsSchedule, TableKind, TableWrite, TopologyStore, FABRIC_SCHEMA_VERSION,
};

/// Initialize the tracing subscriber with JSON or pretty format
fn init_tracing() {
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "json".to_string());

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "fabric_compile=info,timeslice_fabric=info".into());

    if log_format == "pretty" {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_span_events(FmtSpan::CLOSE),
            )
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_current_span(true)
                    .with_span_events(FmtSpan::CLOSE)
                    .flatten_event(true),
            )
            .init();
    }
}

/// Everything a fabric needs loaded, keyed by device.
#[derive(Serialize)]
struct FabricProgram {
    schema_version: &'static str,
    name: String,
    params_hash: String,
    fingerprint: String,
    cycle_length: usize,
    circuits: Vec<Circuit>,
    ocs_schedule: OcsSchedule,
    tables: BTreeMap<String, Vec<TableWrite>>,
}

fn compile(config: &FabricConfig) -> Result<FabricProgram, Box<dyn std::error::Error>> {
    let circuits = config.topology.generate(config.nb_node, config.nb_link)?;
    let mut store = TopologyStore::new(config.nb_node)?;
    store.deploy_topo(&circuits, true)?;

    let paths = config.routing.compute(store.graphs(), &config.uplink_ports())?;
    let routing = config.compiler().compile(&paths)?;
    let routing_table = TableKind::for_routing(config.routing_mode);

    let mut tables = BTreeMap::new();
    for node in 0..config.nb_node as u32 {
        let mut writes =
            TableWrite::render_all(TableKind::SlotLookup, &slot_lookup_entries(store.graphs(), node)?);
        writes.extend(TableWrite::render_all(routing_table, routing.get(node)));
        tables.insert(device_name(node), writes);
    }

    info!(
        fabric = %config.name,
        circuits = circuits.len(),
        cycle_length = store.cycle_length(),
        paths = paths.len(),
        entries = routing.entry_count(),
        routing = config.routing.name(),
        "fabric compiled"
    );

    Ok(FabricProgram {
        schema_version: FABRIC_SCHEMA_VERSION,
        name: config.name.clone(),
        params_hash: config.params_hash()?,
        fingerprint: store.fingerprint()?,
        cycle_length: store.cycle_length(),
        ocs_schedule: OcsSchedule::from_store(&store),
        circuits,
        tables,
    })
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let mut args = std::env::args().skip(1);
    let config_path = match args.next().or_else(|| std::env::var("FABRIC_CONFIG").ok()) {
        Some(path) => path,
        None => {
            tracing::error!("No config given: pass a path or set FABRIC_CONFIG");
            return Err("missing config path".into());
        }
    };
    let output = args.next();

    let config = FabricConfig::from_file(&config_path)?;
    info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %config_path,
        params_hash = %config.params_hash()?,
        "Compiling fabric"
    );
    if config.topology.is_traffic_aware() {
        warn!("traffic_aware topology compiled from its static start; rematching needs a running controller");
    }

    let program = compile(&config)?;
    let json = serde_json::to_string_pretty(&program)?;
    match output {
        Some(path) => {
            std::fs::write(&path, json)?;
            info!(output = %path, "program written");
        }
        None => println!("{}", json),
    }
    Ok(())
}
