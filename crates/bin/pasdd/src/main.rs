//! # pasdd: PaSD gateway daemon
//!
//! Composition root that wires a backend to both transports and serves them.
//!
//! ## Responsibilities
//! - Load configuration (`pasd.toml`, then environment overrides)
//! - Install the `tracing` subscriber with the configured filter
//! - Build the backend: the in-process simulator, or the catalogue-driven
//!   bus backend over a Modbus ASCII client
//! - Share one attribute service between the JSON and Modbus listeners
//! - Stop on Ctrl-C
//!
//! ## Dependency rule
//! This is the **only** crate that depends on all other crates.
//! It is the wiring layer; no domain logic belongs here.

mod config;

use std::sync::Arc;

use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use pasd_adapter_json::JsonApi;
use pasd_adapter_modbus::{ModbusClient, ModbusServer};
use pasd_adapter_simulator::Simulator;
use pasd_app::ports::Backend;
use pasd_app::services::{AttributeService, BusBackend};
use pasd_domain::device::Topology;

use crate::config::{BackendKind, Config, ServerConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;

    let filter = EnvFilter::try_new(&config.logging.filter).unwrap_or_else(|err| {
        eprintln!("ignoring log filter {:?}: {err}", config.logging.filter);
        EnvFilter::new("pasdd=info,pasd=info")
    });
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let topology = Topology::new(config.devices.smartboxes);
    tracing::info!(
        smartboxes = topology.smartbox_count(),
        backend = ?config.backend.kind,
        "starting pasdd"
    );

    match (config.backend.kind, config.backend.bus) {
        (BackendKind::Modbus, Some(bus)) => {
            tracing::info!(address = %bus.address, "using modbus bus backend");
            let backend = BusBackend::new(ModbusClient::new(bus));
            run(&config.server, backend, topology).await
        }
        _ => run(&config.server, Simulator::new(topology), topology).await,
    }
}

async fn run<B: Backend + 'static>(
    server: &ServerConfig,
    backend: B,
    topology: Topology,
) -> Result<(), Box<dyn std::error::Error>> {
    let service = Arc::new(AttributeService::new(backend, topology));

    let json_listener = TcpListener::bind(&server.json_bind).await?;
    let modbus_listener = TcpListener::bind(&server.modbus_bind).await?;

    let json = JsonApi::new(Arc::clone(&service));
    let modbus = ModbusServer::new(service);

    tokio::select! {
        result = json.serve(json_listener) => result?,
        result = modbus.serve(modbus_listener) => result?,
        result = tokio::signal::ctrl_c() => {
            result?;
            tracing::info!("shutting down");
        }
    }

    Ok(())
}
