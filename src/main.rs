//! # zone-demo
//!
//! Wires two zones together over the in-process reference transport
//! and runs the calculator scenario from §8 (S1): a parent zone calls
//! `add(3.0, 4.0)` on an object hosted in a child zone, then drops its
//! object proxy, driving the release that destroys the stub (S2).

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{filter::LevelFilter, prelude::*, Layer};

use zone_rpc_core::error::{Error, Result as ZoneResult};
use zone_rpc_core::identity::{InterfaceOrdinal, Method, Zone};
use zone_rpc_core::interface::{Interface, MethodTable};
use zone_rpc_core::logging::ZoneEventFormatter;
use zone_rpc_core::options::AddRefOptions;
use zone_rpc_core::scheduler::Scheduler;
use zone_rpc_core::service::Service;
use zone_rpc_core::transports::local::LocalTransport;
use zone_rpc_core::Args;

const CALCULATOR_INTERFACE: InterfaceOrdinal = InterfaceOrdinal::new(1);
const METHOD_ADD: Method = Method::new(0);

/// The one facet this demo's child zone exposes.
struct Calculator;

impl Interface for Calculator {
    fn interface_ordinal(&self) -> InterfaceOrdinal {
        CALCULATOR_INTERFACE
    }

    fn dispatch(&self, method: Method, input: &[u8]) -> ZoneResult<Vec<u8>> {
        if method != METHOD_ADD {
            return Err(Error::UnknownInterface { object: Default::default(), interface: CALCULATOR_INTERFACE });
        }
        let (a, b): (f64, f64) =
            bincode::deserialize(input).map_err(|_| Error::StubDeserialisationError { object: Default::default() })?;
        bincode::serialize(&(a + b)).map_err(|_| Error::StubDeserialisationError { object: Default::default() })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = match args.verbose {
        0 => LevelFilter::INFO,
        1 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    };

    let guard;
    let detailed_log_layer;
    if let Some("stderr") = args.log_file.as_deref() {
        detailed_log_layer = tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_filter(log_level)
            .boxed();
        guard = None;
    } else {
        let file_appender = match args.log_file.as_deref() {
            Some(path_str) => {
                let log_path = std::path::Path::new(path_str);
                let log_dir = log_path.parent().unwrap_or_else(|| std::path::Path::new("."));
                let log_filename = log_path.file_name().unwrap_or_else(|| std::ffi::OsStr::new("zone_demo.log"));
                tracing_appender::rolling::daily(log_dir, log_filename)
            }
            None => tracing_appender::rolling::daily(".", "zone_demo.log"),
        };
        let (non_blocking_writer, file_guard) = tracing_appender::non_blocking(file_appender);
        detailed_log_layer = tracing_subscriber::fmt::layer()
            .with_writer(non_blocking_writer)
            .with_ansi(false)
            .with_filter(log_level)
            .boxed();
        guard = Some(file_guard);
    }

    let stdout_log = if !args.quiet {
        Some(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stdout)
                .event_format(ZoneEventFormatter)
                .with_filter(log_level),
        )
    } else {
        None
    };

    tracing_subscriber::registry().with(detailed_log_layer).with(stdout_log).init();
    let _log_guard = guard;

    info!("starting zone-demo");
    run_calculator_scenario().await?;
    info!("zone-demo completed successfully");
    Ok(())
}

async fn run_calculator_scenario() -> Result<()> {
    let parent_zone = Zone::new(1);
    let child_zone = Zone::new(2);

    let parent = Service::new("parent", parent_zone, Arc::new(Scheduler::new()?));
    let child = Service::new("child", child_zone, Arc::new(Scheduler::new()?));

    let (to_child, to_parent) = LocalTransport::pair(&parent, &child);
    let parent_proxy = parent.attach_remote_zone(child_zone, to_child, |root| root);
    child.attach_remote_zone(parent_zone, to_parent, |root| root);

    let mut table = MethodTable::new();
    table.add(Box::new(Calculator));
    let stub = child.register_stub(child.generate_new_object_id(), table)?;
    info!(object = %stub.object(), "child zone exported calculator");

    let object_proxy = parent_proxy.get_or_create_object_proxy(stub.object(), AddRefOptions::PLAIN, None).await?;
    info!(
        shared = stub.shared_count_for(zone_rpc_core::identity::CallerZone::new(parent_zone.raw())),
        "parent acquired object proxy"
    );

    let input = bincode::serialize(&(3.0f64, 4.0f64))?;
    let output = object_proxy.invoke(CALCULATOR_INTERFACE, METHOD_ADD, &input).await?;
    let sum: f64 = bincode::deserialize(&output)?;
    if !args_ok(sum) {
        error!(sum, "calculator returned an unexpected result");
    } else {
        info!(sum, "add(3.0, 4.0) completed");
    }

    drop(object_proxy);
    // The Drop impl schedules the wire release asynchronously; give
    // the spawned task a turn to run before checking the stub.
    tokio::task::yield_now().await;
    tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    info!(destroyed = stub.is_destroyed(), "object proxy dropped");

    Ok(())
}

fn args_ok(sum: f64) -> bool {
    (sum - 7.0).abs() < f64::EPSILON
}
