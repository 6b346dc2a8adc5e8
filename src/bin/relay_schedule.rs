//! Relay scheduling command-line tool.
//!
//! Reads a JSON network description, runs relay insertion and prints a JSON
//! report on stdout. Logs go to stderr.
//!
//! ## Configuration
//!
//! Arguments:
//! - `<network.json>`: network description (required)
//! - `[config.json]`: `ScheduleConfig`; missing fields take defaults
//!
//! Environment variables:
//! - `RUST_LOG`: Log level filter (default: relay_kernel=info,relay_schedule=info)
//! - `LOG_FORMAT`: "json" for structured logs, "pretty" for development (default: json)
//! - `REMOVE_RELAY_CHAINS`: "1" to replace runs of single-fanout relays by
//!   direct edges after materialization (default: off)
//!
//! ## Network format
//!
//! ```json
//! {
//!   "inputs": ["a", "b", "c"],
//!   "gates": [
//!     { "name": "g1", "function": "and", "fanins": ["a", "!b"] },
//!     { "name": "g2", "function": "maj", "fanins": ["g1", "c", "1"] }
//!   ],
//!   "outputs": ["g2", "!g1"]
//! }
//! ```
//!
//! A leading `!` complements a reference; `0` and `1` are the constants.
//! Gates must be listed after their fanins.
//!
//! ## Usage
//!
//! ```bash
//! LOG_FORMAT=pretty cargo run --bin relay_schedule -- network.json config.json
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{error, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use relay_kernel::{
    GateFunction, InMemoryNetwork, LogicNetwork, OptimizationReport, RelayInsertion, RelayNetworkViolation,
    ScheduleConfig, Signal, RELAY_KERNEL_SCHEMA_VERSION,
};

/// Initialize the tracing subscriber with JSON or pretty format
fn init_tracing() {
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "json".to_string());

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "relay_kernel=info,relay_schedule=info".into());

    if log_format == "pretty" {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .flatten_event(true)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

#[derive(Debug, Deserialize)]
struct NetworkDescription {
    #[serde(default)]
    inputs: Vec<String>,
    #[serde(default)]
    gates: Vec<GateDescription>,
    #[serde(default)]
    outputs: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct GateDescription {
    name: String,
    function: String,
    fanins: Vec<String>,
}

#[derive(Debug, Serialize)]
struct Report {
    schema_version: &'static str,
    params_hash: String,
    fingerprint: String,
    depth: u32,
    total_relays: u64,
    input_levels: Vec<u32>,
    /// Level per named input and gate.
    levels: BTreeMap<String, u32>,
    output_levels: Vec<u32>,
    optimization: Option<OptimizationReport>,
    relayed_nodes: usize,
    /// Longest relay run replaced by a direct edge, when removal ran.
    #[serde(skip_serializing_if = "Option::is_none")]
    longest_chain_removed: Option<u32>,
    violations: Vec<RelayNetworkViolation>,
}

/// Look up a possibly complemented signal reference.
fn resolve(names: &BTreeMap<String, Signal>, ntk: &InMemoryNetwork, reference: &str) -> Result<Signal, String> {
    let (complemented, name) = match reference.strip_prefix('!') {
        Some(rest) => (true, rest),
        None => (false, reference),
    };
    let signal = match name {
        "0" => ntk.constant(false),
        "1" => ntk.constant(true),
        _ => *names
            .get(name)
            .ok_or_else(|| format!("Unknown signal reference: {}", reference))?,
    };
    Ok(if complemented { signal.complement() } else { signal })
}

/// Build an in-memory network, returning it with its name table.
fn build_network(desc: &NetworkDescription) -> Result<(InMemoryNetwork, BTreeMap<String, Signal>), String> {
    let mut ntk = InMemoryNetwork::new();
    let mut names: BTreeMap<String, Signal> = BTreeMap::new();

    for name in &desc.inputs {
        let signal = ntk.add_input();
        if names.insert(name.clone(), signal).is_some() {
            return Err(format!("Duplicate signal name: {}", name));
        }
    }
    for gate in &desc.gates {
        let function = GateFunction::from_str(&gate.function)
            .ok_or_else(|| format!("Unknown gate function: {}", gate.function))?;
        let fanins = gate
            .fanins
            .iter()
            .map(|r| resolve(&names, &ntk, r))
            .collect::<Result<Vec<_>, _>>()?;
        let signal = ntk.add_gate(function, &fanins).map_err(|e| e.to_string())?;
        if names.insert(gate.name.clone(), signal).is_some() {
            return Err(format!("Duplicate signal name: {}", gate.name));
        }
    }
    for reference in &desc.outputs {
        let signal = resolve(&names, &ntk, reference)?;
        ntk.add_output(signal).map_err(|e| e.to_string())?;
    }
    Ok((ntk, names))
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let version = env!("CARGO_PKG_VERSION");
    let mut args = std::env::args().skip(1);
    let network_path = match args.next() {
        Some(path) => path,
        None => {
            error!("Missing network description argument");
            return Err("usage: relay_schedule <network.json> [config.json]".into());
        }
    };

    let config = match args.next() {
        Some(path) => ScheduleConfig::from_json_str(&std::fs::read_to_string(path)?)?,
        None => ScheduleConfig::default(),
    };
    info!(
        version = version,
        network = %network_path,
        policy = %config.scheduling_policy,
        params_hash = %config.params_hash(),
        "Starting relay scheduling"
    );

    let desc: NetworkDescription = serde_json::from_str(&std::fs::read_to_string(&network_path)?)?;
    let (ntk, names) = build_network(&desc)?;
    info!(
        nodes = ntk.size(),
        inputs = ntk.num_inputs(),
        gates = ntk.num_gates(),
        outputs = ntk.num_outputs(),
        "Network loaded"
    );

    let mut engine = RelayInsertion::new(&ntk, &config)?;
    let mut relayed = engine.run()?;
    let longest_chain_removed = match std::env::var("REMOVE_RELAY_CHAINS").as_deref() {
        Ok("1") => Some(relayed.remove_relay_chains(&config)?),
        _ => None,
    };
    let violations = relayed.verify(&config);

    let levels = names
        .iter()
        .filter(|(_, s)| !ntk.is_constant(s.node))
        .filter_map(|(name, s)| engine.level(s.node).map(|l| (name.clone(), l)))
        .collect();
    let report = Report {
        schema_version: RELAY_KERNEL_SCHEMA_VERSION,
        params_hash: config.params_hash(),
        fingerprint: engine.fingerprint()?,
        depth: engine.depth().unwrap_or(0),
        total_relays: engine.total_relays()?,
        input_levels: engine.input_levels().unwrap_or_default(),
        levels,
        output_levels: (0..ntk.num_outputs()).filter_map(|i| engine.po_level(i)).collect(),
        optimization: engine.optimization_report().cloned(),
        relayed_nodes: relayed.network().size(),
        longest_chain_removed,
        violations,
    };

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
