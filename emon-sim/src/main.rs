// EMon Sim - Command-line simulator for the EMon metric broker
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! # EMon Sim
//!
//! Drives a voltage / current / power / energy broker against a simulated
//! ADC and a simulated millisecond clock, printing every published batch
//! as one JSON line on stdout.
//!
//! ## Usage
//!
//! ```bash
//! # 12V at 2A for one simulated hour, power every 500ms
//! emon-sim --volts 12 --amps 2 --duration-ms 3600000
//!
//! # Resume from a saved energy reading, heartbeat every 10s
//! emon-sim --restore-wh 1500 --heartbeat-ms 10000
//! ```

use std::io;
use std::process::ExitCode;

use clap::Parser;
use emon::{ClockSource, EmonError, FixedSource, Integral, ManualClock, NodeConfig, Sampled, MS_PER_HOUR};
use emon_broker::{Broker, BrokerConfig, BrokerError, JsonPublisher, Result};
use tracing::{debug, error, info, warn, Level};
use tracing_subscriber::EnvFilter;

/// Voltage divider on the supply channel
const DIVIDER_HIGH_OHMS: f64 = 30_000.0;
const DIVIDER_LOW_OHMS: f64 = 10_000.0;

/// EMon broker simulator
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Simulated supply voltage
    #[arg(long, default_value = "12.0")]
    volts: f64,

    /// Simulated load current
    #[arg(long, default_value = "2.0")]
    amps: f64,

    /// Publish interval for Power, in milliseconds
    #[arg(short, long, default_value = "500")]
    interval_ms: u32,

    /// Heartbeat for the on-change Voltage and Current subscriptions (0 disables)
    #[arg(long, default_value = "0")]
    heartbeat_ms: u32,

    /// Clock step between polls, in milliseconds
    #[arg(short, long, default_value = "100")]
    step_ms: u32,

    /// Simulated run time, in milliseconds
    #[arg(short, long, default_value = "5000")]
    duration_ms: u64,

    /// Energy reading to restore before the run, in Wh
    #[arg(long)]
    restore_wh: Option<f64>,

    /// Broker configuration file (JSON)
    #[arg(short, long)]
    config: Option<String>,

    /// Publish min/max with every value
    #[arg(short, long, default_value = "false")]
    verbose: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() -> ExitCode {
    let args = Args::parse();

    // Logs go to stderr so stdout carries only JSON batches
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = match args.log_level.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "info" => Level::INFO,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::INFO,
        };
        EnvFilter::from_default_env().add_directive(level.into())
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    info!("EMon Sim v{}", env!("CARGO_PKG_VERSION"));

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("simulation failed: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn load_config(path: Option<&str>) -> Result<BrokerConfig> {
    match path {
        Some(path) => {
            let text = std::fs::read_to_string(path)?;
            let config = BrokerConfig::from_json(&text)?;
            info!("loaded broker config from {}", path);
            Ok(config)
        }
        None => Ok(BrokerConfig::default()),
    }
}

fn build_broker(args: &Args) -> Result<Broker<FixedSource, ManualClock>> {
    let config = load_config(args.config.as_deref())?;
    let mut adc = FixedSource::new(2);
    let gain = (DIVIDER_HIGH_OHMS + DIVIDER_LOW_OHMS) / DIVIDER_LOW_OHMS;
    adc.set_millivolts(0, args.volts * 1000.0 / gain);
    adc.set_millivolts(1, args.amps * 1000.0);

    let mut broker = Broker::with_config(config, adc, ManualClock::new(0))?;
    let voltage = broker.add_sampled(
        NodeConfig::new("Voltage", "V").with_verbose(args.verbose),
        Sampled::voltage_divider(0, DIVIDER_HIGH_OHMS, DIVIDER_LOW_OHMS).map_err(EmonError::from)?,
    )?;
    let current = broker.add_sampled(
        NodeConfig::new("Current", "A").with_verbose(args.verbose),
        Sampled::voltage_divider(1, 0.0, 1.0).map_err(EmonError::from)?,
    )?;
    let power = broker.add_product(
        NodeConfig::new("Power", "W").with_verbose(args.verbose),
        voltage,
        current,
    )?;
    broker.add_integral(
        NodeConfig::new("Energy", "Wh").with_verbose(args.verbose),
        Integral::hourly(power),
    )?;

    broker.subscribe("Voltage", args.step_ms.max(1), args.heartbeat_ms)?;
    broker.subscribe("Current", args.step_ms.max(1), args.heartbeat_ms)?;
    broker.subscribe_interval("Power", args.interval_ms)?;
    broker.subscribe_interval("Energy", args.interval_ms)?;

    if let Some(wh) = args.restore_wh {
        if !broker.set_value("Energy", wh)? {
            warn!("energy restore of {} Wh refused", wh);
        }
    }
    Ok(broker)
}

fn run(args: &Args) -> Result<()> {
    if args.step_ms == 0 {
        return Err(BrokerError::InvalidConfig("step must be non-zero".to_string()));
    }

    let mut broker = build_broker(args)?;
    let stdout = io::stdout();
    let mut publisher = JsonPublisher::new(stdout.lock());

    info!(
        "simulating {}ms in {}ms steps ({} nodes)",
        args.duration_ms,
        args.step_ms,
        broker.node_count()
    );

    let mut simulated: u64 = 0;
    loop {
        if let Some(batch) = broker.poll(&mut publisher)? {
            debug!("tick {}: {} node(s) published", broker.clock().now(), batch.len());
        }
        if simulated >= args.duration_ms {
            break;
        }
        broker.clock().advance(args.step_ms);
        simulated += u64::from(args.step_ms);
    }

    let energy = broker.value("Energy")?;
    info!(
        "done: {} passes, {} batches, energy {:.3} Wh ({:.1} h simulated)",
        broker.scheduler().runs(),
        broker.scheduler().batches(),
        energy,
        simulated as f64 / MS_PER_HOUR as f64
    );
    Ok(())
}
