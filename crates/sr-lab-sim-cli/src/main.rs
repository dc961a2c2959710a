use anyhow::{Context, Result};
use clap::Parser;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{Level, info};

use sr_lab_abstract::{SimConfig, SimConfigOverride};
use sr_lab_simulator::scenario_runner::{self, ProtocolPair};
use sr_lab_simulator::{SimulationReport, Simulator};

#[derive(Parser, Debug)]
#[command(author, version, about = "Selective-Repeat ARQ network simulator")]
struct Args {
    /// Number of messages to simulate.
    #[arg(long)]
    messages: Option<u32>,

    /// Packet loss probability.
    #[arg(long)]
    loss: Option<f64>,

    /// Packet corruption probability.
    #[arg(long)]
    corrupt: Option<f64>,

    /// Average time between messages from the sender's application layer.
    #[arg(long)]
    delay: Option<u64>,

    #[arg(long)]
    window: Option<u32>,

    /// Retransmission timeout.
    #[arg(long)]
    timeout: Option<u64>,

    /// Trace level: 0 report only, 1 protocol events, 2 everything.
    #[arg(long)]
    trace: Option<u8>,

    #[arg(long)]
    seed: Option<u64>,

    #[arg(long)]
    min_latency: Option<u64>,
    #[arg(long)]
    max_latency: Option<u64>,

    /// Repeated ACKs needed before a fast retransmit.
    #[arg(long)]
    dup_ack_threshold: Option<u32>,

    /// Base configuration file (TOML). Command-line flags override it.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Run a scenario file instead of generated traffic.
    #[arg(long)]
    scenario: Option<PathBuf>,

    /// Write a JSON trace of the finished simulation.
    #[arg(long)]
    trace_out: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let config = args.resolve_config()?;
    init_logging(config.trace_level);
    info!("sr-lab-sim-cli starting…");

    let report = if let Some(path) = &args.scenario {
        let scenario = scenario_runner::load_scenario(path)?;
        scenario_runner::run_scenario(&scenario, config, build_pair)?
    } else {
        run_default_sim(config)?
    };

    println!("{}", report.statistics);

    if let Some(trace_path) = &args.trace_out {
        write_trace(trace_path, &report)?;
    }

    Ok(())
}

impl Args {
    fn overrides(&self) -> SimConfigOverride {
        SimConfigOverride {
            num_messages: self.messages,
            loss_rate: self.loss,
            corrupt_rate: self.corrupt,
            avg_msg_delay: self.delay,
            trace_level: self.trace,
            seed: self.seed,
            window_size: self.window,
            rxmt_timeout: self.timeout,
            min_latency: self.min_latency,
            max_latency: self.max_latency,
            time_limit: None,
            dup_ack_threshold: self.dup_ack_threshold,
        }
    }

    fn resolve_config(&self) -> Result<SimConfig> {
        let mut config = match &self.config {
            Some(path) => load_config(path)?,
            None => SimConfig::default(),
        };
        self.overrides().apply_to(&mut config);
        config.validate().context("Invalid simulation parameters")?;
        Ok(config)
    }
}

fn level_for_trace(trace_level: u8) -> Level {
    match trace_level {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

fn init_logging(trace_level: u8) {
    tracing_subscriber::fmt()
        .with_max_level(level_for_trace(trace_level))
        .init();
}

fn build_pair(config: &SimConfig) -> Result<ProtocolPair> {
    sr_lab_arq::sr_pair(config).context("Failed to build protocol entities")
}

fn run_default_sim(config: SimConfig) -> Result<SimulationReport> {
    let (sender, receiver) = build_pair(&config)?;
    let mut sim =
        Simulator::new(config, sender, receiver).context("Invalid simulation parameters")?;
    sim.schedule_generated_messages();
    info!("Starting headless simulation…");
    sim.run_until_complete()
        .context("Simulation aborted")?;
    info!(
        "Simulation complete at {} | packets sent: {} | deliveries: {}",
        sim.current_time(),
        sim.sender_packet_count,
        sim.delivered_data.len()
    );
    Ok(sim.export_report())
}

fn load_config(path: &Path) -> Result<SimConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    toml::from_str(&content).context("Failed to parse config file")
}

fn write_trace(path: &Path, report: &SimulationReport) -> Result<()> {
    let data = serde_json::to_vec_pretty(report).context("Failed to serialize simulation trace")?;
    fs::write(path, &data)
        .with_context(|| format!("Failed to write trace file {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_defaults() {
        let args = Args::try_parse_from([
            "sr-lab-sim-cli",
            "--messages",
            "50",
            "--window",
            "4",
            "--loss",
            "0.1",
        ])
        .unwrap();
        let config = args.resolve_config().unwrap();
        assert_eq!(config.num_messages, 50);
        assert_eq!(config.window_size, 4);
        assert_eq!(config.loss_rate, 0.1);
        assert_eq!(config.rxmt_timeout, SimConfig::default().rxmt_timeout);
    }

    #[test]
    fn invalid_window_is_rejected() {
        let args = Args::try_parse_from(["sr-lab-sim-cli", "--window", "0"]).unwrap();
        assert!(args.resolve_config().is_err());
    }

    #[test]
    fn trace_levels_map_to_tracing() {
        assert_eq!(level_for_trace(0), Level::INFO);
        assert_eq!(level_for_trace(1), Level::DEBUG);
        assert_eq!(level_for_trace(5), Level::TRACE);
    }

    #[test]
    fn default_run_delivers_everything() {
        let config = SimConfig {
            num_messages: 5,
            ..Default::default()
        };
        let report = run_default_sim(config).unwrap();
        assert_eq!(report.statistics.delivered, 5);
    }
}
