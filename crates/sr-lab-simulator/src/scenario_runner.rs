use anyhow::{Context, Result, anyhow};
use sr_lab_abstract::{SimConfig, TestAction, TestAssertion, TestScenario, TransportProtocol};
use std::fs;
use std::path::Path;
use tracing::info;

use crate::{SimulationReport, Simulator};

pub type ProtocolPair = (Box<dyn TransportProtocol>, Box<dyn TransportProtocol>);

pub fn load_scenario(path: &Path) -> Result<TestScenario> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read scenario file {}", path.display()))?;
    toml::from_str(&content).context("Failed to parse scenario file")
}

/// Run a scenario against protocols built by `build`. The scenario's config overrides
/// are applied on top of `base`.
pub fn run_scenario<F>(
    scenario: &TestScenario,
    base: SimConfig,
    build: F,
) -> Result<SimulationReport>
where
    F: FnOnce(&SimConfig) -> Result<ProtocolPair>,
{
    info!("Running Scenario: {}", scenario.name);
    info!("Description: {}", scenario.description);

    let mut config = base;
    scenario.config.apply_to(&mut config);
    config
        .validate()
        .context("Invalid scenario configuration")?;

    let (sender, receiver) = build(&config)?;
    let mut sim = Simulator::new(config, sender, receiver)?;
    configure_actions(&mut sim, &scenario.actions);

    // Without explicit sends the generator supplies the traffic.
    if !scenario
        .actions
        .iter()
        .any(|a| matches!(a, TestAction::AppSend { .. }))
    {
        sim.schedule_generated_messages();
    }

    sim.init();

    let max_duration = scenario
        .assertions
        .iter()
        .find_map(|a| {
            if let TestAssertion::MaxDuration { ms } = a {
                Some(*ms)
            } else {
                None
            }
        })
        .unwrap_or(sim.config().time_limit);

    while sim.step()? {
        if sim.current_time() > max_duration {
            return Err(anyhow!("Test timed out after {} ms", max_duration));
        }
    }

    check_assertions(&sim, &scenario.assertions)?;
    info!("Test Scenario Passed!");
    Ok(sim.export_report())
}

pub fn configure_actions(sim: &mut Simulator, actions: &[TestAction]) {
    for action in actions {
        match action {
            TestAction::AppSend { time, data } => {
                sim.schedule_app_send(*time, data.clone());
            }
            TestAction::DropNextFromSenderSeq { seq } => {
                sim.add_drop_sender_seq_once(*seq);
            }
            TestAction::DropNextFromReceiverAck { ack } => {
                sim.add_drop_receiver_ack_once(*ack);
            }
            TestAction::CorruptNextFromSenderSeq { seq } => {
                sim.add_corrupt_sender_seq_once(*seq);
            }
        }
    }
}

fn check_range<T>(what: &str, value: T, min: T, max: Option<T>) -> Result<()>
where
    T: PartialOrd + std::fmt::Display + Copy,
{
    if value < min {
        return Err(anyhow!(
            "Assertion Failed: {} was {}, expected min {}",
            what,
            value,
            min
        ));
    }
    if let Some(max) = max
        && value > max
    {
        return Err(anyhow!(
            "Assertion Failed: {} was {}, expected max {}",
            what,
            value,
            max
        ));
    }
    Ok(())
}

fn check_assertions(sim: &Simulator, assertions: &[TestAssertion]) -> Result<()> {
    for assertion in assertions {
        match assertion {
            TestAssertion::DataDelivered { data } => {
                if !sim.delivered_data.iter().any(|d| d == data) {
                    return Err(anyhow!(
                        "Assertion Failed: Data {:?} was not delivered",
                        data
                    ));
                }
            }
            TestAssertion::DeliveredInOrder { data } => {
                if &sim.delivered_data != data {
                    return Err(anyhow!(
                        "Assertion Failed: delivered {:?}, expected {:?}",
                        sim.delivered_data,
                        data
                    ));
                }
            }
            TestAssertion::SenderPacketCount { min, max } => {
                check_range("Sender packet count", sim.sender_packet_count, *min, *max)?;
            }
            TestAssertion::Retransmissions { min, max } => {
                let retransmissions = sim.statistics().retransmissions;
                check_range("Retransmission count", retransmissions, *min, *max)?;
            }
            TestAssertion::MaxDuration { .. } => {} // Already checked
        }
    }
    Ok(())
}
