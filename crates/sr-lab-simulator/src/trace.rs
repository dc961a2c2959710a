use serde::Serialize;
use sr_lab_abstract::{SimConfig, Statistics};

use crate::engine::LinkEventSummary;

#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    pub config: SimConfig,
    pub duration: u64,
    pub delivered_data: Vec<String>,
    pub sender_packet_count: u32,
    pub statistics: Statistics,
    pub link_events: Vec<LinkEventSummary>,
}
