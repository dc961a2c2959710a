use crate::config::SimConfig;
use serde::Deserialize;

#[derive(Deserialize, Debug, Clone)]
pub struct TestScenario {
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub config: SimConfigOverride,
    #[serde(default)]
    pub actions: Vec<TestAction>,
    #[serde(default)]
    pub assertions: Vec<TestAssertion>,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct SimConfigOverride {
    pub num_messages: Option<u32>,
    pub loss_rate: Option<f64>,
    pub corrupt_rate: Option<f64>,
    pub avg_msg_delay: Option<u64>,
    pub trace_level: Option<u8>,
    pub seed: Option<u64>,
    pub window_size: Option<u32>,
    pub rxmt_timeout: Option<u64>,
    pub min_latency: Option<u64>,
    pub max_latency: Option<u64>,
    pub time_limit: Option<u64>,
    pub dup_ack_threshold: Option<u32>,
}

impl SimConfigOverride {
    pub fn apply_to(&self, config: &mut SimConfig) {
        if let Some(v) = self.num_messages {
            config.num_messages = v;
        }
        if let Some(v) = self.loss_rate {
            config.loss_rate = v;
        }
        if let Some(v) = self.corrupt_rate {
            config.corrupt_rate = v;
        }
        if let Some(v) = self.avg_msg_delay {
            config.avg_msg_delay = v;
        }
        if let Some(v) = self.trace_level {
            config.trace_level = v;
        }
        if let Some(v) = self.seed {
            config.seed = v;
        }
        if let Some(v) = self.window_size {
            config.window_size = v;
        }
        if let Some(v) = self.rxmt_timeout {
            config.rxmt_timeout = v;
        }
        if let Some(v) = self.min_latency {
            config.min_latency = v;
        }
        if let Some(v) = self.max_latency {
            config.max_latency = v;
        }
        if let Some(v) = self.time_limit {
            config.time_limit = v;
        }
        if let Some(v) = self.dup_ack_threshold {
            config.dup_ack_threshold = v;
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TestAction {
    /// Application sends data at a specific time
    AppSend { time: u64, data: String },
    /// Deterministically drop the first packet sent by Sender with given seq number
    DropNextFromSenderSeq { seq: u32 },
    /// Deterministically drop the first ACK sent by Receiver with given ack number
    DropNextFromReceiverAck { ack: u32 },
    /// Deterministically break the checksum of the first packet sent by Sender with given seq number
    CorruptNextFromSenderSeq { seq: u32 },
}

#[derive(Deserialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TestAssertion {
    /// Assert that specific data was delivered to the application layer
    DataDelivered { data: String },
    /// Assert that exactly this sequence of payloads was delivered, in order
    DeliveredInOrder { data: Vec<String> },
    /// Assert that the total number of packets sent by Sender is within range
    SenderPacketCount { min: u32, max: Option<u32> },
    /// Assert that the sender's retransmission count is within range
    Retransmissions { min: u64, max: Option<u64> },
    /// Assert that simulation finishes within time
    MaxDuration { ms: u64 },
}
