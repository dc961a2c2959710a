use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Number of application messages the generator emits.
    pub num_messages: u32,
    pub loss_rate: f64,
    pub corrupt_rate: f64,
    /// Mean time between generated application messages.
    pub avg_msg_delay: u64,
    /// 0 = report only, 1 = protocol events, 2+ = everything.
    pub trace_level: u8,
    pub seed: u64,
    pub window_size: u32,
    /// Retransmission timeout.
    pub rxmt_timeout: u64,
    pub min_latency: u64,
    pub max_latency: u64,
    /// Simulated time after which a run is cut off.
    pub time_limit: u64,
    /// Number of repeated ACKs that triggers a fast retransmit.
    pub dup_ack_threshold: u32,
    /// Pending messages the sender accepts before aborting the run.
    pub max_buffered_messages: usize,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            num_messages: 10,
            loss_rate: 0.0,
            corrupt_rate: 0.0,
            avg_msg_delay: 1000,
            trace_level: 0,
            seed: 0,
            window_size: 8,
            rxmt_timeout: 15,
            min_latency: 1,
            max_latency: 10,
            time_limit: 10_000_000,
            dup_ack_threshold: 1,
            max_buffered_messages: 100_000_000,
        }
    }
}

impl SimConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.window_size == 0 {
            return Err(ConfigError::ZeroWindow);
        }
        if self.window_size > u32::MAX / 2 {
            return Err(ConfigError::WindowTooLarge(self.window_size));
        }
        for (name, value) in [("loss", self.loss_rate), ("corruption", self.corrupt_rate)] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::Probability { name, value });
            }
        }
        if self.rxmt_timeout == 0 {
            return Err(ConfigError::ZeroTimeout);
        }
        if self.avg_msg_delay == 0 {
            return Err(ConfigError::ZeroMessageDelay);
        }
        if self.min_latency > self.max_latency {
            return Err(ConfigError::LatencyRange {
                min: self.min_latency,
                max: self.max_latency,
            });
        }
        if self.dup_ack_threshold == 0 {
            return Err(ConfigError::ZeroDupAckThreshold);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = SimConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_bad_parameters() {
        let config = SimConfig {
            window_size: 0,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::ZeroWindow));

        let config = SimConfig {
            loss_rate: 1.5,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Probability { name: "loss", .. })
        ));

        let config = SimConfig {
            min_latency: 20,
            max_latency: 10,
            ..Default::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::LatencyRange { min: 20, max: 10 })
        );
    }
}
