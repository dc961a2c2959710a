use thiserror::Error;

/// Fatal conditions raised by a protocol entity.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("send buffer full: {capacity} messages already pending")]
    SendBufferFull { capacity: usize },
}

/// Rejected simulation parameters.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("window size must be greater than zero")]
    ZeroWindow,
    #[error("window size {0} is too large for the sequence space")]
    WindowTooLarge(u32),
    #[error("{name} probability {value} is outside [0, 1]")]
    Probability { name: &'static str, value: f64 },
    #[error("retransmission timeout must be greater than zero")]
    ZeroTimeout,
    #[error("average message delay must be greater than zero")]
    ZeroMessageDelay,
    #[error("latency range {min}..={max} is empty")]
    LatencyRange { min: u64, max: u64 },
    #[error("duplicate ACK threshold must be at least 1")]
    ZeroDupAckThreshold,
}
