pub mod config;
pub mod error;
pub mod interface;
pub mod packet;
pub mod scenario;
pub mod stats;

pub use interface::{SystemContext, TransportProtocol};
pub use packet::{Message, Packet, checksum};

pub use config::SimConfig;
pub use error::{ConfigError, ProtocolError};
pub use scenario::{SimConfigOverride, TestAction, TestAssertion, TestScenario};
pub use stats::Statistics;
