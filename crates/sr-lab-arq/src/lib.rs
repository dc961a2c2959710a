//! Selective-Repeat sender and receiver entities.
//!
//! Both entities are driven purely through [`TransportProtocol`] callbacks and talk to
//! each other only through packets handed to the
//! [`SystemContext`](sr_lab_abstract::SystemContext).

pub mod receiver;
pub mod sender;
pub mod seq;

#[cfg(test)]
mod testing;

use sr_lab_abstract::{ConfigError, SimConfig, TransportProtocol};

pub use receiver::SrReceiver;
pub use sender::SrSender;
pub use seq::SeqSpace;

/// Build a matching sender/receiver pair for the given configuration.
pub fn sr_pair(
    config: &SimConfig,
) -> Result<(Box<dyn TransportProtocol>, Box<dyn TransportProtocol>), ConfigError> {
    let sender = SrSender::new(config)?;
    let receiver = SrReceiver::new(config)?;
    Ok((Box::new(sender), Box::new(receiver)))
}
