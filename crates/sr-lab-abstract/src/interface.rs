use crate::error::ProtocolError;
use crate::packet::{Message, Packet};
use crate::stats::Statistics;

/// The capability provided by the simulator to a protocol entity.
/// Each callback receives a context already bound to the calling entity, so none of
/// these methods take an entity id.
pub trait SystemContext {
    /// Hand a packet to the unreliable channel toward the peer entity.
    fn send_packet(&mut self, packet: Packet);

    /// Arm the entity's single retransmission timer.
    /// Starting an armed timer is a protocol bug: always `stop_timer` first.
    fn start_timer(&mut self, delay: u64);

    /// Cancel the entity's timer. Stopping an idle timer is harmless.
    fn stop_timer(&mut self);

    /// Deliver reassembled data to the application layer.
    fn deliver_data(&mut self, data: &str);

    /// Log a message to the simulator's debug output.
    fn log(&mut self, message: &str);

    /// Current simulated time.
    fn now(&self) -> u64;
}

/// The interface a protocol entity implements to be driven by the simulator.
pub trait TransportProtocol {
    /// Called when the simulation starts.
    fn init(&mut self, _ctx: &mut dyn SystemContext) {}

    /// Called when a packet arrives from the channel.
    fn on_packet(&mut self, ctx: &mut dyn SystemContext, packet: Packet);

    /// Called when the entity's timer expires.
    fn on_timer(&mut self, ctx: &mut dyn SystemContext);

    /// Called when the application layer wants to send a message reliably.
    /// An error is fatal and ends the simulation.
    fn on_app_data(
        &mut self,
        ctx: &mut dyn SystemContext,
        message: Message,
    ) -> Result<(), ProtocolError>;

    /// Counters accumulated by this entity so far.
    fn statistics(&self) -> Statistics {
        Statistics::default()
    }
}
