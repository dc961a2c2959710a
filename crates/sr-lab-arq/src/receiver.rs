use std::collections::BTreeMap;

use sr_lab_abstract::{
    ConfigError, Message, Packet, ProtocolError, SimConfig, Statistics, SystemContext,
    TransportProtocol,
};

use crate::seq::SeqSpace;

/// Selective-Repeat receiving entity.
pub struct SrReceiver {
    space: SeqSpace,
    expected_seq: u32,
    /// Out-of-order arrivals inside `[expected_seq, expected_seq + window)`.
    buffer: BTreeMap<u32, Packet>,
    /// Sequence number stamped on outgoing ACKs, independent of the data stream.
    ack_seq: u32,
    stats: Statistics,
}

impl SrReceiver {
    pub fn new(config: &SimConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            space: SeqSpace::new(config.window_size)?,
            expected_seq: 0,
            buffer: BTreeMap::new(),
            ack_seq: 0,
            stats: Statistics::default(),
        })
    }

    pub fn expected_seq(&self) -> u32 {
        self.expected_seq
    }

    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    fn last_in_order(&self) -> u32 {
        self.space.prev(self.expected_seq)
    }

    fn deliver(&mut self, ctx: &mut dyn SystemContext, payload: &str) {
        ctx.deliver_data(payload);
        self.stats.delivered += 1;
        self.expected_seq = self.space.next(self.expected_seq);
    }

    fn send_ack(&mut self, ctx: &mut dyn SystemContext) {
        let ack = self.last_in_order();
        ctx.log(&format!("SR send ACK {} (seq={})", ack, self.ack_seq));
        ctx.send_packet(Packet::new_ack(self.ack_seq, ack));
        self.stats.acks_sent += 1;
    }

    pub fn receive(&mut self, ctx: &mut dyn SystemContext, packet: Packet) {
        if packet.is_corrupted(self.space.limit()) {
            self.stats.corrupted += 1;
            ctx.log(&format!(
                "SR received corrupted packet (checksum {}), dropping",
                packet.checksum
            ));
            return;
        }

        let seq = packet.seq_num;
        if seq == self.expected_seq {
            self.deliver(ctx, &packet.payload);
            let mut shift = 1;
            while let Some(buffered) = self.buffer.remove(&self.expected_seq) {
                self.deliver(ctx, &buffered.payload);
                shift += 1;
            }
            ctx.log(&format!(
                "SR received seq={}, delivered {} expected={}",
                seq, shift, self.expected_seq
            ));
            self.send_ack(ctx);
            self.ack_seq = self.space.next(self.ack_seq);
        } else if self.space.in_window(self.expected_seq, seq) {
            if !self.buffer.contains_key(&seq) {
                ctx.log(&format!(
                    "SR buffered out-of-order seq={} expected={}",
                    seq, self.expected_seq
                ));
                self.buffer.insert(seq, packet);
            }
            self.send_ack(ctx);
        } else {
            ctx.log(&format!(
                "SR duplicate or out-of-window seq={} expected={}, re-ACK",
                seq, self.expected_seq
            ));
            self.send_ack(ctx);
        }
    }
}

impl TransportProtocol for SrReceiver {
    fn init(&mut self, ctx: &mut dyn SystemContext) {
        ctx.log("SR receiver ready");
    }

    fn on_packet(&mut self, ctx: &mut dyn SystemContext, packet: Packet) {
        self.receive(ctx, packet);
    }

    fn on_timer(&mut self, _ctx: &mut dyn SystemContext) {}

    fn on_app_data(
        &mut self,
        _ctx: &mut dyn SystemContext,
        _message: Message,
    ) -> Result<(), ProtocolError> {
        Ok(())
    }

    fn statistics(&self) -> Statistics {
        self.stats.clone()
    }
}
