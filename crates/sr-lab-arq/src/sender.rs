use std::collections::{BTreeMap, VecDeque};

use sr_lab_abstract::{
    ConfigError, Message, Packet, ProtocolError, SimConfig, Statistics, SystemContext,
    TransportProtocol,
};
use tracing::error;

use crate::seq::SeqSpace;

/// An unacknowledged packet and what is needed to time it.
#[derive(Debug, Clone)]
struct InFlight {
    packet: Packet,
    sent_at: u64,
    /// Cleared on the first retransmission; only originals yield RTT samples.
    original: bool,
}

/// Selective-Repeat sending entity.
///
/// The retransmission timer is restarted on every transmission, so its deadline tracks
/// the newest packet sent rather than the oldest outstanding one.
pub struct SrSender {
    space: SeqSpace,
    timeout: u64,
    dup_ack_threshold: u32,
    max_buffered: usize,

    base: u32,
    next_seq: u32,
    window: BTreeMap<u32, InFlight>,
    pending: VecDeque<Message>,

    last_ack: Option<u32>,
    dup_ack_count: u32,

    stats: Statistics,
}

impl SrSender {
    pub fn new(config: &SimConfig) -> Result<Self, ConfigError> {
        if config.dup_ack_threshold == 0 {
            return Err(ConfigError::ZeroDupAckThreshold);
        }
        Ok(Self {
            space: SeqSpace::new(config.window_size)?,
            timeout: config.rxmt_timeout,
            dup_ack_threshold: config.dup_ack_threshold,
            max_buffered: config.max_buffered_messages,
            base: 0,
            next_seq: 0,
            window: BTreeMap::new(),
            pending: VecDeque::new(),
            last_ack: None,
            dup_ack_count: 0,
            stats: Statistics::default(),
        })
    }

    /// Oldest unacknowledged sequence number.
    pub fn base(&self) -> u32 {
        self.base
    }

    pub fn next_seq(&self) -> u32 {
        self.next_seq
    }

    pub fn in_flight(&self) -> usize {
        self.window.len()
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Queue a message and push as much of the queue as the window allows.
    pub fn submit(
        &mut self,
        ctx: &mut dyn SystemContext,
        message: Message,
    ) -> Result<(), ProtocolError> {
        if self.pending.len() >= self.max_buffered {
            error!(
                capacity = self.max_buffered,
                "sender buffer full, aborting simulation"
            );
            return Err(ProtocolError::SendBufferFull {
                capacity: self.max_buffered,
            });
        }
        self.pending.push_back(message);
        ctx.log(&format!(
            "SR buffered message, {} pending",
            self.pending.len()
        ));
        self.try_send(ctx);
        Ok(())
    }

    fn try_send(&mut self, ctx: &mut dyn SystemContext) {
        while self.space.in_window(self.base, self.next_seq) {
            let Some(message) = self.pending.pop_front() else {
                break;
            };
            let seq = self.next_seq;
            let packet = Packet::new_data(seq, message.into_data());
            self.window.insert(
                seq,
                InFlight {
                    packet: packet.clone(),
                    sent_at: ctx.now(),
                    original: true,
                },
            );
            ctx.log(&format!(
                "SR send seq={} ({} bytes) base={}",
                seq,
                packet.len(),
                self.base
            ));
            ctx.send_packet(packet);
            self.stats.original_packets += 1;
            self.next_seq = self.space.next(seq);
            self.restart_timer(ctx);
        }
    }

    fn restart_timer(&self, ctx: &mut dyn SystemContext) {
        ctx.stop_timer();
        ctx.start_timer(self.timeout);
    }

    /// Resend the packet at `base`. Returns false when the window is already empty.
    fn retransmit_base(&mut self, ctx: &mut dyn SystemContext, reason: &str) -> bool {
        let Some(entry) = self.window.get_mut(&self.base) else {
            ctx.log(&format!(
                "SR {} with nothing outstanding at base={}, ignoring",
                reason, self.base
            ));
            return false;
        };
        entry.original = false;
        let packet = entry.packet.clone();
        ctx.log(&format!(
            "SR {}, retransmitting seq={}",
            reason, packet.seq_num
        ));
        ctx.send_packet(packet);
        self.stats.retransmissions += 1;
        self.restart_timer(ctx);
        true
    }

    pub fn on_ack(&mut self, ctx: &mut dyn SystemContext, packet: Packet) {
        if packet.is_corrupted(self.space.limit()) {
            self.stats.corrupted += 1;
            ctx.log("SR received corrupted ACK, dropping");
            return;
        }
        let Some(ack) = packet.ack_num else {
            ctx.log(&format!(
                "SR ignoring non-ACK packet seq={}",
                packet.seq_num
            ));
            return;
        };

        if self.last_ack == Some(ack) {
            self.dup_ack_count += 1;
            ctx.log(&format!(
                "SR duplicate ACK {} (#{})",
                ack, self.dup_ack_count
            ));
            if self.dup_ack_count == self.dup_ack_threshold {
                self.retransmit_base(ctx, "duplicate ACK");
            }
            return;
        }
        self.last_ack = Some(ack);
        self.dup_ack_count = 0;

        // Only ACKs for packets actually sent move the window.
        let outstanding = self.space.distance(self.base, self.next_seq);
        if self.space.distance(self.base, ack) >= outstanding {
            ctx.log(&format!(
                "SR ACK {} outside outstanding range [{}, {}), ignoring",
                ack, self.base, self.next_seq
            ));
            return;
        }

        let old_base = self.base;
        self.base = self.space.next(ack);
        ctx.log(&format!(
            "SR received ACK {}, window shift {} base={}",
            ack,
            self.space.distance(old_base, self.base),
            self.base
        ));

        let acked: Vec<u32> = self
            .window
            .keys()
            .copied()
            .filter(|&seq| self.space.is_le(seq, ack))
            .collect();
        let now = ctx.now();
        for seq in acked {
            if let Some(entry) = self.window.remove(&seq) {
                let elapsed = now.saturating_sub(entry.sent_at);
                self.stats.record_comm_time(elapsed);
                if entry.original {
                    self.stats.record_rtt(elapsed);
                }
            }
        }

        if self.base == self.next_seq {
            ctx.stop_timer();
        } else {
            self.restart_timer(ctx);
        }
        self.try_send(ctx);
    }

    pub fn on_timeout(&mut self, ctx: &mut dyn SystemContext) {
        self.retransmit_base(ctx, "timeout");
    }
}

impl TransportProtocol for SrSender {
    fn init(&mut self, ctx: &mut dyn SystemContext) {
        ctx.log(&format!(
            "SR sender ready (window={}, seq space={})",
            self.space.window_size(),
            self.space.limit()
        ));
    }

    fn on_packet(&mut self, ctx: &mut dyn SystemContext, packet: Packet) {
        self.on_ack(ctx, packet);
    }

    fn on_timer(&mut self, ctx: &mut dyn SystemContext) {
        self.on_timeout(ctx);
    }

    fn on_app_data(
        &mut self,
        ctx: &mut dyn SystemContext,
        message: Message,
    ) -> Result<(), ProtocolError> {
        self.submit(ctx, message)
    }

    fn statistics(&self) -> Statistics {
        self.stats.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingContext;

    fn sender(window_size: u32) -> SrSender {
        let config = SimConfig {
            window_size,
            ..Default::default()
        };
        SrSender::new(&config).unwrap()
    }

    fn submit_all(s: &mut SrSender, ctx: &mut RecordingContext, payloads: &[&str]) {
        for p in payloads {
            s.submit(ctx, Message::new(*p)).unwrap();
        }
    }

    #[test]
    fn fills_window_then_buffers() {
        let mut s = sender(2);
        let mut ctx = RecordingContext::default();
        submit_all(&mut s, &mut ctx, &["a", "b", "c"]);

        let sent = ctx.take_sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].seq_num, 0);
        assert_eq!(sent[1].seq_num, 1);
        assert!(sent.iter().all(|p| p.ack_num.is_none()));
        assert_eq!(s.in_flight(), 2);
        assert_eq!(s.pending(), 1);
        // Timer restarted once per transmission.
        assert_eq!(ctx.timer_starts, 2);
        assert!(ctx.timer_armed);
    }

    #[test]
    fn cumulative_ack_slides_window_and_sends_buffered() {
        let mut s = sender(2);
        let mut ctx = RecordingContext::default();
        submit_all(&mut s, &mut ctx, &["a", "b", "c", "d"]);
        ctx.take_sent();

        ctx.now = 12;
        s.on_ack(&mut ctx, Packet::new_ack(0, 1));
        assert_eq!(s.base(), 2);
        let sent = ctx.take_sent();
        assert_eq!(
            sent.iter().map(|p| p.seq_num).collect::<Vec<_>>(),
            vec![2, 3]
        );
        assert_eq!(s.statistics().rtt_count, 2);
        assert_eq!(s.statistics().comm_time_count, 2);
        assert_eq!(s.statistics().average_rtt(), 12.0);
    }

    #[test]
    fn final_ack_stops_timer() {
        let mut s = sender(4);
        let mut ctx = RecordingContext::default();
        submit_all(&mut s, &mut ctx, &["a", "b"]);
        s.on_ack(&mut ctx, Packet::new_ack(0, 1));
        assert_eq!(s.in_flight(), 0);
        assert!(!ctx.timer_armed);
    }

    #[test]
    fn window_never_exceeds_window_size_across_wraparound() {
        let mut s = sender(3);
        let mut ctx = RecordingContext::default();
        let payloads: Vec<String> = (0..20).map(|i| format!("m{i}")).collect();
        for p in &payloads {
            s.submit(&mut ctx, Message::new(p.clone())).unwrap();
            assert!(s.in_flight() <= 3);
        }
        let mut ack_seq = 0;
        while s.in_flight() > 0 {
            let ack = s.base();
            s.on_ack(&mut ctx, Packet::new_ack(ack_seq, ack));
            ack_seq = (ack_seq + 1) % 6;
            assert!(s.in_flight() <= 3);
        }
        let sent = ctx.take_sent();
        assert_eq!(sent.len(), 20);
        assert!(sent.iter().all(|p| p.seq_num < 6));
        assert_eq!(s.statistics().retransmissions, 0);
    }

    #[test]
    fn fast_retransmit_on_first_duplicate_only() {
        let mut s = sender(4);
        let mut ctx = RecordingContext::default();
        submit_all(&mut s, &mut ctx, &["a", "b", "c"]);
        ctx.take_sent();

        s.on_ack(&mut ctx, Packet::new_ack(0, 0));
        assert!(ctx.take_sent().is_empty());

        s.on_ack(&mut ctx, Packet::new_ack(1, 0));
        let resent = ctx.take_sent();
        assert_eq!(resent.len(), 1);
        assert_eq!(resent[0].seq_num, 1);
        assert_eq!(resent[0].payload, "b");

        s.on_ack(&mut ctx, Packet::new_ack(2, 0));
        assert!(ctx.take_sent().is_empty());
        assert_eq!(s.statistics().retransmissions, 1);
    }

    #[test]
    fn configurable_dup_ack_threshold() {
        let config = SimConfig {
            window_size: 4,
            dup_ack_threshold: 3,
            ..Default::default()
        };
        let mut s = SrSender::new(&config).unwrap();
        let mut ctx = RecordingContext::default();
        submit_all(&mut s, &mut ctx, &["a", "b"]);
        ctx.take_sent();

        for _ in 0..3 {
            s.on_ack(&mut ctx, Packet::new_ack(0, 0));
            assert!(ctx.take_sent().is_empty());
        }
        s.on_ack(&mut ctx, Packet::new_ack(0, 0));
        assert_eq!(ctx.take_sent().len(), 1);
    }

    #[test]
    fn duplicate_with_empty_window_is_noop() {
        let mut s = sender(2);
        let mut ctx = RecordingContext::default();
        submit_all(&mut s, &mut ctx, &["a"]);
        s.on_ack(&mut ctx, Packet::new_ack(0, 0));
        ctx.take_sent();
        s.on_ack(&mut ctx, Packet::new_ack(0, 0));
        assert!(ctx.take_sent().is_empty());
        assert_eq!(s.statistics().retransmissions, 0);
    }

    #[test]
    fn timeout_retransmits_base_and_drops_rtt_sample() {
        let mut s = sender(2);
        let mut ctx = RecordingContext::default();
        submit_all(&mut s, &mut ctx, &["a", "b"]);
        ctx.take_sent();

        ctx.now = 15;
        ctx.expire_timer();
        s.on_timeout(&mut ctx);
        let resent = ctx.take_sent();
        assert_eq!(resent.len(), 1);
        assert_eq!(resent[0].seq_num, 0);
        assert!(ctx.timer_armed);

        ctx.now = 20;
        s.on_ack(&mut ctx, Packet::new_ack(0, 1));
        let stats = s.statistics();
        assert_eq!(stats.retransmissions, 1);
        // seq 0 was retransmitted, seq 1 was not.
        assert_eq!(stats.rtt_count, 1);
        assert_eq!(stats.comm_time_count, 2);
        assert_eq!(stats.comm_time_total, 40.0);
    }

    #[test]
    fn timeout_with_empty_window_is_noop() {
        let mut s = sender(2);
        let mut ctx = RecordingContext::default();
        s.on_timeout(&mut ctx);
        assert!(ctx.sent.is_empty());
        assert!(!ctx.timer_armed);
    }

    #[test]
    fn corrupted_ack_is_counted_and_ignored() {
        let mut s = sender(2);
        let mut ctx = RecordingContext::default();
        submit_all(&mut s, &mut ctx, &["a"]);

        let mut ack = Packet::new_ack(0, 0);
        ack.checksum = 1;
        s.on_ack(&mut ctx, ack);
        assert_eq!(s.statistics().corrupted, 1);
        assert_eq!(s.base(), 0);

        let mut ack = Packet::new_ack(0, 0);
        ack.ack_num = Some(999_999);
        s.on_ack(&mut ctx, ack);
        assert_eq!(s.statistics().corrupted, 2);
        assert_eq!(s.in_flight(), 1);
    }

    #[test]
    fn stale_ack_outside_window_is_ignored() {
        let mut s = sender(2);
        let mut ctx = RecordingContext::default();
        submit_all(&mut s, &mut ctx, &["a", "b"]);
        // seq space is 4, window [0, 2): ack 3 is the previous cycle.
        s.on_ack(&mut ctx, Packet::new_ack(0, 3));
        assert_eq!(s.base(), 0);
        assert_eq!(s.in_flight(), 2);
    }

    #[test]
    fn ack_for_unsent_seq_is_ignored() {
        let mut s = sender(4);
        let mut ctx = RecordingContext::default();
        submit_all(&mut s, &mut ctx, &["a"]);
        ctx.take_sent();

        // 2 is inside [base, base + W) but was never sent.
        s.on_ack(&mut ctx, Packet::new_ack(0, 2));
        assert_eq!(s.base(), 0);
        assert_eq!(s.next_seq(), 1);
        assert_eq!(s.in_flight(), 1);
        assert_eq!(s.statistics().comm_time_count, 0);
        assert!(ctx.timer_armed);

        submit_all(&mut s, &mut ctx, &["b"]);
        let sent = ctx.take_sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].seq_num, 1);

        ctx.expire_timer();
        s.on_timeout(&mut ctx);
        assert_eq!(ctx.take_sent()[0].seq_num, 0);

        s.on_ack(&mut ctx, Packet::new_ack(1, 1));
        assert_eq!(s.base(), 2);
        assert_eq!(s.next_seq(), 2);
        assert_eq!(s.in_flight(), 0);
    }

    #[test]
    fn buffer_full_is_fatal() {
        let config = SimConfig {
            window_size: 1,
            max_buffered_messages: 2,
            ..Default::default()
        };
        let mut s = SrSender::new(&config).unwrap();
        let mut ctx = RecordingContext::default();
        // First message goes straight into the window.
        submit_all(&mut s, &mut ctx, &["a", "b", "c"]);
        assert_eq!(
            s.submit(&mut ctx, Message::new("d")),
            Err(ProtocolError::SendBufferFull { capacity: 2 })
        );
    }
}
