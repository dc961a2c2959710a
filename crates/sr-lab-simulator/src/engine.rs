use crate::trace::SimulationReport;
use rand::Rng;
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};
use sr_lab_abstract::{ConfigError, Message, Packet, ProtocolError, SimConfig, Statistics};
use sr_lab_abstract::{SystemContext, TransportProtocol};
use tracing::{debug, info, warn};

/// Out-of-range value written into a sequence or ACK field by the channel.
const CORRUPT_NUM: u32 = 999_999;
/// Length of generated application messages.
const MESSAGE_LEN: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum NodeId {
    Sender,
    Receiver,
}

impl NodeId {
    pub fn peer(&self) -> Self {
        match self {
            NodeId::Sender => NodeId::Receiver,
            NodeId::Receiver => NodeId::Sender,
        }
    }
}

#[derive(Debug)]
pub enum EventType {
    PacketArrival { to: NodeId, packet: Packet },
    TimerExpiry { node: NodeId, generation: u64 },
    AppSend { message: Message },
}

#[derive(Debug)]
struct Event {
    time: u64,
    event_type: EventType,
    id: u64, // Unique ID to differentiate events at same time
}

// Custom Ord for Min-Heap (smallest time pops first)
impl PartialEq for Event {
    fn eq(&self, other: &Self) -> bool {
        self.time == other.time && self.id == other.id
    }
}

impl Eq for Event {}

impl PartialOrd for Event {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Event {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse comparison for time: smallest time is Greater in BinaryHeap
        other
            .time
            .cmp(&self.time)
            .then_with(|| other.id.cmp(&self.id))
    }
}

/// A compact textual summary of important link-layer events.
#[derive(Debug, Clone, Serialize)]
pub struct LinkEventSummary {
    pub time: u64,
    pub description: String,
}

#[derive(Debug, Clone, Copy)]
enum TimerOp {
    Start(u64),
    Stop,
}

/// Actions buffered during a protocol callback
#[derive(Default)]
struct ActionBuffer {
    outgoing_packets: Vec<Packet>,
    // Applied in call order: stop-then-start must not become start-then-stop.
    timer_ops: Vec<TimerOp>,
    logs: Vec<String>,
    delivered_data: Vec<String>,
}

/// Context implementation passed to the protocol entity
struct ScopedContext<'a> {
    buffer: &'a mut ActionBuffer,
    now: u64,
}

impl<'a> SystemContext for ScopedContext<'a> {
    fn send_packet(&mut self, packet: Packet) {
        self.buffer.outgoing_packets.push(packet);
    }

    fn start_timer(&mut self, delay: u64) {
        self.buffer.timer_ops.push(TimerOp::Start(delay));
    }

    fn stop_timer(&mut self) {
        self.buffer.timer_ops.push(TimerOp::Stop);
    }

    fn deliver_data(&mut self, data: &str) {
        self.buffer.delivered_data.push(data.to_string());
    }

    fn log(&mut self, message: &str) {
        self.buffer.logs.push(message.to_string());
    }

    fn now(&self) -> u64 {
        self.now
    }
}

/// Per-node logical timer. A stop or a superseding start bumps the generation so the
/// already-queued expiry event is recognised as stale.
#[derive(Debug, Default, Clone, Copy)]
struct TimerState {
    generation: u64,
    armed: bool,
}

pub struct Simulator {
    time: u64,
    event_queue: BinaryHeap<Event>,
    event_id_counter: u64,

    config: SimConfig,
    rng: rand::rngs::StdRng,

    pub sender: Box<dyn TransportProtocol>,
    pub receiver: Box<dyn TransportProtocol>,

    pub delivered_data: Vec<String>,
    pub sender_packet_count: u32,

    // Deterministic fault injection: drop first packet from Sender with given seq numbers
    drop_sender_seq_once: Vec<u32>,
    // Deterministic fault injection: drop first ACK from Receiver with given ack numbers
    drop_receiver_ack_once: Vec<u32>,
    // Deterministic fault injection: break the checksum of first packet from Sender with given seq
    corrupt_sender_seq_once: Vec<u32>,

    /// Timeline of link events (drops, corruptions, sends, deliveries).
    pub link_events: Vec<LinkEventSummary>,

    timers: HashMap<NodeId, TimerState>,
    /// Latest scheduled arrival per destination, used to keep each direction FIFO.
    last_arrival: HashMap<NodeId, u64>,
    /// Starts issued while the timer was already armed.
    pub timer_overlaps: u32,
}

impl Simulator {
    /// Fails if `config` does not validate; the channel relies on a sane latency range.
    pub fn new(
        config: SimConfig,
        sender: Box<dyn TransportProtocol>,
        receiver: Box<dyn TransportProtocol>,
    ) -> Result<Self, ConfigError> {
        use rand::SeedableRng;
        config.validate()?;
        let rng = rand::rngs::StdRng::seed_from_u64(config.seed);

        Ok(Self {
            time: 0,
            event_queue: BinaryHeap::new(),
            event_id_counter: 0,
            config,
            rng,
            sender,
            receiver,
            delivered_data: Vec::new(),
            sender_packet_count: 0,
            drop_sender_seq_once: Vec::new(),
            drop_receiver_ack_once: Vec::new(),
            corrupt_sender_seq_once: Vec::new(),
            link_events: Vec::new(),
            timers: HashMap::new(),
            last_arrival: HashMap::new(),
            timer_overlaps: 0,
        })
    }

    /// Register a deterministic fault: drop the first packet sent by Sender whose seq equals `seq`.
    pub fn add_drop_sender_seq_once(&mut self, seq: u32) {
        self.drop_sender_seq_once.push(seq);
    }

    /// Register a deterministic fault: drop the first ACK sent by Receiver whose ack equals `ack`.
    pub fn add_drop_receiver_ack_once(&mut self, ack: u32) {
        self.drop_receiver_ack_once.push(ack);
    }

    /// Register a deterministic fault: corrupt the checksum of the first packet sent by
    /// Sender whose seq equals `seq`.
    pub fn add_corrupt_sender_seq_once(&mut self, seq: u32) {
        self.corrupt_sender_seq_once.push(seq);
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    fn push_event(&mut self, time: u64, event_type: EventType) {
        self.event_queue.push(Event {
            time,
            event_type,
            id: self.event_id_counter,
        });
        self.event_id_counter += 1;
    }

    pub fn schedule_app_send(&mut self, time: u64, data: impl Into<String>) {
        self.push_event(
            time,
            EventType::AppSend {
                message: Message::new(data),
            },
        );
    }

    /// Schedule `num_messages` generated payloads (`aaaa…`, `bbbb…`, …) with
    /// inter-arrival times uniform in `[0, 2 * avg_msg_delay]`.
    pub fn schedule_generated_messages(&mut self) {
        let mut time = self.time;
        let spread = self.config.avg_msg_delay.saturating_mul(2);
        for i in 0..self.config.num_messages {
            time += self.rng.random_range(0..=spread);
            let letter = char::from(b'a' + (i % 26) as u8);
            let data: String = std::iter::repeat_n(letter, MESSAGE_LEN).collect();
            self.schedule_app_send(time, data);
        }
    }

    pub fn init(&mut self) {
        {
            let mut buffer = ActionBuffer::default();
            let mut ctx = ScopedContext {
                buffer: &mut buffer,
                now: self.time,
            };
            self.sender.init(&mut ctx);
            self.process_actions(NodeId::Sender, buffer);
        }
        {
            let mut buffer = ActionBuffer::default();
            let mut ctx = ScopedContext {
                buffer: &mut buffer,
                now: self.time,
            };
            self.receiver.init(&mut ctx);
            self.process_actions(NodeId::Receiver, buffer);
        }
    }

    pub fn peek_next_event_time(&self) -> Option<u64> {
        self.event_queue.peek().map(|e| e.time)
    }

    pub fn current_time(&self) -> u64 {
        self.time
    }

    pub fn remaining_events(&self) -> usize {
        self.event_queue.len()
    }

    /// Whether the node's timer is currently armed.
    pub fn timer_pending(&self, node: NodeId) -> bool {
        self.timers.get(&node).is_some_and(|t| t.armed)
    }

    /// Combined sender and receiver counters.
    pub fn statistics(&self) -> Statistics {
        self.sender
            .statistics()
            .merge(&self.receiver.statistics())
    }

    /// Process the next event. Returns `Ok(false)` once the queue is empty; a protocol
    /// error is fatal and the run should stop.
    pub fn step(&mut self) -> Result<bool, ProtocolError> {
        let event = match self.event_queue.pop() {
            Some(e) => e,
            None => return Ok(false),
        };

        self.time = event.time;
        debug!("Processing event at {}: {:?}", self.time, event.event_type);

        match event.event_type {
            EventType::PacketArrival { to, packet } => {
                let mut buffer = ActionBuffer::default();
                {
                    let mut ctx = ScopedContext {
                        buffer: &mut buffer,
                        now: self.time,
                    };
                    match to {
                        NodeId::Sender => self.sender.on_packet(&mut ctx, packet),
                        NodeId::Receiver => self.receiver.on_packet(&mut ctx, packet),
                    }
                }
                self.process_actions(to, buffer);
            }
            EventType::TimerExpiry { node, generation } => {
                let timer = self.timers.entry(node).or_default();
                if !timer.armed || timer.generation != generation {
                    debug!("Skipping stale timer event for {:?}", node);
                    return Ok(true);
                }
                timer.armed = false;

                let mut buffer = ActionBuffer::default();
                {
                    let mut ctx = ScopedContext {
                        buffer: &mut buffer,
                        now: self.time,
                    };
                    match node {
                        NodeId::Sender => self.sender.on_timer(&mut ctx),
                        NodeId::Receiver => self.receiver.on_timer(&mut ctx),
                    }
                }
                self.process_actions(node, buffer);
            }
            EventType::AppSend { message } => {
                let mut buffer = ActionBuffer::default();
                let result = {
                    let mut ctx = ScopedContext {
                        buffer: &mut buffer,
                        now: self.time,
                    };
                    self.sender.on_app_data(&mut ctx, message)
                };
                self.process_actions(NodeId::Sender, buffer);
                result?;
            }
        }
        Ok(true)
    }

    /// Produce a serializable snapshot of the current simulation state.
    pub fn export_report(&self) -> SimulationReport {
        SimulationReport {
            config: self.config.clone(),
            duration: self.time,
            delivered_data: self.delivered_data.clone(),
            sender_packet_count: self.sender_packet_count,
            statistics: self.statistics(),
            link_events: self.link_events.clone(),
        }
    }

    /// Run until the event queue drains or the next event lies past `time_limit`.
    pub fn run_until_complete(&mut self) -> Result<(), ProtocolError> {
        self.init();
        while let Some(next) = self.peek_next_event_time() {
            if next > self.config.time_limit {
                warn!(
                    "Stopping at time limit {} with {} events pending",
                    self.config.time_limit,
                    self.remaining_events()
                );
                break;
            }
            self.step()?;
        }
        Ok(())
    }

    fn apply_timer_op(&mut self, node: NodeId, op: TimerOp) {
        let timer = self.timers.entry(node).or_default();
        match op {
            TimerOp::Stop => {
                if timer.armed {
                    timer.generation += 1;
                    timer.armed = false;
                }
            }
            TimerOp::Start(delay) => {
                if timer.armed {
                    warn!("[{:?}] timer started while already armed", node);
                    timer.generation += 1;
                    self.timer_overlaps += 1;
                }
                timer.armed = true;
                let generation = timer.generation;
                self.push_event(self.time + delay, EventType::TimerExpiry { node, generation });
            }
        }
    }

    fn record_link_event(&mut self, description: String) {
        self.link_events.push(LinkEventSummary {
            time: self.time,
            description,
        });
    }

    fn corrupt(&mut self, packet: &mut Packet) {
        let roll = self.rng.random::<f64>();
        if roll < 0.75 && !packet.payload.is_empty() {
            let replacement = if packet.payload.starts_with('Z') { "z" } else { "Z" };
            let first = packet.payload.chars().next().map_or(0, char::len_utf8);
            packet.payload.replace_range(..first, replacement);
        } else if roll < 0.875 {
            packet.seq_num = CORRUPT_NUM;
        } else {
            packet.ack_num = Some(CORRUPT_NUM);
        }
    }

    fn process_actions(&mut self, source_node: NodeId, buffer: ActionBuffer) {
        for log in buffer.logs {
            debug!("[{:?}] {}", source_node, log);
        }

        for data in buffer.delivered_data {
            info!("[{:?}] DELIVERED DATA: {} bytes", source_node, data.len());
            self.record_link_event(format!(
                "[{:?}] DELIVERED {} bytes to application",
                source_node,
                data.len()
            ));
            self.delivered_data.push(data);
        }

        for op in buffer.timer_ops {
            self.apply_timer_op(source_node, op);
        }

        // Packet transmission logic (Channel)
        for mut packet in buffer.outgoing_packets {
            if source_node == NodeId::Sender {
                self.sender_packet_count += 1;

                if let Some(pos) = self
                    .drop_sender_seq_once
                    .iter()
                    .position(|s| *s == packet.seq_num)
                {
                    self.record_link_event(format!(
                        "[Sender->Receiver] DROP (deterministic seq) seq={}",
                        packet.seq_num
                    ));
                    debug!(
                        "Deterministically dropping sender packet with seq={}",
                        packet.seq_num
                    );
                    self.drop_sender_seq_once.remove(pos);
                    continue;
                }

                if let Some(pos) = self
                    .corrupt_sender_seq_once
                    .iter()
                    .position(|s| *s == packet.seq_num)
                {
                    self.record_link_event(format!(
                        "[Sender->Receiver] CORRUPT (deterministic seq) seq={}",
                        packet.seq_num
                    ));
                    packet.checksum = !packet.checksum;
                    self.corrupt_sender_seq_once.remove(pos);
                }
            }

            if source_node == NodeId::Receiver
                && let Some(ack) = packet.ack_num
                && let Some(pos) = self.drop_receiver_ack_once.iter().position(|a| *a == ack)
            {
                self.record_link_event(format!(
                    "[Receiver->Sender] DROP (deterministic ack) ack={}",
                    ack
                ));
                debug!("Deterministically dropping receiver ACK with ack={}", ack);
                self.drop_receiver_ack_once.remove(pos);
                continue;
            }

            // 1. Check Loss
            if self.rng.random::<f64>() < self.config.loss_rate {
                self.record_link_event(format!(
                    "[{:?}->{:?}] DROP (random loss) seq={} ack={:?}",
                    source_node,
                    source_node.peer(),
                    packet.seq_num,
                    packet.ack_num
                ));
                debug!("Packet lost in channel");
                continue;
            }

            // 2. Check Corruption
            if self.rng.random::<f64>() < self.config.corrupt_rate {
                self.record_link_event(format!(
                    "[{:?}->{:?}] CORRUPT seq={} ack={:?}",
                    source_node,
                    source_node.peer(),
                    packet.seq_num,
                    packet.ack_num
                ));
                debug!("Packet corrupted in channel");
                self.corrupt(&mut packet);
            }

            // 3. Calculate Latency
            let latency = self
                .rng
                .random_range(self.config.min_latency..=self.config.max_latency);
            // 4. Target Node
            let target_node = source_node.peer();

            // Never overtake an earlier packet in the same direction.
            let last = self.last_arrival.entry(target_node).or_insert(0);
            let arrival_time = (self.time + latency).max(*last);
            *last = arrival_time;

            self.record_link_event(format!(
                "[{:?}->{:?}] SEND seq={} ack={:?} (latency={})",
                source_node, target_node, packet.seq_num, packet.ack_num, latency
            ));

            self.push_event(
                arrival_time,
                EventType::PacketArrival {
                    to: target_node,
                    packet,
                },
            );
        }
    }
}
