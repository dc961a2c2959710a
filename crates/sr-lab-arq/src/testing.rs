use sr_lab_abstract::{Packet, SystemContext};

/// Context that records every action and enforces single-timer discipline.
#[derive(Default)]
pub(crate) struct RecordingContext {
    pub now: u64,
    pub sent: Vec<Packet>,
    pub delivered: Vec<String>,
    pub logs: Vec<String>,
    pub timer_armed: bool,
    pub timer_starts: u32,
}

impl RecordingContext {
    pub fn take_sent(&mut self) -> Vec<Packet> {
        std::mem::take(&mut self.sent)
    }

    /// Simulate the engine firing the pending timer.
    pub fn expire_timer(&mut self) {
        assert!(self.timer_armed, "no timer pending");
        self.timer_armed = false;
    }
}

impl SystemContext for RecordingContext {
    fn send_packet(&mut self, packet: Packet) {
        self.sent.push(packet);
    }

    fn start_timer(&mut self, _delay: u64) {
        assert!(!self.timer_armed, "timer started while already armed");
        self.timer_armed = true;
        self.timer_starts += 1;
    }

    fn stop_timer(&mut self) {
        self.timer_armed = false;
    }

    fn deliver_data(&mut self, data: &str) {
        self.delivered.push(data.to_string());
    }

    fn log(&mut self, message: &str) {
        self.logs.push(message.to_string());
    }

    fn now(&self) -> u64 {
        self.now
    }
}
