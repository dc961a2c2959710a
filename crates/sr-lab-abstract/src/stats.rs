use serde::Serialize;
use std::fmt;

/// Counters and timing sums collected over a simulation run.
///
/// Each entity owns its own instance; the final report is the [`merge`](Self::merge)
/// of the sender's and the receiver's.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Statistics {
    pub original_packets: u64,
    pub retransmissions: u64,
    pub delivered: u64,
    pub acks_sent: u64,
    /// Corrupted arrivals seen by either entity.
    pub corrupted: u64,
    pub rtt_total: f64,
    pub rtt_count: u64,
    pub comm_time_total: f64,
    pub comm_time_count: u64,
}

fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator > 0.0 {
        numerator / denominator
    } else {
        0.0
    }
}

impl Statistics {
    /// Sample for a sequence number whose original transmission got acknowledged.
    pub fn record_rtt(&mut self, elapsed: u64) {
        self.rtt_total += elapsed as f64;
        self.rtt_count += 1;
    }

    /// Sample for every acknowledged sequence number, retransmitted or not.
    pub fn record_comm_time(&mut self, elapsed: u64) {
        self.comm_time_total += elapsed as f64;
        self.comm_time_count += 1;
    }

    pub fn merge(&self, other: &Statistics) -> Statistics {
        Statistics {
            original_packets: self.original_packets + other.original_packets,
            retransmissions: self.retransmissions + other.retransmissions,
            delivered: self.delivered + other.delivered,
            acks_sent: self.acks_sent + other.acks_sent,
            corrupted: self.corrupted + other.corrupted,
            rtt_total: self.rtt_total + other.rtt_total,
            rtt_count: self.rtt_count + other.rtt_count,
            comm_time_total: self.comm_time_total + other.comm_time_total,
            comm_time_count: self.comm_time_count + other.comm_time_count,
        }
    }

    /// Retransmissions not explained by corruption, over every packet put on the wire.
    pub fn loss_ratio(&self) -> f64 {
        let lost = (self.retransmissions as f64 - self.corrupted as f64).max(0.0);
        let total = (self.original_packets + self.retransmissions + self.acks_sent) as f64;
        ratio(lost, total)
    }

    pub fn corruption_ratio(&self) -> f64 {
        let total = (self.original_packets + self.acks_sent + self.corrupted) as f64;
        ratio(self.corrupted as f64, total)
    }

    pub fn average_rtt(&self) -> f64 {
        ratio(self.rtt_total, self.rtt_count as f64)
    }

    pub fn average_comm_time(&self) -> f64 {
        ratio(self.comm_time_total, self.comm_time_count as f64)
    }
}

impl fmt::Display for Statistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=============== STATISTICS ===============")?;
        writeln!(f, "Original packets transmitted by sender: {}", self.original_packets)?;
        writeln!(f, "Retransmissions by sender:              {}", self.retransmissions)?;
        writeln!(f, "Data packets delivered at receiver:     {}", self.delivered)?;
        writeln!(f, "ACK packets sent by receiver:           {}", self.acks_sent)?;
        writeln!(f, "Corrupted packets:                      {}", self.corrupted)?;
        writeln!(f, "Ratio of lost packets:                  {:.4}", self.loss_ratio())?;
        writeln!(f, "Ratio of corrupted packets:             {:.4}", self.corruption_ratio())?;
        writeln!(f, "Average RTT:                            {:.4}", self.average_rtt())?;
        writeln!(f, "Average communication time:             {:.4}", self.average_comm_time())?;
        writeln!(f, "RTT samples: {} (total {:.1})", self.rtt_count, self.rtt_total)?;
        write!(
            f,
            "Communication samples: {} (total {:.1})",
            self.comm_time_count, self.comm_time_total
        )
    }
}
