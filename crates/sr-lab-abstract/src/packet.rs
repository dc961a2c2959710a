use serde::{Deserialize, Serialize};

/// Integrity value carried in every packet: the sum of the payload's character codes.
///
/// Sequence and acknowledgment numbers are deliberately left out, so a flipped
/// `seq_num` or `ack_num` is only caught by the range check in [`Packet::is_corrupted`].
pub fn checksum(payload: &str) -> u32 {
    payload
        .chars()
        .fold(0u32, |sum, c| sum.wrapping_add(c as u32))
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Packet {
    /// Sequence number. Data packets use the sender's window sequence; ACKs carry
    /// the receiver's own output counter.
    pub seq_num: u32,
    /// Acknowledged sequence number, `None` on data packets.
    pub ack_num: Option<u32>,
    pub checksum: u32,
    pub payload: String,
}

impl Packet {
    pub fn new(seq_num: u32, ack_num: Option<u32>, checksum: u32, payload: String) -> Self {
        Self {
            seq_num,
            ack_num,
            checksum,
            payload,
        }
    }

    /// Create a data packet with a freshly computed checksum.
    pub fn new_data(seq: u32, payload: impl Into<String>) -> Self {
        let payload = payload.into();
        Self::new(seq, None, checksum(&payload), payload)
    }

    /// Create a pure ACK packet (empty payload).
    pub fn new_ack(seq: u32, ack: u32) -> Self {
        Self::new(seq, Some(ack), checksum(""), String::new())
    }

    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    /// Shared corruption check for both entities.
    ///
    /// A packet is corrupted when its sequence number, or its acknowledgment number
    /// if present, falls outside `[0, limit_seq_no)`, or when the stored checksum
    /// disagrees with the one recomputed from the payload.
    pub fn is_corrupted(&self, limit_seq_no: u32) -> bool {
        if self.seq_num >= limit_seq_no {
            return true;
        }
        if self.ack_num.is_some_and(|ack| ack >= limit_seq_no) {
            return true;
        }
        checksum(&self.payload) != self.checksum
    }
}

/// Application-layer unit handed to the sender.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    data: String,
}

impl Message {
    pub fn new(data: impl Into<String>) -> Self {
        Self { data: data.into() }
    }

    pub fn data(&self) -> &str {
        &self.data
    }

    pub fn into_data(self) -> String {
        self.data
    }
}
