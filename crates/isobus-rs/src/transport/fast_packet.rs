//! NMEA 2000 Fast Packet reassembly (§4.4.3).

use alloc::collections::BTreeMap;
use alloc::vec::Vec;

use crate::message::Message;
use crate::types::{Address, Pgn, Priority};

/// Evict a reassembly buffer after this much inactivity (§9 Open Questions:
/// the source has no timeout; this mirrors TP's T1).
pub const INACTIVITY_TIMEOUT_MS: u32 = 750;

struct FastPacketSession {
    total_length: u8,
    buffer: Vec<u8>,
    next_frame: u8,
    priority: Priority,
    dst: Address,
    inactivity_ms: u32,
}

/// Reassembles Fast Packet fragments keyed by `(src, pgn, sequence_counter)`,
/// so interleaved sequences for the same `(src, pgn)` pair reassemble
/// independently.
#[derive(Default)]
pub struct FastPacketReassembler {
    sessions: BTreeMap<(Address, Pgn, u8), FastPacketSession>,
}

impl FastPacketReassembler {
    pub fn new() -> Self {
        FastPacketReassembler {
            sessions: BTreeMap::new(),
        }
    }

    /// Feed one Fast Packet frame. Returns a completed [`Message`] once every
    /// fragment has arrived.
    pub fn accept(
        &mut self,
        pgn: Pgn,
        src: Address,
        dst: Address,
        priority: Priority,
        data: &[u8],
        timestamp_us: u64,
    ) -> Option<Message> {
        if data.is_empty() {
            return None;
        }
        let sequence_counter = (data[0] >> 4) & 0x0F;
        let frame_number = data[0] & 0x0F;
        let key = (src, pgn, sequence_counter);

        if frame_number == 0 {
            if data.len() < 2 {
                return None;
            }
            let total_length = data[1];
            let mut buffer = Vec::with_capacity(total_length as usize);
            buffer.extend_from_slice(&data[2..data.len().min(8)]);
            self.sessions.insert(
                key,
                FastPacketSession {
                    total_length,
                    buffer,
                    next_frame: 1,
                    priority,
                    dst,
                    inactivity_ms: 0,
                },
            );
        } else if let Some(session) = self.sessions.get_mut(&key) {
            if session.next_frame != frame_number {
                self.sessions.remove(&key);
                return None;
            }
            session.buffer.extend_from_slice(&data[1..data.len().min(8)]);
            session.next_frame += 1;
            session.inactivity_ms = 0;
        } else {
            return None;
        }

        let complete = self
            .sessions
            .get(&key)
            .map(|s| s.buffer.len() >= s.total_length as usize)
            .unwrap_or(false);

        if complete {
            let session = self.sessions.remove(&key)?;
            let mut payload = session.buffer;
            payload.truncate(session.total_length as usize);
            Some(Message {
                pgn,
                src,
                dst: session.dst,
                priority: session.priority,
                data: payload,
                timestamp_us,
            })
        } else {
            None
        }
    }

    /// Evict sessions that have not received a fragment within
    /// [`INACTIVITY_TIMEOUT_MS`].
    pub fn update(&mut self, elapsed_ms: u32) {
        let mut expired = Vec::new();
        for (key, session) in self.sessions.iter_mut() {
            session.inactivity_ms += elapsed_ms;
            if session.inactivity_ms >= INACTIVITY_TIMEOUT_MS {
                expired.push(*key);
            }
        }
        for key in expired {
            self.sessions.remove(&key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reassembles_three_frame_message() {
        let mut fp = FastPacketReassembler::new();
        // total length 20 bytes: frame 0 carries 6 data bytes, frames 1.. carry 7.
        let f0 = [0x00u8, 20, 1, 2, 3, 4, 5, 6];
        let f1 = [0x01u8, 7, 8, 9, 10, 11, 12, 13];
        let f2 = [0x02u8, 14, 15, 16, 17, 18, 19, 20];

        assert!(fp.accept(129029, 0x50, 0xFF, 6, &f0, 0).is_none());
        assert!(fp.accept(129029, 0x50, 0xFF, 6, &f1, 0).is_none());
        let msg = fp.accept(129029, 0x50, 0xFF, 6, &f2, 0).unwrap();
        assert_eq!(msg.data.len(), 20);
        assert_eq!(msg.data, (1..=20).collect::<Vec<u8>>());
    }

    #[test]
    fn frame_out_of_order_drops_session() {
        let mut fp = FastPacketReassembler::new();
        let f0 = [0x00u8, 20, 1, 2, 3, 4, 5, 6];
        let bad_f2 = [0x02u8, 8, 9, 10, 11, 12, 13, 14]; // frame 2 before frame 1
        fp.accept(129029, 0x50, 0xFF, 6, &f0, 0);
        assert!(fp.accept(129029, 0x50, 0xFF, 6, &bad_f2, 0).is_none());
        assert!(fp.sessions.is_empty());
    }

    #[test]
    fn interleaved_sequences_reassemble_independently() {
        let mut fp = FastPacketReassembler::new();
        // sequence counter in the upper nibble, frame number in the lower nibble.
        let a0 = [0x00u8, 13, 1, 2, 3, 4, 5, 6];
        let b0 = [0x10u8, 13, 101, 102, 103, 104, 105, 106];
        let a1 = [0x01u8, 7, 8, 9, 10, 11, 12, 13];
        let b1 = [0x11u8, 107, 108, 109, 110, 111, 112, 113];

        assert!(fp.accept(129029, 0x50, 0xFF, 6, &a0, 0).is_none());
        assert!(fp.accept(129029, 0x50, 0xFF, 6, &b0, 0).is_none());
        assert_eq!(fp.sessions.len(), 2);

        let msg_a = fp.accept(129029, 0x50, 0xFF, 6, &a1, 0).unwrap();
        assert_eq!(msg_a.data, (1..=13).collect::<Vec<u8>>());

        let msg_b = fp.accept(129029, 0x50, 0xFF, 6, &b1, 0).unwrap();
        assert_eq!(msg_b.data, (101..=113).collect::<Vec<u8>>());
    }

    #[test]
    fn inactivity_evicts_partial_session() {
        let mut fp = FastPacketReassembler::new();
        let f0 = [0x00u8, 20, 1, 2, 3, 4, 5, 6];
        fp.accept(129029, 0x50, 0xFF, 6, &f0, 0);
        fp.update(1000);
        assert!(fp.sessions.is_empty());
    }
}
