//! ISO 11783-3 Transport Protocol: BAM and RTS/CTS framing (§4.4.1).

use alloc::vec::Vec;

use crate::error::AbortReason;
use crate::types::{Address, Pgn, BROADCAST_ADDRESS};

pub const CM_RTS: u8 = 16;
pub const CM_CTS: u8 = 17;
pub const CM_EOM_ACK: u8 = 19;
pub const CM_BAM: u8 = 32;
pub const CM_ABORT: u8 = 255;

/// Maximum payload a single TP session may carry.
pub const MAX_TP_SIZE: usize = 1785;

fn pgn_bytes(pgn: Pgn) -> [u8; 3] {
    let b = pgn.to_le_bytes();
    [b[0], b[1], b[2]]
}

fn pgn_from_bytes(b: &[u8]) -> Pgn {
    u32::from_le_bytes([b[0], b[1], b[2], 0])
}

/// A parsed TP.CM control frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TpCm {
    Rts {
        total_size: u16,
        total_packets: u8,
        max_packets_per_cts: u8,
        pgn: Pgn,
    },
    Cts {
        packets_allowed: u8,
        next_packet: u8,
        pgn: Pgn,
    },
    EndOfMessageAck {
        total_size: u16,
        total_packets: u8,
        pgn: Pgn,
    },
    Bam {
        total_size: u16,
        total_packets: u8,
        pgn: Pgn,
    },
    Abort {
        reason: AbortReason,
        pgn: Pgn,
    },
}

pub fn encode_rts(total_size: u16, total_packets: u8, max_packets_per_cts: u8, pgn: Pgn) -> [u8; 8] {
    let size = total_size.to_le_bytes();
    let p = pgn_bytes(pgn);
    [CM_RTS, size[0], size[1], total_packets, max_packets_per_cts, p[0], p[1], p[2]]
}

pub fn encode_cts(packets_allowed: u8, next_packet: u8, pgn: Pgn) -> [u8; 8] {
    let p = pgn_bytes(pgn);
    [CM_CTS, packets_allowed, next_packet, 0xFF, 0xFF, p[0], p[1], p[2]]
}

pub fn encode_eom_ack(total_size: u16, total_packets: u8, pgn: Pgn) -> [u8; 8] {
    let size = total_size.to_le_bytes();
    let p = pgn_bytes(pgn);
    [CM_EOM_ACK, size[0], size[1], total_packets, 0xFF, p[0], p[1], p[2]]
}

pub fn encode_bam(total_size: u16, total_packets: u8, pgn: Pgn) -> [u8; 8] {
    let size = total_size.to_le_bytes();
    let p = pgn_bytes(pgn);
    [CM_BAM, size[0], size[1], total_packets, 0xFF, p[0], p[1], p[2]]
}

pub fn encode_abort(reason: AbortReason, pgn: Pgn) -> [u8; 8] {
    let p = pgn_bytes(pgn);
    [CM_ABORT, reason.code(), 0xFF, 0xFF, 0xFF, p[0], p[1], p[2]]
}

pub fn decode_cm(data: &[u8]) -> Option<TpCm> {
    if data.len() < 8 {
        return None;
    }
    match data[0] {
        CM_RTS => Some(TpCm::Rts {
            total_size: u16::from_le_bytes([data[1], data[2]]),
            total_packets: data[3],
            max_packets_per_cts: data[4],
            pgn: pgn_from_bytes(&data[5..8]),
        }),
        CM_CTS => Some(TpCm::Cts {
            packets_allowed: data[1],
            next_packet: data[2],
            pgn: pgn_from_bytes(&data[5..8]),
        }),
        CM_EOM_ACK => Some(TpCm::EndOfMessageAck {
            total_size: u16::from_le_bytes([data[1], data[2]]),
            total_packets: data[3],
            pgn: pgn_from_bytes(&data[5..8]),
        }),
        CM_BAM => Some(TpCm::Bam {
            total_size: u16::from_le_bytes([data[1], data[2]]),
            total_packets: data[3],
            pgn: pgn_from_bytes(&data[5..8]),
        }),
        CM_ABORT => Some(TpCm::Abort {
            reason: AbortReason::from_code(data[1]),
            pgn: pgn_from_bytes(&data[5..8]),
        }),
        _ => None,
    }
}

/// A TP.DT data frame: one sequence byte followed by 7 payload bytes
/// (padded with `0xFF` on the final frame of an odd-length transfer).
pub fn encode_dt(seq: u8, chunk: &[u8]) -> [u8; 8] {
    let mut frame = [0xFFu8; 8];
    frame[0] = seq;
    let len = chunk.len().min(7);
    frame[1..1 + len].copy_from_slice(&chunk[..len]);
    frame
}

pub fn total_packets_for(len: usize) -> u8 {
    (((len + 6) / 7).max(1)) as u8
}

/// Split `data` into 7-byte DT chunks, the last padded with `0xFF`.
pub fn split_into_packets(data: &[u8]) -> Vec<[u8; 7]> {
    let mut out = Vec::new();
    let mut i = 0;
    while i < data.len() {
        let mut chunk = [0xFFu8; 7];
        let end = (i + 7).min(data.len());
        chunk[..end - i].copy_from_slice(&data[i..end]);
        out.push(chunk);
        i += 7;
    }
    if out.is_empty() {
        out.push([0xFF; 7]);
    }
    out
}

pub fn destination_for(broadcast: bool, dst: Address) -> Address {
    if broadcast {
        BROADCAST_ADDRESS
    } else {
        dst
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rts_cts_eoma_roundtrip_for_100_bytes() {
        let data: Vec<u8> = (0..100u16).map(|v| v as u8).collect();
        let packets = split_into_packets(&data);
        assert_eq!(packets.len(), 15);
        assert_eq!(total_packets_for(100), 15);

        let last = packets[14];
        assert_eq!(last[0], 99);
        assert_eq!(&last[1..], &[0xFF; 6]);

        let rts = encode_rts(100, 15, 0xFF, 0x00EF00);
        assert_eq!(decode_cm(&rts), Some(TpCm::Rts { total_size: 100, total_packets: 15, max_packets_per_cts: 0xFF, pgn: 0x00EF00 }));

        let cts = encode_cts(15, 1, 0x00EF00);
        assert_eq!(decode_cm(&cts), Some(TpCm::Cts { packets_allowed: 15, next_packet: 1, pgn: 0x00EF00 }));

        let eoma = encode_eom_ack(100, 15, 0x00EF00);
        assert_eq!(decode_cm(&eoma), Some(TpCm::EndOfMessageAck { total_size: 100, total_packets: 15, pgn: 0x00EF00 }));
    }

    #[test]
    fn abort_roundtrip() {
        let abort = encode_abort(AbortReason::BadSequence, 0x00EF00);
        assert_eq!(decode_cm(&abort), Some(TpCm::Abort { reason: AbortReason::BadSequence, pgn: 0x00EF00 }));
    }
}
