//! ISO 11783-3 Extended Transport Protocol framing (§4.4.2).

use crate::error::AbortReason;
use crate::types::Pgn;

pub const CM_RTS: u8 = 20;
pub const CM_CTS: u8 = 21;
pub const CM_DPO: u8 = 22;
pub const CM_EOM_ACK: u8 = 23;
pub const CM_ABORT: u8 = 255;

/// `0x00FFFFFF` packets × 7 bytes ≈ 117 MB.
pub const MAX_ETP_SIZE: u64 = 0x00FF_FFFF * 7;

fn pgn_bytes(pgn: Pgn) -> [u8; 3] {
    let b = pgn.to_le_bytes();
    [b[0], b[1], b[2]]
}

fn pgn_from_bytes(b: &[u8]) -> Pgn {
    u32::from_le_bytes([b[0], b[1], b[2], 0])
}

fn u24_le(v: u32) -> [u8; 3] {
    let b = v.to_le_bytes();
    [b[0], b[1], b[2]]
}

fn u24_from(b: &[u8]) -> u32 {
    u32::from_le_bytes([b[0], b[1], b[2], 0])
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EtpCm {
    Rts { total_size: u32, pgn: Pgn },
    Cts { packets_in_window: u8, next_seq_in_window: u32, pgn: Pgn },
    Dpo { packets_in_window: u8, packet_offset: u32, pgn: Pgn },
    EndOfMessageAck { total_size: u32, pgn: Pgn },
    Abort { reason: AbortReason, pgn: Pgn },
}

pub fn encode_rts(total_size: u32, pgn: Pgn) -> [u8; 8] {
    let size = total_size.to_le_bytes();
    let p = pgn_bytes(pgn);
    [CM_RTS, size[0], size[1], size[2], size[3], p[0], p[1], p[2]]
}

pub fn encode_cts(packets_in_window: u8, next_seq_in_window: u32, pgn: Pgn) -> [u8; 8] {
    let seq = u24_le(next_seq_in_window);
    let p = pgn_bytes(pgn);
    [CM_CTS, packets_in_window, seq[0], seq[1], seq[2], p[0], p[1], p[2]]
}

pub fn encode_dpo(packets_in_window: u8, packet_offset: u32, pgn: Pgn) -> [u8; 8] {
    let off = u24_le(packet_offset);
    let p = pgn_bytes(pgn);
    [CM_DPO, packets_in_window, off[0], off[1], off[2], p[0], p[1], p[2]]
}

pub fn encode_eom_ack(total_size: u32, pgn: Pgn) -> [u8; 8] {
    let size = total_size.to_le_bytes();
    let p = pgn_bytes(pgn);
    [CM_EOM_ACK, size[0], size[1], size[2], size[3], p[0], p[1], p[2]]
}

pub fn encode_abort(reason: AbortReason, pgn: Pgn) -> [u8; 8] {
    let p = pgn_bytes(pgn);
    [CM_ABORT, reason.code(), 0xFF, 0xFF, 0xFF, p[0], p[1], p[2]]
}

pub fn decode_cm(data: &[u8]) -> Option<EtpCm> {
    if data.len() < 8 {
        return None;
    }
    match data[0] {
        CM_RTS => Some(EtpCm::Rts {
            total_size: u32::from_le_bytes([data[1], data[2], data[3], data[4]]),
            pgn: pgn_from_bytes(&data[5..8]),
        }),
        CM_CTS => Some(EtpCm::Cts {
            packets_in_window: data[1],
            next_seq_in_window: u24_from(&data[2..5]),
            pgn: pgn_from_bytes(&data[5..8]),
        }),
        CM_DPO => Some(EtpCm::Dpo {
            packets_in_window: data[1],
            packet_offset: u24_from(&data[2..5]),
            pgn: pgn_from_bytes(&data[5..8]),
        }),
        CM_EOM_ACK => Some(EtpCm::EndOfMessageAck {
            total_size: u32::from_le_bytes([data[1], data[2], data[3], data[4]]),
            pgn: pgn_from_bytes(&data[5..8]),
        }),
        CM_ABORT => Some(EtpCm::Abort {
            reason: AbortReason::from_code(data[1]),
            pgn: pgn_from_bytes(&data[5..8]),
        }),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rts_roundtrip() {
        let rts = encode_rts(200_000, 0x00C700);
        assert_eq!(decode_cm(&rts), Some(EtpCm::Rts { total_size: 200_000, pgn: 0x00C700 }));
    }

    #[test]
    fn dpo_roundtrip() {
        let dpo = encode_dpo(16, 256, 0x00C700);
        assert_eq!(decode_cm(&dpo), Some(EtpCm::Dpo { packets_in_window: 16, packet_offset: 256, pgn: 0x00C700 }));
    }

    #[test]
    fn max_size_matches_spec() {
        assert_eq!(MAX_ETP_SIZE, 117_440_505);
    }
}
