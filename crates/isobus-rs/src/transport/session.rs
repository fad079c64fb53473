//! Shared transport-session bookkeeping (§3 `TransportSession`, §4.4).

use alloc::vec::Vec;

use crate::types::{Address, Pgn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionProtocol {
    Tp,
    Etp,
}

/// Timeouts mandated by ISO 11783-3 §5.10 (also reused for ETP).
pub mod timeouts {
    /// Receiver waiting for the next DT frame.
    pub const T1_MS: u32 = 750;
    /// Transmitter waiting for CTS.
    pub const T2_MS: u32 = 1250;
    /// Transmitter waiting for EndOfMessageAck.
    pub const T3_MS: u32 = 1250;
    /// Receiver waiting for the next CTS window continuation.
    pub const T4_MS: u32 = 1050;
    /// Response time to the first CTS/Abort after RTS.
    pub const TH_MS: u32 = 500;
    /// Minimum inter-frame gap for BAM data frames.
    pub const BAM_MIN_GAP_MS: u32 = 50;
}

/// An in-progress outgoing multi-frame transfer.
pub struct TxSession {
    pub protocol: SessionProtocol,
    pub pgn: Pgn,
    pub src: Address,
    pub dst: Address,
    pub broadcast: bool,
    pub data: Vec<u8>,
    pub total_packets: u32,
    /// Next sequence number to send, 1-based within the active window.
    pub next_seq: u32,
    /// How many packets the receiver granted in the current window.
    pub packets_in_window: u32,
    /// Packets already sent in total (0-based count).
    pub packets_sent: u32,
    /// Absolute packet offset of the current window (ETP DPO base).
    pub window_offset: u32,
    pub inactivity_ms: u32,
    /// Time accumulated since the last BAM data frame, for the mandatory
    /// minimum inter-frame gap. Unused for directed sessions.
    pub bam_gap_ms: u32,
    pub awaiting_first_response: bool,
    pub done: bool,
}

impl TxSession {
    pub fn packet_count_for(protocol: SessionProtocol, len: usize) -> u32 {
        let per_frame = 7usize;
        let _ = protocol;
        ((len + per_frame - 1) / per_frame) as u32
    }

    pub fn payload_for_packet(&self, seq_1_based: u32) -> [u8; 7] {
        let mut buf = [0xFFu8; 7];
        let start = (seq_1_based as usize - 1) * 7;
        if start < self.data.len() {
            let end = (start + 7).min(self.data.len());
            buf[..end - start].copy_from_slice(&self.data[start..end]);
        }
        buf
    }
}

/// An in-progress incoming multi-frame transfer.
pub struct RxSession {
    pub protocol: SessionProtocol,
    pub pgn: Pgn,
    pub src: Address,
    pub dst: Address,
    pub broadcast: bool,
    pub total_size: u32,
    pub total_packets: u32,
    pub buffer: Vec<u8>,
    /// Next expected sequence number within the active window (1-based).
    pub expected_seq: u32,
    pub packets_received: u32,
    pub window_offset: u32,
    pub packets_in_window: u32,
    pub inactivity_ms: u32,
}

impl RxSession {
    pub fn new(protocol: SessionProtocol, pgn: Pgn, src: Address, dst: Address, broadcast: bool, total_size: u32, total_packets: u32) -> Self {
        RxSession {
            protocol,
            pgn,
            src,
            dst,
            broadcast,
            total_size,
            total_packets,
            buffer: alloc::vec![0u8; total_size as usize],
            expected_seq: 1,
            packets_received: 0,
            window_offset: 0,
            packets_in_window: total_packets,
            inactivity_ms: 0,
        }
    }

    pub fn accept_packet(&mut self, seq_1_based: u32, payload: &[u8; 7]) {
        let absolute_index = self.window_offset + seq_1_based - 1;
        let start = absolute_index as usize * 7;
        let remaining = self.total_size as usize - start.min(self.total_size as usize);
        let take = remaining.min(7);
        if take > 0 {
            self.buffer[start..start + take].copy_from_slice(&payload[..take]);
        }
        self.packets_received += 1;
        self.expected_seq += 1;
    }

    pub fn is_complete(&self) -> bool {
        self.packets_received >= self.total_packets
    }
}
