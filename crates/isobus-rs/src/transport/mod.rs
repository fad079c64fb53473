//! Multi-frame reassembly: TP, ETP, and Fast Packet (§4.4).

pub mod etp;
pub mod fast_packet;
mod session;
pub mod tp;

use alloc::collections::BTreeSet;
use alloc::vec::Vec;

use crate::error::{AbortReason, IsobusError, Result};
use crate::frame::pgn_table;
use crate::message::Message;
use crate::types::{Address, Pgn, Priority, BROADCAST_ADDRESS};
use fast_packet::FastPacketReassembler;
use session::{timeouts, RxSession, SessionProtocol, TxSession};

/// What the network manager should do with a frame handed to the transport
/// layer (§4.2 receive path, step 4).
pub enum TransportOutcome {
    Delivered(Message),
    Consumed,
    Passthrough,
}

/// One CAN frame the transport layer needs transmitted, queued for the
/// network manager to drain on the next `update`.
pub struct OutboundFrame {
    pub pgn: Pgn,
    pub src: Address,
    pub dst: Address,
    pub data: [u8; 8],
}

#[derive(Default)]
pub struct TransportLayer {
    tx_sessions: Vec<TxSession>,
    rx_sessions: Vec<RxSession>,
    fast_packet: FastPacketReassembler,
    fast_packet_pgns: BTreeSet<Pgn>,
    outbound: Vec<OutboundFrame>,
    pub max_tx_sessions: usize,
}

impl TransportLayer {
    pub fn new(max_tx_sessions: usize) -> Self {
        TransportLayer {
            tx_sessions: Vec::new(),
            rx_sessions: Vec::new(),
            fast_packet: FastPacketReassembler::new(),
            fast_packet_pgns: BTreeSet::new(),
            outbound: Vec::new(),
            max_tx_sessions,
        }
    }

    pub fn register_fast_packet_pgn(&mut self, pgn: Pgn) {
        self.fast_packet_pgns.insert(pgn);
    }

    pub fn is_fast_packet_pgn(&self, pgn: Pgn) -> bool {
        self.fast_packet_pgns.contains(&pgn)
    }

    pub fn drain_outbound(&mut self) -> Vec<OutboundFrame> {
        core::mem::take(&mut self.outbound)
    }

    pub fn has_tx_session(&self, src: Address, dst: Address, pgn: Pgn, broadcast: bool) -> bool {
        self.tx_sessions
            .iter()
            .any(|s| s.src == src && s.pgn == pgn && s.broadcast == broadcast && (broadcast || s.dst == dst))
    }

    fn has_rx_session(&self, src: Address, pgn: Pgn) -> bool {
        self.rx_sessions.iter().any(|s| s.src == src && s.pgn == pgn)
    }

    /// Start an outgoing TP session (§4.4.1). `data.len()` must be in
    /// `9..=1785`.
    pub fn start_tp(&mut self, pgn: Pgn, data: Vec<u8>, src: Address, dst: Address, broadcast: bool) -> Result<()> {
        if data.len() > tp::MAX_TP_SIZE {
            return Err(IsobusError::MessageTooLarge);
        }
        if self.has_tx_session(src, dst, pgn, broadcast) {
            return Err(IsobusError::AlreadyInSession);
        }
        if self.tx_sessions.len() >= self.max_tx_sessions {
            return Err(IsobusError::WouldBlock);
        }
        let total_packets = tp::total_packets_for(data.len());
        let effective_dst = tp::destination_for(broadcast, dst);

        if broadcast {
            self.outbound.push(OutboundFrame {
                pgn: pgn_table::PGN_TP_CM,
                src,
                dst: BROADCAST_ADDRESS,
                data: tp::encode_bam(data.len() as u16, total_packets, pgn),
            });
            self.tx_sessions.push(TxSession {
                protocol: SessionProtocol::Tp,
                pgn,
                src,
                dst: effective_dst,
                broadcast: true,
                data,
                total_packets: total_packets as u32,
                next_seq: 1,
                packets_in_window: total_packets as u32,
                packets_sent: 0,
                window_offset: 0,
                inactivity_ms: 0,
                bam_gap_ms: 0,
                awaiting_first_response: false,
                done: false,
            });
            return Ok(());
        }

        self.outbound.push(OutboundFrame {
            pgn: pgn_table::PGN_TP_CM,
            src,
            dst: effective_dst,
            data: tp::encode_rts(data.len() as u16, total_packets, 0xFF, pgn),
        });
        self.tx_sessions.push(TxSession {
            protocol: SessionProtocol::Tp,
            pgn,
            src,
            dst,
            broadcast: false,
            data,
            total_packets: total_packets as u32,
            next_seq: 1,
            packets_in_window: 0,
            packets_sent: 0,
            window_offset: 0,
            inactivity_ms: 0,
            bam_gap_ms: 0,
            awaiting_first_response: true,
            done: false,
        });
        Ok(())
    }

    /// Start an outgoing ETP session (§4.4.2). Never broadcast.
    pub fn start_etp(&mut self, pgn: Pgn, data: Vec<u8>, src: Address, dst: Address) -> Result<()> {
        if data.len() as u64 > etp::MAX_ETP_SIZE {
            return Err(IsobusError::MessageTooLarge);
        }
        if self.has_tx_session(src, dst, pgn, false) {
            return Err(IsobusError::AlreadyInSession);
        }
        if self.tx_sessions.len() >= self.max_tx_sessions {
            return Err(IsobusError::WouldBlock);
        }
        let total_packets = ((data.len() + 6) / 7).max(1) as u32;
        self.outbound.push(OutboundFrame {
            pgn: pgn_table::PGN_ETP_CM,
            src,
            dst,
            data: etp::encode_rts(data.len() as u32, pgn),
        });
        self.tx_sessions.push(TxSession {
            protocol: SessionProtocol::Etp,
            pgn,
            src,
            dst,
            broadcast: false,
            data,
            total_packets,
            next_seq: 1,
            packets_in_window: 0,
            packets_sent: 0,
            window_offset: 0,
            inactivity_ms: 0,
            bam_gap_ms: 0,
            awaiting_first_response: true,
            done: false,
        });
        Ok(())
    }

    /// Handle a TP.CM or ETP.CM control frame. `dst` is our own address (the
    /// frame was addressed to us, or is a broadcast we're participating in).
    pub fn on_control_frame(&mut self, src: Address, dst: Address, broadcast: bool, is_tp: bool, data: &[u8]) {
        if is_tp {
            self.on_tp_control(src, dst, broadcast, data);
        } else {
            self.on_etp_control(src, dst, data);
        }
    }

    fn on_tp_control(&mut self, src: Address, dst: Address, broadcast: bool, data: &[u8]) {
        let Some(cm) = tp::decode_cm(data) else { return };
        match cm {
            tp::TpCm::Bam { total_size, total_packets, pgn } => {
                if !self.has_rx_session(src, pgn) {
                    self.rx_sessions.push(RxSession::new(
                        SessionProtocol::Tp,
                        pgn,
                        src,
                        BROADCAST_ADDRESS,
                        true,
                        total_size as u32,
                        total_packets as u32,
                    ));
                }
            }
            tp::TpCm::Rts { total_size, total_packets, pgn, .. } => {
                if self.has_rx_session(src, pgn) {
                    self.outbound.push(OutboundFrame {
                        pgn: pgn_table::PGN_TP_CM,
                        src: dst,
                        dst: src,
                        data: tp::encode_abort(AbortReason::AlreadyInSession, pgn),
                    });
                    return;
                }
                self.rx_sessions.push(RxSession::new(
                    SessionProtocol::Tp,
                    pgn,
                    src,
                    dst,
                    false,
                    total_size as u32,
                    total_packets as u32,
                ));
                self.outbound.push(OutboundFrame {
                    pgn: pgn_table::PGN_TP_CM,
                    src: dst,
                    dst: src,
                    data: tp::encode_cts(total_packets, 1, pgn),
                });
            }
            tp::TpCm::Cts { packets_allowed, next_packet, pgn } => {
                if let Some(session) = self.tx_sessions.iter_mut().find(|s| s.pgn == pgn && s.dst == src && !s.broadcast) {
                    session.awaiting_first_response = false;
                    session.inactivity_ms = 0;
                    session.packets_in_window = packets_allowed as u32;
                    session.window_offset = next_packet as u32 - 1;
                    let start = session.window_offset as usize;
                    let chunks = tp::split_into_packets(&session.data);
                    let end = (start + packets_allowed as usize).min(chunks.len());
                    for (offset, chunk) in chunks[start..end].iter().enumerate() {
                        let seq = (next_packet as usize + offset) as u8;
                        self.outbound.push(OutboundFrame {
                            pgn: pgn_table::PGN_TP_DT,
                            src: session.src,
                            dst: src,
                            data: tp::encode_dt(seq, chunk),
                        });
                        session.packets_sent += 1;
                    }
                }
            }
            tp::TpCm::EndOfMessageAck { pgn, .. } => {
                if let Some(pos) = self.tx_sessions.iter().position(|s| s.pgn == pgn && s.dst == src && !s.broadcast) {
                    self.tx_sessions.remove(pos);
                }
            }
            tp::TpCm::Abort { pgn, .. } => {
                self.tx_sessions.retain(|s| !(s.pgn == pgn && s.dst == src));
                self.rx_sessions.retain(|s| !(s.pgn == pgn && s.src == src));
            }
        }
    }

    fn on_etp_control(&mut self, src: Address, dst: Address, data: &[u8]) {
        let Some(cm) = etp::decode_cm(data) else { return };
        match cm {
            etp::EtpCm::Rts { total_size, pgn } => {
                if self.has_rx_session(src, pgn) {
                    return;
                }
                let total_packets = ((total_size as usize + 6) / 7).max(1) as u32;
                self.rx_sessions.push(RxSession::new(
                    SessionProtocol::Etp,
                    pgn,
                    src,
                    dst,
                    false,
                    total_size,
                    total_packets,
                ));
                self.outbound.push(OutboundFrame {
                    pgn: pgn_table::PGN_ETP_CM,
                    src: dst,
                    dst: src,
                    data: etp::encode_cts(total_packets.min(255) as u8, 1, pgn),
                });
            }
            etp::EtpCm::Cts { packets_in_window, next_seq_in_window, pgn } => {
                if let Some(session) = self.tx_sessions.iter_mut().find(|s| s.pgn == pgn && s.dst == src) {
                    session.inactivity_ms = 0;
                    session.packets_in_window = packets_in_window as u32;
                    session.window_offset = next_seq_in_window - 1;
                    self.outbound.push(OutboundFrame {
                        pgn: pgn_table::PGN_ETP_CM,
                        src: session.src,
                        dst: src,
                        data: etp::encode_dpo(packets_in_window, session.window_offset, pgn),
                    });
                    let chunks_per7: Vec<[u8; 7]> = session
                        .data
                        .chunks(7)
                        .map(|c| {
                            let mut b = [0xFFu8; 7];
                            b[..c.len()].copy_from_slice(c);
                            b
                        })
                        .collect();
                    let start = session.window_offset as usize;
                    let end = (start + packets_in_window as usize).min(chunks_per7.len());
                    for (offset, chunk) in chunks_per7[start..end].iter().enumerate() {
                        let seq = (offset + 1) as u8;
                        self.outbound.push(OutboundFrame {
                            pgn: pgn_table::PGN_ETP_DT,
                            src: session.src,
                            dst: src,
                            data: tp::encode_dt(seq, chunk),
                        });
                        session.packets_sent += 1;
                    }
                }
            }
            etp::EtpCm::Dpo { packet_offset, .. } => {
                if let Some(session) = self.rx_sessions.iter_mut().find(|s| s.src == src) {
                    session.window_offset = packet_offset;
                    session.expected_seq = 1;
                }
            }
            etp::EtpCm::EndOfMessageAck { pgn, .. } => {
                if let Some(pos) = self.tx_sessions.iter().position(|s| s.pgn == pgn && s.dst == src) {
                    self.tx_sessions.remove(pos);
                }
            }
            etp::EtpCm::Abort { pgn, .. } => {
                self.tx_sessions.retain(|s| !(s.pgn == pgn && s.dst == src));
                self.rx_sessions.retain(|s| !(s.pgn == pgn && s.src == src));
            }
        }
    }

    /// Handle a TP.DT or ETP.DT data frame. Returns the delivered
    /// [`Message`] once the session's total packets have arrived.
    pub fn on_data_frame(
        &mut self,
        src: Address,
        data: &[u8],
        timestamp_us: u64,
        priority: Priority,
    ) -> core::result::Result<Option<Message>, AbortReason> {
        if data.len() < 8 {
            return Ok(None);
        }
        let Some(pos) = self.rx_sessions.iter().position(|s| s.src == src) else {
            return Ok(None);
        };
        let seq = data[0];
        let mut payload = [0xFFu8; 7];
        payload.copy_from_slice(&data[1..8.min(data.len())]);

        let session = &mut self.rx_sessions[pos];
        let expected = session.expected_seq as u8;
        if seq != expected {
            let reason = if seq != 0 && seq < expected {
                AbortReason::DuplicateSequence
            } else {
                AbortReason::BadSequence
            };
            let session = self.rx_sessions.remove(pos);
            if !session.broadcast {
                let pgn = if session.protocol == SessionProtocol::Tp { pgn_table::PGN_TP_CM } else { pgn_table::PGN_ETP_CM };
                self.outbound.push(OutboundFrame {
                    pgn,
                    src: session.dst,
                    dst: session.src,
                    data: tp::encode_abort(reason, session.pgn),
                });
            }
            return Err(reason);
        }

        session.accept_packet(seq as u32, &payload);
        session.inactivity_ms = 0;

        if session.is_complete() {
            let session = self.rx_sessions.remove(pos);
            if !session.broadcast {
                let eoma = match session.protocol {
                    SessionProtocol::Tp => OutboundFrame {
                        pgn: pgn_table::PGN_TP_CM,
                        src: session.dst,
                        dst: session.src,
                        data: tp::encode_eom_ack(session.total_size as u16, session.total_packets as u8, session.pgn),
                    },
                    SessionProtocol::Etp => OutboundFrame {
                        pgn: pgn_table::PGN_ETP_CM,
                        src: session.dst,
                        dst: session.src,
                        data: etp::encode_eom_ack(session.total_size, session.pgn),
                    },
                };
                self.outbound.push(eoma);
            }
            Ok(Some(Message {
                pgn: session.pgn,
                src: session.src,
                dst: session.dst,
                priority,
                data: session.buffer,
                timestamp_us,
            }))
        } else {
            Ok(None)
        }
    }

    /// Advance timers: BAM pacing, TP/ETP inactivity timeouts, Fast Packet
    /// eviction. Returns any BAM session that finished sending on this tick
    /// (nothing to deliver; BAM has no ack).
    pub fn update(&mut self, elapsed_ms: u32) {
        self.fast_packet.update(elapsed_ms);
        self.pace_bam_sessions(elapsed_ms);

        let mut aborted_tx = Vec::new();
        for (i, session) in self.tx_sessions.iter_mut().enumerate() {
            if session.broadcast {
                continue;
            }
            session.inactivity_ms += elapsed_ms;
            let limit = if session.awaiting_first_response { timeouts::TH_MS } else { timeouts::T2_MS };
            if session.inactivity_ms >= limit {
                aborted_tx.push(i);
            }
        }
        for i in aborted_tx.into_iter().rev() {
            let session = self.tx_sessions.remove(i);
            self.outbound.push(OutboundFrame {
                pgn: if session.protocol == SessionProtocol::Tp { pgn_table::PGN_TP_CM } else { pgn_table::PGN_ETP_CM },
                src: session.src,
                dst: session.dst,
                data: tp::encode_abort(AbortReason::Timeout, session.pgn),
            });
        }

        let mut aborted_rx = Vec::new();
        for (i, session) in self.rx_sessions.iter_mut().enumerate() {
            session.inactivity_ms += elapsed_ms;
            if session.inactivity_ms >= timeouts::T1_MS {
                aborted_rx.push(i);
            }
        }
        for i in aborted_rx.into_iter().rev() {
            self.rx_sessions.remove(i);
        }
    }

    /// Emit the next due BAM data frame for every in-flight broadcast
    /// session, respecting the mandatory 50 ms minimum inter-frame gap.
    fn pace_bam_sessions(&mut self, elapsed_ms: u32) {
        let mut finished = Vec::new();
        for (i, session) in self.tx_sessions.iter_mut().enumerate() {
            if !session.broadcast || session.packets_sent >= session.total_packets {
                continue;
            }
            session.bam_gap_ms += elapsed_ms;
            if session.bam_gap_ms < timeouts::BAM_MIN_GAP_MS {
                continue;
            }
            session.bam_gap_ms -= timeouts::BAM_MIN_GAP_MS;
            let seq = session.packets_sent + 1;
            let chunk = session.payload_for_packet(seq);
            self.outbound.push(OutboundFrame {
                pgn: pgn_table::PGN_TP_DT,
                src: session.src,
                dst: BROADCAST_ADDRESS,
                data: tp::encode_dt(seq as u8, &chunk),
            });
            session.packets_sent += 1;
            if session.packets_sent >= session.total_packets {
                finished.push(i);
            }
        }
        for i in finished.into_iter().rev() {
            self.tx_sessions.remove(i);
        }
    }

    pub fn fast_packet_accept(&mut self, pgn: Pgn, src: Address, dst: Address, priority: Priority, data: &[u8], timestamp_us: u64) -> Option<Message> {
        self.fast_packet.accept(pgn, src, dst, priority, data, timestamp_us)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rts_cts_full_transfer_matches_scenario() {
        let mut tx = TransportLayer::new(4);
        let mut rx = TransportLayer::new(4);
        let pgn: Pgn = 0x00FF00;
        let src: Address = 0x10;
        let dst: Address = 0x20;
        let data: Vec<u8> = (0..100u16).map(|v| v as u8).collect();

        tx.start_tp(pgn, data.clone(), src, dst, false).unwrap();
        let rts = tx.drain_outbound();
        assert_eq!(rts.len(), 1);
        assert_eq!(rts[0].dst, dst);
        assert_eq!(rts[0].src, src);

        rx.on_control_frame(src, dst, false, true, &rts[0].data);
        let cts = rx.drain_outbound();
        assert_eq!(cts.len(), 1);
        assert_eq!(cts[0].dst, src);
        assert_eq!(cts[0].src, dst);

        tx.on_control_frame(dst, src, false, true, &cts[0].data);
        let dts = tx.drain_outbound();
        assert_eq!(dts.len(), 15);

        let mut delivered = None;
        for dt in &dts {
            if let Ok(Some(msg)) = rx.on_data_frame(src, &dt.data, 0, 6) {
                delivered = Some(msg);
            }
        }
        let msg = delivered.expect("message should be fully reassembled");
        assert_eq!(msg.data, data);
        assert_eq!(msg.src, src);

        let eoma = rx.drain_outbound();
        assert_eq!(eoma.len(), 1);
        tx.on_control_frame(dst, src, false, true, &eoma[0].data);
        assert!(tx.tx_sessions.is_empty());
    }

    #[test]
    fn bam_broadcast_paces_dt_frames_50ms_apart() {
        let mut tx = TransportLayer::new(4);
        let pgn: Pgn = 0x00FE00;
        let data: Vec<u8> = alloc::vec![1, 2, 3, 4, 5, 6, 7, 8, 9, 10];
        tx.start_tp(pgn, data, 0x10, crate::types::BROADCAST_ADDRESS, true).unwrap();

        let bam = tx.drain_outbound();
        assert_eq!(bam.len(), 1);
        assert_eq!(bam[0].data[0], tp::CM_BAM);

        assert!(tx.drain_outbound().is_empty());
        tx.update(49);
        assert!(tx.drain_outbound().is_empty());
        tx.update(1);
        let dt1 = tx.drain_outbound();
        assert_eq!(dt1.len(), 1);

        tx.update(50);
        let dt2 = tx.drain_outbound();
        assert_eq!(dt2.len(), 1);
        assert!(tx.tx_sessions.is_empty());
    }

    #[test]
    fn stalled_rx_session_is_evicted_after_t1() {
        let mut rx = TransportLayer::new(4);
        let pgn: Pgn = 0x00FF00;
        let rts = tp::encode_rts(20, 3, 0xFF, pgn);
        rx.on_control_frame(0x10, 0x20, false, true, &rts);
        rx.drain_outbound();
        rx.update(session::timeouts::T1_MS);
        assert!(rx.rx_sessions.is_empty());
    }
}
