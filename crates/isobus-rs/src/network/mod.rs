//! The central hub: address claiming, partner resolution, per-port transmit
//! serialization, bus-load metering, PGN dispatch (§4.2).

pub mod address_claim;
pub mod bus_load;
pub mod control_function;

use alloc::boxed::Box;
use alloc::collections::{BTreeMap, BTreeSet};
use alloc::vec::Vec;

pub use address_claim::{AddressClaim, AddressClaimState, ClaimAction};
pub use bus_load::BusLoad;
pub use control_function::{CfState, CfType, ControlFunction, NameFilter, NameFilterField, PartnerCf};

use crate::error::{IsobusError, Result};
use crate::frame::{self, pgn_table};
use crate::hal::{Frame, FrameEndpoint};
use crate::message::Message;
use crate::name::Name;
use crate::transport::{etp, tp, TransportLayer};
use crate::types::{Address, Pgn, Priority, BROADCAST_ADDRESS, DEFAULT_PRIORITY, NULL_ADDRESS};

/// Opaque handle to an internal [`ControlFunction`] owned by a [`NetworkManager`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CfHandle(usize);

/// Opaque handle to a [`PartnerCf`] owned by a [`NetworkManager`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartnerHandle(usize);

/// Construction-time tuning for a [`NetworkManager`].
#[derive(Debug, Clone, Copy)]
pub struct NetworkConfig {
    pub num_ports: u8,
    pub enable_bus_load: bool,
    pub max_concurrent_tx_sessions_per_port: usize,
    pub rx_batch_per_update: usize,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        NetworkConfig {
            num_ports: 1,
            enable_bus_load: true,
            max_concurrent_tx_sessions_per_port: 4,
            rx_batch_per_update: 32,
        }
    }
}

struct InternalCfEntry {
    cf: ControlFunction,
    claim: AddressClaim,
}

struct PortState {
    endpoint: Option<Box<dyn FrameEndpoint>>,
    transport: TransportLayer,
    bus_load: BusLoad,
}

impl PortState {
    fn new(max_tx_sessions: usize) -> Self {
        PortState {
            endpoint: None,
            transport: TransportLayer::new(max_tx_sessions),
            bus_load: BusLoad::new(),
        }
    }

    /// Drain whatever the transport layer queued and push it to the wire.
    fn flush(&mut self) {
        let frames = self.transport.drain_outbound();
        if frames.is_empty() {
            return;
        }
        let Some(endpoint) = self.endpoint.as_mut() else { return };
        for of in frames {
            let priority = pgn_table::pgn_lookup(of.pgn).map(|i| i.default_priority).unwrap_or(7);
            if let Ok(id) = frame::encode(priority, of.pgn, of.src, of.dst) {
                let can_frame = Frame::new(id, &of.data, 0);
                if endpoint.send(&can_frame).is_ok() {
                    self.bus_load.record_frame(can_frame.dlc);
                }
            }
        }
    }
}

/// The central dispatch hub owning every internal [`ControlFunction`], every
/// live transport session, and per-port transmit/receive state.
pub struct NetworkManager {
    config: NetworkConfig,
    ports: Vec<PortState>,
    internal: Vec<InternalCfEntry>,
    partners: Vec<PartnerCf>,
    external: Vec<ControlFunction>,
    pgn_callbacks: BTreeMap<Pgn, Vec<Box<dyn FnMut(&Message)>>>,
    fast_packet_pgns: BTreeSet<Pgn>,
}

impl NetworkManager {
    pub fn new(config: NetworkConfig) -> Self {
        let ports = (0..config.num_ports)
            .map(|_| PortState::new(config.max_concurrent_tx_sessions_per_port))
            .collect();
        NetworkManager {
            config,
            ports,
            internal: Vec::new(),
            partners: Vec::new(),
            external: Vec::new(),
            pgn_callbacks: BTreeMap::new(),
            fast_packet_pgns: BTreeSet::new(),
        }
    }

    /// Register a new internal control function and start its address-claim
    /// FSM targeting `preferred_address`.
    pub fn create_internal(&mut self, name: Name, port: u8, preferred_address: Address) -> Result<CfHandle> {
        if port as usize >= self.ports.len() {
            return Err(IsobusError::InvalidArgument("port out of range"));
        }
        let cf = ControlFunction::new(name, port, CfType::Internal);
        let mut claim = AddressClaim::new(name, preferred_address);
        claim.start();
        self.internal.push(InternalCfEntry { cf, claim });
        Ok(CfHandle(self.internal.len() - 1))
    }

    /// Register a filter-based handle; `on_partner_found`-style observation
    /// happens by polling [`NetworkManager::partner`] after each `update`.
    pub fn create_partner(&mut self, port: u8, filters: Vec<NameFilter>) -> Result<PartnerHandle> {
        if port as usize >= self.ports.len() {
            return Err(IsobusError::InvalidArgument("port out of range"));
        }
        self.partners.push(PartnerCf::new(port, filters));
        Ok(PartnerHandle(self.partners.len() - 1))
    }

    pub fn control_function(&self, handle: CfHandle) -> &ControlFunction {
        &self.internal[handle.0].cf
    }

    pub fn partner(&self, handle: PartnerHandle) -> &PartnerCf {
        &self.partners[handle.0]
    }

    /// Register a callback fired once a matched partner vanishes, either
    /// because a CannotClaim was heard for its NAME or because no fresh
    /// AddressClaimed arrived within [`control_function::PARTNER_LOST_TIMEOUT_MS`].
    pub fn register_partner_lost_callback(&mut self, handle: PartnerHandle, callback: impl FnMut() + 'static) {
        self.partners[handle.0].on_partner_lost(callback);
    }

    /// Bind a CAN driver to a port. Without an endpoint, `send` fails with
    /// `NotReady` for that port.
    pub fn set_endpoint(&mut self, port: u8, endpoint: Box<dyn FrameEndpoint>) -> Result<()> {
        let port_state = self.ports.get_mut(port as usize).ok_or(IsobusError::InvalidArgument("port out of range"))?;
        port_state.endpoint = Some(endpoint);
        Ok(())
    }

    pub fn register_pgn_callback(&mut self, pgn: Pgn, callback: impl FnMut(&Message) + 'static) {
        self.pgn_callbacks.entry(pgn).or_default().push(Box::new(callback));
    }

    /// Declare that `pgn` carries Fast Packet framing on receive.
    pub fn register_fast_packet_pgn(&mut self, pgn: Pgn) {
        self.fast_packet_pgns.insert(pgn);
        for port in &mut self.ports {
            port.transport.register_fast_packet_pgn(pgn);
        }
    }

    pub fn bus_load(&self, port: u8) -> f32 {
        self.ports.get(port as usize).map(|p| p.bus_load.load_percent()).unwrap_or(0.0)
    }

    /// The single transmit entry point (§4.2).
    pub fn send(&mut self, pgn: Pgn, data: &[u8], source: CfHandle, dest: Option<Address>, priority: Option<Priority>) -> Result<()> {
        let entry = self.internal.get(source.0).ok_or(IsobusError::InvalidArgument("unknown control function"))?;
        if !entry.cf.is_online() {
            return Err(IsobusError::InvalidState("source control function has not claimed an address"));
        }
        let src_addr = entry.cf.address();
        let port_index = entry.cf.port;

        let is_pdu2 = frame::pgn_is_pdu2(pgn);
        if !is_pdu2 && dest.is_none() {
            return Err(IsobusError::InvalidArgument("PDU1 PGN requires a destination"));
        }

        let port_state = self.ports.get_mut(port_index as usize).ok_or(IsobusError::NotReady)?;
        if port_state.endpoint.is_none() {
            return Err(IsobusError::NotReady);
        }

        let prio = priority.unwrap_or_else(|| pgn_table::pgn_lookup(pgn).map(|i| i.default_priority).unwrap_or(DEFAULT_PRIORITY));

        if data.len() <= 8 {
            let dst = dest.unwrap_or(BROADCAST_ADDRESS);
            let id = frame::encode(prio, pgn, src_addr, dst)?;
            let can_frame = Frame::new(id, data, 0);
            let endpoint = port_state.endpoint.as_mut().unwrap();
            endpoint.send(&can_frame)?;
            port_state.bus_load.record_frame(can_frame.dlc);
            return Ok(());
        }

        if data.len() <= tp::MAX_TP_SIZE {
            match dest {
                Some(d) => port_state.transport.start_tp(pgn, data.to_vec(), src_addr, d, false)?,
                None => port_state.transport.start_tp(pgn, data.to_vec(), src_addr, BROADCAST_ADDRESS, true)?,
            }
            port_state.flush();
            return Ok(());
        }

        if (data.len() as u64) <= etp::MAX_ETP_SIZE {
            let d = dest.ok_or(IsobusError::InvalidArgument("ETP cannot be broadcast"))?;
            port_state.transport.start_etp(pgn, data.to_vec(), src_addr, d)?;
            port_state.flush();
            return Ok(());
        }

        Err(IsobusError::MessageTooLarge)
    }

    /// Single-threaded tick: drains incoming frames, advances address claim
    /// and transport sessions, and updates the bus-load window.
    pub fn update(&mut self, elapsed_ms: u32) {
        for entry in self.internal.iter_mut() {
            let actions = entry.claim.update(elapsed_ms);
            if let Some(port_state) = self.ports.get_mut(entry.cf.port as usize) {
                for action in actions {
                    emit_claim_action(port_state, entry.cf.name, action);
                }
            }
            if entry.claim.is_online() {
                entry.cf.set_address(entry.claim.candidate_address());
            } else {
                entry.cf.go_offline();
            }
        }

        for port_state in self.ports.iter_mut() {
            port_state.transport.update(elapsed_ms);
            if self.config.enable_bus_load {
                port_state.bus_load.update(elapsed_ms);
            }
            port_state.flush();
        }

        for port_idx in 0..self.ports.len() {
            self.drain_port(port_idx as u8, elapsed_ms);
        }

        for partner in self.partners.iter_mut() {
            partner.update(elapsed_ms);
        }
    }

    fn drain_port(&mut self, port: u8, elapsed_ms: u32) {
        let batch = self.config.rx_batch_per_update;
        let mut pending = Vec::with_capacity(batch);
        {
            let Some(port_state) = self.ports.get_mut(port as usize) else { return };
            let Some(endpoint) = port_state.endpoint.as_mut() else { return };
            for _ in 0..batch {
                match endpoint.try_recv() {
                    Some(f) => pending.push(f),
                    None => break,
                }
            }
        }

        for raw in pending {
            let decoded = frame::decode(raw.id);
            let payload = raw.payload();

            if decoded.pgn == pgn_table::PGN_ADDRESS_CLAIMED {
                self.handle_address_claimed(port, decoded.src, payload);
                continue;
            }

            if decoded.pgn == pgn_table::PGN_REQUEST && payload.len() >= 3 {
                let requested = u32::from_le_bytes([payload[0], payload[1], payload[2], 0]);
                if requested == pgn_table::PGN_ADDRESS_CLAIMED {
                    self.handle_request_for_claim(port);
                    continue;
                }
            }

            let addressed_to_us = decoded.dst == BROADCAST_ADDRESS
                || self.internal.iter().any(|e| e.cf.port == port && e.cf.address() == decoded.dst);

            let Some(port_state) = self.ports.get_mut(port as usize) else { continue };

            if decoded.pgn == pgn_table::PGN_TP_CM {
                if addressed_to_us {
                    port_state.transport.on_control_frame(decoded.src, decoded.dst, decoded.dst == BROADCAST_ADDRESS, true, payload);
                }
            } else if decoded.pgn == pgn_table::PGN_ETP_CM {
                if addressed_to_us {
                    port_state.transport.on_control_frame(decoded.src, decoded.dst, false, false, payload);
                }
            } else if decoded.pgn == pgn_table::PGN_TP_DT {
                if addressed_to_us {
                    if let Ok(Some(msg)) = port_state.transport.on_data_frame(decoded.src, payload, raw.timestamp_us, decoded.priority) {
                        self.dispatch(port, msg);
                    }
                }
            } else if decoded.pgn == pgn_table::PGN_ETP_DT {
                if addressed_to_us {
                    if let Ok(Some(msg)) = port_state.transport.on_data_frame(decoded.src, payload, raw.timestamp_us, decoded.priority) {
                        self.dispatch(port, msg);
                    }
                }
            } else if port_state.transport.is_fast_packet_pgn(decoded.pgn) {
                if let Some(msg) = port_state.transport.fast_packet_accept(decoded.pgn, decoded.src, decoded.dst, decoded.priority, payload, raw.timestamp_us) {
                    self.dispatch(port, msg);
                }
            } else if addressed_to_us {
                let msg = Message {
                    pgn: decoded.pgn,
                    src: decoded.src,
                    dst: decoded.dst,
                    priority: decoded.priority,
                    data: payload.to_vec(),
                    timestamp_us: raw.timestamp_us,
                };
                self.dispatch(port, msg);
            }
        }

        if let Some(port_state) = self.ports.get_mut(port as usize) {
            port_state.flush();
        }
        let _ = elapsed_ms;
    }

    fn handle_address_claimed(&mut self, port: u8, src: Address, payload: &[u8]) {
        if payload.len() < 8 {
            return;
        }
        let peer_name = Name::from_bytes(payload);

        if src == NULL_ADDRESS {
            self.external.retain(|cf| cf.name != peer_name);
            for partner in self.partners.iter_mut() {
                if partner.found().map(|cf| cf.name) == Some(peer_name) {
                    partner.detach();
                }
            }
        } else if let Some(cf) = self.external.iter_mut().find(|cf| cf.name == peer_name && cf.port == port) {
            cf.set_address(src);
        } else {
            let mut cf = ControlFunction::new(peer_name, port, CfType::External);
            cf.set_address(src);
            self.external.push(cf);
        }

        let mut actions = Vec::new();
        for entry in self.internal.iter_mut() {
            if entry.cf.port != port {
                continue;
            }
            if let Some(action) = entry.claim.handle_external_claim(src, peer_name) {
                actions.push(action);
            }
            if entry.claim.is_online() {
                entry.cf.set_address(entry.claim.candidate_address());
            }
        }
        if let Some(port_state) = self.ports.get_mut(port as usize) {
            for action in actions {
                emit_claim_action(port_state, peer_name, action);
            }
        }

        let known_addr = if src == NULL_ADDRESS { None } else { Some(src) };
        for partner in self.partners.iter_mut() {
            if partner.port != port {
                continue;
            }
            if partner.is_found() {
                if known_addr.is_some() && partner.found().map(|cf| cf.name) == Some(peer_name) {
                    partner.note_activity();
                }
                continue;
            }
            if partner.matches(peer_name) {
                if let Some(addr) = known_addr {
                    let mut cf = ControlFunction::new(peer_name, port, CfType::Partnered);
                    cf.set_address(addr);
                    partner.attach(cf);
                }
            }
        }
    }

    fn handle_request_for_claim(&mut self, port: u8) {
        let mut actions = Vec::new();
        for entry in self.internal.iter() {
            if entry.cf.port != port {
                continue;
            }
            if entry.cf.is_online() {
                actions.push(ClaimAction::SendAddressClaimed { address: entry.cf.address() });
            } else if let Some(action) = entry.claim.handle_request_while_unable() {
                actions.push(action);
            }
        }
        let name = self.internal.iter().find(|e| e.cf.port == port).map(|e| e.cf.name).unwrap_or(Name::new(0));
        if let Some(port_state) = self.ports.get_mut(port as usize) {
            for action in actions {
                emit_claim_action(port_state, name, action);
            }
        }
    }

    fn dispatch(&mut self, port: u8, msg: Message) {
        let for_us = msg.dst == BROADCAST_ADDRESS || self.internal.iter().any(|e| e.cf.port == port && e.cf.address() == msg.dst);
        if !for_us {
            return;
        }
        if let Some(callbacks) = self.pgn_callbacks.get_mut(&msg.pgn) {
            for cb in callbacks.iter_mut() {
                cb(&msg);
            }
        }
    }
}

fn emit_claim_action(port_state: &mut PortState, name: Name, action: ClaimAction) {
    let Some(endpoint) = port_state.endpoint.as_mut() else { return };
    let (pgn, src, data): (Pgn, Address, [u8; 8]) = match action {
        ClaimAction::SendRequestForClaim => {
            let pb = pgn_table::PGN_ADDRESS_CLAIMED.to_le_bytes();
            (pgn_table::PGN_REQUEST, NULL_ADDRESS, [pb[0], pb[1], pb[2], 0xFF, 0xFF, 0xFF, 0xFF, 0xFF])
        }
        ClaimAction::SendAddressClaimed { address } => (pgn_table::PGN_ADDRESS_CLAIMED, address, name.to_bytes()),
        ClaimAction::SendCannotClaim => (pgn_table::PGN_ADDRESS_CLAIMED, NULL_ADDRESS, name.to_bytes()),
    };
    let len = if pgn == pgn_table::PGN_REQUEST { 3 } else { 8 };
    if let Ok(id) = frame::encode(6, pgn, src, BROADCAST_ADDRESS) {
        let can_frame = Frame::new(id, &data[..len], 0);
        if endpoint.send(&can_frame).is_ok() {
            port_state.bus_load.record_frame(can_frame.dlc);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::collections::VecDeque;
    use alloc::rc::Rc;
    use core::cell::RefCell;

    #[derive(Default)]
    struct LoopbackEndpoint {
        outbox: Rc<RefCell<VecDeque<Frame>>>,
        inbox: VecDeque<Frame>,
    }

    impl FrameEndpoint for LoopbackEndpoint {
        fn send(&mut self, frame: &Frame) -> Result<()> {
            self.outbox.borrow_mut().push_back(*frame);
            Ok(())
        }

        fn try_recv(&mut self) -> Option<Frame> {
            self.inbox.pop_front()
        }
    }

    #[test]
    fn single_internal_cf_claims_address_over_three_ticks() {
        let mut nm = NetworkManager::new(NetworkConfig { num_ports: 1, ..Default::default() });
        let handle = nm.create_internal(Name::new(0x8000_0000_0000_002A), 0, 0x28).unwrap();
        nm.set_endpoint(0, Box::new(LoopbackEndpoint::default())).unwrap();

        nm.update(200);
        nm.update(200);
        nm.update(200);

        assert!(nm.control_function(handle).is_online());
        assert_eq!(nm.control_function(handle).address(), 0x28);
    }

    #[test]
    fn send_before_online_fails_with_invalid_state() {
        let mut nm = NetworkManager::new(NetworkConfig { num_ports: 1, ..Default::default() });
        let handle = nm.create_internal(Name::new(1), 0, 0x10).unwrap();
        nm.set_endpoint(0, Box::new(LoopbackEndpoint::default())).unwrap();
        let err = nm.send(0x00FF00, &[1, 2, 3], handle, None, None).unwrap_err();
        assert_eq!(err, IsobusError::InvalidState("source control function has not claimed an address"));
    }

    #[test]
    fn cannot_claim_detaches_matching_partner() {
        let mut nm = NetworkManager::new(NetworkConfig { num_ports: 1, ..Default::default() });
        let outbox = Rc::new(RefCell::new(VecDeque::new()));
        let mut endpoint = LoopbackEndpoint { outbox: outbox.clone(), inbox: VecDeque::new() };

        let peer_name = Name::new(0x8000_0000_0000_0099);
        let handle = nm.create_partner(0, alloc::vec![NameFilter::new(NameFilterField::IdentityNumber, peer_name.identity_number())]).unwrap();

        let claim_id = frame::encode(6, pgn_table::PGN_ADDRESS_CLAIMED, 0x33, BROADCAST_ADDRESS).unwrap();
        endpoint.inbox.push_back(Frame::new(claim_id, &peer_name.to_bytes(), 0));
        nm.set_endpoint(0, Box::new(endpoint)).unwrap();
        nm.update(10);
        assert!(nm.partner(handle).is_found());

        let mut endpoint2 = LoopbackEndpoint { outbox, inbox: VecDeque::new() };
        let cannot_claim_id = frame::encode(6, pgn_table::PGN_ADDRESS_CLAIMED, NULL_ADDRESS, BROADCAST_ADDRESS).unwrap();
        endpoint2.inbox.push_back(Frame::new(cannot_claim_id, &peer_name.to_bytes(), 0));
        nm.set_endpoint(0, Box::new(endpoint2)).unwrap();
        nm.update(10);
        assert!(!nm.partner(handle).is_found());
    }

    #[test]
    fn stale_partner_is_evicted_during_update() {
        let mut nm = NetworkManager::new(NetworkConfig { num_ports: 1, ..Default::default() });
        let mut endpoint = LoopbackEndpoint::default();
        let peer_name = Name::new(0x8000_0000_0000_0099);
        let handle = nm.create_partner(0, alloc::vec![NameFilter::new(NameFilterField::IdentityNumber, peer_name.identity_number())]).unwrap();

        let claim_id = frame::encode(6, pgn_table::PGN_ADDRESS_CLAIMED, 0x33, BROADCAST_ADDRESS).unwrap();
        endpoint.inbox.push_back(Frame::new(claim_id, &peer_name.to_bytes(), 0));
        nm.set_endpoint(0, Box::new(endpoint)).unwrap();
        nm.update(10);
        assert!(nm.partner(handle).is_found());

        nm.update(control_function::PARTNER_LOST_TIMEOUT_MS);
        assert!(!nm.partner(handle).is_found());
    }

    #[test]
    fn oversized_broadcast_is_rejected() {
        let mut nm = NetworkManager::new(NetworkConfig { num_ports: 1, ..Default::default() });
        let handle = nm.create_internal(Name::new(0x8000_0000_0000_0001), 0, 0x30).unwrap();
        nm.set_endpoint(0, Box::new(LoopbackEndpoint::default())).unwrap();
        nm.update(200);
        nm.update(200);
        nm.update(200);
        assert!(nm.control_function(handle).is_online());

        let big = alloc::vec![0u8; 2000];
        let err = nm.send(0x00FE00, &big, handle, None, None).unwrap_err();
        assert_eq!(err, IsobusError::InvalidArgument("ETP cannot be broadcast"));
    }
}
