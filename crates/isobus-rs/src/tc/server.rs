//! Task Controller server (§4.5), grounded on the original's `server.hpp`.
//!
//! Like [`super::client::TcClient`], this never holds a `NetworkManager`
//! reference; it returns [`TcAction`]s for the application to place on the
//! wire and is fed incoming messages via [`TcServer::on_message`].

use alloc::boxed::Box;
use alloc::vec::Vec;

use crate::frame::pgn_table;
use crate::message::Message;
use crate::types::Address;
use crate::util::Timer;

use super::ddop::Ddop;
use super::objects::ElementNumber;
use super::process_data::{decode_value, encode_acknowledge, encode_status, encode_technical_capabilities, ProcessDataAckError, ProcessDataCommand};

pub const STATUS_INTERVAL_MS: u32 = 2000;

#[derive(Debug, Clone, Copy)]
pub struct TcServerConfig {
    pub tc_number: u8,
    pub tc_version: u8,
    pub num_booms: u8,
    pub num_sections: u8,
    pub num_channels: u8,
    pub server_options: u8,
}

impl Default for TcServerConfig {
    fn default() -> Self {
        TcServerConfig {
            tc_number: 1,
            tc_version: 4,
            num_booms: 1,
            num_sections: 16,
            num_channels: 8,
            server_options: 0,
        }
    }
}

struct ClientInfo {
    address: Address,
    ddop: Option<Ddop>,
    pool_activated: bool,
}

pub enum TcAction {
    Frame { pgn: crate::types::Pgn, dst: Address, data: [u8; 8] },
}

type PeerControlCb = Box<dyn FnMut(ElementNumber, u16, ElementNumber, u16) -> ProcessDataAckError>;
type ValueRequestCb = Box<dyn FnMut(Address, ElementNumber, u16) -> Option<i32>>;
type ValueReceivedCb = Box<dyn FnMut(Address, ElementNumber, u16, i32) -> ProcessDataAckError>;

pub struct TcServer {
    config: TcServerConfig,
    clients: Vec<ClientInfo>,
    status_timer: Timer,
    task_active: bool,
    on_client_connected: Option<Box<dyn FnMut(Address)>>,
    on_client_disconnected: Option<Box<dyn FnMut(Address)>>,
    on_pool_activation_error: Option<Box<dyn FnMut(Address, crate::error::PoolValidationError)>>,
    on_peer_control: Option<PeerControlCb>,
    on_value_request: Option<ValueRequestCb>,
    on_value_received: Option<ValueReceivedCb>,
}

impl TcServer {
    pub fn new(config: TcServerConfig) -> Self {
        TcServer {
            config,
            clients: Vec::new(),
            status_timer: Timer::new(STATUS_INTERVAL_MS, true),
            task_active: false,
            on_client_connected: None,
            on_client_disconnected: None,
            on_pool_activation_error: None,
            on_peer_control: None,
            on_value_request: None,
            on_value_received: None,
        }
    }

    pub fn start(&mut self) {
        self.status_timer.start();
    }

    pub fn stop(&mut self) {
        self.status_timer.stop();
        self.clients.clear();
    }

    pub fn set_task_active(&mut self, active: bool) {
        self.task_active = active;
    }

    pub fn on_client_connected(&mut self, cb: impl FnMut(Address) + 'static) {
        self.on_client_connected = Some(Box::new(cb));
    }

    pub fn on_client_disconnected(&mut self, cb: impl FnMut(Address) + 'static) {
        self.on_client_disconnected = Some(Box::new(cb));
    }

    pub fn on_pool_activation_error(&mut self, cb: impl FnMut(Address, crate::error::PoolValidationError) + 'static) {
        self.on_pool_activation_error = Some(Box::new(cb));
    }

    pub fn on_peer_control(&mut self, cb: impl FnMut(ElementNumber, u16, ElementNumber, u16) -> ProcessDataAckError + 'static) {
        self.on_peer_control = Some(Box::new(cb));
    }

    pub fn on_value_request(&mut self, cb: impl FnMut(Address, ElementNumber, u16) -> Option<i32> + 'static) {
        self.on_value_request = Some(Box::new(cb));
    }

    pub fn on_value_received(&mut self, cb: impl FnMut(Address, ElementNumber, u16, i32) -> ProcessDataAckError + 'static) {
        self.on_value_received = Some(Box::new(cb));
    }

    pub fn client_ddop(&self, address: Address) -> Option<&Ddop> {
        self.clients.iter().find(|c| c.address == address).and_then(|c| c.ddop.as_ref())
    }

    pub fn is_pool_activated(&self, address: Address) -> bool {
        self.clients.iter().any(|c| c.address == address && c.pool_activated)
    }

    fn client_mut(&mut self, address: Address) -> &mut ClientInfo {
        if let Some(idx) = self.clients.iter().position(|c| c.address == address) {
            return &mut self.clients[idx];
        }
        self.clients.push(ClientInfo { address, ddop: None, pool_activated: false });
        if let Some(cb) = self.on_client_connected.as_mut() {
            cb(address);
        }
        self.clients.last_mut().expect("just pushed")
    }

    pub fn update(&mut self, elapsed_ms: u32) -> Vec<TcAction> {
        let mut actions = Vec::new();
        if self.status_timer.update(elapsed_ms) {
            let data = encode_status(
                self.config.tc_number,
                self.task_active as u8,
                self.config.tc_version,
                self.config.server_options,
                self.config.num_booms,
                self.config.num_sections,
                self.config.num_channels,
            );
            actions.push(TcAction::Frame { pgn: pgn_table::PGN_TC_TO_ECU, dst: crate::types::BROADCAST_ADDRESS, data });
        }
        actions
    }

    pub fn on_message(&mut self, msg: &Message) -> Vec<TcAction> {
        if msg.pgn != pgn_table::PGN_ECU_TO_TC {
            return Vec::new();
        }

        if msg.data.len() > 8 {
            return self.handle_ddop_upload(msg.src, &msg.data);
        }

        let Some(frame) = decode_value(&msg.data) else { return Vec::new() };
        match frame.command {
            ProcessDataCommand::TechnicalCapabilities => {
                self.client_mut(msg.src);
                let data = encode_technical_capabilities(self.config.tc_version, self.config.num_booms, self.config.num_sections, self.config.num_channels);
                alloc::vec![TcAction::Frame { pgn: pgn_table::PGN_TC_TO_ECU, dst: msg.src, data }]
            }
            ProcessDataCommand::DeviceDescriptor => {
                // Subcommand 0x01 ("activate"): the pool itself already
                // arrived as a reassembled multi-frame message, handled in
                // `handle_ddop_upload` above.
                if frame.value == 1 {
                    let err = self.clients.iter().find(|c| c.address == msg.src).and_then(|c| c.ddop.as_ref()).map(Ddop::validate);
                    let ack_value = match err {
                        Some(Ok(())) => {
                            if let Some(c) = self.clients.iter_mut().find(|c| c.address == msg.src) {
                                c.pool_activated = true;
                            }
                            0
                        }
                        Some(Err(e)) => {
                            if let Some(cb) = self.on_pool_activation_error.as_mut() {
                                cb(msg.src, e);
                            }
                            1
                        }
                        None => 1,
                    };
                    let data = encode_acknowledge(0, 0, if ack_value == 0 { ProcessDataAckError::Ok } else { ProcessDataAckError::InvalidElementNumber });
                    return alloc::vec![TcAction::Frame { pgn: pgn_table::PGN_TC_TO_ECU, dst: msg.src, data }];
                }
                Vec::new()
            }
            ProcessDataCommand::RequestValue => {
                if let Some(cb) = self.on_value_request.as_mut() {
                    if let Some(_value) = cb(msg.src, frame.element, frame.ddi) {
                        // Caller is expected to reply with a Value frame via
                        // its own channel; the server only brokers the ask.
                    }
                }
                Vec::new()
            }
            ProcessDataCommand::Value => {
                if let Some(cb) = self.on_value_received.as_mut() {
                    cb(msg.src, frame.element, frame.ddi, frame.value);
                }
                Vec::new()
            }
            ProcessDataCommand::PeerControlAssignment => {
                let dest_element = ((msg.data[4] as u16) | ((msg.data[5] as u16) << 8)) & 0x0FFF;
                let dest_ddi = u16::from_le_bytes([msg.data[6], msg.data[7]]);
                let result = if let Some(cb) = self.on_peer_control.as_mut() {
                    cb(frame.element, frame.ddi, dest_element, dest_ddi)
                } else {
                    ProcessDataAckError::NoProcessingResourcesAvailable
                };
                let data = encode_acknowledge(frame.element, frame.ddi, result);
                alloc::vec![TcAction::Frame { pgn: pgn_table::PGN_TC_TO_ECU, dst: msg.src, data }]
            }
            ProcessDataCommand::ClientTask => {
                self.client_mut(msg.src);
                Vec::new()
            }
            _ => Vec::new(),
        }
    }

    fn handle_ddop_upload(&mut self, src: Address, data: &[u8]) -> Vec<TcAction> {
        match Ddop::deserialize(data) {
            Ok(ddop) => {
                let client = self.client_mut(src);
                client.ddop = Some(ddop);
                let data = encode_acknowledge(0, 0, ProcessDataAckError::Ok);
                alloc::vec![TcAction::Frame { pgn: pgn_table::PGN_TC_TO_ECU, dst: src, data }]
            }
            Err(_) => {
                let data = encode_acknowledge(0, 0, ProcessDataAckError::InvalidElementNumber);
                alloc::vec![TcAction::Frame { pgn: pgn_table::PGN_TC_TO_ECU, dst: src, data }]
            }
        }
    }

    pub fn disconnect_client(&mut self, address: Address) {
        if let Some(idx) = self.clients.iter().position(|c| c.address == address) {
            self.clients.remove(idx);
            if let Some(cb) = self.on_client_disconnected.as_mut() {
                cb(address);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn technical_capabilities_request_is_answered() {
        let mut server = TcServer::new(TcServerConfig::default());
        server.start();
        let msg = Message {
            pgn: pgn_table::PGN_ECU_TO_TC,
            src: 0x10,
            dst: crate::types::BROADCAST_ADDRESS,
            priority: 6,
            data: alloc::vec![ProcessDataCommand::TechnicalCapabilities.code(), 0, 0, 0, 0, 0, 0, 0],
            timestamp_us: 0,
        };
        let actions = server.on_message(&msg);
        assert_eq!(actions.len(), 1);
    }

    #[test]
    fn status_broadcasts_on_interval() {
        let mut server = TcServer::new(TcServerConfig::default());
        server.start();
        assert!(server.update(1999).is_empty());
        let actions = server.update(1);
        assert_eq!(actions.len(), 1);
    }
}
