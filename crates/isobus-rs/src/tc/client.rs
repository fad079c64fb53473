//! Task Controller client state machine (§4.5), grounded on the teacher's
//! cooperative FSM style (see [`crate::network::address_claim`]) rather than
//! the original's direct `NetworkManager&` ownership, since the core never
//! holds a reference back into its own caller.

use alloc::boxed::Box;
use alloc::vec::Vec;

use crate::error::{AbortReason, PoolActivationError};
use crate::frame::pgn_table;
use crate::message::Message;
use crate::types::{Address, Pgn};

use super::ddop::Ddop;
use super::objects::ElementNumber;
use super::process_data::{decode_value, encode_acknowledge, encode_technical_capabilities, encode_value, ProcessDataAckError, ProcessDataCommand};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TcClientState {
    Disconnected,
    WaitForStartup,
    WaitForServerStatus,
    SendWorkingSetMaster,
    RequestVersion,
    WaitForVersion,
    ProcessDdop,
    TransferDdop,
    WaitForPoolResponse,
    ActivatePool,
    WaitForActivation,
    Connected,
}

#[derive(Debug, Clone, Copy)]
pub struct TcClientConfig {
    pub boot_delay_ms: u32,
    pub state_timeout_ms: u32,
    pub tc_version: u8,
}

impl Default for TcClientConfig {
    fn default() -> Self {
        TcClientConfig {
            boot_delay_ms: 1000,
            state_timeout_ms: 6000,
            tc_version: 4,
        }
    }
}

/// Something the application must turn into a [`crate::network::NetworkManager::send`]
/// call on the client's behalf.
pub enum TcAction {
    Frame { pgn: Pgn, dst: Option<Address>, data: [u8; 8] },
    StartDdopTransfer { dst: Address, data: Vec<u8> },
}

type ValueRequestCb = Box<dyn FnMut(ElementNumber, u16) -> Option<i32>>;
type ValueCommandCb = Box<dyn FnMut(ElementNumber, u16, i32)>;

/// Drives a single connection to one Task Controller server.
pub struct TcClient {
    config: TcClientConfig,
    state: TcClientState,
    elapsed_in_state: u32,
    server_address: Address,
    pending_ddop: Option<Ddop>,
    active_ddop: Option<Ddop>,
    on_connected: Option<Box<dyn FnMut()>>,
    on_connection_failed: Option<Box<dyn FnMut(&'static str)>>,
    on_transfer_failed: Option<Box<dyn FnMut(AbortReason)>>,
    on_pool_activation_error: Option<Box<dyn FnMut(PoolActivationError)>>,
    on_value_request: Option<ValueRequestCb>,
    on_value_command: Option<ValueCommandCb>,
}

impl TcClient {
    pub fn new(config: TcClientConfig) -> Self {
        TcClient {
            config,
            state: TcClientState::Disconnected,
            elapsed_in_state: 0,
            server_address: crate::types::NULL_ADDRESS,
            pending_ddop: None,
            active_ddop: None,
            on_connected: None,
            on_connection_failed: None,
            on_transfer_failed: None,
            on_pool_activation_error: None,
            on_value_request: None,
            on_value_command: None,
        }
    }

    pub fn state(&self) -> TcClientState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == TcClientState::Connected
    }

    pub fn on_connected(&mut self, cb: impl FnMut() + 'static) {
        self.on_connected = Some(Box::new(cb));
    }

    pub fn on_connection_failed(&mut self, cb: impl FnMut(&'static str) + 'static) {
        self.on_connection_failed = Some(Box::new(cb));
    }

    pub fn on_transfer_failed(&mut self, cb: impl FnMut(AbortReason) + 'static) {
        self.on_transfer_failed = Some(Box::new(cb));
    }

    pub fn on_pool_activation_error(&mut self, cb: impl FnMut(PoolActivationError) + 'static) {
        self.on_pool_activation_error = Some(Box::new(cb));
    }

    pub fn on_value_request(&mut self, cb: impl FnMut(ElementNumber, u16) -> Option<i32> + 'static) {
        self.on_value_request = Some(Box::new(cb));
    }

    pub fn on_value_command(&mut self, cb: impl FnMut(ElementNumber, u16, i32) + 'static) {
        self.on_value_command = Some(Box::new(cb));
    }

    /// Begin a connection attempt, carrying `ddop` as the pool to transfer.
    pub fn connect(&mut self, ddop: Ddop) {
        self.pending_ddop = Some(ddop);
        self.state = TcClientState::WaitForStartup;
        self.elapsed_in_state = 0;
    }

    pub fn disconnect(&mut self) {
        self.state = TcClientState::Disconnected;
        self.elapsed_in_state = 0;
        self.active_ddop = None;
        self.server_address = crate::types::NULL_ADDRESS;
    }

    fn fail(&mut self, reason: &'static str) {
        self.state = TcClientState::Disconnected;
        self.elapsed_in_state = 0;
        if let Some(cb) = self.on_connection_failed.as_mut() {
            cb(reason);
        }
    }

    /// Advance boot-delay and per-state timeout tracking. Transitions that
    /// require sending a frame in response to something we just received are
    /// driven by [`TcClient::on_message`]; this only handles time-based
    /// edges (startup delay, generic timeout).
    pub fn update(&mut self, elapsed_ms: u32) -> Vec<TcAction> {
        match self.state {
            TcClientState::Disconnected | TcClientState::Connected => {
                self.elapsed_in_state = 0;
                Vec::new()
            }
            TcClientState::WaitForStartup => {
                self.elapsed_in_state += elapsed_ms;
                if self.elapsed_in_state >= self.config.boot_delay_ms {
                    self.state = TcClientState::WaitForServerStatus;
                    self.elapsed_in_state = 0;
                }
                Vec::new()
            }
            _ => {
                self.elapsed_in_state += elapsed_ms;
                if self.elapsed_in_state >= self.config.state_timeout_ms {
                    self.fail("timeout");
                }
                Vec::new()
            }
        }
    }

    /// Called once the application observes that the DDOP transport session
    /// finished (successfully or not); the core has no completion event for a
    /// session it already forgot, so this is a deliberate external poke.
    pub fn notify_ddop_transfer_result(&mut self, outcome: core::result::Result<(), AbortReason>) -> Vec<TcAction> {
        if self.state != TcClientState::WaitForPoolResponse {
            return Vec::new();
        }
        match outcome {
            Ok(()) => Vec::new(),
            Err(reason) => {
                self.state = TcClientState::Disconnected;
                self.elapsed_in_state = 0;
                if let Some(cb) = self.on_transfer_failed.as_mut() {
                    cb(reason);
                }
                Vec::new()
            }
        }
    }

    pub fn on_message(&mut self, msg: &Message) -> Vec<TcAction> {
        if msg.pgn != pgn_table::PGN_TC_TO_ECU {
            return Vec::new();
        }

        match self.state {
            TcClientState::WaitForServerStatus => {
                if msg.data.first().copied() == Some(ProcessDataCommand::Status.code()) {
                    self.server_address = msg.src;
                    self.state = TcClientState::SendWorkingSetMaster;
                    self.elapsed_in_state = 0;
                    return self.cascade();
                }
                Vec::new()
            }
            TcClientState::WaitForVersion => {
                if msg.data.first().copied() == Some(ProcessDataCommand::TechnicalCapabilities.code()) {
                    self.state = TcClientState::ProcessDdop;
                    self.elapsed_in_state = 0;
                    return self.cascade();
                }
                Vec::new()
            }
            TcClientState::WaitForPoolResponse => {
                if let Some(frame) = decode_value(&msg.data) {
                    if frame.command == ProcessDataCommand::Acknowledge {
                        if frame.value == 0 {
                            self.state = TcClientState::ActivatePool;
                            self.elapsed_in_state = 0;
                            return self.cascade();
                        }
                        let err = activation_error_from_code(frame.value as u8);
                        self.state = TcClientState::Disconnected;
                        self.elapsed_in_state = 0;
                        if let Some(cb) = self.on_pool_activation_error.as_mut() {
                            cb(err);
                        }
                    }
                }
                Vec::new()
            }
            TcClientState::WaitForActivation => {
                if let Some(frame) = decode_value(&msg.data) {
                    if frame.command == ProcessDataCommand::Acknowledge && frame.value == 0 {
                        self.state = TcClientState::Connected;
                        self.elapsed_in_state = 0;
                        self.active_ddop = self.pending_ddop.take();
                        if let Some(cb) = self.on_connected.as_mut() {
                            cb();
                        }
                    }
                }
                Vec::new()
            }
            TcClientState::Connected => self.handle_connected_message(msg),
            _ => Vec::new(),
        }
    }

    fn handle_connected_message(&mut self, msg: &Message) -> Vec<TcAction> {
        let Some(frame) = decode_value(&msg.data) else { return Vec::new() };
        match frame.command {
            ProcessDataCommand::RequestValue => {
                if let Some(cb) = self.on_value_request.as_mut() {
                    if let Some(value) = cb(frame.element, frame.ddi) {
                        let data = encode_value(ProcessDataCommand::Value, frame.element, frame.ddi, value);
                        return alloc::vec![TcAction::Frame { pgn: pgn_table::PGN_ECU_TO_TC, dst: Some(self.server_address), data }];
                    }
                }
                Vec::new()
            }
            ProcessDataCommand::SetValueAndAcknowledge => {
                if let Some(cb) = self.on_value_command.as_mut() {
                    cb(frame.element, frame.ddi, frame.value);
                }
                let data = encode_acknowledge(frame.element, frame.ddi, ProcessDataAckError::Ok);
                alloc::vec![TcAction::Frame { pgn: pgn_table::PGN_ECU_TO_TC, dst: Some(self.server_address), data }]
            }
            _ => Vec::new(),
        }
    }

    /// Drive instantaneous (send-and-immediately-advance) states forward,
    /// the way [`crate::network::address_claim::AddressClaim::update`] does.
    fn cascade(&mut self) -> Vec<TcAction> {
        let mut actions = Vec::new();
        loop {
            match self.state {
                TcClientState::SendWorkingSetMaster => {
                    actions.push(TcAction::Frame {
                        pgn: pgn_table::PGN_WORKING_SET_MASTER,
                        dst: None,
                        data: [0x00, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF],
                    });
                    self.state = TcClientState::RequestVersion;
                }
                TcClientState::RequestVersion => {
                    actions.push(TcAction::Frame {
                        pgn: pgn_table::PGN_ECU_TO_TC,
                        dst: Some(self.server_address),
                        data: encode_technical_capabilities(self.config.tc_version, 0, 0, 0),
                    });
                    self.state = TcClientState::WaitForVersion;
                    self.elapsed_in_state = 0;
                    break;
                }
                TcClientState::ProcessDdop => {
                    let Some(ddop) = self.pending_ddop.as_ref() else {
                        self.fail("no DDOP to transfer");
                        break;
                    };
                    if ddop.validate().is_err() {
                        self.fail("DDOP validation failed");
                        break;
                    }
                    self.state = TcClientState::TransferDdop;
                }
                TcClientState::TransferDdop => {
                    let data = self.pending_ddop.as_ref().expect("validated above").serialize();
                    actions.push(TcAction::StartDdopTransfer { dst: self.server_address, data });
                    self.state = TcClientState::WaitForPoolResponse;
                    self.elapsed_in_state = 0;
                    break;
                }
                TcClientState::ActivatePool => {
                    // Subcommand carried in the value field: 1 = activate.
                    // Element and DDI are not applicable to this command.
                    let data = encode_value(ProcessDataCommand::DeviceDescriptor, 0, 0xFFFF, 1);
                    actions.push(TcAction::Frame {
                        pgn: pgn_table::PGN_ECU_TO_TC,
                        dst: Some(self.server_address),
                        data,
                    });
                    self.state = TcClientState::WaitForActivation;
                    self.elapsed_in_state = 0;
                    break;
                }
                _ => break,
            }
        }
        actions
    }
}

fn activation_error_from_code(code: u8) -> PoolActivationError {
    match code {
        1 => PoolActivationError::ThereAreErrorsInTheDdop,
        2 => PoolActivationError::OutOfMemory,
        3 => PoolActivationError::DifferentDdopWithSameLabel,
        _ => PoolActivationError::AnyOther,
    }
}
