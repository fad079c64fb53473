//! A fully delivered PGN (§3 Data Model).

use alloc::vec::Vec;

use crate::types::{Address, Pgn, Priority};

/// A complete application-level datagram, produced by the transport layer and
/// consumed by PGN dispatch. Single-frame traffic is wrapped in a `Message`
/// just the same (§4.2 receive path, step 5).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub pgn: Pgn,
    pub src: Address,
    /// `0xFF` for broadcast messages.
    pub dst: Address,
    pub priority: Priority,
    pub data: Vec<u8>,
    pub timestamp_us: u64,
}

impl Message {
    pub fn is_broadcast(&self) -> bool {
        self.dst == crate::types::BROADCAST_ADDRESS
    }
}
