//! The hardware abstraction boundary (§6 External Interfaces).
//!
//! The core never touches a CAN socket directly; it consumes a
//! [`FrameEndpoint`] supplied by the host application (e.g. `isobus-rs-linux`'s
//! SocketCAN implementation).

use crate::error::Result;

/// One physical or virtual CAN frame crossing the `FrameEndpoint` boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame {
    /// 29-bit CAN identifier (extended frame format only; ISOBUS never uses
    /// standard 11-bit ids).
    pub id: u32,
    /// Data length code, 0..=8.
    pub dlc: u8,
    pub data: [u8; 8],
    /// Monotonic microsecond timestamp, supplied by the endpoint.
    pub timestamp_us: u64,
}

impl Frame {
    pub fn new(id: u32, data: &[u8], timestamp_us: u64) -> Self {
        debug_assert!(data.len() <= 8);
        let mut buf = [0u8; 8];
        let len = data.len().min(8);
        buf[..len].copy_from_slice(&data[..len]);
        Frame {
            id,
            dlc: len as u8,
            data: buf,
            timestamp_us,
        }
    }

    pub fn payload(&self) -> &[u8] {
        &self.data[..self.dlc as usize]
    }
}

/// Non-blocking CAN transport capability consumed by the [`crate::network::NetworkManager`].
///
/// Implementations must never block, sleep, or perform I/O beyond a single
/// syscall per call; `update(elapsed_ms)` drains `try_recv` in a loop bounded
/// by the network's configured batch size.
pub trait FrameEndpoint {
    /// Attempt to transmit `frame`. Returns `Ok(())` on success,
    /// `Err(IsobusError::WouldBlock)` if the endpoint applied back-pressure.
    fn send(&mut self, frame: &Frame) -> Result<()>;

    /// Pop the next received frame, if any, without blocking.
    fn try_recv(&mut self) -> Option<Frame>;

    /// Hint: whether a `send` is likely to succeed right now. The core must
    /// still handle `WouldBlock` even if this returns `true`.
    fn can_send(&self) -> bool {
        true
    }
}
