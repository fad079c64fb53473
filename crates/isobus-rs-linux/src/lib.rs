// crates/isobus-rs-linux/src/lib.rs
#![cfg(target_os = "linux")]

use isobus_rs::error::IsobusError;
use isobus_rs::{Frame, FrameEndpoint};
use socketcan::{CanFrame, EmbeddedFrame, ExtendedId, Id, Socket, SocketOptions};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// A [`FrameEndpoint`] backed by a Linux SocketCAN socket, one per physical
/// CAN port. The socket is opened non-blocking so `try_recv` never stalls the
/// cooperative update loop driven by [`isobus_rs::NetworkManager::update`].
pub struct SocketCanEndpoint {
    socket: socketcan::CanSocket,
}

impl SocketCanEndpoint {
    pub fn open(interface: &str) -> Result<Self, socketcan::Error> {
        let socket = socketcan::CanSocket::open(interface)?;
        socket.set_nonblocking(true)?;
        Ok(SocketCanEndpoint { socket })
    }

    fn timestamp_us() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or(Duration::ZERO)
            .as_micros() as u64
    }
}

impl FrameEndpoint for SocketCanEndpoint {
    fn send(&mut self, frame: &Frame) -> isobus_rs::error::Result<()> {
        let id = ExtendedId::new(frame.id).ok_or(IsobusError::InvalidArgument("CAN id exceeds 29 bits"))?;
        let can_frame = CanFrame::new(Id::Extended(id), frame.payload()).ok_or(IsobusError::InvalidArgument("payload exceeds 8 bytes"))?;
        match self.socket.write_frame(&can_frame) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => Err(IsobusError::WouldBlock),
            Err(_) => Err(IsobusError::InvalidState("socket write failed")),
        }
    }

    fn try_recv(&mut self) -> Option<Frame> {
        match self.socket.read_frame() {
            Ok(CanFrame::Data(data_frame)) => {
                let id = match data_frame.id() {
                    Id::Extended(ext) => ext.as_raw(),
                    Id::Standard(std_id) => std_id.as_raw() as u32,
                };
                Some(Frame::new(id, data_frame.data(), Self::timestamp_us()))
            }
            // Remote/error frames carry no ISOBUS payload; skip them.
            Ok(_) => None,
            Err(_) => None,
        }
    }

    fn can_send(&self) -> bool {
        true
    }
}
