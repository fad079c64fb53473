#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

// --- Foundation modules ---
pub mod error;
pub mod types;
pub mod name;
pub mod hal;
pub mod message;
pub mod util;

// --- Wire format ---
pub mod frame;

// --- Network layer: dispatch + identity ---
pub mod network;

// --- Multi-frame reassembly ---
pub mod transport;

// --- Application protocols ---
pub mod tc;

// --- Top-level exports ---
pub use error::IsobusError;
pub use hal::{Frame, FrameEndpoint};
pub use message::Message;
pub use name::Name;
pub use network::{ControlFunction, NetworkConfig, NetworkManager, PartnerCf};
pub use tc::{Ddop, TcClient, TcClientConfig, TcServer, TcServerConfig};
pub use types::{Address, Priority, Pgn, NULL_ADDRESS, BROADCAST_ADDRESS};
