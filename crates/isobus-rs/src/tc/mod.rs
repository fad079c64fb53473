//! Task Controller client/server stack (§4.5): the Device Descriptor Object
//! Pool data model, its binary and ISOXML codecs, the process-data command
//! vocabulary, and the client/server state machines built on top of them.

pub mod client;
pub mod ddi;
pub mod ddop;
pub mod objects;
pub mod process_data;
pub mod server;

pub use client::{TcAction as TcClientAction, TcClient, TcClientConfig, TcClientState};
pub use ddop::Ddop;
pub use process_data::{ProcessDataAckError, ProcessDataCommand};
pub use server::{TcAction as TcServerAction, TcServer, TcServerConfig};
