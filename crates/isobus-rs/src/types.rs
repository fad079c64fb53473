//! Primitive aliases shared across the stack (§3 Data Model).

/// An ISO 11783 source or destination address. `0xFE` is the "no address yet"
/// NULL address; `0xFF` is the global/broadcast destination.
pub type Address = u8;

/// A Parameter Group Number: an 18-bit logical identifier encoded in the CAN id.
pub type Pgn = u32;

/// The CAN arbitration priority occupying bits 26-28 of the 29-bit identifier.
pub type Priority = u8;

/// Address used by a control function that has not yet claimed one.
pub const NULL_ADDRESS: Address = 0xFE;

/// The global destination address (broadcast / PDU2).
pub const BROADCAST_ADDRESS: Address = 0xFF;

/// Highest address an internal control function may claim (arbitrary range top).
pub const MAX_ADDRESS: Address = 253;

/// Lower bound of the self-configurable arbitrary address range (ISO 11783-5 §4.2).
pub const ARBITRARY_ADDRESS_RANGE_START: Address = 128;

/// Upper bound (inclusive) of the self-configurable arbitrary address range.
pub const ARBITRARY_ADDRESS_RANGE_END: Address = 247;

/// Default priority used for most informational PGNs.
pub const DEFAULT_PRIORITY: Priority = 6;

/// Nominal ISO 11783-2 bus bitrate.
pub const NOMINAL_BITRATE_BPS: u32 = 250_000;
