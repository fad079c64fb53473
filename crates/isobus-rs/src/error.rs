//! Error taxonomy for the ISOBUS stack (§7 of the specification).

use core::fmt;

/// Reason a transport session was aborted (ISO 11783-3 TP.Conn_Abort reasons).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortReason {
    Timeout,
    AlreadyInSession,
    ResourcesUnavailable,
    BadSequence,
    UnexpectedDataSize,
    DuplicateSequence,
    MaxRetransmitsExceeded,
    UnexpectedPgn,
    ConnectionModeError,
}

impl AbortReason {
    /// The byte value carried in a TP.CM / ETP.CM Connection Abort frame.
    pub fn code(self) -> u8 {
        match self {
            AbortReason::Timeout => 1,
            AbortReason::ResourcesUnavailable => 2,
            AbortReason::AlreadyInSession => 3,
            AbortReason::UnexpectedDataSize => 4,
            AbortReason::BadSequence => 5,
            AbortReason::DuplicateSequence => 6,
            AbortReason::MaxRetransmitsExceeded => 7,
            AbortReason::UnexpectedPgn => 8,
            AbortReason::ConnectionModeError => 9,
        }
    }

    pub fn from_code(code: u8) -> Self {
        match code {
            2 => AbortReason::ResourcesUnavailable,
            3 => AbortReason::AlreadyInSession,
            4 => AbortReason::UnexpectedDataSize,
            5 => AbortReason::BadSequence,
            6 => AbortReason::DuplicateSequence,
            7 => AbortReason::MaxRetransmitsExceeded,
            8 => AbortReason::UnexpectedPgn,
            9 => AbortReason::ConnectionModeError,
            _ => AbortReason::Timeout,
        }
    }
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AbortReason::Timeout => write!(f, "timeout"),
            AbortReason::AlreadyInSession => write!(f, "already in session"),
            AbortReason::ResourcesUnavailable => write!(f, "resources unavailable"),
            AbortReason::BadSequence => write!(f, "bad sequence number"),
            AbortReason::UnexpectedDataSize => write!(f, "unexpected data size"),
            AbortReason::DuplicateSequence => write!(f, "duplicate sequence number"),
            AbortReason::MaxRetransmitsExceeded => write!(f, "max retransmits exceeded"),
            AbortReason::UnexpectedPgn => write!(f, "unexpected PGN"),
            AbortReason::ConnectionModeError => write!(f, "connection mode error"),
        }
    }
}

/// Why a DDOP failed `validate()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolValidationError {
    NoDevice,
    NoElement,
    DanglingParent,
    DanglingChild,
    DanglingPresentation,
    UnknownRecord,
}

impl fmt::Display for PoolValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PoolValidationError::NoDevice => write!(f, "DDOP must contain at least one Device"),
            PoolValidationError::NoElement => write!(f, "DDOP must contain at least one DeviceElement"),
            PoolValidationError::DanglingParent => write!(f, "element references a non-existent parent object"),
            PoolValidationError::DanglingChild => write!(f, "element references a non-existent child object"),
            PoolValidationError::DanglingPresentation => {
                write!(f, "object references a non-existent presentation object")
            }
            PoolValidationError::UnknownRecord => write!(f, "unrecognized object record type"),
        }
    }
}

/// Server-reported pool activation failure (ISO 11783-10 Annex E).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolActivationError {
    ThereAreErrorsInTheDdop,
    OutOfMemory,
    DifferentDdopWithSameLabel,
    AnyOther,
}

impl fmt::Display for PoolActivationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PoolActivationError::ThereAreErrorsInTheDdop => write!(f, "there are errors in the DDOP"),
            PoolActivationError::OutOfMemory => write!(f, "server is out of memory"),
            PoolActivationError::DifferentDdopWithSameLabel => write!(f, "different DDOP with same label"),
            PoolActivationError::AnyOther => write!(f, "unspecified activation error"),
        }
    }
}

/// The unified error type returned by every fallible operation in the stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IsobusError {
    /// Caller violated a precondition.
    InvalidArgument(&'static str),
    /// Operation is not valid in the current FSM state.
    InvalidState(&'static str),
    /// No `FrameEndpoint` bound to the requested port.
    NotReady,
    /// The endpoint applied back-pressure; retry later.
    WouldBlock,
    /// A transport session already owns this `(src, dst, pgn)` tuple.
    AlreadyInSession,
    /// Payload exceeds the ETP maximum (117,440,505 bytes).
    MessageTooLarge,
    /// A request/response deadline elapsed.
    Timeout,
    /// A transport session was aborted.
    Aborted(AbortReason),
    /// DDOP failed integrity validation.
    PoolValidation(PoolValidationError),
    /// The TC server rejected pool activation.
    PoolActivation(PoolActivationError),
    /// Frame PGN was not recognized where recognition was required.
    UnknownPgn,
    /// PGN value is outside `[0, 0x3FFFF]`, or a PDU1 PGN has a nonzero low byte.
    InvalidPgn,
}

impl fmt::Display for IsobusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IsobusError::InvalidArgument(s) => write!(f, "invalid argument: {s}"),
            IsobusError::InvalidState(s) => write!(f, "invalid state: {s}"),
            IsobusError::NotReady => write!(f, "no frame endpoint bound"),
            IsobusError::WouldBlock => write!(f, "endpoint would block"),
            IsobusError::AlreadyInSession => write!(f, "a transport session is already in progress for this tuple"),
            IsobusError::MessageTooLarge => write!(f, "message exceeds the ETP maximum size"),
            IsobusError::Timeout => write!(f, "operation timed out"),
            IsobusError::Aborted(reason) => write!(f, "transport aborted: {reason}"),
            IsobusError::PoolValidation(e) => write!(f, "pool validation failed: {e}"),
            IsobusError::PoolActivation(e) => write!(f, "pool activation failed: {e}"),
            IsobusError::UnknownPgn => write!(f, "unrecognized PGN"),
            IsobusError::InvalidPgn => write!(f, "invalid PGN value"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for IsobusError {}

pub type Result<T> = core::result::Result<T, IsobusError>;
