use thiserror_no_std::Error;

/// Errors detected while validating a single wire frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FrameError {
    /// The frame does not begin with the `0x52 0x42` header.
    #[error("invalid frame header")]
    InvalidHeader,
    /// The trailing CRC-16 does not match the frame contents.
    #[error("frame checksum mismatch")]
    ChecksumMismatch,
    /// Fewer bytes are available than the frame's declared length.
    #[error("truncated frame")]
    Truncated,
    /// The command argument does not fit the bounded request frame.
    #[error("command argument too long")]
    ArgumentTooLong,
}

/// Errors raised by the byte transport underneath the protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The device produced no bytes for the configured number of polls.
    #[error("transport timeout")]
    Timeout,
    /// The underlying channel failed to read or write.
    #[error("transport I/O failure")]
    IoFailure,
}

/// The device answered with an error status byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("device returned error status 0x{code:02X}")]
pub struct ProtocolError {
    /// Raw status byte, surfaced verbatim.
    pub code: u8,
}

/// Errors raised while decoding a validated response payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// The payload is shorter than the decoded layout requires.
    #[error("payload too short")]
    PayloadTooShort,
}

/// Any failure surfaced by the driver.
///
/// A frame, transport or protocol error aborts only the request that raised
/// it; whether to retry on the next tick or abandon an in-progress event
/// capture is the caller's decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Error {
    #[error(transparent)]
    Frame(#[from] FrameError),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    #[error(transparent)]
    Decode(#[from] DecodeError),
    /// An event capture was abandoned mid-extraction; the event is lost.
    #[error("event capture aborted: {0}")]
    ExtractionAborted(&'static str),
}
