//! Transport contract and response reassembly.
//!
//! The driver never opens a port itself; it is handed a byte-oriented duplex
//! channel and only assumes the operations below. Serial chunk boundaries
//! are unpredictable, so received bytes are accumulated until the frame's
//! declared length (or an externally known total, for paged memory dumps)
//! has arrived.

use alloc::vec::Vec;

use embedded_io_async::{Read, Write};

use crate::constants::PAYLOAD_OFFSET;

/// Byte-oriented duplex channel to the sensor.
///
/// Extends [`embedded_io_async::Read`] and [`embedded_io_async::Write`] with
/// the polling and buffer-hygiene operations the protocol needs. Implemented
/// over a serial port, or over anything that can emulate one.
pub trait Transport: Read + Write {
    /// Number of received bytes ready to be read without blocking.
    async fn bytes_available(&mut self) -> Result<usize, Self::Error>;

    /// Discards any unread received bytes.
    async fn clear_input(&mut self) -> Result<(), Self::Error>;

    /// Discards any queued outgoing bytes.
    async fn clear_output(&mut self) -> Result<(), Self::Error>;
}

/// Accumulates received chunks until one logical response is complete.
///
/// Completion is judged either from the length field of the frame header as
/// soon as it has arrived, or from an expected total supplied up front when
/// the response is a run of concatenated page frames. The reassembler owns
/// the receive buffer; feeding it byte-by-byte or all-at-once yields the
/// same bytes.
#[derive(Debug, Default)]
pub struct Reassembler {
    buf: Vec<u8>,
    expected: Option<usize>,
}

impl Reassembler {
    /// Reassembles a single frame, sized by its own length field.
    pub fn new() -> Self {
        Reassembler {
            buf: Vec::new(),
            expected: None,
        }
    }

    /// Reassembles a response whose total size is known in advance.
    pub fn with_expected_len(total: usize) -> Self {
        Reassembler {
            buf: Vec::with_capacity(total),
            expected: Some(total),
        }
    }

    /// Appends a received chunk. Returns `true` once the response is
    /// complete; further chunks are not expected after that.
    pub fn push(&mut self, chunk: &[u8]) -> bool {
        self.buf.extend_from_slice(chunk);
        self.is_complete()
    }

    /// Whether enough bytes have accumulated for one whole response.
    pub fn is_complete(&self) -> bool {
        match self.expected {
            Some(total) => self.buf.len() >= total || self.holds_error_frame(),
            None => match self.declared_total() {
                Some(total) => self.buf.len() >= total,
                None => false,
            },
        }
    }

    /// Total length declared by the frame header, once it has arrived.
    fn declared_total(&self) -> Option<usize> {
        if self.buf.len() < PAYLOAD_OFFSET {
            return None;
        }
        let declared = usize::from(u16::from_le_bytes([self.buf[2], self.buf[3]]));
        Some(declared + PAYLOAD_OFFSET)
    }

    /// A device that rejects a paged read answers with one short error
    /// frame instead of the page run; that frame finishes the response
    /// early rather than waiting out the timeout.
    fn holds_error_frame(&self) -> bool {
        let Some(total) = self.declared_total() else {
            return false;
        };
        if self.buf.len() < total || self.buf.len() <= PAYLOAD_OFFSET {
            return false;
        }
        self.buf[PAYLOAD_OFFSET] > 0x02
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Hands the accumulated bytes to the caller for validation.
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}
