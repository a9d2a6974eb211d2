//! Wire frame construction and validation.
//!
//! Every exchange with the sensor is one frame in each direction:
//!
//! `[0x52][0x42][len_lo][len_hi][opcode][addr_lo][addr_hi][..data..][crc_lo][crc_hi]`
//!
//! The length field counts everything between itself and the end of the
//! frame (opcode + address + data + CRC). The CRC is CRC-16/MODBUS over all
//! preceding bytes, low byte first on the wire.

use alloc::vec::Vec;

use crate::constants::{DATA_OFFSET, HEADER, MAX_COMMAND_LEN, PAYLOAD_OFFSET};
use crate::error::FrameError;

/// Operation selector carried in the first payload byte of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Opcode {
    Read = 0x01,
    Write = 0x02,
}

/// A serialized request frame. Bounded by the largest catalog command.
pub type EncodedCommand = heapless::Vec<u8, MAX_COMMAND_LEN>;

/// One request to the device: opcode, register address and argument bytes.
///
/// Commands are built per call from the register catalog and never retained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Command<'a> {
    pub opcode: Opcode,
    pub address: u16,
    pub argument: &'a [u8],
}

impl<'a> Command<'a> {
    pub fn new(opcode: Opcode, address: u16, argument: &'a [u8]) -> Self {
        Command {
            opcode,
            address,
            argument,
        }
    }

    /// Serializes the command: header, length, payload, CRC.
    ///
    /// Fails with [`FrameError::ArgumentTooLong`] when the argument would
    /// not fit the bounded command buffer. Catalog arguments are at most 9
    /// bytes (logger control); only raw register access can exceed this.
    pub fn encode(&self) -> Result<EncodedCommand, FrameError> {
        if self.argument.len() + 9 > MAX_COMMAND_LEN {
            return Err(FrameError::ArgumentTooLong);
        }

        let length = (3 + self.argument.len() + 2) as u16;
        let mut out = EncodedCommand::new();
        let _ = out.extend_from_slice(&HEADER);
        let _ = out.extend_from_slice(&length.to_le_bytes());
        let _ = out.push(self.opcode as u8);
        let _ = out.extend_from_slice(&self.address.to_le_bytes());
        let _ = out.extend_from_slice(self.argument);
        let crc = checksum(&out);
        let _ = out.extend_from_slice(&crc.to_le_bytes());
        Ok(out)
    }
}

/// Reflected CRC-16 with polynomial 0xA001, seed 0xFFFF (the MODBUS
/// variant).
///
/// Matches the device's own checksum byte for byte; the low byte goes on the
/// wire before the high byte.
pub fn checksum(bytes: &[u8]) -> u16 {
    let mut crc: u16 = 0xFFFF;
    for &byte in bytes {
        crc ^= u16::from(byte);
        for _ in 0..8 {
            let carry = crc & 1 != 0;
            crc >>= 1;
            if carry {
                crc ^= 0xA001;
            }
        }
    }
    crc
}

/// Validates one frame at the start of `bytes` and returns its total wire
/// length (header and CRC included). Trailing bytes past the frame are left
/// for the caller; acceleration memory responses concatenate many frames.
pub fn validate_frame(bytes: &[u8]) -> Result<usize, FrameError> {
    if bytes.len() < PAYLOAD_OFFSET {
        return Err(FrameError::Truncated);
    }
    if bytes[..2] != HEADER {
        return Err(FrameError::InvalidHeader);
    }
    let declared = usize::from(u16::from_le_bytes([bytes[2], bytes[3]]));
    let total = declared + PAYLOAD_OFFSET;
    if bytes.len() < total || total < PAYLOAD_OFFSET + 2 {
        return Err(FrameError::Truncated);
    }
    let crc = checksum(&bytes[..total - 2]);
    if bytes[total - 2..total] != crc.to_le_bytes() {
        return Err(FrameError::ChecksumMismatch);
    }
    Ok(total)
}

/// A validated response frame, owning its bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    bytes: Vec<u8>,
}

impl Response {
    /// Validates header, declared length and CRC, trimming any bytes past
    /// the end of the frame.
    ///
    /// A response must carry at least a status byte and the echoed register
    /// address; a frame too short for those is rejected even when its CRC
    /// holds.
    pub fn decode(mut bytes: Vec<u8>) -> Result<Response, FrameError> {
        let total = validate_frame(&bytes)?;
        if total < DATA_OFFSET + 2 {
            return Err(FrameError::Truncated);
        }
        bytes.truncate(total);
        Ok(Response { bytes })
    }

    /// Status byte: the echoed opcode on success, an error code otherwise.
    pub fn status(&self) -> u8 {
        self.bytes[PAYLOAD_OFFSET]
    }

    /// Echoed register address.
    pub fn address(&self) -> u16 {
        u16::from_le_bytes([self.bytes[5], self.bytes[6]])
    }

    /// Register data: everything between the echoed address and the CRC.
    pub fn data(&self) -> &[u8] {
        self.bytes
            .get(DATA_OFFSET..self.bytes.len() - 2)
            .unwrap_or(&[])
    }

    /// The whole validated frame.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}
