//! Decoding of validated response payloads into typed readings.
//!
//! All functions here are pure: they take the data slice of an already
//! validated response (the bytes between the echoed register address and
//! the CRC) and return fixed-shape records. Decoding the same bytes twice
//! yields identical values.

use alloc::vec::Vec;

use crate::constants::{
    ACCELERATION_SCALE, PAGE_BLOCK_LEN, PAGE_SAMPLES_OFFSET, SAMPLES_PER_PAGE, SAMPLE_LEN,
    SAMPLE_PERIOD_MS,
};
use crate::error::{DecodeError, Error};
use crate::frame;
use crate::time::Timestamp;

/// Vibration detection state reported with every measurement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum VibrationInformation {
    None,
    Vibration,
    Earthquake,
}

impl VibrationInformation {
    /// Maps the raw register value. The device documents 0, 1 and 2; any
    /// other nonzero value is treated as plain vibration.
    pub fn from_raw(raw: u8) -> Self {
        match raw {
            0 => VibrationInformation::None,
            2 => VibrationInformation::Earthquake,
            _ => VibrationInformation::Vibration,
        }
    }
}

/// One decoded `LatestDataLong` measurement, every field already scaled to
/// its physical unit.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SensorSample {
    /// Wall-clock time the sample was read, milliseconds since the epoch.
    pub time_measured: Timestamp,
    /// Rolling measurement sequence number reported by the device.
    pub sequence_number: u8,
    /// degC
    pub temperature: f32,
    /// %RH
    pub relative_humidity: f32,
    /// lx
    pub ambient_light: u16,
    /// hPa
    pub barometric_pressure: f32,
    /// dB
    pub sound_noise: f32,
    /// ppb
    pub etvoc: u16,
    /// ppm
    pub eco2: u16,
    pub discomfort_index: f32,
    /// degC
    pub heat_stroke: f32,
    pub vibration_information: VibrationInformation,
    /// kine
    pub si_value: f32,
    /// gal
    pub pga: f32,
    pub seismic_intensity: f32,
}

/// Per-field validity flags of the extended `LatestDataLong` layout.
///
/// Flag semantics are device-internal threshold bits, so each register is
/// kept as an opaque bitmask rather than unpacked booleans.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SensorFlags {
    pub temperature: u16,
    pub relative_humidity: u16,
    pub ambient_light: u16,
    pub barometric_pressure: u16,
    pub sound_noise: u16,
    pub etvoc: u16,
    pub eco2: u16,
    pub discomfort_index: u16,
    pub heat_stroke: u16,
    pub si_value: u8,
    pub pga: u8,
    pub seismic_intensity: u8,
}

/// A `SensorSample` together with its validity flags.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SensorSampleWithFlags {
    pub sample: SensorSample,
    pub flags: SensorFlags,
}

/// One-shot acceleration reading from `LatestAcceleration`, in gal.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LatestAcceleration {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

/// Header of one recorded acceleration memory slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryHeader {
    /// Last flash page holding samples for this event.
    pub end_page: u16,
    /// Device time counter at the moment the event was recorded. Zero means
    /// the slot holds no data.
    pub data_timecounter: u64,
}

/// One reconstructed acceleration sample, in gal, timestamped at the fixed
/// 100 Hz logging rate.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AccelerationSample {
    /// Milliseconds since the epoch.
    pub timestamp: Timestamp,
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

fn u16_at(data: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([data[at], data[at + 1]])
}

fn i16_at(data: &[u8], at: usize) -> i16 {
    i16::from_le_bytes([data[at], data[at + 1]])
}

fn u32_at(data: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([data[at], data[at + 1], data[at + 2], data[at + 3]])
}

fn u64_at(data: &[u8], at: usize) -> u64 {
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&data[at..at + 8]);
    u64::from_le_bytes(raw)
}

/// Decodes the 13 measurement fields of a `LatestDataLong` response.
///
/// `data` starts at the sequence number; the measurement fields are the 27
/// bytes that follow it, in fixed order and width.
pub fn decode_latest(data: &[u8], time_measured: Timestamp) -> Result<SensorSample, DecodeError> {
    if data.len() < 28 {
        return Err(DecodeError::PayloadTooShort);
    }
    Ok(SensorSample {
        time_measured,
        sequence_number: data[0],
        temperature: f32::from(i16_at(data, 1)) * 0.01,
        relative_humidity: f32::from(u16_at(data, 3)) * 0.01,
        ambient_light: u16_at(data, 5),
        barometric_pressure: u32_at(data, 7) as f32 * 0.001,
        sound_noise: f32::from(u16_at(data, 11)) * 0.01,
        etvoc: u16_at(data, 13),
        eco2: u16_at(data, 15),
        discomfort_index: f32::from(u16_at(data, 17)) * 0.01,
        heat_stroke: f32::from(i16_at(data, 19)) * 0.01,
        vibration_information: VibrationInformation::from_raw(data[21]),
        si_value: f32::from(u16_at(data, 22)) * 0.1,
        pga: f32::from(u16_at(data, 24)) * 0.1,
        seismic_intensity: f32::from(u16_at(data, 26)) * 0.001,
    })
}

/// Decodes the extended `LatestDataLong` layout: measurements plus the
/// twelve per-field validity bitmasks.
pub fn decode_latest_with_flags(
    data: &[u8],
    time_measured: Timestamp,
) -> Result<SensorSampleWithFlags, DecodeError> {
    if data.len() < 49 {
        return Err(DecodeError::PayloadTooShort);
    }
    let sample = decode_latest(data, time_measured)?;
    let flags = SensorFlags {
        temperature: u16_at(data, 28),
        relative_humidity: u16_at(data, 30),
        ambient_light: u16_at(data, 32),
        barometric_pressure: u16_at(data, 34),
        sound_noise: u16_at(data, 36),
        etvoc: u16_at(data, 38),
        eco2: u16_at(data, 40),
        discomfort_index: u16_at(data, 42),
        heat_stroke: u16_at(data, 44),
        si_value: data[46],
        pga: data[47],
        seismic_intensity: data[48],
    };
    Ok(SensorSampleWithFlags { sample, flags })
}

/// Decodes a `LatestAcceleration` response into gal.
pub fn decode_latest_acceleration(data: &[u8]) -> Result<LatestAcceleration, DecodeError> {
    if data.len() < 18 {
        return Err(DecodeError::PayloadTooShort);
    }
    Ok(LatestAcceleration {
        x: f32::from(i16_at(data, 12)) * ACCELERATION_SCALE,
        y: f32::from(i16_at(data, 14)) * ACCELERATION_SCALE,
        z: f32::from(i16_at(data, 16)) * ACCELERATION_SCALE,
    })
}

/// BLE advertising configuration (`AdvertiseSetting` register).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdvertiseSetting {
    /// Advertising interval in 0.625 ms units.
    pub interval: u16,
    /// Advertising mode selector, device-defined.
    pub mode: u8,
}

/// Decodes an `AdvertiseSetting` response.
pub fn decode_advertise_setting(data: &[u8]) -> Result<AdvertiseSetting, DecodeError> {
    if data.len() < 3 {
        return Err(DecodeError::PayloadTooShort);
    }
    Ok(AdvertiseSetting {
        interval: u16_at(data, 0),
        mode: data[2],
    })
}

/// Decodes a 64-bit counter response (`TimeCounter`, `TimeSetting`).
pub fn decode_counter(data: &[u8]) -> Result<u64, DecodeError> {
    if data.len() < 8 {
        return Err(DecodeError::PayloadTooShort);
    }
    Ok(u64_at(data, 0))
}

/// Decodes a `StorageInterval` response, in seconds.
pub fn decode_interval(data: &[u8]) -> Result<u16, DecodeError> {
    if data.len() < 2 {
        return Err(DecodeError::PayloadTooShort);
    }
    Ok(u16_at(data, 0))
}

/// Decodes a `MountingOrientation` response.
pub fn decode_orientation(data: &[u8]) -> Result<u8, DecodeError> {
    data.first().copied().ok_or(DecodeError::PayloadTooShort)
}

/// Decodes an `AccelMemoryHeader` response.
pub fn decode_memory_header(data: &[u8]) -> Result<MemoryHeader, DecodeError> {
    if data.len() < 14 {
        return Err(DecodeError::PayloadTooShort);
    }
    Ok(MemoryHeader {
        end_page: u16_at(data, 0),
        data_timecounter: u64_at(data, 6),
    })
}

/// Decodes the 32 samples of one acceleration memory page block.
///
/// `block` is one whole 237-byte wire frame out of a paged dump; the sample
/// run sits between the per-page metadata and the block CRC. `page_index`
/// is zero-based within the dump and positions the page's samples on the
/// 100 Hz time axis starting at `start_time`.
pub fn decode_acceleration_page(
    block: &[u8],
    page_index: u16,
    start_time: Timestamp,
) -> Result<Vec<AccelerationSample>, Error> {
    if block.len() < PAGE_BLOCK_LEN {
        return Err(DecodeError::PayloadTooShort.into());
    }
    frame::validate_frame(&block[..PAGE_BLOCK_LEN]).map_err(Error::Frame)?;

    let raw = &block[PAGE_SAMPLES_OFFSET..PAGE_BLOCK_LEN - 2];
    let base = u64::from(page_index) * SAMPLES_PER_PAGE as u64;
    let mut samples = Vec::with_capacity(SAMPLES_PER_PAGE);
    for (k, sample) in raw.chunks_exact(SAMPLE_LEN).enumerate() {
        samples.push(AccelerationSample {
            timestamp: start_time + (base + k as u64) * SAMPLE_PERIOD_MS,
            x: f32::from(i16::from_le_bytes([sample[0], sample[1]])) * ACCELERATION_SCALE,
            y: f32::from(i16::from_le_bytes([sample[2], sample[3]])) * ACCELERATION_SCALE,
            z: f32::from(i16::from_le_bytes([sample[4], sample[5]])) * ACCELERATION_SCALE,
        });
    }
    Ok(samples)
}

/// Decodes a whole paged `AccelMemoryData` dump into an ordered series.
///
/// The dump is `pages` concatenated page blocks; each block is validated
/// against its own header and CRC before its samples are taken.
pub fn decode_acceleration_series(
    dump: &[u8],
    pages: u16,
    start_time: Timestamp,
) -> Result<Vec<AccelerationSample>, Error> {
    let mut series = Vec::with_capacity(usize::from(pages) * SAMPLES_PER_PAGE);
    for page in 0..pages {
        let offset = usize::from(page) * PAGE_BLOCK_LEN;
        let block = dump.get(offset..).ok_or(DecodeError::PayloadTooShort)?;
        series.extend(decode_acceleration_page(block, page, start_time)?);
    }
    Ok(series)
}
