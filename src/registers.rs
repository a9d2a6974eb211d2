//! Register catalog: symbolic names for the device's address map, the
//! opcodes they accept, and their argument layouts. Pure data, no control
//! logic.

/// A device register reachable over the serial command protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Register {
    /// LED rule and color.
    LedControl,
    /// BLE advertising interval and mode.
    AdvertiseSetting,
    /// Normal mode vs. acceleration logger mode.
    ModeChange,
    /// Start/stop flash logging of acceleration samples.
    AccelLoggerControl,
    /// Opaque logger status bytes.
    AccelLoggerStatus,
    /// Latest environmental + seismic measurement, with validity flags.
    LatestDataLong,
    /// Latest one-shot acceleration reading.
    LatestAcceleration,
    /// Header of one recorded acceleration memory slot.
    AccelMemoryHeader,
    /// Paged dump of one recorded acceleration memory slot.
    AccelMemoryData,
    /// Monotonic device time counter.
    TimeCounter,
    /// Writable seed for the device time counter.
    TimeSetting,
    /// Interval between environmental records in flash, seconds.
    StorageInterval,
    /// Installation orientation of the sensor body.
    MountingOrientation,
}

impl Register {
    /// 16-bit register address, sent little-endian after the opcode.
    pub fn address(self) -> u16 {
        match self {
            Register::LedControl => 0x5111,
            Register::AdvertiseSetting => 0x5115,
            Register::ModeChange => 0x5117,
            Register::AccelLoggerControl => 0x5118,
            Register::AccelLoggerStatus => 0x5119,
            Register::LatestDataLong => 0x5021,
            Register::LatestAcceleration => 0x5013,
            Register::AccelMemoryHeader => 0x503E,
            Register::AccelMemoryData => 0x503F,
            Register::TimeCounter => 0x5201,
            Register::TimeSetting => 0x5202,
            Register::StorageInterval => 0x5203,
            Register::MountingOrientation => 0x5402,
        }
    }

    /// Whether the register rejects writes.
    pub fn read_only(self) -> bool {
        matches!(
            self,
            Register::AccelLoggerStatus
                | Register::LatestDataLong
                | Register::LatestAcceleration
                | Register::AccelMemoryHeader
                | Register::AccelMemoryData
                | Register::TimeCounter
                | Register::MountingOrientation
        )
    }

    /// Which success status values this register's responses carry.
    ///
    /// The device is not uniform here: sensing-data reads acknowledge with
    /// 0x00/0x01 while control and memory operations acknowledge with
    /// 0x01/0x02, so the accepted set is catalog data rather than a
    /// protocol-wide constant.
    pub fn status_family(self) -> StatusFamily {
        match self {
            Register::LatestDataLong
            | Register::LatestAcceleration
            | Register::MountingOrientation => StatusFamily::Sensing,
            _ => StatusFamily::Control,
        }
    }
}

/// Success-status convention of a command family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusFamily {
    /// Acknowledges with 0x00 or 0x01.
    Sensing,
    /// Acknowledges with 0x01 or 0x02.
    Control,
}

impl StatusFamily {
    /// Whether `status` is an acknowledgement for this family.
    pub fn is_success(self, status: u8) -> bool {
        match self {
            StatusFamily::Sensing => status == 0x00 || status == 0x01,
            StatusFamily::Control => status == 0x01 || status == 0x02,
        }
    }
}

/// Which recorded acceleration memory the device should serve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MemoryDataType {
    Earthquake = 0x00,
    Vibration = 0x01,
}

/// LED lighting rule (write argument of `LedControl`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum LedRule {
    Off = 0x0000,
    On = 0x0001,
    /// Color follows the ambient light reading.
    ByAmbientLight = 0x0004,
}

/// Device operating mode (argument of `ModeChange`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SensorMode {
    Normal = 0x00,
    AccelerationLogger = 0x01,
}

/// Output data rate of the acceleration logger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OdrSetting {
    Hz1 = 0x00,
    Hz25 = 0x02,
    Hz100 = 0x03,
    Hz200 = 0x04,
    Hz400 = 0x05,
}

/// `LedControl` write argument: rule u16 LE followed by RGB bytes.
pub fn led_argument(rule: LedRule, rgb: (u8, u8, u8)) -> [u8; 5] {
    let rule = (rule as u16).to_le_bytes();
    [rule[0], rule[1], rgb.0, rgb.1, rgb.2]
}

/// `AccelLoggerControl` write argument: run flag, detection range (fixed
/// 0x00), output data rate, start page and end page.
pub fn logger_control_argument(
    run: bool,
    odr: OdrSetting,
    start_page: u16,
    end_page: u16,
) -> [u8; 7] {
    let start = start_page.to_le_bytes();
    let end = end_page.to_le_bytes();
    [
        u8::from(run),
        0x00,
        odr as u8,
        start[0],
        start[1],
        end[0],
        end[1],
    ]
}

/// `AccelMemoryHeader` read argument: data type and memory index. Index 1
/// addresses the latest recorded event, 10 the oldest.
pub fn memory_header_argument(data_type: MemoryDataType, index: u8) -> [u8; 2] {
    [data_type as u8, index]
}

/// `AccelMemoryData` read argument: data type, memory index, start page and
/// end page, both inclusive.
pub fn memory_data_argument(
    data_type: MemoryDataType,
    index: u8,
    start_page: u16,
    end_page: u16,
) -> [u8; 6] {
    let start = start_page.to_le_bytes();
    let end = end_page.to_le_bytes();
    [data_type as u8, index, start[0], start[1], end[0], end[1]]
}
