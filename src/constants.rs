// HEADER is the two-byte magic that opens every frame, request or response.
pub const HEADER: [u8; 2] = [0x52, 0x42];

// Number of leading bytes (header + length field) that precede the payload.
pub const PAYLOAD_OFFSET: usize = 4;

// Largest request frame the device accepts: header(4) + opcode(1) +
// address(2) + argument(<=9, logger control) + CRC(2), rounded up.
pub const MAX_COMMAND_LEN: usize = 32;

// Offset of the first data byte in a response frame, past header, length,
// status byte and the echoed register address.
pub const DATA_OFFSET: usize = 7;

// Wire size of one acceleration memory page block, CRC included.
pub const PAGE_BLOCK_LEN: usize = 237;

// Offset of the first sample within a page block; samples run up to the
// trailing two CRC bytes.
pub const PAGE_SAMPLES_OFFSET: usize = 43;

// Samples stored per acceleration memory page.
pub const SAMPLES_PER_PAGE: usize = 32;

// One sample is three signed 16-bit axis values.
pub const SAMPLE_LEN: usize = 6;

// Fixed acceleration logging rate used for timestamp reconstruction: 100 Hz.
pub const SAMPLE_PERIOD_MS: u64 = 10;

// Scale from raw axis register value to gal.
pub const ACCELERATION_SCALE: f32 = 0.1;
