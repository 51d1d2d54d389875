//! Platform integration points consumed by the driver.
//!
//! The driver core never touches hardware directly: everything it needs from
//! the target (the reset lines, the I²C byte pipe, the INTN interrupt and its
//! ISR timestamp) comes through [`SensorHubPort`], and the DFU engine reads
//! firmware images through [`FirmwareBlob`]. `port::hal` provides a ready
//! implementation of the port over `embedded-hal` 1.0 traits.

pub mod hal;
#[cfg(test)]
pub(crate) mod mock;

use core::fmt::Debug;

/// Timeout value meaning "block until INTN asserts or the platform fails".
pub const WAIT_FOREVER: u16 = 0xFFFF;
/// Timeout value meaning "poll once, never block".
pub const NO_WAIT: u16 = 0;

/// Platform services behind one hub unit.
///
/// The implementation owns the physical I²C bus and the INTN line for the
/// unit; no other code may drive them while a session is open.
pub trait SensorHubPort {
    type Error: Debug;

    /// Pulse RESETN with BOOTN high so the hub boots application firmware.
    fn reset(&mut self) -> Result<(), Self::Error>;

    /// Pulse RESETN with BOOTN low so the hub boots the DFU bootloader.
    fn reset_dfu(&mut self) -> Result<(), Self::Error>;

    /// One I²C transaction with the hub. Either buffer may be empty; when
    /// both are given, the write and the read happen back to back under a
    /// repeated START.
    fn i2c(&mut self, send: &[u8], recv: &mut [u8]) -> Result<(), Self::Error>;

    /// Sample INTN. Returns true while the hub asserts it (the line is
    /// active low: asserted means data is waiting on the input pipe).
    fn intn_asserted(&mut self) -> bool;

    /// Block until INTN asserts or `wait_ms` elapses. [`WAIT_FOREVER`]
    /// disables the timeout; [`NO_WAIT`] polls once. Returns true when INTN
    /// is asserted.
    fn wait_intn(&mut self, wait_ms: u16) -> bool;

    /// Microsecond timestamp captured by the INTN ISR at the most recent
    /// assertion.
    fn timestamp_us(&mut self) -> u32;
}

/// Range-addressable firmware image consumed by the DFU engine.
///
/// The interface deliberately supports streaming or compressed sources: the
/// engine only ever asks for metadata, total length, a packet-size hint, and
/// sequential byte ranges.
pub trait FirmwareBlob {
    type Error: Debug;

    fn open(&mut self) -> Result<(), Self::Error>;

    fn close(&mut self) -> Result<(), Self::Error>;

    /// Look up a metadata string. The key `"FW-Format"` must be present.
    fn meta(&self, key: &str) -> Option<&str>;

    /// Total length of the application image in bytes.
    fn app_len(&self) -> u32;

    /// Preferred DFU packet size in bytes; 0 selects the driver default.
    fn packet_len(&self) -> u32;

    /// Copy `buf.len()` image bytes starting at `offset` into `buf`.
    fn read_app_data(&mut self, buf: &mut [u8], offset: u32) -> Result<(), Self::Error>;
}
