//! [`SensorHubPort`] implementation over `embedded-hal` 1.0 traits.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};
use embedded_hal::i2c::{I2c, SevenBitAddress};

use super::{SensorHubPort, WAIT_FOREVER};

/// Default I²C address of the hub (PS0 strapped low).
pub const DEFAULT_ADDRESS: SevenBitAddress = 0x48;
/// Alternate I²C address of the hub (PS0 strapped high).
pub const ALTERNATE_ADDRESS: SevenBitAddress = 0x49;

/// How long RESETN is held low during a reset pulse.
const RESET_PULSE_MS: u32 = 10;

/// Platform port built from an I²C bus, the three GPIO lines, a delay
/// provider and a timestamp source.
///
/// The timestamp source should report the microsecond count latched by the
/// target's INTN edge ISR; a free-running microsecond counter read at call
/// time is an acceptable approximation when the extra interrupt-to-read
/// latency is tolerable.
pub struct HalPort<I2C, RST, BOOT, INT, D, TS> {
    i2c: I2C,
    address: SevenBitAddress,
    resetn: RST,
    bootn: BOOT,
    intn: INT,
    delay: D,
    timestamp: TS,
}

impl<I2C, RST, BOOT, INT, D, TS> HalPort<I2C, RST, BOOT, INT, D, TS> {
    pub fn new(
        i2c: I2C,
        address: SevenBitAddress,
        resetn: RST,
        bootn: BOOT,
        intn: INT,
        delay: D,
        timestamp: TS,
    ) -> Self {
        Self {
            i2c,
            address,
            resetn,
            bootn,
            intn,
            delay,
            timestamp,
        }
    }

    /// Release the underlying peripherals.
    pub fn free(self) -> (I2C, RST, BOOT, INT) {
        (self.i2c, self.resetn, self.bootn, self.intn)
    }
}

impl<I2C, RST, BOOT, INT, D, TS, PE> HalPort<I2C, RST, BOOT, INT, D, TS>
where
    I2C: I2c,
    RST: OutputPin<Error = PE>,
    BOOT: OutputPin<Error = PE>,
    INT: InputPin<Error = PE>,
    D: DelayNs,
    TS: FnMut() -> u32,
{
    fn pulse_reset(&mut self, boot_dfu: bool) -> Result<(), PE> {
        if boot_dfu {
            self.bootn.set_low()?;
        } else {
            self.bootn.set_high()?;
        }
        self.resetn.set_low()?;
        self.delay.delay_ms(RESET_PULSE_MS);
        self.resetn.set_high()?;
        Ok(())
    }
}

/// Errors from the bus or pins backing a [`HalPort`].
#[derive(Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HalError<E, PE> {
    I2c(E),
    Pin(PE),
}

impl<I2C, RST, BOOT, INT, D, TS, PE> SensorHubPort for HalPort<I2C, RST, BOOT, INT, D, TS>
where
    I2C: I2c,
    RST: OutputPin<Error = PE>,
    BOOT: OutputPin<Error = PE>,
    INT: InputPin<Error = PE>,
    D: DelayNs,
    TS: FnMut() -> u32,
    PE: core::fmt::Debug,
    I2C::Error: core::fmt::Debug,
{
    type Error = HalError<I2C::Error, PE>;

    fn reset(&mut self) -> Result<(), Self::Error> {
        self.pulse_reset(false).map_err(HalError::Pin)
    }

    fn reset_dfu(&mut self) -> Result<(), Self::Error> {
        self.pulse_reset(true).map_err(HalError::Pin)
    }

    fn i2c(&mut self, send: &[u8], recv: &mut [u8]) -> Result<(), Self::Error> {
        let result = match (send.is_empty(), recv.is_empty()) {
            (false, false) => self.i2c.write_read(self.address, send, recv),
            (false, true) => self.i2c.write(self.address, send),
            (true, false) => self.i2c.read(self.address, recv),
            (true, true) => Ok(()),
        };
        result.map_err(HalError::I2c)
    }

    fn intn_asserted(&mut self) -> bool {
        self.intn.is_low().unwrap_or(false)
    }

    fn wait_intn(&mut self, wait_ms: u16) -> bool {
        let mut waited: u32 = 0;
        loop {
            if self.intn.is_low().unwrap_or(false) {
                return true;
            }
            if wait_ms != WAIT_FOREVER && waited >= wait_ms as u32 {
                return false;
            }
            self.delay.delay_ms(1);
            waited += 1;
        }
    }

    fn timestamp_us(&mut self) -> u32 {
        (self.timestamp)()
    }
}
