#![no_std]
#![doc = include_str!("../README.md")]

#[cfg(test)]
extern crate std;

pub mod dfu;
pub mod port;
pub mod prelude;
pub mod report;

mod frs;
mod hid;

use crate::frs::MAX_FRS_WORDS;
use crate::hid::Hid;
use crate::port::{NO_WAIT, SensorHubPort};
use crate::report::command::{
    self, CommandCode, CommandResponse, Counts, ErrorRecord, ProductId, RvSyncOp, TareBasis,
};
use crate::report::event::{self, SENSOR_CONFIG_LEN, SensorConfig, SensorEvent, SensorId, TimeBase};
use crate::report::{MAX_INPUT_REPORT_LEN, read_u32};

/// Driver version, reported for diagnostics.
pub const DRIVER_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Wait applied to each IN read inside a command or FRS exchange.
pub(crate) const IN_TIMEOUT_MS: u16 = 10;

/// Driver session for one BNO070 sensor hub.
///
/// The session owns the unit's platform port and all per-session protocol
/// state: the rolling command sequence number and the event decoder's time
/// base. One API call runs at a time; the driver takes no locks of its own,
/// so sharing a session between threads needs external synchronization.
pub struct Bno070<P> {
    hid: Hid<P>,
    unit: u8,
    command_seq: u8,
    time_base: TimeBase,
}

/// Driver errors.
#[derive(Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error<E> {
    /// Error at the platform port level.
    Port(E),
    /// General failure.
    Other,
    /// Bad parameter to an API call.
    BadParam,
    /// Error status in a message from the hub.
    Hub,
    /// Report from the hub was invalid or couldn't be processed.
    BadReport,
    /// I²C transfer produced an invalid frame.
    I2cIo,
    /// No IN report was available before the timeout.
    NoData,
    /// FRS read failed.
    FrsRead(FrsReadError),
    /// FRS write failed.
    FrsWrite(FrsWriteError),
    /// Firmware image rejected by the DFU engine.
    InvalidFirmware,
    /// The bootloader NACKed a DFU packet.
    Nack,
}

/// Failure kinds of an FRS read exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FrsReadError {
    /// Out-of-order read response.
    BadOffset,
    /// Read response with a bad length field.
    BadLength,
    /// Read response with a bad type field.
    BadType,
    /// The hub does not recognize the record id.
    Unrecognized,
    /// The hub's FRS engine is busy.
    Busy,
    /// Device error on the hub.
    DeviceError,
    /// Unknown status code in a read response.
    Unknown,
    /// The record exists but holds no data.
    Empty,
    /// The requested offset lies outside the record.
    OffsetOutOfRange,
    /// The hub returned more words than the caller's buffer holds.
    UnexpectedLength,
}

/// Failure kinds of an FRS write exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FrsWriteError {
    /// The hub's FRS engine is busy.
    Busy,
    /// The hub does not recognize the record id.
    BadType,
    /// The announced length is invalid for this record.
    BadLength,
    /// Device error on the hub.
    DeviceError,
    /// Unknown status code in a write response.
    BadStatus,
    /// The record cannot be written in the hub's current mode.
    BadMode,
    /// The write failed on the hub.
    Failed,
    /// The record is read-only.
    ReadOnly,
    /// The record data was rejected as invalid.
    InvalidRecord,
    /// The hub completed the write before taking all the data.
    NotEnough,
}

/// Orientation quaternion used for reorientation commands.
#[derive(Clone, Copy, PartialEq, Debug, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Quaternion {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub w: f64,
}

/// Static description of one sensor, read from its FRS metadata record.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SensorMetadata {
    /// Motion Engine version.
    pub me_version: u8,
    /// Motion Hub version.
    pub mh_version: u8,
    /// SensorHub version.
    pub sh_version: u8,
    /// Same units as the sensor's reports.
    pub range: u32,
    /// Same units as the sensor's reports.
    pub resolution: u32,
    /// Metadata record format revision.
    pub revision: u16,
    /// Power draw while on. [mA] 16Q10 fixed point.
    pub power_ma: u16,
    /// Minimum report period. [us]
    pub min_period_us: u32,
    pub fifo_reserved: u16,
    pub fifo_max: u16,
    pub batch_buffer_bytes: u16,
    /// Q point for sensor values (record revision 1 and up).
    pub q_point1: u16,
    /// Q point for accuracy or bias fields (record revision 1 and up).
    pub q_point2: u16,
    pub vendor_id_len: u16,
    /// Vendor name and part number, `vendor_id_len` bytes used.
    pub vendor_id: [u8; 48],
    pub sensor_specific_len: u16,
    /// Sensor-specific data (record revision 2 and up).
    pub sensor_specific: [u8; 48],
}

impl Default for SensorMetadata {
    fn default() -> Self {
        Self {
            me_version: 0,
            mh_version: 0,
            sh_version: 0,
            range: 0,
            resolution: 0,
            revision: 0,
            power_ma: 0,
            min_period_us: 0,
            fifo_reserved: 0,
            fifo_max: 0,
            batch_buffer_bytes: 0,
            q_point1: 0,
            q_point2: 0,
            vendor_id_len: 0,
            vendor_id: [0; 48],
            sensor_specific_len: 0,
            sensor_specific: [0; 48],
        }
    }
}

/// Metadata FRS record backing each sensor.
const METADATA_RECORDS: &[(SensorId, u16)] = &[
    (SensorId::RawAccelerometer, 0xE301),
    (SensorId::Accelerometer, 0xE302),
    (SensorId::LinearAcceleration, 0xE303),
    (SensorId::Gravity, 0xE304),
    (SensorId::RawGyroscope, 0xE305),
    (SensorId::GyroscopeCalibrated, 0xE306),
    (SensorId::GyroscopeUncalibrated, 0xE307),
    (SensorId::RawMagnetometer, 0xE308),
    (SensorId::MagneticFieldCalibrated, 0xE309),
    (SensorId::MagneticFieldUncalibrated, 0xE30A),
    (SensorId::RotationVector, 0xE30B),
    (SensorId::GameRotationVector, 0xE30C),
    (SensorId::GeomagneticRotationVector, 0xE30D),
    (SensorId::Pressure, 0xE30E),
    (SensorId::AmbientLight, 0xE30F),
    (SensorId::Humidity, 0xE310),
    (SensorId::Proximity, 0xE311),
    (SensorId::Temperature, 0xE312),
    (SensorId::TapDetector, 0xE313),
    (SensorId::StepDetector, 0xE314),
    (SensorId::StepCounter, 0xE315),
    (SensorId::SignificantMotion, 0xE316),
    (SensorId::ActivityClassification, 0xE317),
    (SensorId::ShakeDetector, 0xE318),
    (SensorId::FlipDetector, 0xE319),
    (SensorId::PickupDetector, 0xE31A),
    (SensorId::StabilityDetector, 0xE31B),
    (SensorId::PersonalActivityClassifier, 0xE31C),
    (SensorId::SleepDetector, 0xE31D),
];

impl<P: SensorHubPort> Bno070<P> {
    /// Open a session with hub `unit` over `port`.
    ///
    /// Resets the hub into application firmware and discards the zeroed
    /// boot report that HID over I²C mandates after reset.
    pub fn init(unit: u8, port: P) -> Result<Self, Error<P::Error>> {
        let mut hid = Hid::new(port);
        hid.open()?;

        Ok(Self {
            hid,
            unit,
            command_seq: 0,
            time_base: TimeBase::default(),
        })
    }

    /// Which hub unit this session drives.
    pub fn unit(&self) -> u8 {
        self.unit
    }

    /// End the session and return the platform port.
    pub fn free(self) -> P {
        self.hid.free()
    }

    /// Read the current configuration of `sensor`.
    pub fn sensor_config_get(&mut self, sensor: SensorId) -> Result<SensorConfig, Error<P::Error>> {
        let mut payload = [0u8; SENSOR_CONFIG_LEN];
        let len = self.hid.get_feature_report(sensor as u8, &mut payload)?;
        if len != SENSOR_CONFIG_LEN {
            return Err(Error::BadReport);
        }
        Ok(SensorConfig::from_payload(&payload))
    }

    /// Set the configuration of `sensor`: rate, wake behavior, sensitivity.
    pub fn sensor_config_set(
        &mut self,
        sensor: SensorId,
        config: &SensorConfig,
    ) -> Result<(), Error<P::Error>> {
        let mut report = [0u8; SENSOR_CONFIG_LEN + 1];
        report[0] = sensor as u8;
        config.write_payload(&mut report[1..]);
        self.hid.set_feature_report(&report)
    }

    /// True if a sensor event is waiting on the input pipe.
    pub fn event_ready(&mut self) -> bool {
        self.port().intn_asserted()
    }

    /// Read one sensor event without blocking.
    pub fn event_get(&mut self) -> Result<SensorEvent, Error<P::Error>> {
        self.event_get_timeout(NO_WAIT)
    }

    /// Read one sensor event, blocking up to `timeout_ms`.
    ///
    /// [`port::WAIT_FOREVER`] blocks indefinitely. Returns
    /// [`Error::NoData`] when the timeout expires first.
    pub fn event_get_timeout(&mut self, timeout_ms: u16) -> Result<SensorEvent, Error<P::Error>> {
        let mut report = [0u8; MAX_INPUT_REPORT_LEN];
        let mut timestamp = 0u32;
        let len = self.hid.input(&mut report, timeout_ms, Some(&mut timestamp))?;

        event::decode(&mut self.time_base, &report[..len], timestamp)
    }

    /// Read the FRS metadata record describing `sensor`.
    pub fn metadata_get(&mut self, sensor: SensorId) -> Result<SensorMetadata, Error<P::Error>> {
        let record_id = METADATA_RECORDS
            .iter()
            .find(|(id, _)| *id == sensor)
            .map(|(_, record_id)| *record_id)
            .ok_or(Error::BadParam)?;

        let mut words = [0u32; MAX_FRS_WORDS];
        self.frs_get(record_id, &mut words)?;

        let mut meta = SensorMetadata {
            me_version: words[0] as u8,
            mh_version: (words[0] >> 8) as u8,
            sh_version: (words[0] >> 16) as u8,
            range: words[1],
            resolution: words[2],
            power_ma: words[3] as u16,
            revision: (words[3] >> 16) as u16,
            min_period_us: words[4],
            fifo_max: words[5] as u16,
            fifo_reserved: (words[5] >> 16) as u16,
            batch_buffer_bytes: words[6] as u16,
            vendor_id_len: (words[6] >> 16) as u16,
            ..SensorMetadata::default()
        };

        if meta.vendor_id_len as usize > meta.vendor_id.len() {
            return Err(Error::BadParam);
        }

        match meta.revision {
            0 => {
                copy_record_bytes(&mut meta.vendor_id, &words, 7, meta.vendor_id_len as usize);
            }
            1 => {
                meta.q_point1 = words[7] as u16;
                meta.q_point2 = (words[7] >> 16) as u16;
                copy_record_bytes(&mut meta.vendor_id, &words, 8, meta.vendor_id_len as usize);
            }
            2 => {
                meta.q_point1 = words[7] as u16;
                meta.q_point2 = (words[7] >> 16) as u16;
                meta.sensor_specific_len = words[8] as u16;
                if meta.sensor_specific_len as usize > meta.sensor_specific.len() {
                    return Err(Error::BadParam);
                }
                copy_record_bytes(
                    &mut meta.sensor_specific,
                    &words,
                    9,
                    meta.sensor_specific_len as usize,
                );
                let vendor_word = 9 + (meta.sensor_specific_len as usize).div_ceil(4);
                copy_record_bytes(
                    &mut meta.vendor_id,
                    &words,
                    vendor_word,
                    meta.vendor_id_len as usize,
                );
            }
            // Later revisions: leave the extended fields untouched.
            _ => {}
        }

        Ok(meta)
    }

    /// Request the four product id records identifying the hub's software.
    pub fn prod_ids_get(
        &mut self,
    ) -> Result<[ProductId; command::NUM_PRODUCT_IDS], Error<P::Error>> {
        self.hid.set_out_report(&[command::PROD_ID_REQUEST, 0])?;

        let mut ids = [ProductId::default(); command::NUM_PRODUCT_IDS];
        let mut collected = 0;
        while collected < ids.len() {
            let mut report = [0u8; MAX_INPUT_REPORT_LEN];
            let len = self.hid.input(&mut report, IN_TIMEOUT_MS, None)?;
            if let Some(id) = command::parse_prod_id(&report[..len]) {
                ids[collected] = id;
                collected += 1;
            }
        }

        Ok(ids)
    }

    /// Drain the hub's error queue.
    ///
    /// All errors at `severity` and higher are returned; pass 0 to read
    /// everything. Up to `errors.len()` records are stored and the count is
    /// returned, but the reply stream is always drained to its sentinel so
    /// the hub's queue is fully flushed.
    pub fn errors_get(
        &mut self,
        severity: u8,
        errors: &mut [ErrorRecord],
    ) -> Result<usize, Error<P::Error>> {
        let seq = self.next_seq();
        self.hid
            .set_out_report(&command::request(seq, CommandCode::ReportErrors, &[severity]))?;

        let mut stored = 0;
        loop {
            let resp = self.command_response(CommandCode::ReportErrors, seq)?;

            // Older hub firmware marks the end of the stream with severity
            // 255, newer firmware with source 255.
            if resp.body[0] == 255 || resp.body[2] == 255 {
                return Ok(stored);
            }

            if stored < errors.len() {
                errors[stored] = ErrorRecord {
                    severity: resp.body[0],
                    sequence: resp.body[1],
                    source: resp.body[2],
                    error: resp.body[3],
                    module: resp.body[4],
                    code: resp.body[5],
                };
                stored += 1;
            }
        }
    }

    /// Read the four performance counters of `sensor`.
    pub fn counts_get(&mut self, sensor: SensorId) -> Result<Counts, Error<P::Error>> {
        let seq = self.next_seq();
        self.hid.set_out_report(&command::request(
            seq,
            CommandCode::Counts,
            &[command::COUNTS_GET, sensor as u8],
        ))?;

        let mut counts = Counts::default();
        let mut replies = 0;
        while replies < 2 {
            let resp = self.command_response(CommandCode::Counts, seq)?;
            if resp.body[1] != 1 {
                return Err(Error::Hub);
            }

            let value0 = read_u32(&resp.body[3..]);
            let value1 = read_u32(&resp.body[7..]);
            match resp.resp_seq {
                0 => {
                    counts.offered = value0;
                    counts.accepted = value1;
                }
                1 => {
                    counts.on = value0;
                    counts.attempted = value1;
                }
                _ => {}
            }
            replies += 1;
        }

        Ok(counts)
    }

    /// Clear the performance counters of `sensor`.
    pub fn counts_clear(&mut self, sensor: SensorId) -> Result<(), Error<P::Error>> {
        let seq = self.next_seq();
        self.hid.set_out_report(&command::request(
            seq,
            CommandCode::Counts,
            &[command::COUNTS_CLEAR, sensor as u8],
        ))
    }

    /// Establish the current orientation as the reference frame.
    ///
    /// `axes` is a bitmap of [`command::TARE_X`], [`TARE_Y`] and [`TARE_Z`];
    /// `basis` picks the rotation vector defining the new frame.
    ///
    /// [`TARE_Y`]: command::TARE_Y
    /// [`TARE_Z`]: command::TARE_Z
    pub fn tare_now(&mut self, axes: u8, basis: TareBasis) -> Result<(), Error<P::Error>> {
        let seq = self.next_seq();
        self.hid.set_out_report(&command::request(
            seq,
            CommandCode::Tare,
            &[command::TARE_NOW, axes, basis as u8],
        ))
    }

    /// Revert the orientation reference frame to its power-up setting.
    pub fn tare_clear(&mut self) -> Result<(), Error<P::Error>> {
        let seq = self.next_seq();
        self.hid
            .set_out_report(&command::reorientation_request(seq, [0; 4]))
    }

    /// Save the current orientation reference frame to non-volatile storage.
    pub fn tare_persist(&mut self) -> Result<(), Error<P::Error>> {
        let seq = self.next_seq();
        self.hid
            .set_out_report(&command::request(seq, CommandCode::Tare, &[command::TARE_PERSIST]))
    }

    /// Set the orientation reference frame explicitly.
    pub fn reorientation_set(&mut self, orientation: &Quaternion) -> Result<(), Error<P::Error>> {
        let seq = self.next_seq();
        let q = [
            to_16q14_component(orientation.x),
            to_16q14_component(orientation.y),
            to_16q14_component(orientation.z),
            to_16q14_component(orientation.w),
        ];
        self.hid
            .set_out_report(&command::reorientation_request(seq, q))
    }

    /// Reinitialize the hub as if it had just powered on.
    pub fn reinitialize(&mut self) -> Result<(), Error<P::Error>> {
        let seq = self.next_seq();
        self.hid.set_out_report(&command::request(
            seq,
            CommandCode::Initialize,
            &[command::INITIALIZE_SENSORHUB],
        ))
    }

    /// Save dynamic calibration data to non-volatile storage immediately.
    pub fn dcd_save_now(&mut self) -> Result<(), Error<P::Error>> {
        let seq = self.next_seq();
        self.hid
            .set_out_report(&command::request(seq, CommandCode::SaveDcd, &[]))?;

        let resp = self.command_response(CommandCode::SaveDcd, seq)?;
        if resp.body[0] != 0 {
            return Err(Error::Hub);
        }
        Ok(())
    }

    /// Select which sensors store dynamic calibration in non-volatile
    /// memory. `sensors` is a bitmap of [`command::CAL_ACCEL`],
    /// [`CAL_GYRO`] and [`CAL_MAG`].
    ///
    /// [`CAL_GYRO`]: command::CAL_GYRO
    /// [`CAL_MAG`]: command::CAL_MAG
    pub fn cal_config_set(&mut self, sensors: u8) -> Result<(), Error<P::Error>> {
        let seq = self.next_seq();
        let params = [
            (sensors & command::CAL_ACCEL != 0) as u8,
            (sensors & command::CAL_GYRO != 0) as u8,
            (sensors & command::CAL_MAG != 0) as u8,
        ];
        self.hid
            .set_out_report(&command::request(seq, CommandCode::CalConfig, &params))?;

        let resp = self.command_response(CommandCode::CalConfig, seq)?;
        if resp.body[0] != 0 {
            return Err(Error::Hub);
        }
        Ok(())
    }

    /// Perform a rotation vector synchronization operation.
    pub fn rv_sync(&mut self, op: RvSyncOp) -> Result<(), Error<P::Error>> {
        let seq = self.next_seq();
        self.hid
            .set_out_report(&command::request(seq, CommandCode::RvSync, &[op as u8]))
    }

    pub(crate) fn port(&mut self) -> &mut P {
        self.hid.port()
    }

    fn next_seq(&mut self) -> u8 {
        let seq = self.command_seq;
        self.command_seq = self.command_seq.wrapping_add(1);
        seq
    }

    /// Wait for the response to the in-flight command, discarding sensor
    /// events, stale responses and everything else sharing the input pipe.
    fn command_response(
        &mut self,
        command: CommandCode,
        seq: u8,
    ) -> Result<CommandResponse, Error<P::Error>> {
        loop {
            let mut report = [0u8; MAX_INPUT_REPORT_LEN];
            let len = self.hid.input(&mut report, IN_TIMEOUT_MS, None)?;

            let Some(resp) = CommandResponse::parse(&report[..len]) else {
                continue;
            };
            if resp.command != command as u8 || resp.cmd_seq != seq {
                continue;
            }
            return Ok(resp);
        }
    }
}

/// Unpack record bytes stored little-endian inside 32-bit words.
fn copy_record_bytes(dst: &mut [u8], words: &[u32], first_word: usize, len: usize) {
    for n in 0..len {
        dst[n] = (words[first_word + n / 4] >> (8 * (n % 4))) as u8;
    }
}

fn to_16q14_component(value: f64) -> i16 {
    (value * (1 << 14) as f64) as i16
}

pub fn from_16q14(value: i16) -> f32 {
    value as f32 / (1 << 14) as f32
}

pub fn to_16q14(value: f32) -> i16 {
    (value * (1 << 14) as f32) as i16
}

pub fn from_16q12(value: i16) -> f32 {
    value as f32 / (1 << 12) as f32
}

pub fn from_16q9(value: i16) -> f32 {
    value as f32 / (1 << 9) as f32
}

pub fn from_16q8(value: i16) -> f32 {
    value as f32 / (1 << 8) as f32
}

pub fn from_16q5(value: i16) -> f32 {
    value as f32 / (1 << 5) as f32
}

pub fn from_16q4(value: i16) -> f32 {
    value as f32 / (1 << 4) as f32
}
