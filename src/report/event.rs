//! Sensor event reports and the sensor configuration feature report.

use bitfield_struct::bitfield;
use derive_more::TryFrom;

use super::{MAX_INPUT_REPORT_LEN, SENSOR_REPORT_ID_LIMIT, read_i16, read_u16, read_u32, write_u16, write_u32};
use crate::Error;

/// Sensor types supported by the hub.
///
/// The discriminant doubles as the report id of the sensor's input reports
/// and of its configuration feature report.
#[repr(u8)]
#[derive(Clone, Copy, PartialEq, Eq, Debug, TryFrom)]
#[try_from(repr)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SensorId {
    Accelerometer = 0x01,
    GyroscopeCalibrated = 0x02,
    MagneticFieldCalibrated = 0x03,
    LinearAcceleration = 0x04,
    RotationVector = 0x05,
    Gravity = 0x06,
    GyroscopeUncalibrated = 0x07,
    GameRotationVector = 0x08,
    GeomagneticRotationVector = 0x09,
    Pressure = 0x0A,
    AmbientLight = 0x0B,
    Humidity = 0x0C,
    Proximity = 0x0D,
    Temperature = 0x0E,
    MagneticFieldUncalibrated = 0x0F,
    TapDetector = 0x10,
    StepCounter = 0x11,
    SignificantMotion = 0x12,
    ActivityClassification = 0x13,
    RawAccelerometer = 0x14,
    RawGyroscope = 0x15,
    RawMagnetometer = 0x16,
    Sar = 0x17,
    StepDetector = 0x18,
    ShakeDetector = 0x19,
    FlipDetector = 0x1A,
    PickupDetector = 0x1B,
    StabilityDetector = 0x1C,
    PersonalActivityClassifier = 0x1E,
    SleepDetector = 0x1F,
}

/// Status byte attached to every sensor event.
#[bitfield(u8, order = Lsb)]
pub struct EventStatus {
    /// Reading accuracy: 0 unreliable, 1 low, 2 medium, 3 high.
    #[bits(2)]
    pub accuracy: u8,
    /// Exponent scaling the event's delay significand.
    #[bits(3)]
    pub delay_exponent: u8,
    #[bits(3, access = RO)]
    pub not_used0: u8,
}

/// Flags byte of the sensor configuration feature report.
#[bitfield(u8, order = Lsb)]
pub struct ConfigFlags {
    #[bits(1)]
    pub change_sensitivity_relative: bool,
    #[bits(1)]
    pub change_sensitivity_enabled: bool,
    #[bits(1)]
    pub wakeup_enabled: bool,
    #[bits(5, access = RO)]
    pub not_used0: u8,
}

/// Payload length of the sensor configuration feature report (the report id
/// travels separately in the SET/GET_REPORT framing).
pub(crate) const SENSOR_CONFIG_LEN: usize = 15;

/// Operating configuration of one sensor: reporting rate, wake behavior and
/// change sensitivity.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SensorConfig {
    /// Report on change only.
    pub change_sensitivity_enabled: bool,
    /// Change threshold is relative (vs absolute).
    pub change_sensitivity_relative: bool,
    /// Events from this sensor wake the host.
    pub wakeup_enabled: bool,
    /// Threshold a reading must exceed to trigger a report. 0 sends all.
    pub change_sensitivity: u16,
    /// Interval between asynchronous input reports. [us]
    pub report_interval_us: u32,
    /// Reserved. Set as zero.
    pub reserved1: u32,
    /// Meaning is sensor specific.
    pub sensor_specific: u32,
}

impl SensorConfig {
    pub(crate) fn from_payload(payload: &[u8]) -> Self {
        let flags = ConfigFlags::from_bits(payload[0]);
        Self {
            change_sensitivity_relative: flags.change_sensitivity_relative(),
            change_sensitivity_enabled: flags.change_sensitivity_enabled(),
            wakeup_enabled: flags.wakeup_enabled(),
            change_sensitivity: read_u16(&payload[1..]),
            report_interval_us: read_u32(&payload[3..]),
            reserved1: read_u32(&payload[7..]),
            sensor_specific: read_u32(&payload[11..]),
        }
    }

    pub(crate) fn write_payload(&self, payload: &mut [u8]) {
        let flags = ConfigFlags::new()
            .with_change_sensitivity_relative(self.change_sensitivity_relative)
            .with_change_sensitivity_enabled(self.change_sensitivity_enabled)
            .with_wakeup_enabled(self.wakeup_enabled);
        payload[0] = flags.into_bits();
        write_u16(&mut payload[1..], self.change_sensitivity);
        write_u32(&mut payload[3..], self.report_interval_us);
        write_u32(&mut payload[7..], self.reserved1);
        write_u32(&mut payload[11..], self.sensor_specific);
    }
}

/// Decoded payload of a sensor event, keyed by the sensor that produced it.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SensorData {
    /// Humidity, proximity, temperature and the detector sensors.
    Scalar16(u16),
    /// Pressure, ambient light and the step detector.
    Scalar32(u32),
    /// Raw accelerometer/gyroscope/magnetometer samples in ADC counts.
    ///
    /// Only the raw gyroscope populates `temperature`; the other raw sensors
    /// leave the slot reserved.
    Raw {
        x: i16,
        y: i16,
        z: i16,
        temperature: i16,
        /// Sample time on the hub's clock. [us]
        timestamp_us: u32,
    },
    /// Calibrated three-axis readings (accelerometer, linear acceleration,
    /// gravity, gyroscope, magnetic field).
    Vector { x: i16, y: i16, z: i16 },
    /// Game rotation vector, components in 16Q14.
    Quaternion { i: i16, j: i16, k: i16, real: i16 },
    /// Rotation vector and geomagnetic rotation vector: 16Q14 components
    /// plus a 16Q12 accuracy estimate.
    QuaternionAccuracy {
        i: i16,
        j: i16,
        k: i16,
        real: i16,
        accuracy: i16,
    },
    /// Uncalibrated gyroscope/magnetic field with bias estimates.
    VectorBias {
        x: i16,
        y: i16,
        z: i16,
        bias_x: i16,
        bias_y: i16,
        bias_z: i16,
    },
    /// Step counter.
    StepCounter {
        /// Delay between the step and its detection. [us]
        detect_latency_us: u32,
        steps: u16,
        reserved: u16,
    },
}

/// One sensor event read from the hub.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SensorEvent {
    /// Which sensor produced this event.
    pub sensor: SensorId,
    /// Increments once per report; gaps indicate dropped reports.
    pub sequence_number: u8,
    /// Host time of the reading, reconstructed from the INTN interrupt
    /// timestamp minus the hub-reported delay. [us]
    pub time_us: u64,
    /// Raw status byte (accuracy in bits 1:0, delay exponent in bits 4:2).
    pub status: u8,
    /// Delay significand; the total delay is `delay << delay_exponent`. [us]
    pub delay: u8,
    /// Sensor-specific payload.
    pub data: SensorData,
}

impl SensorEvent {
    /// Reading accuracy, 0 (unreliable) to 3 (high).
    pub fn accuracy(&self) -> u8 {
        EventStatus::from_bits(self.status).accuracy()
    }

    /// Total sample-to-report delay in microseconds.
    pub fn delay_us(&self) -> u32 {
        (self.delay as u32) << EventStatus::from_bits(self.status).delay_exponent()
    }
}

/// Per-session 64-bit time base accumulated from 32-bit ISR timestamps.
///
/// The delta between consecutive ISR timestamps is taken as a signed 32-bit
/// value so a wrap of the platform counter still advances the accumulator
/// forward.
#[derive(Clone, Copy, Default)]
pub(crate) struct TimeBase {
    last_timestamp: u32,
    time_us: u64,
}

impl TimeBase {
    fn update(&mut self, timestamp: u32) -> u64 {
        let delta = timestamp.wrapping_sub(self.last_timestamp) as i32;
        self.last_timestamp = timestamp;
        self.time_us = self.time_us.wrapping_add(delta as i64 as u64);
        self.time_us
    }
}

/// Decode one IN report into a sensor event.
///
/// The time base is only advanced once the report has passed validation, so
/// a malformed frame leaves the session's clock reconstruction untouched.
pub(crate) fn decode<E>(
    time_base: &mut TimeBase,
    report: &[u8],
    timestamp: u32,
) -> Result<SensorEvent, Error<E>> {
    if report.len() > MAX_INPUT_REPORT_LEN {
        return Err(Error::BadParam);
    }
    if report.len() < 4 {
        return Err(Error::BadReport);
    }
    if report[0] >= SENSOR_REPORT_ID_LIMIT {
        return Err(Error::BadReport);
    }
    let sensor = SensorId::try_from(report[0]).map_err(|_| Error::BadReport)?;

    let data = decode_data(sensor, report.len(), &report[4..])?;

    let status = EventStatus::from_bits(report[2]);
    let delay = (report[3] as u32) << status.delay_exponent();
    let time_us = time_base.update(timestamp);

    Ok(SensorEvent {
        sensor,
        sequence_number: report[1],
        time_us: time_us.wrapping_sub(delay as u64),
        status: report[2],
        delay: report[3],
        data,
    })
}

fn decode_data<E>(sensor: SensorId, report_len: usize, data: &[u8]) -> Result<SensorData, Error<E>> {
    use SensorId::*;

    let check = |min: usize| if report_len < min { Err(Error::BadReport) } else { Ok(()) };

    let data = match sensor {
        Humidity | Proximity | Temperature | SignificantMotion | ShakeDetector
        | FlipDetector | PickupDetector | StabilityDetector => {
            check(6)?;
            SensorData::Scalar16(read_u16(data))
        }
        Pressure | AmbientLight | StepDetector => {
            check(8)?;
            SensorData::Scalar32(read_u32(data))
        }
        RawAccelerometer | RawGyroscope | RawMagnetometer => {
            check(16)?;
            SensorData::Raw {
                x: read_i16(data),
                y: read_i16(&data[2..]),
                z: read_i16(&data[4..]),
                temperature: read_i16(&data[6..]),
                timestamp_us: read_u32(&data[8..]),
            }
        }
        Accelerometer | LinearAcceleration | Gravity | GyroscopeCalibrated
        | MagneticFieldCalibrated => {
            check(10)?;
            SensorData::Vector {
                x: read_i16(data),
                y: read_i16(&data[2..]),
                z: read_i16(&data[4..]),
            }
        }
        GameRotationVector => {
            check(12)?;
            SensorData::Quaternion {
                i: read_i16(data),
                j: read_i16(&data[2..]),
                k: read_i16(&data[4..]),
                real: read_i16(&data[6..]),
            }
        }
        RotationVector | GeomagneticRotationVector => {
            check(14)?;
            SensorData::QuaternionAccuracy {
                i: read_i16(data),
                j: read_i16(&data[2..]),
                k: read_i16(&data[4..]),
                real: read_i16(&data[6..]),
                accuracy: read_i16(&data[8..]),
            }
        }
        GyroscopeUncalibrated | MagneticFieldUncalibrated => {
            check(16)?;
            SensorData::VectorBias {
                x: read_i16(data),
                y: read_i16(&data[2..]),
                z: read_i16(&data[4..]),
                bias_x: read_i16(&data[6..]),
                bias_y: read_i16(&data[8..]),
                bias_z: read_i16(&data[10..]),
            }
        }
        StepCounter => {
            check(12)?;
            SensorData::StepCounter {
                detect_latency_us: read_u32(data),
                steps: read_u16(&data[4..]),
                reserved: read_u16(&data[6..]),
            }
        }
        // Not produced by current hub firmware.
        Sar | TapDetector | ActivityClassification | PersonalActivityClassifier
        | SleepDetector => return Err(Error::BadReport),
    };

    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    type TestError = Error<()>;

    fn decode_ok(tb: &mut TimeBase, report: &[u8], timestamp: u32) -> SensorEvent {
        decode::<()>(tb, report, timestamp).unwrap()
    }

    #[test]
    fn decodes_rotation_vector() {
        let mut tb = TimeBase::default();
        let mut report = [0u8; 14];
        report[0] = 0x05; // rotation vector
        report[1] = 7;
        report[2] = 0x03; // accuracy 3, exponent 0
        report[3] = 10;
        for (n, v) in [100i16, 200, 300, 400, 500].iter().enumerate() {
            report[4 + 2 * n..6 + 2 * n].copy_from_slice(&v.to_le_bytes());
        }

        let event = decode_ok(&mut tb, &report, 1000);
        assert_eq!(event.sensor, SensorId::RotationVector);
        assert_eq!(event.sequence_number, 7);
        assert_eq!(event.accuracy(), 3);
        assert_eq!(event.delay_us(), 10);
        assert_eq!(event.time_us, 1000 - 10);
        assert_eq!(
            event.data,
            SensorData::QuaternionAccuracy { i: 100, j: 200, k: 300, real: 400, accuracy: 500 }
        );
    }

    #[test]
    fn decodes_scalar_reports() {
        let mut tb = TimeBase::default();

        let report = [0x0C, 1, 0, 0, 0x34, 0x12];
        let event = decode_ok(&mut tb, &report, 10);
        assert_eq!(event.data, SensorData::Scalar16(0x1234));

        let report = [0x0A, 2, 0, 0, 0x78, 0x56, 0x34, 0x12];
        let event = decode_ok(&mut tb, &report, 20);
        assert_eq!(event.data, SensorData::Scalar32(0x1234_5678));
    }

    #[test]
    fn decodes_raw_mems_report() {
        let mut tb = TimeBase::default();
        let mut report = [0u8; 16];
        report[0] = 0x15; // raw gyroscope
        report[4..6].copy_from_slice(&(-5i16).to_le_bytes());
        report[6..8].copy_from_slice(&6i16.to_le_bytes());
        report[8..10].copy_from_slice(&(-7i16).to_le_bytes());
        report[10..12].copy_from_slice(&30i16.to_le_bytes());
        report[12..16].copy_from_slice(&99_000u32.to_le_bytes());

        let event = decode_ok(&mut tb, &report, 0);
        assert_eq!(
            event.data,
            SensorData::Raw { x: -5, y: 6, z: -7, temperature: 30, timestamp_us: 99_000 }
        );
    }

    #[test]
    fn decodes_step_counter() {
        let mut tb = TimeBase::default();
        let mut report = [0u8; 12];
        report[0] = 0x11;
        report[4..8].copy_from_slice(&1500u32.to_le_bytes());
        report[8..10].copy_from_slice(&42u16.to_le_bytes());

        let event = decode_ok(&mut tb, &report, 0);
        assert_eq!(
            event.data,
            SensorData::StepCounter { detect_latency_us: 1500, steps: 42, reserved: 0 }
        );
    }

    #[test]
    fn decodes_uncalibrated_with_bias() {
        let mut tb = TimeBase::default();
        let mut report = [0u8; 16];
        report[0] = 0x07; // uncalibrated gyroscope
        for (n, v) in [1i16, 2, 3, -1, -2, -3].iter().enumerate() {
            report[4 + 2 * n..6 + 2 * n].copy_from_slice(&v.to_le_bytes());
        }

        let event = decode_ok(&mut tb, &report, 0);
        assert_eq!(
            event.data,
            SensorData::VectorBias { x: 1, y: 2, z: 3, bias_x: -1, bias_y: -2, bias_z: -3 }
        );
    }

    #[test]
    fn rejects_protocol_and_unknown_report_ids() {
        let mut tb = TimeBase::default();
        let report = [0x88u8, 0, 0, 0, 0, 0];
        assert_eq!(decode::<()>(&mut tb, &report, 0), Err(TestError::BadReport));

        let report = [0x20u8, 0, 0, 0, 0, 0];
        assert_eq!(decode::<()>(&mut tb, &report, 0), Err(TestError::BadReport));

        // Defined sensor id without an implemented report layout.
        let report = [0x10u8, 0, 0, 0, 0, 0, 0, 0];
        assert_eq!(decode::<()>(&mut tb, &report, 0), Err(TestError::BadReport));
    }

    #[test]
    fn short_report_leaves_time_base_untouched() {
        let mut tb = TimeBase::default();

        let mut good = [0u8; 10];
        good[0] = 0x01;
        decode_ok(&mut tb, &good, 1_000);

        // Rotation vector needs 14 bytes; 12 is too short.
        let mut short = [0u8; 12];
        short[0] = 0x05;
        assert_eq!(decode::<()>(&mut tb, &short, 5_000), Err(TestError::BadReport));

        // The next good event still sees the 1_000us reference, not 5_000.
        let event = decode_ok(&mut tb, &good, 2_000);
        assert_eq!(event.time_us, 2_000);
    }

    #[test]
    fn time_base_is_monotone_across_counter_wrap() {
        let mut tb = TimeBase::default();
        let mut report = [0u8; 10];
        report[0] = 0x01;

        let near_wrap = decode_ok(&mut tb, &report, 0xFFFF_FF00);
        let wrapped = decode_ok(&mut tb, &report, 0x0000_0100);
        assert!(wrapped.time_us > near_wrap.time_us);
        assert_eq!(wrapped.time_us - near_wrap.time_us, 0x200);
    }

    #[test]
    fn sensor_config_payload_round_trips() {
        let config = SensorConfig {
            change_sensitivity_enabled: true,
            change_sensitivity_relative: false,
            wakeup_enabled: true,
            change_sensitivity: 0x0102,
            report_interval_us: 10_000,
            reserved1: 0,
            sensor_specific: 0xAABB_CCDD,
        };

        let mut payload = [0u8; SENSOR_CONFIG_LEN];
        config.write_payload(&mut payload);
        assert_eq!(payload[0], 0x06); // enabled | wakeup
        assert_eq!(SensorConfig::from_payload(&payload), config);
    }
}
