//! Command/response protocol reports and the product id exchange.

use derive_more::TryFrom;

use super::{read_u32, write_u32};

/// Product id request report id.
pub const PROD_ID_REQUEST: u8 = 0x80;
/// Product id response report id.
pub const PROD_ID_RESPONSE: u8 = 0x81;
/// How many product id records one request yields.
pub const NUM_PRODUCT_IDS: usize = 4;
/// Command request report id.
pub const COMMAND_REQUEST: u8 = 0x87;
/// Command response report id.
pub const COMMAND_RESPONSE: u8 = 0x88;

/// Command codes carried in command request/response reports.
#[repr(u8)]
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CommandCode {
    ReportErrors = 0x01,
    Counts = 0x02,
    Tare = 0x03,
    Initialize = 0x04,
    /// Response only: unsolicited FRS change notification.
    FrsChange = 0x05,
    SaveDcd = 0x06,
    CalConfig = 0x07,
    RvSync = 0x08,
}

// Subcommand / subsystem codes.
pub(crate) const COUNTS_GET: u8 = 0x00;
pub(crate) const COUNTS_CLEAR: u8 = 0x01;
pub(crate) const TARE_NOW: u8 = 0x00;
pub(crate) const TARE_PERSIST: u8 = 0x01;
pub(crate) const TARE_SET_ORIENT: u8 = 0x02;
pub(crate) const INITIALIZE_SENSORHUB: u8 = 0x01;

/// Bit in the tare `axes` bitmap selecting the X axis.
pub const TARE_X: u8 = 0x01;
/// Bit in the tare `axes` bitmap selecting the Y axis.
pub const TARE_Y: u8 = 0x02;
/// Bit in the tare `axes` bitmap selecting the Z axis.
pub const TARE_Z: u8 = 0x04;

/// Calibration config bit enabling accelerometer calibration storage.
pub const CAL_ACCEL: u8 = 0x01;
/// Calibration config bit enabling gyroscope calibration storage.
pub const CAL_GYRO: u8 = 0x02;
/// Calibration config bit enabling magnetometer calibration storage.
pub const CAL_MAG: u8 = 0x04;

/// Which rotation vector defines the new reference frame for a tare.
#[repr(u8)]
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default, TryFrom)]
#[try_from(repr)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TareBasis {
    #[default]
    RotationVector = 0,
    GameRotationVector = 1,
    GeomagneticRotationVector = 2,
}

/// Rotation vector synchronization operations.
#[repr(u8)]
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default, TryFrom)]
#[try_from(repr)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RvSyncOp {
    /// Synchronize rotation vector production with this command.
    #[default]
    SyncNow = 0,
    /// Enable rotation vector sync from an external signal.
    ExtSyncEnable = 1,
    /// Disable rotation vector sync from an external signal.
    ExtSyncDisable = 2,
}

/// Length of every command request frame except the reorientation request.
pub(crate) const REQUEST_LEN: usize = 12;
/// Length of the reorientation request frame (four 32-bit components).
pub(crate) const REORIENT_REQUEST_LEN: usize = 20;
/// Length of every command response frame.
pub(crate) const RESPONSE_LEN: usize = 16;
/// Length of a product id response frame.
pub(crate) const PROD_ID_RESPONSE_LEN: usize = 16;

/// Build a command request frame: report id, sequence, command code, then up
/// to nine parameter bytes (unused ones stay zero).
pub(crate) fn request(sequence: u8, command: CommandCode, params: &[u8]) -> [u8; REQUEST_LEN] {
    let mut frame = [0u8; REQUEST_LEN];
    frame[0] = COMMAND_REQUEST;
    frame[1] = sequence;
    frame[2] = command as u8;
    frame[3..3 + params.len()].copy_from_slice(params);
    frame
}

/// Build the tare set-reorientation request. Each quaternion component is a
/// sign-extended 16Q14 value in a 32-bit little-endian field.
pub(crate) fn reorientation_request(sequence: u8, q: [i16; 4]) -> [u8; REORIENT_REQUEST_LEN] {
    let mut frame = [0u8; REORIENT_REQUEST_LEN];
    frame[0] = COMMAND_REQUEST;
    frame[1] = sequence;
    frame[2] = CommandCode::Tare as u8;
    frame[3] = TARE_SET_ORIENT;
    for (n, component) in q.iter().enumerate() {
        write_u32(&mut frame[4 + 4 * n..], *component as i32 as u32);
    }
    frame
}

/// Command response frame, reduced to the fields the dispatcher filters on
/// and the command-specific body.
pub(crate) struct CommandResponse {
    pub command: u8,
    pub cmd_seq: u8,
    pub resp_seq: u8,
    /// Command-specific bytes following the fixed header.
    pub body: [u8; 11],
}

impl CommandResponse {
    pub(crate) fn parse(report: &[u8]) -> Option<Self> {
        if report.len() != RESPONSE_LEN || report[0] != COMMAND_RESPONSE {
            return None;
        }
        let mut body = [0u8; 11];
        body.copy_from_slice(&report[5..16]);
        Some(Self {
            command: report[2],
            cmd_seq: report[3],
            resp_seq: report[4],
            body,
        })
    }
}

/// Identification of one software component of the hub.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ProductId {
    pub reset_cause: u8,
    pub sw_version_major: u8,
    pub sw_version_minor: u8,
    pub sw_part_number: u32,
    pub sw_build_number: u32,
    pub sw_version_patch: u16,
}

pub(crate) fn parse_prod_id(report: &[u8]) -> Option<ProductId> {
    if report.len() != PROD_ID_RESPONSE_LEN || report[0] != PROD_ID_RESPONSE {
        return None;
    }
    Some(ProductId {
        reset_cause: report[1],
        sw_version_major: report[2],
        sw_version_minor: report[3],
        sw_part_number: read_u32(&report[4..]),
        sw_build_number: read_u32(&report[8..]),
        sw_version_patch: super::read_u16(&report[12..]),
    })
}

/// One entry from the hub's internal error queue.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ErrorRecord {
    /// Error severity, 0 is most severe.
    pub severity: u8,
    /// Sequence number within this severity.
    pub sequence: u8,
    /// 1 MotionEngine, 2 MotionHub, 3 SensorHub, 4 chip.
    pub source: u8,
    pub error: u8,
    pub module: u8,
    pub code: u8,
}

/// Per-sensor performance counters.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Counts {
    /// Events the sensor offered. [events]
    pub offered: u32,
    /// Events the hub accepted. [events]
    pub accepted: u32,
    pub on: u32,
    pub attempted: u32,
}
