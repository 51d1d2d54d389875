//! HID-over-I²C transport.
//!
//! The hub exposes six logical 16-bit registers; reports move through the
//! OUTPUT/INPUT registers directly or through SET_REPORT/GET_REPORT
//! transactions staged via the COMMAND and DATA registers. IN transfers are
//! gated on the hub asserting INTN.

use crate::Error;
use crate::port::SensorHubPort;
use crate::report::{MAX_INPUT_REPORT_LEN, read_u16, write_u16};

/// HID-over-I²C register map of the hub.
#[repr(u16)]
#[derive(Clone, Copy, PartialEq)]
#[allow(dead_code)]
enum Register {
    HidDescriptor = 1,
    ReportDescriptor = 2,
    Input = 3,
    Output = 4,
    Command = 5,
    Data = 6,
}

const REPORT_TYPE_OUTPUT: u8 = 0x20;
const REPORT_TYPE_FEATURE: u8 = 0x30;

const GET_REPORT_OPCODE: u8 = 0x02;
const SET_REPORT_OPCODE: u8 = 0x03;

/// Report ids that don't fit the low nibble of the command byte travel in an
/// extension byte instead.
const REPORT_ID_INLINE_LIMIT: u8 = 0x0F;

/// Largest outbound report (the tare reorientation request).
pub(crate) const MAX_OUTPUT_REPORT_LEN: usize = 20;

/// How long to wait for the zeroed boot report after a reset.
const RESET_WAIT_MS: u16 = 200;

/// HID transport bound to one hub unit's platform port.
pub(crate) struct Hid<P> {
    port: P,
}

impl<P: SensorHubPort> Hid<P> {
    pub fn new(port: P) -> Self {
        Self { port }
    }

    pub fn port(&mut self) -> &mut P {
        &mut self.port
    }

    pub fn free(self) -> P {
        self.port
    }

    /// Reset the hub into application firmware and consume the zeroed boot
    /// report that HID over I²C mandates after reset.
    pub fn open(&mut self) -> Result<(), Error<P::Error>> {
        self.port.reset().map_err(Error::Port)?;

        let mut report = [0u8; MAX_INPUT_REPORT_LEN];
        let _ = self.input(&mut report, RESET_WAIT_MS, None);

        Ok(())
    }

    /// Raw OUT: write one report through the output register, bypassing the
    /// SET_REPORT command framing.
    #[allow(dead_code)]
    pub fn out(&mut self, report: &[u8]) -> Result<(), Error<P::Error>> {
        let mut buffer = [0u8; MAX_OUTPUT_REPORT_LEN + 4];
        write_u16(&mut buffer, Register::Output as u16);
        write_u16(&mut buffer[2..], report.len() as u16 + 2);
        buffer[4..4 + report.len()].copy_from_slice(report);

        self.port
            .i2c(&buffer[..report.len() + 4], &mut [])
            .map_err(Error::Port)
    }

    /// IN: wait for INTN, then read one length-prefixed report into
    /// `report`, returning its length (report id included).
    ///
    /// When `timestamp` is given it receives the microsecond timestamp of
    /// the interrupt assertion, sampled the moment INTN is observed.
    pub fn input(
        &mut self,
        report: &mut [u8],
        wait_ms: u16,
        timestamp: Option<&mut u32>,
    ) -> Result<usize, Error<P::Error>> {
        if !self.port.wait_intn(wait_ms) {
            return Err(Error::NoData);
        }
        if let Some(timestamp) = timestamp {
            *timestamp = self.port.timestamp_us();
        }

        let mut buffer = [0u8; MAX_INPUT_REPORT_LEN + 2];
        self.port.i2c(&[], &mut buffer).map_err(Error::Port)?;

        // The first two bytes are the total length, themselves included.
        let total = read_u16(&buffer) as usize;
        if total < 2 || total > MAX_INPUT_REPORT_LEN + 2 {
            return Err(Error::I2cIo);
        }

        let len = total - 2;
        report[..len].copy_from_slice(&buffer[2..total]);
        Ok(len)
    }

    /// SET_REPORT for an OUT report; `report[0]` is the report id.
    pub fn set_out_report(&mut self, report: &[u8]) -> Result<(), Error<P::Error>> {
        self.set_report(REPORT_TYPE_OUTPUT, report[0], &report[1..])
    }

    /// SET_REPORT for a FEATURE report; `report[0]` is the report id.
    pub fn set_feature_report(&mut self, report: &[u8]) -> Result<(), Error<P::Error>> {
        self.set_report(REPORT_TYPE_FEATURE, report[0], &report[1..])
    }

    /// GET_REPORT for a FEATURE report; returns the payload length.
    pub fn get_feature_report(
        &mut self,
        report_id: u8,
        payload: &mut [u8],
    ) -> Result<usize, Error<P::Error>> {
        self.get_report(REPORT_TYPE_FEATURE, report_id, payload)
    }

    fn set_report(
        &mut self,
        report_type: u8,
        report_id: u8,
        payload: &[u8],
    ) -> Result<(), Error<P::Error>> {
        let mut cmd = [0u8; MAX_OUTPUT_REPORT_LEN + 9];
        let mut ix = self.report_preamble(&mut cmd, report_type, report_id, SET_REPORT_OPCODE);

        write_u16(&mut cmd[ix..], Register::Data as u16);
        ix += 2;
        write_u16(&mut cmd[ix..], payload.len() as u16 + 2);
        ix += 2;
        cmd[ix..ix + payload.len()].copy_from_slice(payload);
        ix += payload.len();

        self.port.i2c(&cmd[..ix], &mut []).map_err(Error::Port)
    }

    fn get_report(
        &mut self,
        report_type: u8,
        report_id: u8,
        payload: &mut [u8],
    ) -> Result<usize, Error<P::Error>> {
        let mut cmd = [0u8; 7];
        let mut ix = self.report_preamble(&mut cmd, report_type, report_id, GET_REPORT_OPCODE);

        write_u16(&mut cmd[ix..], Register::Data as u16);
        ix += 2;

        let mut buffer = [0u8; MAX_INPUT_REPORT_LEN + 2];
        self.port
            .i2c(&cmd[..ix], &mut buffer)
            .map_err(Error::Port)?;

        let mut len = (read_u16(&buffer) as usize)
            .saturating_sub(2)
            .min(MAX_INPUT_REPORT_LEN);
        if len > payload.len() {
            len = payload.len();
        }
        payload[..len].copy_from_slice(&buffer[2..2 + len]);
        Ok(len)
    }

    fn report_preamble(&self, cmd: &mut [u8], report_type: u8, report_id: u8, opcode: u8) -> usize {
        write_u16(cmd, Register::Command as u16);
        if report_id < REPORT_ID_INLINE_LIMIT {
            cmd[2] = report_type | report_id;
            cmd[3] = opcode;
            4
        } else {
            cmd[2] = report_type | REPORT_ID_INLINE_LIMIT;
            cmd[3] = opcode;
            cmd[4] = report_id;
            5
        }
    }
}
