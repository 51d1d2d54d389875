//! FRS record read and write engines.
//!
//! Both engines share the session's input pipe with unsolicited sensor
//! events, so every IN report is filtered before it is allowed to advance
//! the exchange; anything else is discarded.

use crate::port::SensorHubPort;
use crate::report::MAX_INPUT_REPORT_LEN;
use crate::report::frs::{self, FrsReadStatus, FrsWriteStatus};
use crate::{Bno070, Error, FrsReadError, FrsWriteError, IN_TIMEOUT_MS};

/// Largest FRS record the driver stages, in words. The hub's own limit is 68
/// words; the headroom covers future record growth.
pub(crate) const MAX_FRS_WORDS: usize = 72;

impl<P: SensorHubPort> Bno070<P> {
    /// Read FRS record `record_id` into `data`, returning the number of
    /// words retrieved.
    ///
    /// If the hub returns more words than `data` holds, the surplus is
    /// dropped and the exchange is still drained to its terminal status so
    /// the input pipe stays framed; the call then fails with
    /// [`FrsReadError::UnexpectedLength`].
    pub fn frs_get(&mut self, record_id: u16, data: &mut [u32]) -> Result<usize, Error<P::Error>> {
        let request = frs::read_request(record_id, data.len() as u16);
        self.hid.set_out_report(&request)?;

        let mut overrun = false;
        let mut last_copied: Option<usize> = None;

        loop {
            let mut report = [0u8; MAX_INPUT_REPORT_LEN];
            let len = self.hid.input(&mut report, IN_TIMEOUT_MS, None)?;

            // Ignore anything but read responses for the requested record.
            let Some(resp) = frs::ReadResponse::parse(&report[..len]) else {
                continue;
            };
            if resp.record_id != record_id {
                continue;
            }

            let status = FrsReadStatus::try_from(resp.status)
                .map_err(|_| Error::FrsRead(FrsReadError::Unknown))?;
            match status {
                FrsReadStatus::Unrecognized => {
                    return Err(Error::FrsRead(FrsReadError::Unrecognized));
                }
                FrsReadStatus::Busy => return Err(Error::FrsRead(FrsReadError::Busy)),
                FrsReadStatus::OutOfRange => {
                    return Err(Error::FrsRead(FrsReadError::OffsetOutOfRange));
                }
                FrsReadStatus::DeviceError => {
                    return Err(Error::FrsRead(FrsReadError::DeviceError));
                }
                FrsReadStatus::Empty => return Ok(0),
                FrsReadStatus::NoError
                | FrsReadStatus::RecordCompleted
                | FrsReadStatus::BlockCompleted
                | FrsReadStatus::BothCompleted => {}
            }

            let words = (resp.words as usize).min(resp.data.len());
            for n in 0..words {
                let ix = resp.offset as usize + n;
                if ix >= data.len() {
                    overrun = true;
                } else {
                    data[ix] = resp.data[n];
                    last_copied = Some(ix);
                }
            }

            if status.is_terminal() {
                break;
            }
        }

        if overrun {
            return Err(Error::FrsRead(FrsReadError::UnexpectedLength));
        }
        Ok(last_copied.map_or(0, |ix| ix + 1))
    }

    /// Write `data` to FRS record `record_id`.
    ///
    /// The hub paces the transfer: each write response prompts the next
    /// two-word data request until the hub reports completion.
    pub fn frs_set(&mut self, record_id: u16, data: &[u32]) -> Result<(), Error<P::Error>> {
        let request = frs::write_request(record_id, data.len() as u16);
        self.hid.set_out_report(&request)?;

        let mut offset: usize = 0;

        loop {
            let mut report = [0u8; MAX_INPUT_REPORT_LEN];
            let len = self.hid.input(&mut report, IN_TIMEOUT_MS, None)?;

            let Some(resp) = frs::WriteResponse::parse(&report[..len]) else {
                continue;
            };

            let status = FrsWriteStatus::try_from(resp.status)
                .map_err(|_| Error::FrsWrite(FrsWriteError::BadStatus))?;
            match status {
                FrsWriteStatus::Unrecognized => {
                    return Err(Error::FrsWrite(FrsWriteError::BadType));
                }
                FrsWriteStatus::Busy => return Err(Error::FrsWrite(FrsWriteError::Busy)),
                FrsWriteStatus::Failed => return Err(Error::FrsWrite(FrsWriteError::Failed)),
                FrsWriteStatus::BadMode => return Err(Error::FrsWrite(FrsWriteError::BadMode)),
                FrsWriteStatus::BadLen => return Err(Error::FrsWrite(FrsWriteError::BadLength)),
                FrsWriteStatus::Invalid => {
                    return Err(Error::FrsWrite(FrsWriteError::InvalidRecord));
                }
                FrsWriteStatus::DeviceError => {
                    return Err(Error::FrsWrite(FrsWriteError::DeviceError));
                }
                FrsWriteStatus::ReadOnly => return Err(Error::FrsWrite(FrsWriteError::ReadOnly)),
                FrsWriteStatus::Completed if offset >= data.len() => return Ok(()),
                // The hub finished before taking everything we have.
                FrsWriteStatus::Completed => return Err(Error::FrsWrite(FrsWriteError::NotEnough)),
                FrsWriteStatus::Ok | FrsWriteStatus::Ready | FrsWriteStatus::Valid => {}
            }

            if offset < data.len() {
                let n = (data.len() - offset).min(2);
                let chunk = frs::write_data_request(offset as u16, &data[offset..offset + n]);
                self.hid.set_out_report(&chunk)?;
                offset += n;
            }
        }
    }
}
