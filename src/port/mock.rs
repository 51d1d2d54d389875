//! Scripted platform port used by the driver tests.

use std::collections::VecDeque;
use std::vec::Vec;

use super::SensorHubPort;

/// Test double for [`SensorHubPort`]: records every outbound I²C write and
/// plays back queued read data, INTN states and ISR timestamps.
pub struct MockPort {
    /// Every I²C write payload, in order.
    pub sent: Vec<Vec<u8>>,
    /// Queued I²C read payloads.
    pub reads: VecDeque<Vec<u8>>,
    /// Queued INTN samples (true = asserted). Shared by `intn_asserted` and
    /// `wait_intn`; an empty queue reads as de-asserted.
    pub intn: VecDeque<bool>,
    /// Queued ISR timestamps.
    pub timestamps: VecDeque<u32>,
    pub resets: usize,
    pub dfu_resets: usize,
}

impl MockPort {
    pub fn new() -> Self {
        Self {
            sent: Vec::new(),
            reads: VecDeque::new(),
            intn: VecDeque::new(),
            timestamps: VecDeque::new(),
            resets: 0,
            dfu_resets: 0,
        }
    }

    /// Queue one IN report: asserts INTN once and supplies the
    /// length-prefixed frame the transport will read.
    pub fn queue_report(&mut self, report: &[u8]) {
        let mut frame = Vec::with_capacity(report.len() + 2);
        frame.extend_from_slice(&(report.len() as u16 + 2).to_le_bytes());
        frame.extend_from_slice(report);
        self.intn.push_back(true);
        self.reads.push_back(frame);
    }

    /// Queue raw I²C read data without touching the INTN schedule.
    pub fn queue_read(&mut self, bytes: &[u8]) {
        self.reads.push_back(bytes.to_vec());
    }

    /// Queue one de-asserted INTN sample.
    pub fn queue_no_data(&mut self) {
        self.intn.push_back(false);
    }
}

impl SensorHubPort for MockPort {
    type Error = ();

    fn reset(&mut self) -> Result<(), ()> {
        self.resets += 1;
        Ok(())
    }

    fn reset_dfu(&mut self) -> Result<(), ()> {
        self.dfu_resets += 1;
        Ok(())
    }

    fn i2c(&mut self, send: &[u8], recv: &mut [u8]) -> Result<(), ()> {
        if !send.is_empty() {
            self.sent.push(send.to_vec());
        }
        if !recv.is_empty() {
            let data = self.reads.pop_front().unwrap_or_default();
            let n = data.len().min(recv.len());
            recv[..n].copy_from_slice(&data[..n]);
        }
        Ok(())
    }

    fn intn_asserted(&mut self) -> bool {
        self.intn.pop_front().unwrap_or(false)
    }

    fn wait_intn(&mut self, _wait_ms: u16) -> bool {
        self.intn.pop_front().unwrap_or(false)
    }

    fn timestamp_us(&mut self) -> u32 {
        self.timestamps.pop_front().unwrap_or(0)
    }
}
