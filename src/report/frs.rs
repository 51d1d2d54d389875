//! FRS (Flash Record System) protocol reports and status codes.

use bitfield_struct::bitfield;
use derive_more::TryFrom;

use super::{read_u16, read_u32, write_u16, write_u32};

/// FRS write request report id.
pub const FRS_WRITE_REQUEST: u8 = 0x82;
/// FRS write-data request report id.
pub const FRS_WRITE_DATA_REQUEST: u8 = 0x83;
/// FRS write response report id.
pub const FRS_WRITE_RESPONSE: u8 = 0x84;
/// FRS read request report id.
pub const FRS_READ_REQUEST: u8 = 0x85;
/// FRS read response report id.
pub const FRS_READ_RESPONSE: u8 = 0x86;

/// Status nibble of an FRS read response.
#[repr(u8)]
#[derive(Clone, Copy, PartialEq, Eq, Debug, TryFrom)]
#[try_from(repr)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FrsReadStatus {
    NoError = 0,
    Unrecognized = 1,
    Busy = 2,
    RecordCompleted = 3,
    OutOfRange = 4,
    Empty = 5,
    BlockCompleted = 6,
    BothCompleted = 7,
    DeviceError = 8,
}

impl FrsReadStatus {
    /// True for the statuses that end a read exchange successfully.
    pub(crate) fn is_terminal(self) -> bool {
        matches!(
            self,
            FrsReadStatus::RecordCompleted
                | FrsReadStatus::BlockCompleted
                | FrsReadStatus::BothCompleted
        )
    }
}

/// Status byte of an FRS write response.
#[repr(u8)]
#[derive(Clone, Copy, PartialEq, Eq, Debug, TryFrom)]
#[try_from(repr)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FrsWriteStatus {
    Ok = 0,
    Unrecognized = 1,
    Busy = 2,
    Completed = 3,
    Ready = 4,
    Failed = 5,
    BadMode = 6,
    BadLen = 7,
    Valid = 8,
    Invalid = 9,
    DeviceError = 10,
    ReadOnly = 11,
}

/// Packed word-count/status byte of an FRS read response.
#[bitfield(u8, order = Lsb)]
pub struct WordsStatus {
    #[bits(4)]
    pub status: u8,
    #[bits(4)]
    pub words: u8,
}

pub(crate) const READ_REQUEST_LEN: usize = 8;
pub(crate) const READ_RESPONSE_LEN: usize = 16;
pub(crate) const WRITE_REQUEST_LEN: usize = 6;
pub(crate) const WRITE_DATA_REQUEST_LEN: usize = 12;
pub(crate) const WRITE_RESPONSE_LEN: usize = 4;

/// Build an FRS read request for a whole record.
pub(crate) fn read_request(record_id: u16, read_len_words: u16) -> [u8; READ_REQUEST_LEN] {
    let mut frame = [0u8; READ_REQUEST_LEN];
    frame[0] = FRS_READ_REQUEST;
    // frame[1] reserved, frame[2..4] offset = 0
    write_u16(&mut frame[4..], record_id);
    write_u16(&mut frame[6..], read_len_words);
    frame
}

/// One FRS read response: up to two record words at a word offset.
pub(crate) struct ReadResponse {
    pub status: u8,
    pub words: u8,
    pub offset: u16,
    pub data: [u32; 2],
    pub record_id: u16,
}

impl ReadResponse {
    pub(crate) fn parse(report: &[u8]) -> Option<Self> {
        if report.len() != READ_RESPONSE_LEN || report[0] != FRS_READ_RESPONSE {
            return None;
        }
        let words_status = WordsStatus::from_bits(report[1]);
        Some(Self {
            status: words_status.status(),
            words: words_status.words(),
            offset: read_u16(&report[2..]),
            data: [read_u32(&report[4..]), read_u32(&report[8..])],
            record_id: read_u16(&report[12..]),
        })
    }
}

/// Build an FRS write request announcing `data_len_words` words.
pub(crate) fn write_request(record_id: u16, data_len_words: u16) -> [u8; WRITE_REQUEST_LEN] {
    let mut frame = [0u8; WRITE_REQUEST_LEN];
    frame[0] = FRS_WRITE_REQUEST;
    write_u16(&mut frame[2..], data_len_words);
    write_u16(&mut frame[4..], record_id);
    frame
}

/// Build an FRS write-data request carrying one or two words.
pub(crate) fn write_data_request(word_offset: u16, words: &[u32]) -> [u8; WRITE_DATA_REQUEST_LEN] {
    let mut frame = [0u8; WRITE_DATA_REQUEST_LEN];
    frame[0] = FRS_WRITE_DATA_REQUEST;
    write_u16(&mut frame[2..], word_offset);
    for (n, word) in words.iter().take(2).enumerate() {
        write_u32(&mut frame[4 + 4 * n..], *word);
    }
    frame
}

/// One FRS write response. The frame also carries the hub's next word
/// offset, but the host tracks its own write position.
pub(crate) struct WriteResponse {
    pub status: u8,
}

impl WriteResponse {
    pub(crate) fn parse(report: &[u8]) -> Option<Self> {
        if report.len() != WRITE_RESPONSE_LEN || report[0] != FRS_WRITE_RESPONSE {
            return None;
        }
        Some(Self { status: report[1] })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_request_layout() {
        let frame = read_request(0xE302, 72);
        assert_eq!(frame, [0x85, 0, 0, 0, 0x02, 0xE3, 72, 0]);
    }

    #[test]
    fn parses_read_response() {
        let mut report = [0u8; READ_RESPONSE_LEN];
        report[0] = FRS_READ_RESPONSE;
        report[1] = (2 << 4) | 3; // two words, record completed
        report[2..4].copy_from_slice(&6u16.to_le_bytes());
        report[4..8].copy_from_slice(&0x1111_1111u32.to_le_bytes());
        report[8..12].copy_from_slice(&0x2222_2222u32.to_le_bytes());
        report[12..14].copy_from_slice(&0xE302u16.to_le_bytes());

        let resp = ReadResponse::parse(&report).unwrap();
        assert_eq!(resp.words, 2);
        assert_eq!(resp.status, FrsReadStatus::RecordCompleted as u8);
        assert_eq!(resp.offset, 6);
        assert_eq!(resp.data, [0x1111_1111, 0x2222_2222]);
        assert_eq!(resp.record_id, 0xE302);

        assert!(ReadResponse::parse(&report[..12]).is_none());
    }

    #[test]
    fn write_frames_layout() {
        let frame = write_request(0x4D4D, 3);
        assert_eq!(frame, [0x82, 0, 3, 0, 0x4D, 0x4D]);

        let frame = write_data_request(2, &[0xAABB_CCDD]);
        assert_eq!(&frame[..4], &[0x83, 0, 2, 0]);
        assert_eq!(&frame[4..8], &0xAABB_CCDDu32.to_le_bytes());
        assert_eq!(&frame[8..12], &[0, 0, 0, 0]);
    }

    #[test]
    fn status_code_lookup() {
        assert_eq!(FrsReadStatus::try_from(5u8).ok(), Some(FrsReadStatus::Empty));
        assert!(FrsReadStatus::try_from(12u8).is_err());
        assert!(FrsReadStatus::BothCompleted.is_terminal());
        assert!(!FrsReadStatus::NoError.is_terminal());

        assert_eq!(FrsWriteStatus::try_from(11u8).ok(), Some(FrsWriteStatus::ReadOnly));
        assert!(FrsWriteStatus::try_from(12u8).is_err());
    }
}
