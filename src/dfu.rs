//! Firmware update (DFU) engine.
//!
//! Resets the hub into its bootloader and streams a firmware image as
//! CRC-framed packets, each acknowledged with a single byte. The image comes
//! from a [`FirmwareBlob`], so it can live in flash, on a filesystem or
//! behind a serial link.

use crate::Error;
use crate::port::{FirmwareBlob, SensorHubPort, WAIT_FOREVER};

/// Largest DFU data payload. Every packet carries a 2-byte CRC on top.
pub const MAX_PACKET_LEN: usize = 64;

/// Firmware format tag the bootloader accepts.
const FW_FORMAT: &str = "BNO_V1";

/// The bootloader acknowledges each packet with this byte.
const ACK: u8 = b's';

/// Reprogram the hub with the image in `blob`.
///
/// On success the hub has watchdog-reset into the new firmware and asserted
/// INTN; the caller should open a fresh session to talk to it. The blob is
/// closed on every path out of here.
pub fn perform_dfu<P, B>(port: &mut P, blob: &mut B) -> Result<(), Error<P::Error>>
where
    P: SensorHubPort,
    B: FirmwareBlob,
{
    blob.open().map_err(|_| Error::Other)?;

    let result = stream_image(port, blob);
    let _ = blob.close();
    result?;

    // The hub watchdog-resets into the new image; wait for it to come up.
    while !port.wait_intn(WAIT_FOREVER) {}

    Ok(())
}

fn stream_image<P, B>(port: &mut P, blob: &mut B) -> Result<(), Error<P::Error>>
where
    P: SensorHubPort,
    B: FirmwareBlob,
{
    if blob.meta("FW-Format") != Some(FW_FORMAT) {
        return Err(Error::InvalidFirmware);
    }

    let app_len = blob.app_len();
    let mut packet_len = blob.packet_len() as usize;
    if packet_len == 0 || packet_len > MAX_PACKET_LEN {
        packet_len = MAX_PACKET_LEN;
    }

    port.reset_dfu().map_err(Error::Port)?;

    let mut packet = [0u8; MAX_PACKET_LEN + 2];

    // Application length, big-endian.
    packet[..4].copy_from_slice(&app_len.to_be_bytes());
    send_packet(port, &mut packet, 4)?;

    // Packet size.
    packet[0] = packet_len as u8;
    send_packet(port, &mut packet, 1)?;

    // The image itself, in packets of `packet_len`.
    let mut offset: u32 = 0;
    while offset < app_len {
        let chunk = ((app_len - offset) as usize).min(packet_len);
        blob.read_app_data(&mut packet[..chunk], offset)
            .map_err(|_| Error::Other)?;
        send_packet(port, &mut packet, chunk)?;
        offset += chunk as u32;
    }

    Ok(())
}

/// Append the CRC to `packet[..len]`, send it, and consume the ACK byte.
fn send_packet<P: SensorHubPort>(
    port: &mut P,
    packet: &mut [u8],
    len: usize,
) -> Result<(), Error<P::Error>> {
    let crc = crc16(&packet[..len]);
    packet[len..len + 2].copy_from_slice(&crc.to_be_bytes());

    port.i2c(&packet[..len + 2], &mut []).map_err(|_| Error::I2cIo)?;

    let mut ack = [0u8; 1];
    port.i2c(&[], &mut ack).map_err(|_| Error::I2cIo)?;
    if ack[0] != ACK {
        return Err(Error::Nack);
    }

    Ok(())
}

/// CRC-16/CCITT-FALSE: polynomial 0x1021, initial value 0xFFFF, no
/// reflection, no final xor.
pub(crate) fn crc16(data: &[u8]) -> u16 {
    let mut crc: u16 = 0xFFFF;
    for &byte in data {
        let mut x = (byte as u16) << 8;
        for _ in 0..8 {
            if (crc ^ x) & 0x8000 != 0 {
                crc = (crc << 1) ^ 0x1021;
            } else {
                crc <<= 1;
            }
            x <<= 1;
        }
    }
    crc
}
