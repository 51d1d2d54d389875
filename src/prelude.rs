//! Re-exports of the driver's public API surface.

pub use crate::dfu::{MAX_PACKET_LEN, perform_dfu};
pub use crate::port::{FirmwareBlob, NO_WAIT, SensorHubPort, WAIT_FOREVER};
pub use crate::port::hal::{ALTERNATE_ADDRESS, DEFAULT_ADDRESS, HalError, HalPort};
pub use crate::report::command::{
    CAL_ACCEL, CAL_GYRO, CAL_MAG, CommandCode, Counts, ErrorRecord, NUM_PRODUCT_IDS, ProductId,
    RvSyncOp, TARE_X, TARE_Y, TARE_Z, TareBasis,
};
pub use crate::report::event::{
    ConfigFlags, EventStatus, SensorConfig, SensorData, SensorEvent, SensorId,
};
pub use crate::report::frs::{FrsReadStatus, FrsWriteStatus};
pub use crate::{
    Bno070, DRIVER_VERSION, Error, FrsReadError, FrsWriteError, Quaternion, SensorMetadata,
};
