
use crate::pool::PacketHandle;

/// Link layer errors.
///
/// Pool exhaustion is not an error: `packet_get` and `receive` signal
/// it with an empty result.
#[derive(Debug, PartialEq)]
pub enum Error {
    /// Packet length field out of range; the handle is returned so
    /// the caller keeps ownership of the buffer
    InvalidLength(PacketHandle),

    /// Opcode with no known message shape
    UnknownOpcode(u8),
}
