use pinbridge_proto::frame::{FrameError, SetStatus};
use pinbridge_proto::PinType;

/// One serial transaction, as synthesized from an ad-hoc request, a
/// schedule payload or a condition probe. Commands carry no correlation
/// id; the reply channel is the correlation.
#[derive(Debug, Clone, Copy)]
pub enum Command {
    Get { pin_type: PinType, pin: u8 },
    Set { pin: u8, value: i32 },
}

#[derive(Debug, Clone)]
pub enum Reply {
    /// Decoded payload of a Get.
    Level(i32),
    /// Status field of a Set.
    Set(SetStatus),
    /// The device answered, but not in a decodable shape.
    Garbled(FrameError),
}
