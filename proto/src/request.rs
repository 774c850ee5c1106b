use crate::frame::SetStatus;
use crate::{Action, PinType};

/// Reported value of a successful Set.
pub const VALUE_OK: &str = "OK";
/// Reported value of a failed Set or an unservable request.
pub const VALUE_ERROR: &str = "ER";

/// One imperative command against a single pin. Fetched requests carry a
/// correlation id; commands synthesized on the device side do not.
#[derive(Debug, Clone)]
pub struct Request {
    pub id: Option<u32>,
    pub port: String,
    pub action: Action,
    pub pin_type: PinType,
    pub pin_number: u8,
    pub value: i32,
}

/// Outcome of a request, posted back to the control service. A response
/// without a correlation id has nowhere to go and is never posted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub request_id: Option<u32>,
    pub value: String,
}

impl Response {
    pub fn level(request_id: Option<u32>, level: i32) -> Self {
        Response { request_id, value: level.to_string() }
    }

    pub fn set(request_id: Option<u32>, status: SetStatus) -> Self {
        let value = match status {
            SetStatus::Ok => VALUE_OK,
            SetStatus::Error => VALUE_ERROR,
        };
        Response { request_id, value: value.to_string() }
    }

    pub fn error(request_id: Option<u32>) -> Self {
        Response { request_id, value: VALUE_ERROR.to_string() }
    }
}
