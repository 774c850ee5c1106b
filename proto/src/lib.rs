use serde::{Deserialize, Serialize};

pub mod frame;

mod request;
mod schedule;

pub use request::{Request, Response, VALUE_ERROR, VALUE_OK};
pub use schedule::{Condition, Schedule};

/// Whether a pin carries a multi-digit reading or a single on/off digit.
/// The variant decides the width of the payload window in Get replies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PinType {
    #[serde(rename = "A")]
    Analogue,
    #[serde(rename = "D")]
    Digital,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    #[serde(rename = "G")]
    Get,
    #[serde(rename = "S")]
    Set,
}

/// One serial-attached microcontroller, as named by configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Device {
    pub port: String,
    #[serde(default = "default_baud")]
    pub baud: u32,
}

fn default_baud() -> u32 {
    9600
}
