use std::error;
use std::fmt;
use std::io::{self, Read, Write};
use std::thread;
use std::time::Duration;

use pinbridge_proto::frame::{self, FrameError, SetStatus};
use pinbridge_proto::PinType;

/// One serial-attached board and the settle window its replies need.
///
/// A transaction writes a full frame, sleeps the settle window, then drains
/// whatever the device produced. The wire has no acknowledgement or
/// correlation, so the settle sleep is the only synchronization there is.
pub struct Board<P> {
    port: P,
    settle: Duration,
}

#[derive(Debug)]
pub enum BoardError {
    /// The link itself failed. A desynchronized stream cannot recover
    /// without a reconnect protocol this wire does not have, so callers
    /// treat this as fatal.
    Io(io::Error),
    /// The link works but the reply did not decode.
    Frame(FrameError),
}

impl fmt::Display for BoardError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BoardError::Io(_) => write!(f, "serial I/O failure"),
            BoardError::Frame(_) => write!(f, "unparseable device reply"),
        }
    }
}

impl error::Error for BoardError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            BoardError::Io(e) => Some(e),
            BoardError::Frame(e) => Some(e),
        }
    }
}

impl From<io::Error> for BoardError {
    fn from(value: io::Error) -> Self {
        BoardError::Io(value)
    }
}

impl<P> Board<P>
where
    P: Read + Write,
{
    pub fn new(port: P, settle: Duration) -> Self {
        Board { port, settle }
    }

    /// Reads one pin and decodes the integer payload of the reply.
    pub fn get(&mut self, pin_type: PinType, pin: u8) -> Result<i32, BoardError> {
        let raw = self.transact(&frame::encode_get(pin_type, pin))?;
        frame::decode_get(&raw, pin_type).map_err(BoardError::Frame)
    }

    /// Drives one digital pin and reads back the status field.
    pub fn set(&mut self, pin: u8, value: i32) -> Result<SetStatus, BoardError> {
        let raw = self.transact(&frame::encode_set(pin, value))?;
        Ok(frame::decode_set(&raw))
    }

    fn transact(&mut self, message: &str) -> Result<String, BoardError> {
        self.port.write_all(message.as_bytes())?;
        self.port.flush()?;

        thread::sleep(self.settle);

        // Drain everything the device has buffered by now; the settle
        // window already passed, so a timeout or zero-read ends the reply.
        let mut raw = Vec::new();
        let mut buf = [0u8; 64];
        loop {
            match self.port.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => raw.extend_from_slice(&buf[..n]),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e)
                    if e.kind() == io::ErrorKind::TimedOut
                        || e.kind() == io::ErrorKind::WouldBlock =>
                {
                    break
                }
                Err(e) => return Err(BoardError::Io(e)),
            }
        }

        Ok(String::from_utf8_lossy(&raw).into_owned())
    }
}
