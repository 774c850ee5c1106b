use std::collections::HashMap;

use pinbridge_driver::{CmdSend, Command, Reply};
use pinbridge_proto::frame::{FrameError, SetStatus};
use pinbridge_proto::PinType;

use crate::Error;

/// Async handle to one device's serial loop. Cloning shares the underlying
/// command channel; the channel's capacity of one serializes commands.
#[derive(Clone)]
pub struct Bridge {
    port: String,
    cmd: CmdSend,
}

impl Bridge {
    pub fn new(port: impl Into<String>, cmd: CmdSend) -> Self {
        Bridge { port: port.into(), cmd }
    }

    #[must_use]
    pub fn port(&self) -> &str {
        &self.port
    }

    /// Reads one pin. The outer error is fatal (the device's serial loop is
    /// gone); the inner one means the device answered garbage.
    pub async fn get(&self, pin_type: PinType, pin: u8) -> Result<Result<i32, FrameError>, Error> {
        match self.exec(Command::Get { pin_type, pin }).await? {
            Reply::Level(level) => Ok(Ok(level)),
            Reply::Garbled(e) => Ok(Err(e)),
            Reply::Set(_) => unreachable!(),
        }
    }

    /// Drives one digital pin. A rejected set is an ordinary outcome, not
    /// an error.
    pub async fn set(&self, pin: u8, value: i32) -> Result<SetStatus, Error> {
        match self.exec(Command::Set { pin, value }).await? {
            Reply::Set(status) => Ok(status),
            // A set reply either carries OK or it does not; it never fails
            // to decode.
            Reply::Level(_) | Reply::Garbled(_) => unreachable!(),
        }
    }

    async fn exec(&self, command: Command) -> Result<Reply, Error> {
        let (resp_send, resp_recv) = async_channel::bounded(1);
        if self.cmd.send((command, resp_send)).await.is_err() {
            return Err(self.down());
        }
        resp_recv.recv().await.map_err(|_| self.down())
    }

    fn down(&self) -> Error {
        Error::LinkDown { port: self.port.clone() }
    }
}

/// Fixed port → bridge mapping, built once at startup and handed to the
/// polling loop. No entry is ever added or removed afterwards.
#[derive(Default)]
pub struct Registry {
    bridges: HashMap<String, Bridge>,
}

impl Registry {
    #[must_use]
    pub fn new() -> Self {
        Registry::default()
    }

    pub fn insert(&mut self, bridge: Bridge) {
        self.bridges.insert(bridge.port().to_string(), bridge);
    }

    /// Looks up the bridge serving `port`. A miss is an ordinary outcome
    /// that the callers surface as an error report, not a failure here.
    pub fn device_at(&self, port: &str) -> Option<&Bridge> {
        let found = self.bridges.get(port);
        if found.is_none() {
            log::warn!("there is no device at port {port}");
        }
        found
    }
}
