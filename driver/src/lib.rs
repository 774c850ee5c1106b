use std::io::{Read, Write};
use std::time::Duration;

use async_channel::{Receiver, Sender};

pub mod board;
pub mod cmds;

pub use board::{Board, BoardError};
pub use cmds::{Command, Reply};

/// Wait between writing a frame and draining the device's reply. The wire
/// protocol has no acknowledgement; the device just needs time to answer.
pub const SETTLE_DELAY: Duration = Duration::from_millis(500);

pub type CmdRecv = Receiver<(Command, Sender<Reply>)>;
pub type CmdSend = Sender<(Command, Sender<Reply>)>;

/// Capacity one: the wire has no request/response correlation, so at most
/// one command may be in flight per device.
#[must_use]
pub fn command_channel() -> (CmdSend, CmdRecv) {
    async_channel::bounded(1)
}

/// Blocking command loop for one device, meant for a dedicated thread.
///
/// Ends when the command channel closes, when a reply can no longer be
/// delivered, or on a serial I/O failure. The last case leaves the byte
/// stream in an unknown state; the loop logs and bails out, and the closed
/// channel surfaces the failure on the polling side.
pub fn main_loop<P>(port_name: &str, mut board: Board<P>, cmd: CmdRecv)
where
    P: Read + Write,
{
    while let Ok((req, resp)) = cmd.recv_blocking() {
        let reply = match run(&mut board, req) {
            Ok(reply) => reply,
            Err(e) => {
                log::error!("serial I/O failure on {port_name}: {e}");
                return;
            }
        };

        if resp.send_blocking(reply).is_err() {
            break;
        }
    }
}

fn run<P>(board: &mut Board<P>, req: Command) -> Result<Reply, std::io::Error>
where
    P: Read + Write,
{
    let outcome = match req {
        Command::Get { pin_type, pin } => board.get(pin_type, pin).map(Reply::Level),
        Command::Set { pin, value } => board.set(pin, value).map(Reply::Set),
    };

    match outcome {
        Ok(reply) => Ok(reply),
        Err(BoardError::Frame(e)) => Ok(Reply::Garbled(e)),
        Err(BoardError::Io(e)) => Err(e),
    }
}
