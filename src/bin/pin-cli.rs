use std::time::Duration;

use argh::FromArgs;
use eyre::{bail, WrapErr};

use pinbridge_driver::{Board, SETTLE_DELAY};
use pinbridge_proto::frame::SetStatus;
use pinbridge_proto::PinType;

/// Poke one pin on a serial-attached device.
#[derive(FromArgs)]
struct Args {
    /// serial port to open
    #[argh(option, short = 'p')]
    port: String,

    /// baud rate
    #[argh(option, short = 'b', default = "9600")]
    baud: u32,

    #[argh(subcommand)]
    cmd: Cmd,
}

#[derive(FromArgs)]
#[argh(subcommand)]
enum Cmd {
    Get(GetCmd),
    Set(SetCmd),
}

/// read a pin
#[derive(FromArgs)]
#[argh(subcommand, name = "get")]
struct GetCmd {
    /// pin type, "a" or "d"
    #[argh(positional)]
    pin_type: String,

    /// pin number (0-99)
    #[argh(positional)]
    pin: u8,
}

/// drive a digital pin
#[derive(FromArgs)]
#[argh(subcommand, name = "set")]
struct SetCmd {
    /// pin number (0-99)
    #[argh(positional)]
    pin: u8,

    /// value; anything non-zero drives the pin high
    #[argh(positional)]
    value: i32,
}

fn main() -> eyre::Result<()> {
    let args: Args = argh::from_env();

    let port = serialport::new(&args.port, args.baud)
        .timeout(Duration::from_millis(50))
        .open()
        .wrap_err_with(|| format!("cannot open serial port {}", args.port))?;
    let mut board = Board::new(port, SETTLE_DELAY);

    match args.cmd {
        Cmd::Get(get) => {
            if get.pin > 99 {
                bail!("pin numbers run 0-99");
            }
            let pin_type = match get.pin_type.as_str() {
                "a" | "A" => PinType::Analogue,
                "d" | "D" => PinType::Digital,
                other => bail!("expected pin type \"a\" or \"d\", got {other:?}"),
            };
            let level = board.get(pin_type, get.pin)?;
            println!("{level}");
        }
        Cmd::Set(set) => {
            if set.pin > 99 {
                bail!("pin numbers run 0-99");
            }
            match board.set(set.pin, set.value)? {
                SetStatus::Ok => println!("OK"),
                SetStatus::Error => bail!("device rejected the set"),
            }
        }
    }

    Ok(())
}
