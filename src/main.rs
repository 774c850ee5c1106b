use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use argh::FromArgs;
use eyre::{eyre, WrapErr};
use serde::Deserialize;

use pinbridge_driver::{command_channel, main_loop, Board, SETTLE_DELAY};
use pinbridge_proto::Device;
use pinbridge_server::{Bridge, HttpRemote, Registry, Server};

/// Serial read timeout; ends the drain after the settle window.
const READ_TIMEOUT: Duration = Duration::from_millis(50);

/// Bridge between a control service and serial-attached pin devices.
#[derive(FromArgs)]
struct Args {
    /// path to the JSON configuration file
    #[argh(option, short = 'c')]
    config: Option<PathBuf>,
}

#[derive(Deserialize)]
struct DaemonConfig {
    services_root: String,
    salt: String,
    #[serde(default = "default_poll_interval")]
    poll_interval: String,
    devices: Vec<Device>,
}

fn default_poll_interval() -> String {
    "1s".to_string()
}

fn load_config(path: Option<&Path>) -> eyre::Result<DaemonConfig> {
    let file = match path {
        Some(path) => config::File::from(path.to_path_buf()),
        None => {
            let dirs = directories::ProjectDirs::from("", "", "pinbridge")
                .ok_or_else(|| eyre!("no home directory to locate the default config in"))?;
            config::File::from(dirs.config_dir().join("daemon.json"))
        }
    };

    let cfg = config::Config::builder()
        .add_source(file.format(config::FileFormat::Json))
        .build()
        .wrap_err("cannot read configuration")?;
    cfg.try_deserialize().wrap_err("invalid configuration")
}

fn main() -> eyre::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Args = argh::from_env();
    let cfg = load_config(args.config.as_deref())?;

    let poll_interval: Duration = fundu::DurationParser::new()
        .parse(&cfg.poll_interval)
        .map_err(|e| eyre!("bad poll_interval {:?}: {e}", cfg.poll_interval))?
        .try_into()
        .wrap_err("poll_interval out of range")?;

    if cfg.devices.is_empty() {
        log::warn!("no devices configured; every schedule and request will fail over");
    }

    let mut registry = Registry::new();
    for device in &cfg.devices {
        // Open eagerly: a device that cannot be reached at startup stops
        // the daemon before it takes any work.
        let port = serialport::new(&device.port, device.baud)
            .timeout(READ_TIMEOUT)
            .open()
            .wrap_err_with(|| format!("cannot open serial port {}", device.port))?;
        let board = Board::new(port, SETTLE_DELAY);

        let (send, recv) = command_channel();
        let name = device.port.clone();
        thread::spawn(move || main_loop(&name, board, recv));

        registry.insert(Bridge::new(device.port.clone(), send));
        log::info!("device at {} ready ({} baud)", device.port, device.baud);
    }

    let remote = HttpRemote::new(&cfg.services_root, &cfg.salt);
    let server = Server::new(remote, registry).with_poll_interval(poll_interval);

    log::info!("program started; polling {}", cfg.services_root);
    smol::block_on(server.main_loop())?;
    Ok(())
}
