use std::path::PathBuf;
use std::process::Command;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use crossbeam_channel::unbounded;
use log::info;
use parking_lot::Mutex;
use simplelog::*;

mod cfg;
mod keys;
mod oskbd;
mod remapper;
mod taphold;
mod vkbd;
mod vmouse;

use cfg::Config;
use oskbd::{DeviceReader, UinputKeyboard, UinputMouse};
use remapper::Remapper;
use taphold::{LayerView, TapHoldHandler};
use vkbd::VirtualKeyboard;
use vmouse::VirtualMouse;

const DEFAULT_CONFIG_FILE: &str = ".config/mouseless/config.yaml";

#[derive(Parser, Debug)]
#[command(name = "mouseless")]
/// mouseless: control the mouse and remap keys with your keyboard
///
/// Grabs the configured keyboard devices exclusively and replays them
/// through a virtual keyboard and mouse, driven by layered key bindings.
struct Args {
    /// Show the version
    #[arg(short = 'v', long)]
    version: bool,

    /// Show verbose debug information
    #[arg(short, long)]
    debug: bool,

    /// The config file
    #[arg(short, long)]
    config: Option<PathBuf>,
}

fn main() {
    if let Err(e) = main_impl() {
        log::error!("{e:#}");
        log::error!("Exiting");
        std::process::exit(1);
    }
}

fn main_impl() -> Result<()> {
    let args = Args::parse();

    if args.version {
        println!("{}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    init_logging(args.debug);

    let cfg_path = match args.config {
        Some(path) => path,
        None => dirs::home_dir()
            .context("Failed to find the home directory")?
            .join(DEFAULT_CONFIG_FILE),
    };
    log::debug!("Using config file: {}", cfg_path.display());

    let config =
        Arc::new(Config::load(&cfg_path).context("Failed to read the config file")?);

    let detected = oskbd::scan_keyboard_devices();
    log::debug!("Auto detected keyboard devices:");
    for (path, name) in &detected {
        log::debug!("- {}: {}", path.display(), name);
    }

    // a keyboard carrying our virtual device's name means another instance
    // has already grabbed the real ones
    if detected
        .iter()
        .any(|(_, name)| name == oskbd::VIRTUAL_KEYBOARD_NAME)
    {
        bail!(
            "Found a keyboard device with name {}, which probably means that \
             another instance of mouseless is already running",
            oskbd::VIRTUAL_KEYBOARD_NAME
        );
    }

    // if no devices are specified, use the detected ones
    let device_paths: Vec<String> = if config.devices.is_empty() {
        detected
            .iter()
            .map(|(path, _)| path.display().to_string())
            .collect()
    } else {
        config.devices.clone()
    };
    if device_paths.is_empty() {
        bail!("No keyboard devices found");
    }

    let mouse =
        VirtualMouse::new(UinputMouse::new().context("Failed to init the virtual mouse")?);
    let keyboard = VirtualKeyboard::new(
        UinputKeyboard::new(config.referenced_key_codes())
            .context("Failed to init the virtual keyboard")?,
    );

    let view = Arc::new(Mutex::new(LayerView {
        config: config.clone(),
        layer: 0,
    }));
    log::debug!("Switching to initial layer {}", config.layers[0].name);

    let (raw_tx, raw_rx) = unbounded();
    let handler = TapHoldHandler::spawn(raw_rx, view.clone());

    let readers: Vec<DeviceReader> = device_paths
        .into_iter()
        .map(|path| DeviceReader::spawn(path, raw_tx.clone()))
        .collect();

    if let Some(command) = &config.start_command {
        log::debug!("Executing start command: {command}");
        let status = Command::new("sh")
            .arg("-c")
            .arg(command)
            .status()
            .context("Execution of start command failed")?;
        if !status.success() {
            bail!("Execution of start command failed: {status}");
        }
    }

    info!("mouseless v{} starting", env!("CARGO_PKG_VERSION"));

    let mut remapper = Remapper::new(
        cfg_path,
        config,
        keyboard,
        mouse,
        handler.events,
        handler.control,
        handler.pressed,
        view,
        readers,
    );
    remapper.run()
}

fn init_logging(debug: bool) {
    let log_lvl = if debug {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    let mut log_cfg = ConfigBuilder::new();
    if let Err(e) = log_cfg.set_time_offset_to_local() {
        eprintln!("WARNING: could not set log TZ to local: {e:?}");
    };
    log_cfg.set_time_format_rfc3339();
    CombinedLogger::init(vec![TermLogger::new(
        log_lvl,
        log_cfg.build(),
        TerminalMode::Mixed,
        ColorChoice::AlwaysAnsi,
    )])
    .expect("logger can init");
}
