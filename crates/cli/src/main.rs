//! usbref-ls
//!
//! Lists and inspects USB devices through the `usbref` bindings.

mod config;
mod inspect;

use anyhow::{Context, Result};
use clap::Parser;
use common::{DeviceFilter, setup_logging};
use config::CliConfig;
use tracing::{debug, info};
use usbref::{LogLevel, Session};

#[derive(Parser, Debug)]
#[command(name = "usbref-ls")]
#[command(author, version, about = "List and inspect USB devices")]
#[command(long_about = "
Lists USB devices with their bus location, speed and IDs, and opens
single devices to read their strings, configuration and descriptors.

EXAMPLES:
    # List all devices
    usbref-ls

    # List with configuration, interface, endpoint and BOS descriptors
    usbref-ls --verbose

    # Inspect one device and claim interface 0
    usbref-ls --device 0x1234:0x5678 --claim 0

CONFIGURATION:
    usbref-ls looks for configuration files in the following order:
    1. Path specified with --config
    2. ~/.config/usbref/usbref-ls.toml
    3. /etc/usbref/usbref-ls.toml
    4. Built-in defaults
")]
struct Args {
    /// Path to configuration file
    #[arg(short, long, value_name = "PATH")]
    config: Option<String>,

    /// Save default configuration to default location and exit
    #[arg(long)]
    save_config: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, value_name = "LEVEL")]
    log_level: Option<String>,

    /// Native core log level (none, error, warning, info, debug)
    #[arg(long, value_name = "LEVEL")]
    native_log_level: Option<LogLevel>,

    /// Print configuration and BOS descriptors
    #[arg(short, long)]
    verbose: bool,

    /// Open the first device matching VID:PID (e.g. 0x1234:0x5678 or 0x1234:*)
    #[arg(short, long, value_name = "VID:PID")]
    device: Option<DeviceFilter>,

    /// Claim and release this interface on the opened device
    #[arg(long, value_name = "INTERFACE", requires = "device")]
    claim: Option<u8>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Handle --save-config flag early (before loading config)
    if args.save_config {
        let config = CliConfig::default();
        let path = CliConfig::default_path();
        config.save(&path).context("Failed to save configuration")?;
        println!("Configuration saved to: {}", path.display());
        return Ok(());
    }

    let config = if let Some(ref path) = args.config {
        let path = config::expand_path(path)?;
        CliConfig::load(Some(path)).context("Failed to load configuration")?
    } else {
        CliConfig::load_or_default()
    };

    // Use CLI log level if specified, otherwise use config value
    let log_level = args.log_level.as_deref().unwrap_or(&config.log_level);
    setup_logging(log_level).context("Failed to setup logging")?;

    info!("usbref-ls v{}", env!("CARGO_PKG_VERSION"));
    debug!("Configuration: {:?}", config);

    let session = Session::open().context("Failed to initialise the USB core")?;
    session.set_log_level(args.native_log_level.unwrap_or(config.native_log_level));

    match args.device {
        Some(filter) => inspect::inspect_device(&session, &filter, args.claim, &config),
        None => inspect::list_devices(
            &session,
            &config.filters,
            args.verbose || config.show_descriptors,
        ),
    }
}
