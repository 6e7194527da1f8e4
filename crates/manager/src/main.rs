//! pinpad-usb daemon
//!
//! Watches USB hot-plug events on a Linux host, requests permission for
//! pin pads and cameras through the configured grant policy and logs device
//! and host metadata for diagnostics.

use anyhow::{Context, Result};
use clap::Parser;
use common::{
    BroadcastBus, UsbHost, WorkerCommand, create_ui_bridge, create_worker_bridge, setup_logging,
};
use manager::classifier::{display_name, is_pin_pad_class, is_video_device};
use manager::config::{self, ManagerConfig};
use manager::service;
use manager::usb::{NativeHost, NativeUsbHost, spawn_hotplug_worker};
use manager::{NameMatcher, PermissionPolicy, PinPadManager};
use protocol::{ACTION_MAIN, Intent};
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio::signal::unix::SignalKind;
use tracing::{error, info, warn};

/// How long `--once` keeps the UI loop running for results to arrive
const ONCE_DRAIN: Duration = Duration::from_millis(500);

#[derive(Parser, Debug)]
#[command(name = "pinpad-usb")]
#[command(
    author,
    version,
    about = "Pin-pad USB manager - request access to pin pads as they are plugged in"
)]
#[command(long_about = "
Detects pin pads and cameras on the USB bus, requests permission for them
through the configured grant policy and logs device and host metadata.

EXAMPLES:
    # Run with default config
    pinpad-usb

    # List USB devices and how they are classified
    pinpad-usb --list-devices --json

    # Verify permissions once and exit
    pinpad-usb --once

    # Run as systemd service
    pinpad-usb --service

CONFIGURATION:
    The manager looks for configuration files in the following order:
    1. Path specified with --config
    2. ~/.config/pinpad-usb/manager.toml
    3. /etc/pinpad-usb/manager.toml
    4. Built-in defaults
")]
struct Args {
    /// Path to configuration file
    #[arg(short, long, value_name = "PATH")]
    config: Option<String>,

    /// Save default configuration to default location and exit
    #[arg(long)]
    save_config: bool,

    /// Run as systemd service
    #[arg(long)]
    service: bool,

    /// List USB devices and exit
    #[arg(long)]
    list_devices: bool,

    /// Print the device list as JSON
    #[arg(long, requires = "list_devices")]
    json: bool,

    /// Run the verification scan, wait briefly for results and exit
    #[arg(long)]
    once: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, value_name = "LEVEL")]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if args.save_config {
        let config = ManagerConfig::default();
        let path = ManagerConfig::default_path();
        config.save(&path).context("Failed to save configuration")?;
        println!("Configuration saved to: {}", path.display());
        return Ok(());
    }

    let config = if let Some(ref path) = args.config {
        config::load_config(path).context("Failed to load configuration")?
    } else {
        ManagerConfig::load_or_default()
    };

    let log_level = args
        .log_level
        .as_deref()
        .unwrap_or(&config.manager.log_level);
    setup_logging(log_level).context("Failed to setup logging")?;

    info!("pinpad-usb v{}", env!("CARGO_PKG_VERSION"));
    info!("Log level: {}", log_level);

    let policy = PermissionPolicy::from_settings(&config.permissions)?;
    let bus = Arc::new(BroadcastBus::new(config.manager.package_name.clone()));
    let usb = Arc::new(
        NativeUsbHost::new(bus, policy, config.device_filters()?)
            .context("Failed to initialize libusb")?,
    );
    let matcher = NameMatcher::new(&config.usb.name_pattern);

    if args.list_devices {
        return list_devices(usb.as_ref(), &matcher, args.json);
    }

    let (ui_handle, ui_loop) = create_ui_bridge();
    let host = Arc::new(NativeHost::new(usb.clone(), ui_handle));
    let manager = PinPadManager::new(matcher);

    manager.register_broadcast(&host);
    manager.verify_permissions(host.as_ref());
    if config.manager.scan_on_start {
        manager.handle_intent(host.as_ref(), &Intent::new(ACTION_MAIN));
    }

    if args.once {
        let ran = ui_loop.run_for(ONCE_DRAIN).await;
        info!("Processed {} UI task(s)", ran);
        manager.unregister_broadcast(host.as_ref());
        return Ok(());
    }

    let (worker_bridge, endpoint) = create_worker_bridge();
    let worker_handle = spawn_hotplug_worker(
        usb.clone(),
        endpoint,
        Duration::from_millis(config.usb.poll_interval_ms),
    );

    let service_mode = args.service || config.manager.service_mode;
    if service_mode {
        info!("Running in service mode");
        service::notify_ready().context("Failed to notify systemd ready")?;
        service::notify_status("Watching USB devices")
            .context("Failed to send status to systemd")?;
    }

    info!("Press Ctrl+C to shutdown, send SIGHUP to rescan");

    let mut hangup =
        signal::unix::signal(SignalKind::hangup()).context("Failed to install SIGHUP handler")?;
    loop {
        tokio::select! {
            _ = ui_loop.run() => {
                warn!("UI loop stopped unexpectedly");
                break;
            }
            _ = hangup.recv() => {
                info!("Received SIGHUP, rescanning USB devices");
                if let Err(e) = worker_bridge.send_command(WorkerCommand::Rescan).await {
                    error!("Failed to request rescan: {}", e);
                }
            }
            result = signal::ctrl_c() => {
                match result {
                    Ok(()) => info!("Received Ctrl+C, shutting down gracefully..."),
                    Err(e) => error!("Error waiting for Ctrl+C: {}", e),
                }
                break;
            }
        }
    }

    if service_mode {
        service::notify_stopping().context("Failed to notify systemd stopping")?;
    }

    manager.unregister_broadcast(host.as_ref());

    info!("Shutting down hot-plug worker...");
    if let Err(e) = worker_bridge.send_command(WorkerCommand::Shutdown).await {
        error!("Error shutting down hot-plug worker: {}", e);
    }
    match worker_handle.join() {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!("Hot-plug worker failed: {}", e),
        Err(e) => error!("Hot-plug worker thread panicked: {:?}", e),
    }

    info!("Shutdown complete");
    Ok(())
}

/// Print the current devices with their classification and exit
fn list_devices(usb: &dyn UsbHost, matcher: &NameMatcher, json: bool) -> Result<()> {
    let devices = usb.device_list();

    if json {
        let out = serde_json::to_string_pretty(&devices).context("Failed to encode devices")?;
        println!("{}", out);
        return Ok(());
    }

    if devices.is_empty() {
        println!("No USB devices found.");
        return Ok(());
    }

    println!("Found {} USB device(s):\n", devices.len());
    for device in &devices {
        println!(
            "  [{}] {:04x}:{:04x} - {}",
            device.device_id,
            device.vendor_id,
            device.product_id,
            display_name(Some(device))
        );
        println!(
            "      Bus {:03} Device {:03} Class {:#04x} Interfaces {}",
            device.bus_number,
            device.address,
            device.device_class,
            device.interface_count()
        );
        println!(
            "      video={} comm={} name_match={}",
            is_video_device(Some(device)),
            is_pin_pad_class(Some(device)),
            matcher.matches(device)
        );
        println!();
    }

    Ok(())
}
