//! Native USB host
//!
//! libusb-backed implementation of the host traits:
//! - Device records built from descriptors
//! - Permission requests answered by the grant policy
//! - Hot-plug detection on a dedicated thread, broadcast as intents
//!
//! The hot-plug worker runs in its own thread so the blocking libusb event
//! loop never stalls the tokio runtime that drives the UI loop. Scans and
//! permission requests still run on that loop: they enumerate devices and
//! open the device node there, which is a short blocking call per device.

pub mod device;
pub mod host;
pub mod platform;
pub mod worker;

pub use host::{NativeHost, NativeUsbHost};
pub use worker::{DeviceChanges, HotplugWorker, diff_devices, spawn_hotplug_worker};
