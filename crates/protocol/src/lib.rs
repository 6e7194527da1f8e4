//! Protocol library for pinpad-usb
//!
//! This crate defines the host-neutral values exchanged between a host's USB
//! subsystem and the pin-pad manager: device records, class codes, device
//! filters, and the intent/broadcast vocabulary used to deliver attach,
//! detach and permission-result events.
//!
//! Action and extra strings use the Android values, so a bridge running on an
//! Android host can forward intents unchanged.
//!
//! # Example
//!
//! ```
//! use protocol::{Intent, IntentFilter, UsbDevice, ACTION_USB_DEVICE_ATTACHED};
//!
//! let device = UsbDevice::new(1, 4, 0x1234, 0x5678);
//! let intent = Intent::new(ACTION_USB_DEVICE_ATTACHED).with_device(device);
//!
//! let filter = IntentFilter::new(ACTION_USB_DEVICE_ATTACHED);
//! assert!(filter.matches(&intent));
//! assert_eq!(intent.device().unwrap().device_name, "/dev/bus/usb/001/004");
//! ```

pub mod error;
pub mod messages;
pub mod types;

pub use error::{ProtocolError, Result};
pub use messages::{
    ACTION_MAIN, ACTION_USB_DEVICE_ATTACHED, ACTION_USB_DEVICE_DETACHED, ACTION_USB_PERMISSION,
    EXTRA_DEVICE, EXTRA_PERMISSION_GRANTED, FLAG_IMMUTABLE, FLAG_MUTABLE, Intent, IntentFilter, PendingIntent,
    REQ_PERMISSION_USB,
};
pub use types::{DeviceFilter, DeviceId, UsbDevice, UsbInterface, class};
