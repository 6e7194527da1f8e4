//! Intent and broadcast message definitions
//!
//! An [`Intent`] is the unit a host delivers to registered receivers: an
//! action string, an optional package scope, an optional device extra and a
//! set of boolean extras. [`PendingIntent`] is the template a host fills in
//! and broadcasts once a permission request has been answered.

use crate::types::UsbDevice;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Custom action carrying the result of a permission request
pub const ACTION_USB_PERMISSION: &str = "ACTION_USB_PERMISSION";

/// A USB device was attached to the host
pub const ACTION_USB_DEVICE_ATTACHED: &str = "android.hardware.usb.action.USB_DEVICE_ATTACHED";

/// A USB device was detached from the host
pub const ACTION_USB_DEVICE_DETACHED: &str = "android.hardware.usb.action.USB_DEVICE_DETACHED";

/// Application start
pub const ACTION_MAIN: &str = "android.intent.action.MAIN";

/// Name of the device extra
pub const EXTRA_DEVICE: &str = "device";

/// Name of the boolean permission-granted extra
pub const EXTRA_PERMISSION_GRANTED: &str = "permission";

/// Request code used for permission pending intents
pub const REQ_PERMISSION_USB: i32 = 16;

/// The host may fill extras into the pending intent before sending it
pub const FLAG_MUTABLE: u32 = 1 << 25;

/// The host must send the pending intent unchanged
pub const FLAG_IMMUTABLE: u32 = 1 << 26;

/// Broadcast intent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Intent {
    action: String,
    /// Only receivers of this package get the intent, when set
    package: Option<String>,
    device: Option<UsbDevice>,
    boolean_extras: BTreeMap<String, bool>,
}

impl Intent {
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            package: None,
            device: None,
            boolean_extras: BTreeMap::new(),
        }
    }

    pub fn action(&self) -> &str {
        &self.action
    }

    pub fn package(&self) -> Option<&str> {
        self.package.as_deref()
    }

    /// Scope the intent to a single package
    pub fn set_package(mut self, package: impl Into<String>) -> Self {
        self.package = Some(package.into());
        self
    }

    /// The [`EXTRA_DEVICE`] extra, if present
    pub fn device(&self) -> Option<&UsbDevice> {
        self.device.as_ref()
    }

    pub fn with_device(mut self, device: UsbDevice) -> Self {
        self.device = Some(device);
        self
    }

    pub fn with_boolean_extra(mut self, name: impl Into<String>, value: bool) -> Self {
        self.boolean_extras.insert(name.into(), value);
        self
    }

    /// Boolean extra `name`, or `default` when it was never set
    pub fn boolean_extra(&self, name: &str, default: bool) -> bool {
        self.boolean_extras.get(name).copied().unwrap_or(default)
    }

    /// Shorthand for the [`EXTRA_PERMISSION_GRANTED`] extra (default `false`)
    pub fn permission_granted(&self) -> bool {
        self.boolean_extra(EXTRA_PERMISSION_GRANTED, false)
    }
}

/// Set of actions a receiver is registered for
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntentFilter {
    actions: Vec<String>,
}

impl IntentFilter {
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            actions: vec![action.into()],
        }
    }

    pub fn add_action(&mut self, action: impl Into<String>) {
        let action = action.into();
        if !self.actions.contains(&action) {
            self.actions.push(action);
        }
    }

    pub fn actions(&self) -> &[String] {
        &self.actions
    }

    pub fn matches(&self, intent: &Intent) -> bool {
        self.actions.iter().any(|a| a == intent.action())
    }
}

/// Intent template handed to the host along with a permission request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingIntent {
    pub request_code: i32,
    pub intent: Intent,
    pub flags: u32,
}

impl PendingIntent {
    /// Pending intent that will be delivered as a broadcast
    pub fn get_broadcast(request_code: i32, intent: Intent, flags: u32) -> Self {
        Self {
            request_code,
            intent,
            flags,
        }
    }

    /// Pending intents are mutable unless `FLAG_IMMUTABLE` is set
    ///
    /// Levels before 31 pass no flag at all and still get extras filled in.
    pub fn is_mutable(&self) -> bool {
        self.flags & FLAG_IMMUTABLE == 0
    }

    /// Intent the host broadcasts once the request has been answered
    ///
    /// Immutable pending intents are sent as-is, without extras.
    pub fn fill_result(&self, device: &UsbDevice, granted: bool) -> Intent {
        if !self.is_mutable() {
            return self.intent.clone();
        }
        self.intent
            .clone()
            .with_device(device.clone())
            .with_boolean_extra(EXTRA_PERMISSION_GRANTED, granted)
    }
}
