//! Host abstractions
//!
//! A host is whatever embeds the pin-pad manager: an Android activity behind
//! a bridge, the native rusb-backed daemon, or a fake in tests. The manager
//! only ever talks to the host through these traits.

use crate::broadcast::{BroadcastReceiver, ReceiverId};
use crate::channel::UiTask;
use protocol::{IntentFilter, PendingIntent, UsbDevice};
use std::sync::Arc;

/// Host USB subsystem
///
/// Permission state lives here. Callers query and request it but never
/// keep a copy.
pub trait UsbHost: Send + Sync {
    /// Devices currently attached, in host enumeration order
    fn device_list(&self) -> Vec<UsbDevice>;

    fn has_permission(&self, device: &UsbDevice) -> bool;

    /// Ask for access to `device`
    ///
    /// The answer arrives later as a broadcast of `pending`, filled with the
    /// device and the permission-granted extra. Must be called on the UI
    /// thread.
    fn request_permission(&self, device: &UsbDevice, pending: PendingIntent);
}

/// Embedding context handed to the manager entry points
pub trait HostContext: Send + Sync {
    /// Package that pending intents are scoped to
    fn package_name(&self) -> &str;

    fn usb_host(&self) -> Arc<dyn UsbHost>;

    /// Whether this context can show permission prompts
    fn is_ui_context(&self) -> bool;

    fn run_on_ui_thread(&self, task: UiTask);

    fn register_receiver(
        &self,
        filter: IntentFilter,
        receiver: Arc<dyn BroadcastReceiver>,
    ) -> ReceiverId;

    /// Returns false when `id` is not registered
    fn unregister_receiver(&self, id: ReceiverId) -> bool;

    /// Platform API level, `None` on hosts without one
    fn sdk_int(&self) -> Option<u32> {
        None
    }

    fn app_info(&self) -> crate::Result<AppInfo>;

    fn build_info(&self) -> crate::Result<BuildInfo>;
}

/// Metadata of the embedding application
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppInfo {
    pub package_name: String,
    pub version_name: String,
    pub target_sdk: Option<u32>,
    pub min_sdk: Option<u32>,
}

/// Host hardware and OS build metadata
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildInfo {
    pub sdk_int: Option<u32>,
    pub board: String,
    pub bootloader: String,
    pub brand: String,
    pub device: String,
    pub display: String,
    pub hardware: String,
    pub id: String,
    pub manufacturer: String,
    pub product: String,
    pub tags: String,
    pub model: String,
}
