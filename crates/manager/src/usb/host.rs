//! Native host backed by libusb
//!
//! [`NativeUsbHost`] answers permission requests itself with a
//! [`PermissionPolicy`] and keeps granted devices in a session grant set.
//! [`NativeHost`] is the embedding context: package name, broadcast bus and
//! the UI loop running on the tokio main task.

use crate::classifier::display_name;
use crate::policy::{PermissionDecision, PermissionDenialReason, PermissionPolicy};
use crate::usb::device::{device_record, is_reportable};
use crate::usb::platform;
use common::{
    AppInfo, BroadcastBus, BroadcastReceiver, BuildInfo, HostContext, ReceiverId, UiHandle,
    UiTask, UsbHost,
};
use protocol::{DeviceFilter, DeviceId, IntentFilter, PendingIntent, UsbDevice};
use rusb::{Context, UsbContext};
use std::collections::HashSet;
use std::fs::OpenOptions;
use std::sync::{Arc, Mutex};
use tracing::{debug, error, info, warn};

pub struct NativeUsbHost {
    context: Context,
    bus: Arc<BroadcastBus>,
    policy: PermissionPolicy,
    filters: Vec<DeviceFilter>,
    grants: SessionGrants,
}

impl NativeUsbHost {
    pub fn new(
        bus: Arc<BroadcastBus>,
        policy: PermissionPolicy,
        filters: Vec<DeviceFilter>,
    ) -> common::Result<Self> {
        let context = Context::new()
            .map_err(|e| common::Error::Usb(format!("Failed to create libusb context: {}", e)))?;
        Ok(Self {
            context,
            bus,
            policy,
            filters,
            grants: SessionGrants::default(),
        })
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    pub fn bus(&self) -> &Arc<BroadcastBus> {
        &self.bus
    }

    pub fn filters(&self) -> &[DeviceFilter] {
        &self.filters
    }

    /// Drop the session grant of a device that went away
    ///
    /// Device ids are reused once the address is handed out again.
    pub fn forget(&self, id: DeviceId) {
        if self.grants.revoke(id) {
            debug!("Dropped session grant for device {}", id);
        }
    }

    fn decide(&self, device: &UsbDevice) -> PermissionDecision {
        let node_access = self.policy.requires_node_access() && node_accessible(device);
        self.policy.decide(device, node_access)
    }
}

/// Devices granted during this process lifetime, never persisted
#[derive(Default)]
pub struct SessionGrants {
    granted: Mutex<HashSet<DeviceId>>,
}

impl SessionGrants {
    pub fn grant(&self, id: DeviceId) {
        self.lock().insert(id);
    }

    pub fn contains(&self, id: DeviceId) -> bool {
        self.lock().contains(&id)
    }

    /// Returns whether `id` held a grant
    pub fn revoke(&self, id: DeviceId) -> bool {
        self.lock().remove(&id)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashSet<DeviceId>> {
        self.granted
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Whether the device node opens read-write for this process
pub fn node_accessible(device: &UsbDevice) -> bool {
    OpenOptions::new()
        .read(true)
        .write(true)
        .open(&device.device_name)
        .is_ok()
}

impl UsbHost for NativeUsbHost {
    fn device_list(&self) -> Vec<UsbDevice> {
        let devices = match self.context.devices() {
            Ok(devices) => devices,
            Err(e) => {
                error!("Failed to enumerate USB devices: {}", e);
                return Vec::new();
            }
        };

        devices
            .iter()
            .filter(|device| is_reportable(device, &self.filters))
            .filter_map(|device| match device_record(&device) {
                Ok(record) => Some(record),
                Err(e) => {
                    warn!(
                        "Failed to read device bus={}, addr={}: {}",
                        device.bus_number(),
                        device.address(),
                        e
                    );
                    None
                }
            })
            .collect()
    }

    fn has_permission(&self, device: &UsbDevice) -> bool {
        self.grants.contains(device.device_id)
    }

    fn request_permission(&self, device: &UsbDevice, pending: PendingIntent) {
        let granted = match self.decide(device) {
            PermissionDecision::Allow => {
                self.grants.grant(device.device_id);
                info!("Granted USB permission: {}", display_name(Some(device)));
                true
            }
            PermissionDecision::Deny(reason) => {
                info!(
                    "Denied USB permission: {} ({})",
                    display_name(Some(device)),
                    reason
                );
                if reason == PermissionDenialReason::NodeNotAccessible {
                    warn!(
                        "Cannot open {}; add a udev rule for {:04x}:{:04x} granting this user access",
                        device.device_name, device.vendor_id, device.product_id
                    );
                }
                false
            }
        };

        let result = pending.fill_result(device, granted);
        let delivered = self.bus.send_broadcast(&result);
        debug!("Permission result delivered to {} receiver(s)", delivered);
    }
}

/// Embedding context of the `pinpad-usb` daemon
pub struct NativeHost {
    usb: Arc<NativeUsbHost>,
    bus: Arc<BroadcastBus>,
    ui: UiHandle,
}

impl NativeHost {
    /// `usb` and the host share the same broadcast bus
    pub fn new(usb: Arc<NativeUsbHost>, ui: UiHandle) -> Self {
        let bus = usb.bus().clone();
        Self { usb, bus, ui }
    }
}

impl HostContext for NativeHost {
    fn package_name(&self) -> &str {
        self.bus.package()
    }

    fn usb_host(&self) -> Arc<dyn UsbHost> {
        self.usb.clone()
    }

    // Prompts are answered by the grant policy
    fn is_ui_context(&self) -> bool {
        true
    }

    fn run_on_ui_thread(&self, task: UiTask) {
        if let Err(e) = self.ui.post(task) {
            error!("Failed to post task to the UI loop: {}", e);
        }
    }

    fn register_receiver(
        &self,
        filter: IntentFilter,
        receiver: Arc<dyn BroadcastReceiver>,
    ) -> ReceiverId {
        self.bus.register(filter, receiver)
    }

    fn unregister_receiver(&self, id: ReceiverId) -> bool {
        self.bus.unregister(id)
    }

    fn app_info(&self) -> common::Result<AppInfo> {
        Ok(AppInfo {
            package_name: self.bus.package().to_string(),
            version_name: env!("CARGO_PKG_VERSION").to_string(),
            target_sdk: None,
            min_sdk: None,
        })
    }

    fn build_info(&self) -> common::Result<BuildInfo> {
        platform::build_info()
    }
}
