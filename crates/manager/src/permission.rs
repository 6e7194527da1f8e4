//! Permission requests
//!
//! The host shows its permission prompt from the UI thread only, so the
//! request is always posted there. The answer comes back as an
//! `ACTION_USB_PERMISSION` broadcast.

use crate::classifier::display_name;
use common::HostContext;
use protocol::{
    ACTION_USB_PERMISSION, FLAG_MUTABLE, Intent, PendingIntent, REQ_PERMISSION_USB, UsbDevice,
};
use tracing::debug;

/// First API level that requires an explicit mutability flag
const SDK_MUTABLE_FLAG_REQUIRED: u32 = 31;

/// Flags for the permission pending intent
///
/// The host fills the result extras in, so the intent must be mutable.
/// Hosts without an API level are treated like current ones.
pub fn pending_intent_flags(sdk_int: Option<u32>) -> u32 {
    match sdk_int {
        Some(level) if level < SDK_MUTABLE_FLAG_REQUIRED => 0,
        _ => FLAG_MUTABLE,
    }
}

/// Pending broadcast intent scoped to the host package
pub fn permission_intent(host: &dyn HostContext) -> PendingIntent {
    PendingIntent::get_broadcast(
        REQ_PERMISSION_USB,
        Intent::new(ACTION_USB_PERMISSION).set_package(host.package_name()),
        pending_intent_flags(host.sdk_int()),
    )
}

/// Ask the host to prompt for access to `device`, on the UI thread
pub fn request_usb_permission(host: &dyn HostContext, device: &UsbDevice) {
    let usb = host.usb_host();
    let pending = permission_intent(host);
    let device = device.clone();

    debug!("Posting permission request for {}", display_name(Some(&device)));
    host.run_on_ui_thread(Box::new(move || {
        usb.request_permission(&device, pending);
    }));
}
