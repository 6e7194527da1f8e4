//! Device list scans
//!
//! Two variants walk the host's current device list: the verification scan
//! matches by name and requests every match, the launch scan matches video
//! class devices and stops at the first one lacking permission.

use crate::classifier::{NameMatcher, display_name, is_video_device};
use crate::diagnostics::log_device;
use crate::permission::request_usb_permission;
use common::HostContext;
use protocol::UsbDevice;
use tracing::{info, trace};

/// Request permission for every device whose display name matches
///
/// Permission is requested whether or not the device already has it.
/// Returns the number of requests posted.
pub fn scan_by_name(host: &dyn HostContext, matcher: &NameMatcher) -> usize {
    let mut requested = 0;
    for device in host.usb_host().device_list() {
        trace!("Scanned device: {}", display_name(Some(&device)));
        if matcher.matches(&device) {
            log_device(&device);
            request_usb_permission(host, &device);
            requested += 1;
        }
    }
    requested
}

/// Request permission for the first video device that lacks it
///
/// Only one device is handled per scan. Returns the device a request was
/// posted for.
pub fn scan_attached_device(host: &dyn HostContext) -> Option<UsbDevice> {
    let usb = host.usb_host();
    let mut requested = None;

    for device in usb.device_list() {
        if !is_video_device(Some(&device)) {
            continue;
        }
        if !usb.has_permission(&device) {
            request_usb_permission(host, &device);
            requested = Some(device);
            break;
        }
        info!(
            "USB permission: already has permission: {}",
            display_name(Some(&device))
        );
    }

    info!("Scan finished");
    requested
}
