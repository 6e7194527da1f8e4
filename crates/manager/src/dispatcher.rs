//! Broadcast dispatch and the manager lifecycle object
//!
//! [`PinPadManager`] is what an embedding application holds on to. It
//! registers a receiver for attach, detach and permission-result broadcasts,
//! and exposes the verification scan. Every handler logs and returns; none
//! of them has an error path.

use crate::classifier::{NameMatcher, display_name};
use crate::diagnostics::log_hardware;
use crate::permission::request_usb_permission;
use crate::scan::{scan_attached_device, scan_by_name};
use common::{BroadcastReceiver, HostContext, ReceiverId};
use protocol::{
    ACTION_MAIN, ACTION_USB_DEVICE_ATTACHED, ACTION_USB_DEVICE_DETACHED, ACTION_USB_PERMISSION,
    Intent, IntentFilter,
};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use tracing::{debug, error, info, warn};

/// Pin-pad USB manager
///
/// Owns the broadcast registration for one host. Dropping the manager does
/// not unregister; call [`PinPadManager::unregister_broadcast`] when the
/// host is torn down.
pub struct PinPadManager {
    matcher: NameMatcher,
    registration: Mutex<Option<ReceiverId>>,
}

impl PinPadManager {
    pub fn new(matcher: NameMatcher) -> Self {
        Self {
            matcher,
            registration: Mutex::new(None),
        }
    }

    /// Actions the receiver is registered for
    pub fn receiver_filter() -> IntentFilter {
        let mut filter = IntentFilter::new(ACTION_USB_PERMISSION);
        filter.add_action(ACTION_USB_DEVICE_ATTACHED);
        filter.add_action(ACTION_USB_DEVICE_DETACHED);
        filter
    }

    pub fn is_registered(&self) -> bool {
        self.registration().is_some()
    }

    /// Start receiving attach, detach and permission-result broadcasts
    ///
    /// The receiver only holds a weak reference to `host`. Calling this
    /// again while registered does nothing.
    pub fn register_broadcast<H: HostContext + 'static>(&self, host: &Arc<H>) {
        let mut registration = self.registration();
        if let Some(id) = *registration {
            debug!("Receiver {:?} already registered", id);
            return;
        }

        let weak: Weak<dyn HostContext> = Arc::downgrade(host) as Weak<dyn HostContext>;
        let receiver = Arc::new(PinPadReceiver { host: weak });
        let id = host.register_receiver(Self::receiver_filter(), receiver);
        info!("Registered USB broadcast receiver {:?}", id);
        *registration = Some(id);
    }

    /// Stop receiving broadcasts
    pub fn unregister_broadcast(&self, host: &dyn HostContext) {
        match self.registration().take() {
            Some(id) => {
                if !host.unregister_receiver(id) {
                    warn!("Receiver {:?} was not known to the host", id);
                }
                info!("Unregistered USB broadcast receiver {:?}", id);
            }
            None => warn!("Unregister requested but no receiver is registered"),
        }
    }

    /// Request permission for every name match and log host metadata
    pub fn verify_permissions(&self, host: &dyn HostContext) {
        let requested = scan_by_name(host, &self.matcher);
        debug!("Verification scan posted {} request(s)", requested);
        log_hardware(host);
    }

    /// Dispatch one intent, e.g. the launch intent delivered by the host
    pub fn handle_intent(&self, host: &dyn HostContext, intent: &Intent) {
        handle_intent(host, intent);
    }

    fn registration(&self) -> MutexGuard<'_, Option<ReceiverId>> {
        self.registration
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for PinPadManager {
    fn default() -> Self {
        Self::new(NameMatcher::default())
    }
}

struct PinPadReceiver {
    host: Weak<dyn HostContext>,
}

impl BroadcastReceiver for PinPadReceiver {
    fn on_receive(&self, intent: &Intent) {
        match self.host.upgrade() {
            Some(host) => handle_intent(host.as_ref(), intent),
            None => debug!("Host is gone, dropping {}", intent.action()),
        }
    }
}

/// Dispatch by action string
pub fn handle_intent(host: &dyn HostContext, intent: &Intent) {
    match intent.action() {
        ACTION_USB_DEVICE_ATTACHED => on_device_attached(host, intent),
        ACTION_USB_DEVICE_DETACHED => on_device_detached(intent),
        ACTION_USB_PERMISSION => on_permission_result(intent),
        ACTION_MAIN => {
            if host.is_ui_context() {
                scan_attached_device(host);
            } else {
                debug!("Launch intent outside a UI context, skipping scan");
            }
        }
        action => error!("Unknown intent action={}", action),
    }
}

fn on_permission_result(intent: &Intent) {
    info!(
        "Permission result: has_permission={} {}",
        intent.permission_granted(),
        display_name(intent.device())
    );
}

fn on_device_detached(intent: &Intent) {
    info!("USB device detached: {}", display_name(intent.device()));
}

fn on_device_attached(host: &dyn HostContext, intent: &Intent) {
    let Some(device) = intent.device() else {
        warn!("USB device attached: {}", display_name(None));
        return;
    };

    let usb = host.usb_host();
    let has_permission = intent.permission_granted() || usb.has_permission(device);
    info!(
        "USB device attached: has_permission={} {}",
        has_permission,
        display_name(Some(device))
    );

    if has_permission {
        info!(
            "USB permission: already has permission: {}",
            display_name(Some(device))
        );
    } else if host.is_ui_context() {
        request_usb_permission(host, device);
    } else {
        debug!("Not a UI context, cannot prompt for {}", display_name(Some(device)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::test_utils::{FakeHost, create_mock_camera, create_mock_pinpad};
    use protocol::EXTRA_PERMISSION_GRANTED;

    #[test]
    fn test_receiver_filter_actions() {
        let filter = PinPadManager::receiver_filter();
        assert_eq!(filter.actions().len(), 3);
        assert!(filter.matches(&Intent::new(ACTION_USB_PERMISSION)));
        assert!(!filter.matches(&Intent::new(ACTION_MAIN)));
    }

    #[test]
    fn test_attach_permission_extra_counts_as_permitted() {
        let pinpad = create_mock_pinpad(1);
        let host = FakeHost::with_devices(vec![pinpad.clone()]);
        let intent = Intent::new(ACTION_USB_DEVICE_ATTACHED)
            .with_device(pinpad)
            .with_boolean_extra(EXTRA_PERMISSION_GRANTED, true);

        handle_intent(&host, &intent);
        assert_eq!(host.pending_ui_tasks(), 0);
    }

    #[test]
    fn test_main_action_runs_launch_scan() {
        let camera = create_mock_camera(1);
        let host = FakeHost::with_devices(vec![camera.clone()]);

        handle_intent(&host, &Intent::new(ACTION_MAIN));
        host.drain_ui();
        assert_eq!(host.usb().requested_devices(), vec![camera.device_id]);
    }

    #[test]
    fn test_main_action_outside_ui_context() {
        let host = FakeHost::with_devices(vec![create_mock_camera(1)]).without_ui_context();

        handle_intent(&host, &Intent::new(ACTION_MAIN));
        assert_eq!(host.pending_ui_tasks(), 0);
    }

    #[test]
    fn test_receiver_drops_intents_after_host_is_gone() {
        let host = Arc::new(FakeHost::with_devices(vec![]));
        let weak: Weak<dyn HostContext> = Arc::downgrade(&host) as Weak<dyn HostContext>;
        let receiver = PinPadReceiver { host: weak };
        drop(host);

        receiver.on_receive(&Intent::new(ACTION_USB_DEVICE_ATTACHED));
    }
}
