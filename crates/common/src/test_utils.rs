//! Test utilities for pinpad-usb
//!
//! Provides mock device records and a fake host that records permission
//! requests and queues UI-thread work until the test drains it.
//!
//! # Example
//!
//! ```
//! use common::test_utils::{FakeHost, create_mock_pinpad};
//! use common::HostContext;
//!
//! let host = FakeHost::with_devices(vec![create_mock_pinpad(1)]);
//! assert_eq!(host.usb_host().device_list().len(), 1);
//! assert_eq!(host.usb().request_count(), 0);
//! ```

use crate::broadcast::{BroadcastBus, BroadcastReceiver, ReceiverId};
use crate::channel::UiTask;
use crate::host::{AppInfo, BuildInfo, HostContext, UsbHost};
use protocol::{
    DeviceId, IntentFilter, PendingIntent, UsbDevice, UsbInterface, class,
};
use std::collections::{HashSet, VecDeque};
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Default test timeout (5 seconds)
pub const DEFAULT_TEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Package name used by [`FakeHost`]
pub const TEST_PACKAGE: &str = "com.example.pinpad";

/// Create a mock device record at bus 1
///
/// # Arguments
/// * `address` - Device address, also determines the device id
/// * `vendor_id` - USB Vendor ID
/// * `product_id` - USB Product ID
///
/// # Example
/// ```
/// use common::test_utils::create_mock_device;
///
/// let device = create_mock_device(4, 0x1234, 0x5678);
/// assert_eq!(device.device_id.0, 1004);
/// assert!(device.product_name.is_none());
/// ```
pub fn create_mock_device(address: u8, vendor_id: u16, product_id: u16) -> UsbDevice {
    let mut device = UsbDevice::new(1, address, vendor_id, product_id);
    device.version = "1.00".to_string();
    device
}

/// Create a mock device with a product name
pub fn create_mock_named_device(address: u8, product_name: &str) -> UsbDevice {
    create_mock_device(address, 0x1000 + u16::from(address), 0x2000)
        .with_product_name(product_name)
        .with_manufacturer_name(format!("Test Manufacturer {}", address))
}

/// Create a mock pin pad (CDC ACM, product string "PinPad Test")
pub fn create_mock_pinpad(address: u8) -> UsbDevice {
    create_mock_device(address, 0x0b00, 0x0080)
        .with_product_name("PinPad Test")
        .with_manufacturer_name("Test Payments")
        .with_class(class::USB_CLASS_COMM, 0, 0)
        .with_interface(UsbInterface::new(0, class::USB_CLASS_COMM))
        .with_interface(UsbInterface::new(1, class::USB_CLASS_CDC_DATA))
}

/// Create a mock UVC camera (class per interface, video interfaces)
pub fn create_mock_camera(address: u8) -> UsbDevice {
    create_mock_device(address, 0x046d, 0x0825)
        .with_product_name("Test Webcam")
        .with_class(class::USB_CLASS_MISC, 0x02, 0x01)
        .with_interface(UsbInterface::new(0, class::USB_CLASS_VIDEO))
        .with_interface(UsbInterface::new(1, class::USB_CLASS_VIDEO))
        .with_interface(UsbInterface::new(2, class::USB_CLASS_AUDIO))
}

/// Create a mock HID keyboard
pub fn create_mock_hid_device(address: u8) -> UsbDevice {
    create_mock_device(address, 0x046d, 0xc31c)
        .with_product_name("Test Keyboard")
        .with_interface(UsbInterface::new(0, class::USB_CLASS_HID))
}

/// Fake host USB subsystem
///
/// Holds the device list and the permitted set, and records every
/// permission request in order.
#[derive(Default)]
pub struct FakeUsbHost {
    devices: Mutex<Vec<UsbDevice>>,
    permitted: Mutex<HashSet<DeviceId>>,
    requests: Mutex<Vec<(UsbDevice, PendingIntent)>>,
}

impl FakeUsbHost {
    pub fn new(devices: Vec<UsbDevice>) -> Self {
        Self {
            devices: Mutex::new(devices),
            ..Default::default()
        }
    }

    pub fn set_devices(&self, devices: Vec<UsbDevice>) {
        *self.devices.lock().unwrap() = devices;
    }

    /// Mark `id` as already permitted
    pub fn grant(&self, id: DeviceId) {
        self.permitted.lock().unwrap().insert(id);
    }

    pub fn requests(&self) -> Vec<(UsbDevice, PendingIntent)> {
        self.requests.lock().unwrap().clone()
    }

    pub fn requested_devices(&self) -> Vec<DeviceId> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|(device, _)| device.device_id)
            .collect()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

impl UsbHost for FakeUsbHost {
    fn device_list(&self) -> Vec<UsbDevice> {
        self.devices.lock().unwrap().clone()
    }

    fn has_permission(&self, device: &UsbDevice) -> bool {
        self.permitted.lock().unwrap().contains(&device.device_id)
    }

    fn request_permission(&self, device: &UsbDevice, pending: PendingIntent) {
        self.requests.lock().unwrap().push((device.clone(), pending));
    }
}

/// Fake embedding context
///
/// UI-thread tasks are queued until [`FakeHost::drain_ui`] runs them, which
/// lets tests observe that work was marshaled rather than run inline.
pub struct FakeHost {
    usb: Arc<FakeUsbHost>,
    bus: BroadcastBus,
    ui_queue: Mutex<VecDeque<UiTask>>,
    ui_context: bool,
    sdk_int: Option<u32>,
    build_info: Option<BuildInfo>,
}

impl FakeHost {
    pub fn new(usb: Arc<FakeUsbHost>) -> Self {
        Self {
            usb,
            bus: BroadcastBus::new(TEST_PACKAGE),
            ui_queue: Mutex::new(VecDeque::new()),
            ui_context: true,
            sdk_int: Some(34),
            build_info: Some(create_mock_build_info()),
        }
    }

    pub fn with_devices(devices: Vec<UsbDevice>) -> Self {
        Self::new(Arc::new(FakeUsbHost::new(devices)))
    }

    /// Behave like a non-activity context that cannot prompt
    pub fn without_ui_context(mut self) -> Self {
        self.ui_context = false;
        self
    }

    pub fn with_sdk_int(mut self, sdk_int: Option<u32>) -> Self {
        self.sdk_int = sdk_int;
        self
    }

    /// Make `build_info` fail
    pub fn without_build_info(mut self) -> Self {
        self.build_info = None;
        self
    }

    pub fn usb(&self) -> &FakeUsbHost {
        &self.usb
    }

    pub fn bus(&self) -> &BroadcastBus {
        &self.bus
    }

    pub fn pending_ui_tasks(&self) -> usize {
        self.ui_queue.lock().unwrap().len()
    }

    /// Run queued UI tasks, including ones queued while draining
    pub fn drain_ui(&self) -> usize {
        let mut ran = 0;
        loop {
            let task = self.ui_queue.lock().unwrap().pop_front();
            match task {
                Some(task) => {
                    task();
                    ran += 1;
                }
                None => return ran,
            }
        }
    }
}

impl HostContext for FakeHost {
    fn package_name(&self) -> &str {
        self.bus.package()
    }

    fn usb_host(&self) -> Arc<dyn UsbHost> {
        self.usb.clone()
    }

    fn is_ui_context(&self) -> bool {
        self.ui_context
    }

    fn run_on_ui_thread(&self, task: UiTask) {
        self.ui_queue.lock().unwrap().push_back(task);
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

    fn sdk_int(&self) -> Option<u32> {
        self.sdk_int
    }

    fn app_info(&self) -> crate::Result<AppInfo> {
        Ok(AppInfo {
            package_name: TEST_PACKAGE.to_string(),
            version_name: "1.0.0".to_string(),
            target_sdk: Some(34),
            min_sdk: Some(24),
        })
    }

    fn build_info(&self) -> crate::Result<BuildInfo> {
        self.build_info
            .clone()
            .ok_or_else(|| crate::Error::Host("build metadata unavailable".to_string()))
    }
}

/// Build metadata reported by [`FakeHost`]
pub fn create_mock_build_info() -> BuildInfo {
    BuildInfo {
        sdk_int: Some(34),
        board: "test-board".to_string(),
        bootloader: "test-boot-1.0".to_string(),
        brand: "TestBrand".to_string(),
        device: "testdevice".to_string(),
        display: "TEST.240101.001".to_string(),
        hardware: "testhw".to_string(),
        id: "TEST.240101".to_string(),
        manufacturer: "Test Manufacturer".to_string(),
        product: "testproduct".to_string(),
        tags: "release-keys".to_string(),
        model: "Test Model".to_string(),
    }
}

/// Timeout wrapper for async tests
///
/// Wraps an async operation with a timeout to prevent tests from hanging.
pub async fn with_timeout<T, F>(duration: Duration, future: F) -> Result<T, TimeoutError>
where
    F: Future<Output = T>,
{
    tokio::time::timeout(duration, future)
        .await
        .map_err(|_| TimeoutError { duration })
}

/// Error returned when a test times out
#[derive(Debug)]
pub struct TimeoutError {
    /// The timeout duration that was exceeded
    pub duration: Duration,
}

impl std::fmt::Display for TimeoutError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Test timed out after {:?}", self.duration)
    }
}

impl std::error::Error for TimeoutError {}
