//! Diagnostic dumps of device records and host metadata

use common::{AppInfo, BuildInfo, HostContext};
use protocol::UsbDevice;
use std::fmt::Write;
use tracing::{error, info};

const UNKNOWN: &str = "unknown";

/// Multi-line attribute dump of a device record
pub fn format_device(device: &UsbDevice) -> String {
    let mut msg = String::new();
    let fields: [(&str, String); 12] = [
        ("device_name", device.device_name.clone()),
        (
            "product_name",
            device.product_name.clone().unwrap_or_else(|| UNKNOWN.to_string()),
        ),
        ("device_id", device.device_id.to_string()),
        ("device_class", device.device_class.to_string()),
        ("device_protocol", device.device_protocol.to_string()),
        ("device_subclass", device.device_subclass.to_string()),
        ("configuration_count", device.configuration_count.to_string()),
        ("interface_count", device.interface_count().to_string()),
        ("vendor_id", format!("{:#06x}", device.vendor_id)),
        ("product_id", format!("{:#06x}", device.product_id)),
        (
            "manufacturer_name",
            device
                .manufacturer_name
                .clone()
                .unwrap_or_else(|| UNKNOWN.to_string()),
        ),
        ("version", device.version.clone()),
    ];
    for (name, value) in fields {
        let _ = writeln!(msg, "    {}={}", name, value);
    }
    msg
}

/// Log the attribute dump of `device`
pub fn log_device(device: &UsbDevice) {
    info!("Device info:\n{}", format_device(device));
}

/// Multi-line dump of application and host build metadata
///
/// SDK levels are only listed when the host has them.
pub fn format_hardware(app: &AppInfo, build: &BuildInfo) -> String {
    let mut msg = format!("package={} version={}", app.package_name, app.version_name);
    if let Some(target_sdk) = app.target_sdk {
        let _ = write!(msg, "\n    target_sdk={}", target_sdk);
    }
    if let Some(min_sdk) = app.min_sdk {
        let _ = write!(msg, "\n    min_sdk={}", min_sdk);
    }
    if let Some(sdk_int) = build.sdk_int {
        let _ = write!(msg, "\n    sdk_int={}", sdk_int);
    }

    let fields = [
        ("board", &build.board),
        ("bootloader", &build.bootloader),
        ("brand", &build.brand),
        ("device", &build.device),
        ("display", &build.display),
        ("hardware", &build.hardware),
        ("id", &build.id),
        ("manufacturer", &build.manufacturer),
        ("product", &build.product),
        ("tags", &build.tags),
        ("model", &build.model),
    ];
    for (name, value) in fields {
        let _ = write!(msg, "\n    {}={}", name, value);
    }
    msg
}

/// Log host metadata; retrieval failures are logged, never returned
pub fn log_hardware(host: &dyn HostContext) {
    let dump = host
        .app_info()
        .and_then(|app| host.build_info().map(|build| format_hardware(&app, &build)));

    match dump {
        Ok(msg) => info!("Host info: {}", msg),
        Err(e) => error!("Failed to collect host info: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::test_utils::{FakeHost, create_mock_build_info, create_mock_pinpad};

    #[test]
    fn test_format_device_fields() {
        let dump = format_device(&create_mock_pinpad(7));

        assert!(dump.contains("    device_name=/dev/bus/usb/001/007\n"));
        assert!(dump.contains("    product_name=PinPad Test\n"));
        assert!(dump.contains("    device_id=1007\n"));
        assert!(dump.contains("    device_class=2\n"));
        assert!(dump.contains("    interface_count=2\n"));
        assert!(dump.contains("    vendor_id=0x0b00\n"));
        assert!(dump.contains("    product_id=0x0080\n"));
        assert!(dump.contains("    version=1.00\n"));
        assert_eq!(dump.lines().count(), 12);
    }

    #[test]
    fn test_format_device_missing_strings() {
        let device = protocol::UsbDevice::new(1, 1, 0x1234, 0x5678);
        let dump = format_device(&device);
        assert!(dump.contains("product_name=unknown"));
        assert!(dump.contains("manufacturer_name=unknown"));
    }

    #[test]
    fn test_format_hardware_with_sdk_levels() {
        let app = AppInfo {
            package_name: "com.example.pinpad".to_string(),
            version_name: "1.0.0".to_string(),
            target_sdk: Some(34),
            min_sdk: Some(24),
        };
        let dump = format_hardware(&app, &create_mock_build_info());

        assert!(dump.starts_with("package=com.example.pinpad version=1.0.0"));
        assert!(dump.contains("\n    target_sdk=34"));
        assert!(dump.contains("\n    min_sdk=24"));
        assert!(dump.contains("\n    sdk_int=34"));
        assert!(dump.contains("\n    board=test-board"));
        assert!(dump.ends_with("\n    model=Test Model"));
    }

    #[test]
    fn test_format_hardware_without_sdk_levels() {
        let app = AppInfo {
            package_name: "pinpad-usb".to_string(),
            version_name: "0.1.0".to_string(),
            target_sdk: None,
            min_sdk: None,
        };
        let build = BuildInfo {
            sdk_int: None,
            ..create_mock_build_info()
        };
        let dump = format_hardware(&app, &build);

        assert!(!dump.contains("sdk"));
        assert!(dump.contains("manufacturer=Test Manufacturer"));
    }

    #[test]
    fn test_log_hardware_swallows_errors() {
        let host = FakeHost::with_devices(vec![]).without_build_info();
        log_hardware(&host);
    }
}
