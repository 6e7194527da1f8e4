//! Integration tests for protocol values
//!
//! Tests device records, device filters and the intent vocabulary defined in
//! crates/protocol/src, as seen by a host implementation.

use protocol::{
    ACTION_MAIN, ACTION_USB_DEVICE_ATTACHED, ACTION_USB_DEVICE_DETACHED, ACTION_USB_PERMISSION,
    DeviceFilter, DeviceId, FLAG_MUTABLE, Intent, IntentFilter, PendingIntent, REQ_PERMISSION_USB,
    UsbDevice, UsbInterface, class,
};

fn make_test_device(address: u8) -> UsbDevice {
    UsbDevice::new(1, address, 0x0b00, 0x0080)
        .with_product_name("Test PinPad")
        .with_manufacturer_name("Test Manufacturer")
        .with_class(class::USB_CLASS_PER_INTERFACE, 0, 0)
        .with_interface(UsbInterface::new(0, class::USB_CLASS_COMM))
        .with_interface(UsbInterface::new(1, class::USB_CLASS_CDC_DATA))
}

mod device_record {
    use super::*;

    #[test]
    fn test_record_location() {
        let device = make_test_device(9);
        assert_eq!(device.bus_number, 1);
        assert_eq!(device.address, 9);
        assert_eq!(device.device_id, DeviceId(1009));
        assert_eq!(device.device_name, "/dev/bus/usb/001/009");
    }

    #[test]
    fn test_interfaces_in_order() {
        let device = make_test_device(2);
        assert_eq!(device.interface_count(), 2);
        assert_eq!(
            device.interface(0).map(|i| i.interface_class),
            Some(class::USB_CLASS_COMM)
        );
        assert_eq!(
            device.interface(1).map(|i| i.interface_class),
            Some(class::USB_CLASS_CDC_DATA)
        );
        assert!(device.interface(2).is_none());
    }

    #[test]
    fn test_json_field_names() {
        let device = make_test_device(3);
        let json = serde_json::to_value(&device).unwrap();

        assert_eq!(json["device_name"], "/dev/bus/usb/001/003");
        assert_eq!(json["vendor_id"], 0x0b00);
        assert_eq!(json["product_name"], "Test PinPad");
        assert_eq!(json["interfaces"][0]["interface_class"], 2);
        assert!(json["serial_number"].is_null());
    }
}

mod device_filter {
    use super::*;

    #[test]
    fn test_vendor_wildcard_matches_device() {
        let filter: DeviceFilter = "0x0b00:*".parse().unwrap();
        assert!(filter.matches_device(&make_test_device(1)));

        let other = UsbDevice::new(1, 1, 0x046d, 0x0080);
        assert!(!filter.matches_device(&other));
    }

    #[test]
    fn test_parse_all_reports_first_error() {
        let err = DeviceFilter::parse_all(&["0x0b00:*", "bogus", "0x1:0x2"]).unwrap_err();
        assert!(err.to_string().contains("bogus"));
    }

    #[test]
    fn test_display_parses_back() {
        let filter: DeviceFilter = "0x1234:0x00ff".parse().unwrap();
        let reparsed: DeviceFilter = filter.to_string().parse().unwrap();
        assert_eq!(filter, reparsed);
    }
}

mod intents {
    use super::*;

    fn receiver_filter() -> IntentFilter {
        let mut filter = IntentFilter::new(ACTION_USB_PERMISSION);
        filter.add_action(ACTION_USB_DEVICE_ATTACHED);
        filter.add_action(ACTION_USB_DEVICE_DETACHED);
        filter
    }

    #[test]
    fn test_receiver_filter_excludes_main() {
        let filter = receiver_filter();
        assert!(filter.matches(&Intent::new(ACTION_USB_PERMISSION)));
        assert!(filter.matches(&Intent::new(ACTION_USB_DEVICE_ATTACHED)));
        assert!(filter.matches(&Intent::new(ACTION_USB_DEVICE_DETACHED)));
        assert!(!filter.matches(&Intent::new(ACTION_MAIN)));
    }

    #[test]
    fn test_attach_intent_without_device() {
        let intent = Intent::new(ACTION_USB_DEVICE_ATTACHED);
        assert!(intent.device().is_none());
        assert!(!intent.permission_granted());
        assert!(intent.package().is_none());
    }

    #[test]
    fn test_permission_result_flow() {
        let device = make_test_device(4);
        let pending = PendingIntent::get_broadcast(
            REQ_PERMISSION_USB,
            Intent::new(ACTION_USB_PERMISSION).set_package("com.example.pinpad"),
            FLAG_MUTABLE,
        );
        assert_eq!(pending.request_code, 16);
        assert!(pending.is_mutable());

        let denied = pending.fill_result(&device, false);
        assert_eq!(denied.device(), Some(&device));
        assert!(!denied.permission_granted());

        let granted = pending.fill_result(&device, true);
        assert!(granted.permission_granted());
        assert_eq!(granted.package(), Some("com.example.pinpad"));
    }
}
