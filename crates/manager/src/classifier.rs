//! Device classification
//!
//! Decides whether an attached device is one the manager cares about, either
//! by USB class code or by a substring of its display name.

use protocol::{UsbDevice, class};

/// Display name used when an intent carried no device
pub const NULL_DEVICE_NAME: &str = "device is null";

/// Default substring for [`NameMatcher`]
pub const DEFAULT_NAME_PATTERN: &str = "pinpad";

/// Product name if it is non-empty, the device node name otherwise
pub fn display_name(device: Option<&UsbDevice>) -> &str {
    match device {
        Some(device) => device
            .non_empty_product_name()
            .unwrap_or(device.device_name.as_str()),
        None => NULL_DEVICE_NAME,
    }
}

/// True iff the device class or any interface class equals `target`
pub fn matches_class(device: Option<&UsbDevice>, target: u8) -> bool {
    let Some(device) = device else {
        return false;
    };
    device.device_class == target
        || device
            .interfaces
            .iter()
            .any(|iface| iface.interface_class == target)
}

/// Video class device or a device with a video interface (UVC)
pub fn is_video_device(device: Option<&UsbDevice>) -> bool {
    matches_class(device, class::USB_CLASS_VIDEO)
}

/// Communications class device or a device with a CDC interface
pub fn is_pin_pad_class(device: Option<&UsbDevice>) -> bool {
    matches_class(device, class::USB_CLASS_COMM)
}

/// Case-insensitive substring match on the display name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameMatcher {
    pattern: String,
}

impl NameMatcher {
    pub fn new(pattern: &str) -> Self {
        Self {
            pattern: pattern.to_lowercase(),
        }
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn matches(&self, device: &UsbDevice) -> bool {
        display_name(Some(device))
            .to_lowercase()
            .contains(&self.pattern)
    }
}

impl Default for NameMatcher {
    fn default() -> Self {
        Self::new(DEFAULT_NAME_PATTERN)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::test_utils::{
        create_mock_camera, create_mock_device, create_mock_hid_device, create_mock_pinpad,
    };
    use proptest::prelude::*;
    use protocol::UsbInterface;

    #[test]
    fn test_display_name_prefers_product_name() {
        let device = create_mock_device(4, 0x1234, 0x5678).with_product_name("Acme PINPAD");
        assert_eq!(display_name(Some(&device)), "Acme PINPAD");
    }

    #[test]
    fn test_display_name_falls_back_to_device_name() {
        let device = create_mock_device(4, 0x1234, 0x5678);
        assert_eq!(display_name(Some(&device)), "/dev/bus/usb/001/004");

        let device = device.with_product_name("");
        assert_eq!(display_name(Some(&device)), "/dev/bus/usb/001/004");
    }

    #[test]
    fn test_display_name_null_device() {
        assert_eq!(display_name(None), NULL_DEVICE_NAME);
    }

    #[test]
    fn test_class_predicates() {
        let camera = create_mock_camera(1);
        let pinpad = create_mock_pinpad(2);
        let keyboard = create_mock_hid_device(3);

        assert!(is_video_device(Some(&camera)));
        assert!(!is_video_device(Some(&pinpad)));
        assert!(is_pin_pad_class(Some(&pinpad)));
        assert!(!is_pin_pad_class(Some(&camera)));
        assert!(!is_video_device(Some(&keyboard)));
        assert!(!is_pin_pad_class(Some(&keyboard)));
        assert!(!is_video_device(None));
    }

    #[test]
    fn test_class_match_on_last_interface() {
        let device = create_mock_device(1, 0, 0)
            .with_interface(UsbInterface::new(0, class::USB_CLASS_HID))
            .with_interface(UsbInterface::new(1, class::USB_CLASS_COMM));
        assert!(is_pin_pad_class(Some(&device)));
    }

    #[test]
    fn test_name_matcher_case_insensitive() {
        let matcher = NameMatcher::default();
        let device = create_mock_device(1, 0, 0).with_product_name("Gertec PinPad PPC930");
        assert!(matcher.matches(&device));

        let device = create_mock_device(1, 0, 0).with_product_name("PINPAD");
        assert!(matcher.matches(&device));

        let device = create_mock_device(1, 0, 0).with_product_name("Pin Pad");
        assert!(!matcher.matches(&device));
    }

    #[test]
    fn test_name_matcher_custom_pattern() {
        let matcher = NameMatcher::new("Verifone");
        assert_eq!(matcher.pattern(), "verifone");

        let device = create_mock_device(1, 0, 0).with_product_name("VERIFONE V240m");
        assert!(matcher.matches(&device));
    }

    proptest! {
        #[test]
        fn prop_matches_class_iff_device_or_interface(
            device_class in any::<u8>(),
            interface_classes in proptest::collection::vec(any::<u8>(), 0..6),
            target in any::<u8>(),
        ) {
            let mut device = create_mock_device(1, 0x1234, 0x5678).with_class(device_class, 0, 0);
            for (i, iface_class) in interface_classes.iter().enumerate() {
                device = device.with_interface(UsbInterface::new(i as u8, *iface_class));
            }

            let expected = device_class == target || interface_classes.contains(&target);
            prop_assert_eq!(matches_class(Some(&device), target), expected);
        }
    }
}
