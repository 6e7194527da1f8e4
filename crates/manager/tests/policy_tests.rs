//! Integration tests for the native grant policy
//!
//! Tests policy decisions built from configuration, including:
//! - Allow-list patterns
//! - Device and interface class restrictions
//! - Device node access

use common::test_utils::{
    create_mock_camera, create_mock_device, create_mock_hid_device, create_mock_pinpad,
};
use manager::config::{ManagerConfig, PermissionSettings};
use manager::{PermissionDecision, PermissionDenialReason, PermissionPolicy};
use protocol::class;

fn policy(
    auto_grant: &[&str],
    restricted_classes: &[u8],
    require_node_access: bool,
) -> PermissionPolicy {
    PermissionPolicy::from_settings(&PermissionSettings {
        auto_grant: auto_grant.iter().map(|s| s.to_string()).collect(),
        restricted_classes: restricted_classes.to_vec(),
        require_node_access,
    })
    .unwrap()
}

#[test]
fn test_default_config_requires_node_access() {
    let config = ManagerConfig::default();
    let policy = PermissionPolicy::from_settings(&config.permissions).unwrap();
    let pinpad = create_mock_pinpad(1);

    assert_eq!(
        policy.decide(&pinpad, false),
        PermissionDecision::Deny(PermissionDenialReason::NodeNotAccessible)
    );
    assert_eq!(policy.decide(&pinpad, true), PermissionDecision::Allow);
}

#[test]
fn test_exact_and_vendor_patterns() {
    let policy = policy(&["0x046d:0x0825", "0x0b00:*"], &[], false);

    assert!(policy.decide(&create_mock_camera(1), false).is_allowed());
    assert!(policy.decide(&create_mock_pinpad(2), false).is_allowed());
    assert_eq!(
        policy.decide(&create_mock_hid_device(3), false),
        PermissionDecision::Deny(PermissionDenialReason::NotInAllowList)
    );
}

#[test]
fn test_product_wildcard() {
    let policy = policy(&["*:0x0080"], &[], false);

    assert!(policy.decide(&create_mock_device(1, 0x1111, 0x0080), false).is_allowed());
    assert!(!policy.decide(&create_mock_device(2, 0x1111, 0x0081), false).is_allowed());
}

#[test]
fn test_restriction_wins_over_allow_list() {
    let policy = policy(&["0x046d:*"], &[class::USB_CLASS_AUDIO], false);

    assert_eq!(
        policy.decide(&create_mock_camera(1), true),
        PermissionDecision::Deny(PermissionDenialReason::ClassRestricted {
            class: class::USB_CLASS_AUDIO
        })
    );
}

#[test]
fn test_device_level_class_restriction() {
    let policy = policy(&[], &[class::USB_CLASS_MISC], false);
    let camera = create_mock_camera(1);

    assert_eq!(
        policy.decide(&camera, true),
        PermissionDecision::Deny(PermissionDenialReason::ClassRestricted {
            class: class::USB_CLASS_MISC
        })
    );
}

#[test]
fn test_denial_reasons_display() {
    assert_eq!(
        PermissionDenialReason::NotInAllowList.to_string(),
        "Device not in auto-grant list"
    );
    assert_eq!(
        PermissionDenialReason::NodeNotAccessible.to_string(),
        "Device node is not accessible"
    );
}
