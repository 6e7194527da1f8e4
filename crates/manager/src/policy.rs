//! Native permission policy
//!
//! Decides how the native host answers a permission request. A request is
//! granted unless one of these rules denies it:
//! - Device class restrictions (device level or any interface)
//! - VID:PID allow-list (an empty list allows every device)
//! - Device node access (optional, the node must open read-write)

use crate::config::PermissionSettings;
use anyhow::{Context, Result};
use protocol::{DeviceFilter, UsbDevice};
use tracing::debug;

/// Policy enforcement result
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PermissionDecision {
    Allow,
    Deny(PermissionDenialReason),
}

impl PermissionDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow)
    }
}

/// Reason for policy denial
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PermissionDenialReason {
    /// Device or one of its interfaces has a restricted class
    ClassRestricted { class: u8 },
    /// Device matches no `auto_grant` pattern
    NotInAllowList,
    /// Device node cannot be opened by this process
    NodeNotAccessible,
}

impl std::fmt::Display for PermissionDenialReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ClassRestricted { class } => {
                write!(f, "Device class {:#04x} is restricted", class)
            }
            Self::NotInAllowList => write!(f, "Device not in auto-grant list"),
            Self::NodeNotAccessible => write!(f, "Device node is not accessible"),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PermissionPolicy {
    allow: Vec<DeviceFilter>,
    restricted_classes: Vec<u8>,
    require_node_access: bool,
}

impl PermissionPolicy {
    pub fn new(
        allow: Vec<DeviceFilter>,
        restricted_classes: Vec<u8>,
        require_node_access: bool,
    ) -> Self {
        Self {
            allow,
            restricted_classes,
            require_node_access,
        }
    }

    /// Build a policy from the `[permissions]` section
    pub fn from_settings(settings: &PermissionSettings) -> Result<Self> {
        let allow = DeviceFilter::parse_all(&settings.auto_grant)
            .context("Invalid [permissions] auto_grant")?;
        Ok(Self::new(
            allow,
            settings.restricted_classes.clone(),
            settings.require_node_access,
        ))
    }

    pub fn requires_node_access(&self) -> bool {
        self.require_node_access
    }

    /// Decide a request for `device`
    ///
    /// `node_access` tells whether the device node opened read-write; it is
    /// only consulted when the policy requires node access.
    pub fn decide(&self, device: &UsbDevice, node_access: bool) -> PermissionDecision {
        if let Some(class) = self.restricted_class(device) {
            debug!("Device {} has restricted class {}", device.device_id, class);
            return PermissionDecision::Deny(PermissionDenialReason::ClassRestricted { class });
        }

        if !DeviceFilter::any_matches(&self.allow, device.vendor_id, device.product_id) {
            return PermissionDecision::Deny(PermissionDenialReason::NotInAllowList);
        }

        if self.require_node_access && !node_access {
            return PermissionDecision::Deny(PermissionDenialReason::NodeNotAccessible);
        }

        PermissionDecision::Allow
    }

    fn restricted_class(&self, device: &UsbDevice) -> Option<u8> {
        std::iter::once(device.device_class)
            .chain(device.interfaces.iter().map(|i| i.interface_class))
            .find(|class| self.restricted_classes.contains(class))
    }
}
