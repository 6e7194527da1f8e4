//! USB device type definitions
//!
//! This module defines the read-only device record a host hands to the
//! manager, the USB class codes the classifier works with, and the VID:PID
//! filter syntax shared by configuration and the grant policy.

use crate::error::{ProtocolError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// USB device class codes (bDeviceClass / bInterfaceClass)
pub mod class {
    /// Class is defined per interface
    pub const USB_CLASS_PER_INTERFACE: u8 = 0x00;
    pub const USB_CLASS_AUDIO: u8 = 0x01;
    /// Communications and CDC control
    pub const USB_CLASS_COMM: u8 = 0x02;
    pub const USB_CLASS_HID: u8 = 0x03;
    pub const USB_CLASS_PRINTER: u8 = 0x07;
    pub const USB_CLASS_MASS_STORAGE: u8 = 0x08;
    pub const USB_CLASS_HUB: u8 = 0x09;
    pub const USB_CLASS_CDC_DATA: u8 = 0x0a;
    /// Smart card
    pub const USB_CLASS_CSCID: u8 = 0x0b;
    pub const USB_CLASS_VIDEO: u8 = 0x0e;
    pub const USB_CLASS_MISC: u8 = 0xef;
    pub const USB_CLASS_APP_SPEC: u8 = 0xfe;
    pub const USB_CLASS_VENDOR_SPEC: u8 = 0xff;
}

/// Host-assigned device identifier
///
/// Follows the Android convention of `bus * 1000 + address`, which keeps
/// the id stable for as long as the device stays on the same port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DeviceId(pub u32);

impl DeviceId {
    pub fn from_location(bus_number: u8, address: u8) -> Self {
        DeviceId(u32::from(bus_number) * 1000 + u32::from(address))
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One interface (first alternate setting) of the active configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsbInterface {
    /// bInterfaceNumber
    pub id: u8,
    /// bAlternateSetting
    pub alternate_setting: u8,
    pub interface_class: u8,
    pub interface_subclass: u8,
    pub interface_protocol: u8,
    pub endpoint_count: u8,
}

impl UsbInterface {
    pub fn new(id: u8, interface_class: u8) -> Self {
        Self {
            id,
            alternate_setting: 0,
            interface_class,
            interface_subclass: 0,
            interface_protocol: 0,
            endpoint_count: 0,
        }
    }
}

/// Device record as reported by the host USB subsystem
///
/// The record is a snapshot: the manager never mutates it and never keeps
/// it beyond a single event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsbDevice {
    /// Device node path, e.g. `/dev/bus/usb/001/004`
    pub device_name: String,
    pub device_id: DeviceId,
    pub bus_number: u8,
    pub address: u8,
    pub vendor_id: u16,
    pub product_id: u16,
    /// Product string descriptor (if it could be read)
    pub product_name: Option<String>,
    /// Manufacturer string descriptor (if it could be read)
    pub manufacturer_name: Option<String>,
    /// Serial number string descriptor (if it could be read)
    pub serial_number: Option<String>,
    pub device_class: u8,
    pub device_subclass: u8,
    pub device_protocol: u8,
    /// bcdDevice formatted as `M.mm`
    pub version: String,
    pub configuration_count: u8,
    pub interfaces: Vec<UsbInterface>,
}

impl UsbDevice {
    /// Create a bare record for the device at `bus`/`address`
    ///
    /// String descriptors are unset, the class is defined per interface and
    /// the device has a single configuration with no interfaces.
    pub fn new(bus_number: u8, address: u8, vendor_id: u16, product_id: u16) -> Self {
        Self {
            device_name: Self::node_path(bus_number, address),
            device_id: DeviceId::from_location(bus_number, address),
            bus_number,
            address,
            vendor_id,
            product_id,
            product_name: None,
            manufacturer_name: None,
            serial_number: None,
            device_class: class::USB_CLASS_PER_INTERFACE,
            device_subclass: 0,
            device_protocol: 0,
            version: "0.00".to_string(),
            configuration_count: 1,
            interfaces: Vec::new(),
        }
    }

    /// Device node path for a bus location
    pub fn node_path(bus_number: u8, address: u8) -> String {
        format!("/dev/bus/usb/{:03}/{:03}", bus_number, address)
    }

    pub fn with_product_name(mut self, name: impl Into<String>) -> Self {
        self.product_name = Some(name.into());
        self
    }

    pub fn with_manufacturer_name(mut self, name: impl Into<String>) -> Self {
        self.manufacturer_name = Some(name.into());
        self
    }

    pub fn with_class(mut self, device_class: u8, subclass: u8, protocol: u8) -> Self {
        self.device_class = device_class;
        self.device_subclass = subclass;
        self.device_protocol = protocol;
        self
    }

    pub fn with_interface(mut self, interface: UsbInterface) -> Self {
        self.interfaces.push(interface);
        self
    }

    pub fn interface_count(&self) -> usize {
        self.interfaces.len()
    }

    /// Interface at `index`, `None` past the end
    pub fn interface(&self, index: usize) -> Option<&UsbInterface> {
        self.interfaces.get(index)
    }

    /// Product name when it is present and non-empty
    pub fn non_empty_product_name(&self) -> Option<&str> {
        self.product_name.as_deref().filter(|name| !name.is_empty())
    }
}

/// VID:PID device filter
///
/// Accepts `0xVID:0xPID` with either half replaced by `*`, e.g.
/// `0x0b00:*` for every product of one vendor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceFilter {
    /// `None` matches any vendor
    pub vendor_id: Option<u16>,
    /// `None` matches any product
    pub product_id: Option<u16>,
}

impl DeviceFilter {
    pub fn matches(&self, vendor_id: u16, product_id: u16) -> bool {
        self.vendor_id.is_none_or(|vid| vid == vendor_id)
            && self.product_id.is_none_or(|pid| pid == product_id)
    }

    pub fn matches_device(&self, device: &UsbDevice) -> bool {
        self.matches(device.vendor_id, device.product_id)
    }

    /// True when `filters` is empty or any filter matches
    pub fn any_matches(filters: &[DeviceFilter], vendor_id: u16, product_id: u16) -> bool {
        filters.is_empty() || filters.iter().any(|f| f.matches(vendor_id, product_id))
    }

    /// Parse a list of filter strings, stopping at the first invalid one
    pub fn parse_all<S: AsRef<str>>(filters: &[S]) -> Result<Vec<DeviceFilter>> {
        filters.iter().map(|f| f.as_ref().parse()).collect()
    }

    fn parse_part(value: &str, field: &'static str) -> Result<Option<u16>> {
        if value == "*" {
            return Ok(None);
        }

        let invalid = |reason| ProtocolError::InvalidHexId {
            field,
            value: value.to_string(),
            reason,
        };

        let hex = value
            .strip_prefix("0x")
            .or_else(|| value.strip_prefix("0X"))
            .ok_or_else(|| invalid("must start with '0x' (e.g., '0x1234')"))?;

        if hex.is_empty() || hex.len() > 4 {
            return Err(invalid("hex part must be 1-4 digits"));
        }

        u16::from_str_radix(hex, 16)
            .map(Some)
            .map_err(|_| invalid("not a valid hex number"))
    }
}

impl FromStr for DeviceFilter {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.split(':').collect();
        let [vid, pid] = parts.as_slice() else {
            return Err(ProtocolError::InvalidFilter {
                filter: s.to_string(),
            });
        };

        Ok(Self {
            vendor_id: Self::parse_part(vid, "VID")?,
            product_id: Self::parse_part(pid, "PID")?,
        })
    }
}

impl fmt::Display for DeviceFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.vendor_id {
            Some(vid) => write!(f, "{:#06x}:", vid)?,
            None => write!(f, "*:")?,
        }
        match self.product_id {
            Some(pid) => write!(f, "{:#06x}", pid),
            None => write!(f, "*"),
        }
    }
}
