//! Conversion of libusb devices into device records
//!
//! Descriptors are read from the cached copies libusb keeps. String
//! descriptors need the device opened, which fails without access rights;
//! the record then simply has no names.

use protocol::{DeviceFilter, UsbDevice, UsbInterface};
use rusb::{Device, DeviceHandle, UsbContext};
use tracing::{debug, trace};

/// Linux Foundation vendor id, used by root hubs
const ROOT_HUB_VENDOR_ID: u16 = 0x1d6b;
const HUB_CLASS: u8 = 0x09;

/// Root hubs are never of interest
pub fn is_root_hub(vendor_id: u16, class_code: u8) -> bool {
    vendor_id == ROOT_HUB_VENDOR_ID && class_code == HUB_CLASS
}

/// bcdDevice as `M.mm`
pub fn format_version(version: rusb::Version) -> String {
    format!(
        "{}.{}{}",
        version.major(),
        version.minor(),
        version.sub_minor()
    )
}

/// Whether `device` should be reported at all (root hubs and devices
/// outside `filters` are skipped)
pub fn is_reportable<T: UsbContext>(device: &Device<T>, filters: &[DeviceFilter]) -> bool {
    let Ok(desc) = device.device_descriptor() else {
        return false;
    };

    if is_root_hub(desc.vendor_id(), desc.class_code()) {
        trace!(
            "Skipping root hub: bus={}, addr={}",
            device.bus_number(),
            device.address()
        );
        return false;
    }

    if !DeviceFilter::any_matches(filters, desc.vendor_id(), desc.product_id()) {
        debug!(
            "Device ignored by filter: bus={}, addr={}, vid={:#06x}, pid={:#06x}",
            device.bus_number(),
            device.address(),
            desc.vendor_id(),
            desc.product_id()
        );
        return false;
    }

    true
}

/// Build the device record for `device`
pub fn device_record<T: UsbContext>(device: &Device<T>) -> Result<UsbDevice, rusb::Error> {
    let desc = device.device_descriptor()?;

    let mut record = UsbDevice::new(
        device.bus_number(),
        device.address(),
        desc.vendor_id(),
        desc.product_id(),
    )
    .with_class(desc.class_code(), desc.sub_class_code(), desc.protocol_code());
    record.version = format_version(desc.device_version());
    record.configuration_count = desc.num_configurations();
    record.interfaces = read_interfaces(device);

    match device.open() {
        Ok(handle) => {
            record.manufacturer_name =
                read_string(&handle, desc.manufacturer_string_index());
            record.product_name = read_string(&handle, desc.product_string_index());
            record.serial_number = read_string(&handle, desc.serial_number_string_index());
        }
        Err(e) => trace!(
            "Cannot open {} for string descriptors: {}",
            record.device_name, e
        ),
    }

    Ok(record)
}

/// First alternate setting of every interface in the active configuration
fn read_interfaces<T: UsbContext>(device: &Device<T>) -> Vec<UsbInterface> {
    let config = match device.active_config_descriptor() {
        Ok(config) => config,
        Err(e) => {
            debug!(
                "No active configuration for bus={}, addr={}: {}",
                device.bus_number(),
                device.address(),
                e
            );
            return Vec::new();
        }
    };

    config
        .interfaces()
        .filter_map(|interface| interface.descriptors().next())
        .map(|alt| UsbInterface {
            id: alt.interface_number(),
            alternate_setting: alt.setting_number(),
            interface_class: alt.class_code(),
            interface_subclass: alt.sub_class_code(),
            interface_protocol: alt.protocol_code(),
            endpoint_count: alt.num_endpoints(),
        })
        .collect()
}

fn read_string<T: UsbContext>(handle: &DeviceHandle<T>, index: Option<u8>) -> Option<String> {
    index
        .and_then(|idx| handle.read_string_descriptor_ascii(idx).ok())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}
