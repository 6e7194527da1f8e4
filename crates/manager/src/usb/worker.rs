//! Hot-plug worker thread
//!
//! Dedicated thread running the libusb event loop. Hot-plug callbacks only
//! queue raw events; the worker turns them into device records after each
//! `handle_events` pass and broadcasts attach/detach intents on the bus.
//!
//! Records are cached by (bus, address) so a detach intent still carries
//! the record of a device that is already gone. Without libusb hot-plug
//! support the worker polls the device list and diffs it against the cache.

use crate::usb::device::{device_record, is_reportable};
use crate::usb::host::NativeUsbHost;
use common::{WorkerCommand, WorkerEndpoint};
use protocol::{ACTION_USB_DEVICE_ATTACHED, ACTION_USB_DEVICE_DETACHED, Intent, UsbDevice};
use rusb::{Context, Device, Hotplug, HotplugBuilder, Registration, UsbContext};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Timeout of one libusb event pass
const EVENT_TIMEOUT: Duration = Duration::from_millis(100);

/// (bus number, address)
pub type Location = (u8, u8);

/// Records that appeared and disappeared between two device snapshots
#[derive(Debug, Default, PartialEq)]
pub struct DeviceChanges {
    pub attached: Vec<UsbDevice>,
    /// Cached records, so they stay complete after the device is gone
    pub detached: Vec<UsbDevice>,
}

/// Diff the current device snapshot against the cached one
///
/// Both lists are ordered by location.
pub fn diff_devices(
    known: &HashMap<Location, UsbDevice>,
    current: &HashMap<Location, UsbDevice>,
) -> DeviceChanges {
    let mut detached: Vec<UsbDevice> = known
        .iter()
        .filter(|(location, _)| !current.contains_key(location))
        .map(|(_, record)| record.clone())
        .collect();
    let mut attached: Vec<UsbDevice> = current
        .iter()
        .filter(|(location, _)| !known.contains_key(location))
        .map(|(_, record)| record.clone())
        .collect();

    detached.sort_by_key(|record| record.device_id);
    attached.sort_by_key(|record| record.device_id);
    DeviceChanges { attached, detached }
}

enum RawEvent {
    Arrived(Device<Context>),
    Left(Location),
}

/// Hot-plug callback, runs inside `handle_events`
struct HotplugCallback {
    events: async_channel::Sender<RawEvent>,
}

impl Hotplug<Context> for HotplugCallback {
    fn device_arrived(&mut self, device: Device<Context>) {
        debug!(
            "Hot-plug: device arrived bus={}, addr={}",
            device.bus_number(),
            device.address()
        );
        if let Err(e) = self.events.try_send(RawEvent::Arrived(device)) {
            error!("Failed to queue arrival event: {}", e);
        }
    }

    fn device_left(&mut self, device: Device<Context>) {
        let location = (device.bus_number(), device.address());
        debug!(
            "Hot-plug: device left bus={}, addr={}",
            location.0, location.1
        );
        if let Err(e) = self.events.try_send(RawEvent::Left(location)) {
            error!("Failed to queue removal event: {}", e);
        }
    }
}

pub struct HotplugWorker {
    usb: Arc<NativeUsbHost>,
    endpoint: WorkerEndpoint,
    events: async_channel::Receiver<RawEvent>,
    known: HashMap<Location, UsbDevice>,
    poll_interval: Duration,
    registration: Option<Registration<Context>>,
}

impl HotplugWorker {
    /// Create the worker and snapshot the devices already present
    ///
    /// Devices present at startup are not announced; the startup scans
    /// cover them.
    pub fn new(
        usb: Arc<NativeUsbHost>,
        endpoint: WorkerEndpoint,
        poll_interval: Duration,
    ) -> Result<Self, rusb::Error> {
        let (events_tx, events) = async_channel::unbounded();

        let registration = if rusb::has_hotplug() {
            let registration = HotplugBuilder::new()
                .enumerate(false)
                .register(usb.context(), Box::new(HotplugCallback { events: events_tx }))?;
            debug!("Hot-plug callbacks registered");
            Some(registration)
        } else {
            warn!(
                "libusb has no hot-plug support, polling every {:?}",
                poll_interval
            );
            None
        };

        let mut worker = Self {
            usb,
            endpoint,
            events,
            known: HashMap::new(),
            poll_interval,
            registration,
        };
        worker.known = worker.enumerate()?;
        info!("Hot-plug worker tracking {} device(s)", worker.known.len());
        Ok(worker)
    }

    pub fn uses_hotplug(&self) -> bool {
        self.registration.is_some()
    }

    /// Run until [`WorkerCommand::Shutdown`] arrives
    pub fn run(mut self) -> Result<(), rusb::Error> {
        info!("Hot-plug worker started");
        let mut next_poll = Instant::now() + self.poll_interval;

        loop {
            match self.endpoint.try_recv_command() {
                Some(WorkerCommand::Shutdown) => {
                    info!("Hot-plug worker shutting down");
                    break;
                }
                Some(WorkerCommand::Rescan) => self.rescan(),
                None => {}
            }

            if self.uses_hotplug() {
                match self.usb.context().handle_events(Some(EVENT_TIMEOUT)) {
                    Ok(()) => {}
                    Err(rusb::Error::Interrupted) => debug!("USB event handling interrupted"),
                    Err(e) => {
                        warn!("Error handling USB events: {}", e);
                        std::thread::sleep(EVENT_TIMEOUT);
                    }
                }
                self.process_events();
            } else {
                std::thread::sleep(EVENT_TIMEOUT);
                if Instant::now() >= next_poll {
                    self.rescan();
                    next_poll = Instant::now() + self.poll_interval;
                }
            }
        }

        info!("Hot-plug worker stopped");
        Ok(())
    }

    fn process_events(&mut self) {
        while let Ok(event) = self.events.try_recv() {
            match event {
                RawEvent::Arrived(device) => self.device_arrived(&device),
                RawEvent::Left(location) => self.device_left(location),
            }
        }
    }

    fn device_arrived(&mut self, device: &Device<Context>) {
        let location = (device.bus_number(), device.address());
        if self.known.contains_key(&location) || !is_reportable(device, self.usb.filters()) {
            return;
        }
        match device_record(device) {
            Ok(record) => self.announce_attached(record),
            Err(e) => warn!(
                "Failed to read arrived device bus={}, addr={}: {}",
                device.bus_number(),
                device.address(),
                e
            ),
        }
    }

    fn device_left(&mut self, location: Location) {
        if let Some(record) = self.known.remove(&location) {
            self.announce_detached(record);
        }
    }

    /// Diff the current device list against the cache
    fn rescan(&mut self) {
        let current = match self.enumerate() {
            Ok(current) => current,
            Err(e) => {
                warn!("Rescan failed: {}", e);
                return;
            }
        };

        let changes = diff_devices(&self.known, &current);
        for record in changes.detached {
            self.device_left((record.bus_number, record.address));
        }
        for record in changes.attached {
            self.announce_attached(record);
        }
    }

    fn enumerate(&self) -> Result<HashMap<Location, UsbDevice>, rusb::Error> {
        let devices = self.usb.context().devices()?;
        Ok(devices
            .iter()
            .filter(|device| is_reportable(device, self.usb.filters()))
            .filter_map(|device| device_record(&device).ok())
            .map(|record| ((record.bus_number, record.address), record))
            .collect())
    }

    fn announce_attached(&mut self, record: UsbDevice) {
        let location = (record.bus_number, record.address);
        let intent = Intent::new(ACTION_USB_DEVICE_ATTACHED).with_device(record.clone());
        self.known.insert(location, record);
        self.usb.bus().send_broadcast(&intent);
    }

    fn announce_detached(&mut self, record: UsbDevice) {
        self.usb.forget(record.device_id);
        let intent = Intent::new(ACTION_USB_DEVICE_DETACHED).with_device(record);
        self.usb.bus().send_broadcast(&intent);
    }
}

/// Spawn the hot-plug worker thread
pub fn spawn_hotplug_worker(
    usb: Arc<NativeUsbHost>,
    endpoint: WorkerEndpoint,
    poll_interval: Duration,
) -> std::thread::JoinHandle<Result<(), rusb::Error>> {
    std::thread::Builder::new()
        .name("usb-hotplug".to_string())
        .spawn(move || {
            let worker = HotplugWorker::new(usb, endpoint, poll_interval)?;
            worker.run()
        })
        .expect("Failed to spawn hot-plug worker thread")
}
