//! Common utilities for pinpad-usb
//!
//! This crate provides what every host and the manager share: the host
//! traits, the in-process broadcast bus, the UI-thread bridge, error
//! handling, logging setup and test utilities.

pub mod broadcast;
pub mod channel;
pub mod error;
pub mod host;
pub mod logging;
pub mod test_utils;

pub use broadcast::{BroadcastBus, BroadcastReceiver, ReceiverId};
pub use channel::{
    UiHandle, UiLoop, UiTask, WorkerBridge, WorkerCommand, WorkerEndpoint, create_ui_bridge,
    create_worker_bridge,
};
pub use error::{Error, Result};
pub use host::{AppInfo, BuildInfo, HostContext, UsbHost};
pub use logging::setup_logging;
