//! Pin-pad USB manager
//!
//! Detects qualifying USB devices as they are attached, requests runtime
//! permission for them through the host and logs device and host metadata.
//! The manager talks to its host only through [`common::HostContext`], so
//! the same code drives the native libusb daemon and the test fake.

pub mod classifier;
pub mod config;
pub mod diagnostics;
pub mod dispatcher;
pub mod permission;
pub mod policy;
pub mod scan;
pub mod service;
pub mod usb;

pub use classifier::NameMatcher;
pub use config::ManagerConfig;
pub use dispatcher::{PinPadManager, handle_intent};
pub use policy::{PermissionDecision, PermissionDenialReason, PermissionPolicy};
