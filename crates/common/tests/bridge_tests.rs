//! Bridge Integration Tests
//!
//! Tests for the UI bridge and the broadcast bus as used across threads.
//!
//! # Test Scenarios
//! - Tasks posted from a worker thread run on the UI loop
//! - Broadcasts sent from a worker thread reach receivers on that thread
//! - A UI task may broadcast (permission result path)
//!
//! Run with: `cargo test -p common --test bridge_tests`

use common::test_utils::{DEFAULT_TEST_TIMEOUT, TEST_PACKAGE, create_mock_pinpad, with_timeout};
use common::{BroadcastBus, BroadcastReceiver, create_ui_bridge};
use protocol::{ACTION_USB_DEVICE_ATTACHED, ACTION_USB_PERMISSION, Intent, IntentFilter};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

#[derive(Default)]
struct ThreadRecorder {
    threads: Mutex<Vec<Option<String>>>,
    granted: Mutex<Vec<bool>>,
}

impl BroadcastReceiver for ThreadRecorder {
    fn on_receive(&self, intent: &Intent) {
        self.threads
            .lock()
            .unwrap()
            .push(thread::current().name().map(str::to_string));
        self.granted.lock().unwrap().push(intent.permission_granted());
    }
}

#[tokio::test]
async fn test_tasks_from_worker_thread_run_on_ui_loop() {
    let (handle, ui) = create_ui_bridge();
    let counter = Arc::new(AtomicUsize::new(0));

    let worker_counter = counter.clone();
    let worker = thread::Builder::new()
        .name("usb-hotplug".to_string())
        .spawn(move || {
            for _ in 0..5 {
                let counter = worker_counter.clone();
                handle
                    .post(Box::new(move || {
                        counter.fetch_add(1, Ordering::SeqCst);
                    }))
                    .unwrap();
            }
        })
        .unwrap();
    worker.join().unwrap();

    with_timeout(DEFAULT_TEST_TIMEOUT, ui.run())
        .await
        .expect("UI loop did not stop after handles were dropped");
    assert_eq!(counter.load(Ordering::SeqCst), 5);
}

#[tokio::test]
async fn test_run_for_returns_after_duration() {
    let (handle, ui) = create_ui_bridge();
    handle.post(Box::new(|| {})).unwrap();

    // The handle stays alive, so only the timeout ends the loop
    let ran = ui.run_for(Duration::from_millis(50)).await;
    assert_eq!(ran, 1);
    drop(handle);
}

#[test]
fn test_broadcast_delivered_on_sending_thread() {
    let bus = Arc::new(BroadcastBus::new(TEST_PACKAGE));
    let recorder = Arc::new(ThreadRecorder::default());
    bus.register(IntentFilter::new(ACTION_USB_DEVICE_ATTACHED), recorder.clone());

    let worker_bus = bus.clone();
    thread::Builder::new()
        .name("usb-hotplug".to_string())
        .spawn(move || {
            let intent = Intent::new(ACTION_USB_DEVICE_ATTACHED).with_device(create_mock_pinpad(1));
            worker_bus.send_broadcast(&intent);
        })
        .unwrap()
        .join()
        .unwrap();

    assert_eq!(
        *recorder.threads.lock().unwrap(),
        vec![Some("usb-hotplug".to_string())]
    );
}

#[test]
fn test_ui_task_broadcasts_permission_result() {
    let bus = Arc::new(BroadcastBus::new(TEST_PACKAGE));
    let recorder = Arc::new(ThreadRecorder::default());
    bus.register(IntentFilter::new(ACTION_USB_PERMISSION), recorder.clone());

    let (handle, ui) = create_ui_bridge();
    let task_bus = bus.clone();
    handle
        .post(Box::new(move || {
            let intent = Intent::new(ACTION_USB_PERMISSION)
                .set_package(TEST_PACKAGE)
                .with_device(create_mock_pinpad(1))
                .with_boolean_extra(protocol::EXTRA_PERMISSION_GRANTED, true);
            task_bus.send_broadcast(&intent);
        }))
        .unwrap();

    assert_eq!(ui.run_pending(), 1);
    assert_eq!(*recorder.granted.lock().unwrap(), vec![true]);
}
