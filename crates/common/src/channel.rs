//! Async channel bridges between the Tokio runtime, the UI loop and the
//! hot-plug worker thread

use async_channel::{Receiver, Sender, bounded, unbounded};
use std::time::Duration;
use tracing::{debug, error};

/// Work marshaled onto the UI thread
pub type UiTask = Box<dyn FnOnce() + Send + 'static>;

/// Posting side of the UI loop, cloneable across threads
#[derive(Clone)]
pub struct UiHandle {
    task_tx: Sender<UiTask>,
}

impl UiHandle {
    /// Queue a task for the UI loop
    ///
    /// Never blocks, so it is safe to call from the UI thread itself.
    pub fn post(&self, task: UiTask) -> crate::Result<()> {
        self.task_tx
            .try_send(task)
            .map_err(|e| crate::Error::Channel(e.to_string()))
    }
}

/// Receiving side of the UI loop, owned by the thread acting as UI thread
pub struct UiLoop {
    task_rx: Receiver<UiTask>,
}

impl UiLoop {
    /// Run tasks until every [`UiHandle`] is dropped
    pub async fn run(&self) {
        while let Ok(task) = self.task_rx.recv().await {
            Self::run_task(task);
        }
        debug!("All UI handles are closed, stopping UI loop");
    }

    /// Run tasks as they arrive for `duration`, then return how many ran
    pub async fn run_for(&self, duration: Duration) -> usize {
        let mut ran = 0;
        let _ = tokio::time::timeout(duration, async {
            while let Ok(task) = self.task_rx.recv().await {
                Self::run_task(task);
                ran += 1;
            }
        })
        .await;
        ran
    }

    /// Run every task that is already queued without waiting
    pub fn run_pending(&self) -> usize {
        let mut ran = 0;
        while let Ok(task) = self.task_rx.try_recv() {
            Self::run_task(task);
            ran += 1;
        }
        ran
    }

    fn run_task(task: UiTask) {
        // A panicking task must not take the UI loop down with it
        if let Err(e) = std::panic::catch_unwind(std::panic::AssertUnwindSafe(task)) {
            error!("Panic in UI task: {:?}", e);
        }
    }
}

/// Create the UI bridge
///
/// Returns (UiHandle for any thread, UiLoop for the UI thread)
pub fn create_ui_bridge() -> (UiHandle, UiLoop) {
    let (task_tx, task_rx) = unbounded();
    (UiHandle { task_tx }, UiLoop { task_rx })
}

/// Commands from the Tokio runtime to the hot-plug worker thread
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerCommand {
    /// Re-enumerate devices and report anything not seen yet
    Rescan,
    /// Shutdown the worker thread gracefully
    Shutdown,
}

/// Handle for Tokio runtime (async)
#[derive(Clone)]
pub struct WorkerBridge {
    cmd_tx: Sender<WorkerCommand>,
}

impl WorkerBridge {
    /// Send a command to the worker thread
    pub async fn send_command(&self, cmd: WorkerCommand) -> crate::Result<()> {
        self.cmd_tx
            .send(cmd)
            .await
            .map_err(|e| crate::Error::Channel(e.to_string()))
    }
}

/// Handle for the worker thread (blocking)
pub struct WorkerEndpoint {
    cmd_rx: Receiver<WorkerCommand>,
}

impl WorkerEndpoint {
    /// Try to receive a command without blocking
    ///
    /// A closed channel reads as [`WorkerCommand::Shutdown`].
    pub fn try_recv_command(&self) -> Option<WorkerCommand> {
        match self.cmd_rx.try_recv() {
            Ok(cmd) => Some(cmd),
            Err(async_channel::TryRecvError::Empty) => None,
            Err(async_channel::TryRecvError::Closed) => Some(WorkerCommand::Shutdown),
        }
    }
}

/// Create the command channel between Tokio and the worker thread
pub fn create_worker_bridge() -> (WorkerBridge, WorkerEndpoint) {
    let (cmd_tx, cmd_rx) = bounded(16);
    (WorkerBridge { cmd_tx }, WorkerEndpoint { cmd_rx })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_run_pending_preserves_order() {
        let (handle, ui) = create_ui_bridge();
        let order = Arc::new(Mutex::new(Vec::new()));

        for i in 0..3 {
            let order = order.clone();
            handle
                .post(Box::new(move || order.lock().unwrap().push(i)))
                .unwrap();
        }

        assert_eq!(ui.run_pending(), 3);
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2]);
        assert_eq!(ui.run_pending(), 0);
    }

    #[test]
    fn test_panicking_task_is_contained() {
        let (handle, ui) = create_ui_bridge();
        let ran = Arc::new(Mutex::new(false));
        let ran_clone = ran.clone();

        handle.post(Box::new(|| panic!("boom"))).unwrap();
        handle
            .post(Box::new(move || *ran_clone.lock().unwrap() = true))
            .unwrap();

        assert_eq!(ui.run_pending(), 2);
        assert!(*ran.lock().unwrap());
    }

    #[tokio::test]
    async fn test_run_stops_when_handles_dropped() {
        let (handle, ui) = create_ui_bridge();
        let poster = std::thread::spawn(move || {
            handle.post(Box::new(|| {})).unwrap();
        });
        poster.join().unwrap();

        // The only handle is gone, so run returns after draining
        ui.run().await;
    }

    #[tokio::test]
    async fn test_worker_bridge() {
        let (bridge, endpoint) = create_worker_bridge();
        assert_eq!(endpoint.try_recv_command(), None);

        bridge.send_command(WorkerCommand::Rescan).await.unwrap();
        assert_eq!(endpoint.try_recv_command(), Some(WorkerCommand::Rescan));

        drop(bridge);
        assert_eq!(endpoint.try_recv_command(), Some(WorkerCommand::Shutdown));
    }
}
