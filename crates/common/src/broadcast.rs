//! In-process broadcast bus
//!
//! Receivers register with an [`IntentFilter`] and get every intent whose
//! action the filter lists. Delivery happens synchronously on the thread
//! that calls [`BroadcastBus::send_broadcast`].

use protocol::{Intent, IntentFilter};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, trace};

/// Callback for delivered intents
pub trait BroadcastReceiver: Send + Sync {
    fn on_receive(&self, intent: &Intent);
}

/// Identifies one registration on a bus
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ReceiverId(pub u64);

struct Registration {
    id: ReceiverId,
    filter: IntentFilter,
    receiver: Arc<dyn BroadcastReceiver>,
}

/// Broadcast bus owned by one package
pub struct BroadcastBus {
    package: String,
    next_id: AtomicU64,
    registrations: Mutex<Vec<Registration>>,
}

impl BroadcastBus {
    pub fn new(package: impl Into<String>) -> Self {
        Self {
            package: package.into(),
            next_id: AtomicU64::new(1),
            registrations: Mutex::new(Vec::new()),
        }
    }

    pub fn package(&self) -> &str {
        &self.package
    }

    pub fn register(
        &self,
        filter: IntentFilter,
        receiver: Arc<dyn BroadcastReceiver>,
    ) -> ReceiverId {
        let id = ReceiverId(self.next_id.fetch_add(1, Ordering::Relaxed));
        debug!("Registered receiver {:?} for {:?}", id, filter.actions());
        self.lock().push(Registration {
            id,
            filter,
            receiver,
        });
        id
    }

    /// Remove a registration, returns false if `id` was not registered
    pub fn unregister(&self, id: ReceiverId) -> bool {
        let mut registrations = self.lock();
        let before = registrations.len();
        registrations.retain(|r| r.id != id);
        let removed = registrations.len() != before;
        if removed {
            debug!("Unregistered receiver {:?}", id);
        }
        removed
    }

    pub fn receiver_count(&self) -> usize {
        self.lock().len()
    }

    /// Deliver `intent` to every matching receiver, returns the delivery count
    ///
    /// Intents scoped to another package are dropped.
    pub fn send_broadcast(&self, intent: &Intent) -> usize {
        if let Some(package) = intent.package()
            && package != self.package
        {
            debug!(
                "Dropping {} scoped to package {}, bus belongs to {}",
                intent.action(),
                package,
                self.package
            );
            return 0;
        }

        // Collect first so receivers run without the registry lock held
        let targets: Vec<Arc<dyn BroadcastReceiver>> = self
            .lock()
            .iter()
            .filter(|r| r.filter.matches(intent))
            .map(|r| r.receiver.clone())
            .collect();

        trace!(
            "Delivering {} to {} receiver(s)",
            intent.action(),
            targets.len()
        );
        for receiver in &targets {
            receiver.on_receive(intent);
        }
        targets.len()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Registration>> {
        self.registrations
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
