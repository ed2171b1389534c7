// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use attach_core::VolumeId;
use parking_lot::Mutex;
use tokio::task::AbortHandle;

/// Per-volume one-shot ack timers (§5: "timer firings execute on
/// independent tasks"). Each armed timer is its own spawned task rather
/// than entries polled off a central scheduler, so a slow callback for one
/// volume can never delay another volume's expiry.
#[derive(Default)]
pub struct AckTimers {
    handles: Mutex<HashMap<VolumeId, AbortHandle>>,
}

impl AckTimers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arms a one-shot timer for `volume_id` that sleeps `duration` then
    /// runs `on_fire`. Idempotent: if a timer for this volume is already
    /// tracked, does nothing and returns `false` (invariant 5, and §7's
    /// duplicate-admission policy).
    pub fn arm<F, Fut>(&self, volume_id: VolumeId, duration: Duration, on_fire: F) -> bool
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut handles = self.handles.lock();
        if handles.contains_key(&volume_id) {
            return false;
        }
        let key = volume_id.clone();
        let join = tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            on_fire().await;
        });
        handles.insert(key, join.abort_handle());
        true
    }

    /// Cancels the timer for `volume_id`, if any. Used after a successful
    /// send (§4.A `stop_timer`).
    pub fn disarm(&self, volume_id: &VolumeId) -> bool {
        match self.handles.lock().remove(volume_id) {
            Some(handle) => {
                handle.abort();
                true
            }
            None => false,
        }
    }

    pub fn is_armed(&self, volume_id: &VolumeId) -> bool {
        self.handles.lock().contains_key(volume_id)
    }

    /// Called by the timer callback itself once it has run, so a fired
    /// (but not yet disarmed) timer's handle doesn't linger in the map.
    pub fn forget(&self, volume_id: &VolumeId) {
        self.handles.lock().remove(volume_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn timer_fires_after_duration() {
        let timers = AckTimers::new();
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = fired.clone();
        timers.arm(VolumeId::new("v1"), Duration::from_secs(5), move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });

        tokio::time::advance(Duration::from_secs(6)).await;
        tokio::task::yield_now().await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn arming_twice_is_a_noop() {
        let timers = AckTimers::new();
        assert!(timers.arm(VolumeId::new("v1"), Duration::from_secs(5), || async {}));
        assert!(!timers.arm(VolumeId::new("v1"), Duration::from_secs(5), || async {}));
    }

    #[tokio::test]
    async fn disarm_cancels_pending_timer() {
        let timers = AckTimers::new();
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = fired.clone();
        timers.arm(VolumeId::new("v1"), Duration::from_millis(10), move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });
        assert!(timers.disarm(&VolumeId::new("v1")));
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }
}
