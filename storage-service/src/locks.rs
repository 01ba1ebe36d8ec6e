// SPDX-License-Identifier: GPL-3.0-only

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::OwnedMutexGuard;

/// Serializes operations on the same volume id.
///
/// Entries are created on demand and dropped once no caller holds or waits
/// for them, so the map only ever contains volumes with work in flight.
#[derive(Debug, Clone, Default)]
pub struct VolumeLocks {
    inner: Arc<Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>>,
}

impl VolumeLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, volume_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut map = self.inner.lock().unwrap_or_else(|e| e.into_inner());
            map.retain(|_, lock| Arc::strong_count(lock) > 1);
            map.entry(volume_id.to_string()).or_default().clone()
        };
        lock.lock_owned().await
    }

    #[cfg(test)]
    fn tracked(&self) -> usize {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn same_volume_waits_for_release() {
        let locks = VolumeLocks::new();
        let guard = locks.acquire("vg1/lv1").await;

        let contender = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _guard = locks.acquire("vg1/lv1").await;
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!contender.is_finished());

        drop(guard);
        tokio::time::timeout(Duration::from_secs(1), contender)
            .await
            .expect("contender should acquire after release")
            .expect("task should not panic");
    }

    #[tokio::test]
    async fn different_volumes_do_not_block() {
        let locks = VolumeLocks::new();
        let _first = locks.acquire("vg1/lv1").await;

        tokio::time::timeout(Duration::from_secs(1), locks.acquire("vg1/lv2"))
            .await
            .expect("other volume should not wait");
    }

    #[tokio::test]
    async fn idle_entries_are_pruned() {
        let locks = VolumeLocks::new();
        drop(locks.acquire("vg1/lv1").await);
        drop(locks.acquire("vg1/lv2").await);

        // Only the entry for the most recent acquisition survives pruning.
        assert_eq!(locks.tracked(), 1);
    }
}
