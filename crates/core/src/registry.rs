//! Registry of long-running observer queries, keyed by data type.
//!
//! At most one registration exists per data type. Registering again replaces the earlier task,
//! which is aborted; removing a registration aborts its task too.

use health_records::DataType;
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use tokio::task::JoinHandle;
use uuid::Uuid;

struct Registration {
    id: Uuid,
    handle: JoinHandle<()>,
}

#[derive(Default)]
pub struct LongRunningQueries {
    active: Mutex<HashMap<DataType, Registration>>,
}

impl LongRunningQueries {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handle` for `data_type`.
    ///
    /// Returns the new registration id and, when one was replaced, the old id.
    pub fn insert(&self, data_type: DataType, handle: JoinHandle<()>) -> (Uuid, Option<Uuid>) {
        let id = Uuid::new_v4();
        let previous = self
            .lock()
            .insert(data_type, Registration { id, handle });

        let replaced = previous.map(|old| {
            old.handle.abort();
            tracing::info!("replaced observer {} for {data_type}", old.id);
            old.id
        });
        (id, replaced)
    }

    /// Stop the observer for `data_type`. Returns `false` if none was registered.
    pub fn remove(&self, data_type: &DataType) -> bool {
        match self.lock().remove(data_type) {
            Some(registration) => {
                registration.handle.abort();
                tracing::debug!("stopped observer {} for {data_type}", registration.id);
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, data_type: &DataType) -> bool {
        self.lock().contains_key(data_type)
    }

    /// Registration id currently held for `data_type`.
    pub fn id_of(&self, data_type: &DataType) -> Option<Uuid> {
        self.lock().get(data_type).map(|registration| registration.id)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<DataType, Registration>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for LongRunningQueries {
    fn drop(&mut self) {
        let active = self
            .active
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner);
        for (_, registration) in active.drain() {
            registration.handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn idle_task() -> JoinHandle<()> {
        tokio::spawn(std::future::pending::<()>())
    }

    #[tokio::test]
    async fn reregistering_replaces_and_aborts() {
        let registry = LongRunningQueries::new();
        let steps = DataType::parse("stepCount").expect("known");

        let first = idle_task();
        let (first_id, replaced) = registry.insert(steps, first);
        assert_eq!(replaced, None);

        let (second_id, replaced) = registry.insert(steps, idle_task());
        assert_eq!(replaced, Some(first_id));
        assert_ne!(first_id, second_id);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.id_of(&steps), Some(second_id));
    }

    #[tokio::test]
    async fn replaced_task_is_cancelled() {
        let registry = LongRunningQueries::new();
        let steps = DataType::parse("stepCount").expect("known");

        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let watched = tokio::spawn(async move {
            let _keep = tx;
            std::future::pending::<()>().await;
        });
        registry.insert(steps, watched);
        registry.insert(steps, idle_task());

        // The sender is dropped when the aborted task is torn down.
        assert!(rx.await.is_err());
    }

    #[tokio::test]
    async fn remove_is_per_identifier() {
        let registry = LongRunningQueries::new();
        let steps = DataType::parse("stepCount").expect("known");
        let heart = DataType::parse("heartRate").expect("known");
        registry.insert(steps, idle_task());
        registry.insert(heart, idle_task());

        assert!(registry.remove(&steps));
        assert!(!registry.remove(&steps));
        assert!(!registry.contains(&steps));
        assert!(registry.contains(&heart));
        assert_eq!(registry.len(), 1);
    }
}
