use std::sync::Arc;

use dashmap::DashMap;
use tokio::{sync::Mutex, task::JoinHandle};
use uuid::Uuid;

/// Running countdown tasks and the per-match emission gates.
///
/// The gate serializes everything emitted for one match (ticks and the end broadcast) so
/// clients never see a `time_sync` after `match_ended`.
#[derive(Default)]
pub struct CountdownRegistry {
    tasks: DashMap<Uuid, JoinHandle<()>>,
    gates: DashMap<Uuid, Arc<Mutex<()>>>,
}

impl CountdownRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the task driving `match_id`, aborting any task it replaces.
    pub fn install(&self, match_id: Uuid, handle: JoinHandle<()>) {
        if let Some(previous) = self.tasks.insert(match_id, handle) {
            previous.abort();
        }
    }

    /// Stop tracking the task without aborting it; used by the task itself when it ends the match.
    pub fn release(&self, match_id: Uuid) -> Option<JoinHandle<()>> {
        self.tasks.remove(&match_id).map(|(_, handle)| handle)
    }

    /// Abort and forget the task of `match_id`. Returns whether one was tracked.
    pub fn cancel(&self, match_id: Uuid) -> bool {
        match self.release(match_id) {
            Some(handle) => {
                handle.abort();
                true
            }
            None => false,
        }
    }

    /// Whether a live countdown task is tracked for `match_id`.
    pub fn is_running(&self, match_id: Uuid) -> bool {
        self.tasks
            .get(&match_id)
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Emission gate of `match_id`, created on first use.
    pub fn gate(&self, match_id: Uuid) -> Arc<Mutex<()>> {
        self.gates.entry(match_id).or_default().clone()
    }

    /// Drop the gate of a match that will not emit anymore.
    pub fn forget_gate(&self, match_id: Uuid) {
        self.gates.remove(&match_id);
    }

    /// Number of tracked countdown tasks.
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Whether no countdown task is tracked.
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Abort every tracked task.
    pub fn shutdown(&self) {
        let ids = self.tasks.iter().map(|entry| *entry.key()).collect::<Vec<_>>();
        for match_id in ids {
            self.cancel(match_id);
        }
        self.gates.clear();
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn sleeper() -> JoinHandle<()> {
        tokio::spawn(tokio::time::sleep(Duration::from_secs(3_600)))
    }

    #[tokio::test]
    async fn installing_twice_aborts_the_first_task() {
        let registry = CountdownRegistry::new();
        let id = Uuid::new_v4();
        let (alive_tx, alive_rx) = tokio::sync::oneshot::channel::<()>();
        registry.install(
            id,
            tokio::spawn(async move {
                let _alive = alive_tx;
                tokio::time::sleep(Duration::from_secs(3_600)).await;
            }),
        );
        registry.install(id, sleeper());

        // The sender is dropped once the first task is torn down.
        assert!(alive_rx.await.is_err());
        assert!(registry.is_running(id));
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn cancel_aborts_and_forgets() {
        let registry = CountdownRegistry::new();
        let id = Uuid::new_v4();
        registry.install(id, sleeper());

        assert!(registry.cancel(id));
        assert!(!registry.cancel(id));
        assert!(!registry.is_running(id));
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn release_leaves_the_task_running() {
        let registry = CountdownRegistry::new();
        let id = Uuid::new_v4();
        registry.install(id, sleeper());

        let handle = registry.release(id).unwrap();
        assert!(!handle.is_finished());
        assert!(!registry.is_running(id));
        handle.abort();
    }

    #[test]
    fn gates_are_shared_per_match() {
        let registry = CountdownRegistry::new();
        let id = Uuid::new_v4();
        let gate = registry.gate(id);
        assert!(Arc::ptr_eq(&gate, &registry.gate(id)));
        assert!(!Arc::ptr_eq(&gate, &registry.gate(Uuid::new_v4())));

        registry.forget_gate(id);
        assert!(!Arc::ptr_eq(&gate, &registry.gate(id)));
    }
}
