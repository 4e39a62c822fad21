use std::sync::{Arc, RwLock};

/// Latest analysis shared between the analysis and chat sides.
///
/// Clones share the same slot. Writes take the lock so concurrent
/// analyses serialize; whichever finishes last wins.
#[derive(Debug, Clone, Default)]
pub struct SharedContextStore {
    slot: Arc<RwLock<Option<String>>>,
}

impl SharedContextStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, analysis: impl Into<String>) {
        let mut slot = self.slot.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        *slot = Some(analysis.into());
    }

    pub fn get(&self) -> Option<String> {
        self.slot
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn clear(&self) {
        let mut slot = self.slot.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        *slot = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_one_slot() {
        let store = SharedContextStore::new();
        let other = store.clone();
        assert_eq!(store.get(), None);

        other.set("X");
        assert_eq!(store.get().as_deref(), Some("X"));

        store.set("Y");
        assert_eq!(other.get().as_deref(), Some("Y"));

        other.clear();
        assert_eq!(store.get(), None);
    }

    #[test]
    fn concurrent_writers_leave_one_complete_value() {
        let store = SharedContextStore::new();
        std::thread::scope(|scope| {
            for idx in 0..8 {
                let store = store.clone();
                scope.spawn(move || store.set(format!("analysis-{idx}")));
            }
        });
        let value = store.get().unwrap_or_default();
        assert!(value.starts_with("analysis-"));
    }
}
