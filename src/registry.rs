//! Process-wide task registry.
//!
//! Tracks the active backup and restore tasks by id and name, plus the
//! reverse segment -> backup index the copy path uses to find its
//! destination. Evicted wholesale when the engine closes.

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

#[derive(Default)]
struct RegistryState {
    backup_name_to_id: HashMap<String, String>,
    backup_ids: HashSet<String>,
    restore_ids: HashSet<String>,
    segment_to_backup: HashMap<i64, String>,
}

#[derive(Default)]
pub struct TaskRegistry {
    state: RwLock<RegistryState>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_backup(&self, name: &str, id: &str) {
        let mut state = self.state.write().unwrap();
        state.backup_name_to_id.insert(name.to_string(), id.to_string());
        state.backup_ids.insert(id.to_string());
    }

    pub fn backup_id_by_name(&self, name: &str) -> Option<String> {
        self.state.read().unwrap().backup_name_to_id.get(name).cloned()
    }

    pub fn contains_backup(&self, id: &str) -> bool {
        self.state.read().unwrap().backup_ids.contains(id)
    }

    pub fn unregister_backup(&self, name: &str, id: &str) {
        let mut state = self.state.write().unwrap();
        state.backup_name_to_id.remove(name);
        state.backup_ids.remove(id);
        state.segment_to_backup.retain(|_, backup_id| backup_id != id);
    }

    pub fn register_restore(&self, id: &str) {
        self.state.write().unwrap().restore_ids.insert(id.to_string());
    }

    pub fn contains_restore(&self, id: &str) -> bool {
        self.state.read().unwrap().restore_ids.contains(id)
    }

    pub fn register_segment(&self, segment_id: i64, backup_id: &str) {
        self.state
            .write()
            .unwrap()
            .segment_to_backup
            .insert(segment_id, backup_id.to_string());
    }

    pub fn backup_id_by_segment(&self, segment_id: i64) -> Option<String> {
        self.state
            .read()
            .unwrap()
            .segment_to_backup
            .get(&segment_id)
            .cloned()
    }

    pub fn clear(&self) {
        let mut state = self.state.write().unwrap();
        *state = RegistryState::default();
    }
}
