use dashmap::DashMap;
use std::sync::atomic::{AtomicUsize, Ordering::SeqCst};

use crate::types::Task;

/// Class name to id mapping shared by every task of a run
///
/// Ids are handed out in first-seen order. A registry created from an explicit label
/// list is frozen: lookups of other labels return `None`.
#[derive(Debug, Default)]
pub struct ClassRegistry {
    ids: DashMap<String, usize>,
    next_id: AtomicUsize,
    frozen: bool,
}

impl ClassRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry that only knows `labels`, numbered by their position
    pub fn with_labels<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let registry = Self::new();
        for label in labels {
            registry.insert(label.into());
        }
        Self {
            frozen: true,
            ..registry
        }
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// Look up `label`, assigning the next free id when it is new
    pub fn get_or_insert(&self, label: &str) -> Option<usize> {
        if let Some(id) = self.ids.get(label) {
            return Some(*id);
        }
        if self.frozen {
            return None;
        }
        Some(self.insert(label.to_string()))
    }

    pub fn get(&self, label: &str) -> Option<usize> {
        self.ids.get(label).map(|id| *id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Register every label of `tasks` in payload order
    ///
    /// Run this before processing tasks in parallel so that ids do not depend on
    /// worker scheduling.
    pub fn seed_from_tasks(&self, tasks: &[Task]) {
        if self.frozen {
            return;
        }
        tasks
            .iter()
            .flat_map(|task| task.annotations.iter())
            .filter_map(|annotation| annotation.label.as_deref())
            .for_each(|label| {
                self.get_or_insert(label);
            });
    }

    /// Labels sorted by id
    pub fn names(&self) -> Vec<String> {
        let mut sorted: Vec<_> = self
            .ids
            .iter()
            .map(|entry| (entry.key().clone(), *entry.value()))
            .collect();
        sorted.sort_by_key(|&(_, id)| id);
        sorted.into_iter().map(|(label, _)| label).collect()
    }

    fn insert(&self, label: String) -> usize {
        // The entry guard holds the shard lock, so two workers racing on the same new
        // label get the same id
        *self
            .ids
            .entry(label)
            .or_insert_with(|| self.next_id.fetch_add(1, SeqCst))
    }
}
