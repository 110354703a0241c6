//! Bounded per-frame history

use rfscene_core::types::FrameId;
use std::collections::BTreeMap;

/// Frame-keyed history that evicts its oldest entries beyond `capacity`
#[derive(Debug, Clone)]
pub struct FrameHistory<T> {
    entries: BTreeMap<FrameId, T>,
    capacity: usize,
}

impl<T> FrameHistory<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: BTreeMap::new(),
            capacity: capacity.max(1),
        }
    }

    pub fn insert(&mut self, frame_id: FrameId, value: T) {
        self.entries.insert(frame_id, value);
        while self.entries.len() > self.capacity {
            if self.entries.pop_first().is_none() {
                break;
            }
        }
    }

    pub fn get(&self, frame_id: FrameId) -> Option<&T> {
        self.entries.get(&frame_id)
    }

    /// Entry stored for the frame before `frame_id`
    pub fn previous(&self, frame_id: FrameId) -> Option<&T> {
        frame_id.checked_sub(1).and_then(|prev| self.entries.get(&prev))
    }

    pub fn latest(&self) -> Option<(FrameId, &T)> {
        self.entries.iter().next_back().map(|(id, v)| (*id, v))
    }

    pub fn frame_ids(&self) -> impl Iterator<Item = FrameId> + '_ {
        self.entries.keys().copied()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eviction_keeps_newest() {
        let mut h = FrameHistory::new(3);
        for id in 1..=5 {
            h.insert(id, id * 10);
        }
        assert_eq!(h.len(), 3);
        assert_eq!(h.frame_ids().collect::<Vec<_>>(), vec![3, 4, 5]);
        assert!(h.get(2).is_none());
        assert_eq!(h.latest(), Some((5, &50)));
    }

    #[test]
    fn test_previous_lookup() {
        let mut h = FrameHistory::new(10);
        assert!(h.previous(1).is_none());
        h.insert(1, "a");
        h.insert(2, "b");
        assert_eq!(h.previous(2), Some(&"a"));
        assert_eq!(h.previous(3), Some(&"b"));
        assert!(h.previous(1).is_none());
        assert!(h.previous(0).is_none());
        h.clear();
        assert!(h.previous(3).is_none());
    }
}
