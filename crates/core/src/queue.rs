use std::collections::VecDeque;

use crate::logger;
use crate::types::KeyId;

/// Hard cap on waiting macros. Reaching it means a runaway profile.
pub const MAX_QUEUE_SIZE: usize = 1000;

/// The single execution slot plus the FIFO of macros waiting for it.
#[derive(Debug, Default)]
pub struct QueueManager {
    slot: Option<KeyId>,
    queue: VecDeque<KeyId>,
}

impl QueueManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_slot_free(&self) -> bool {
        self.slot.is_none()
    }

    pub fn slot(&self) -> Option<KeyId> {
        self.slot
    }

    pub fn set_slot(&mut self, key_id: Option<KeyId>) {
        match key_id {
            Some(id) => logger::info_p("queue", &format!("slot = {}", id)),
            None => logger::info_p("queue", "slot freed"),
        }
        self.slot = key_id;
    }

    pub fn free_slot(&mut self) {
        self.set_slot(None);
    }

    /// Append `key_id` unless it is already waiting.
    /// Returns false only when the queue is full and `key_id` is new.
    pub fn try_add_to_queue(&mut self, key_id: KeyId) -> bool {
        if self.queue.contains(&key_id) {
            return true;
        }
        if self.queue.len() >= MAX_QUEUE_SIZE {
            logger::error_p("queue", &format!("overflow adding {} (size {})", key_id, self.queue.len()));
            return false;
        }
        self.queue.push_back(key_id);
        logger::info_p("queue", &format!("{} queued (position {})", key_id, self.queue.len()));
        true
    }

    pub fn pop_next_from_queue(&mut self) -> Option<KeyId> {
        self.queue.pop_front()
    }

    /// Remove every occurrence of `key_id`. Returns whether anything went.
    pub fn remove_from_queue(&mut self, key_id: KeyId) -> bool {
        let before = self.queue.len();
        self.queue.retain(|&id| id != key_id);
        let removed = self.queue.len() != before;
        if removed {
            logger::info_p("queue", &format!("{} removed from queue", key_id));
        }
        removed
    }

    pub fn is_in_queue(&self, key_id: KeyId) -> bool {
        self.queue.contains(&key_id)
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn queue_items(&self) -> Vec<KeyId> {
        self.queue.iter().copied().collect()
    }

    /// Empty slot and queue unconditionally.
    pub fn clear_all(&mut self) {
        if self.slot.is_some() || !self.queue.is_empty() {
            logger::info_p("queue", &format!("clearing slot and {} queued", self.queue.len()));
        }
        self.slot = None;
        self.queue.clear();
    }
}
