//! crates/notification_core/src/store.rs
//!
//! The in-memory notification store for the active user.
//!
//! Records are kept newest first. The unread counter is never stored: it is
//! computed from the record set, so it cannot drift from what is rendered.

use std::collections::HashSet;

use crate::domain::{NotificationRecord, NotificationStatus};

#[derive(Debug, Default, Clone)]
pub struct NotificationStore {
    records: Vec<NotificationRecord>,
}

impl NotificationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Discards the current set and takes `records` in the given order.
    ///
    /// A batch containing the same id twice keeps the first position, with
    /// the most-read status of the duplicates.
    pub fn replace_all(&mut self, records: Vec<NotificationRecord>) {
        self.records.clear();
        let mut seen = HashSet::new();
        for record in records {
            if seen.insert(record.id.clone()) {
                self.records.push(record);
            } else if let Some(existing) = self.find_mut(&record.id) {
                existing.status = existing.status.max(record.status);
            }
        }
    }

    /// Inserts a new record at the head, or replaces an existing one in place.
    ///
    /// An existing record is only replaced when the incoming status is not
    /// less read: a late `unread` copy never reverts a read record.
    /// Returns `true` when the store changed.
    pub fn upsert(&mut self, record: NotificationRecord) -> bool {
        match self.find_mut(&record.id) {
            Some(existing) => {
                if record.status < existing.status || *existing == record {
                    return false;
                }
                *existing = record;
                true
            }
            None => {
                self.records.insert(0, record);
                true
            }
        }
    }

    /// Moves a record from unread to read. Unknown ids and read records are ignored.
    pub fn mark_read(&mut self, id: &str) -> bool {
        match self.find_mut(id) {
            Some(record) if record.is_unread() => {
                record.status = NotificationStatus::Read;
                true
            }
            _ => false,
        }
    }

    pub fn clear_all(&mut self) {
        self.records.clear();
    }

    pub fn snapshot(&self) -> Vec<NotificationRecord> {
        self.records.clone()
    }

    pub fn unread_count(&self) -> usize {
        self.records.iter().filter(|r| r.is_unread()).count()
    }

    pub fn get(&self, id: &str) -> Option<&NotificationRecord> {
        self.records.iter().find(|r| r.id == id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn find_mut(&mut self, id: &str) -> Option<&mut NotificationRecord> {
        self.records.iter_mut().find(|r| r.id == id)
    }
}
