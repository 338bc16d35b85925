use std::collections::{HashMap, HashSet};

use tracing::{debug, trace};
use uuid::Uuid;

use crate::types::{Notification, NotificationId};

/// How much the store knows about the notification list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListState {
    /// Never fetched; the pushed count is the only authority.
    Unknown,
    /// Last snapshot agrees with the count.
    Known,
    /// A pushed count disagreed with the list; a refresh is due.
    Stale,
}

/// Handle for an optimistic mark awaiting server confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PendingMark {
    id: Uuid,
}

#[derive(Debug, Clone)]
struct PendingEntry {
    flipped: Vec<NotificationId>,
    decremented: u64,
}

/// Single source of truth for the unread count and the dropdown list.
///
/// Every operation restores the count/list invariant before returning: while the
/// list is [`ListState::Known`], `unread_count` equals the number of unread items.
#[derive(Debug, Clone)]
pub struct NotificationStore {
    items: Vec<Notification>,
    list_state: ListState,
    unread_count: u64,
    pending: HashMap<PendingMark, PendingEntry>,
}

impl Default for NotificationStore {
    fn default() -> Self {
        Self::new()
    }
}

impl NotificationStore {
    pub fn new() -> Self {
        Self {
            items: Vec::new(),
            list_state: ListState::Unknown,
            unread_count: 0,
            pending: HashMap::new(),
        }
    }

    /// Current items in server order.
    pub fn items(&self) -> &[Notification] {
        &self.items
    }

    pub fn unread_count(&self) -> u64 {
        self.unread_count
    }

    pub fn list_state(&self) -> ListState {
        self.list_state
    }

    pub fn get(&self, id: &NotificationId) -> Option<&Notification> {
        self.items.iter().find(|item| &item.id == id)
    }

    pub fn pending_marks(&self) -> usize {
        self.pending.len()
    }

    /// Apply an authoritative count push.
    ///
    /// Returns `true` when the known list no longer agrees with the count and
    /// should be refreshed.
    pub fn apply_server_count(&mut self, count: u64) -> bool {
        self.unread_count = count;
        // A pushed count supersedes optimistic decrements; rollback restores flags only.
        for entry in self.pending.values_mut() {
            entry.decremented = 0;
        }
        match self.list_state {
            ListState::Unknown => false,
            ListState::Known | ListState::Stale => {
                let tally = self.unread_tally();
                self.list_state = if tally == count {
                    ListState::Known
                } else {
                    ListState::Stale
                };
                trace!(count, tally, state = ?self.list_state, "applied server count");
                self.list_state == ListState::Stale
            }
        }
    }

    /// Replace the list with an authoritative snapshot (last write wins).
    pub fn apply_server_list(&mut self, items: Vec<Notification>) {
        let mut seen = HashSet::new();
        self.items = items
            .into_iter()
            .filter(|item| seen.insert(item.id.clone()))
            .collect();
        self.list_state = ListState::Known;
        self.unread_count = self.unread_tally();

        if !self.pending.is_empty() {
            debug!(
                superseded = self.pending.len(),
                "server snapshot superseded pending marks"
            );
            self.pending.clear();
        }
    }

    /// Optimistically mark one item read.
    ///
    /// Unknown ids and already-read items are a no-op returning `None`.
    pub fn mark_read_locally(&mut self, id: &NotificationId) -> Option<PendingMark> {
        let item = self.items.iter_mut().find(|item| &item.id == id)?;
        if item.read {
            return None;
        }
        item.read = true;

        let decremented = u64::from(self.unread_count > 0);
        self.unread_count -= decremented;
        Some(self.track(vec![id.clone()], decremented))
    }

    /// Optimistically mark every item read and zero the count.
    pub fn mark_all_read_locally(&mut self) -> Option<PendingMark> {
        let flipped: Vec<NotificationId> = self
            .items
            .iter_mut()
            .filter(|item| !item.read)
            .map(|item| {
                item.read = true;
                item.id.clone()
            })
            .collect();

        if flipped.is_empty() && self.unread_count == 0 {
            return None;
        }

        let decremented = self.unread_count;
        self.unread_count = 0;
        Some(self.track(flipped, decremented))
    }

    /// Server accepted the mark; the read flags become final.
    pub fn confirm(&mut self, mark: PendingMark) -> bool {
        self.pending.remove(&mark).is_some()
    }

    /// Server rejected the mark; restore the previous flags and count.
    ///
    /// Returns `false` when a newer snapshot already superseded the mark.
    pub fn rollback(&mut self, mark: PendingMark) -> bool {
        let Some(entry) = self.pending.remove(&mark) else {
            return false;
        };

        for id in &entry.flipped {
            if let Some(item) = self.items.iter_mut().find(|item| &item.id == id) {
                item.read = false;
            }
        }

        self.unread_count = match self.list_state {
            ListState::Known => self.unread_tally(),
            ListState::Unknown | ListState::Stale => {
                self.unread_count.saturating_add(entry.decremented)
            }
        };
        true
    }

    fn track(&mut self, flipped: Vec<NotificationId>, decremented: u64) -> PendingMark {
        let mark = PendingMark { id: Uuid::new_v4() };
        self.pending.insert(
            mark,
            PendingEntry {
                flipped,
                decremented,
            },
        );
        mark
    }

    fn unread_tally(&self) -> u64 {
        self.items.iter().filter(|item| !item.read).count() as u64
    }
}
