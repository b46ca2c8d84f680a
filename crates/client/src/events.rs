//! Structural change notifications.
//!
//! Observers are told about every contiguous insertion or deletion a settled
//! request produced. They run after the queue has rewritten its own state,
//! so the coordinates they see agree with the client's window.

use parking_lot::Mutex;
use sheetwire_protocol::{ChangeKind, Dimension, StructuralChange};

/// Receives structural changes, one method per kind of change.
///
/// Every method defaults to a no-op so observers implement only what they
/// care about.
pub trait StructuralChangeObserver: Send + Sync {
    fn rows_inserted(&self, _position: u32, _count: u32) {}
    fn rows_deleted(&self, _position: u32, _count: u32) {}
    fn columns_inserted(&self, _position: u32, _count: u32) {}
    fn columns_deleted(&self, _position: u32, _count: u32) {}
}

pub(crate) fn notify(observer: &dyn StructuralChangeObserver, change: &StructuralChange) {
    let StructuralChange { change: kind, dimension, position, count } = *change;
    match (kind, dimension) {
        (ChangeKind::Inserted, Dimension::Rows) => observer.rows_inserted(position, count),
        (ChangeKind::Deleted, Dimension::Rows) => observer.rows_deleted(position, count),
        (ChangeKind::Inserted, Dimension::Columns) => observer.columns_inserted(position, count),
        (ChangeKind::Deleted, Dimension::Columns) => observer.columns_deleted(position, count),
    }
}

/// Forwards every change into a channel, for hosts that prefer to poll.
impl StructuralChangeObserver for smol::channel::Sender<StructuralChange> {
    fn rows_inserted(&self, position: u32, count: u32) {
        let _ = self.try_send(StructuralChange::inserted(Dimension::Rows, position, count));
    }

    fn rows_deleted(&self, position: u32, count: u32) {
        let _ = self.try_send(StructuralChange::deleted(Dimension::Rows, position, count));
    }

    fn columns_inserted(&self, position: u32, count: u32) {
        let _ = self.try_send(StructuralChange::inserted(Dimension::Columns, position, count));
    }

    fn columns_deleted(&self, position: u32, count: u32) {
        let _ = self.try_send(StructuralChange::deleted(Dimension::Columns, position, count));
    }
}

/// Simple event collector for testing.
#[derive(Default)]
pub struct EventCollector {
    events: Mutex<Vec<StructuralChange>>,
}

impl EventCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<StructuralChange> {
        self.events.lock().clone()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }

    fn push(&self, change: StructuralChange) {
        self.events.lock().push(change);
    }
}

impl StructuralChangeObserver for EventCollector {
    fn rows_inserted(&self, position: u32, count: u32) {
        self.push(StructuralChange::inserted(Dimension::Rows, position, count));
    }

    fn rows_deleted(&self, position: u32, count: u32) {
        self.push(StructuralChange::deleted(Dimension::Rows, position, count));
    }

    fn columns_inserted(&self, position: u32, count: u32) {
        self.push(StructuralChange::inserted(Dimension::Columns, position, count));
    }

    fn columns_deleted(&self, position: u32, count: u32) {
        self.push(StructuralChange::deleted(Dimension::Columns, position, count));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notify_routes_by_kind() {
        let collector = EventCollector::new();
        notify(&collector, &StructuralChange::deleted(Dimension::Columns, 3, 2));
        notify(&collector, &StructuralChange::inserted(Dimension::Rows, 8, 1));

        assert_eq!(
            collector.events(),
            vec![
                StructuralChange::deleted(Dimension::Columns, 3, 2),
                StructuralChange::inserted(Dimension::Rows, 8, 1),
            ]
        );
        collector.clear();
        assert!(collector.is_empty());
    }

    #[test]
    fn test_channel_observer() {
        let (tx, rx) = smol::channel::unbounded();
        notify(&tx, &StructuralChange::inserted(Dimension::Columns, 5, 2));
        assert_eq!(rx.try_recv().unwrap(), StructuralChange::inserted(Dimension::Columns, 5, 2));
    }
}
