use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::row::RowSnapshot;
use crate::store::RowStore;

/// Updates staged between two flushes, last write wins per symbol.
#[derive(Debug, Default)]
pub struct PendingUpdates {
    staged: HashMap<String, Arc<RowSnapshot>>,
}

impl PendingUpdates {
    /// Returns true when an earlier update for the same symbol was replaced.
    pub fn stage(&mut self, snapshot: Arc<RowSnapshot>) -> bool {
        self.staged
            .insert(snapshot.symbol().to_string(), snapshot)
            .is_some()
    }

    /// Empties the batch, yielding updates in load order.
    pub fn drain(&mut self) -> Vec<Arc<RowSnapshot>> {
        let mut drained: Vec<_> = self.staged.drain().map(|(_, snapshot)| snapshot).collect();
        drained.sort_by_key(|snapshot| snapshot.init_index);
        drained
    }

    pub fn len(&self) -> usize {
        self.staged.len()
    }

    pub fn is_empty(&self) -> bool {
        self.staged.is_empty()
    }
}

/// Rows currently handed to the UI layer. Only symbols inside the rendered
/// viewport have an entry.
#[derive(Debug, Default)]
pub struct ViewCache {
    rows: HashMap<String, Arc<RowSnapshot>>,
}

impl ViewCache {
    /// Keeps entries for `visible` only. Rows entering the viewport are
    /// seeded from the store so they show current data.
    pub fn sync_viewport<'a>(
        &mut self,
        visible: impl IntoIterator<Item = &'a String>,
        store: &RowStore,
    ) {
        let visible: HashSet<&String> = visible.into_iter().collect();
        self.rows.retain(|symbol, _| visible.contains(symbol));
        for symbol in visible {
            if self.rows.contains_key(symbol) {
                continue;
            }
            if let Some(snapshot) = store.get(symbol) {
                self.rows.insert(symbol.clone(), Arc::clone(snapshot));
            }
        }
    }

    pub fn is_visible(&self, symbol: &str) -> bool {
        self.rows.contains_key(symbol)
    }

    /// Replaces the displayed row. Ignored when the symbol is not visible.
    pub fn apply(&mut self, snapshot: Arc<RowSnapshot>) -> bool {
        match self.rows.get_mut(snapshot.symbol()) {
            Some(slot) => {
                *slot = snapshot;
                true
            }
            None => false,
        }
    }

    pub fn get(&self, symbol: &str) -> Option<&Arc<RowSnapshot>> {
        self.rows.get(symbol)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::row::Row;

    fn snapshot(symbol: &str, init_index: usize, last: f64) -> Arc<RowSnapshot> {
        let mut row = Row::new(symbol);
        row.last = last;
        Arc::new(RowSnapshot::loaded(row, init_index))
    }

    #[test]
    fn last_write_wins_within_a_batch() {
        let mut pending = PendingUpdates::default();
        assert!(!pending.stage(snapshot("A", 0, 1.0)));
        assert!(!pending.stage(snapshot("B", 1, 1.0)));
        assert!(pending.stage(snapshot("A", 0, 2.0)));
        assert_eq!(pending.len(), 2);

        let drained = pending.drain();
        assert!(pending.is_empty());
        let symbols: Vec<_> = drained.iter().map(|s| s.symbol().to_string()).collect();
        assert_eq!(symbols, ["A", "B"]);
        assert_eq!(drained[0].row.last, 2.0);
    }

    #[test]
    fn viewport_sync_evicts_hidden_and_seeds_new_rows() {
        let store = RowStore::from_rows(vec![Row::new("A"), Row::new("B"), Row::new("C")]);
        let mut view = ViewCache::default();
        let first = ["A".to_string(), "B".to_string()];
        view.sync_viewport(first.iter(), &store);
        assert!(view.is_visible("A") && view.is_visible("B"));
        assert!(!view.is_visible("C"));

        let second = ["B".to_string(), "C".to_string()];
        view.sync_viewport(second.iter(), &store);
        assert!(!view.is_visible("A"));
        assert!(view.is_visible("C"));
        assert_eq!(view.len(), 2);
    }

    #[test]
    fn apply_ignores_rows_outside_viewport() {
        let store = RowStore::from_rows(vec![Row::new("A"), Row::new("B")]);
        let mut view = ViewCache::default();
        let visible = ["A".to_string()];
        view.sync_viewport(visible.iter(), &store);

        assert!(view.apply(snapshot("A", 0, 7.0)));
        assert!(!view.apply(snapshot("B", 1, 7.0)));
        assert_eq!(view.get("A").map(|s| s.row.last), Some(7.0));
        assert!(view.get("B").is_none());
    }
}
