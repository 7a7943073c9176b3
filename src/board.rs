use std::sync::Arc;
use std::time::Instant;

use rand::Rng;

use crate::batch::{PendingUpdates, ViewCache};
use crate::generator;
use crate::pin::{PinLedger, PinState};
use crate::row::{Row, RowSnapshot};
use crate::store::{BoardError, RowStore};

/// One-shot flash expiry owed for a row that was just pushed to the view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledExpiry {
    pub symbol: String,
    pub revision: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BoardStats {
    pub ticks: u64,
    pub coalesced: u64,
    pub flushes: u64,
    pub applied: u64,
    pub expired: u64,
    pub swallowed: u64,
}

/// View-owned state of the price board. Timers never hold it; they send
/// events and the owning loop calls in here.
#[derive(Debug)]
pub struct Board {
    store: RowStore,
    pins: PinLedger,
    pending: PendingUpdates,
    view: ViewCache,
    stats: BoardStats,
}

impl Board {
    pub fn new(rows: Vec<Row>) -> Board {
        let store = RowStore::from_rows(rows);
        let pins = PinLedger::new(&store);
        Board {
            store,
            pins,
            pending: PendingUpdates::default(),
            view: ViewCache::default(),
            stats: BoardStats::default(),
        }
    }

    pub fn store(&self) -> &RowStore {
        &self.store
    }

    pub fn pins(&self) -> &PinLedger {
        &self.pins
    }

    pub fn stats(&self) -> BoardStats {
        self.stats
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Pinned symbols followed by the main sequence.
    pub fn display_order(&self) -> impl Iterator<Item = &String> {
        self.pins.pinned().iter().chain(self.pins.main().iter())
    }

    /// Perturbs one uniformly chosen row, pinned or not.
    pub fn incoming_tick<R: Rng>(&mut self, rng: &mut R, now: Instant) -> Result<String, BoardError> {
        if self.store.is_empty() {
            return Err(BoardError::Empty);
        }
        let idx = rng.random_range(0..self.store.len());
        let symbol = self.store.symbols()[idx].clone();
        self.stage_update(&symbol, rng, now)?;
        Ok(symbol)
    }

    /// Swaps a perturbed snapshot into the store and stages it for the next flush.
    pub fn stage_update<R: Rng>(
        &mut self,
        symbol: &str,
        rng: &mut R,
        now: Instant,
    ) -> Result<Arc<RowSnapshot>, BoardError> {
        let current = self.store.try_get(symbol)?;
        let next = Arc::new(generator::perturb(rng, current, now));
        self.store.replace(Arc::clone(&next))?;
        if self.pending.stage(Arc::clone(&next)) {
            self.stats.coalesced += 1;
        }
        self.stats.ticks += 1;
        Ok(next)
    }

    /// Drains staged updates into the view. Only visible rows reach the UI
    /// layer; each of them owes a flash expiry.
    pub fn flush(&mut self) -> Vec<ScheduledExpiry> {
        if self.pending.is_empty() {
            return Vec::new();
        }
        self.stats.flushes += 1;
        let mut expiries = Vec::new();
        for snapshot in self.pending.drain() {
            let expiry = ScheduledExpiry {
                symbol: snapshot.symbol().to_string(),
                revision: snapshot.revision,
            };
            if self.view.apply(snapshot) {
                self.stats.applied += 1;
                expiries.push(expiry);
            }
        }
        expiries
    }

    /// Clears the change set left by `revision`. Returns false when a newer
    /// update has replaced that revision.
    pub fn expire_flash(&mut self, symbol: &str, revision: u64) -> Result<bool, BoardError> {
        let current = self.store.try_get(symbol)?;
        if current.revision != revision || current.changes.is_none() {
            return Ok(false);
        }
        let cleared = Arc::new(current.without_changes());
        self.store.replace(Arc::clone(&cleared))?;
        if self
            .view
            .get(symbol)
            .is_some_and(|shown| shown.revision == revision)
        {
            self.view.apply(cleared);
        }
        self.stats.expired += 1;
        Ok(true)
    }

    pub fn toggle_pin(&mut self, symbol: &str) -> Result<PinState, BoardError> {
        self.pins.toggle(symbol, &self.store)
    }

    /// Records the rows the UI is rendering right now.
    pub fn set_viewport<'a>(&mut self, visible: impl IntoIterator<Item = &'a String>) {
        self.view.sync_viewport(visible, &self.store);
    }

    pub fn is_visible(&self, symbol: &str) -> bool {
        self.view.is_visible(symbol)
    }

    /// Row as the UI should draw it: the view copy when visible, else the store.
    pub fn display_row(&self, symbol: &str) -> Option<&Arc<RowSnapshot>> {
        self.view.get(symbol).or_else(|| self.store.get(symbol))
    }

    pub fn record_swallowed(&mut self) {
        self.stats.swallowed += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn rows(symbols: &[&str]) -> Vec<Row> {
        symbols
            .iter()
            .map(|s| {
                let mut row = Row::new(*s);
                row.open = 1_000.0;
                row.last = 1_000.0;
                row
            })
            .collect()
    }

    fn visible(symbols: &[&str]) -> Vec<String> {
        symbols.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn hidden_rows_update_store_but_not_view() {
        let mut board = Board::new(rows(&["A", "B"]));
        let mut rng = StdRng::seed_from_u64(1);
        board.set_viewport(visible(&["A"]).iter());

        let now = Instant::now();
        let a = board.stage_update("A", &mut rng, now).expect("A is known");
        let b = board.stage_update("B", &mut rng, now).expect("B is known");
        assert_eq!(board.pending_len(), 2);

        let expiries = board.flush();
        assert_eq!(
            expiries,
            vec![ScheduledExpiry {
                symbol: "A".to_string(),
                revision: a.revision
            }]
        );
        assert_eq!(board.pending_len(), 0);
        assert_eq!(board.display_row("A").map(|s| s.revision), Some(a.revision));
        assert_eq!(board.store().get("B").map(|s| s.revision), Some(b.revision));

        board.set_viewport(visible(&["A", "B"]).iter());
        assert_eq!(board.display_row("B").map(|s| s.revision), Some(b.revision));
    }

    #[test]
    fn view_lags_store_until_flush() {
        let mut board = Board::new(rows(&["A"]));
        let mut rng = StdRng::seed_from_u64(2);
        board.set_viewport(visible(&["A"]).iter());
        board.stage_update("A", &mut rng, Instant::now()).expect("A is known");
        assert_eq!(board.display_row("A").map(|s| s.revision), Some(0));
        assert_eq!(board.store().get("A").map(|s| s.revision), Some(1));
        board.flush();
        assert_eq!(board.display_row("A").map(|s| s.revision), Some(1));
    }

    #[test]
    fn repeated_updates_coalesce_into_one_flush_entry() {
        let mut board = Board::new(rows(&["A"]));
        let mut rng = StdRng::seed_from_u64(3);
        board.set_viewport(visible(&["A"]).iter());
        let now = Instant::now();
        for _ in 0..5 {
            board.stage_update("A", &mut rng, now).expect("A is known");
        }
        assert_eq!(board.pending_len(), 1);
        let expiries = board.flush();
        assert_eq!(expiries.len(), 1);
        assert_eq!(expiries[0].revision, 5);
        let stats = board.stats();
        assert_eq!(stats.ticks, 5);
        assert_eq!(stats.coalesced, 4);
        assert_eq!(stats.applied, 1);
    }

    #[test]
    fn expiry_clears_changes_but_keeps_directions() {
        let mut board = Board::new(rows(&["A"]));
        let mut rng = StdRng::seed_from_u64(4);
        board.set_viewport(visible(&["A"]).iter());
        board.stage_update("A", &mut rng, Instant::now()).expect("A is known");
        let expiry = board.flush().pop().expect("A is visible");
        let directions = board.store().get("A").map(|s| s.directions.clone());

        assert_eq!(board.expire_flash(&expiry.symbol, expiry.revision), Ok(true));
        let shown = board.display_row("A").expect("A is loaded");
        assert!(shown.changes.is_none());
        assert!(shown.last_update.is_none());
        assert_eq!(Some(shown.directions.clone()), directions);
        assert_eq!(board.expire_flash("A", expiry.revision), Ok(false));
    }

    #[test]
    fn stale_expiry_leaves_newer_update_alone() {
        let mut board = Board::new(rows(&["A"]));
        let mut rng = StdRng::seed_from_u64(5);
        board.set_viewport(visible(&["A"]).iter());
        let now = Instant::now();
        board.stage_update("A", &mut rng, now).expect("A is known");
        let expiry = board.flush().pop().expect("A is visible");
        board.stage_update("A", &mut rng, now).expect("A is known");

        assert_eq!(board.expire_flash("A", expiry.revision), Ok(false));
        assert!(board.store().get("A").is_some_and(|s| s.changes.is_some()));
    }

    #[test]
    fn pinned_rows_still_receive_ticks() {
        let mut board = Board::new(rows(&["A", "B", "C"]));
        let mut rng = StdRng::seed_from_u64(6);
        assert_eq!(board.toggle_pin("B"), Ok(PinState::Pinned));
        let order: Vec<_> = board.display_order().cloned().collect();
        assert_eq!(order, ["B", "A", "C"]);

        board.set_viewport(visible(&["B"]).iter());
        let next = board.stage_update("B", &mut rng, Instant::now()).expect("B is known");
        board.flush();
        assert_eq!(board.display_row("B").map(|s| s.revision), Some(next.revision));

        assert_eq!(board.toggle_pin("B"), Ok(PinState::Unpinned));
        assert_eq!(board.pins().main(), ["A", "B", "C"]);
        assert_eq!(board.store().get("B").map(|s| s.revision), Some(next.revision));
    }

    #[test]
    fn incoming_tick_touches_known_symbols() {
        let mut board = Board::new(rows(&["A", "B", "C"]));
        let mut rng = StdRng::seed_from_u64(7);
        let now = Instant::now();
        for _ in 0..100 {
            let symbol = board.incoming_tick(&mut rng, now).expect("store is not empty");
            assert!(board.store().get(&symbol).is_some());
        }
        assert_eq!(board.stats().ticks, 100);
        let total: u64 = board
            .store()
            .symbols()
            .iter()
            .filter_map(|s| board.store().get(s))
            .map(|s| s.revision)
            .sum();
        assert_eq!(total, 100);
    }

    #[test]
    fn empty_board_and_unknown_symbols_are_errors() {
        let mut board = Board::new(Vec::new());
        let mut rng = StdRng::seed_from_u64(8);
        assert_eq!(
            board.incoming_tick(&mut rng, Instant::now()),
            Err(BoardError::Empty)
        );
        assert!(board.flush().is_empty());
        assert!(matches!(
            board.stage_update("Z", &mut rng, Instant::now()),
            Err(BoardError::UnknownSymbol(_))
        ));
        assert!(board.expire_flash("Z", 1).is_err());
    }
}
