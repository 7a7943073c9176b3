use crate::store::{BoardError, RowStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinState {
    Pinned,
    Unpinned,
}

/// Ordering index over the store: the main sequence plus the pinned
/// overlay, most recently pinned first. Row data stays in [`RowStore`].
#[derive(Debug, Clone, Default)]
pub struct PinLedger {
    main: Vec<String>,
    pinned: Vec<String>,
}

impl PinLedger {
    pub fn new(store: &RowStore) -> PinLedger {
        PinLedger {
            main: store.symbols().to_vec(),
            pinned: Vec::new(),
        }
    }

    pub fn main(&self) -> &[String] {
        &self.main
    }

    pub fn pinned(&self) -> &[String] {
        &self.pinned
    }

    pub fn is_pinned(&self, symbol: &str) -> bool {
        self.pinned.iter().any(|s| s == symbol)
    }

    /// Pins an unpinned symbol or restores a pinned one to its load-order slot.
    pub fn toggle(&mut self, symbol: &str, store: &RowStore) -> Result<PinState, BoardError> {
        let init_index = store
            .init_index(symbol)
            .ok_or_else(|| BoardError::UnknownSymbol(symbol.to_string()))?;

        if let Some(pos) = self.pinned.iter().position(|s| s == symbol) {
            let entry = self.pinned.remove(pos);
            let insert_at = self
                .main
                .iter()
                .position(|s| store.init_index(s).unwrap_or(usize::MAX) > init_index)
                .unwrap_or(self.main.len());
            self.main.insert(insert_at, entry);
            return Ok(PinState::Unpinned);
        }

        let entry = match self.main.iter().position(|s| s == symbol) {
            Some(pos) => self.main.remove(pos),
            None => symbol.to_string(),
        };
        self.pinned.insert(0, entry);
        Ok(PinState::Pinned)
    }
}
