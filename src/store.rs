use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;

use thiserror::Error;

use crate::row::{Row, RowSnapshot};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BoardError {
    #[error("unknown symbol {0}")]
    UnknownSymbol(String),
    #[error("no rows loaded")]
    Empty,
}

/// Authoritative symbol -> snapshot map. Symbols are fixed at load time.
#[derive(Debug, Default)]
pub struct RowStore {
    rows: HashMap<String, Arc<RowSnapshot>>,
    order: Vec<String>,
}

impl RowStore {
    /// Builds the store from a bulk snapshot. The first occurrence of a
    /// symbol wins; later duplicates are dropped.
    pub fn from_rows(rows: Vec<Row>) -> RowStore {
        let mut store = RowStore {
            rows: HashMap::with_capacity(rows.len()),
            order: Vec::with_capacity(rows.len()),
        };
        for row in rows {
            let init_index = store.order.len();
            match store.rows.entry(row.symbol().to_string()) {
                Entry::Occupied(entry) => {
                    tracing::warn!(symbol = %entry.key(), "dropping duplicate row from snapshot");
                }
                Entry::Vacant(entry) => {
                    store.order.push(entry.key().clone());
                    entry.insert(Arc::new(RowSnapshot::loaded(row.normalized(), init_index)));
                }
            }
        }
        store
    }

    pub fn get(&self, symbol: &str) -> Option<&Arc<RowSnapshot>> {
        self.rows.get(symbol)
    }

    pub fn try_get(&self, symbol: &str) -> Result<&Arc<RowSnapshot>, BoardError> {
        self.rows
            .get(symbol)
            .ok_or_else(|| BoardError::UnknownSymbol(symbol.to_string()))
    }

    /// Swaps in a newer snapshot for an existing symbol.
    pub fn replace(&mut self, snapshot: Arc<RowSnapshot>) -> Result<(), BoardError> {
        match self.rows.get_mut(snapshot.symbol()) {
            Some(slot) => {
                *slot = snapshot;
                Ok(())
            }
            None => Err(BoardError::UnknownSymbol(snapshot.symbol().to_string())),
        }
    }

    pub fn init_index(&self, symbol: &str) -> Option<usize> {
        self.rows.get(symbol).map(|snapshot| snapshot.init_index)
    }

    /// Symbols in load order.
    pub fn symbols(&self) -> &[String] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}
