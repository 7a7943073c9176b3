use crate::row::Row;

/// Messages from background tasks to the board UI.
#[derive(Debug, Clone)]
pub enum Command {
    SnapshotLoaded(Vec<Row>),
    LoadFailed(String),
}
