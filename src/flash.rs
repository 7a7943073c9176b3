use std::time::{Duration, Instant};

use crate::row::{ChangeSet, Direction, DirectionMap, Field, RowSnapshot};

pub const FLASH_DURATION: Duration = Duration::from_millis(350);
/// Extra delay before a row's change set is cleared after its flash window.
pub const EXPIRY_GRACE: Duration = Duration::from_millis(40);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellState {
    /// Persistent colour from the direction map.
    pub tone: Direction,
    /// Direction of the transient highlight, if still inside the flash window.
    pub flash: Option<Direction>,
}

pub fn persistent_tone(directions: &DirectionMap, field: Field) -> Direction {
    directions.get(&field).copied().unwrap_or(Direction::Neutral)
}

pub fn active_flash(
    changes: Option<&ChangeSet>,
    last_update: Option<Instant>,
    field: Field,
    now: Instant,
    window: Duration,
) -> Option<Direction> {
    let direction = changes?.get(&field).copied()?;
    let last_update = last_update?;
    if now.saturating_duration_since(last_update) < window {
        Some(direction)
    } else {
        None
    }
}

pub fn cell_state(snapshot: &RowSnapshot, field: Field, now: Instant, window: Duration) -> CellState {
    // A last price that never moved is coloured by the session change.
    let tone = if field == Field::Last && !snapshot.directions.contains_key(&field) {
        Direction::from_sign(snapshot.row.change)
    } else {
        persistent_tone(&snapshot.directions, field)
    };
    CellState {
        tone,
        flash: active_flash(
            snapshot.changes.as_ref(),
            snapshot.last_update,
            field,
            now,
            window,
        ),
    }
}
