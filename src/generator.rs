use std::time::Instant;

use rand::Rng;

use crate::row::{
    BOOK_DEPTH, ChangeSet, Direction, Field, LevelPart, PRICE_UNIT, Row, RowSnapshot, Side,
};

const TOP_PRICE_CHANCE: f64 = 0.25;
const LAST_TICK_CHANCE: f64 = 0.9;
const LAST_STEP_CHANCE: f64 = 0.4;
const LAST_JUMP_CHANCE: f64 = 0.02;
const LAST_JUMP_UNITS: f64 = 5.0;
const MAX_VOLUME_INCREMENT: u32 = 5000;
const BOOK_SIZE_CHANCE: f64 = 0.6;
const BOOK_SIZE_SPAN: f64 = 3000.0;
const BOOK_PRICE_CHANCE: f64 = 0.2;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Adjustment {
    pub field: Field,
    pub delta: f64,
}

/// Random draws for one tick, separated from their application so the
/// update itself is deterministic.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickPlan {
    /// Top-level price moves, applied before the last price.
    pub prices: Vec<Adjustment>,
    /// `None` leaves the last price untouched this tick.
    pub last_delta: Option<f64>,
    pub volume_increment: f64,
    /// Order-book moves, applied after volume and value.
    pub book: Vec<Adjustment>,
}

impl TickPlan {
    pub fn draw<R: Rng>(rng: &mut R, row: &Row) -> TickPlan {
        let mut prices = Vec::new();
        for field in Field::TOP_PRICES {
            if rng.random_bool(TOP_PRICE_CHANCE) {
                let steps = rng.random_range(1..=3) as f64;
                prices.push(Adjustment {
                    field,
                    delta: random_sign(rng) * steps * PRICE_UNIT,
                });
            }
        }

        let last_delta = if rng.random_bool(LAST_TICK_CHANCE) {
            let step = if rng.random_bool(LAST_STEP_CHANCE) {
                random_sign(rng) * PRICE_UNIT
            } else {
                0.0
            };
            let jump = if rng.random_bool(LAST_JUMP_CHANCE) {
                random_sign(rng) * LAST_JUMP_UNITS * PRICE_UNIT
            } else {
                0.0
            };
            Some(step + jump)
        } else {
            None
        };

        let volume_increment = rng.random_range(0..MAX_VOLUME_INCREMENT) as f64;

        let mut book = Vec::new();
        for level in 0..BOOK_DEPTH {
            for side in [Side::Bid, Side::Ask] {
                if level >= row.side(side).len() {
                    continue;
                }
                let level = level as u8;
                if rng.random_bool(BOOK_SIZE_CHANCE) {
                    let delta = ((rng.random::<f64>() - 0.5) * BOOK_SIZE_SPAN).floor();
                    book.push(Adjustment {
                        field: Field::Book(side, level, LevelPart::Volume),
                        delta,
                    });
                }
                if rng.random_bool(BOOK_PRICE_CHANCE) {
                    book.push(Adjustment {
                        field: Field::Book(side, level, LevelPart::Price),
                        delta: random_sign(rng) * PRICE_UNIT,
                    });
                }
            }
        }

        TickPlan {
            prices,
            last_delta,
            volume_increment,
            book,
        }
    }

    /// Builds the next snapshot of `old`. Every touched field lands in the
    /// change set; the direction map keeps old entries unless a field moved.
    pub fn apply(&self, old: &RowSnapshot, now: Instant) -> RowSnapshot {
        let mut row = old.row.clone();
        let mut changes = ChangeSet::new();

        for adjustment in &self.prices {
            adjust_floored(&mut row, &mut changes, *adjustment);
        }

        if let Some(delta) = self.last_delta {
            adjust_floored(
                &mut row,
                &mut changes,
                Adjustment {
                    field: Field::Last,
                    delta,
                },
            );
        }

        let change = row.last - row.open;
        changes.insert(Field::Change, Direction::between(row.change, change));
        row.change = change;
        let change_pct = change_pct(row.last, row.open);
        changes.insert(Field::ChangePct, Direction::between(row.change_pct, change_pct));
        row.change_pct = change_pct;

        let increment = self.volume_increment.max(0.0);
        let volume = row.volume + increment;
        changes.insert(Field::Volume, Direction::between(row.volume, volume));
        row.volume = volume;
        let value = row.value + increment * row.last;
        changes.insert(Field::Value, Direction::between(row.value, value));
        row.value = value;

        for adjustment in &self.book {
            adjust_floored(&mut row, &mut changes, *adjustment);
        }

        let mut directions = old.directions.clone();
        for (field, direction) in &changes {
            if *direction != Direction::Neutral {
                directions.insert(*field, *direction);
            }
        }

        RowSnapshot {
            row,
            directions,
            changes: Some(changes),
            last_update: Some(now),
            init_index: old.init_index,
            revision: old.revision + 1,
        }
    }
}

/// Draws a plan for `old` and applies it.
pub fn perturb<R: Rng>(rng: &mut R, old: &RowSnapshot, now: Instant) -> RowSnapshot {
    TickPlan::draw(rng, &old.row).apply(old, now)
}

/// `(last - open) / open` as a percentage rounded to two decimals; zero when open is zero.
pub fn change_pct(last: f64, open: f64) -> f64 {
    if open == 0.0 {
        return 0.0;
    }
    ((last - open) / open * 100.0 * 100.0).round() / 100.0
}

fn adjust_floored(row: &mut Row, changes: &mut ChangeSet, adjustment: Adjustment) {
    let Some(before) = row.get(adjustment.field) else {
        return;
    };
    let after = (before + adjustment.delta).max(0.0);
    row.set(adjustment.field, after);
    changes.insert(adjustment.field, Direction::between(before, after));
}

fn random_sign<R: Rng>(rng: &mut R) -> f64 {
    if rng.random_bool(0.5) { 1.0 } else { -1.0 }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::row::BookLevel;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn sample_snapshot() -> RowSnapshot {
        let mut row = Row::new("FPT");
        row.ceiling = 107.0;
        row.floor = 93.0;
        row.reference = 100.0;
        row.open = 90.0;
        row.last = 100.0;
        row.change = 10.0;
        row.change_pct = 11.11;
        row.volume = 1_000.0;
        row.value = 100_000.0;
        row.day_high = 110.0;
        row.day_low = 80.0;
        row.bids = vec![
            BookLevel::new(70.0, 500.0),
            BookLevel::new(80.0, 400.0),
            BookLevel::new(90.0, 300.0),
        ];
        row.asks = vec![
            BookLevel::new(110.0, 300.0),
            BookLevel::new(120.0, 400.0),
            BookLevel::new(130.0, 500.0),
        ];
        RowSnapshot::loaded(row, 4)
    }

    #[test]
    fn change_pct_rounds_to_two_decimals() {
        assert_eq!(change_pct(100.0, 90.0), 11.11);
        assert_eq!(change_pct(95.0, 90.0), 5.56);
        assert_eq!(change_pct(80.0, 100.0), -20.0);
        assert_eq!(change_pct(50.0, 0.0), 0.0);
    }

    #[test]
    fn last_price_step_recomputes_change_and_directions() {
        let old = sample_snapshot();
        let plan = TickPlan {
            last_delta: Some(-5.0),
            ..TickPlan::default()
        };
        let now = Instant::now();
        let next = plan.apply(&old, now);

        assert_eq!(next.row.last, 95.0);
        assert_eq!(next.row.change, 5.0);
        assert_eq!(next.row.change_pct, 5.56);
        let changes = next.changes.as_ref().expect("tick records changes");
        assert_eq!(changes[&Field::Last], Direction::Down);
        assert_eq!(changes[&Field::Change], Direction::Down);
        assert_eq!(changes[&Field::ChangePct], Direction::Down);
        assert_eq!(changes[&Field::Volume], Direction::Neutral);
        assert_eq!(next.directions.get(&Field::Change), Some(&Direction::Down));
        assert!(!next.directions.contains_key(&Field::Volume));
        assert_eq!(next.last_update, Some(now));
        assert_eq!(next.revision, old.revision + 1);
        assert_eq!(next.init_index, old.init_index);
        assert_eq!(next.symbol(), "FPT");
    }

    #[test]
    fn neutral_changes_keep_previous_direction() {
        let mut old = sample_snapshot();
        old.directions.insert(Field::Ceiling, Direction::Up);
        old.directions.insert(Field::Volume, Direction::Up);
        let plan = TickPlan {
            prices: vec![Adjustment {
                field: Field::Ceiling,
                delta: 0.0,
            }],
            ..TickPlan::default()
        };
        let next = plan.apply(&old, Instant::now());
        let changes = next.changes.as_ref().expect("tick records changes");
        assert_eq!(changes[&Field::Ceiling], Direction::Neutral);
        assert_eq!(next.directions[&Field::Ceiling], Direction::Up);
        assert_eq!(next.directions[&Field::Volume], Direction::Up);
    }

    #[test]
    fn value_grows_with_post_tick_last_price() {
        let old = sample_snapshot();
        let plan = TickPlan {
            last_delta: Some(10.0),
            volume_increment: 3.0,
            ..TickPlan::default()
        };
        let next = plan.apply(&old, Instant::now());
        assert_eq!(next.row.volume, 1_003.0);
        assert_eq!(next.row.value, 100_000.0 + 3.0 * 110.0);
        let changes = next.changes.as_ref().expect("tick records changes");
        assert_eq!(changes[&Field::Volume], Direction::Up);
        assert_eq!(changes[&Field::Value], Direction::Up);
    }

    #[test]
    fn adjustments_are_floored_at_zero() {
        let old = sample_snapshot();
        let plan = TickPlan {
            prices: vec![Adjustment {
                field: Field::DayLow,
                delta: -1_000.0,
            }],
            last_delta: Some(-1_000.0),
            book: vec![
                Adjustment {
                    field: Field::bid(0, LevelPart::Volume),
                    delta: -10_000.0,
                },
                Adjustment {
                    field: Field::ask(2, LevelPart::Price),
                    delta: -10_000.0,
                },
            ],
            ..TickPlan::default()
        };
        let next = plan.apply(&old, Instant::now());
        assert_eq!(next.row.day_low, 0.0);
        assert_eq!(next.row.last, 0.0);
        assert_eq!(next.row.bids[0].volume, 0.0);
        assert_eq!(next.row.asks[2].price, 0.0);
        assert_eq!(next.row.change, -90.0);
    }

    #[test]
    fn missing_book_levels_are_skipped() {
        let mut old = sample_snapshot();
        old.row.asks.clear();
        let plan = TickPlan {
            book: vec![Adjustment {
                field: Field::ask(0, LevelPart::Volume),
                delta: 100.0,
            }],
            ..TickPlan::default()
        };
        let next = plan.apply(&old, Instant::now());
        assert!(next.row.asks.is_empty());
        let changes = next.changes.as_ref().expect("tick records changes");
        assert!(!changes.contains_key(&Field::ask(0, LevelPart::Volume)));
    }

    #[test]
    fn drawn_plans_stay_within_bounds() {
        let mut rng = StdRng::seed_from_u64(7);
        let old = sample_snapshot();
        for _ in 0..2_000 {
            let plan = TickPlan::draw(&mut rng, &old.row);
            for adjustment in &plan.prices {
                let units = (adjustment.delta / PRICE_UNIT).abs();
                assert!((1.0..=3.0).contains(&units), "top step {units}");
            }
            if let Some(delta) = plan.last_delta {
                let units = (delta / PRICE_UNIT).abs();
                assert!([0.0, 1.0, 4.0, 5.0, 6.0].contains(&units), "last step {units}");
            }
            assert!((0.0..5_000.0).contains(&plan.volume_increment));
            for adjustment in &plan.book {
                match adjustment.field {
                    Field::Book(_, level, LevelPart::Volume) => {
                        assert!(level < 3);
                        assert!((-1_500.0..1_500.0).contains(&adjustment.delta));
                    }
                    Field::Book(_, _, LevelPart::Price) => {
                        assert_eq!(adjustment.delta.abs(), PRICE_UNIT);
                    }
                    other => panic!("unexpected book field {other}"),
                }
            }
        }
    }

    #[test]
    fn repeated_perturbation_keeps_invariants() {
        let mut rng = StdRng::seed_from_u64(42);
        let mut snapshot = sample_snapshot();
        let start = Instant::now();
        for _ in 0..5_000 {
            let previous_volume = snapshot.row.volume;
            snapshot = perturb(&mut rng, &snapshot, start);
            let row = &snapshot.row;
            assert_eq!(row.change, row.last - row.open);
            assert_eq!(row.change_pct, change_pct(row.last, row.open));
            assert!(row.volume >= previous_volume);
            for value in [row.ceiling, row.floor, row.reference, row.last, row.day_high, row.day_low] {
                assert!(value >= 0.0);
            }
            for level in row.bids.iter().chain(row.asks.iter()) {
                assert!(level.price >= 0.0 && level.volume >= 0.0);
            }
        }
        assert_eq!(snapshot.revision, 5_000);
    }

    #[test]
    fn seeded_rngs_produce_identical_plans() {
        let old = sample_snapshot();
        let mut a = StdRng::seed_from_u64(99);
        let mut b = StdRng::seed_from_u64(99);
        assert_eq!(TickPlan::draw(&mut a, &old.row), TickPlan::draw(&mut b, &old.row));
    }
}
