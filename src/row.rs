use std::collections::BTreeMap;
use std::fmt;
use std::time::Instant;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize};

/// Price step used by the simulated feed and the synthetic snapshot.
pub const PRICE_UNIT: f64 = 10.0;
/// Number of order-book levels kept per side.
pub const BOOK_DEPTH: usize = 3;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BookLevel {
    #[serde(rename = "p", default, deserialize_with = "deserialize_f64")]
    pub price: f64,
    #[serde(rename = "v", default, deserialize_with = "deserialize_f64")]
    pub volume: f64,
}

impl BookLevel {
    pub fn new(price: f64, volume: f64) -> Self {
        BookLevel { price, volume }
    }
}

/// One instrument quote as it arrives in the bulk snapshot.
///
/// Keys follow the snapshot's short names (`s`, `h`, `fl`, ...). Missing or
/// null numbers default to zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Row {
    #[serde(rename = "s")]
    symbol: String,
    #[serde(rename = "h", default, deserialize_with = "deserialize_f64")]
    pub ceiling: f64,
    #[serde(rename = "fl", default, deserialize_with = "deserialize_f64")]
    pub floor: f64,
    #[serde(rename = "ce", default, deserialize_with = "deserialize_f64")]
    pub reference: f64,
    #[serde(rename = "o", default, deserialize_with = "deserialize_f64")]
    pub open: f64,
    #[serde(rename = "c", default, deserialize_with = "deserialize_f64")]
    pub last: f64,
    #[serde(rename = "ch", default, deserialize_with = "deserialize_f64")]
    pub change: f64,
    #[serde(rename = "r", default, deserialize_with = "deserialize_f64")]
    pub change_pct: f64,
    #[serde(rename = "vo", default, deserialize_with = "deserialize_f64")]
    pub volume: f64,
    #[serde(rename = "va", default, deserialize_with = "deserialize_f64")]
    pub value: f64,
    #[serde(rename = "odH", default, deserialize_with = "deserialize_f64")]
    pub day_high: f64,
    #[serde(rename = "odL", default, deserialize_with = "deserialize_f64")]
    pub day_low: f64,
    #[serde(rename = "bb", default)]
    pub bids: Vec<BookLevel>,
    #[serde(rename = "bo", default)]
    pub asks: Vec<BookLevel>,
}

impl Row {
    pub fn new(symbol: impl Into<String>) -> Self {
        Row {
            symbol: symbol.into(),
            ceiling: 0.0,
            floor: 0.0,
            reference: 0.0,
            open: 0.0,
            last: 0.0,
            change: 0.0,
            change_pct: 0.0,
            volume: 0.0,
            value: 0.0,
            day_high: 0.0,
            day_low: 0.0,
            bids: Vec::new(),
            asks: Vec::new(),
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Drops book levels beyond [`BOOK_DEPTH`].
    pub fn normalized(mut self) -> Self {
        self.bids.truncate(BOOK_DEPTH);
        self.asks.truncate(BOOK_DEPTH);
        self
    }

    pub fn get(&self, field: Field) -> Option<f64> {
        match field {
            Field::Ceiling => Some(self.ceiling),
            Field::Floor => Some(self.floor),
            Field::Reference => Some(self.reference),
            Field::Last => Some(self.last),
            Field::Change => Some(self.change),
            Field::ChangePct => Some(self.change_pct),
            Field::Volume => Some(self.volume),
            Field::Value => Some(self.value),
            Field::DayHigh => Some(self.day_high),
            Field::DayLow => Some(self.day_low),
            Field::Book(side, level, part) => self.side(side).get(level as usize).map(|lvl| {
                match part {
                    LevelPart::Price => lvl.price,
                    LevelPart::Volume => lvl.volume,
                }
            }),
        }
    }

    /// Writes `value` into `field`. Returns false when the book level does not exist.
    pub fn set(&mut self, field: Field, value: f64) -> bool {
        let slot = match field {
            Field::Ceiling => &mut self.ceiling,
            Field::Floor => &mut self.floor,
            Field::Reference => &mut self.reference,
            Field::Last => &mut self.last,
            Field::Change => &mut self.change,
            Field::ChangePct => &mut self.change_pct,
            Field::Volume => &mut self.volume,
            Field::Value => &mut self.value,
            Field::DayHigh => &mut self.day_high,
            Field::DayLow => &mut self.day_low,
            Field::Book(side, level, part) => {
                let levels = match side {
                    Side::Bid => &mut self.bids,
                    Side::Ask => &mut self.asks,
                };
                let Some(lvl) = levels.get_mut(level as usize) else {
                    return false;
                };
                match part {
                    LevelPart::Price => &mut lvl.price,
                    LevelPart::Volume => &mut lvl.volume,
                }
            }
        };
        *slot = value;
        true
    }

    pub fn side(&self, side: Side) -> &[BookLevel] {
        match side {
            Side::Bid => &self.bids,
            Side::Ask => &self.asks,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Side {
    Bid,
    Ask,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LevelPart {
    Price,
    Volume,
}

/// A directional cell of a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Field {
    Ceiling,
    Floor,
    Reference,
    Last,
    Change,
    ChangePct,
    Volume,
    Value,
    DayHigh,
    DayLow,
    Book(Side, u8, LevelPart),
}

impl Field {
    pub const TOP_PRICES: [Field; 5] = [
        Field::Ceiling,
        Field::Floor,
        Field::Reference,
        Field::DayHigh,
        Field::DayLow,
    ];

    pub const fn bid(level: u8, part: LevelPart) -> Field {
        Field::Book(Side::Bid, level, part)
    }

    pub const fn ask(level: u8, part: LevelPart) -> Field {
        Field::Book(Side::Ask, level, part)
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Field::Ceiling => f.write_str("h"),
            Field::Floor => f.write_str("fl"),
            Field::Reference => f.write_str("ce"),
            Field::Last => f.write_str("c"),
            Field::Change => f.write_str("ch"),
            Field::ChangePct => f.write_str("r"),
            Field::Volume => f.write_str("vo"),
            Field::Value => f.write_str("va"),
            Field::DayHigh => f.write_str("odH"),
            Field::DayLow => f.write_str("odL"),
            Field::Book(side, level, part) => {
                let side = match side {
                    Side::Bid => "bb",
                    Side::Ask => "bo",
                };
                let part = match part {
                    LevelPart::Price => "p",
                    LevelPart::Volume => "v",
                };
                write!(f, "{side}[{level}].{part}")
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Up,
    Down,
    Neutral,
}

impl Direction {
    pub fn between(old: f64, new: f64) -> Direction {
        if new > old {
            Direction::Up
        } else if new < old {
            Direction::Down
        } else {
            Direction::Neutral
        }
    }

    pub fn from_sign(value: f64) -> Direction {
        Direction::between(0.0, value)
    }
}

/// Last non-neutral direction seen per field.
pub type DirectionMap = BTreeMap<Field, Direction>;
/// Directions recorded by the most recent tick only.
pub type ChangeSet = BTreeMap<Field, Direction>;

/// Immutable view of a row between two updates.
///
/// Updates never mutate a snapshot; they build a new one and the store swaps
/// the shared reference.
#[derive(Debug, Clone, PartialEq)]
pub struct RowSnapshot {
    pub row: Row,
    pub directions: DirectionMap,
    pub changes: Option<ChangeSet>,
    pub last_update: Option<Instant>,
    /// Position in the bulk snapshot. Fixed for the whole session.
    pub init_index: usize,
    pub revision: u64,
}

impl RowSnapshot {
    pub fn loaded(row: Row, init_index: usize) -> Self {
        RowSnapshot {
            row,
            directions: DirectionMap::new(),
            changes: None,
            last_update: None,
            init_index,
            revision: 0,
        }
    }

    pub fn symbol(&self) -> &str {
        self.row.symbol()
    }

    pub fn without_changes(&self) -> Self {
        RowSnapshot {
            changes: None,
            last_update: None,
            ..self.clone()
        }
    }
}

fn deserialize_f64<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    struct F64Visitor;
    impl<'de> Visitor<'de> for F64Visitor {
        type Value = f64;
        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a number, a numeric string or null")
        }
        fn visit_f64<E>(self, value: f64) -> Result<f64, E>
        where
            E: de::Error,
        {
            Ok(value)
        }
        fn visit_i64<E>(self, value: i64) -> Result<f64, E>
        where
            E: de::Error,
        {
            Ok(value as f64)
        }
        fn visit_u64<E>(self, value: u64) -> Result<f64, E>
        where
            E: de::Error,
        {
            Ok(value as f64)
        }
        fn visit_str<E>(self, value: &str) -> Result<f64, E>
        where
            E: de::Error,
        {
            let trimmed = value.trim();
            if trimmed.is_empty() {
                return Ok(0.0);
            }
            trimmed
                .parse::<f64>()
                .map_err(|_| E::custom(format!("invalid number {value}")))
        }
        fn visit_none<E>(self) -> Result<f64, E>
        where
            E: de::Error,
        {
            Ok(0.0)
        }
        fn visit_unit<E>(self) -> Result<f64, E>
        where
            E: de::Error,
        {
            Ok(0.0)
        }
    }
    deserializer.deserialize_any(F64Visitor)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_short_keys_with_missing_and_null_numbers() {
        let raw = r#"{
            "s": "VNM",
            "h": 7490,
            "fl": "6510",
            "ce": null,
            "c": 7000.5,
            "bb": [{"p": 6990, "v": 1200}, {"p": 6980}],
            "bo": []
        }"#;
        let row: Row = serde_json::from_str(raw).expect("row should parse");
        assert_eq!(row.symbol(), "VNM");
        assert_eq!(row.ceiling, 7490.0);
        assert_eq!(row.floor, 6510.0);
        assert_eq!(row.reference, 0.0);
        assert_eq!(row.open, 0.0);
        assert!((row.last - 7000.5).abs() < 1e-9);
        assert_eq!(row.bids.len(), 2);
        assert_eq!(row.bids[1].volume, 0.0);
        assert!(row.asks.is_empty());
    }

    #[test]
    fn rejects_row_without_symbol() {
        let raw = r#"{"h": 10}"#;
        assert!(serde_json::from_str::<Row>(raw).is_err());
    }

    #[test]
    fn book_fields_read_and_write_existing_levels_only() {
        let mut row = Row::new("AAA");
        row.bids = vec![BookLevel::new(100.0, 5.0)];
        let field = Field::bid(0, LevelPart::Volume);
        assert_eq!(row.get(field), Some(5.0));
        assert!(row.set(field, 7.0));
        assert_eq!(row.bids[0].volume, 7.0);

        let missing = Field::ask(2, LevelPart::Price);
        assert_eq!(row.get(missing), None);
        assert!(!row.set(missing, 1.0));
    }

    #[test]
    fn normalized_truncates_deep_books() {
        let mut row = Row::new("AAA");
        row.asks = (0..5).map(|i| BookLevel::new(i as f64, 1.0)).collect();
        let row = row.normalized();
        assert_eq!(row.asks.len(), BOOK_DEPTH);
    }

    #[test]
    fn direction_ties_are_neutral() {
        assert_eq!(Direction::between(1.0, 2.0), Direction::Up);
        assert_eq!(Direction::between(2.0, 1.0), Direction::Down);
        assert_eq!(Direction::between(2.0, 2.0), Direction::Neutral);
        assert_eq!(Direction::from_sign(-0.5), Direction::Down);
    }

    #[test]
    fn field_display_uses_snapshot_keys() {
        assert_eq!(Field::DayHigh.to_string(), "odH");
        assert_eq!(Field::bid(0, LevelPart::Price).to_string(), "bb[0].p");
        assert_eq!(Field::ask(2, LevelPart::Volume).to_string(), "bo[2].v");
    }
}
