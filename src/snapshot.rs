use std::path::PathBuf;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use thiserror::Error;

use crate::generator::change_pct;
use crate::row::{BOOK_DEPTH, BookLevel, PRICE_UNIT, Row};

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("HTTP {0}")]
    Status(reqwest::StatusCode),
    #[error("data is not a row array: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("snapshot contains no rows")]
    Empty,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnapshotSource {
    File(PathBuf),
    Url(String),
    Generated { rows: usize, seed: Option<u64> },
}

impl SnapshotSource {
    pub fn from_location(location: &str) -> SnapshotSource {
        let trimmed = location.trim();
        if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
            SnapshotSource::Url(trimmed.to_string())
        } else {
            SnapshotSource::File(PathBuf::from(trimmed))
        }
    }

    pub fn describe(&self) -> String {
        match self {
            SnapshotSource::File(path) => path.display().to_string(),
            SnapshotSource::Url(url) => url.clone(),
            SnapshotSource::Generated { rows, .. } => format!("{rows} generated rows"),
        }
    }
}

/// Fetches the bulk snapshot once.
pub async fn load(source: &SnapshotSource) -> Result<Vec<Row>, SnapshotError> {
    let rows = match source {
        SnapshotSource::File(path) => {
            let text = tokio::fs::read_to_string(path)
                .await
                .map_err(|source| SnapshotError::Io {
                    path: path.clone(),
                    source,
                })?;
            parse_rows(&text)?
        }
        SnapshotSource::Url(url) => {
            let response = reqwest::get(url).await?;
            if !response.status().is_success() {
                return Err(SnapshotError::Status(response.status()));
            }
            let text = response.text().await?;
            parse_rows(&text)?
        }
        SnapshotSource::Generated { rows, seed } => {
            let mut rng = match seed {
                Some(seed) => StdRng::seed_from_u64(*seed),
                None => StdRng::from_os_rng(),
            };
            generate_rows(&mut rng, *rows)
        }
    };
    if rows.is_empty() {
        return Err(SnapshotError::Empty);
    }
    tracing::info!(rows = rows.len(), source = %source.describe(), "snapshot loaded");
    Ok(rows)
}

pub fn parse_rows(text: &str) -> Result<Vec<Row>, SnapshotError> {
    let rows: Vec<Row> = serde_json::from_str(text)?;
    Ok(rows)
}

/// Synthetic snapshot: unique symbols, prices on the unit grid inside a
/// ceiling/floor band around the reference, and a full three-level book.
pub fn generate_rows<R: Rng>(rng: &mut R, count: usize) -> Vec<Row> {
    (0..count).map(|idx| generate_row(rng, idx)).collect()
}

fn generate_row<R: Rng>(rng: &mut R, idx: usize) -> Row {
    let reference = PRICE_UNIT * rng.random_range(100..=5_000) as f64;
    let band = round_to_unit(reference * 0.07).max(PRICE_UNIT);
    let ceiling = reference + band;
    let floor = (reference - band).max(PRICE_UNIT);
    let band_units = (band / PRICE_UNIT) as i64;
    let open = reference + PRICE_UNIT * rng.random_range(-band_units / 2..=band_units / 2) as f64;
    let last = (open + PRICE_UNIT * rng.random_range(-band_units / 2..=band_units / 2) as f64)
        .clamp(floor, ceiling);
    let volume = rng.random_range(0..2_000_000) as f64;

    let mut row = Row::new(symbol_for(idx));
    row.ceiling = ceiling;
    row.floor = floor;
    row.reference = reference;
    row.open = open;
    row.last = last;
    row.change = last - open;
    row.change_pct = change_pct(last, open);
    row.volume = volume;
    row.value = volume * last;
    row.day_high = open.max(last) + PRICE_UNIT * rng.random_range(0..=3) as f64;
    row.day_low = (open.min(last) - PRICE_UNIT * rng.random_range(0..=3) as f64).max(0.0);
    // Bid level 0 is the deepest; ask level 0 is the best offer.
    row.bids = (0..BOOK_DEPTH)
        .map(|level| {
            let distance = (BOOK_DEPTH - level) as f64;
            BookLevel::new(
                (last - distance * PRICE_UNIT).max(0.0),
                rng.random_range(100..20_000) as f64,
            )
        })
        .collect();
    row.asks = (0..BOOK_DEPTH)
        .map(|level| {
            let distance = (level + 1) as f64;
            BookLevel::new(
                last + distance * PRICE_UNIT,
                rng.random_range(100..20_000) as f64,
            )
        })
        .collect();
    row
}

fn round_to_unit(value: f64) -> f64 {
    (value / PRICE_UNIT).round() * PRICE_UNIT
}

/// Bijective base-26 ticker of at least three letters: AAA, AAB, ...
fn symbol_for(mut idx: usize) -> String {
    let mut letters = Vec::new();
    loop {
        letters.push(b'A' + (idx % 26) as u8);
        idx /= 26;
        if idx == 0 && letters.len() >= 3 {
            break;
        }
    }
    letters.reverse();
    String::from_utf8(letters).unwrap_or_default()
}
