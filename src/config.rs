use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use clap::{Parser, ValueEnum};

use crate::flash::{EXPIRY_GRACE, FLASH_DURATION};
use crate::snapshot::SnapshotSource;

const DIRECT_INTERVAL: Duration = Duration::from_millis(450);

#[derive(Parser, Clone, Debug)]
pub struct CliParams {
    /// Bulk snapshot to load: a JSON file path or an http(s) URL
    #[clap(long = "data", value_name = "PATH|URL", default_value = "demos/data.json")]
    pub data: String,

    /// Generate N synthetic rows instead of loading a snapshot
    #[clap(long = "generate", value_name = "N", conflicts_with = "data")]
    pub generate: Option<usize>,

    /// Batched updates on a flush window, or direct updates on every tick
    #[clap(long = "mode", value_enum, default_value_t = FeedMode::Batched)]
    pub mode: FeedMode,

    /// Interval between simulated ticks (e.g., 10ms, 1s); direct mode defaults to 450ms
    #[clap(long = "incoming", value_name = "DURATION")]
    pub incoming: Option<DurationSpec>,

    /// Interval between flushes of staged updates to the grid
    #[clap(long = "flush", value_name = "DURATION", default_value = "100ms")]
    pub flush: DurationSpec,

    /// How long a changed cell stays highlighted
    #[clap(long = "flash", value_name = "DURATION", default_value = "350ms")]
    pub flash: DurationSpec,

    /// Seed for the simulated feed; random when omitted
    #[clap(long = "seed")]
    pub seed: Option<u64>,

    /// File receiving tracing output
    #[clap(
        long = "log-file",
        env = "PRICE_BOARD_LOG",
        default_value = "price_board.log"
    )]
    pub log_file: PathBuf,

    /// JSONL journal of load failures and swallowed feed errors
    #[clap(long = "error-log", default_value = "error_logs.jsonl")]
    pub error_log: PathBuf,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum FeedMode {
    Batched,
    Direct,
}

#[derive(Clone, Debug, PartialEq)]
pub struct FeedConfig {
    pub mode: FeedMode,
    pub incoming: Duration,
    pub flush: Duration,
    pub flash: Duration,
    pub seed: Option<u64>,
}

impl FeedConfig {
    /// Delay before a flushed row's change set is cleared.
    pub fn expiry_delay(&self) -> Duration {
        self.flash + EXPIRY_GRACE
    }
}

impl Default for FeedConfig {
    fn default() -> Self {
        FeedConfig {
            mode: FeedMode::Batched,
            incoming: Duration::from_millis(10),
            flush: Duration::from_millis(100),
            flash: FLASH_DURATION,
            seed: None,
        }
    }
}

impl CliParams {
    pub fn feed_config(&self) -> FeedConfig {
        let default_incoming = match self.mode {
            FeedMode::Batched => FeedConfig::default().incoming,
            FeedMode::Direct => DIRECT_INTERVAL,
        };
        FeedConfig {
            mode: self.mode,
            incoming: self
                .incoming
                .map(|spec| spec.as_duration())
                .unwrap_or(default_incoming),
            flush: self.flush.as_duration(),
            flash: self.flash.as_duration(),
            seed: self.seed,
        }
    }

    pub fn snapshot_source(&self) -> SnapshotSource {
        match self.generate {
            Some(rows) => SnapshotSource::Generated {
                rows,
                seed: self.seed,
            },
            None => SnapshotSource::from_location(&self.data),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct DurationSpec(Duration);

impl DurationSpec {
    pub fn as_duration(&self) -> Duration {
        self.0
    }
}

impl FromStr for DurationSpec {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let duration = parse_duration_spec(s)?;
        Ok(DurationSpec(duration))
    }
}

fn parse_duration_spec(input: &str) -> Result<Duration, String> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err("duration spec cannot be empty (examples: 10ms, 1s, 2m)".to_string());
    }
    let split_idx = trimmed
        .find(|c: char| !c.is_ascii_digit() && c != '.')
        .ok_or_else(|| "duration spec must end with a unit like ms, s, m, or h".to_string())?;
    if split_idx == 0 {
        return Err("duration spec must start with a number (examples: 10ms, 1s)".to_string());
    }
    let (value_part, unit_part) = trimmed.split_at(split_idx);
    let value: f64 = value_part.parse().map_err(|_| {
        format!(
            "invalid numeric portion `{}` in duration spec `{}`",
            value_part, trimmed
        )
    })?;
    let unit = unit_part.trim().to_lowercase();
    if unit.is_empty() {
        return Err("duration spec missing unit (use ms, s, m, or h)".to_string());
    }
    let nanos_multiplier = match unit.as_str() {
        "ms" | "msec" | "msecs" | "millis" | "milliseconds" => 1e6,
        "s" | "sec" | "secs" | "second" | "seconds" => 1e9,
        "m" | "min" | "mins" | "minute" | "minutes" => 60.0 * 1e9,
        "h" | "hr" | "hrs" | "hour" | "hours" => 60.0 * 60.0 * 1e9,
        other => {
            return Err(format!(
                "unsupported duration unit `{}` (use ms, s, m, or h)",
                other
            ));
        }
    };
    let nanos = (value * nanos_multiplier).round();
    if !nanos.is_finite() || nanos <= 0.0 {
        return Err(format!("duration must be positive: `{}`", trimmed));
    }
    if nanos > u64::MAX as f64 {
        return Err(format!("duration `{}` is too large", trimmed));
    }
    Ok(Duration::from_nanos(nanos as u64))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_millisecond_and_second_units() {
        assert_eq!(parse_duration_spec("10ms"), Ok(Duration::from_millis(10)));
        assert_eq!(parse_duration_spec(" 1.5s "), Ok(Duration::from_millis(1_500)));
        assert_eq!(parse_duration_spec("2m"), Ok(Duration::from_secs(120)));
    }

    #[test]
    fn rejects_malformed_durations() {
        assert!(parse_duration_spec("").is_err());
        assert!(parse_duration_spec("100").is_err());
        assert!(parse_duration_spec("ms").is_err());
        assert!(parse_duration_spec("0ms").is_err());
        assert!(parse_duration_spec("5 parsecs").is_err());
    }

    #[test]
    fn batched_defaults_match_feed_cadences() {
        let params = CliParams::parse_from(["price-board"]);
        let config = params.feed_config();
        assert_eq!(config, FeedConfig::default());
        assert_eq!(config.expiry_delay(), Duration::from_millis(390));
        assert_eq!(
            params.snapshot_source(),
            SnapshotSource::File(PathBuf::from("demos/data.json"))
        );
    }

    #[test]
    fn direct_mode_slows_default_tick_rate() {
        let params = CliParams::parse_from(["price-board", "--mode", "direct"]);
        assert_eq!(params.feed_config().incoming, Duration::from_millis(450));

        let params =
            CliParams::parse_from(["price-board", "--mode", "direct", "--incoming", "50ms"]);
        assert_eq!(params.feed_config().incoming, Duration::from_millis(50));
    }

    #[test]
    fn generate_selects_synthetic_source() {
        let params = CliParams::parse_from(["price-board", "--generate", "500", "--seed", "3"]);
        assert_eq!(
            params.snapshot_source(),
            SnapshotSource::Generated {
                rows: 500,
                seed: Some(3)
            }
        );
    }
}
