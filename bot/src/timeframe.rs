use anyhow::{bail, Result};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Candle intervals accepted by the market-data endpoint
pub const SUPPORTED: [&str; 14] = [
    "1m", "3m", "5m", "15m", "30m", "1h", "2h", "4h", "6h", "8h", "12h", "1d", "3d", "1w",
];

const MINUTE: u64 = 60;
const HOUR: u64 = 60 * MINUTE;
const DAY: u64 = 24 * HOUR;

/// A candle interval and where its boundaries fall
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timeframe {
    label: String,
    period: Duration,
    anchor: Duration,
}

impl Timeframe {
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Candle length
    pub fn period(&self) -> Duration {
        self.period
    }

    /// Offset of the first boundary from the Unix epoch
    pub fn anchor(&self) -> Duration {
        self.anchor
    }
}

impl FromStr for Timeframe {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        if !SUPPORTED.contains(&s) {
            bail!("unsupported timeframe '{}', expected one of {}", s, SUPPORTED.join(" "));
        }

        let (count, unit) = s.split_at(s.len() - 1);
        let count: u64 = count.parse()?;
        let unit_secs = match unit {
            "m" => MINUTE,
            "h" => HOUR,
            "d" => DAY,
            "w" => 7 * DAY,
            _ => bail!("unsupported timeframe unit in '{}'", s),
        };

        // Weekly candles open on Monday; the epoch fell on a Thursday
        let anchor = if unit == "w" { 4 * DAY } else { 0 };

        Ok(Self {
            label: s.to_string(),
            period: Duration::from_secs(count * unit_secs),
            anchor: Duration::from_secs(anchor),
        })
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label)
    }
}
