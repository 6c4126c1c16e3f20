//! Prometheus-style durations
//!
//! Grammar: an ordered sequence of `<int><unit>` terms with units
//! `y, w, d, h, m, s, ms` (each at most once, largest first), or a bare `0`.
//! A year is 365 days. Rendering is canonical, so `90s` prints as `1m30s`.

use crate::error::{Result, TypesError};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

const MS_PER_SECOND: u64 = 1000;
const MS_PER_MINUTE: u64 = 60 * MS_PER_SECOND;
const MS_PER_HOUR: u64 = 60 * MS_PER_MINUTE;
const MS_PER_DAY: u64 = 24 * MS_PER_HOUR;
const MS_PER_WEEK: u64 = 7 * MS_PER_DAY;
const MS_PER_YEAR: u64 = 365 * MS_PER_DAY;

/// Units in the order they must appear
const UNITS: [(&str, u64); 7] = [
    ("y", MS_PER_YEAR),
    ("w", MS_PER_WEEK),
    ("d", MS_PER_DAY),
    ("h", MS_PER_HOUR),
    ("m", MS_PER_MINUTE),
    ("s", MS_PER_SECOND),
    ("ms", 1),
];

/// Duration with millisecond precision, rendered the way Prometheus does
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PromDuration(u64);

impl PromDuration {
    pub fn from_millis(ms: u64) -> Self {
        Self(ms)
    }

    pub fn from_secs(secs: u64) -> Self {
        Self(secs.saturating_mul(MS_PER_SECOND))
    }

    pub fn as_millis(&self) -> u64 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Parse a duration string, e.g. `30s` or `1h30m`.
    pub fn parse(input: &str) -> Result<Self> {
        let invalid = || TypesError::InvalidDuration(input.to_string());

        if input == "0" {
            return Ok(Self(0));
        }
        if input.is_empty() {
            return Err(invalid());
        }

        let bytes = input.as_bytes();
        let mut pos = 0;
        let mut next_unit = 0;
        let mut total: u64 = 0;

        while pos < bytes.len() {
            let digits_start = pos;
            while pos < bytes.len() && bytes[pos].is_ascii_digit() {
                pos += 1;
            }
            if pos == digits_start {
                return Err(invalid());
            }
            let value: u64 = input[digits_start..pos].parse().map_err(|_| invalid())?;

            let unit_start = pos;
            while pos < bytes.len() && bytes[pos].is_ascii_alphabetic() {
                pos += 1;
            }
            let unit = &input[unit_start..pos];

            let offset = UNITS[next_unit..]
                .iter()
                .position(|(name, _)| *name == unit)
                .ok_or_else(invalid)?;
            let (_, multiplier) = UNITS[next_unit + offset];
            next_unit += offset + 1;

            total = value
                .checked_mul(multiplier)
                .and_then(|ms| total.checked_add(ms))
                .ok_or_else(invalid)?;
        }

        Ok(Self(total))
    }
}

impl FromStr for PromDuration {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for PromDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut ms = self.0;
        if ms == 0 {
            return f.write_str("0s");
        }

        for (unit, multiplier) in UNITS {
            // Years and weeks only when they divide evenly: 90d reads better than 12w6d
            let exact_only = unit == "y" || unit == "w";
            if exact_only && ms % multiplier != 0 {
                continue;
            }
            let value = ms / multiplier;
            if value > 0 {
                write!(f, "{}{}", value, unit)?;
                ms -= value * multiplier;
            }
        }

        Ok(())
    }
}

impl From<PromDuration> for Duration {
    fn from(d: PromDuration) -> Self {
        Duration::from_millis(d.0)
    }
}

impl Serialize for PromDuration {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for PromDuration {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        PromDuration::parse(&raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_units() {
        assert_eq!(PromDuration::parse("30s").unwrap().as_millis(), 30_000);
        assert_eq!(PromDuration::parse("5m").unwrap().as_millis(), 300_000);
        assert_eq!(PromDuration::parse("250ms").unwrap().as_millis(), 250);
        assert_eq!(PromDuration::parse("0").unwrap().as_millis(), 0);
    }

    #[test]
    fn test_parse_compound() {
        let d = PromDuration::parse("1h30m15s").unwrap();
        assert_eq!(d.as_millis(), MS_PER_HOUR + 30 * MS_PER_MINUTE + 15 * MS_PER_SECOND);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(PromDuration::parse("").is_err());
        assert!(PromDuration::parse("abc").is_err());
        assert!(PromDuration::parse("10").is_err());
        assert!(PromDuration::parse("1.5s").is_err());
        // Units out of order
        assert!(PromDuration::parse("1s1m").is_err());
        // Repeated unit
        assert!(PromDuration::parse("1s1s").is_err());
    }

    #[test]
    fn test_display_canonical() {
        assert_eq!(PromDuration::from_secs(30).to_string(), "30s");
        assert_eq!(PromDuration::from_secs(90).to_string(), "1m30s");
        assert_eq!(PromDuration::from_millis(0).to_string(), "0s");
        assert_eq!(PromDuration::from_millis(MS_PER_WEEK).to_string(), "1w");
        assert_eq!(PromDuration::from_millis(90 * MS_PER_DAY).to_string(), "90d");
    }

    #[test]
    fn test_parse_then_display() {
        assert_eq!(PromDuration::parse("30s").unwrap().to_string(), "30s");
        assert_eq!(PromDuration::parse("60s").unwrap().to_string(), "1m");
    }
}
