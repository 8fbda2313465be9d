//! Human-readable sizes and durations for configuration values

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    #[error("Invalid number: {0}")]
    InvalidNumber(#[from] std::num::ParseIntError),

    #[error("Invalid unit: {0}")]
    InvalidUnit(String),
}

/// Byte size wrapper with human-readable parsing
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct ByteSize(pub u64);

impl ByteSize {
    pub fn as_u64(&self) -> u64 {
        self.0
    }

    pub fn to_human_readable(&self) -> String {
        const UNITS: &[(&str, u64)] = &[
            ("B", 1),
            ("KB", 1024),
            ("MB", 1024 * 1024),
            ("GB", 1024 * 1024 * 1024),
            ("TB", 1024 * 1024 * 1024 * 1024),
        ];

        for (i, &(unit, divisor)) in UNITS.iter().enumerate().rev() {
            if self.0 >= divisor {
                let value = self.0 / divisor;
                let remainder = self.0 % divisor;

                if remainder == 0 || i == 0 {
                    return format!("{}{}", value, unit);
                } else {
                    let decimal = (remainder * 10 / divisor) as u64;
                    if decimal > 0 {
                        return format!("{}.{}{}", value, decimal, unit);
                    }
                    return format!("{}{}", value, unit);
                }
            }
        }

        format!("{}B", self.0)
    }
}

impl<'de> Deserialize<'de> for ByteSize {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct ByteSizeVisitor;

        impl<'de> serde::de::Visitor<'de> for ByteSizeVisitor {
            type Value = ByteSize;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a byte size as string (e.g., \"5MB\", \"1GB\") or integer")
            }

            fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                Ok(ByteSize(v))
            }

            fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                u64::try_from(v)
                    .map(ByteSize)
                    .map_err(|_| E::custom("byte size must not be negative"))
            }

            fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                v.parse::<ByteSize>().map_err(serde::de::Error::custom)
            }
        }

        deserializer.deserialize_any(ByteSizeVisitor)
    }
}

impl FromStr for ByteSize {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (num, unit) = split_number(s)?;

        let multiplier: u64 = match unit.to_uppercase().as_str() {
            "" | "B" => 1,
            "K" | "KB" | "KIB" => 1024,
            "M" | "MB" | "MIB" => 1024 * 1024,
            "G" | "GB" | "GIB" => 1024 * 1024 * 1024,
            "T" | "TB" | "TIB" => 1024 * 1024 * 1024 * 1024,
            other => return Err(ParseError::InvalidUnit(other.to_string())),
        };

        num.checked_mul(multiplier)
            .map(ByteSize)
            .ok_or_else(|| ParseError::InvalidFormat(s.trim().to_string()))
    }
}

impl fmt::Display for ByteSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_human_readable())
    }
}

/// Split `"500ms"` into `(500, "ms")`; a bare number has an empty unit
fn split_number(s: &str) -> Result<(u64, &str), ParseError> {
    let s = s.trim();
    let pos = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    if pos == 0 {
        return Err(ParseError::InvalidFormat(s.to_string()));
    }

    let num = s[..pos].parse()?;
    Ok((num, s[pos..].trim()))
}

/// Duration wrapper accepting `"500ms"`, `"1s"`, `"2m"`, `"1h"` or bare milliseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct HumanDuration(pub Duration);

impl HumanDuration {
    pub fn from_millis(ms: u64) -> Self {
        Self(Duration::from_millis(ms))
    }

    pub fn from_secs(secs: u64) -> Self {
        Self(Duration::from_secs(secs))
    }

    pub fn as_duration(&self) -> Duration {
        self.0
    }
}

impl From<HumanDuration> for Duration {
    fn from(value: HumanDuration) -> Self {
        value.0
    }
}

impl FromStr for HumanDuration {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (num, unit) = split_number(s)?;

        let duration = match unit.to_lowercase().as_str() {
            "" | "ms" => Duration::from_millis(num),
            "s" | "sec" | "secs" => Duration::from_secs(num),
            "m" | "min" | "mins" => Duration::from_secs(num.saturating_mul(60)),
            "h" => Duration::from_secs(num.saturating_mul(3600)),
            other => return Err(ParseError::InvalidUnit(other.to_string())),
        };

        Ok(HumanDuration(duration))
    }
}

impl fmt::Display for HumanDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ms = self.0.as_millis();
        if ms == 0 {
            f.write_str("0ms")
        } else if ms % 3_600_000 == 0 {
            write!(f, "{}h", ms / 3_600_000)
        } else if ms % 60_000 == 0 {
            write!(f, "{}m", ms / 60_000)
        } else if ms % 1000 == 0 {
            write!(f, "{}s", ms / 1000)
        } else {
            write!(f, "{ms}ms")
        }
    }
}

impl Serialize for HumanDuration {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for HumanDuration {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct DurationVisitor;

        impl<'de> serde::de::Visitor<'de> for DurationVisitor {
            type Value = HumanDuration;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a duration as string (e.g., \"500ms\", \"1s\") or milliseconds")
            }

            fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                Ok(HumanDuration::from_millis(v))
            }

            fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                u64::try_from(v)
                    .map(HumanDuration::from_millis)
                    .map_err(|_| E::custom("duration must not be negative"))
            }

            fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                v.parse::<HumanDuration>().map_err(serde::de::Error::custom)
            }
        }

        deserializer.deserialize_any(DurationVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bytes() {
        assert_eq!("1024".parse::<ByteSize>().unwrap().as_u64(), 1024);
        assert_eq!("1KB".parse::<ByteSize>().unwrap().as_u64(), 1024);
        assert_eq!("1K".parse::<ByteSize>().unwrap().as_u64(), 1024);
    }

    #[test]
    fn test_parse_megabytes() {
        assert_eq!("5MB".parse::<ByteSize>().unwrap().as_u64(), 5 * 1024 * 1024);
        assert_eq!("5M".parse::<ByteSize>().unwrap().as_u64(), 5 * 1024 * 1024);
        assert_eq!("5MiB".parse::<ByteSize>().unwrap().as_u64(), 5 * 1024 * 1024);
    }

    #[test]
    fn test_parse_gigabytes() {
        assert_eq!("50GB".parse::<ByteSize>().unwrap().as_u64(), 50 * 1024 * 1024 * 1024);
        assert_eq!("1G".parse::<ByteSize>().unwrap().as_u64(), 1024 * 1024 * 1024);
    }

    #[test]
    fn test_parse_rejects_unknown_unit() {
        assert!(matches!("5XB".parse::<ByteSize>(), Err(ParseError::InvalidUnit(_))));
        assert!(matches!("MB".parse::<ByteSize>(), Err(ParseError::InvalidFormat(_))));
    }

    #[test]
    fn test_parse_durations() {
        assert_eq!("500ms".parse::<HumanDuration>().unwrap().as_duration(), Duration::from_millis(500));
        assert_eq!("1s".parse::<HumanDuration>().unwrap().as_duration(), Duration::from_secs(1));
        assert_eq!("2m".parse::<HumanDuration>().unwrap().as_duration(), Duration::from_secs(120));
        assert_eq!("250".parse::<HumanDuration>().unwrap().as_duration(), Duration::from_millis(250));
        assert!("1 fortnight".parse::<HumanDuration>().is_err());
    }

    #[test]
    fn test_duration_display() {
        assert_eq!(HumanDuration::from_millis(500).to_string(), "500ms");
        assert_eq!(HumanDuration::from_secs(60).to_string(), "1m");
        assert_eq!(HumanDuration::from_millis(1500).to_string(), "1500ms");
        assert_eq!(HumanDuration::from_secs(0).to_string(), "0ms");
    }

    #[test]
    fn test_deserialize_duration() {
        #[derive(Deserialize)]
        struct TestStruct {
            delay: HumanDuration,
            timeout: HumanDuration,
        }
        let parsed: TestStruct = serde_json::from_str(r#"{"delay": "1s", "timeout": 750}"#).unwrap();
        assert_eq!(parsed.delay.as_duration(), Duration::from_secs(1));
        assert_eq!(parsed.timeout.as_duration(), Duration::from_millis(750));
    }

    #[test]
    fn test_to_human_readable() {
        assert_eq!(ByteSize(1024).to_human_readable(), "1KB");
        assert_eq!(ByteSize(5 * 1024 * 1024).to_human_readable(), "5MB");
        assert_eq!(ByteSize(50 * 1024 * 1024 * 1024).to_human_readable(), "50GB");
    }

    #[test]
    fn test_deserialize_string() {
        let json = r#"{"size": "10MB"}"#;
        #[derive(Deserialize)]
        struct TestStruct {
            size: ByteSize,
        }
        let parsed: TestStruct = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.size.as_u64(), 10 * 1024 * 1024);
    }

    #[test]
    fn test_deserialize_number() {
        let json = r#"{"size": 1024}"#;
        #[derive(Deserialize)]
        struct TestStruct {
            size: ByteSize,
        }
        let parsed: TestStruct = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.size.as_u64(), 1024);
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", ByteSize(1024)), "1KB");
        assert_eq!(format!("{}", ByteSize(5 * 1024 * 1024)), "5MB");
    }
}
