//! CLI commands

use std::fmt::Display;
use std::time::Duration;

use clap::ValueEnum;

use crate::{Error, Result};

pub mod delete;

/// Extension trait to convert errors with Display to CLI Error::CommandFailed.
pub trait CommandErrorExt<T> {
    /// Convert an error to `Error::CommandFailed` using its Display implementation.
    fn cmd_err(self) -> Result<T>;
}

impl<T, E: Display> CommandErrorExt<T> for std::result::Result<T, E> {
    fn cmd_err(self) -> Result<T> {
        self.map_err(|e| Error::command_failed(e.to_string()))
    }
}

/// Output format
#[derive(Clone, Debug, Default, ValueEnum)]
pub enum OutputFormat {
    /// Columnar table (default)
    #[default]
    Table,
    /// JSON
    Json,
}

/// Parse a duration such as "90s", "25m", "1h" or "1h30m". A bare number is seconds.
pub fn parse_duration(s: &str) -> std::result::Result<Duration, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty duration".to_string());
    }
    if let Ok(secs) = s.parse::<u64>() {
        return Ok(Duration::from_secs(secs));
    }

    let mut total = 0u64;
    let mut digits = String::new();
    for c in s.chars() {
        if c.is_ascii_digit() {
            digits.push(c);
            continue;
        }
        let unit = match c {
            'h' => 3600,
            'm' => 60,
            's' => 1,
            _ => return Err(format!("invalid duration '{}': unknown unit '{}'", s, c)),
        };
        if digits.is_empty() {
            return Err(format!("invalid duration '{}': missing number before '{}'", s, c));
        }
        total = digits
            .parse::<u64>()
            .ok()
            .and_then(|n| n.checked_mul(unit))
            .and_then(|secs| total.checked_add(secs))
            .ok_or_else(|| format!("invalid duration '{}': too large", s))?;
        digits.clear();
    }
    if !digits.is_empty() {
        return Err(format!("invalid duration '{}': trailing number without unit", s));
    }
    Ok(Duration::from_secs(total))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn durations_parse() {
        assert_eq!(parse_duration("90s"), Ok(Duration::from_secs(90)));
        assert_eq!(parse_duration("25m"), Ok(Duration::from_secs(1500)));
        assert_eq!(parse_duration("1h"), Ok(Duration::from_secs(3600)));
        assert_eq!(parse_duration("1h30m"), Ok(Duration::from_secs(5400)));
        assert_eq!(parse_duration("45"), Ok(Duration::from_secs(45)));
    }

    #[test]
    fn bad_durations_are_rejected() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("m").is_err());
        assert!(parse_duration("10d").is_err());
        assert!(parse_duration("1h30").is_err());
    }

    #[test]
    fn oversized_durations_are_rejected() {
        assert!(parse_duration("9999999999999999999h").is_err());
        assert!(parse_duration("5124095576030431h1h").is_err());
        assert!(parse_duration("99999999999999999999s").is_err());
        assert_eq!(
            parse_duration("18446744073709551615s"),
            Ok(Duration::from_secs(u64::MAX))
        );
    }

    #[test]
    fn cmd_err_wraps_display() {
        let result: std::result::Result<(), &str> = Err("boom");
        match result.cmd_err() {
            Err(Error::CommandFailed { message }) => assert_eq!(message, "boom"),
            other => panic!("expected CommandFailed, got {other:?}"),
        }
    }
}
