use core::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::ModerationError;

pub const MINUTE: u64 = 60;
pub const HOUR: u64 = 60 * MINUTE;
pub const DAY: u64 = 24 * HOUR;
/// 365 days, leap days are ignored.
pub const YEAR: u64 = 365 * DAY;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeUnit {
    Seconds,
    Minutes,
    Hours,
    Days,
    Years,
}

impl TimeUnit {
    pub fn from_suffix(suffix: char) -> Option<Self> {
        match suffix {
            's' => Some(Self::Seconds),
            'm' => Some(Self::Minutes),
            'h' => Some(Self::Hours),
            'd' => Some(Self::Days),
            'y' => Some(Self::Years),
            _ => None,
        }
    }

    pub fn seconds(&self) -> u64 {
        match self {
            Self::Seconds => 1,
            Self::Minutes => MINUTE,
            Self::Hours => HOUR,
            Self::Days => DAY,
            Self::Years => YEAR,
        }
    }
}

/// How long a mute lasts, parsed from inputs like `10m`, `2d` or a bare `30`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MuteDuration {
    Permanent,
    Timed(Duration),
}

impl MuteDuration {
    /// An empty input or a zero amount means a permanent mute.
    pub fn parse(input: &str) -> Result<Self, ModerationError> {
        let input = input.trim();
        let Some(last) = input.chars().last() else {
            return Ok(Self::Permanent);
        };

        let (amount, unit) = if last.is_ascii_alphabetic() {
            let unit = TimeUnit::from_suffix(last).ok_or_else(|| {
                ModerationError::InvalidDuration(format!("unknown unit `{last}` in `{input}`"))
            })?;
            (&input[..input.len() - last.len_utf8()], unit)
        } else {
            (input, TimeUnit::Seconds)
        };

        let amount: i64 = amount.parse().map_err(|e| {
            ModerationError::InvalidDuration(format!("`{input}` is not an amount of time, {e}"))
        })?;
        if amount < 0 {
            return Err(ModerationError::InvalidDuration(format!(
                "`{input}` is negative"
            )));
        }

        let seconds = amount.unsigned_abs().checked_mul(unit.seconds()).ok_or_else(|| {
            ModerationError::InvalidDuration(format!("`{input}` is too long"))
        })?;
        Ok(Self::from_secs(seconds))
    }

    pub fn from_secs(seconds: u64) -> Self {
        match seconds {
            0 => Self::Permanent,
            secs => Self::Timed(Duration::from_secs(secs)),
        }
    }

    pub fn as_secs(&self) -> Option<u64> {
        match self {
            Self::Permanent => None,
            Self::Timed(duration) => Some(duration.as_secs()),
        }
    }

    pub fn is_permanent(&self) -> bool {
        matches!(self, Self::Permanent)
    }
}

impl FromStr for MuteDuration {
    type Err = ModerationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for MuteDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Permanent => write!(f, "permanently"),
            Self::Timed(duration) => write!(f, "for {}", humanize(duration.as_secs())),
        }
    }
}

/// Two most significant units of `secs`, e.g. `1 hour(s) 30 minute(s)`.
pub fn humanize(secs: u64) -> String {
    match secs {
        secs if secs < MINUTE => format!("{secs} second(s)"),
        secs if secs < HOUR => format!("{} minute(s) {} second(s)", secs / MINUTE, secs % MINUTE),
        secs if secs < DAY => format!(
            "{} hour(s) {} minute(s)",
            secs / HOUR,
            (secs % HOUR) / MINUTE
        ),
        _ => format!("{} day(s) {} hour(s)", secs / DAY, (secs % DAY) / HOUR),
    }
}
