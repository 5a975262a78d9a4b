//! A time span that binds from Go-style strings such as `"1h30m"`.

use std::{fmt, str::FromStr, time};

use facet::Facet;

const NANOS_PER_SEC: u128 = 1_000_000_000;

/// A span of time, bound from strings like `"1h30m"`, `"1.5s"` or `"250ms"`,
/// or from an integer number of nanoseconds.
///
/// Converts to and from [`std::time::Duration`].
#[derive(Facet, Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Duration {
    nanos: u64,
}

impl Duration {
    /// The empty span.
    pub const ZERO: Duration = Duration { nanos: 0 };

    /// A span of `nanos` nanoseconds.
    pub const fn from_nanos(nanos: u64) -> Self {
        Duration { nanos }
    }

    /// A span of `millis` milliseconds, saturating at the maximum span.
    pub const fn from_millis(millis: u64) -> Self {
        Duration {
            nanos: millis.saturating_mul(1_000_000),
        }
    }

    /// A span of `secs` seconds, saturating at the maximum span.
    pub const fn from_secs(secs: u64) -> Self {
        Duration {
            nanos: secs.saturating_mul(1_000_000_000),
        }
    }

    /// Length of the span in nanoseconds.
    pub const fn as_nanos(&self) -> u64 {
        self.nanos
    }

    /// Returns true for the empty span.
    pub const fn is_zero(&self) -> bool {
        self.nanos == 0
    }
}

impl From<Duration> for time::Duration {
    fn from(value: Duration) -> Self {
        time::Duration::from_nanos(value.nanos)
    }
}

impl TryFrom<time::Duration> for Duration {
    type Error = DurationError;

    fn try_from(value: time::Duration) -> Result<Self, Self::Error> {
        u64::try_from(value.as_nanos())
            .map(Duration::from_nanos)
            .map_err(|_| DurationError(format!("{value:?} does not fit in 64-bit nanoseconds")))
    }
}

impl fmt::Display for Duration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", time::Duration::from(*self))
    }
}

impl FromStr for Duration {
    type Err = DurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_duration(s)
    }
}

/// A string that is not a valid duration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DurationError(String);

impl fmt::Display for DurationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for DurationError {}

/// Parses durations written like `"1h30m"`, `"1.5s"` or `"250ms"`.
pub(crate) fn parse_duration(text: &str) -> Result<Duration, DurationError> {
    let invalid = || DurationError(format!("invalid duration {text:?}"));
    let overflow = || DurationError(format!("duration {text:?} is out of range"));

    let s = text.trim();
    if s == "0" {
        return Ok(Duration::ZERO);
    }
    let mut rest = s.strip_prefix('+').unwrap_or(s);
    if rest.is_empty() {
        return Err(invalid());
    }

    let mut nanos: u128 = 0;
    while !rest.is_empty() {
        let number_end = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        if number_end == 0 {
            return Err(invalid());
        }
        let (number, tail) = rest.split_at(number_end);
        let unit_end = tail
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(tail.len());
        let (unit, tail) = tail.split_at(unit_end);
        rest = tail;

        let scale: u128 = match unit {
            "ns" => 1,
            "us" | "µs" | "μs" => 1_000,
            "ms" => 1_000_000,
            "s" => NANOS_PER_SEC,
            "m" => 60 * NANOS_PER_SEC,
            "h" => 3_600 * NANOS_PER_SEC,
            "" => return Err(DurationError(format!("missing unit in duration {text:?}"))),
            other => {
                return Err(DurationError(format!(
                    "unknown unit {other:?} in duration {text:?}"
                )));
            }
        };

        let (whole, fraction) = number.split_once('.').unwrap_or((number, ""));
        if whole.is_empty() && fraction.is_empty() {
            return Err(invalid());
        }
        if !whole.is_empty() {
            let whole: u128 = whole.parse().map_err(|_| overflow())?;
            nanos = whole
                .checked_mul(scale)
                .and_then(|n| nanos.checked_add(n))
                .ok_or_else(overflow)?;
        }
        if !fraction.is_empty() {
            let digits = &fraction[..fraction.len().min(18)];
            let value: u128 = digits.parse().map_err(|_| invalid())?;
            let part = value
                .checked_mul(scale)
                .map(|n| n / 10u128.pow(digits.len() as u32))
                .ok_or_else(overflow)?;
            nanos = nanos.checked_add(part).ok_or_else(overflow)?;
        }
    }

    u64::try_from(nanos)
        .map(Duration::from_nanos)
        .map_err(|_| overflow())
}
