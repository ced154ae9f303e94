//! Decimal amounts at the API boundary.
//!
//! The engine stores every amount as an `i64` count of minor units. `Money`
//! converts between that and the decimal strings callers send and read.

use std::{fmt, str::FromStr};

use crate::EngineError;

const FRACTION_DIGITS: usize = 2;
const MINOR_PER_MAJOR: i64 = 100;

/// Signed amount in minor units.
///
/// ```rust
/// use engine::Money;
///
/// assert_eq!(Money::new(1234).to_string(), "12.34");
/// assert_eq!("100.50".parse::<Money>().unwrap().minor(), 10050);
/// assert_eq!("10,5".parse::<Money>().unwrap().minor(), 1050);
/// assert!("12.345".parse::<Money>().is_err());
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Money(i64);

impl Money {
    #[must_use]
    pub const fn new(minor: i64) -> Self {
        Self(minor)
    }

    #[must_use]
    pub const fn minor(self) -> i64 {
        self.0
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let abs = self.0.unsigned_abs();
        let scale = MINOR_PER_MAJOR.unsigned_abs();
        if self.0 < 0 {
            f.write_str("-")?;
        }
        write!(
            f,
            "{}.{:0width$}",
            abs / scale,
            abs % scale,
            width = FRACTION_DIGITS
        )
    }
}

fn invalid_amount(reason: &str) -> EngineError {
    EngineError::InvalidAmount(reason.to_string())
}

fn all_digits(value: &str) -> bool {
    value.bytes().all(|b| b.is_ascii_digit())
}

impl FromStr for Money {
    type Err = EngineError;

    /// Parse `[+-]major[(.|,)fraction]` with at most two fraction digits.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let input = s.trim();
        let (negative, unsigned) = match input.as_bytes().first() {
            None => return Err(invalid_amount("empty amount")),
            Some(b'-') => (true, input[1..].trim_start()),
            Some(b'+') => (false, input[1..].trim_start()),
            Some(_) => (false, input),
        };
        if unsigned.is_empty() {
            return Err(invalid_amount("empty amount"));
        }

        let (major, fraction) = match unsigned.split_once(['.', ',']) {
            Some((major, fraction)) => (major, fraction),
            None => (unsigned, ""),
        };
        if major.is_empty() || !all_digits(major) || !all_digits(fraction) {
            return Err(invalid_amount("invalid amount"));
        }
        if fraction.len() > FRACTION_DIGITS {
            return Err(invalid_amount("too many decimals"));
        }

        let padded = format!("{fraction:0<width$}", width = FRACTION_DIGITS);
        let fraction: i64 = padded
            .parse()
            .map_err(|_| invalid_amount("invalid amount"))?;
        let magnitude = major
            .parse::<i64>()
            .ok()
            .and_then(|major| major.checked_mul(MINOR_PER_MAJOR))
            .and_then(|minor| minor.checked_add(fraction))
            .ok_or_else(|| invalid_amount("amount too large"))?;

        Ok(Money(if negative { -magnitude } else { magnitude }))
    }
}
