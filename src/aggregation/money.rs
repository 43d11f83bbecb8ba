//! Money Module
//!
//! Fixed-point monetary amounts in integer minor units.

use std::fmt;

use serde::{Serialize, Serializer};

// == Money ==
/// A monetary amount in cents.
///
/// Arithmetic is exact integer arithmetic; amounts render as a decimal
/// string with two fraction digits so they never pass through a float.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Money(i64);

impl Money {
    pub const ZERO: Money = Money(0);

    pub const fn from_cents(cents: i64) -> Self {
        Self(cents)
    }

    pub const fn cents(self) -> i64 {
        self.0
    }

    /// Exact sum, or `None` on overflow.
    pub fn checked_sum<I>(amounts: I) -> Option<Money>
    where
        I: IntoIterator<Item = Money>,
    {
        let total: i128 = amounts.into_iter().map(|m| m.0 as i128).sum();
        i64::try_from(total).ok().map(Money)
    }

    /// Mean of `amounts`, rounded half away from zero to the cent.
    ///
    /// The mean of no amounts is zero.
    pub fn checked_mean<I>(amounts: I) -> Option<Money>
    where
        I: IntoIterator<Item = Money>,
    {
        let (total, count) = amounts
            .into_iter()
            .fold((0i128, 0i128), |(t, n), m| (t + m.0 as i128, n + 1));

        if count == 0 {
            return Some(Money::ZERO);
        }

        let quotient = total / count;
        let remainder = total % count;
        let rounded = if remainder.abs() * 2 >= count {
            quotient + total.signum()
        } else {
            quotient
        };
        i64::try_from(rounded).ok().map(Money)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{}{}.{:02}", sign, abs / 100, abs % 100)
    }
}

impl Serialize for Money {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
