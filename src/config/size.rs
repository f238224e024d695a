//! Human-readable byte sizes such as `100M` or `1.5G`.
//!
//! [`ByteSize`] deserializes from either a plain integer or a string with
//! a single-letter binary unit suffix (`B`, `K`, `M`, `G`, `T`, case
//! insensitive). It serializes back to the shortest exact suffixed form.

use std::fmt;
use std::str::FromStr;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

const UNITS: [(char, u64); 5] = [
    ('T', 1 << 40),
    ('G', 1 << 30),
    ('M', 1 << 20),
    ('K', 1 << 10),
    ('B', 1),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ByteSize(pub u64);

impl ByteSize {
    #[must_use]
    pub const fn mib(n: u64) -> Self {
        Self(n << 20)
    }

    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Clamp to `usize` for APIs that take an in-memory length.
    #[must_use]
    pub fn as_usize(self) -> usize {
        usize::try_from(self.0).unwrap_or(usize::MAX)
    }
}

fn unit_multiplier(unit: char) -> Option<u64> {
    let upper = unit.to_ascii_uppercase();
    UNITS.iter().find(|(u, _)| *u == upper).map(|(_, m)| *m)
}

impl FromStr for ByteSize {
    type Err = String;

    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err("size cannot be empty".into());
        }

        if let Ok(n) = s.parse::<u64>() {
            return Ok(Self(n));
        }

        let Some(last) = s.chars().last() else {
            return Err("size cannot be empty".into());
        };
        let Some(multiplier) = unit_multiplier(last) else {
            return Err(format!(
                "'{s}' has an unknown unit (expected one of B, K, M, G, T)"
            ));
        };

        let number = &s[..s.len() - last.len_utf8()];
        let value: f64 = number
            .trim()
            .parse()
            .map_err(|_| format!("'{s}' is not a valid size"))?;
        if !value.is_finite() || value < 0.0 {
            return Err(format!("'{s}' must be a non-negative number"));
        }

        let bytes = (value * multiplier as f64).floor();
        if bytes > u64::MAX as f64 {
            return Err(format!("'{s}' is too large"));
        }
        Ok(Self(bytes as u64))
    }
}

impl fmt::Display for ByteSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 == 0 {
            return write!(f, "0");
        }
        for (unit, multiplier) in UNITS {
            if multiplier > 1 && self.0 % multiplier == 0 {
                return write!(f, "{}{unit}", self.0 / multiplier);
            }
        }
        write!(f, "{}", self.0)
    }
}

impl Serialize for ByteSize {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

struct ByteSizeVisitor;

impl Visitor<'_> for ByteSizeVisitor {
    type Value = ByteSize;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a byte count or a size string like \"100M\"")
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
        Ok(ByteSize(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
        u64::try_from(v)
            .map(ByteSize)
            .map_err(|_| E::custom("size cannot be negative"))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
        v.parse().map_err(E::custom)
    }
}

impl<'de> Deserialize<'de> for ByteSize {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(ByteSizeVisitor)
    }
}
