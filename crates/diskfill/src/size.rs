//! Human-readable sizes.

use std::str::FromStr;

use diskfill_distribution::ByteSize;

/// The binary units we understand, by their suffix.
const UNITS: [(char, ByteSize); 4] = [
    ('K', 1 << 10),
    ('M', 1 << 20),
    ('G', 1 << 30),
    ('T', 1 << 40),
];

/// The requested amount of space to fill.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeRequest {
    /// All of the free space.
    Full,
    /// A specific amount of bytes.
    Bytes(ByteSize),
}

/// An error that can occur when parsing a [`SizeRequest`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseSizeError {
    /// Nothing to parse.
    #[error("the size is empty")]
    Empty,
    /// The value is not a size.
    #[error("invalid size {0:?}, expected a number with an optional K/M/G/T suffix, or \"full\"")]
    Invalid(String),
    /// The value doesn't fit in the byte size type.
    #[error("size {0:?} is too large")]
    TooLarge(String),
}

/// The multiplier for the unit suffix, if that's a unit.
fn unit_multiplier(suffix: char) -> Option<ByteSize> {
    let suffix = suffix.to_ascii_uppercase();
    UNITS
        .iter()
        .find(|(unit, _)| *unit == suffix)
        .map(|(_, multiplier)| *multiplier)
}

impl FromStr for SizeRequest {
    type Err = ParseSizeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ParseSizeError::Empty);
        }
        if s.eq_ignore_ascii_case("full") {
            return Ok(Self::Full);
        }

        let invalid = || ParseSizeError::Invalid(s.to_owned());

        let Some((suffix_pos, suffix)) = s.char_indices().last() else {
            return Err(invalid());
        };
        let Some(multiplier) = unit_multiplier(suffix) else {
            // No suffix, plain bytes.
            return s.parse().map(Self::Bytes).map_err(|_| invalid());
        };

        // The mantissa may be fractional, the result is truncated to whole
        // bytes.
        let mantissa: f64 = s[..suffix_pos].trim().parse().map_err(|_| invalid())?;
        if !mantissa.is_finite() || mantissa < 0.0 {
            return Err(invalid());
        }
        let bytes = mantissa * multiplier as f64;
        if bytes >= ByteSize::MAX as f64 {
            return Err(ParseSizeError::TooLarge(s.to_owned()));
        }
        Ok(Self::Bytes(bytes as ByteSize))
    }
}
