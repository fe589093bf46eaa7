//! Compact base36 (`0-9`, `a-z`) rendering of ids.
//!
//! Negative values carry a leading `-`, matching the conventional
//! `i64 -> radix 36` formatting.

use crate::{Error, Result};

const ALPHABET: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Longest rendering of an `i64`: sign plus 13 digits.
const MAX_LEN: usize = 14;

/// Renders `id` in base36.
///
/// ```
/// assert_eq!(snowstorm::base36::encode(0), "0");
/// assert_eq!(snowstorm::base36::encode(35), "z");
/// assert_eq!(snowstorm::base36::encode(-36), "-10");
/// ```
pub fn encode(id: i64) -> String {
    let mut buf = [0_u8; MAX_LEN];
    let mut pos = MAX_LEN;
    let mut n = id.unsigned_abs();

    loop {
        pos -= 1;
        buf[pos] = ALPHABET[(n % 36) as usize];
        n /= 36;
        if n == 0 {
            break;
        }
    }
    if id < 0 {
        pos -= 1;
        buf[pos] = b'-';
    }

    buf[pos..].iter().map(|&b| b as char).collect()
}

/// Parses a base36 string produced by [`encode`]. Uppercase digits are
/// accepted.
///
/// # Errors
///
/// Returns [`Error::InvalidBase36`] for empty input, characters outside the
/// alphabet, or values that do not fit in an `i64`.
pub fn decode(input: &str) -> Result<i64> {
    let invalid = || Error::InvalidBase36 {
        input: input.to_owned(),
    };

    let (negative, digits) = match input.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, input),
    };
    if digits.is_empty() {
        return Err(invalid());
    }

    let mut value: u64 = 0;
    for b in digits.bytes() {
        let digit = match b {
            b'0'..=b'9' => b - b'0',
            b'a'..=b'z' => b - b'a' + 10,
            b'A'..=b'Z' => b - b'A' + 10,
            _ => return Err(invalid()),
        };
        value = value
            .checked_mul(36)
            .and_then(|v| v.checked_add(u64::from(digit)))
            .ok_or_else(invalid)?;
    }

    if negative {
        if value > i64::MIN.unsigned_abs() {
            return Err(invalid());
        }
        Ok((value as i64).wrapping_neg())
    } else {
        i64::try_from(value).map_err(|_| invalid())
    }
}
