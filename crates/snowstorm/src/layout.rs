use crate::{Error, Result};

/// Bits reserved for the millisecond timestamp in every layout.
pub const TIMESTAMP_BITS: u32 = 41;

/// Default number of bits used to encode the server id.
pub const DEFAULT_SERVER_BITS: u32 = 10;

/// Default number of bits used to encode the per-tick sequence.
pub const DEFAULT_SEQUENCE_BITS: u32 = 12;

/// Returns `2^bits`, the number of distinct values a field of `bits` bits can
/// hold. Only meaningful for `bits < 63`: `max_value(63)` wraps to
/// `i64::MIN` and any wider field yields `0`, so [`mask`] still selects every
/// bit.
pub const fn max_value(bits: u32) -> i64 {
    match 1_i64.checked_shl(bits) {
        Some(value) => value,
        None => 0,
    }
}

/// Returns `2^bits - 1`, the bitmask selecting the low `bits` bits.
///
/// ```
/// assert_eq!(snowstorm::mask(4), 0xF);
/// ```
pub const fn mask(bits: u32) -> i64 {
    max_value(bits).wrapping_sub(1)
}

/// The bit split of a 64-bit id.
///
/// ```text
///  +--------------------+----------------------+------------------------+
///  | timestamp (rest)   | server id (server)   | sequence (sequence)    |
///  +--------------------+----------------------+------------------------+
///  |<-- MSB ----------------- 64 bits ------------------------- LSB -->|
/// ```
///
/// The timestamp always gets at least [`TIMESTAMP_BITS`] bits, so
/// `server_bits + sequence_bits + 41 <= 64`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Layout {
    server_bits: u32,
    sequence_bits: u32,
}

impl Default for Layout {
    fn default() -> Self {
        Self {
            server_bits: DEFAULT_SERVER_BITS,
            sequence_bits: DEFAULT_SEQUENCE_BITS,
        }
    }
}

impl Layout {
    /// Validates and constructs a layout.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if the server and sequence fields leave
    /// fewer than [`TIMESTAMP_BITS`] bits for the timestamp.
    pub fn new(server_bits: u32, sequence_bits: u32) -> Result<Self> {
        let used = server_bits
            .checked_add(sequence_bits)
            .and_then(|bits| bits.checked_add(TIMESTAMP_BITS));
        match used {
            Some(bits) if bits <= 64 => Ok(Self {
                server_bits,
                sequence_bits,
            }),
            _ => Err(Error::invalid_config(format!(
                "server bits ({server_bits}) + sequence bits ({sequence_bits}) + {TIMESTAMP_BITS} exceeds 64"
            ))),
        }
    }

    /// Returns true when `server_bits + sequence_bits + 41 <= 64`.
    pub fn is_valid(server_bits: u32, sequence_bits: u32) -> bool {
        Self::new(server_bits, sequence_bits).is_ok()
    }

    pub const fn server_bits(&self) -> u32 {
        self.server_bits
    }

    pub const fn sequence_bits(&self) -> u32 {
        self.sequence_bits
    }

    /// Number of ids a single tick can hold before the factory advances its
    /// virtual clock.
    pub const fn sequence_max(&self) -> i64 {
        max_value(self.sequence_bits)
    }

    pub const fn server_mask(&self) -> i64 {
        mask(self.server_bits)
    }

    pub const fn sequence_mask(&self) -> i64 {
        mask(self.sequence_bits)
    }

    /// Shift applied to the timestamp field.
    pub const fn timestamp_shift(&self) -> u32 {
        self.server_bits + self.sequence_bits
    }

    /// Packs the three fields into an id. `server_id` and `sequence` are
    /// masked to their widths.
    pub const fn compose(&self, timestamp: i64, server_id: i64, sequence: i64) -> i64 {
        (timestamp << self.timestamp_shift())
            | ((server_id & self.server_mask()) << self.sequence_bits)
            | (sequence & self.sequence_mask())
    }

    /// Splits an id produced with this layout back into its fields.
    ///
    /// ```
    /// use snowstorm::{IdParts, Layout};
    ///
    /// let layout = Layout::new(4, 2).unwrap();
    /// let id = layout.compose(1000, 3, 1);
    /// assert_eq!(
    ///     layout.decompose(id),
    ///     IdParts { timestamp: 1000, server_id: 3, sequence: 1 }
    /// );
    /// ```
    pub const fn decompose(&self, id: i64) -> IdParts {
        IdParts {
            timestamp: id >> self.timestamp_shift(),
            server_id: (id >> self.sequence_bits) & self.server_mask(),
            sequence: id & self.sequence_mask(),
        }
    }
}

/// The fields of a decomposed id.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct IdParts {
    /// Milliseconds since the factory's epoch (virtual clock).
    pub timestamp: i64,
    pub server_id: i64,
    pub sequence: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mask_matches_power_of_two_minus_one() {
        let expected = [
            (1, 0x1),
            (2, 0x3),
            (3, 0x7),
            (4, 0xf),
            (5, 0x1f),
            (6, 0x3f),
            (7, 0x7f),
            (8, 0xff),
        ];
        for (bits, m) in expected {
            assert_eq!(mask(bits), m, "mask({bits})");
            assert_eq!(max_value(bits), m + 1);
        }
    }

    #[test]
    fn mask_handles_full_width() {
        assert_eq!(mask(0), 0);
        assert_eq!(mask(63), i64::MAX);
    }

    #[test]
    fn oversized_widths_saturate_to_all_bits() {
        assert_eq!(max_value(63), i64::MIN);
        assert_eq!(max_value(64), 0);
        assert_eq!(max_value(u32::MAX), 0);
        assert_eq!(mask(64), -1);
        assert_eq!(mask(200), -1);
    }

    #[test]
    fn layout_rejects_oversized_split() {
        assert!(Layout::new(10, 12).is_ok());
        assert!(Layout::new(13, 10).is_ok());
        assert!(Layout::new(0, 0).is_ok());
        assert!(matches!(
            Layout::new(13, 11),
            Err(Error::InvalidConfig { .. })
        ));
        assert!(!Layout::is_valid(u32::MAX, 1));
    }

    #[test]
    fn compose_masks_out_of_range_fields() {
        let layout = Layout::new(4, 2).unwrap();
        let id = layout.compose(7, 0x1f, 0x7);
        let parts = layout.decompose(id);
        assert_eq!(parts.timestamp, 7);
        assert_eq!(parts.server_id, 0xf);
        assert_eq!(parts.sequence, 0x3);
    }
}
