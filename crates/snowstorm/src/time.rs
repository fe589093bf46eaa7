use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Default epoch: Friday, January 1, 2016 00:00:00 UTC
pub const SNOWSTORM_EPOCH: Duration = Duration::from_millis(1_451_606_400_000);

/// Twitter epoch: Thursday, November 4, 2010 1:42:54.657 UTC
pub const TWITTER_EPOCH: Duration = Duration::from_millis(1_288_834_974_657);

/// Discord epoch: Thursday, January 1, 2015 00:00:00 UTC
pub const DISCORD_EPOCH: Duration = Duration::from_millis(1_420_070_400_000);

/// A source of millisecond ticks relative to a fixed epoch.
///
/// The factory samples this once per allocated id. Plug in [`WallClock`] for
/// production or a fixed/mock clock in tests.
///
/// # Example
///
/// ```
/// use snowstorm::TimeSource;
///
/// struct FixedTime;
/// impl TimeSource for FixedTime {
///     fn current_millis(&self) -> i64 {
///         1234
///     }
/// }
///
/// assert_eq!(FixedTime.current_millis(), 1234);
/// ```
pub trait TimeSource {
    /// Returns the current time in milliseconds since the configured epoch.
    fn current_millis(&self) -> i64;
}

impl<T: TimeSource + ?Sized> TimeSource for std::sync::Arc<T> {
    fn current_millis(&self) -> i64 {
        (**self).current_millis()
    }
}

/// Wall-clock time source offset from a custom epoch.
///
/// Reads [`SystemTime`] on every call. A clock stepping backwards is absorbed
/// by the factory, which keeps handing out ids from its last tick.
#[derive(Clone, Copy, Debug)]
pub struct WallClock {
    epoch_millis: i64,
}

impl Default for WallClock {
    /// Constructs a wall clock aligned to [`SNOWSTORM_EPOCH`].
    fn default() -> Self {
        Self::with_epoch(SNOWSTORM_EPOCH)
    }
}

impl WallClock {
    /// Constructs a wall clock using `epoch` (a [`Duration`] since
    /// 1970-01-01 UTC) as tick zero.
    pub fn with_epoch(epoch: Duration) -> Self {
        Self {
            epoch_millis: epoch.as_millis() as i64,
        }
    }

    /// The epoch in milliseconds since the Unix epoch.
    pub const fn epoch_millis(&self) -> i64 {
        self.epoch_millis
    }
}

impl TimeSource for WallClock {
    fn current_millis(&self) -> i64 {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as i64;
        now - self.epoch_millis
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wall_clock_is_relative_to_epoch() {
        let unix = WallClock::with_epoch(Duration::ZERO);
        let custom = WallClock::default();

        let delta = unix.current_millis() - custom.current_millis();
        // Both samples are taken within a few ms of each other
        assert!((delta - SNOWSTORM_EPOCH.as_millis() as i64).abs() < 1_000);
        assert!(custom.current_millis() > 0);
    }
}
