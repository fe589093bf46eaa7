use crate::{IdParts, Layout, Result, TimeSource, WallClock, base36, time::SNOWSTORM_EPOCH};
use core::time::Duration;
use parking_lot::Mutex;

#[cfg(feature = "tracing")]
use tracing::instrument;


/// Configurable options for [`IdFactory::new`].
#[derive(Clone, Copy, Debug)]
pub struct FactoryOptions {
    /// Identifies this generator instance. Masked to `server_bits` bits.
    pub server_id: i64,

    /// Number of bits used to encode the server id. Defaults to 10.
    pub server_bits: u32,

    /// Number of bits in the per-tick sequence. Defaults to 12.
    pub sequence_bits: u32,

    /// Tick zero, as a [`Duration`] since the Unix epoch. Defaults to
    /// [`SNOWSTORM_EPOCH`].
    pub epoch: Duration,
}

impl Default for FactoryOptions {
    fn default() -> Self {
        let layout = Layout::default();
        Self {
            server_id: 0,
            server_bits: layout.server_bits(),
            sequence_bits: layout.sequence_bits(),
            epoch: SNOWSTORM_EPOCH,
        }
    }
}

#[derive(Debug, Default)]
struct State {
    sequence: i64,
    last_timestamp: i64,
}

/// A lock-based Snowflake ID factory.
///
/// Every call to [`IdFactory::id_n`] runs as a single critical section, so a
/// batch is contiguous and the factory can be shared freely across threads
/// (wrap it in an [`Arc`] to hand it to a [`Pool`]).
///
/// ## Guarantees
/// - ✅ Strictly increasing ids within and across calls
/// - ✅ Never blocks waiting for the clock: when a tick's sequence space is
///   exhausted, the factory moves to the next tick ahead of wall time
/// - ❌ Does not resynchronize a virtual clock that ran ahead; sustained
///   overload skews timestamps forward
///
/// # Example
/// ```
/// use snowstorm::{FactoryOptions, IdFactory};
///
/// let factory = IdFactory::new(FactoryOptions {
///     server_id: 7,
///     ..FactoryOptions::default()
/// })
/// .unwrap();
///
/// let ids = factory.id_n(3);
/// assert!(ids[0] < ids[1] && ids[1] < ids[2]);
/// assert_eq!(factory.decompose(ids[0]).server_id, 7);
/// ```
///
/// [`Arc`]: std::sync::Arc
/// [`Pool`]: crate::Pool
pub struct IdFactory<T = WallClock> {
    server_id: i64,
    layout: Layout,
    state: Mutex<State>,
    time: T,
}

impl IdFactory<WallClock> {
    /// Creates a factory reading the wall clock relative to
    /// `options.epoch`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] when the bit split leaves fewer than
    /// 41 bits for the timestamp.
    ///
    /// [`Error::InvalidConfig`]: crate::Error::InvalidConfig
    pub fn new(options: FactoryOptions) -> Result<Self> {
        let layout = Layout::new(options.server_bits, options.sequence_bits)?;
        Ok(Self::with_time(
            options.server_id,
            layout,
            WallClock::with_epoch(options.epoch),
        ))
    }
}

impl<T: TimeSource> IdFactory<T> {
    /// Creates a factory from an already validated [`Layout`] and an explicit
    /// [`TimeSource`].
    pub fn with_time(server_id: i64, layout: Layout, time: T) -> Self {
        Self {
            server_id: server_id & layout.server_mask(),
            layout,
            state: Mutex::new(State::default()),
            time,
        }
    }

    /// Allocates the next `n` ids.
    ///
    /// For each id the clock is sampled once. If the tick has not moved past
    /// the last one used, the sequence is incremented; once it reaches
    /// `2^sequence_bits` it wraps to zero and the factory's timestamp is
    /// pushed one tick forward instead of waiting.
    #[cfg_attr(feature = "tracing", instrument(level = "trace", skip(self)))]
    pub fn id_n(&self, n: usize) -> Vec<i64> {
        let mut state = self.state.lock();
        (0..n).map(|_| self.next_locked(&mut state)).collect()
    }

    /// Allocates a single id.
    pub fn id(&self) -> i64 {
        let mut state = self.state.lock();
        self.next_locked(&mut state)
    }

    #[inline]
    fn next_locked(&self, state: &mut State) -> i64 {
        let tick = self.time.current_millis();
        if tick <= state.last_timestamp {
            state.sequence += 1;
            if state.sequence == self.layout.sequence_max() {
                state.sequence = 0;
                state.last_timestamp += 1;
            }
        } else {
            state.sequence = 0;
            state.last_timestamp = tick;
        }

        self.layout
            .compose(state.last_timestamp, self.server_id, state.sequence)
    }

    /// Allocates the next `n` ids rendered as base36 strings (`0-9a-z`).
    pub fn string_n(&self, n: usize) -> Vec<String> {
        self.id_n(n).into_iter().map(base36::encode).collect()
    }

    /// The (masked) server id embedded in every id.
    pub const fn server_id(&self) -> i64 {
        self.server_id
    }

    pub const fn layout(&self) -> Layout {
        self.layout
    }

    /// Splits an id produced by this factory into its fields.
    pub const fn decompose(&self, id: i64) -> IdParts {
        self.layout.decompose(id)
    }
}
