//! Error types for ID allocation and prefetching.
//!
//! ## Error Cases
//! - `InvalidConfig`: a factory or pool was built with out-of-range settings.
//!   Construction fails fast; nothing is spawned.
//! - `Fetch`, `FetchTimeout`, `ShortBatch`: a [`Source`] attempt failed. Pool
//!   workers absorb these and retry with backoff; they never reach an id
//!   consumer.
//! - `InvalidBase36`: a string could not be decoded as a base36 id.
//!
//! [`Source`]: crate::Source

use core::time::Duration;

/// Boxed error used to carry transport failures across the [`Source`]
/// boundary.
///
/// [`Source`]: crate::Source
pub type BoxError = Box<dyn core::error::Error + Send + Sync + 'static>;

pub type Result<T, E = Error> = core::result::Result<T, E>;

/// All errors `snowstorm` can produce.
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// A factory or pool setting is out of range.
    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    /// The underlying source failed to produce a batch.
    #[error("Fetch failed: {0}")]
    Fetch(#[source] BoxError),

    /// A single fetch attempt exceeded its deadline.
    #[error("Fetch timed out after {0:?}")]
    FetchTimeout(Duration),

    /// A source reported success but returned the wrong number of ids.
    #[error("Expected {expected} ids, received {received}")]
    ShortBatch { expected: usize, received: usize },

    /// The input is not a valid base36 encoded id.
    #[error("Invalid base36 id: {input:?}")]
    InvalidBase36 { input: String },
}

impl Error {
    pub(crate) fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    /// Wraps any transport error as a [`Error::Fetch`].
    pub fn fetch<E>(err: E) -> Self
    where
        E: Into<BoxError>,
    {
        Self::Fetch(err.into())
    }
}
