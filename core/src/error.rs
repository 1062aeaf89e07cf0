use std::collections::TryReserveError;

use thiserror::Error;

/// Errors surfaced by engine construction and the weighted lookups.
///
/// Runtime misuse (stale handles, enabling a tag-blocked effect, …) is not
/// represented here: those calls log a warning and do nothing.
#[derive(Debug, Error)]
pub enum ChaosError {
    #[error("failed to allocate {count} {what} slots")]
    Allocation {
        what: &'static str,
        count: usize,
        #[source]
        source: TryReserveError,
    },

    #[error("disturbance tier {0} is out of range")]
    InvalidTier(u8),

    #[error("weight tree lookup found no effect for weight {weight} of total {total}")]
    WeightLookup { weight: f64, total: f64 },
}

impl ChaosError {
    pub(crate) fn allocation(what: &'static str, count: usize, source: TryReserveError) -> Self {
        Self::Allocation {
            what,
            count,
            source,
        }
    }
}
