//! Local, advisory remaining-view counts.
//!
//! The service is the only authority on whether a view is granted. These
//! values only inform the user and are never consulted before a fetch.

use std::collections::HashMap;
use std::fmt::Display;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RemainingViews {
    Finite(u64),
    Unlimited,
}

impl From<Option<u64>> for RemainingViews {
    fn from(views: Option<u64>) -> Self {
        views.map_or(Self::Unlimited, Self::Finite)
    }
}

impl Display for RemainingViews {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Finite(1) => write!(f, "1 view remaining"),
            Self::Finite(n) => write!(f, "{} views remaining", n),
            Self::Unlimited => write!(f, "unlimited views"),
        }
    }
}

/// Per-identifier estimates. A missing entry means nothing is known yet.
#[derive(Clone, Debug, Default)]
pub struct ViewEstimates {
    inner: HashMap<String, RemainingViews>,
}

impl ViewEstimates {
    #[must_use]
    pub fn get(&self, id: &str) -> Option<RemainingViews> {
        self.inner.get(id).copied()
    }

    /// Seeds the estimate from the limit the author asked for.
    pub fn seed(&mut self, id: &str, max_views: u64) {
        self.record(id, RemainingViews::Finite(max_views));
    }

    /// Overwrites the estimate with a value reported by the service.
    pub fn record(&mut self, id: &str, views: RemainingViews) {
        self.inner.insert(id.to_owned(), views);
    }

    /// The service no longer has the paste.
    pub fn exhaust(&mut self, id: &str) {
        self.record(id, RemainingViews::Finite(0));
    }
}
