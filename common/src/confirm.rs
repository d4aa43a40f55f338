//! Two-step confirmation in front of consuming fetches.
//!
//! Fetching a paste spends one of its views, so a single request only arms
//! the identifier. Requesting the same identifier again before the arm window
//! closes is the confirmation, and is the only way a fetch gets issued.
//!
//! The machine performs no I/O. Callers pass in the current time, schedule
//! their own expiry timers, and report fetch results back through
//! [`ConfirmMachine::complete`].

use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::error::{ServiceError, ViewError};
use crate::estimate::{RemainingViews, ViewEstimates};
use crate::PasteView;

/// How long an armed identifier waits for its confirming request.
pub const ARM_WINDOW: Duration = Duration::from_secs(5);

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ViewState {
    Idle,
    Armed { id: String, deadline: Instant },
    Fetching { id: String },
    Displayed { id: String, view: PasteView },
    Unavailable { id: String, error: ViewError },
}

/// What the caller must do after a request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Step {
    /// Schedule an expiry for this deadline.
    Armed { deadline: Instant },
    /// Issue the consuming fetch.
    Fetch,
    /// A fetch is already outstanding; nothing to do.
    InFlight,
    /// The identifier was blank. The machine is now `Unavailable`.
    Rejected,
}

#[derive(Debug)]
pub struct ConfirmMachine {
    state: ViewState,
    window: Duration,
}

impl Default for ConfirmMachine {
    fn default() -> Self {
        Self::new(ARM_WINDOW)
    }
}

impl ConfirmMachine {
    #[must_use]
    pub const fn new(window: Duration) -> Self {
        Self {
            state: ViewState::Idle,
            window,
        }
    }

    #[must_use]
    pub const fn state(&self) -> &ViewState {
        &self.state
    }

    /// Whether the next request for `id` would be a confirmation.
    #[must_use]
    pub fn is_armed_for(&self, id: &str, now: Instant) -> bool {
        matches!(&self.state, ViewState::Armed { id: armed, deadline } if armed == id && now < *deadline)
    }

    pub fn request(&mut self, id: &str, now: Instant) -> Step {
        if let ViewState::Fetching { id: fetching } = &self.state {
            debug!(%id, %fetching, "Ignoring request while a fetch is in flight");
            return Step::InFlight;
        }

        if id.trim().is_empty() {
            debug!("Rejecting request without an identifier");
            self.state = ViewState::Unavailable {
                id: id.to_owned(),
                error: ViewError::MissingIdentifier,
            };
            return Step::Rejected;
        }

        if self.is_armed_for(id, now) {
            debug!(%id, "Confirmed; fetching");
            self.state = ViewState::Fetching { id: id.to_owned() };
            return Step::Fetch;
        }

        let deadline = now + self.window;
        debug!(%id, "Armed");
        self.state = ViewState::Armed {
            id: id.to_owned(),
            deadline,
        };
        Step::Armed { deadline }
    }

    /// Delivers an expiry timer. Only disarms when the arm it was scheduled
    /// for is still the current one, so stale timers are no-ops.
    pub fn expire(&mut self, id: &str, deadline: Instant) -> bool {
        match &self.state {
            ViewState::Armed {
                id: armed,
                deadline: current,
            } if armed == id && *current == deadline => {
                debug!(%id, "Arm window elapsed");
                self.state = ViewState::Idle;
                true
            }
            _ => false,
        }
    }

    /// Applies the result of a consuming fetch, reconciling the estimate from
    /// whatever the service reported. A `null` view count leaves the estimate
    /// as it was.
    pub fn complete(
        &mut self,
        id: &str,
        result: Result<PasteView, ServiceError>,
        estimates: &mut ViewEstimates,
    ) -> &ViewState {
        match &result {
            Ok(PasteView {
                remaining_views: Some(remaining),
                ..
            }) => estimates.record(id, RemainingViews::Finite(*remaining)),
            Err(ServiceError::NotFound { .. }) => estimates.exhaust(id),
            _ => (),
        }

        if !matches!(&self.state, ViewState::Fetching { id: fetching } if fetching == id) {
            warn!(%id, state = ?self.state, "Fetch completed outside of its fetching state");
            return &self.state;
        }

        self.state = match result {
            Ok(view) => ViewState::Displayed {
                id: id.to_owned(),
                view,
            },
            Err(e) => {
                let error = ViewError::from(e);
                debug!(%id, %error, "Paste unavailable");
                ViewState::Unavailable {
                    id: id.to_owned(),
                    error,
                }
            }
        };

        &self.state
    }
}
