use std::time::Instant;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::debug;

use crate::client::{submit, PasteService};
use crate::confirm::{ConfirmMachine, Step, ViewState};
use crate::draft::PasteDraft;
use crate::error::SubmitError;
use crate::estimate::{RemainingViews, ViewEstimates};
use crate::{id_from_input, PasteHandle, ViewerRoute};

/// Inputs to the view flow.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    /// The user asked to view a paste.
    Request(String),
    /// An arm window elapsed. Posted by the timer scheduled when arming.
    ArmExpired { id: String, deadline: Instant },
}

/// A single user's client: submissions, confirmed views, and the estimates
/// both of them maintain.
///
/// Events are processed one at a time. Expiry timers run as detached tasks
/// that post [`Event::ArmExpired`] back into the session's queue; they are
/// never cancelled, the state machine ignores them once they no longer match
/// the current arm.
pub struct Session<S> {
    service: S,
    route: ViewerRoute,
    machine: ConfirmMachine,
    estimates: ViewEstimates,
    tx: UnboundedSender<Event>,
    rx: UnboundedReceiver<Event>,
}

impl<S: PasteService> Session<S> {
    pub fn new(service: S, route: ViewerRoute) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            service,
            route,
            machine: ConfirmMachine::default(),
            estimates: ViewEstimates::default(),
            tx,
            rx,
        }
    }

    /// Waits for the next queued event.
    pub async fn next_event(&mut self) -> Option<Event> {
        self.rx.recv().await
    }

    pub fn state(&self) -> &ViewState {
        self.machine.state()
    }

    pub fn estimate(&self, id: &str) -> Option<RemainingViews> {
        self.estimates.get(id)
    }

    /// Whether requesting `id` right now would spend a view.
    pub fn is_armed_for(&self, id: &str) -> bool {
        self.machine.is_armed_for(id, now())
    }

    /// See [`submit`]. Does not touch the view flow.
    ///
    /// # Errors
    ///
    /// See [`SubmitError`].
    pub async fn submit(&mut self, draft: &PasteDraft) -> Result<PasteHandle, SubmitError> {
        submit(&self.service, &self.route, &mut self.estimates, draft).await
    }

    pub async fn request(&mut self, id: &str) -> &ViewState {
        match self.machine.request(id, now()) {
            Step::Armed { deadline } => self.schedule_expiry(id.to_owned(), deadline),
            Step::Fetch => {
                let result = self.service.fetch(id).await;
                self.machine.complete(id, result, &mut self.estimates);
            }
            Step::InFlight | Step::Rejected => (),
        }

        self.machine.state()
    }

    pub async fn handle(&mut self, event: Event) -> &ViewState {
        match event {
            Event::Request(id) => self.request(&id).await,
            Event::ArmExpired { id, deadline } => {
                self.machine.expire(&id, deadline);
                self.machine.state()
            }
        }
    }

    /// Opens a viewer link. Following a link is itself a deliberate act, so
    /// the arm and its confirmation are issued together.
    ///
    /// Returns `None` if no identifier can be found in `link`.
    pub async fn follow_link(&mut self, link: &str) -> Option<&ViewState> {
        let id = id_from_input(link)?;
        if !self.is_armed_for(&id) {
            self.request(&id).await;
        }
        Some(self.request(&id).await)
    }

    fn schedule_expiry(&self, id: String, deadline: Instant) {
        let tx = self.tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep_until(deadline.into()).await;
            debug!(%id, "Arm timer fired");
            // The session may be gone by now; nothing to disarm then.
            let _ = tx.send(Event::ArmExpired { id, deadline });
        });
    }
}

/// Read through tokio's clock so paused-time tests control it.
fn now() -> Instant {
    tokio::time::Instant::now().into_std()
}

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};
    use std::collections::VecDeque;

    use assert_matches::assert_matches;
    use async_trait::async_trait;

    use std::time::Duration;

    use super::*;
    use crate::confirm::ARM_WINDOW;
    use crate::error::{ServiceError, ViewError};
    use crate::{CreatePaste, CreatedPaste, PasteView, Url};

    /// Hands out queued fetch results and counts consuming fetches.
    #[derive(Default)]
    struct Scripted {
        fetches: Cell<usize>,
        results: RefCell<VecDeque<Result<PasteView, ServiceError>>>,
    }

    impl Scripted {
        fn with(results: impl IntoIterator<Item = Result<PasteView, ServiceError>>) -> Self {
            Self {
                fetches: Cell::new(0),
                results: RefCell::new(results.into_iter().collect()),
            }
        }
    }

    #[async_trait(?Send)]
    impl PasteService for &Scripted {
        async fn create(&self, request: &CreatePaste) -> Result<CreatedPaste, ServiceError> {
            Ok(CreatedPaste {
                id: Some(format!("id-{}", request.content)),
                url: None,
            })
        }

        async fn fetch(&self, _: &str) -> Result<PasteView, ServiceError> {
            self.fetches.set(self.fetches.get() + 1);
            self.results
                .borrow_mut()
                .pop_front()
                .unwrap_or(Err(ServiceError::NotFound { message: None }))
        }
    }

    fn view(remaining_views: Option<u64>) -> Result<PasteView, ServiceError> {
        Ok(PasteView {
            content: "secret".into(),
            remaining_views,
            expires_at: None,
        })
    }

    fn session(service: &Scripted) -> Session<&Scripted> {
        let route = ViewerRoute::new(Url::parse("http://localhost:5173").unwrap(), "p").unwrap();
        Session::new(service, route)
    }

    #[tokio::test(start_paused = true)]
    async fn double_request_fetches_once() {
        let service = Scripted::with([view(Some(3))]);
        let mut session = session(&service);

        assert_matches!(session.request("x").await, ViewState::Armed { id, .. } if id == "x");
        assert_eq!(service.fetches.get(), 0);

        assert_matches!(session.request("x").await, ViewState::Displayed { id, .. } if id == "x");
        assert_eq!(service.fetches.get(), 1);
        assert_eq!(session.estimate("x"), Some(RemainingViews::Finite(3)));
    }

    #[tokio::test(start_paused = true)]
    async fn switching_ids_never_fetches() {
        let service = Scripted::default();
        let mut session = session(&service);

        session.request("x").await;
        assert_matches!(session.request("y").await, ViewState::Armed { id, .. } if id == "y");
        assert_matches!(session.request("x").await, ViewState::Armed { id, .. } if id == "x");
        assert_eq!(service.fetches.get(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn unconfirmed_arm_reverts_to_idle() {
        let service = Scripted::default();
        let mut session = session(&service);

        let armed_at = tokio::time::Instant::now();
        session.request("x").await;

        let event = session.next_event().await.unwrap();
        assert_matches!(&event, Event::ArmExpired { id, .. } if id == "x");
        assert!(armed_at.elapsed() >= ARM_WINDOW);
        assert_eq!(session.handle(event).await, &ViewState::Idle);

        // A single request after expiry only re-arms.
        assert_matches!(session.request("x").await, ViewState::Armed { .. });
        assert_eq!(service.fetches.get(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn stale_timer_keeps_newer_arm() {
        let service = Scripted::default();
        let mut session = session(&service);

        session.request("x").await;
        tokio::time::advance(Duration::from_secs(1)).await;
        session.request("y").await;
        tokio::time::advance(Duration::from_secs(1)).await;
        session.request("x").await;

        // Timers for the first x arm and for y fire first and change nothing.
        for _ in 0..2 {
            let event = session.next_event().await.unwrap();
            assert_matches!(session.handle(event).await, ViewState::Armed { id, .. } if id == "x");
        }
        assert!(session.is_armed_for("x"));

        let event = session.next_event().await.unwrap();
        assert_eq!(session.handle(event).await, &ViewState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn confirmation_beats_pending_timer() {
        let service = Scripted::with([view(None)]);
        let mut session = session(&service);

        session.request("x").await;
        tokio::time::advance(Duration::from_secs(4)).await;
        assert_matches!(session.request("x").await, ViewState::Displayed { .. });

        // The timer still fires, but there is nothing left to disarm.
        let event = session.next_event().await.unwrap();
        assert_matches!(session.handle(event).await, ViewState::Displayed { .. });
        assert_eq!(session.estimate("x"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn not_found_resets_seeded_estimate() {
        let service = Scripted::default();
        let mut session = session(&service);

        let handle = session
            .submit(&PasteDraft::new("a").max_views("5"))
            .await
            .unwrap();
        assert_eq!(session.estimate(&handle.id), Some(RemainingViews::Finite(5)));

        session.request(&handle.id).await;
        let state = session.request(&handle.id).await;
        assert_matches!(
            state,
            ViewState::Unavailable { error: ViewError::NotFoundOrExpired(_), .. }
        );
        assert_eq!(session.estimate(&handle.id), Some(RemainingViews::Finite(0)));
    }

    #[tokio::test(start_paused = true)]
    async fn server_count_overrides_seed() {
        let service = Scripted::with([view(Some(3))]);
        let mut session = session(&service);

        let handle = session
            .submit(&PasteDraft::new("a").max_views("10"))
            .await
            .unwrap();
        session.follow_link(handle.url.as_str()).await.unwrap();

        assert_eq!(session.estimate("id-a"), Some(RemainingViews::Finite(3)));
    }

    #[tokio::test(start_paused = true)]
    async fn unlimited_response_keeps_seed() {
        let service = Scripted::with([view(None)]);
        let mut session = session(&service);

        let handle = session
            .submit(&PasteDraft::new("a").max_views("2"))
            .await
            .unwrap();
        session.request(&handle.id).await;
        assert_matches!(session.request(&handle.id).await, ViewState::Displayed { .. });

        assert_eq!(session.estimate(&handle.id), Some(RemainingViews::Finite(2)));
    }

    #[tokio::test(start_paused = true)]
    async fn blank_identifier_never_fetches() {
        let service = Scripted::with([view(Some(1))]);
        let mut session = session(&service);

        for _ in 0..2 {
            assert_matches!(
                session.request(" ").await,
                ViewState::Unavailable { error: ViewError::MissingIdentifier, .. }
            );
        }
        assert_eq!(service.fetches.get(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn every_confirmation_fetches_again() {
        let service = Scripted::with([view(Some(2)), view(Some(1))]);
        let mut session = session(&service);

        session.request("x").await;
        session.request("x").await;
        assert_matches!(session.request("x").await, ViewState::Armed { .. });
        assert_matches!(
            session.request("x").await,
            ViewState::Displayed { view, .. } if view.remaining_views == Some(1)
        );
        assert_eq!(service.fetches.get(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn follow_link_is_a_confirmed_view() {
        let service = Scripted::with([view(Some(0))]);
        let mut session = session(&service);

        let state = session
            .follow_link("http://localhost:5173/p/abc123")
            .await
            .unwrap();
        assert_matches!(state, ViewState::Displayed { id, .. } if id == "abc123");
        assert_eq!(service.fetches.get(), 1);

        assert!(session.follow_link("http://localhost:5173/").await.is_none());
        assert_eq!(service.fetches.get(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn follow_link_confirms_existing_arm() {
        let service = Scripted::with([view(Some(4))]);
        let mut session = session(&service);

        session.request("abc123").await;
        session.follow_link("abc123").await.unwrap();
        assert_eq!(service.fetches.get(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn submission_errors_leave_view_state_alone() {
        let service = Scripted::default();
        let mut session = session(&service);

        session.request("x").await;
        assert!(session.submit(&PasteDraft::new("")).await.is_err());
        assert!(session.is_armed_for("x"));
    }
}
