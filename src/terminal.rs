//! Runtime around the session state machine
//!
//! [`Terminal`] applies events, publishes the rendered [`Screen`] and runs
//! the effects the machine returns as tokio tasks. Each task reports back
//! through a completion channel with the ticket it was issued. When a
//! ticket stops being live (cancel, reset, superseded lookup) its task is
//! aborted, and any completion that still slips through is discarded by the
//! machine.

use crate::api::ApiGateway;
use crate::config::TerminalSettings;
use crate::render::{Screen, render};
use crate::session::{Effect, Event, Session, SessionState, SessionStateMachine, Ticket};
use crate::statistics::StatisticsView;
use crate::{Error, Result};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::AbortHandle;

/// In-flight effect task, aborted when dropped
#[derive(Debug)]
pub struct RequestHandle {
    ticket: Ticket,
    abort: AbortHandle,
}

impl RequestHandle {
    fn new(ticket: Ticket, abort: AbortHandle) -> Self {
        Self { ticket, abort }
    }

    fn is_finished(&self) -> bool {
        self.abort.is_finished()
    }
}

impl Drop for RequestHandle {
    fn drop(&mut self) {
        if !self.is_finished() {
            tracing::debug!("Aborting in-flight request {}", self.ticket);
            self.abort.abort();
        }
    }
}

pub struct Terminal<A: ApiGateway> {
    machine: SessionStateMachine,
    api: Arc<A>,
    completions_tx: mpsc::UnboundedSender<Event>,
    completions_rx: mpsc::UnboundedReceiver<Event>,
    in_flight: HashMap<Ticket, RequestHandle>,
    screen: watch::Sender<Screen>,
}

impl<A: ApiGateway> Terminal<A> {
    pub fn new(api: Arc<A>, settings: TerminalSettings) -> Self {
        let machine = SessionStateMachine::new(settings);
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();
        let (screen, _) = watch::channel(render(machine.session()));

        tracing::info!(
            election_id = machine.settings().election_id,
            establishment_id = machine.settings().establishment_id,
            "🖥️ Voting terminal ready"
        );

        Self {
            machine,
            api,
            completions_tx,
            completions_rx,
            in_flight: HashMap::new(),
            screen,
        }
    }

    pub fn session(&self) -> &Session {
        self.machine.session()
    }

    pub fn state(&self) -> SessionState {
        self.machine.state()
    }

    /// The screen as last published
    pub fn screen(&self) -> Screen {
        self.screen.borrow().clone()
    }

    /// Receive every screen published from now on
    pub fn subscribe(&self) -> watch::Receiver<Screen> {
        self.screen.subscribe()
    }

    pub fn api(&self) -> &Arc<A> {
        &self.api
    }

    /// Statistics loader for this terminal's election
    pub fn statistics(&self) -> StatisticsView<A> {
        StatisticsView::new(Arc::clone(&self.api), self.machine.settings().election_id)
    }

    /// Number of effect tasks still tracked
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    pub fn has_in_flight(&self) -> bool {
        !self.in_flight.is_empty()
    }

    /// Apply one event and start the effects it produces
    pub fn dispatch(&mut self, event: Event) -> Result<()> {
        let result = self.machine.handle(event);
        self.prune();
        self.publish();

        for effect in result? {
            self.spawn(effect);
        }
        Ok(())
    }

    /// Lock the terminal, abandoning whatever is in flight
    pub fn reset(&mut self) {
        self.machine.reset();
        self.prune();
        self.publish();
    }

    /// Wait for the next completion and apply it
    pub async fn process_next(&mut self) -> Result<()> {
        let event = self
            .completions_rx
            .recv()
            .await
            .ok_or_else(|| Error::internal("completion channel closed"))?;
        self.dispatch(event)
    }

    /// Drive the terminal from UI events until the UI channel closes
    ///
    /// Rejected events are logged and never stop the loop.
    pub async fn run(&mut self, mut ui: mpsc::Receiver<Event>) -> Result<()> {
        tracing::info!("🔄 Terminal event loop started");

        loop {
            tokio::select! {
                event = ui.recv() => match event {
                    Some(event) => self.apply(event),
                    None => {
                        tracing::info!("🛑 UI channel closed, stopping terminal");
                        break;
                    }
                },
                Some(event) = self.completions_rx.recv() => self.apply(event),
            }
        }

        self.reset();
        Ok(())
    }

    fn apply(&mut self, event: Event) {
        let name = event.name();
        match self.dispatch(event) {
            Ok(()) => {}
            Err(e @ Error::Validation { .. }) => {
                tracing::debug!("Event {} rejected: {}", name, e)
            }
            Err(e) => tracing::warn!("⚠️ Event {} rejected: {}", name, e),
        }
    }

    fn prune(&mut self) {
        let session = self.machine.session();
        // Dropping a handle aborts its task
        self.in_flight.retain(|ticket, _| session.is_live(*ticket));
    }

    fn publish(&self) {
        self.screen.send_replace(render(self.machine.session()));
    }

    fn spawn(&mut self, effect: Effect) {
        let ticket = effect.ticket();
        let api = Arc::clone(&self.api);
        let completions = self.completions_tx.clone();

        let task = tokio::spawn(async move {
            let event = perform(api.as_ref(), effect).await;
            if completions.send(event).is_err() {
                tracing::debug!("Terminal gone, dropping completion {}", ticket);
            }
        });

        self.in_flight
            .insert(ticket, RequestHandle::new(ticket, task.abort_handle()));
    }
}

/// Run one effect against the API and turn the outcome into its completion
async fn perform<A: ApiGateway>(api: &A, effect: Effect) -> Event {
    match effect {
        Effect::ValidateAuthority { ticket, credential } => {
            match api.validate_authority(&credential).await {
                Ok(()) => Event::CredentialValidated { ticket },
                Err(e) => {
                    tracing::warn!("🚫 Authority credential rejected: {}", e);
                    Event::CredentialRejected {
                        ticket,
                        kind: e.kind(),
                        message: e.user_message(),
                    }
                }
            }
        }
        Effect::LookupCitizen { ticket, credential } => {
            match api.lookup_citizen(credential.as_str()).await {
                Ok(citizen) => Event::CitizenFound { ticket, citizen },
                Err(e) => {
                    tracing::info!(
                        "Citizen lookup {} failed: {}",
                        credential.fingerprint(),
                        e
                    );
                    Event::CitizenNotFound {
                        ticket,
                        kind: e.kind(),
                        message: e.user_message(),
                    }
                }
            }
        }
        Effect::RegisterVoter { ticket, request } => match api.register_voter(&request).await {
            Ok(()) => Event::RegisterConfirmed { ticket },
            Err(e @ Error::Conflict { .. }) => {
                tracing::warn!("⚠️ Duplicate registration refused: {}", e);
                Event::RegisterConflict {
                    ticket,
                    message: e.user_message(),
                }
            }
            Err(e) => {
                tracing::error!("❌ Registration failed: {}", e);
                Event::RegisterFailed {
                    ticket,
                    message: e.user_message(),
                }
            }
        },
        Effect::FetchBallotLists {
            ticket,
            election_id,
        } => match api.fetch_ballot_lists(election_id).await {
            Ok(lists) => {
                tracing::debug!("Loaded {} ballot lists", lists.len());
                Event::BallotListsLoaded { ticket, lists }
            }
            Err(e) => {
                tracing::error!("❌ Could not load ballot lists: {}", e);
                Event::BallotListsFailed {
                    ticket,
                    message: e.user_message(),
                }
            }
        },
        Effect::SubmitVote { ticket, payload } => match api.submit_vote(&payload).await {
            Ok(()) => Event::VoteAccepted { ticket },
            Err(e) => {
                tracing::error!("❌ Vote submission failed: {}", e);
                Event::VoteRejected {
                    ticket,
                    message: e.user_message(),
                }
            }
        },
        Effect::ScheduleLock { ticket, delay } => {
            tokio::time::sleep(delay).await;
            Event::TimeoutElapsed { ticket }
        }
    }
}
