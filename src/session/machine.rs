//! Session state machine
//!
//! One explicit transition table over `(SessionState, Event)`:
//! 1. Completion events whose ticket is no longer live are discarded
//! 2. Pairs absent from the table are rejected with `InvalidTransition`
//!    and leave the session untouched
//! 3. Guard failures (blank credential, no selection, ...) are rejected
//!    with `Validation` and recorded as an inline notice
//!
//! Citizen data is dropped (and zeroized) on entry into `Voting`, and the
//! observed flag only survives from registration until the next reset.

use super::{
    BallotOptions, Effect, Event, Notice, Operation, Pending, Session, SessionState, Ticket,
};
use crate::config::TerminalSettings;
use crate::errors::ErrorKind;
use crate::types::{
    AuthorityCredential, Credential, RegistrationRequest, VotePayload, VoteSelection,
};
use crate::{Error, Result, validation_error};
use uuid::Uuid;

/// Owns the session and applies every transition
#[derive(Debug)]
pub struct SessionStateMachine {
    session: Session,
    settings: TerminalSettings,
    next_ticket: u64,
}

impl SessionStateMachine {
    pub fn new(settings: TerminalSettings) -> Self {
        Self {
            session: Session::locked(settings.election_id, false),
            settings,
            next_ticket: 1,
        }
    }

    /// Read-only view of the session
    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn state(&self) -> SessionState {
        self.session.state
    }

    pub fn settings(&self) -> &TerminalSettings {
        &self.settings
    }

    /// Return to `Locked` from any state, dropping all session data
    ///
    /// Outstanding tickets die with the old session, so late responses are
    /// discarded. Only the closed-terminal mark survives.
    pub fn reset(&mut self) {
        let previous = self.session.state;
        self.session = Session::locked(self.settings.election_id, self.session.closed);
        tracing::info!("🔒 Terminal locked (from {})", previous);
    }

    /// Apply one event and return the effects to run
    pub fn handle(&mut self, event: Event) -> Result<Vec<Effect>> {
        let state = self.session.state;
        let name = event.name();

        if let Some(ticket) = event.ticket() {
            if !self.session.is_live(ticket) {
                tracing::debug!(
                    "Discarding stale {} {} in state {}",
                    name,
                    ticket,
                    state
                );
                return Ok(Vec::new());
            }
        }

        let result = self.transition(state, event);

        match &result {
            Ok(_) if self.session.state != state => {
                tracing::info!(
                    "Session transition: {} --{}--> {}",
                    state,
                    name,
                    self.session.state
                );
            }
            Ok(_) => tracing::debug!("Session event {} applied in {}", name, state),
            Err(Error::Validation { message }) => {
                tracing::debug!("Rejected {} in {}: {}", name, state, message);
                self.session.notice = Some(Notice::inline(ErrorKind::Validation, message.clone()));
            }
            Err(err) => tracing::warn!("Rejected {} in {}: {}", name, state, err),
        }

        result
    }

    fn transition(&mut self, state: SessionState, event: Event) -> Result<Vec<Effect>> {
        use SessionState as S;

        match (state, event) {
            (_, Event::NoticeDismissed) => {
                self.session.notice = None;
                Ok(Vec::new())
            }

            // Locked
            (S::Locked, Event::AdminAccessRequested) => {
                self.session.notice = None;
                self.session.state = S::AdminAuthenticating;
                Ok(Vec::new())
            }

            // AdminAuthenticating
            (S::AdminAuthenticating, Event::CredentialSubmitted(credential)) => {
                self.submit_authority_credential(credential)
            }
            (S::AdminAuthenticating, Event::CredentialValidated { .. }) => {
                self.session.pending = None;
                self.session.notice = None;
                self.session.admin_authenticated = true;
                self.session.state = S::AdminPanel;
                tracing::info!("🔑 Authority credential accepted");
                Ok(Vec::new())
            }
            (S::AdminAuthenticating, Event::CredentialRejected { kind, message, .. }) => {
                self.session.pending = None;
                self.session.notice = Some(Notice::inline(kind, message));
                Ok(Vec::new())
            }
            (S::AdminAuthenticating, Event::Cancelled) => {
                self.reset();
                Ok(Vec::new())
            }

            // AdminPanel
            (S::AdminPanel, Event::CitizenLookupRequested(credential)) => {
                self.lookup_citizen(credential)
            }
            (S::AdminPanel, Event::CitizenFound { citizen, .. }) => {
                self.session.pending = None;
                self.session.notice = None;
                self.session.observed_draft = false;
                self.session.citizen = Some(citizen);
                Ok(Vec::new())
            }
            (S::AdminPanel, Event::CitizenNotFound { kind, message, .. }) => {
                self.session.pending = None;
                self.session.citizen = None;
                self.session.observed_draft = false;
                self.session.notice = Some(Notice::inline(kind, message));
                Ok(Vec::new())
            }
            (S::AdminPanel, Event::ObservedToggled(observed)) => {
                if self.session.citizen.is_none() {
                    return Err(validation_error!(
                        "Busque un ciudadano antes de marcar el voto como observado"
                    ));
                }
                self.session.observed_draft = observed;
                Ok(Vec::new())
            }
            (S::AdminPanel, Event::RegisterRequested) => self.register_citizen(),
            (S::AdminPanel, Event::RegisterConfirmed { .. }) => {
                self.session.pending = None;
                self.session.notice = None;
                self.session.observed = self.session.observed_draft;
                self.session.state = S::ConfirmEnable;
                tracing::info!(observed = self.session.observed, "📝 Voter registered");
                Ok(Vec::new())
            }
            (S::AdminPanel, Event::RegisterConflict { message, .. }) => {
                self.session.pending = None;
                self.session.notice = Some(Notice::inline(ErrorKind::Conflict, message));
                Ok(Vec::new())
            }
            (S::AdminPanel, Event::RegisterFailed { message, .. }) => {
                self.session.pending = None;
                self.session.notice = Some(Notice::inline(ErrorKind::ServerError, message));
                Ok(Vec::new())
            }
            (S::AdminPanel, Event::StatisticsRequested) => {
                self.ensure_idle()?;
                self.session.citizen = None;
                self.session.notice = None;
                self.session.final_results = false;
                self.session.state = S::Statistics;
                Ok(Vec::new())
            }
            (S::AdminPanel, Event::FinalizeRequested) => {
                self.ensure_idle()?;
                if self.session.closed {
                    return Err(validation_error!("La votación ya fue finalizada"));
                }
                self.session.citizen = None;
                self.session.notice = None;
                self.session.state = S::ConfirmFinalize;
                Ok(Vec::new())
            }
            (S::AdminPanel, Event::Cancelled) => {
                self.reset();
                Ok(Vec::new())
            }

            // ConfirmEnable
            (S::ConfirmEnable, Event::EnableConfirmed) => Ok(self.enable_voting()),
            (S::ConfirmEnable, Event::Cancelled) => {
                self.reset();
                Ok(Vec::new())
            }

            // Voting
            (S::Voting, Event::BallotListsLoaded { lists, .. }) => {
                self.session.lists_request = None;
                if let Some(VoteSelection::List(id)) = self.session.selection {
                    if !lists.iter().any(|list| list.id == id) {
                        self.session.selection = None;
                    }
                }
                self.session.ballot = BallotOptions::Loaded(lists);
                Ok(Vec::new())
            }
            (S::Voting, Event::BallotListsFailed { message, .. }) => {
                self.session.lists_request = None;
                self.session.ballot = BallotOptions::Failed;
                self.session.notice = Some(Notice::inline(ErrorKind::ServerError, message));
                Ok(Vec::new())
            }
            (S::Voting, Event::BallotListsReloadRequested) => {
                if self.session.lists_request.is_some() {
                    return Err(validation_error!("Las listas ya se están cargando"));
                }
                self.session.notice = None;
                Ok(vec![self.request_ballot_lists()])
            }
            (S::Voting, Event::OptionSelected(selection)) => self.select(selection),
            (S::Voting, Event::VoteSubmitted) => self.submit_vote(),
            (S::Voting, Event::VoteAccepted { .. }) => {
                self.session.pending = None;
                self.session.selection = None;
                self.session.notice = None;
                self.session.ballot = BallotOptions::NotRequested;
                self.session.lists_request = None;
                self.session.state = S::Success;

                let ticket = self.issue_ticket();
                self.session.lock_timer = Some(ticket);
                tracing::info!(episode = ?self.session.episode, "🗳️ Vote accepted");
                Ok(vec![Effect::ScheduleLock {
                    ticket,
                    delay: self.settings.success_lock_delay(),
                }])
            }
            (S::Voting, Event::VoteRejected { message, .. }) => {
                self.session.pending = None;
                self.session.notice = Some(Notice::blocking(ErrorKind::ServerError, message));
                Ok(Vec::new())
            }

            // Success
            (S::Success, Event::TimeoutElapsed { .. }) => {
                self.reset();
                Ok(Vec::new())
            }

            // ConfirmFinalize
            (S::ConfirmFinalize, Event::FinalizeConfirmed) => {
                self.session.closed = true;
                self.session.final_results = true;
                self.session.admin_authenticated = false;
                self.session.state = S::Statistics;
                tracing::info!("🏁 Voting finalized on this terminal");
                Ok(Vec::new())
            }
            (S::ConfirmFinalize, Event::Cancelled) => {
                self.session.state = S::AdminPanel;
                Ok(Vec::new())
            }

            // Statistics
            (S::Statistics, Event::Cancelled) if !self.session.final_results => {
                self.session.state = S::AdminPanel;
                Ok(Vec::new())
            }

            (state, event) => Err(Error::invalid_transition(state.name(), event.name())),
        }
    }

    fn issue_ticket(&mut self) -> Ticket {
        let ticket = Ticket(self.next_ticket);
        self.next_ticket += 1;
        ticket
    }

    fn ensure_idle(&self) -> Result<()> {
        match self.session.pending {
            Some(pending) => Err(validation_error!(
                "Operación en curso: {:?}",
                pending.operation
            )),
            None => Ok(()),
        }
    }

    fn begin(&mut self, operation: Operation) -> Ticket {
        let ticket = self.issue_ticket();
        self.session.pending = Some(Pending { ticket, operation });
        self.session.notice = None;
        ticket
    }

    fn submit_authority_credential(&mut self, credential: Credential) -> Result<Vec<Effect>> {
        self.ensure_idle()?;
        if credential.is_blank() {
            return Err(validation_error!(
                "Ingrese la credencial del Presidente de Mesa"
            ));
        }

        let ticket = self.begin(Operation::AuthorityValidation);
        tracing::info!("Validating authority credential {}", credential.fingerprint());
        Ok(vec![Effect::ValidateAuthority {
            ticket,
            credential: AuthorityCredential::new(credential.as_str()),
        }])
    }

    fn lookup_citizen(&mut self, credential: Credential) -> Result<Vec<Effect>> {
        if let Some(pending) = self.session.pending {
            // A newer lookup supersedes an older one; anything else must finish first
            if pending.operation != Operation::CitizenLookup {
                return Err(validation_error!(
                    "Operación en curso: {:?}",
                    pending.operation
                ));
            }
        }
        if credential.is_blank() {
            return Err(validation_error!("Ingrese la credencial cívica del votante"));
        }

        self.session.citizen = None;
        self.session.observed_draft = false;
        let ticket = self.begin(Operation::CitizenLookup);
        tracing::info!("🔎 Looking up citizen {}", credential.fingerprint());
        Ok(vec![Effect::LookupCitizen { ticket, credential }])
    }

    fn register_citizen(&mut self) -> Result<Vec<Effect>> {
        if self.session.closed {
            return Err(validation_error!(
                "La votación fue finalizada en esta terminal"
            ));
        }
        self.ensure_idle()?;

        let request = match &self.session.citizen {
            Some(citizen) => RegistrationRequest::for_citizen(
                citizen,
                self.settings.election_id,
                self.session.observed_draft,
            ),
            None => return Err(validation_error!("No hay ciudadano seleccionado")),
        };

        let ticket = self.begin(Operation::Registration);
        Ok(vec![Effect::RegisterVoter { ticket, request }])
    }

    fn enable_voting(&mut self) -> Vec<Effect> {
        // Identity must not reach the voter-facing screens
        self.session.citizen = None;
        self.session.observed_draft = false;
        self.session.admin_authenticated = false;
        self.session.selection = None;
        self.session.notice = None;
        self.session.pending = None;

        let episode = Uuid::new_v4();
        self.session.episode = Some(episode);
        self.session.state = SessionState::Voting;
        tracing::info!(
            observed = self.session.observed,
            "🗳️ Terminal enabled for voting (episode {})",
            episode
        );

        vec![self.request_ballot_lists()]
    }

    fn request_ballot_lists(&mut self) -> Effect {
        let ticket = self.issue_ticket();
        self.session.lists_request = Some(ticket);
        self.session.ballot = BallotOptions::Loading;
        Effect::FetchBallotLists {
            ticket,
            election_id: self.settings.election_id,
        }
    }

    fn select(&mut self, selection: VoteSelection) -> Result<Vec<Effect>> {
        self.ensure_idle()?;
        if let VoteSelection::List(id) = selection {
            if !self.session.ballot.contains_list(id) {
                return Err(validation_error!("La lista {} no está disponible", id));
            }
        }

        self.session.selection = Some(selection);
        if self
            .session
            .notice
            .as_ref()
            .is_some_and(|notice| notice.kind == ErrorKind::Validation)
        {
            self.session.notice = None;
        }
        Ok(Vec::new())
    }

    fn submit_vote(&mut self) -> Result<Vec<Effect>> {
        self.ensure_idle()?;
        let selection = self
            .session
            .selection
            .ok_or_else(|| validation_error!("Seleccione una única opción"))?;

        let payload = VotePayload::new(
            self.settings.election_id,
            self.settings.establishment_id,
            selection,
            self.session.observed,
        );
        payload.validate()?;

        let ticket = self.begin(Operation::VoteSubmission);
        Ok(vec![Effect::SubmitVote { ticket, payload }])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BallotList, Citizen};
    use std::time::Duration;

    fn ana() -> Citizen {
        Citizen {
            id: Some(42),
            first_name: "Ana".to_string(),
            last_name: "Gomez".to_string(),
            national_id: "1234567".to_string(),
            civic_credential: "BBB456".to_string(),
        }
    }

    fn lists() -> Vec<BallotList> {
        vec![
            BallotList {
                id: 12,
                number: None,
                party_name: "Partido A".to_string(),
            },
            BallotList {
                id: 15,
                number: None,
                party_name: "Partido B".to_string(),
            },
        ]
    }

    fn only_ticket(effects: &[Effect]) -> Ticket {
        assert_eq!(effects.len(), 1, "expected exactly one effect");
        effects[0].ticket()
    }

    fn admin_panel() -> SessionStateMachine {
        let mut machine = SessionStateMachine::new(TerminalSettings::default());
        machine.handle(Event::AdminAccessRequested).unwrap();
        let effects = machine
            .handle(Event::CredentialSubmitted("PRES01".into()))
            .unwrap();
        let ticket = only_ticket(&effects);
        machine
            .handle(Event::CredentialValidated { ticket })
            .unwrap();
        assert_eq!(machine.state(), SessionState::AdminPanel);
        machine
    }

    fn with_citizen() -> SessionStateMachine {
        let mut machine = admin_panel();
        let effects = machine
            .handle(Event::CitizenLookupRequested("BBB456".into()))
            .unwrap();
        let ticket = only_ticket(&effects);
        machine
            .handle(Event::CitizenFound {
                ticket,
                citizen: ana(),
            })
            .unwrap();
        machine
    }

    fn confirm_enable(observed: bool) -> SessionStateMachine {
        let mut machine = with_citizen();
        machine.handle(Event::ObservedToggled(observed)).unwrap();
        let effects = machine.handle(Event::RegisterRequested).unwrap();
        let ticket = only_ticket(&effects);
        machine
            .handle(Event::RegisterConfirmed { ticket })
            .unwrap();
        machine
    }

    fn voting(observed: bool) -> SessionStateMachine {
        let mut machine = confirm_enable(observed);
        let effects = machine.handle(Event::EnableConfirmed).unwrap();
        let ticket = only_ticket(&effects);
        machine
            .handle(Event::BallotListsLoaded {
                ticket,
                lists: lists(),
            })
            .unwrap();
        machine
    }

    #[test]
    fn test_locked_rejects_everything_but_admin_access() {
        let mut machine = SessionStateMachine::new(TerminalSettings::default());
        for event in [
            Event::VoteSubmitted,
            Event::EnableConfirmed,
            Event::RegisterRequested,
            Event::Cancelled,
        ] {
            let err = machine.handle(event).unwrap_err();
            assert!(matches!(err, Error::InvalidTransition { .. }));
            assert_eq!(machine.state(), SessionState::Locked);
        }
    }

    #[test]
    fn test_blank_credential_is_a_local_validation_error() {
        let mut machine = SessionStateMachine::new(TerminalSettings::default());
        machine.handle(Event::AdminAccessRequested).unwrap();

        let err = machine
            .handle(Event::CredentialSubmitted("   ".into()))
            .unwrap_err();
        assert!(matches!(err, Error::Validation { .. }));
        assert_eq!(machine.state(), SessionState::AdminAuthenticating);
        assert_eq!(
            machine.session().notice().unwrap().kind,
            ErrorKind::Validation
        );
        assert!(machine.session().pending_operation().is_none());
    }

    #[test]
    fn test_rejected_credential_allows_retry() {
        let mut machine = SessionStateMachine::new(TerminalSettings::default());
        machine.handle(Event::AdminAccessRequested).unwrap();
        let effects = machine
            .handle(Event::CredentialSubmitted("INVALID".into()))
            .unwrap();
        let ticket = only_ticket(&effects);

        machine
            .handle(Event::CredentialRejected {
                ticket,
                kind: ErrorKind::Unauthorized,
                message: "Credencial inválida".to_string(),
            })
            .unwrap();
        assert_eq!(machine.state(), SessionState::AdminAuthenticating);
        assert_eq!(
            machine.session().notice().unwrap().message,
            "Credencial inválida"
        );
        assert!(!machine.session().is_admin_authenticated());

        let retry = machine
            .handle(Event::CredentialSubmitted("PRES01".into()))
            .unwrap();
        assert_eq!(retry.len(), 1);
        assert!(machine.session().notice().is_none());
    }

    #[test]
    fn test_lookup_miss_clears_citizen() {
        let mut machine = with_citizen();
        let effects = machine
            .handle(Event::CitizenLookupRequested("ZZZ999".into()))
            .unwrap();
        assert!(machine.session().citizen().is_none());

        let ticket = only_ticket(&effects);
        machine
            .handle(Event::CitizenNotFound {
                ticket,
                kind: ErrorKind::NotFound,
                message: "Ciudadano no encontrado".to_string(),
            })
            .unwrap();
        assert_eq!(machine.state(), SessionState::AdminPanel);
        assert!(machine.session().citizen().is_none());
        assert_eq!(machine.session().notice().unwrap().kind, ErrorKind::NotFound);
    }

    #[test]
    fn test_lookup_transport_failure_is_not_a_miss() {
        let mut machine = admin_panel();
        let ticket = only_ticket(
            &machine
                .handle(Event::CitizenLookupRequested("BBB456".into()))
                .unwrap(),
        );
        machine
            .handle(Event::CitizenNotFound {
                ticket,
                kind: ErrorKind::ServerError,
                message: "El servidor no respondió a tiempo.".to_string(),
            })
            .unwrap();

        let notice = machine.session().notice().unwrap();
        assert_eq!(notice.kind, ErrorKind::ServerError);
        assert!(machine.session().pending_operation().is_none());
    }

    #[test]
    fn test_newer_lookup_supersedes_older() {
        let mut machine = admin_panel();
        let first = only_ticket(
            &machine
                .handle(Event::CitizenLookupRequested("AAA111".into()))
                .unwrap(),
        );
        let second = only_ticket(
            &machine
                .handle(Event::CitizenLookupRequested("BBB456".into()))
                .unwrap(),
        );

        machine
            .handle(Event::CitizenFound {
                ticket: first,
                citizen: ana(),
            })
            .unwrap();
        assert!(machine.session().citizen().is_none());

        machine
            .handle(Event::CitizenFound {
                ticket: second,
                citizen: ana(),
            })
            .unwrap();
        assert!(machine.session().citizen().is_some());
    }

    #[test]
    fn test_observed_toggle_requires_citizen() {
        let mut machine = admin_panel();
        assert!(machine.handle(Event::ObservedToggled(true)).is_err());
        assert!(!machine.session().observed_draft());
    }

    #[test]
    fn test_register_without_citizen_is_rejected() {
        let mut machine = admin_panel();
        let err = machine.handle(Event::RegisterRequested).unwrap_err();
        assert!(matches!(err, Error::Validation { .. }));
        assert_eq!(machine.state(), SessionState::AdminPanel);
    }

    #[test]
    fn test_registration_request_carries_draft_flag() {
        let mut machine = with_citizen();
        machine.handle(Event::ObservedToggled(true)).unwrap();
        let effects = machine.handle(Event::RegisterRequested).unwrap();

        match &effects[0] {
            Effect::RegisterVoter { request, .. } => {
                assert_eq!(request.citizen_id, Some(42));
                assert_eq!(request.election_id, 1);
                assert_eq!(request.civic_credential, "BBB456");
                assert!(request.observed);
            }
            other => panic!("unexpected effect {other:?}"),
        }
        // Not committed until the server confirms
        assert!(!machine.session().is_observed());
    }

    #[test]
    fn test_conflict_keeps_admin_panel() {
        let mut machine = with_citizen();
        let ticket = only_ticket(&machine.handle(Event::RegisterRequested).unwrap());
        machine
            .handle(Event::RegisterConflict {
                ticket,
                message: "Este ciudadano ya ha sido registrado".to_string(),
            })
            .unwrap();

        assert_eq!(machine.state(), SessionState::AdminPanel);
        assert_eq!(machine.session().notice().unwrap().kind, ErrorKind::Conflict);
        assert!(machine.session().citizen().is_some());
        assert!(machine.session().pending_operation().is_none());
    }

    #[test]
    fn test_double_register_while_pending_is_rejected() {
        let mut machine = with_citizen();
        machine.handle(Event::RegisterRequested).unwrap();
        assert!(matches!(
            machine.handle(Event::RegisterRequested),
            Err(Error::Validation { .. })
        ));
    }

    #[test]
    fn test_enable_clears_citizen_and_keeps_observed() {
        let mut machine = confirm_enable(true);
        assert!(machine.session().citizen().is_some());
        assert!(machine.session().is_observed());

        let effects = machine.handle(Event::EnableConfirmed).unwrap();
        assert!(matches!(
            effects[0],
            Effect::FetchBallotLists { election_id: 1, .. }
        ));
        assert_eq!(machine.state(), SessionState::Voting);
        assert!(machine.session().citizen().is_none());
        assert!(machine.session().is_observed());
        assert!(!machine.session().is_admin_authenticated());
        assert!(machine.session().episode_id().is_some());
        assert_eq!(machine.session().ballot_options(), &BallotOptions::Loading);
    }

    #[test]
    fn test_cancel_confirm_enable_clears_everything() {
        let mut machine = confirm_enable(true);
        machine.handle(Event::Cancelled).unwrap();
        assert_eq!(machine.state(), SessionState::Locked);
        assert!(!machine.session().is_observed());
        assert!(machine.session().citizen().is_none());
    }

    #[test]
    fn test_selection_is_exclusive() {
        let mut machine = voting(false);
        machine
            .handle(Event::OptionSelected(VoteSelection::List(12)))
            .unwrap();
        machine
            .handle(Event::OptionSelected(VoteSelection::Blank))
            .unwrap();
        assert_eq!(machine.session().selection(), Some(VoteSelection::Blank));

        let effects = machine.handle(Event::VoteSubmitted).unwrap();
        match &effects[0] {
            Effect::SubmitVote { payload, .. } => {
                assert!(payload.is_blank());
                assert_eq!(payload.list_id(), None);
                assert!(!payload.is_void());
            }
            other => panic!("unexpected effect {other:?}"),
        }
    }

    #[test]
    fn test_unknown_list_cannot_be_selected() {
        let mut machine = voting(false);
        assert!(
            machine
                .handle(Event::OptionSelected(VoteSelection::List(99)))
                .is_err()
        );
        assert_eq!(machine.session().selection(), None);
    }

    #[test]
    fn test_submit_without_selection_never_reaches_server() {
        let mut machine = voting(false);
        let err = machine.handle(Event::VoteSubmitted).unwrap_err();
        assert!(matches!(err, Error::Validation { .. }));
        assert!(machine.session().pending_operation().is_none());
    }

    #[test]
    fn test_vote_payload_carries_observed_flag() {
        let mut machine = voting(true);
        machine
            .handle(Event::OptionSelected(VoteSelection::List(15)))
            .unwrap();
        let effects = machine.handle(Event::VoteSubmitted).unwrap();
        match &effects[0] {
            Effect::SubmitVote { payload, .. } => {
                assert!(payload.is_observed());
                assert_eq!(payload.list_id(), Some(15));
            }
            other => panic!("unexpected effect {other:?}"),
        }
    }

    #[test]
    fn test_no_second_submission_while_pending_or_after_success() {
        let mut machine = voting(false);
        machine
            .handle(Event::OptionSelected(VoteSelection::Void))
            .unwrap();
        let ticket = only_ticket(&machine.handle(Event::VoteSubmitted).unwrap());

        assert!(machine.handle(Event::VoteSubmitted).is_err());
        assert!(
            machine
                .handle(Event::OptionSelected(VoteSelection::Blank))
                .is_err()
        );

        let effects = machine.handle(Event::VoteAccepted { ticket }).unwrap();
        assert!(matches!(
            effects[0],
            Effect::ScheduleLock { delay, .. } if delay == Duration::from_millis(4000)
        ));
        assert_eq!(machine.state(), SessionState::Success);

        let err = machine.handle(Event::VoteSubmitted).unwrap_err();
        assert!(matches!(err, Error::InvalidTransition { .. }));
        assert_eq!(machine.state(), SessionState::Success);
    }

    #[test]
    fn test_rejected_vote_returns_to_voting_with_selection() {
        let mut machine = voting(false);
        machine
            .handle(Event::OptionSelected(VoteSelection::List(12)))
            .unwrap();
        let ticket = only_ticket(&machine.handle(Event::VoteSubmitted).unwrap());

        machine
            .handle(Event::VoteRejected {
                ticket,
                message: "Error al emitir el voto".to_string(),
            })
            .unwrap();
        assert_eq!(machine.state(), SessionState::Voting);
        assert_eq!(machine.session().selection(), Some(VoteSelection::List(12)));
        assert_eq!(
            machine.session().notice().unwrap().level,
            crate::session::NoticeLevel::Blocking
        );

        // Re-submission is allowed
        assert_eq!(machine.handle(Event::VoteSubmitted).unwrap().len(), 1);
    }

    #[test]
    fn test_ballot_list_failure_then_reload() {
        let mut machine = confirm_enable(false);
        let ticket = only_ticket(&machine.handle(Event::EnableConfirmed).unwrap());
        machine
            .handle(Event::BallotListsFailed {
                ticket,
                message: "No se pudieron obtener las listas de votación".to_string(),
            })
            .unwrap();
        assert_eq!(machine.session().ballot_options(), &BallotOptions::Failed);
        assert_eq!(
            machine.session().notice().unwrap().kind,
            ErrorKind::ServerError
        );

        let reload = machine.handle(Event::BallotListsReloadRequested).unwrap();
        assert_eq!(reload.len(), 1);
        assert!(machine.handle(Event::BallotListsReloadRequested).is_err());
    }

    #[test]
    fn test_timeout_resets_to_locked() {
        let mut machine = voting(true);
        machine
            .handle(Event::OptionSelected(VoteSelection::Blank))
            .unwrap();
        let vote = only_ticket(&machine.handle(Event::VoteSubmitted).unwrap());
        let timer = only_ticket(&machine.handle(Event::VoteAccepted { ticket: vote }).unwrap());

        machine
            .handle(Event::TimeoutElapsed { ticket: timer })
            .unwrap();
        assert_eq!(machine.state(), SessionState::Locked);
        assert!(!machine.session().is_observed());
        assert!(machine.session().episode_id().is_none());
    }

    #[test]
    fn test_stale_completion_after_cancel_is_discarded() {
        let mut machine = admin_panel();
        let ticket = only_ticket(
            &machine
                .handle(Event::CitizenLookupRequested("BBB456".into()))
                .unwrap(),
        );
        machine.handle(Event::Cancelled).unwrap();

        let effects = machine
            .handle(Event::CitizenFound {
                ticket,
                citizen: ana(),
            })
            .unwrap();
        assert!(effects.is_empty());
        assert_eq!(machine.state(), SessionState::Locked);
        assert!(machine.session().citizen().is_none());
    }

    #[test]
    fn test_reset_from_every_state() {
        let builders: [fn() -> SessionStateMachine; 5] = [
            || SessionStateMachine::new(TerminalSettings::default()),
            admin_panel,
            with_citizen,
            || confirm_enable(true),
            || voting(true),
        ];

        for build in builders {
            let mut machine = build();
            let _ = machine.handle(Event::OptionSelected(VoteSelection::Blank));
            machine.reset();

            let session = machine.session();
            assert_eq!(session.state(), SessionState::Locked);
            assert!(!session.is_observed());
            assert!(session.citizen().is_none());
            assert!(session.selection().is_none());
            assert!(session.pending_operation().is_none());
            assert!(!session.is_admin_authenticated());
        }
    }

    #[test]
    fn test_statistics_and_finalize() {
        let mut machine = with_citizen();
        machine.handle(Event::StatisticsRequested).unwrap();
        assert_eq!(machine.state(), SessionState::Statistics);
        assert!(machine.session().citizen().is_none());
        machine.handle(Event::Cancelled).unwrap();
        assert_eq!(machine.state(), SessionState::AdminPanel);

        machine.handle(Event::FinalizeRequested).unwrap();
        machine.handle(Event::Cancelled).unwrap();
        assert_eq!(machine.state(), SessionState::AdminPanel);

        machine.handle(Event::FinalizeRequested).unwrap();
        machine.handle(Event::FinalizeConfirmed).unwrap();
        assert_eq!(machine.state(), SessionState::Statistics);
        assert!(machine.session().is_final_results());

        // Final results cannot be dismissed
        assert!(machine.handle(Event::Cancelled).is_err());
        assert_eq!(machine.state(), SessionState::Statistics);
    }

    #[test]
    fn test_closed_terminal_refuses_registration_after_reset() {
        let mut machine = admin_panel();
        machine.handle(Event::FinalizeRequested).unwrap();
        machine.handle(Event::FinalizeConfirmed).unwrap();
        machine.reset();
        assert!(machine.session().is_closed());

        machine.handle(Event::AdminAccessRequested).unwrap();
        let ticket = only_ticket(
            &machine
                .handle(Event::CredentialSubmitted("PRES01".into()))
                .unwrap(),
        );
        machine
            .handle(Event::CredentialValidated { ticket })
            .unwrap();
        let ticket = only_ticket(
            &machine
                .handle(Event::CitizenLookupRequested("BBB456".into()))
                .unwrap(),
        );
        machine
            .handle(Event::CitizenFound {
                ticket,
                citizen: ana(),
            })
            .unwrap();

        assert!(matches!(
            machine.handle(Event::RegisterRequested),
            Err(Error::Validation { .. })
        ));
    }

    #[test]
    fn test_notice_dismissed_in_any_state() {
        let mut machine = admin_panel();
        let _ = machine.handle(Event::RegisterRequested);
        assert!(machine.session().notice().is_some());
        machine.handle(Event::NoticeDismissed).unwrap();
        assert!(machine.session().notice().is_none());
    }
}
