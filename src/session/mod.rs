//! Terminal session: states, events, effects and the session record
//!
//! The terminal walks through a fixed cycle of screens:
//!
//! ```text
//! Locked -> AdminAuthenticating -> AdminPanel -> ConfirmEnable -> Voting -> Success -> Locked
//!                                      |  \
//!                                      |   +-> ConfirmFinalize -> Statistics (final)
//!                                      +-> Statistics
//! ```
//!
//! UI actions and API responses both arrive as [`Event`]s. The
//! [`SessionStateMachine`] validates each one against the current state,
//! updates the [`Session`], and returns the [`Effect`]s (network calls,
//! timers) the caller must run. Every effect carries a [`Ticket`]; its
//! completion event carries the same ticket, and a completion whose ticket
//! is no longer live is discarded instead of being applied.

pub mod machine;

pub use machine::SessionStateMachine;

use crate::errors::ErrorKind;
use crate::types::{
    AuthorityCredential, BallotList, Citizen, Credential, RegistrationRequest, VotePayload,
    VoteSelection,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

/// The screen the terminal is on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionState {
    Locked,
    AdminAuthenticating,
    AdminPanel,
    ConfirmEnable,
    Voting,
    Success,
    ConfirmFinalize,
    Statistics,
}

impl SessionState {
    pub fn name(&self) -> &'static str {
        match self {
            SessionState::Locked => "Locked",
            SessionState::AdminAuthenticating => "AdminAuthenticating",
            SessionState::AdminPanel => "AdminPanel",
            SessionState::ConfirmEnable => "ConfirmEnable",
            SessionState::Voting => "Voting",
            SessionState::Success => "Success",
            SessionState::ConfirmFinalize => "ConfirmFinalize",
            SessionState::Statistics => "Statistics",
        }
    }

    /// States shown to the voter rather than the authority
    pub fn is_voter_facing(&self) -> bool {
        matches!(self, SessionState::Voting | SessionState::Success)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Correlates an issued effect with its completion event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Ticket(u64);

impl Ticket {
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for Ticket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Everything the state machine reacts to
#[derive(Debug, Clone)]
pub enum Event {
    // Locked
    AdminAccessRequested,

    // AdminAuthenticating
    CredentialSubmitted(Credential),
    CredentialValidated { ticket: Ticket },
    CredentialRejected {
        ticket: Ticket,
        kind: ErrorKind,
        message: String,
    },

    // AdminPanel
    CitizenLookupRequested(Credential),
    CitizenFound { ticket: Ticket, citizen: Citizen },
    CitizenNotFound {
        ticket: Ticket,
        kind: ErrorKind,
        message: String,
    },
    ObservedToggled(bool),
    RegisterRequested,
    RegisterConfirmed { ticket: Ticket },
    RegisterConflict { ticket: Ticket, message: String },
    RegisterFailed { ticket: Ticket, message: String },
    StatisticsRequested,
    FinalizeRequested,

    // ConfirmEnable
    EnableConfirmed,

    // Voting
    BallotListsLoaded { ticket: Ticket, lists: Vec<BallotList> },
    BallotListsFailed { ticket: Ticket, message: String },
    BallotListsReloadRequested,
    OptionSelected(VoteSelection),
    VoteSubmitted,
    VoteAccepted { ticket: Ticket },
    VoteRejected { ticket: Ticket, message: String },

    // Success
    TimeoutElapsed { ticket: Ticket },

    // ConfirmFinalize
    FinalizeConfirmed,

    // Any state
    NoticeDismissed,
    Cancelled,
}

impl Event {
    pub fn name(&self) -> &'static str {
        match self {
            Event::AdminAccessRequested => "AdminAccessRequested",
            Event::CredentialSubmitted(_) => "CredentialSubmitted",
            Event::CredentialValidated { .. } => "CredentialValidated",
            Event::CredentialRejected { .. } => "CredentialRejected",
            Event::CitizenLookupRequested(_) => "CitizenLookupRequested",
            Event::CitizenFound { .. } => "CitizenFound",
            Event::CitizenNotFound { .. } => "CitizenNotFound",
            Event::ObservedToggled(_) => "ObservedToggled",
            Event::RegisterRequested => "RegisterRequested",
            Event::RegisterConfirmed { .. } => "RegisterConfirmed",
            Event::RegisterConflict { .. } => "RegisterConflict",
            Event::RegisterFailed { .. } => "RegisterFailed",
            Event::StatisticsRequested => "StatisticsRequested",
            Event::FinalizeRequested => "FinalizeRequested",
            Event::EnableConfirmed => "EnableConfirmed",
            Event::BallotListsLoaded { .. } => "BallotListsLoaded",
            Event::BallotListsFailed { .. } => "BallotListsFailed",
            Event::BallotListsReloadRequested => "BallotListsReloadRequested",
            Event::OptionSelected(_) => "OptionSelected",
            Event::VoteSubmitted => "VoteSubmitted",
            Event::VoteAccepted { .. } => "VoteAccepted",
            Event::VoteRejected { .. } => "VoteRejected",
            Event::TimeoutElapsed { .. } => "TimeoutElapsed",
            Event::FinalizeConfirmed => "FinalizeConfirmed",
            Event::NoticeDismissed => "NoticeDismissed",
            Event::Cancelled => "Cancelled",
        }
    }

    /// Ticket of a completion event; `None` for UI events
    pub fn ticket(&self) -> Option<Ticket> {
        match self {
            Event::CredentialValidated { ticket }
            | Event::CredentialRejected { ticket, .. }
            | Event::CitizenFound { ticket, .. }
            | Event::CitizenNotFound { ticket, .. }
            | Event::RegisterConfirmed { ticket }
            | Event::RegisterConflict { ticket, .. }
            | Event::RegisterFailed { ticket, .. }
            | Event::BallotListsLoaded { ticket, .. }
            | Event::BallotListsFailed { ticket, .. }
            | Event::VoteAccepted { ticket }
            | Event::VoteRejected { ticket, .. }
            | Event::TimeoutElapsed { ticket } => Some(*ticket),
            _ => None,
        }
    }
}

/// Work the caller must perform on behalf of the state machine
#[derive(Debug, Clone)]
pub enum Effect {
    ValidateAuthority {
        ticket: Ticket,
        credential: AuthorityCredential,
    },
    LookupCitizen {
        ticket: Ticket,
        credential: Credential,
    },
    RegisterVoter {
        ticket: Ticket,
        request: RegistrationRequest,
    },
    FetchBallotLists {
        ticket: Ticket,
        election_id: i64,
    },
    SubmitVote {
        ticket: Ticket,
        payload: VotePayload,
    },
    /// Deliver `TimeoutElapsed` after `delay`
    ScheduleLock {
        ticket: Ticket,
        delay: Duration,
    },
}

impl Effect {
    pub fn ticket(&self) -> Ticket {
        match self {
            Effect::ValidateAuthority { ticket, .. }
            | Effect::LookupCitizen { ticket, .. }
            | Effect::RegisterVoter { ticket, .. }
            | Effect::FetchBallotLists { ticket, .. }
            | Effect::SubmitVote { ticket, .. }
            | Effect::ScheduleLock { ticket, .. } => *ticket,
        }
    }
}

/// Mutating request currently awaiting the server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operation {
    AuthorityValidation,
    CitizenLookup,
    Registration,
    VoteSubmission,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Pending {
    pub(crate) ticket: Ticket,
    pub(crate) operation: Operation,
}

/// Whether a message is shown inline or as a blocking alert
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NoticeLevel {
    Inline,
    Blocking,
}

/// User-visible error message on the current screen
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub kind: ErrorKind,
    pub message: String,
    pub level: NoticeLevel,
}

impl Notice {
    pub fn inline(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            level: NoticeLevel::Inline,
        }
    }

    pub fn blocking(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            level: NoticeLevel::Blocking,
        }
    }
}

/// Ballot options shown on the voting screen
#[derive(Debug, Clone, PartialEq, Default)]
pub enum BallotOptions {
    #[default]
    NotRequested,
    Loading,
    Loaded(Vec<BallotList>),
    Failed,
}

impl BallotOptions {
    pub fn lists(&self) -> &[BallotList] {
        match self {
            BallotOptions::Loaded(lists) => lists,
            _ => &[],
        }
    }

    pub fn contains_list(&self, list_id: i64) -> bool {
        self.lists().iter().any(|list| list.id == list_id)
    }
}

/// The session record, owned by [`SessionStateMachine`]
///
/// Read-only outside the machine: every mutation goes through a transition.
#[derive(Debug, Clone)]
pub struct Session {
    pub(crate) state: SessionState,
    pub(crate) citizen: Option<Citizen>,
    pub(crate) observed: bool,
    pub(crate) observed_draft: bool,
    pub(crate) admin_authenticated: bool,
    pub(crate) selection: Option<VoteSelection>,
    pub(crate) ballot: BallotOptions,
    pub(crate) pending: Option<Pending>,
    pub(crate) lists_request: Option<Ticket>,
    pub(crate) lock_timer: Option<Ticket>,
    pub(crate) notice: Option<Notice>,
    pub(crate) episode: Option<Uuid>,
    pub(crate) final_results: bool,
    pub(crate) closed: bool,
    pub(crate) election_id: i64,
}

impl Session {
    pub(crate) fn locked(election_id: i64, closed: bool) -> Self {
        Self {
            state: SessionState::Locked,
            citizen: None,
            observed: false,
            observed_draft: false,
            admin_authenticated: false,
            selection: None,
            ballot: BallotOptions::NotRequested,
            pending: None,
            lists_request: None,
            lock_timer: None,
            notice: None,
            episode: None,
            final_results: false,
            closed,
            election_id,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Citizen being processed on the admin panel
    pub fn citizen(&self) -> Option<&Citizen> {
        self.citizen.as_ref()
    }

    /// The committed observed-vote flag
    pub fn is_observed(&self) -> bool {
        self.observed
    }

    /// The admin panel checkbox, committed on registration
    pub fn observed_draft(&self) -> bool {
        self.observed_draft
    }

    pub fn is_admin_authenticated(&self) -> bool {
        self.admin_authenticated
    }

    pub fn selection(&self) -> Option<VoteSelection> {
        self.selection
    }

    pub fn ballot_options(&self) -> &BallotOptions {
        &self.ballot
    }

    pub fn pending_operation(&self) -> Option<Operation> {
        self.pending.map(|pending| pending.operation)
    }

    pub fn notice(&self) -> Option<&Notice> {
        self.notice.as_ref()
    }

    /// Identifier of the current voting episode (set on entering `Voting`)
    pub fn episode_id(&self) -> Option<Uuid> {
        self.episode
    }

    /// Statistics are the final results of a closed terminal
    pub fn is_final_results(&self) -> bool {
        self.final_results
    }

    /// Voting was finalized on this terminal
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn election_id(&self) -> i64 {
        self.election_id
    }

    /// Whether a completion carrying `ticket` would still be applied
    pub fn is_live(&self, ticket: Ticket) -> bool {
        self.pending.is_some_and(|pending| pending.ticket == ticket)
            || self.lists_request == Some(ticket)
            || self.lock_timer == Some(ticket)
    }
}
