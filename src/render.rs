//! Pure projection of the session onto screens
//!
//! The voting screen is built from [`VotingScreen`], which has no citizen
//! fields, so identity cannot reach the voter through this path.

use crate::errors::ErrorKind;
use crate::session::{BallotOptions, NoticeLevel, Operation, Session, SessionState};
use crate::types::VoteSelection;
use serde::Serialize;

pub const OBSERVED_BADGE: &str = "VOTO OBSERVADO";
pub const BLANK_LABEL: &str = "Voto en Blanco";
pub const VOID_LABEL: &str = "Voto Anulado";
pub const SUCCESS_TITLE: &str = "¡Gracias!";
pub const SUCCESS_MESSAGE: &str = "Su voto ha sido emitido.";

/// Error message shown on the current screen
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Alert {
    pub kind: ErrorKind,
    pub message: String,
    pub blocking: bool,
}

/// Citizen card on the admin panel
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CitizenCard {
    pub full_name: String,
    pub national_id: String,
    pub civic_credential: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AdminPanelScreen {
    pub citizen: Option<CitizenCard>,
    pub observed_checked: bool,
    pub can_register: bool,
    pub busy: bool,
    pub closed: bool,
    pub alert: Option<Alert>,
}

/// One selectable option on the ballot
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OptionCard {
    pub selection: VoteSelection,
    pub title: String,
    pub subtitle: Option<String>,
    pub selected: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BallotStatus {
    Loading,
    Ready,
    Unavailable,
}

/// Voter-facing ballot screen
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VotingScreen {
    pub badge: Option<&'static str>,
    pub status: BallotStatus,
    pub options: Vec<OptionCard>,
    pub can_submit: bool,
    pub submitting: bool,
    pub alert: Option<Alert>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Screen {
    Locked,
    AdminLogin {
        busy: bool,
        alert: Option<Alert>,
    },
    AdminPanel(AdminPanelScreen),
    ConfirmEnable {
        observed: bool,
    },
    Voting(VotingScreen),
    Success {
        title: &'static str,
        message: &'static str,
    },
    ConfirmFinalize,
    Statistics {
        election_id: i64,
        final_results: bool,
        closeable: bool,
    },
}

impl Screen {
    /// Whether anything on this screen can identify a citizen
    pub fn shows_identity(&self) -> bool {
        matches!(
            self,
            Screen::AdminPanel(AdminPanelScreen {
                citizen: Some(_),
                ..
            })
        )
    }
}

pub fn render(session: &Session) -> Screen {
    let alert = session.notice().map(|notice| Alert {
        kind: notice.kind,
        message: notice.message.clone(),
        blocking: notice.level == NoticeLevel::Blocking,
    });
    let busy = session.pending_operation().is_some();

    match session.state() {
        SessionState::Locked => Screen::Locked,
        SessionState::AdminAuthenticating => Screen::AdminLogin { busy, alert },
        SessionState::AdminPanel => {
            let citizen = session.citizen().map(|citizen| CitizenCard {
                full_name: citizen.full_name(),
                national_id: citizen.national_id.clone(),
                civic_credential: citizen.civic_credential.clone(),
            });
            Screen::AdminPanel(AdminPanelScreen {
                can_register: citizen.is_some() && !busy && !session.is_closed(),
                citizen,
                observed_checked: session.observed_draft(),
                busy,
                closed: session.is_closed(),
                alert,
            })
        }
        SessionState::ConfirmEnable => Screen::ConfirmEnable {
            observed: session.is_observed(),
        },
        SessionState::Voting => Screen::Voting(voting_screen(session, alert)),
        SessionState::Success => Screen::Success {
            title: SUCCESS_TITLE,
            message: SUCCESS_MESSAGE,
        },
        SessionState::ConfirmFinalize => Screen::ConfirmFinalize,
        SessionState::Statistics => Screen::Statistics {
            election_id: session.election_id(),
            final_results: session.is_final_results(),
            closeable: !session.is_final_results(),
        },
    }
}

fn voting_screen(session: &Session, alert: Option<Alert>) -> VotingScreen {
    let selected = session.selection();
    let submitting = session.pending_operation() == Some(Operation::VoteSubmission);

    let status = match session.ballot_options() {
        BallotOptions::Loaded(_) => BallotStatus::Ready,
        BallotOptions::Failed => BallotStatus::Unavailable,
        BallotOptions::NotRequested | BallotOptions::Loading => BallotStatus::Loading,
    };

    let mut options: Vec<OptionCard> = session
        .ballot_options()
        .lists()
        .iter()
        .map(|list| OptionCard {
            selection: VoteSelection::List(list.id),
            title: list.label(),
            subtitle: Some(list.party_name.clone()),
            selected: selected == Some(VoteSelection::List(list.id)),
        })
        .collect();

    for (selection, title) in [
        (VoteSelection::Blank, BLANK_LABEL),
        (VoteSelection::Void, VOID_LABEL),
    ] {
        options.push(OptionCard {
            selection,
            title: title.to_string(),
            subtitle: None,
            selected: selected == Some(selection),
        });
    }

    VotingScreen {
        badge: session.is_observed().then_some(OBSERVED_BADGE),
        status,
        options,
        can_submit: selected.is_some() && !submitting,
        submitting,
        alert,
    }
}
