//! # Core Types for the Voting Terminal
//!
//! This module defines the data exchanged between the terminal and the external
//! voting API. Field names on the wire follow the API contract (`id_eleccion`,
//! `credencial_civica`, ...) while the Rust side uses descriptive names.
//!
//! ## Privacy Design Principles
//!
//! - **Ballot secrecy**: [`Citizen`] never travels past the admin panel; the
//!   voting screen is rendered from types that carry no identity at all
//! - **Memory hygiene**: identity-bearing types are zeroized on drop
//! - **Log hygiene**: `Debug` output redacts identity; logs carry only a
//!   [`fingerprint`] of the credential
//!
//! ## Type Categories
//!
//! ### Registration
//! - [`Citizen`]: identity returned by the citizen lookup
//! - [`RegistrationRequest`]: body of the voter registration call
//! - [`AuthorityCredential`]: body of the authority validation call
//!
//! ### Voting
//! - [`BallotList`]: a numbered slate selectable as a vote
//! - [`VoteSelection`]: the single active choice on the voting screen
//! - [`VotePayload`]: the body of the vote submission
//!
//! ## Usage Examples
//!
//! ```rust
//! use voting_terminal::types::{VotePayload, VoteSelection};
//!
//! let payload = VotePayload::new(1, 1, VoteSelection::List(12), false);
//! assert_eq!(payload.list_id(), Some(12));
//! assert!(!payload.is_blank());
//! assert!(!payload.is_void());
//! assert!(payload.validate().is_ok());
//! ```

use crate::{Result, validation_error};
use serde::{Deserialize, Serialize};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Short, non-reversible fingerprint of a credential for log correlation
///
/// Returns the first 8 hex characters of the BLAKE3 hash of the trimmed
/// credential. Two lookups of the same credential share a fingerprint, so
/// an operator can correlate log lines without the credential being written.
pub fn fingerprint(credential: &str) -> String {
    let hash = blake3::hash(credential.trim().as_bytes());
    hex::encode(&hash.as_bytes()[..4])
}

/// A civic credential typed at the terminal (voter or authority)
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct Credential(String);

impl Credential {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Credential with surrounding whitespace removed
    pub fn as_str(&self) -> &str {
        self.0.trim()
    }

    pub fn is_blank(&self) -> bool {
        self.as_str().is_empty()
    }

    pub fn fingerprint(&self) -> String {
        fingerprint(&self.0)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Credential({})", self.fingerprint())
    }
}

impl From<&str> for Credential {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// A citizen returned by the credential lookup
///
/// Held by the session only while the admin panel or the enable
/// confirmation is showing. Zeroized when dropped.
#[derive(Clone, PartialEq, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct Citizen {
    /// Database identifier, echoed back on registration
    #[serde(rename = "id_ciudadano", default)]
    pub id: Option<i64>,

    #[serde(rename = "nombre")]
    pub first_name: String,

    #[serde(rename = "apellido")]
    pub last_name: String,

    /// National identity document number (CI)
    #[serde(rename = "ci")]
    pub national_id: String,

    /// Civic credential code used for the lookup
    #[serde(rename = "credencial_civica")]
    pub civic_credential: String,
}

impl Citizen {
    /// Name as shown on the admin panel card
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

impl fmt::Debug for Citizen {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Citizen")
            .field("id", &self.id)
            .field("credential", &fingerprint(&self.civic_credential))
            .finish_non_exhaustive()
    }
}

/// Body of `POST /ciudadanos/registrar-votante`
#[derive(Clone, PartialEq, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct RegistrationRequest {
    #[serde(rename = "id_ciudadano")]
    pub citizen_id: Option<i64>,

    #[serde(rename = "id_eleccion")]
    pub election_id: i64,

    #[serde(rename = "credencial_civica")]
    pub civic_credential: String,

    #[serde(rename = "voto_observado")]
    pub observed: bool,
}

impl RegistrationRequest {
    /// Build the registration body for a looked-up citizen
    pub fn for_citizen(citizen: &Citizen, election_id: i64, observed: bool) -> Self {
        Self {
            citizen_id: citizen.id,
            election_id,
            civic_credential: citizen.civic_credential.clone(),
            observed,
        }
    }
}

impl fmt::Debug for RegistrationRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistrationRequest")
            .field("citizen_id", &self.citizen_id)
            .field("election_id", &self.election_id)
            .field("credential", &fingerprint(&self.civic_credential))
            .field("observed", &self.observed)
            .finish()
    }
}

/// Body of `POST /autoridades/validar`
#[derive(Clone, PartialEq, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct AuthorityCredential {
    #[serde(rename = "credencial_civica")]
    pub civic_credential: String,
}

impl AuthorityCredential {
    pub fn new(credential: impl Into<String>) -> Self {
        Self {
            civic_credential: credential.into(),
        }
    }
}

impl fmt::Debug for AuthorityCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthorityCredential")
            .field("credential", &fingerprint(&self.civic_credential))
            .finish()
    }
}

/// Error body returned by the API on failures
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub error: Option<String>,

    #[serde(default)]
    pub message: Option<String>,
}

impl ApiErrorBody {
    /// Server-supplied message, if any
    pub fn into_message(self) -> Option<String> {
        self.error
            .or(self.message)
            .filter(|message| !message.trim().is_empty())
    }
}

/// A numbered slate associated with a political party
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BallotList {
    #[serde(rename = "id_lista", alias = "id_Lista")]
    pub id: i64,

    /// Printed list number, when the API reports it separately from the id
    #[serde(rename = "numero", default)]
    pub number: Option<i64>,

    #[serde(rename = "partido_nombre")]
    pub party_name: String,
}

impl BallotList {
    /// Card title on the voting screen
    pub fn label(&self) -> String {
        format!("Lista {}", self.number.unwrap_or(self.id))
    }
}

/// The single active choice on the voting screen
///
/// Selecting a new option replaces the previous one; there is never more
/// than one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VoteSelection {
    /// A ballot list, by id
    List(i64),
    /// Blank vote (`voto_en_blanco`)
    Blank,
    /// Void vote (`voto_anulado`)
    Void,
}

/// Body of the vote submission
///
/// Fields are private: the only constructor takes a [`VoteSelection`], so a
/// payload built by this crate always encodes exactly one choice. Decoded
/// payloads can be checked with [`VotePayload::validate`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VotePayload {
    #[serde(rename = "id_eleccion")]
    election_id: i64,

    #[serde(rename = "id_establecimiento")]
    establishment_id: i64,

    #[serde(rename = "id_lista")]
    list_id: Option<i64>,

    #[serde(rename = "voto_en_blanco")]
    blank: bool,

    #[serde(rename = "voto_anulado")]
    void: bool,

    #[serde(rename = "observado", default)]
    observed: bool,
}

impl VotePayload {
    /// Build the payload for a selection
    pub fn new(
        election_id: i64,
        establishment_id: i64,
        selection: VoteSelection,
        observed: bool,
    ) -> Self {
        let (list_id, blank, void) = match selection {
            VoteSelection::List(id) => (Some(id), false, false),
            VoteSelection::Blank => (None, true, false),
            VoteSelection::Void => (None, false, true),
        };

        Self {
            election_id,
            establishment_id,
            list_id,
            blank,
            void,
            observed,
        }
    }

    pub fn election_id(&self) -> i64 {
        self.election_id
    }

    pub fn establishment_id(&self) -> i64 {
        self.establishment_id
    }

    pub fn list_id(&self) -> Option<i64> {
        self.list_id
    }

    pub fn is_blank(&self) -> bool {
        self.blank
    }

    pub fn is_void(&self) -> bool {
        self.void
    }

    pub fn is_observed(&self) -> bool {
        self.observed
    }

    /// Number of truthy choices among list, blank and void
    pub fn choice_count(&self) -> usize {
        [self.list_id.is_some(), self.blank, self.void]
            .into_iter()
            .filter(|chosen| *chosen)
            .count()
    }

    /// The selection this payload encodes
    pub fn selection(&self) -> Result<VoteSelection> {
        self.validate()?;
        Ok(match (self.list_id, self.blank) {
            (Some(id), _) => VoteSelection::List(id),
            (None, true) => VoteSelection::Blank,
            (None, false) => VoteSelection::Void,
        })
    }

    /// Check that exactly one choice is encoded
    pub fn validate(&self) -> Result<()> {
        match self.choice_count() {
            1 => Ok(()),
            0 => Err(validation_error!("vote payload encodes no choice")),
            n => Err(validation_error!("vote payload encodes {} choices", n)),
        }
    }
}
