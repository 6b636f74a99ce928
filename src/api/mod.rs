//! Client side of the external voting API
//!
//! The terminal only ever talks to the server through [`ApiGateway`]. The
//! gateway owns no session state and never retries: a retry is the user
//! re-triggering the same action.
//!
//! ```text
//! ApiGateway (trait)
//!     |
//!     +-- HttpApiGateway  (reqwest, production)
//!     |
//!     +-- MockApiGateway  (in-memory server fake for tests and demos)
//! ```

pub mod http;
pub mod mock;

use crate::Result;
use crate::statistics::{
    DepartmentDetail, DepartmentPartyVotes, DepartmentRanking, DepartmentStatistics,
    ElectionInfo, FullSummary, PartyStatistics,
};
use crate::types::{AuthorityCredential, BallotList, Citizen, RegistrationRequest, VotePayload};
use serde::{Deserialize, Serialize};
use std::future::Future;

pub use http::HttpApiGateway;
pub use mock::MockApiGateway;

/// Operations offered by the API, used for logging and failure injection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ApiOperation {
    LookupCitizen,
    RegisterVoter,
    ValidateAuthority,
    FetchBallotLists,
    SubmitVote,
    FetchStatistics,
}

/// Typed access to the external voting API
///
/// Failures follow the terminal's error taxonomy:
/// - `lookup_citizen`: any non-2xx is [`crate::Error::NotFound`]
/// - `register_voter`: 409 is [`crate::Error::Conflict`] with the server's
///   message, other non-2xx is [`crate::Error::ServerError`]
/// - `validate_authority`: any non-2xx is [`crate::Error::Unauthorized`]
/// - everything else: non-2xx is [`crate::Error::ServerError`]
///
/// Transport failures and request timeouts are always `ServerError`.
pub trait ApiGateway: Send + Sync + 'static {
    /// `GET /ciudadanos/buscar?credencial=<credential>`
    fn lookup_citizen(&self, credential: &str) -> impl Future<Output = Result<Citizen>> + Send;

    /// `POST /ciudadanos/registrar-votante`
    fn register_voter(
        &self,
        request: &RegistrationRequest,
    ) -> impl Future<Output = Result<()>> + Send;

    /// `POST /autoridades/validar`
    fn validate_authority(
        &self,
        credential: &AuthorityCredential,
    ) -> impl Future<Output = Result<()>> + Send;

    /// `GET /listas?eleccion_id=<election_id>`
    fn fetch_ballot_lists(
        &self,
        election_id: i64,
    ) -> impl Future<Output = Result<Vec<BallotList>>> + Send;

    /// `POST /votar`
    fn submit_vote(&self, payload: &VotePayload) -> impl Future<Output = Result<()>> + Send;

    /// `GET /votacion/elecciones/<election_id>`
    fn fetch_election(&self, election_id: i64)
    -> impl Future<Output = Result<ElectionInfo>> + Send;

    /// `GET /votacion/estadisticas/<election_id>/resumen-completo`
    fn fetch_full_summary(
        &self,
        election_id: i64,
    ) -> impl Future<Output = Result<FullSummary>> + Send;

    /// `GET /votacion/estadisticas/<election_id>/departamentos`
    fn fetch_department_statistics(
        &self,
        election_id: i64,
    ) -> impl Future<Output = Result<Vec<DepartmentStatistics>>> + Send;

    /// `GET /votacion/estadisticas/<election_id>/partidos`
    fn fetch_party_statistics(
        &self,
        election_id: i64,
    ) -> impl Future<Output = Result<Vec<PartyStatistics>>> + Send;

    /// `GET /votacion/estadisticas/<election_id>/departamentos-partidos`
    fn fetch_department_party_votes(
        &self,
        election_id: i64,
    ) -> impl Future<Output = Result<Vec<DepartmentPartyVotes>>> + Send;

    /// `GET /votacion/estadisticas/<election_id>/departamentos/<department_id>`
    fn fetch_department_detail(
        &self,
        election_id: i64,
        department_id: i64,
    ) -> impl Future<Output = Result<DepartmentDetail>> + Send;

    /// `GET /votacion/estadisticas/<election_id>/departamentos/<department_id>/ranking-partidos`
    fn fetch_department_ranking(
        &self,
        election_id: i64,
        department_id: i64,
    ) -> impl Future<Output = Result<DepartmentRanking>> + Send;
}
