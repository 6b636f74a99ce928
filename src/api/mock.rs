//! In-memory stand-in for the voting API
//!
//! Behaves like a small server: it knows a set of citizens and authority
//! credentials, refuses a second registration of the same citizen with a
//! conflict, and records every registration and vote it accepts. Failures
//! can be injected per operation, and a latency can be configured so tests
//! can observe in-flight requests.

use super::{ApiGateway, ApiOperation};
use crate::statistics::{
    DepartmentDetail, DepartmentPartyVotes, DepartmentRanking, DepartmentStatistics,
    ElectionInfo, FullSummary, PartyStatistics,
};
use crate::types::{
    AuthorityCredential, BallotList, Citizen, RegistrationRequest, VotePayload, fingerprint,
};
use crate::{Error, Result};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

#[derive(Default)]
struct MockState {
    citizens: HashMap<String, Citizen>,
    authorities: HashSet<String>,
    registered: HashSet<String>,
    ballot_lists: Vec<BallotList>,
    election: Option<ElectionInfo>,
    summary: Option<FullSummary>,
    department_details: HashMap<i64, (DepartmentDetail, DepartmentRanking)>,
    injected: HashMap<ApiOperation, VecDeque<Error>>,
    calls: Vec<ApiOperation>,
    registrations: Vec<RegistrationRequest>,
    votes: Vec<VotePayload>,
}

/// Scripted fake of the voting API
#[derive(Default)]
pub struct MockApiGateway {
    state: Mutex<MockState>,
    latency: Option<Duration>,
}

impl MockApiGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every call wait before answering
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn with_citizen(self, citizen: Citizen) -> Self {
        self.lock()
            .citizens
            .insert(citizen.civic_credential.clone(), citizen);
        self
    }

    pub fn with_authority(self, credential: &str) -> Self {
        self.lock().authorities.insert(credential.to_string());
        self
    }

    /// Mark a citizen's credential as already registered for this election
    pub fn with_registered(self, credential: &str) -> Self {
        self.lock().registered.insert(credential.to_string());
        self
    }

    pub fn with_ballot_lists(self, lists: Vec<BallotList>) -> Self {
        self.lock().ballot_lists = lists;
        self
    }

    pub fn with_election(self, election: ElectionInfo) -> Self {
        self.lock().election = Some(election);
        self
    }

    pub fn with_summary(self, summary: FullSummary) -> Self {
        self.lock().summary = Some(summary);
        self
    }

    pub fn with_department_detail(
        self,
        department_id: i64,
        detail: DepartmentDetail,
        ranking: DepartmentRanking,
    ) -> Self {
        self.lock()
            .department_details
            .insert(department_id, (detail, ranking));
        self
    }

    /// Fail the next call of `operation` with `error`
    pub fn fail_next(&self, operation: ApiOperation, error: Error) {
        self.lock()
            .injected
            .entry(operation)
            .or_default()
            .push_back(error);
    }

    /// Operations called so far, in call order
    pub fn calls(&self) -> Vec<ApiOperation> {
        self.lock().calls.clone()
    }

    pub fn call_count(&self, operation: ApiOperation) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|call| **call == operation)
            .count()
    }

    /// Registrations accepted so far
    pub fn registrations(&self) -> Vec<RegistrationRequest> {
        self.lock().registrations.clone()
    }

    /// Votes accepted so far
    pub fn votes(&self) -> Vec<VotePayload> {
        self.lock().votes.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        // A panicking test thread must not hide the recorded calls from others
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    async fn begin(&self, operation: ApiOperation) -> Result<()> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        let mut state = self.lock();
        state.calls.push(operation);
        match state
            .injected
            .get_mut(&operation)
            .and_then(VecDeque::pop_front)
        {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn summary(&self) -> Result<FullSummary> {
        self.lock()
            .summary
            .clone()
            .ok_or_else(|| Error::server(Some(404), "Error al obtener estadísticas completas"))
    }
}

impl ApiGateway for MockApiGateway {
    async fn lookup_citizen(&self, credential: &str) -> Result<Citizen> {
        self.begin(ApiOperation::LookupCitizen).await?;

        self.lock()
            .citizens
            .get(credential.trim())
            .cloned()
            .ok_or_else(|| Error::not_found("Ciudadano no encontrado"))
    }

    async fn register_voter(&self, request: &RegistrationRequest) -> Result<()> {
        self.begin(ApiOperation::RegisterVoter).await?;

        let mut state = self.lock();
        if !state.registered.insert(request.civic_credential.clone()) {
            tracing::debug!(
                credential = %fingerprint(&request.civic_credential),
                "Mock API refusing duplicate registration"
            );
            return Err(Error::conflict(
                "Este ciudadano ya ha sido registrado y no puede volver a votar.",
            ));
        }
        state.registrations.push(request.clone());
        Ok(())
    }

    async fn validate_authority(&self, credential: &AuthorityCredential) -> Result<()> {
        self.begin(ApiOperation::ValidateAuthority).await?;

        if self
            .lock()
            .authorities
            .contains(credential.civic_credential.trim())
        {
            Ok(())
        } else {
            Err(Error::unauthorized("Credencial inválida"))
        }
    }

    async fn fetch_ballot_lists(&self, _election_id: i64) -> Result<Vec<BallotList>> {
        self.begin(ApiOperation::FetchBallotLists).await?;
        Ok(self.lock().ballot_lists.clone())
    }

    async fn submit_vote(&self, payload: &VotePayload) -> Result<()> {
        self.begin(ApiOperation::SubmitVote).await?;
        payload.validate()?;
        self.lock().votes.push(payload.clone());
        Ok(())
    }

    async fn fetch_election(&self, _election_id: i64) -> Result<ElectionInfo> {
        self.begin(ApiOperation::FetchStatistics).await?;
        self.lock()
            .election
            .clone()
            .ok_or_else(|| Error::server(Some(404), "Error al obtener datos de la elección"))
    }

    async fn fetch_full_summary(&self, _election_id: i64) -> Result<FullSummary> {
        self.begin(ApiOperation::FetchStatistics).await?;
        self.summary()
    }

    async fn fetch_department_statistics(
        &self,
        _election_id: i64,
    ) -> Result<Vec<DepartmentStatistics>> {
        self.begin(ApiOperation::FetchStatistics).await?;
        Ok(self.summary()?.departments)
    }

    async fn fetch_party_statistics(&self, _election_id: i64) -> Result<Vec<PartyStatistics>> {
        self.begin(ApiOperation::FetchStatistics).await?;
        Ok(self.summary()?.parties)
    }

    async fn fetch_department_party_votes(
        &self,
        _election_id: i64,
    ) -> Result<Vec<DepartmentPartyVotes>> {
        self.begin(ApiOperation::FetchStatistics).await?;
        Ok(self.summary()?.department_parties)
    }

    async fn fetch_department_detail(
        &self,
        _election_id: i64,
        department_id: i64,
    ) -> Result<DepartmentDetail> {
        self.begin(ApiOperation::FetchStatistics).await?;
        self.lock()
            .department_details
            .get(&department_id)
            .map(|(detail, _)| detail.clone())
            .ok_or_else(|| Error::server(Some(404), "Error al obtener detalles del departamento"))
    }

    async fn fetch_department_ranking(
        &self,
        _election_id: i64,
        department_id: i64,
    ) -> Result<DepartmentRanking> {
        self.begin(ApiOperation::FetchStatistics).await?;
        self.lock()
            .department_details
            .get(&department_id)
            .map(|(_, ranking)| ranking.clone())
            .ok_or_else(|| Error::server(Some(404), "Error al obtener detalles del departamento"))
    }
}
