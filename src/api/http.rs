//! reqwest-backed gateway to the voting API

use super::{ApiGateway, ApiOperation};
use crate::config::ApiConfig;
use crate::statistics::{
    DepartmentDetail, DepartmentPartyEnvelope, DepartmentPartyVotes, DepartmentRanking,
    DepartmentStatistics, DepartmentStatisticsEnvelope, ElectionInfo, FullSummary,
    PartyStatistics, PartyStatisticsEnvelope,
};
use crate::types::{
    ApiErrorBody, AuthorityCredential, BallotList, Citizen, RegistrationRequest, VotePayload,
    fingerprint,
};
use crate::{Error, Result};
use reqwest::StatusCode;
use reqwest::header::CONTENT_TYPE;
use serde::de::DeserializeOwned;
use std::time::Duration;

const CITIZEN_NOT_FOUND: &str = "Ciudadano no encontrado";
const ALREADY_REGISTERED: &str =
    "Este ciudadano ya ha sido registrado y no puede volver a votar.";
const REGISTRATION_FAILED: &str = "Ocurrió un error al registrar al ciudadano.";
const INVALID_AUTHORITY: &str = "Credencial inválida o error del servidor.";
const VOTE_FAILED: &str = "Error al emitir el voto";

/// Relative paths of every endpoint, joined onto the configured base URL
pub mod paths {
    pub const CITIZEN_LOOKUP: &str = "ciudadanos/buscar";
    pub const REGISTER_VOTER: &str = "ciudadanos/registrar-votante";
    pub const VALIDATE_AUTHORITY: &str = "autoridades/validar";
    pub const BALLOT_LISTS: &str = "listas";
    pub const SUBMIT_VOTE: &str = "votar";

    pub fn election(election_id: i64) -> String {
        format!("votacion/elecciones/{election_id}")
    }

    pub fn full_summary(election_id: i64) -> String {
        format!("votacion/estadisticas/{election_id}/resumen-completo")
    }

    pub fn departments(election_id: i64) -> String {
        format!("votacion/estadisticas/{election_id}/departamentos")
    }

    pub fn parties(election_id: i64) -> String {
        format!("votacion/estadisticas/{election_id}/partidos")
    }

    pub fn department_parties(election_id: i64) -> String {
        format!("votacion/estadisticas/{election_id}/departamentos-partidos")
    }

    pub fn department_detail(election_id: i64, department_id: i64) -> String {
        format!("votacion/estadisticas/{election_id}/departamentos/{department_id}")
    }

    pub fn department_ranking(election_id: i64, department_id: i64) -> String {
        format!("votacion/estadisticas/{election_id}/departamentos/{department_id}/ranking-partidos")
    }
}

/// Production gateway over HTTP/JSON
#[derive(Debug, Clone)]
pub struct HttpApiGateway {
    base_url: String,
    client: reqwest::Client,
}

impl HttpApiGateway {
    /// Create a gateway from API configuration
    ///
    /// Every request carries the configured timeout; expiry surfaces as
    /// [`Error::ServerError`].
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let base_url = config.base_url.trim().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(Error::config("API base URL must not be empty"));
        }

        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(5).min(config.request_timeout()))
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| Error::config(format!("HTTP client initialization failed: {e}")))?;

        Ok(Self { base_url, client })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Absolute URL of a relative endpoint path
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        operation: ApiOperation,
        path: &str,
        failure: &str,
    ) -> Result<T> {
        let response = self.client.get(self.endpoint(path)).send().await?;
        let status = response.status();

        if !status.is_success() {
            tracing::warn!(?operation, status = status.as_u16(), path, "API request failed");
            return Err(Error::server(Some(status.as_u16()), failure));
        }

        Ok(response.json::<T>().await?)
    }
}

/// Extract the server's `error`/`message` field from a JSON error body
///
/// Returns `None` unless the content type is JSON and the body carries a
/// non-empty message.
pub fn message_from_body(content_type: Option<&str>, body: &[u8]) -> Option<String> {
    let is_json = content_type
        .map(|value| value.to_ascii_lowercase().contains("application/json"))
        .unwrap_or(false);
    if !is_json {
        return None;
    }

    serde_json::from_slice::<ApiErrorBody>(body)
        .ok()
        .and_then(ApiErrorBody::into_message)
}

/// Map a failed registration response to the error taxonomy
pub fn registration_error(status: StatusCode, server_message: Option<String>) -> Error {
    if status == StatusCode::CONFLICT {
        Error::conflict(server_message.unwrap_or_else(|| ALREADY_REGISTERED.to_string()))
    } else {
        Error::server(Some(status.as_u16()), REGISTRATION_FAILED)
    }
}

async fn server_message(response: reqwest::Response) -> Option<String> {
    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);
    let body = response.bytes().await.ok()?;
    message_from_body(content_type.as_deref(), &body)
}

impl ApiGateway for HttpApiGateway {
    async fn lookup_citizen(&self, credential: &str) -> Result<Citizen> {
        let response = self
            .client
            .get(self.endpoint(paths::CITIZEN_LOOKUP))
            .query(&[("credencial", credential)])
            .send()
            .await?;

        if !response.status().is_success() {
            tracing::info!(
                credential = %fingerprint(credential),
                status = response.status().as_u16(),
                "Citizen lookup missed"
            );
            return Err(Error::not_found(CITIZEN_NOT_FOUND));
        }

        Ok(response.json::<Citizen>().await?)
    }

    async fn register_voter(&self, request: &RegistrationRequest) -> Result<()> {
        let response = self
            .client
            .post(self.endpoint(paths::REGISTER_VOTER))
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let message = if status == StatusCode::CONFLICT {
            server_message(response).await
        } else {
            None
        };
        Err(registration_error(status, message))
    }

    async fn validate_authority(&self, credential: &AuthorityCredential) -> Result<()> {
        let response = self
            .client
            .post(self.endpoint(paths::VALIDATE_AUTHORITY))
            .json(credential)
            .send()
            .await?;

        if response.status().is_success() {
            return Ok(());
        }

        let message = server_message(response)
            .await
            .unwrap_or_else(|| INVALID_AUTHORITY.to_string());
        Err(Error::unauthorized(message))
    }

    async fn fetch_ballot_lists(&self, election_id: i64) -> Result<Vec<BallotList>> {
        let response = self
            .client
            .get(self.endpoint(paths::BALLOT_LISTS))
            .query(&[("eleccion_id", election_id)])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::server(
                Some(status.as_u16()),
                "No se pudieron obtener las listas de votación",
            ));
        }

        Ok(response.json::<Vec<BallotList>>().await?)
    }

    async fn submit_vote(&self, payload: &VotePayload) -> Result<()> {
        payload.validate()?;

        let response = self
            .client
            .post(self.endpoint(paths::SUBMIT_VOTE))
            .json(payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::server(Some(status.as_u16()), VOTE_FAILED));
        }
        Ok(())
    }

    async fn fetch_election(&self, election_id: i64) -> Result<ElectionInfo> {
        self.get_json(
            ApiOperation::FetchStatistics,
            &paths::election(election_id),
            "Error al obtener datos de la elección",
        )
        .await
    }

    async fn fetch_full_summary(&self, election_id: i64) -> Result<FullSummary> {
        self.get_json(
            ApiOperation::FetchStatistics,
            &paths::full_summary(election_id),
            "Error al obtener estadísticas completas",
        )
        .await
    }

    async fn fetch_department_statistics(
        &self,
        election_id: i64,
    ) -> Result<Vec<DepartmentStatistics>> {
        let envelope: DepartmentStatisticsEnvelope = self
            .get_json(
                ApiOperation::FetchStatistics,
                &paths::departments(election_id),
                "Error al obtener estadísticas por departamento",
            )
            .await?;
        Ok(envelope.departments)
    }

    async fn fetch_party_statistics(&self, election_id: i64) -> Result<Vec<PartyStatistics>> {
        let envelope: PartyStatisticsEnvelope = self
            .get_json(
                ApiOperation::FetchStatistics,
                &paths::parties(election_id),
                "Error al obtener estadísticas por partido",
            )
            .await?;
        Ok(envelope.parties)
    }

    async fn fetch_department_party_votes(
        &self,
        election_id: i64,
    ) -> Result<Vec<DepartmentPartyVotes>> {
        let envelope: DepartmentPartyEnvelope = self
            .get_json(
                ApiOperation::FetchStatistics,
                &paths::department_parties(election_id),
                "Error al obtener estadísticas por partido",
            )
            .await?;
        Ok(envelope.votes)
    }

    async fn fetch_department_detail(
        &self,
        election_id: i64,
        department_id: i64,
    ) -> Result<DepartmentDetail> {
        self.get_json(
            ApiOperation::FetchStatistics,
            &paths::department_detail(election_id, department_id),
            "Error al obtener detalles del departamento",
        )
        .await
    }

    async fn fetch_department_ranking(
        &self,
        election_id: i64,
        department_id: i64,
    ) -> Result<DepartmentRanking> {
        self.get_json(
            ApiOperation::FetchStatistics,
            &paths::department_ranking(election_id, department_id),
            "Error al obtener detalles del departamento",
        )
        .await
    }
}
