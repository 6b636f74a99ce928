//! Read-only election statistics
//!
//! The statistics dashboard has no state machine of its own: it receives an
//! election identifier, fetches aggregates through the [`ApiGateway`] when a
//! tab is opened, and renders them. Tabs that need two responses fetch them
//! concurrently and fail as a whole if either call fails.
//!
//! The aggregate types mirror the API's JSON. Counts and percentages are
//! decoded leniently because the API reports SQL `SUM`/`DECIMAL` columns as
//! strings.

use crate::Result;
use crate::api::ApiGateway;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::sync::Arc;

/// Election metadata shown in the dashboard header
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElectionInfo {
    #[serde(rename = "Nombre")]
    pub name: String,

    /// Date as reported by the API (ISO 8601, date or datetime)
    #[serde(rename = "Fecha")]
    pub date: String,

    #[serde(rename = "TipoEleccion", default)]
    pub kind: Option<String>,

    #[serde(rename = "Estado", default)]
    pub status: Option<String>,
}

impl ElectionInfo {
    /// Calendar date of the election, if the API date is parseable
    pub fn calendar_date(&self) -> Option<NaiveDate> {
        let day = self.date.get(..10)?;
        NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
    }
}

/// National totals
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GeneralSummary {
    #[serde(rename = "total_votos", default, deserialize_with = "lenient::count")]
    pub total_votes: u64,

    #[serde(rename = "votos_validos", default, deserialize_with = "lenient::count")]
    pub valid_votes: u64,

    #[serde(rename = "votos_blancos", default, deserialize_with = "lenient::count")]
    pub blank_votes: u64,

    #[serde(rename = "votos_anulados", default, deserialize_with = "lenient::count")]
    pub void_votes: u64,
}

/// Per-party totals
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartyStatistics {
    #[serde(rename = "id_Partido")]
    pub party_id: i64,

    #[serde(rename = "partido_nombre")]
    pub party_name: String,

    #[serde(rename = "total_votos", default, deserialize_with = "lenient::count")]
    pub total_votes: u64,

    #[serde(rename = "total_listas", default, deserialize_with = "lenient::count")]
    pub total_lists: u64,

    #[serde(
        rename = "porcentaje_votos_validos",
        default,
        deserialize_with = "lenient::decimal"
    )]
    pub valid_vote_percentage: f64,
}

/// Per-department totals
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepartmentStatistics {
    #[serde(rename = "id_Departamento")]
    pub department_id: i64,

    #[serde(rename = "departamento_nombre")]
    pub department_name: String,

    #[serde(rename = "total_votos", default, deserialize_with = "lenient::count")]
    pub total_votes: u64,

    #[serde(rename = "votos_validos", default, deserialize_with = "lenient::count")]
    pub valid_votes: u64,

    #[serde(rename = "votos_blancos", default, deserialize_with = "lenient::count")]
    pub blank_votes: u64,

    #[serde(rename = "votos_anulados", default, deserialize_with = "lenient::count")]
    pub void_votes: u64,

    #[serde(
        rename = "total_establecimientos",
        default,
        deserialize_with = "lenient::count"
    )]
    pub polling_places: u64,
}

/// Votes of one party inside one department
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepartmentPartyVotes {
    #[serde(rename = "id_Departamento")]
    pub department_id: i64,

    #[serde(rename = "departamento_nombre", default)]
    pub department_name: String,

    #[serde(rename = "id_Partido")]
    pub party_id: i64,

    #[serde(rename = "partido_nombre", default)]
    pub party_name: String,

    #[serde(rename = "total_votos", default, deserialize_with = "lenient::count")]
    pub total_votes: u64,

    #[serde(
        rename = "porcentaje_departamento",
        default,
        deserialize_with = "lenient::decimal"
    )]
    pub department_percentage: f64,
}

/// One row of a department's party ranking
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartyRankingEntry {
    #[serde(rename = "id_Partido")]
    pub party_id: i64,

    #[serde(rename = "partido_nombre")]
    pub party_name: String,

    #[serde(rename = "total_votos", default, deserialize_with = "lenient::count")]
    pub total_votes: u64,

    #[serde(
        rename = "porcentaje_departamento",
        default,
        deserialize_with = "lenient::decimal"
    )]
    pub department_percentage: f64,
}

/// Totals of one polling place
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollingPlaceStatistics {
    #[serde(rename = "establecimiento_nombre")]
    pub name: String,

    #[serde(rename = "circuito_numero", default, deserialize_with = "lenient::label")]
    pub circuit: String,

    #[serde(rename = "total_votos", default, deserialize_with = "lenient::count")]
    pub total_votes: u64,

    #[serde(rename = "votos_validos", default, deserialize_with = "lenient::count")]
    pub valid_votes: u64,

    #[serde(rename = "votos_blancos", default, deserialize_with = "lenient::count")]
    pub blank_votes: u64,

    #[serde(rename = "votos_anulados", default, deserialize_with = "lenient::count")]
    pub void_votes: u64,
}

/// Polling-place breakdown of a department
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DepartmentDetail {
    #[serde(rename = "estadisticas_detalladas", default)]
    pub polling_places: Vec<PollingPlaceStatistics>,
}

/// Party ranking of a department
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DepartmentRanking {
    #[serde(rename = "ranking_partidos", default)]
    pub parties: Vec<PartyRankingEntry>,
}

/// `resumen-completo` response
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FullSummary {
    #[serde(rename = "resumen_general", default)]
    pub general: GeneralSummary,

    #[serde(rename = "estadisticas_departamentos", default)]
    pub departments: Vec<DepartmentStatistics>,

    #[serde(rename = "estadisticas_partidos", default)]
    pub parties: Vec<PartyStatistics>,

    #[serde(rename = "votos_departamento_partido", default)]
    pub department_parties: Vec<DepartmentPartyVotes>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct DepartmentStatisticsEnvelope {
    #[serde(rename = "estadisticas_por_departamento", default)]
    pub(crate) departments: Vec<DepartmentStatistics>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PartyStatisticsEnvelope {
    #[serde(rename = "estadisticas_por_partido", default)]
    pub(crate) parties: Vec<PartyStatistics>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct DepartmentPartyEnvelope {
    #[serde(rename = "votos_por_departamento_y_partido", default)]
    pub(crate) votes: Vec<DepartmentPartyVotes>,
}

/// Dashboard tabs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatisticsTab {
    General,
    Departments,
    Parties,
    Detailed,
}

impl StatisticsTab {
    pub const ALL: [StatisticsTab; 4] = [
        StatisticsTab::General,
        StatisticsTab::Departments,
        StatisticsTab::Parties,
        StatisticsTab::Detailed,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            StatisticsTab::General => "Resumen General",
            StatisticsTab::Departments => "Por Departamento",
            StatisticsTab::Parties => "Por Partido",
            StatisticsTab::Detailed => "Análisis Detallado",
        }
    }
}

/// Data for one opened tab
#[derive(Debug, Clone, PartialEq)]
pub enum StatisticsPanel {
    General(FullSummary),
    Departments(Vec<DepartmentStatistics>),
    Parties {
        parties: Vec<PartyStatistics>,
        by_department: Vec<DepartmentPartyVotes>,
    },
    Detailed {
        summary: FullSummary,
        analysis: DetailedAnalysis,
    },
}

/// Department drill-down (detail and ranking fetched together)
#[derive(Debug, Clone, PartialEq)]
pub struct DepartmentBreakdown {
    pub detail: DepartmentDetail,
    pub ranking: DepartmentRanking,
}

/// Statistics dashboard collaborator
pub struct StatisticsView<A: ApiGateway> {
    api: Arc<A>,
    election_id: i64,
}

impl<A: ApiGateway> StatisticsView<A> {
    pub fn new(api: Arc<A>, election_id: i64) -> Self {
        Self { api, election_id }
    }

    pub fn election_id(&self) -> i64 {
        self.election_id
    }

    /// Header metadata
    pub async fn election(&self) -> Result<ElectionInfo> {
        self.api.fetch_election(self.election_id).await
    }

    /// Fetch the data behind a tab
    pub async fn load(&self, tab: StatisticsTab) -> Result<StatisticsPanel> {
        tracing::debug!(election = self.election_id, tab = ?tab, "Loading statistics tab");

        let panel = match tab {
            StatisticsTab::General => {
                StatisticsPanel::General(self.api.fetch_full_summary(self.election_id).await?)
            }
            StatisticsTab::Departments => StatisticsPanel::Departments(
                self.api
                    .fetch_department_statistics(self.election_id)
                    .await?,
            ),
            StatisticsTab::Parties => {
                let (parties, by_department) = tokio::try_join!(
                    self.api.fetch_party_statistics(self.election_id),
                    self.api.fetch_department_party_votes(self.election_id),
                )?;
                StatisticsPanel::Parties {
                    parties,
                    by_department,
                }
            }
            StatisticsTab::Detailed => {
                let summary = self.api.fetch_full_summary(self.election_id).await?;
                let analysis = DetailedAnalysis::from_summary(&summary);
                StatisticsPanel::Detailed { summary, analysis }
            }
        };

        Ok(panel)
    }

    /// Fetch polling-place detail and party ranking of a department together
    pub async fn department_breakdown(&self, department_id: i64) -> Result<DepartmentBreakdown> {
        let (detail, ranking) = tokio::try_join!(
            self.api
                .fetch_department_detail(self.election_id, department_id),
            self.api
                .fetch_department_ranking(self.election_id, department_id),
        )?;

        Ok(DepartmentBreakdown { detail, ranking })
    }
}

/// Percentage of `part` over `total`, rounded to two decimals; 0 when total is 0
pub fn percentage(part: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    ((part as f64 / total as f64) * 10_000.0).round() / 100.0
}

/// Shares of valid, blank and void votes over the total
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParticipationAnalysis {
    pub valid_rate: f64,
    pub blank_rate: f64,
    pub void_rate: f64,
}

impl ParticipationAnalysis {
    pub fn from_summary(summary: &GeneralSummary) -> Self {
        Self {
            valid_rate: percentage(summary.valid_votes, summary.total_votes),
            blank_rate: percentage(summary.blank_votes, summary.total_votes),
            void_rate: percentage(summary.void_votes, summary.total_votes),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepartmentComparison {
    pub with_votes: usize,
    pub without_votes: usize,
    pub top_department: Option<DepartmentStatistics>,
    pub average_votes_per_department: f64,
}

impl DepartmentComparison {
    pub fn from_departments(departments: &[DepartmentStatistics]) -> Self {
        let active: Vec<&DepartmentStatistics> = departments
            .iter()
            .filter(|department| department.total_votes > 0)
            .collect();

        let average_votes_per_department = if active.is_empty() {
            0.0
        } else {
            let total: u64 = active.iter().map(|department| department.total_votes).sum();
            ((total as f64 / active.len() as f64) * 10.0).round() / 10.0
        };

        Self {
            with_votes: active.len(),
            without_votes: departments.len() - active.len(),
            top_department: active
                .iter()
                .max_by_key(|department| department.total_votes)
                .map(|department| (*department).clone()),
            average_votes_per_department,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartyAnalysis {
    pub winner: Option<PartyStatistics>,
    pub runner_up: Option<PartyStatistics>,
    /// Vote difference between winner and runner-up (0 without a runner-up)
    pub margin: u64,
    /// Winner's share of all party votes
    pub concentration: f64,
}

impl PartyAnalysis {
    pub fn from_parties(parties: &[PartyStatistics]) -> Self {
        let mut ranked: Vec<&PartyStatistics> = parties.iter().collect();
        ranked.sort_by_key(|party| Reverse(party.total_votes));

        let total: u64 = parties.iter().map(|party| party.total_votes).sum();
        let winner = ranked.first().map(|party| (*party).clone());
        let runner_up = ranked.get(1).map(|party| (*party).clone());

        let margin = match (&winner, &runner_up) {
            (Some(winner), Some(runner_up)) => winner.total_votes - runner_up.total_votes,
            _ => 0,
        };
        let concentration = winner
            .as_ref()
            .map(|winner| percentage(winner.total_votes, total))
            .unwrap_or(0.0);

        Self {
            winner,
            runner_up,
            margin,
            concentration,
        }
    }
}

/// Everything the detailed-analysis tab derives from the full summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetailedAnalysis {
    pub participation: ParticipationAnalysis,
    pub departments: DepartmentComparison,
    pub parties: PartyAnalysis,
}

impl DetailedAnalysis {
    pub fn from_summary(summary: &FullSummary) -> Self {
        Self {
            participation: ParticipationAnalysis::from_summary(&summary.general),
            departments: DepartmentComparison::from_departments(&summary.departments),
            parties: PartyAnalysis::from_parties(&summary.parties),
        }
    }
}

/// Party rows of one department, most voted first
pub fn parties_in_department(
    votes: &[DepartmentPartyVotes],
    department_id: i64,
) -> Vec<&DepartmentPartyVotes> {
    let mut rows: Vec<&DepartmentPartyVotes> = votes
        .iter()
        .filter(|row| row.department_id == department_id)
        .collect();
    rows.sort_by_key(|row| Reverse(row.total_votes));
    rows
}

/// Department rows of one party, most voted first
pub fn departments_for_party(
    votes: &[DepartmentPartyVotes],
    party_id: i64,
) -> Vec<&DepartmentPartyVotes> {
    let mut rows: Vec<&DepartmentPartyVotes> = votes
        .iter()
        .filter(|row| row.party_id == party_id)
        .collect();
    rows.sort_by_key(|row| Reverse(row.total_votes));
    rows
}

mod lenient {
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    pub fn count<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
        let value = decimal(deserializer)?;
        Ok(value.max(0.0).round() as u64)
    }

    pub fn decimal<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        match Value::deserialize(deserializer)? {
            Value::Null => Ok(0.0),
            Value::Number(number) => number
                .as_f64()
                .ok_or_else(|| D::Error::custom("number out of range")),
            Value::String(text) => text.trim().parse::<f64>().map_err(D::Error::custom),
            other => Err(D::Error::custom(format!("expected a number, got {other}"))),
        }
    }

    pub fn label<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
        match Value::deserialize(deserializer)? {
            Value::Null => Ok(String::new()),
            Value::String(text) => Ok(text),
            Value::Number(number) => Ok(number.to_string()),
            other => Err(D::Error::custom(format!("expected a label, got {other}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn party(id: i64, name: &str, votes: u64) -> PartyStatistics {
        PartyStatistics {
            party_id: id,
            party_name: name.to_string(),
            total_votes: votes,
            total_lists: 1,
            valid_vote_percentage: 0.0,
        }
    }

    fn department(id: i64, votes: u64) -> DepartmentStatistics {
        DepartmentStatistics {
            department_id: id,
            department_name: format!("Departamento {id}"),
            total_votes: votes,
            valid_votes: votes,
            blank_votes: 0,
            void_votes: 0,
            polling_places: 2,
        }
    }

    #[test]
    fn test_lenient_decoding_of_sql_numbers() {
        let summary: GeneralSummary = serde_json::from_value(json!({
            "total_votos": 10,
            "votos_validos": "7",
            "votos_blancos": "2.0",
            "votos_anulados": null
        }))
        .unwrap();

        assert_eq!(summary.total_votes, 10);
        assert_eq!(summary.valid_votes, 7);
        assert_eq!(summary.blank_votes, 2);
        assert_eq!(summary.void_votes, 0);

        let row: PartyRankingEntry = serde_json::from_value(json!({
            "id_Partido": 1,
            "partido_nombre": "Partido A",
            "total_votos": "3",
            "porcentaje_departamento": "42.86"
        }))
        .unwrap();
        assert_eq!(row.total_votes, 3);
        assert!((row.department_percentage - 42.86).abs() < f64::EPSILON);

        let place: PollingPlaceStatistics = serde_json::from_value(json!({
            "establecimiento_nombre": "Escuela 1",
            "circuito_numero": 102
        }))
        .unwrap();
        assert_eq!(place.circuit, "102");
        assert_eq!(place.total_votes, 0);
    }

    #[test]
    fn test_lenient_decoding_rejects_garbage() {
        let result: std::result::Result<GeneralSummary, _> =
            serde_json::from_value(json!({"total_votos": "muchos"}));
        assert!(result.is_err());
    }

    #[test]
    fn test_election_calendar_date() {
        let info: ElectionInfo = serde_json::from_value(json!({
            "Nombre": "Elecciones Departamentales",
            "Fecha": "2025-05-11T00:00:00.000Z",
            "TipoEleccion": "Departamental",
            "Estado": "Activa"
        }))
        .unwrap();

        assert_eq!(info.calendar_date(), NaiveDate::from_ymd_opt(2025, 5, 11));

        let broken = ElectionInfo {
            date: "mañana".to_string(),
            ..info
        };
        assert_eq!(broken.calendar_date(), None);
    }

    #[test]
    fn test_percentage() {
        assert_eq!(percentage(1, 3), 33.33);
        assert_eq!(percentage(2, 3), 66.67);
        assert_eq!(percentage(5, 0), 0.0);
    }

    #[test]
    fn test_participation_analysis() {
        let analysis = ParticipationAnalysis::from_summary(&GeneralSummary {
            total_votes: 8,
            valid_votes: 6,
            blank_votes: 1,
            void_votes: 1,
        });
        assert_eq!(analysis.valid_rate, 75.0);
        assert_eq!(analysis.blank_rate, 12.5);
        assert_eq!(analysis.void_rate, 12.5);

        let empty = ParticipationAnalysis::from_summary(&GeneralSummary::default());
        assert_eq!(empty.valid_rate, 0.0);
    }

    #[test]
    fn test_department_comparison() {
        let comparison = DepartmentComparison::from_departments(&[
            department(1, 4),
            department(2, 0),
            department(3, 7),
        ]);

        assert_eq!(comparison.with_votes, 2);
        assert_eq!(comparison.without_votes, 1);
        assert_eq!(comparison.top_department.unwrap().department_id, 3);
        assert_eq!(comparison.average_votes_per_department, 5.5);

        let none = DepartmentComparison::from_departments(&[department(1, 0)]);
        assert_eq!(none.top_department, None);
        assert_eq!(none.average_votes_per_department, 0.0);
    }

    #[test]
    fn test_party_analysis_orders_by_votes() {
        let analysis = PartyAnalysis::from_parties(&[
            party(1, "Partido A", 3),
            party(2, "Partido B", 5),
            party(3, "Partido C", 2),
        ]);

        assert_eq!(analysis.winner.as_ref().unwrap().party_name, "Partido B");
        assert_eq!(analysis.runner_up.as_ref().unwrap().party_name, "Partido A");
        assert_eq!(analysis.margin, 2);
        assert_eq!(analysis.concentration, 50.0);

        let single = PartyAnalysis::from_parties(&[party(1, "Partido A", 3)]);
        assert_eq!(single.margin, 0);
        assert_eq!(single.concentration, 100.0);

        let empty = PartyAnalysis::from_parties(&[]);
        assert!(empty.winner.is_none());
        assert_eq!(empty.concentration, 0.0);
    }

    #[test]
    fn test_cross_tabulation_filters() {
        let votes: Vec<DepartmentPartyVotes> = serde_json::from_value(json!([
            {"id_Departamento": 1, "id_Partido": 1, "total_votos": 2},
            {"id_Departamento": 1, "id_Partido": 2, "total_votos": 5},
            {"id_Departamento": 2, "id_Partido": 1, "total_votos": 9}
        ]))
        .unwrap();

        let in_first: Vec<i64> = parties_in_department(&votes, 1)
            .iter()
            .map(|row| row.party_id)
            .collect();
        assert_eq!(in_first, vec![2, 1]);

        let for_first: Vec<i64> = departments_for_party(&votes, 1)
            .iter()
            .map(|row| row.department_id)
            .collect();
        assert_eq!(for_first, vec![2, 1]);
    }
}
