use std::time::Duration;

use serde::Deserialize;
use sqlx::SqlitePool;
use tracing::{info, warn};

use crate::db;
use crate::errors::{AdvisorError, Result};
use crate::models::{RefreshOutcome, RefreshStatus, SchoolUpdate};

pub const DEFAULT_BASE_URL: &str = "https://api.data.gov/ed/collegescorecard/v1";

/// Field projection requested on every schools query.
const FIELDS: &str = "id,school.name,school.state,\
    latest.admissions.sat_scores.average.overall,\
    latest.admissions.act_scores.midpoint.cumulative,\
    latest.admissions.admission_rate.overall";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Pause between ids during a bulk refresh, as rate-limit courtesy.
const REFRESH_DELAY: Duration = Duration::from_millis(200);

/// Client for the College Scorecard schools-search endpoint.
pub struct ScorecardClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    results: Vec<RawSchool>,
}

#[derive(Debug, Deserialize)]
struct RawSchool {
    id: i64,
    #[serde(rename = "school.name")]
    name: String,
    #[serde(rename = "school.state")]
    state: String,
    #[serde(rename = "latest.admissions.sat_scores.average.overall")]
    sat_average: Option<f64>,
    #[serde(rename = "latest.admissions.act_scores.midpoint.cumulative")]
    act_midpoint: Option<f64>,
    #[serde(rename = "latest.admissions.admission_rate.overall")]
    admission_rate: Option<f64>,
}

impl RawSchool {
    fn into_update(self) -> SchoolUpdate {
        SchoolUpdate {
            external_id: self.id,
            name: self.name,
            state: self.state,
            median_gpa: estimate_median_gpa(self.sat_average, self.admission_rate),
            sat_median: self.sat_average.map(|v| v.round() as i64),
            act_median: self.act_midpoint.map(|v| v.round() as i64),
            majors: None,
        }
    }
}

/// The Scorecard API reports SAT averages and admission rates but no GPA
/// statistic, so the cached median GPA is estimated: a linear map from the
/// SAT average (800 -> 2.0, 1600 -> 4.0) when one is reported, otherwise a
/// coarse map from selectivity. Both clamp to [2.0, 4.0].
pub fn estimate_median_gpa(sat_average: Option<f64>, admission_rate: Option<f64>) -> Option<f64> {
    if let Some(sat) = sat_average {
        return Some((2.0 + (sat - 800.0) / 400.0).clamp(2.0, 4.0));
    }
    admission_rate.map(|rate| (4.0 - 1.4 * rate).clamp(2.0, 4.0))
}

impl ScorecardClient {
    pub fn new(base_url: String, api_key: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| AdvisorError::Provider(format!("failed to build client: {e}")))?;

        Ok(Self {
            client,
            base_url,
            api_key,
        })
    }

    /// Single-school lookup by Scorecard id. `Ok(None)` when the provider
    /// matches nothing; transport and HTTP failures are `Provider` errors
    /// and are not retried.
    pub async fn fetch_by_external_id(&self, id: i64) -> Result<Option<SchoolUpdate>> {
        self.fetch(&[("id", id.to_string())]).await
    }

    /// Single-school lookup by name. Matching is provider-side; the first
    /// result wins.
    pub async fn fetch_by_name(&self, name: &str) -> Result<Option<SchoolUpdate>> {
        self.fetch(&[("school.name", name.to_string())]).await
    }

    async fn fetch(&self, params: &[(&str, String)]) -> Result<Option<SchoolUpdate>> {
        let url = format!("{}/schools", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[("api_key", self.api_key.as_str()), ("fields", FIELDS)])
            .query(params)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(AdvisorError::Provider(format!(
                "scorecard returned {status}"
            )));
        }

        let body: SearchResponse = response.json().await?;
        Ok(body.results.into_iter().next().map(RawSchool::into_update))
    }

    /// Sequentially fetch and upsert each id, pausing between calls. One
    /// id's failure is recorded in its outcome and the batch continues.
    pub async fn bulk_refresh(&self, pool: &SqlitePool, ids: &[i64]) -> Vec<RefreshOutcome> {
        let mut outcomes = Vec::with_capacity(ids.len());

        for (i, id) in ids.iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(REFRESH_DELAY).await;
            }

            let result = self.refresh_one(pool, *id).await;
            match &result {
                Ok(RefreshStatus::Updated) => info!(external_id = *id, "school refreshed"),
                Ok(RefreshStatus::NotFound) => info!(external_id = *id, "no provider match"),
                Err(e) => warn!(external_id = *id, error = %e, "refresh failed"),
            }

            outcomes.push(RefreshOutcome {
                external_id: *id,
                result,
            });
        }

        outcomes
    }

    async fn refresh_one(&self, pool: &SqlitePool, id: i64) -> Result<RefreshStatus> {
        match self.fetch_by_external_id(id).await? {
            Some(update) => {
                db::upsert_school(pool, &update).await?;
                Ok(RefreshStatus::Updated)
            }
            None => Ok(RefreshStatus::NotFound),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_scorecard_search_payload() {
        let payload = r#"{
            "metadata": {"total": 1, "page": 0, "per_page": 20},
            "results": [{
                "id": 166027,
                "school.name": "University of Massachusetts-Amherst",
                "school.state": "MA",
                "latest.admissions.sat_scores.average.overall": 1390.0,
                "latest.admissions.act_scores.midpoint.cumulative": 31.0,
                "latest.admissions.admission_rate.overall": 0.58
            }]
        }"#;

        let parsed: SearchResponse = serde_json::from_str(payload).unwrap();
        let school = parsed.results.into_iter().next().unwrap().into_update();

        assert_eq!(school.external_id, 166027);
        assert_eq!(school.state, "MA");
        assert_eq!(school.sat_median, Some(1390));
        assert_eq!(school.act_median, Some(31));
        assert!(school.median_gpa.is_some());
    }

    #[test]
    fn empty_results_means_not_found() {
        let payload = r#"{"results": []}"#;
        let parsed: SearchResponse = serde_json::from_str(payload).unwrap();
        assert!(parsed.results.into_iter().next().is_none());
    }

    #[test]
    fn missing_stats_deserialize_as_none() {
        let payload = r#"{
            "results": [{
                "id": 9,
                "school.name": "Tiny College",
                "school.state": "VT",
                "latest.admissions.sat_scores.average.overall": null,
                "latest.admissions.act_scores.midpoint.cumulative": null,
                "latest.admissions.admission_rate.overall": null
            }]
        }"#;

        let parsed: SearchResponse = serde_json::from_str(payload).unwrap();
        let school = parsed.results.into_iter().next().unwrap().into_update();
        assert_eq!(school.sat_median, None);
        assert_eq!(school.act_median, None);
        assert_eq!(school.median_gpa, None);
    }

    #[test]
    fn gpa_estimate_prefers_sat_average() {
        let gpa = estimate_median_gpa(Some(1400.0), Some(0.9)).unwrap();
        assert!((gpa - 3.5).abs() < 1e-9);
    }

    #[test]
    fn gpa_estimate_clamps_to_scale() {
        assert_eq!(estimate_median_gpa(Some(600.0), None), Some(2.0));
        assert_eq!(estimate_median_gpa(Some(1700.0), None), Some(4.0));
    }

    #[test]
    fn gpa_estimate_falls_back_to_selectivity() {
        let open = estimate_median_gpa(None, Some(1.0)).unwrap();
        let selective = estimate_median_gpa(None, Some(0.05)).unwrap();
        assert!(selective > open);
        assert!((2.0..=4.0).contains(&open));
        assert!((2.0..=4.0).contains(&selective));
    }
}
