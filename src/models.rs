use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::AdvisorError;

/// A cached school row, keyed by the Scorecard identifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchoolRecord {
    pub external_id: i64,
    pub name: String,
    pub state: String,
    pub median_gpa: Option<f64>,
    pub sat_median: Option<i64>,
    pub act_median: Option<i64>,
    pub majors: Option<Vec<String>>,
    pub last_updated: DateTime<Utc>,
}

/// School fields as they arrive from the provider or an import file.
/// The cache layer stamps `last_updated` when the row is upserted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchoolUpdate {
    pub external_id: i64,
    pub name: String,
    pub state: String,
    pub median_gpa: Option<f64>,
    pub sat_median: Option<i64>,
    pub act_median: Option<i64>,
    pub majors: Option<Vec<String>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Bucket {
    Reach,
    Target,
    Safety,
}

impl Bucket {
    pub fn label(self) -> &'static str {
        match self {
            Bucket::Reach => "reach",
            Bucket::Target => "target",
            Bucket::Safety => "safety",
        }
    }
}

/// Per-school classification, recomputed on every request.
#[derive(Debug, Clone, Serialize)]
pub struct ClassificationResult {
    pub school: SchoolRecord,
    pub score: f64,
    pub bucket: Bucket,
}

/// Candidates partitioned by bucket, input order preserved within each.
#[derive(Debug, Default)]
pub struct Recommendations {
    pub reach: Vec<ClassificationResult>,
    pub target: Vec<ClassificationResult>,
    pub safety: Vec<ClassificationResult>,
}

/// Histogram plus percentile context for a user's GPA against a candidate set.
#[derive(Debug, Clone, Serialize)]
pub struct GpaInsights {
    pub labels: Vec<String>,
    pub counts: Vec<usize>,
    pub user_percentile: f64,
    pub sample_size: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshStatus {
    Updated,
    NotFound,
}

/// Outcome of one id within a bulk refresh. Failures are collected here
/// rather than aborting the batch.
#[derive(Debug)]
pub struct RefreshOutcome {
    pub external_id: i64,
    pub result: Result<RefreshStatus, AdvisorError>,
}
