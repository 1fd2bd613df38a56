use crate::errors::{AdvisorError, Result};
use crate::models::{Bucket, ClassificationResult, GpaInsights, Recommendations, SchoolRecord};

/// Score at or below this is a reach school.
pub const REACH_THRESHOLD: f64 = -0.10;
/// Score above the reach threshold and at or below this is a target.
pub const SAFETY_THRESHOLD: f64 = 0.10;

pub const HISTOGRAM_MIN: f64 = 2.0;
pub const HISTOGRAM_MAX: f64 = 4.0;
pub const HISTOGRAM_BINS: usize = 10;

/// Both thresholds are closed on the included side: a score exactly at
/// the reach threshold is reach, exactly at the safety threshold target.
pub fn bucket_for(score: f64) -> Bucket {
    if score <= REACH_THRESHOLD {
        Bucket::Reach
    } else if score <= SAFETY_THRESHOLD {
        Bucket::Target
    } else {
        Bucket::Safety
    }
}

/// Normalized GPA gap and its bucket. A missing school median gives a
/// score of exactly 0.0, which lands in target.
pub fn classify_gpa(user_gpa: f64, school_gpa: Option<f64>) -> (f64, Bucket) {
    let score = match school_gpa {
        Some(gpa) => user_gpa / 4.0 - gpa / 4.0,
        None => 0.0,
    };

    (score, bucket_for(score))
}

pub fn classify(user_gpa: f64, school: &SchoolRecord) -> ClassificationResult {
    let (score, bucket) = classify_gpa(user_gpa, school.median_gpa);
    ClassificationResult {
        school: school.clone(),
        score,
        bucket,
    }
}

/// Classifies every candidate independently and groups by bucket.
/// Within a bucket, schools keep their input order.
pub fn recommend(user_gpa: f64, candidates: &[SchoolRecord]) -> Recommendations {
    let mut grouped = Recommendations::default();

    for school in candidates {
        let result = classify(user_gpa, school);
        match result.bucket {
            Bucket::Reach => grouped.reach.push(result),
            Bucket::Target => grouped.target.push(result),
            Bucket::Safety => grouped.safety.push(result),
        }
    }

    grouped
}

/// GPA histogram over the candidate set plus the user's inclusive
/// percentile. Candidates without a median GPA are dropped; an empty
/// remainder is an error, not an empty summary.
pub fn percentile_summary(user_gpa: f64, candidates: &[SchoolRecord]) -> Result<GpaInsights> {
    let medians: Vec<f64> = candidates.iter().filter_map(|s| s.median_gpa).collect();

    if medians.is_empty() {
        return Err(AdvisorError::InsufficientData);
    }

    let mut counts = vec![0usize; HISTOGRAM_BINS];
    for gpa in &medians {
        counts[bin_index(*gpa)] += 1;
    }

    let at_or_below = medians.iter().filter(|m| **m <= user_gpa).count();
    let user_percentile = 100.0 * at_or_below as f64 / medians.len() as f64;

    Ok(GpaInsights {
        labels: bin_labels(),
        counts,
        user_percentile,
        sample_size: medians.len(),
    })
}

/// Values outside [2.0, 4.0) clamp into the edge bins.
fn bin_index(gpa: f64) -> usize {
    let width = (HISTOGRAM_MAX - HISTOGRAM_MIN) / HISTOGRAM_BINS as f64;
    let raw = ((gpa - HISTOGRAM_MIN) / width).floor() as i64;
    raw.clamp(0, HISTOGRAM_BINS as i64 - 1) as usize
}

pub fn bin_labels() -> Vec<String> {
    let width = (HISTOGRAM_MAX - HISTOGRAM_MIN) / HISTOGRAM_BINS as f64;
    (0..HISTOGRAM_BINS)
        .map(|i| {
            let lo = HISTOGRAM_MIN + width * i as f64;
            format!("{:.1}-{:.1}", lo, lo + width)
        })
        .collect()
}
