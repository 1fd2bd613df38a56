use std::fmt::Write;

use crate::fit;
use crate::models::{ClassificationResult, SchoolRecord};

fn write_bucket(output: &mut String, heading: &str, results: &[ClassificationResult]) {
    let _ = writeln!(output);
    let _ = writeln!(output, "## {heading}");

    if results.is_empty() {
        let _ = writeln!(output, "No schools in this bucket.");
        return;
    }

    for result in results {
        let median = result
            .school
            .median_gpa
            .map(|g| format!("{g:.2}"))
            .unwrap_or_else(|| "n/a".to_string());
        let _ = writeln!(
            output,
            "- {} ({}) median GPA {} score {:+.3}",
            result.school.name, result.school.state, median, result.score
        );
    }
}

/// Markdown school-fit report: bucketed recommendations plus percentile
/// context over the same candidate set.
pub fn build_report(user_gpa: f64, candidates: &[SchoolRecord]) -> String {
    let grouped = fit::recommend(user_gpa, candidates);

    let mut output = String::new();
    let _ = writeln!(output, "# School Fit Report");
    let _ = writeln!(
        output,
        "Generated for GPA {:.2} across {} candidate schools",
        user_gpa,
        candidates.len()
    );

    write_bucket(&mut output, "Reach", &grouped.reach);
    write_bucket(&mut output, "Target", &grouped.target);
    write_bucket(&mut output, "Safety", &grouped.safety);

    let _ = writeln!(output);
    let _ = writeln!(output, "## GPA Standing");

    match fit::percentile_summary(user_gpa, candidates) {
        Ok(insights) => {
            let _ = writeln!(
                output,
                "Your GPA is at or above {:.1}% of {} schools with reported medians.",
                insights.user_percentile, insights.sample_size
            );
            for (label, count) in insights.labels.iter().zip(insights.counts.iter()) {
                let _ = writeln!(output, "- {label}: {count}");
            }
        }
        Err(_) => {
            let _ = writeln!(output, "No GPA data reported among these schools.");
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn school(external_id: i64, name: &str, median_gpa: Option<f64>) -> SchoolRecord {
        SchoolRecord {
            external_id,
            name: name.to_string(),
            state: "MA".to_string(),
            median_gpa,
            sat_median: None,
            act_median: None,
            majors: None,
            last_updated: Utc::now(),
        }
    }

    #[test]
    fn report_lists_buckets_and_percentile() {
        let candidates = vec![
            school(1, "Easy State", Some(2.8)),
            school(2, "Flagship U", Some(3.6)),
            school(3, "Elite Tech", Some(3.95)),
        ];

        let report = build_report(3.6, &candidates);
        assert!(report.contains("# School Fit Report"));
        assert!(report.contains("## Safety"));
        assert!(report.contains("Easy State"));
        assert!(report.contains("Flagship U"));
        assert!(report.contains("66.7%"));
    }

    #[test]
    fn report_degrades_without_gpa_data() {
        let candidates = vec![school(1, "Opaque College", None)];
        let report = build_report(3.0, &candidates);
        assert!(report.contains("Opaque College"));
        assert!(report.contains("No GPA data reported"));
    }
}
