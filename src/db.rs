use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};

use crate::models::{SchoolRecord, SchoolUpdate};

pub async fn init_db(pool: &SqlitePool) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schools (
            external_id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            state TEXT NOT NULL,
            median_gpa REAL,
            sat_median INTEGER,
            act_median INTEGER,
            majors TEXT,
            last_updated TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Insert-or-replace by `external_id` in a single statement. Every mutable
/// field is replaced and `last_updated` is stamped with the current time;
/// a repeated upsert never creates a second row.
pub async fn upsert_school(pool: &SqlitePool, school: &SchoolUpdate) -> anyhow::Result<()> {
    let majors = school
        .majors
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;
    let now = Utc::now();

    sqlx::query(
        r#"
        INSERT INTO schools
        (external_id, name, state, median_gpa, sat_median, act_median, majors, last_updated)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT (external_id) DO UPDATE SET
            name = excluded.name,
            state = excluded.state,
            median_gpa = excluded.median_gpa,
            sat_median = excluded.sat_median,
            act_median = excluded.act_median,
            majors = excluded.majors,
            last_updated = excluded.last_updated
        "#,
    )
    .bind(school.external_id)
    .bind(&school.name)
    .bind(&school.state)
    .bind(school.median_gpa)
    .bind(school.sat_median)
    .bind(school.act_median)
    .bind(majors)
    .bind(now)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn get_school(
    pool: &SqlitePool,
    external_id: i64,
) -> anyhow::Result<Option<SchoolRecord>> {
    let row = sqlx::query("SELECT * FROM schools WHERE external_id = ?")
        .bind(external_id)
        .fetch_optional(pool)
        .await?;

    row.map(row_to_school).transpose()
}

/// Most recently refreshed rows, newest first.
pub async fn recent_schools(pool: &SqlitePool, limit: i64) -> anyhow::Result<Vec<SchoolRecord>> {
    let rows = sqlx::query("SELECT * FROM schools ORDER BY last_updated DESC LIMIT ?")
        .bind(limit)
        .fetch_all(pool)
        .await?;

    rows.into_iter().map(row_to_school).collect()
}

/// Cached rows for the requested ids, returned in the caller's id order.
/// Ids with no cached row are silently skipped.
pub async fn schools_by_external_ids(
    pool: &SqlitePool,
    ids: &[i64],
) -> anyhow::Result<Vec<SchoolRecord>> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }

    let placeholders = vec!["?"; ids.len()].join(", ");
    let sql = format!("SELECT * FROM schools WHERE external_id IN ({placeholders})");

    let mut query = sqlx::query(&sql);
    for id in ids {
        query = query.bind(*id);
    }

    let mut by_id: HashMap<i64, SchoolRecord> = HashMap::new();
    for row in query.fetch_all(pool).await? {
        let school = row_to_school(row)?;
        by_id.insert(school.external_id, school);
    }

    Ok(ids.iter().filter_map(|id| by_id.remove(id)).collect())
}

pub async fn seed(pool: &SqlitePool) -> anyhow::Result<()> {
    let schools = vec![
        SchoolUpdate {
            external_id: 166027,
            name: "University of Massachusetts-Amherst".to_string(),
            state: "MA".to_string(),
            median_gpa: Some(3.9),
            sat_median: Some(1390),
            act_median: Some(31),
            majors: Some(vec!["Computer Science".to_string(), "Biology".to_string()]),
        },
        SchoolUpdate {
            external_id: 164988,
            name: "Boston University".to_string(),
            state: "MA".to_string(),
            median_gpa: Some(3.8),
            sat_median: Some(1420),
            act_median: Some(32),
            majors: Some(vec!["Business".to_string(), "Engineering".to_string()]),
        },
        SchoolUpdate {
            external_id: 167358,
            name: "Suffolk University".to_string(),
            state: "MA".to_string(),
            median_gpa: Some(3.3),
            sat_median: Some(1160),
            act_median: Some(25),
            majors: Some(vec!["Law".to_string(), "Accounting".to_string()]),
        },
        SchoolUpdate {
            external_id: 166683,
            name: "Massachusetts Institute of Technology".to_string(),
            state: "MA".to_string(),
            median_gpa: None,
            sat_median: Some(1550),
            act_median: Some(35),
            majors: Some(vec!["Engineering".to_string(), "Mathematics".to_string()]),
        },
    ];

    for school in &schools {
        upsert_school(pool, school).await?;
    }

    Ok(())
}

pub async fn import_csv(pool: &SqlitePool, csv_path: &std::path::Path) -> anyhow::Result<usize> {
    #[derive(serde::Deserialize)]
    struct CsvRow {
        external_id: i64,
        name: String,
        state: String,
        median_gpa: Option<f64>,
        sat_median: Option<i64>,
        act_median: Option<i64>,
        majors: Option<String>,
    }

    let mut reader = csv::Reader::from_path(csv_path)?;
    let mut imported = 0usize;

    for result in reader.deserialize::<CsvRow>() {
        let row = result?;
        let majors = row.majors.filter(|m| !m.is_empty()).map(|m| {
            m.split(';')
                .map(|s| s.trim().to_string())
                .collect::<Vec<_>>()
        });

        upsert_school(
            pool,
            &SchoolUpdate {
                external_id: row.external_id,
                name: row.name,
                state: row.state,
                median_gpa: row.median_gpa,
                sat_median: row.sat_median,
                act_median: row.act_median,
                majors,
            },
        )
        .await?;
        imported += 1;
    }

    Ok(imported)
}

fn row_to_school(row: sqlx::sqlite::SqliteRow) -> anyhow::Result<SchoolRecord> {
    let majors: Option<String> = row.get("majors");
    let majors = majors.map(|m| serde_json::from_str(&m)).transpose()?;
    let last_updated: DateTime<Utc> = row.get("last_updated");

    Ok(SchoolRecord {
        external_id: row.get("external_id"),
        name: row.get("name"),
        state: row.get("state"),
        median_gpa: row.get("median_gpa"),
        sat_median: row.get("sat_median"),
        act_median: row.get("act_median"),
        majors,
        last_updated,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;
    use std::time::Duration;

    async fn test_pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        init_db(&pool).await.unwrap();
        pool
    }

    fn update(external_id: i64, name: &str) -> SchoolUpdate {
        SchoolUpdate {
            external_id,
            name: name.to_string(),
            state: "MA".to_string(),
            median_gpa: Some(3.5),
            sat_median: Some(1300),
            act_median: Some(29),
            majors: None,
        }
    }

    #[tokio::test]
    async fn upsert_replaces_in_place() {
        let pool = test_pool().await;

        upsert_school(&pool, &update(42, "Old Name")).await.unwrap();
        let first = get_school(&pool, 42).await.unwrap().unwrap();

        tokio::time::sleep(Duration::from_millis(10)).await;
        upsert_school(&pool, &update(42, "New Name")).await.unwrap();

        let count: i64 = sqlx::query("SELECT COUNT(*) AS n FROM schools")
            .fetch_one(&pool)
            .await
            .unwrap()
            .get("n");
        assert_eq!(count, 1);

        let second = get_school(&pool, 42).await.unwrap().unwrap();
        assert_eq!(second.name, "New Name");
        assert!(second.last_updated > first.last_updated);
    }

    #[tokio::test]
    async fn recent_schools_orders_newest_first() {
        let pool = test_pool().await;

        for (id, name) in [(1, "First"), (2, "Second"), (3, "Third")] {
            upsert_school(&pool, &update(id, name)).await.unwrap();
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        let recent = recent_schools(&pool, 2).await.unwrap();
        let ids: Vec<i64> = recent.iter().map(|s| s.external_id).collect();
        assert_eq!(ids, vec![3, 2]);
    }

    #[tokio::test]
    async fn lookup_by_ids_preserves_requested_order() {
        let pool = test_pool().await;

        for id in [10, 20, 30] {
            upsert_school(&pool, &update(id, "School")).await.unwrap();
        }

        let schools = schools_by_external_ids(&pool, &[30, 99, 10]).await.unwrap();
        let ids: Vec<i64> = schools.iter().map(|s| s.external_id).collect();
        assert_eq!(ids, vec![30, 10]);
    }

    #[tokio::test]
    async fn majors_round_trip_through_storage() {
        let pool = test_pool().await;

        let mut school = update(7, "Liberal Arts");
        school.majors = Some(vec!["History".to_string(), "English".to_string()]);
        upsert_school(&pool, &school).await.unwrap();

        let stored = get_school(&pool, 7).await.unwrap().unwrap();
        assert_eq!(
            stored.majors,
            Some(vec!["History".to_string(), "English".to_string()])
        );
    }

    #[tokio::test]
    async fn schema_is_created_only_by_init_db() {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();

        // Fresh database has no schools table until init_db runs.
        assert!(get_school(&pool, 1).await.is_err());

        init_db(&pool).await.unwrap();
        assert!(get_school(&pool, 1).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn missing_school_is_none() {
        let pool = test_pool().await;
        assert!(get_school(&pool, 404).await.unwrap().is_none());
    }
}
