use std::path::PathBuf;

use anyhow::Context;
use clap::{ArgGroup, Parser, Subcommand};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;

mod api;
mod db;
mod errors;
mod fit;
mod logging;
mod models;
mod report;
mod scorecard;

use models::{RefreshStatus, SchoolRecord};
use scorecard::ScorecardClient;

#[derive(Parser)]
#[command(name = "pathwise-advisor")]
#[command(about = "School-fit advising backend for PathWise", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the database schema
    InitDb,
    /// Load a handful of realistic school rows
    Seed,
    /// Import school rows from a CSV file
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Fetch one school from the Scorecard API and cache it
    #[command(group(
        ArgGroup::new("key")
            .args(["id", "name"])
            .required(true)
            .multiple(false)
    ))]
    Fetch {
        #[arg(long)]
        id: Option<i64>,
        #[arg(long)]
        name: Option<String>,
    },
    /// Refresh cached rows for a list of Scorecard ids
    Refresh {
        #[arg(required = true)]
        ids: Vec<i64>,
    },
    /// Classify cached schools against a GPA
    Recommend {
        #[arg(long)]
        gpa: f64,
        #[arg(long)]
        ids: Option<Vec<i64>>,
        #[arg(long, default_value_t = 10)]
        limit: i64,
    },
    /// Write a markdown school-fit report
    Report {
        #[arg(long)]
        gpa: f64,
        #[arg(long)]
        ids: Option<Vec<i64>>,
        #[arg(long, default_value_t = 20)]
        limit: i64,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
    /// Serve the recommendations and insights API
    Serve {
        #[arg(long, default_value = "127.0.0.1:8000")]
        bind: String,
    },
}

fn scorecard_client() -> anyhow::Result<ScorecardClient> {
    let api_key = std::env::var("SCORECARD_API_KEY")
        .context("SCORECARD_API_KEY must be set to query the Scorecard API")?;
    let base_url = std::env::var("SCORECARD_BASE_URL")
        .unwrap_or_else(|_| scorecard::DEFAULT_BASE_URL.to_string());
    Ok(ScorecardClient::new(base_url, api_key)?)
}

fn env_limit(name: &str, default: i64) -> anyhow::Result<i64> {
    match std::env::var(name) {
        Ok(value) => value
            .parse()
            .with_context(|| format!("{name} must be an integer")),
        Err(_) => Ok(default),
    }
}

async fn candidate_set(
    pool: &SqlitePool,
    ids: Option<&[i64]>,
    limit: i64,
) -> anyhow::Result<Vec<SchoolRecord>> {
    match ids {
        Some(ids) if !ids.is_empty() => db::schools_by_external_ids(pool, ids).await,
        _ => db::recent_schools(pool, limit).await,
    }
}

fn print_school(school: &models::SchoolUpdate) {
    println!(
        "{} ({}) id {} median GPA {} SAT {} ACT {}",
        school.name,
        school.state,
        school.external_id,
        school
            .median_gpa
            .map(|g| format!("{g:.2}"))
            .unwrap_or_else(|| "n/a".to_string()),
        school
            .sat_median
            .map(|s| s.to_string())
            .unwrap_or_else(|| "n/a".to_string()),
        school
            .act_median
            .map(|a| a.to_string())
            .unwrap_or_else(|| "n/a".to_string()),
    );
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init();

    let cli = Cli::parse();
    let database_url = std::env::var("DATABASE_URL")
        .unwrap_or_else(|_| "sqlite://pathwise.db?mode=rwc".to_string());

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .context("failed to open the schools database")?;

    match cli.command {
        Commands::InitDb => {
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            db::seed(&pool).await?;
            println!("Seed schools inserted.");
        }
        Commands::Import { csv } => {
            let imported = db::import_csv(&pool, &csv).await?;
            println!("Imported {imported} schools from {}.", csv.display());
        }
        Commands::Fetch { id, name } => {
            let client = scorecard_client()?;
            let fetched = match (id, name) {
                (Some(id), _) => client.fetch_by_external_id(id).await?,
                (_, Some(name)) => client.fetch_by_name(&name).await?,
                _ => unreachable!("clap enforces exactly one key"),
            };

            match fetched {
                Some(school) => {
                    db::upsert_school(&pool, &school).await?;
                    print_school(&school);
                }
                None => println!("No school matched."),
            }
        }
        Commands::Refresh { ids } => {
            let client = scorecard_client()?;
            let outcomes = client.bulk_refresh(&pool, &ids).await;

            let updated = outcomes
                .iter()
                .filter(|o| matches!(o.result, Ok(RefreshStatus::Updated)))
                .count();
            let missing = outcomes
                .iter()
                .filter(|o| matches!(o.result, Ok(RefreshStatus::NotFound)))
                .count();

            println!(
                "Refreshed {updated} of {} schools ({missing} unmatched).",
                outcomes.len()
            );
            for outcome in &outcomes {
                if let Err(e) = &outcome.result {
                    println!("- {} failed: {e}", outcome.external_id);
                }
            }
        }
        Commands::Recommend { gpa, ids, limit } => {
            let candidates = candidate_set(&pool, ids.as_deref(), limit).await?;
            if candidates.is_empty() {
                println!("No cached schools to classify.");
                return Ok(());
            }

            let grouped = fit::recommend(gpa, &candidates);
            for (heading, results) in [
                ("Reach", &grouped.reach),
                ("Target", &grouped.target),
                ("Safety", &grouped.safety),
            ] {
                println!("{heading}:");
                for result in results {
                    println!(
                        "- {} ({}) score {:+.3}",
                        result.school.name, result.school.state, result.score
                    );
                }
            }
        }
        Commands::Report {
            gpa,
            ids,
            limit,
            out,
        } => {
            let candidates = candidate_set(&pool, ids.as_deref(), limit).await?;
            let report = report::build_report(gpa, &candidates);
            std::fs::write(&out, report)?;
            println!("Report written to {}.", out.display());
        }
        Commands::Serve { bind } => {
            let state = api::ApiState {
                pool,
                recommend_limit: env_limit("PATHWISE_RECOMMEND_LIMIT", 10)?,
                insight_limit: env_limit("PATHWISE_INSIGHT_LIMIT", 20)?,
            };

            let app = api::router(state);
            let listener = tokio::net::TcpListener::bind(&bind)
                .await
                .with_context(|| format!("failed to bind {bind}"))?;
            tracing::info!(%bind, "serving advisor API");
            axum::serve(listener, app).await?;
        }
    }

    Ok(())
}
