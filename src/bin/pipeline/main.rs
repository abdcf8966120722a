//! Pipeline orchestrator - runs unify, clean, transform, rank and
//! materializes each stage's output

use anyhow::Result;
use std::env;
use std::path::PathBuf;
use taxi_emissions::pipeline::error::PipelineError;
use taxi_emissions::pipeline::store::TableStore;
use taxi_emissions::pipeline::transform::EmissionFactors;
use taxi_emissions::pipeline::{clean, rank, report, transform, unify};
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_target(false)
        .with_thread_ids(false)
        .with_level(true)
        .init();

    dotenvy::dotenv().ok();

    info!("Starting taxi emissions pipeline");

    // Load configuration from environment
    let config = Config::from_env();
    info!("Configuration loaded");

    let store = TableStore::open(&config.out_dir)?;
    run(&config, &store).await?;

    info!("Pipeline complete");

    Ok(())
}

/// Run the four stages against an opened store.
///
/// Every input file is loaded and schema-validated up front, so a
/// mistyped or column-missing input aborts before the first table is
/// replaced and prior artifacts stay untouched.
async fn run(config: &Config, store: &TableStore) -> Result<(), PipelineError> {
    // Step 1/4: Load and unify every input
    info!("Step 1/4: Unifying raw trip data...");
    let trips = unify::load_unified_trips(&config.yellow_trips_csv, &config.green_trips_csv).await?;
    let factor_rows = unify::load_emission_factors(&config.vehicle_emissions_csv).await?;
    let factors = EmissionFactors::from_rows(factor_rows);
    info!("✓ Unified {} trips", trips.len());

    // Limit to first N records for testing (optional)
    let trips = if config.limit_records > 0 {
        let limit = config.limit_records.min(trips.len());
        warn!("Limiting to first {} trips (testing mode)", limit);
        trips.into_iter().take(limit).collect()
    } else {
        trips
    };

    // Step 2/4: Deduplicate and filter
    info!("Step 2/4: Cleaning...");
    let outcome = clean::clean_trips(trips);
    store.replace_clean_trips(&outcome.trips)?;
    store.replace_verification(&outcome.verification)?;
    info!("✓ Clean table replaced ({})", outcome.stats);

    // A verification anomaly is surfaced, never repaired; the run
    // continues to best-effort reporting.
    if let Err(e) = outcome.verification.ensure_clean() {
        error!("{}", e);
    }

    // Step 3/4: Derive CO2 and temporal features
    info!("Step 3/4: Deriving features...");
    let transformed = transform::transform_trips(outcome.trips, &factors)?;
    store.replace_transformed_trips(&transformed)?;
    info!("✓ Transformed table replaced ({} rows)", transformed.len());

    // Step 4/4: Rank
    info!("Step 4/4: Ranking...");
    let rank_report = rank::rank_trips(&transformed);
    store.replace_monthly_series(&rank_report.monthly)?;
    store.replace_rank_report(&rank_report)?;
    report::log_report(&rank_report);
    info!("✓ Rank artifacts replaced");

    Ok(())
}

/// Configuration loaded from environment variables
#[derive(Debug, Clone)]
struct Config {
    yellow_trips_csv: PathBuf,
    green_trips_csv: PathBuf,
    vehicle_emissions_csv: PathBuf,
    out_dir: PathBuf,
    limit_records: usize, // 0 = no limit
}

impl Config {
    fn from_env() -> Self {
        Config {
            yellow_trips_csv: env::var("YELLOW_TRIPS_CSV")
                .unwrap_or_else(|_| "data/yellow_tripdata_2024.csv".to_string())
                .into(),

            green_trips_csv: env::var("GREEN_TRIPS_CSV")
                .unwrap_or_else(|_| "data/green_tripdata_2024.csv".to_string())
                .into(),

            vehicle_emissions_csv: env::var("VEHICLE_EMISSIONS_CSV")
                .unwrap_or_else(|_| "data/vehicle_emissions.csv".to_string())
                .into(),

            out_dir: env::var("OUT_DIR")
                .unwrap_or_else(|_| "out".to_string())
                .into(),

            limit_records: env::var("LIMIT_RECORDS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(0),
        }
    }
}
