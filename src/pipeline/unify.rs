//! Schema unifier - maps the two class-specific raw trip schemas onto
//! the common [`UnifiedTrip`] field set
//!
//! No row is dropped here: malformed-but-decodable rows (blank passenger
//! counts, negative durations) flow through to the cleaning stage.
//! Structural problems (missing columns, unparseable timestamps) abort
//! the run before anything downstream is replaced.

use crate::pipeline::error::PipelineError;
use crate::pipeline::types::{EmissionFactorRow, UnifiedTrip, VehicleClass};
use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::fs::File;
use std::path::Path;
use tracing::info;

/// Yellow trip CSV row (tpep_* timestamp columns)
#[derive(Debug, Deserialize)]
struct YellowTripRow {
    #[serde(rename = "tpep_pickup_datetime")]
    pickup_datetime: String,

    #[serde(rename = "tpep_dropoff_datetime")]
    dropoff_datetime: String,

    // Parquet-derived exports carry counts and codes as floats
    passenger_count: Option<f64>,

    trip_distance: Decimal,

    #[serde(rename = "PULocationID")]
    pickup_location_id: Option<i32>,

    #[serde(rename = "DOLocationID")]
    dropoff_location_id: Option<i32>,

    fare_amount: Decimal,
    tip_amount: Decimal,
    total_amount: Decimal,
    payment_type: Option<f64>,
}

/// Green trip CSV row (lpep_* timestamp columns)
#[derive(Debug, Deserialize)]
struct GreenTripRow {
    #[serde(rename = "lpep_pickup_datetime")]
    pickup_datetime: String,

    #[serde(rename = "lpep_dropoff_datetime")]
    dropoff_datetime: String,

    passenger_count: Option<f64>,

    trip_distance: Decimal,

    #[serde(rename = "PULocationID")]
    pickup_location_id: Option<i32>,

    #[serde(rename = "DOLocationID")]
    dropoff_location_id: Option<i32>,

    fare_amount: Decimal,
    tip_amount: Decimal,
    total_amount: Decimal,
    payment_type: Option<f64>,
}

/// Class-independent view of a raw row, before timestamp parsing
struct RawTrip {
    pickup_datetime: String,
    dropoff_datetime: String,
    passenger_count: Option<f64>,
    trip_distance: Decimal,
    pickup_location_id: Option<i32>,
    dropoff_location_id: Option<i32>,
    fare_amount: Decimal,
    tip_amount: Decimal,
    total_amount: Decimal,
    payment_type: Option<f64>,
}

impl From<YellowTripRow> for RawTrip {
    fn from(row: YellowTripRow) -> Self {
        RawTrip {
            pickup_datetime: row.pickup_datetime,
            dropoff_datetime: row.dropoff_datetime,
            passenger_count: row.passenger_count,
            trip_distance: row.trip_distance,
            pickup_location_id: row.pickup_location_id,
            dropoff_location_id: row.dropoff_location_id,
            fare_amount: row.fare_amount,
            tip_amount: row.tip_amount,
            total_amount: row.total_amount,
            payment_type: row.payment_type,
        }
    }
}

impl From<GreenTripRow> for RawTrip {
    fn from(row: GreenTripRow) -> Self {
        RawTrip {
            pickup_datetime: row.pickup_datetime,
            dropoff_datetime: row.dropoff_datetime,
            passenger_count: row.passenger_count,
            trip_distance: row.trip_distance,
            pickup_location_id: row.pickup_location_id,
            dropoff_location_id: row.dropoff_location_id,
            fare_amount: row.fare_amount,
            tip_amount: row.tip_amount,
            total_amount: row.total_amount,
            payment_type: row.payment_type,
        }
    }
}

/// Load yellow trips and map them onto the unified schema
pub async fn load_yellow_trips(path: &Path) -> Result<Vec<UnifiedTrip>, PipelineError> {
    load_class_trips::<YellowTripRow>(path, VehicleClass::Yellow, "yellow trips").await
}

/// Load green trips and map them onto the unified schema
pub async fn load_green_trips(path: &Path) -> Result<Vec<UnifiedTrip>, PipelineError> {
    load_class_trips::<GreenTripRow>(path, VehicleClass::Green, "green trips").await
}

/// Load both classes and concatenate into one unified trip set
pub async fn load_unified_trips(
    yellow_path: &Path,
    green_path: &Path,
) -> Result<Vec<UnifiedTrip>, PipelineError> {
    let mut trips = load_yellow_trips(yellow_path).await?;
    let green = load_green_trips(green_path).await?;
    trips.extend(green);
    info!("Unified trip set: {} rows", trips.len());
    Ok(trips)
}

async fn load_class_trips<R>(
    path: &Path,
    class: VehicleClass,
    input: &str,
) -> Result<Vec<UnifiedTrip>, PipelineError>
where
    R: for<'de> Deserialize<'de> + Into<RawTrip>,
{
    info!("Loading {} from {:?}", input, path);

    let file = File::open(path).map_err(|e| PipelineError::connectivity(path, e))?;
    let mut reader = csv::ReaderBuilder::new().has_headers(true).from_reader(file);

    let mut trips = Vec::new();
    for (idx, result) in reader.deserialize::<R>().enumerate() {
        let row = idx + 1;
        let raw = result.map_err(|e| PipelineError::schema(input, row, e))?;
        trips.push(unify_row(class, raw.into(), input, row)?);
    }

    info!("Loaded {} rows from {}", trips.len(), input);
    Ok(trips)
}

fn unify_row(
    class: VehicleClass,
    raw: RawTrip,
    input: &str,
    row: usize,
) -> Result<UnifiedTrip, PipelineError> {
    let pickup = parse_datetime(&raw.pickup_datetime).ok_or_else(|| {
        PipelineError::schema(input, row, format!("invalid pickup timestamp '{}'", raw.pickup_datetime))
    })?;
    let dropoff = parse_datetime(&raw.dropoff_datetime).ok_or_else(|| {
        PipelineError::schema(
            input,
            row,
            format!("invalid dropoff timestamp '{}'", raw.dropoff_datetime),
        )
    })?;

    Ok(UnifiedTrip {
        vehicle_class: class,
        pickup_datetime: pickup,
        dropoff_datetime: dropoff,
        passenger_count: raw.passenger_count.map(|p| p as i64),
        trip_distance_miles: raw.trip_distance,
        pickup_location_id: raw.pickup_location_id,
        dropoff_location_id: raw.dropoff_location_id,
        fare_amount: raw.fare_amount,
        tip_amount: raw.tip_amount,
        total_amount: raw.total_amount,
        payment_type: raw.payment_type.map(|p| p as i64),
        duration_seconds: (dropoff - pickup).num_seconds(),
    })
}

/// Parse a trip timestamp, accepting both the space-separated form used
/// by the TLC exports and the T-separated variant
fn parse_datetime(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S"))
        .ok()
}

/// Load the vehicle emissions reference table
pub async fn load_emission_factors(path: &Path) -> Result<Vec<EmissionFactorRow>, PipelineError> {
    info!("Loading emission factors from {:?}", path);

    let file = File::open(path).map_err(|e| PipelineError::connectivity(path, e))?;
    let mut reader = csv::ReaderBuilder::new().has_headers(true).from_reader(file);

    let mut rows = Vec::new();
    for (idx, result) in reader.deserialize::<EmissionFactorRow>().enumerate() {
        let row = result.map_err(|e| PipelineError::schema("vehicle emissions", idx + 1, e))?;
        rows.push(row);
    }

    info!("Loaded {} emission factor rows", rows.len());
    Ok(rows)
}
