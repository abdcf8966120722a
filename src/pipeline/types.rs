//! Core data types for the emissions pipeline
//! Pure data structures with no behavior

use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Taxi service classes present in the trip data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VehicleClass {
    Yellow,
    Green,
}

impl VehicleClass {
    pub const ALL: [VehicleClass; 2] = [VehicleClass::Yellow, VehicleClass::Green];

    /// Key used by the vehicle_emissions reference table
    pub fn emissions_key(&self) -> &'static str {
        match self {
            VehicleClass::Yellow => "yellow_taxi",
            VehicleClass::Green => "green_taxi",
        }
    }
}

impl std::fmt::Display for VehicleClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VehicleClass::Yellow => write!(f, "yellow"),
            VehicleClass::Green => write!(f, "green"),
        }
    }
}

/// Trip record after both raw schemas have been mapped onto one field set.
///
/// `duration_seconds` is derived at unification time and may be negative
/// for malformed input; nothing is filtered until the cleaning stage.
#[derive(Debug, Clone, PartialEq)]
pub struct UnifiedTrip {
    pub vehicle_class: VehicleClass,
    pub pickup_datetime: NaiveDateTime,
    pub dropoff_datetime: NaiveDateTime,
    pub passenger_count: Option<i64>,
    pub trip_distance_miles: Decimal,
    pub pickup_location_id: Option<i32>,
    pub dropoff_location_id: Option<i32>,
    pub fare_amount: Decimal,
    pub tip_amount: Decimal,
    pub total_amount: Decimal,
    pub payment_type: Option<i64>,
    pub duration_seconds: i64,
}

/// Logical trip identity used for deduplication.
///
/// The pickup timestamp is deliberately not part of the identity: rows
/// differing only in pickup time are the same logical trip, and the one
/// with the earliest pickup survives.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TripKey {
    pub vehicle_class: VehicleClass,
    pub dropoff_datetime: NaiveDateTime,
    pub pickup_location_id: Option<i32>,
    pub dropoff_location_id: Option<i32>,
    pub passenger_count: Option<i64>,
    pub trip_distance_miles: Decimal,
    pub fare_amount: Decimal,
    pub tip_amount: Decimal,
    pub total_amount: Decimal,
    pub payment_type: Option<i64>,
}

impl TripKey {
    pub fn of(trip: &UnifiedTrip) -> Self {
        TripKey {
            vehicle_class: trip.vehicle_class,
            dropoff_datetime: trip.dropoff_datetime,
            pickup_location_id: trip.pickup_location_id,
            dropoff_location_id: trip.dropoff_location_id,
            passenger_count: trip.passenger_count,
            trip_distance_miles: trip.trip_distance_miles,
            fare_amount: trip.fare_amount,
            tip_amount: trip.tip_amount,
            total_amount: trip.total_amount,
            payment_type: trip.payment_type,
        }
    }
}

/// Trip that survived deduplication and the validity filter.
///
/// Every row satisfies: passenger_count > 0, 0 < trip_distance_miles <= 100,
/// 0 <= duration_seconds <= 86400, and uniqueness under [`TripKey`].
#[derive(Debug, Clone, PartialEq)]
pub struct CleanTrip {
    pub vehicle_class: VehicleClass,
    pub pickup_datetime: NaiveDateTime,
    pub dropoff_datetime: NaiveDateTime,
    pub passenger_count: i64,
    pub trip_distance_miles: Decimal,
    pub pickup_location_id: Option<i32>,
    pub dropoff_location_id: Option<i32>,
    pub fare_amount: Decimal,
    pub tip_amount: Decimal,
    pub total_amount: Decimal,
    pub payment_type: Option<i64>,
    pub duration_seconds: i64,
}

impl From<CleanTrip> for UnifiedTrip {
    fn from(trip: CleanTrip) -> Self {
        UnifiedTrip {
            vehicle_class: trip.vehicle_class,
            pickup_datetime: trip.pickup_datetime,
            dropoff_datetime: trip.dropoff_datetime,
            passenger_count: Some(trip.passenger_count),
            trip_distance_miles: trip.trip_distance_miles,
            pickup_location_id: trip.pickup_location_id,
            dropoff_location_id: trip.dropoff_location_id,
            fare_amount: trip.fare_amount,
            tip_amount: trip.tip_amount,
            total_amount: trip.total_amount,
            payment_type: trip.payment_type,
            duration_seconds: trip.duration_seconds,
        }
    }
}

/// One row of the vehicle_emissions reference table (external contract)
#[derive(Debug, Clone, Deserialize)]
pub struct EmissionFactorRow {
    pub vehicle_type: String,
    pub co2_grams_per_mile: Decimal,
}

/// Clean trip extended with the derived CO2 estimate and temporal buckets.
///
/// `hour_of_day` is stored 0-indexed; the 1-24 relabeling happens only at
/// the reporting boundary. `day_of_week` counts from Sunday = 0.
#[derive(Debug, Clone, PartialEq)]
pub struct TransformedTrip {
    pub vehicle_class: VehicleClass,
    pub pickup_datetime: NaiveDateTime,
    pub dropoff_datetime: NaiveDateTime,
    pub passenger_count: i64,
    pub trip_distance_miles: Decimal,
    pub pickup_location_id: Option<i32>,
    pub dropoff_location_id: Option<i32>,
    pub fare_amount: Decimal,
    pub tip_amount: Decimal,
    pub total_amount: Decimal,
    pub payment_type: Option<i64>,
    pub duration_seconds: i64,
    pub trip_co2_kgs: Decimal,
    pub hour_of_day: u32,
    pub day_of_week: u32,
    pub week_of_year: u32,
    pub month_of_year: u32,
}

/// Post-filter verification counts, all expected to be zero.
///
/// A non-zero count is surfaced as a [`Validation`](crate::pipeline::error::PipelineError::Validation)
/// anomaly, never auto-repaired.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VerificationCounts {
    pub duplicates_remaining: u64,
    pub zero_passengers: u64,
    pub zero_miles: u64,
    pub over_100_miles: u64,
    pub over_1_day: u64,
    pub negative_duration: u64,
}

impl VerificationCounts {
    pub fn all_zero(&self) -> bool {
        self.duplicates_remaining == 0
            && self.zero_passengers == 0
            && self.zero_miles == 0
            && self.over_100_miles == 0
            && self.over_1_day == 0
            && self.negative_duration == 0
    }
}

impl std::fmt::Display for VerificationCounts {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "duplicates_remaining: {}, zero_passengers: {}, zero_miles: {}, \
             over_100_miles: {}, over_1_day: {}, negative_duration: {}",
            self.duplicates_remaining,
            self.zero_passengers,
            self.zero_miles,
            self.over_100_miles,
            self.over_1_day,
            self.negative_duration
        )
    }
}

/// Cleaning stage statistics
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CleanStats {
    pub input_rows: usize,
    pub duplicates_removed: usize,
    pub invalid_removed: usize,
    pub output_rows: usize,
}

impl std::fmt::Display for CleanStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "input: {}, duplicates removed: {}, invalid removed: {}, output: {}",
            self.input_rows, self.duplicates_removed, self.invalid_removed, self.output_rows
        )
    }
}

/// Temporal grouping dimensions for the heavy/light reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TemporalDimension {
    HourOfDay,
    DayOfWeek,
    WeekOfYear,
    MonthOfYear,
}

impl TemporalDimension {
    pub const ALL: [TemporalDimension; 4] = [
        TemporalDimension::HourOfDay,
        TemporalDimension::DayOfWeek,
        TemporalDimension::WeekOfYear,
        TemporalDimension::MonthOfYear,
    ];

    pub fn bucket_of(&self, trip: &TransformedTrip) -> u32 {
        match self {
            TemporalDimension::HourOfDay => trip.hour_of_day,
            TemporalDimension::DayOfWeek => trip.day_of_week,
            TemporalDimension::WeekOfYear => trip.week_of_year,
            TemporalDimension::MonthOfYear => trip.month_of_year,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            TemporalDimension::HourOfDay => "hour of day",
            TemporalDimension::DayOfWeek => "day of week",
            TemporalDimension::WeekOfYear => "week of year",
            TemporalDimension::MonthOfYear => "month of year",
        }
    }
}

/// Largest single-trip emitter for one vehicle class
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtremalTrip {
    pub vehicle_class: VehicleClass,
    pub trip_co2_kgs: Decimal,
    pub trip_distance_miles: Decimal,
    pub pickup_datetime: NaiveDateTime,
    pub dropoff_datetime: NaiveDateTime,
}

/// Heaviest and lightest mean-CO2 buckets for one (class, dimension) pair
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BucketExtremes {
    pub vehicle_class: VehicleClass,
    pub dimension: TemporalDimension,
    pub heaviest_bucket: u32,
    pub heaviest_mean_co2: Decimal,
    pub lightest_bucket: u32,
    pub lightest_mean_co2: Decimal,
}

/// Month-ordered total CO2 for one vehicle class, January first,
/// zero-filled for months with no trips
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlySeries {
    pub vehicle_class: VehicleClass,
    pub totals: [Decimal; 12],
}

/// Full output of the ranking stage
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RankReport {
    pub largest_trips: Vec<ExtremalTrip>,
    pub bucket_extremes: Vec<BucketExtremes>,
    pub monthly: Vec<MonthlySeries>,
}
