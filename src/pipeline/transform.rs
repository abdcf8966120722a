//! Feature derivation - per-trip CO2 estimate and temporal buckets
//!
//! A total 1:1 mapping over the clean set: every clean trip produces
//! exactly one transformed trip, or the stage fails. A vehicle class
//! with no emission factor row is a hard error; CO2 is never defaulted.

use crate::pipeline::error::PipelineError;
use crate::pipeline::types::{CleanTrip, EmissionFactorRow, TransformedTrip, VehicleClass};
use chrono::{Datelike, NaiveDateTime, Timelike};
use rust_decimal::Decimal;
use std::collections::HashMap;
use tracing::info;

/// Emission factor lookup keyed by the reference table's vehicle_type
#[derive(Debug, Clone)]
pub struct EmissionFactors {
    grams_per_mile: HashMap<String, Decimal>,
}

impl EmissionFactors {
    pub fn from_rows(rows: Vec<EmissionFactorRow>) -> Self {
        let grams_per_mile = rows
            .into_iter()
            .map(|row| (row.vehicle_type, row.co2_grams_per_mile))
            .collect();
        EmissionFactors { grams_per_mile }
    }

    /// CO2 estimate in kilograms for a trip of the given class and distance
    pub fn co2_kgs(
        &self,
        class: VehicleClass,
        distance_miles: Decimal,
    ) -> Result<Decimal, PipelineError> {
        let grams = self
            .grams_per_mile
            .get(class.emissions_key())
            .ok_or(PipelineError::MissingEmissionFactor { class })?;
        Ok(distance_miles * grams / Decimal::ONE_THOUSAND)
    }
}

/// Derive CO2 and temporal buckets for every clean trip.
pub fn transform_trips(
    trips: Vec<CleanTrip>,
    factors: &EmissionFactors,
) -> Result<Vec<TransformedTrip>, PipelineError> {
    info!("Deriving features for {} clean trips", trips.len());

    let mut transformed = Vec::with_capacity(trips.len());
    for trip in trips {
        transformed.push(transform_trip(trip, factors)?);
    }

    info!("Derivation complete: {} transformed trips", transformed.len());
    Ok(transformed)
}

fn transform_trip(
    trip: CleanTrip,
    factors: &EmissionFactors,
) -> Result<TransformedTrip, PipelineError> {
    let trip_co2_kgs = factors.co2_kgs(trip.vehicle_class, trip.trip_distance_miles)?;
    let pickup = trip.pickup_datetime;

    Ok(TransformedTrip {
        vehicle_class: trip.vehicle_class,
        pickup_datetime: trip.pickup_datetime,
        dropoff_datetime: trip.dropoff_datetime,
        passenger_count: trip.passenger_count,
        trip_distance_miles: trip.trip_distance_miles,
        pickup_location_id: trip.pickup_location_id,
        dropoff_location_id: trip.dropoff_location_id,
        fare_amount: trip.fare_amount,
        tip_amount: trip.tip_amount,
        total_amount: trip.total_amount,
        payment_type: trip.payment_type,
        duration_seconds: trip.duration_seconds,
        trip_co2_kgs,
        hour_of_day: hour_of_day(pickup),
        day_of_week: day_of_week(pickup),
        week_of_year: week_of_year(pickup),
        month_of_year: month_of_year(pickup),
    })
}

/// Calendar hour component, 0-23. Stored 0-indexed; relabeling to 1-24
/// is a display concern.
fn hour_of_day(ts: NaiveDateTime) -> u32 {
    ts.hour()
}

/// Day of week with Sunday = 0 through Saturday = 6
fn day_of_week(ts: NaiveDateTime) -> u32 {
    ts.weekday().num_days_from_sunday()
}

/// ISO week number, 1-53
fn week_of_year(ts: NaiveDateTime) -> u32 {
    ts.iso_week().week()
}

/// Calendar month, 1-12
fn month_of_year(ts: NaiveDateTime) -> u32 {
    ts.month()
}
