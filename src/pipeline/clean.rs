//! Cleaning engine - deduplication, validity filtering, and the
//! post-filter verification contract
//!
//! Deduplication keeps exactly one row per [`TripKey`]: the earliest
//! pickup wins, and among equal pickups the first row in input order.
//! The validity filter is pure per-row; rows are admitted or rejected,
//! never mutated. Verification recomputes every failure category over
//! the output and reports non-zero counts instead of repairing them.

use crate::pipeline::error::PipelineError;
use crate::pipeline::types::{
    CleanStats, CleanTrip, TripKey, UnifiedTrip, VerificationCounts,
};
use rust_decimal::Decimal;
use std::collections::HashMap;
use tracing::{debug, info};

/// Longest admissible trip duration: one day, in seconds
const MAX_DURATION_SECONDS: i64 = 86_400;

/// Longest admissible trip distance, in miles
const MAX_DISTANCE_MILES: Decimal = Decimal::ONE_HUNDRED;

/// Output of the cleaning stage
#[derive(Debug, Clone)]
pub struct CleanOutcome {
    pub trips: Vec<CleanTrip>,
    pub stats: CleanStats,
    pub verification: VerificationCounts,
}

/// Deduplicate and filter the unified trip set.
///
/// Output order is deterministic: survivors keep their input order.
pub fn clean_trips(trips: Vec<UnifiedTrip>) -> CleanOutcome {
    let input_rows = trips.len();
    info!("Cleaning {} unified trips", input_rows);

    let deduped = dedup_trips(trips);
    let duplicates_removed = input_rows - deduped.len();
    debug!("Removed {} duplicate rows", duplicates_removed);

    let mut clean = Vec::with_capacity(deduped.len());
    for trip in deduped {
        if let Some(trip) = admit(trip) {
            clean.push(trip);
        }
    }
    let invalid_removed = input_rows - duplicates_removed - clean.len();
    debug!("Removed {} invalid rows", invalid_removed);

    let stats = CleanStats {
        input_rows,
        duplicates_removed,
        invalid_removed,
        output_rows: clean.len(),
    };
    info!("Cleaning complete: {}", stats);

    let verification = verify_clean(&clean);
    CleanOutcome {
        trips: clean,
        stats,
        verification,
    }
}

/// Keep one row per logical trip key, preserving input order.
fn dedup_trips(trips: Vec<UnifiedTrip>) -> Vec<UnifiedTrip> {
    // Survivor per key, tagged with its input index so the output can be
    // restored to a stable order afterwards.
    let mut survivors: HashMap<TripKey, (usize, UnifiedTrip)> = HashMap::new();

    for (idx, trip) in trips.into_iter().enumerate() {
        let key = TripKey::of(&trip);
        match survivors.get(&key) {
            // Strictly-earlier pickup replaces; an equal pickup keeps the
            // earlier input row, which makes the tie-break deterministic.
            Some((_, current)) if trip.pickup_datetime < current.pickup_datetime => {
                survivors.insert(key, (idx, trip));
            }
            Some(_) => {}
            None => {
                survivors.insert(key, (idx, trip));
            }
        }
    }

    let mut kept: Vec<(usize, UnifiedTrip)> = survivors.into_values().collect();
    kept.sort_by_key(|(idx, _)| *idx);
    kept.into_iter().map(|(_, trip)| trip).collect()
}

/// Admit a deduplicated row if it satisfies every validity invariant.
fn admit(trip: UnifiedTrip) -> Option<CleanTrip> {
    let passenger_count = match trip.passenger_count {
        Some(p) if p > 0 => p,
        _ => return None,
    };
    if trip.trip_distance_miles <= Decimal::ZERO || trip.trip_distance_miles > MAX_DISTANCE_MILES {
        return None;
    }
    if trip.duration_seconds < 0 || trip.duration_seconds > MAX_DURATION_SECONDS {
        return None;
    }

    Some(CleanTrip {
        vehicle_class: trip.vehicle_class,
        pickup_datetime: trip.pickup_datetime,
        dropoff_datetime: trip.dropoff_datetime,
        passenger_count,
        trip_distance_miles: trip.trip_distance_miles,
        pickup_location_id: trip.pickup_location_id,
        dropoff_location_id: trip.dropoff_location_id,
        fare_amount: trip.fare_amount,
        tip_amount: trip.tip_amount,
        total_amount: trip.total_amount,
        payment_type: trip.payment_type,
        duration_seconds: trip.duration_seconds,
    })
}

/// Recompute every failure category over the clean set.
///
/// Duplicate detection here uses the full identity tuple including the
/// pickup timestamp, a strict superset of the dedup condition, so a
/// clean run reports zero for every category.
pub fn verify_clean(trips: &[CleanTrip]) -> VerificationCounts {
    let mut groups: HashMap<(TripKey, chrono::NaiveDateTime), u64> = HashMap::new();
    let mut counts = VerificationCounts::default();

    for trip in trips {
        let unified = UnifiedTrip::from(trip.clone());
        let key = (TripKey::of(&unified), trip.pickup_datetime);
        *groups.entry(key).or_insert(0) += 1;

        if trip.passenger_count == 0 {
            counts.zero_passengers += 1;
        }
        if trip.trip_distance_miles == Decimal::ZERO {
            counts.zero_miles += 1;
        }
        if trip.trip_distance_miles > MAX_DISTANCE_MILES {
            counts.over_100_miles += 1;
        }
        if trip.duration_seconds > MAX_DURATION_SECONDS {
            counts.over_1_day += 1;
        }
        if trip.duration_seconds < 0 {
            counts.negative_duration += 1;
        }
    }

    counts.duplicates_remaining = groups.values().filter(|&&n| n > 1).count() as u64;
    counts
}

impl VerificationCounts {
    /// Post-condition check for the cleaning stage. A non-zero count is
    /// a [`PipelineError::Validation`] anomaly for the caller to surface.
    pub fn ensure_clean(&self) -> Result<(), PipelineError> {
        if self.all_zero() {
            Ok(())
        } else {
            Err(PipelineError::Validation {
                counts: self.clone(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::types::VehicleClass;
    use chrono::{NaiveDate, NaiveDateTime};

    fn ts(day: u32, hour: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, day)
            .unwrap()
            .and_hms_opt(hour, min, 0)
            .unwrap()
    }

    fn mock_trip() -> UnifiedTrip {
        UnifiedTrip {
            vehicle_class: VehicleClass::Yellow,
            pickup_datetime: ts(10, 9, 0),
            dropoff_datetime: ts(10, 9, 30),
            passenger_count: Some(1),
            trip_distance_miles: Decimal::new(35, 1), // 3.5 miles
            pickup_location_id: Some(142),
            dropoff_location_id: Some(236),
            fare_amount: Decimal::new(1850, 2),
            tip_amount: Decimal::new(300, 2),
            total_amount: Decimal::new(2400, 2),
            payment_type: Some(1),
            duration_seconds: 1800,
        }
    }

    #[test]
    fn test_identical_duplicates_collapse_to_one() {
        let outcome = clean_trips(vec![mock_trip(), mock_trip(), mock_trip()]);

        assert_eq!(outcome.trips.len(), 1);
        assert_eq!(outcome.stats.duplicates_removed, 2);
        assert_eq!(outcome.stats.invalid_removed, 0);
    }

    #[test]
    fn test_earliest_pickup_survives_among_duplicates() {
        // Same logical trip observed twice with pickup at 09:05 and 09:00;
        // only the 09:00 row survives regardless of input order.
        let mut late = mock_trip();
        late.pickup_datetime = ts(10, 9, 5);
        late.duration_seconds = 1500;
        let early = mock_trip();

        let outcome = clean_trips(vec![late.clone(), early.clone()]);
        assert_eq!(outcome.trips.len(), 1);
        assert_eq!(outcome.trips[0].pickup_datetime, ts(10, 9, 0));

        let outcome = clean_trips(vec![early, late]);
        assert_eq!(outcome.trips.len(), 1);
        assert_eq!(outcome.trips[0].pickup_datetime, ts(10, 9, 0));
    }

    #[test]
    fn test_validity_filter_rejects_out_of_range_rows() {
        let mut zero_passengers = mock_trip();
        zero_passengers.passenger_count = Some(0);
        zero_passengers.fare_amount = Decimal::new(100, 2);

        let mut blank_passengers = mock_trip();
        blank_passengers.passenger_count = None;
        blank_passengers.fare_amount = Decimal::new(200, 2);

        let mut zero_miles = mock_trip();
        zero_miles.trip_distance_miles = Decimal::ZERO;

        let mut too_far = mock_trip();
        too_far.trip_distance_miles = Decimal::from(200);

        let mut negative_duration = mock_trip();
        negative_duration.dropoff_datetime = ts(10, 8, 0);
        negative_duration.duration_seconds = -3600;

        let mut over_one_day = mock_trip();
        over_one_day.dropoff_datetime = ts(12, 9, 0);
        over_one_day.duration_seconds = 2 * 86_400;

        let outcome = clean_trips(vec![
            mock_trip(),
            zero_passengers,
            blank_passengers,
            zero_miles,
            too_far,
            negative_duration,
            over_one_day,
        ]);

        assert_eq!(outcome.trips.len(), 1);
        assert_eq!(outcome.stats.invalid_removed, 6);
        assert!(outcome.verification.all_zero());
    }

    #[test]
    fn test_boundary_values_are_admitted() {
        let mut at_100_miles = mock_trip();
        at_100_miles.trip_distance_miles = Decimal::from(100);

        let mut at_one_day = mock_trip();
        at_one_day.dropoff_datetime = ts(11, 9, 0);
        at_one_day.duration_seconds = 86_400;
        at_one_day.fare_amount = Decimal::new(9999, 2);

        let mut instantaneous = mock_trip();
        instantaneous.dropoff_datetime = instantaneous.pickup_datetime;
        instantaneous.duration_seconds = 0;
        instantaneous.fare_amount = Decimal::new(500, 2);

        let outcome = clean_trips(vec![at_100_miles, at_one_day, instantaneous]);
        assert_eq!(outcome.trips.len(), 3);
    }

    #[test]
    fn test_clean_invariants_hold_for_every_row() {
        let mut trips = Vec::new();
        for i in 0..20 {
            let mut trip = mock_trip();
            trip.pickup_datetime = ts(1 + i % 5, i % 24, 0);
            trip.dropoff_datetime = trip.pickup_datetime + chrono::Duration::minutes(20);
            trip.duration_seconds = 1200;
            trip.passenger_count = Some(i as i64 - 2); // some non-positive
            trip.trip_distance_miles = Decimal::from(i * 15); // some over 100
            trips.push(trip);
        }

        let outcome = clean_trips(trips);
        for trip in &outcome.trips {
            assert!(trip.passenger_count > 0);
            assert!(trip.trip_distance_miles > Decimal::ZERO);
            assert!(trip.trip_distance_miles <= Decimal::from(100));
            assert!(trip.duration_seconds >= 0);
            assert!(trip.duration_seconds <= 86_400);
        }
        assert!(outcome.verification.all_zero());
    }

    #[test]
    fn test_cleaning_is_idempotent() {
        let mut other = mock_trip();
        other.pickup_datetime = ts(11, 14, 0);
        other.dropoff_datetime = ts(11, 14, 45);
        other.duration_seconds = 2700;
        other.trip_distance_miles = Decimal::new(72, 1);

        let mut dup = mock_trip();
        dup.pickup_datetime = ts(10, 9, 5);

        let first = clean_trips(vec![mock_trip(), dup, other]);
        let again = clean_trips(first.trips.iter().cloned().map(UnifiedTrip::from).collect());

        assert_eq!(first.trips, again.trips);
        assert_eq!(again.stats.duplicates_removed, 0);
        assert_eq!(again.stats.invalid_removed, 0);
    }

    #[test]
    fn test_survivors_keep_input_order() {
        let mut second = mock_trip();
        second.pickup_datetime = ts(12, 7, 0);
        second.dropoff_datetime = ts(12, 7, 20);
        second.duration_seconds = 1200;

        let mut third = mock_trip();
        third.pickup_datetime = ts(3, 22, 0);
        third.dropoff_datetime = ts(3, 22, 10);
        third.duration_seconds = 600;

        let outcome = clean_trips(vec![mock_trip(), second.clone(), third.clone()]);
        assert_eq!(outcome.trips.len(), 3);
        assert_eq!(outcome.trips[1].pickup_datetime, second.pickup_datetime);
        assert_eq!(outcome.trips[2].pickup_datetime, third.pickup_datetime);
    }

    #[test]
    fn test_ensure_clean_flags_anomalies() {
        assert!(VerificationCounts::default().ensure_clean().is_ok());

        let counts = VerificationCounts {
            over_100_miles: 1,
            ..Default::default()
        };
        let err = counts.ensure_clean().unwrap_err();
        assert!(matches!(err, PipelineError::Validation { .. }));
    }
}
