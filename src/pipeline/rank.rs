//! Ranking engine - per-class extremal trip, heavy/light bucket reports,
//! and the monthly total series for the chart consumer
//!
//! All selections use explicit deterministic comparators: the extremal
//! trip breaks CO2 ties by earliest pickup then earliest dropoff, and
//! bucket-mean ties go to the smallest bucket value. The heavy/light
//! report is a two-level aggregation: one pass accumulating per-bucket
//! running sums, then an O(buckets) reduction over the means.

use crate::pipeline::types::{
    BucketExtremes, ExtremalTrip, MonthlySeries, RankReport, TemporalDimension, TransformedTrip,
    VehicleClass,
};
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use tracing::info;

/// Compute the full rank report over the transformed trip set.
///
/// A class with no surviving rows contributes no extremal trip and no
/// bucket extremes; its monthly series is still emitted, all zero, so
/// the chart consumer always receives twelve points per class.
pub fn rank_trips(trips: &[TransformedTrip]) -> RankReport {
    info!("Ranking {} transformed trips", trips.len());

    let mut report = RankReport::default();

    for class in VehicleClass::ALL {
        if let Some(extremal) = largest_trip(trips, class) {
            report.largest_trips.push(extremal);
        }
        for dimension in TemporalDimension::ALL {
            if let Some(extremes) = bucket_extremes(trips, class, dimension) {
                report.bucket_extremes.push(extremes);
            }
        }
        report.monthly.push(monthly_series(trips, class));
    }

    info!(
        "Ranking complete: {} extremal trips, {} bucket reports",
        report.largest_trips.len(),
        report.bucket_extremes.len()
    );
    report
}

/// Single trip with the maximum CO2 estimate for one class.
fn largest_trip(trips: &[TransformedTrip], class: VehicleClass) -> Option<ExtremalTrip> {
    let mut best: Option<&TransformedTrip> = None;

    for trip in trips.iter().filter(|t| t.vehicle_class == class) {
        best = match best {
            None => Some(trip),
            Some(current) if beats(trip, current) => Some(trip),
            Some(current) => Some(current),
        };
    }

    best.map(|trip| ExtremalTrip {
        vehicle_class: trip.vehicle_class,
        trip_co2_kgs: trip.trip_co2_kgs,
        trip_distance_miles: trip.trip_distance_miles,
        pickup_datetime: trip.pickup_datetime,
        dropoff_datetime: trip.dropoff_datetime,
    })
}

/// Comparator for the extremal scan: higher CO2 wins; ties go to the
/// earlier pickup, then the earlier dropoff.
fn beats(candidate: &TransformedTrip, current: &TransformedTrip) -> bool {
    (
        candidate.trip_co2_kgs,
        std::cmp::Reverse(candidate.pickup_datetime),
        std::cmp::Reverse(candidate.dropoff_datetime),
    ) > (
        current.trip_co2_kgs,
        std::cmp::Reverse(current.pickup_datetime),
        std::cmp::Reverse(current.dropoff_datetime),
    )
}

/// Heaviest and lightest mean-CO2 bucket for one (class, dimension) pair.
fn bucket_extremes(
    trips: &[TransformedTrip],
    class: VehicleClass,
    dimension: TemporalDimension,
) -> Option<BucketExtremes> {
    // First level: running sum and count per bucket value.
    let mut buckets: BTreeMap<u32, (Decimal, u64)> = BTreeMap::new();
    for trip in trips.iter().filter(|t| t.vehicle_class == class) {
        let entry = buckets.entry(dimension.bucket_of(trip)).or_insert((Decimal::ZERO, 0));
        entry.0 += trip.trip_co2_kgs;
        entry.1 += 1;
    }

    // Second level: extremal selection over the bucket means. The map
    // iterates in ascending bucket order and the comparisons are strict,
    // so the smallest bucket value wins mean ties.
    let mut heaviest: Option<(u32, Decimal)> = None;
    let mut lightest: Option<(u32, Decimal)> = None;
    for (&bucket, &(sum, count)) in &buckets {
        let mean = sum / Decimal::from(count);
        match heaviest {
            Some((_, best)) if mean <= best => {}
            _ => heaviest = Some((bucket, mean)),
        }
        match lightest {
            Some((_, best)) if mean >= best => {}
            _ => lightest = Some((bucket, mean)),
        }
    }

    let (heaviest_bucket, heaviest_mean_co2) = heaviest?;
    let (lightest_bucket, lightest_mean_co2) = lightest?;
    Some(BucketExtremes {
        vehicle_class: class,
        dimension,
        heaviest_bucket,
        heaviest_mean_co2,
        lightest_bucket,
        lightest_mean_co2,
    })
}

/// Month-ordered CO2 totals for one class, zero-filled.
fn monthly_series(trips: &[TransformedTrip], class: VehicleClass) -> MonthlySeries {
    let mut totals = [Decimal::ZERO; 12];
    for trip in trips.iter().filter(|t| t.vehicle_class == class) {
        totals[trip.month_of_year as usize - 1] += trip.trip_co2_kgs;
    }
    MonthlySeries {
        vehicle_class: class,
        totals,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveDateTime};

    fn pickup(month: u32, day: u32, hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, month, day)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    fn mock_transformed(class: VehicleClass, ts: NaiveDateTime, co2: Decimal) -> TransformedTrip {
        use chrono::{Datelike, Timelike};
        TransformedTrip {
            vehicle_class: class,
            pickup_datetime: ts,
            dropoff_datetime: ts + chrono::Duration::minutes(30),
            passenger_count: 1,
            trip_distance_miles: Decimal::from(5),
            pickup_location_id: Some(7),
            dropoff_location_id: Some(9),
            fare_amount: Decimal::new(1500, 2),
            tip_amount: Decimal::ZERO,
            total_amount: Decimal::new(1500, 2),
            payment_type: Some(1),
            duration_seconds: 1800,
            trip_co2_kgs: co2,
            hour_of_day: ts.hour(),
            day_of_week: ts.weekday().num_days_from_sunday(),
            week_of_year: ts.iso_week().week(),
            month_of_year: ts.month(),
        }
    }

    #[test]
    fn test_largest_trip_per_class() {
        let trips = vec![
            mock_transformed(VehicleClass::Yellow, pickup(3, 5, 8), Decimal::new(4, 1)),
            mock_transformed(VehicleClass::Yellow, pickup(8, 20, 17), Decimal::from(10)),
            mock_transformed(VehicleClass::Green, pickup(2, 2, 2), Decimal::from(3)),
        ];

        let report = rank_trips(&trips);
        assert_eq!(report.largest_trips.len(), 2);

        let yellow = &report.largest_trips[0];
        assert_eq!(yellow.vehicle_class, VehicleClass::Yellow);
        assert_eq!(yellow.trip_co2_kgs, Decimal::from(10));
        assert_eq!(yellow.pickup_datetime, pickup(8, 20, 17));
    }

    #[test]
    fn test_extremal_tie_goes_to_earliest_pickup() {
        let trips = vec![
            mock_transformed(VehicleClass::Yellow, pickup(6, 10, 12), Decimal::from(7)),
            mock_transformed(VehicleClass::Yellow, pickup(2, 1, 4), Decimal::from(7)),
            mock_transformed(VehicleClass::Yellow, pickup(9, 9, 9), Decimal::from(7)),
        ];

        let report = rank_trips(&trips);
        assert_eq!(report.largest_trips[0].pickup_datetime, pickup(2, 1, 4));
    }

    #[test]
    fn test_heavy_light_means_per_hour() {
        // Hour 8: mean 2.0; hour 12: mean 5.0; hour 20: mean 1.0
        let trips = vec![
            mock_transformed(VehicleClass::Yellow, pickup(1, 8, 8), Decimal::from(1)),
            mock_transformed(VehicleClass::Yellow, pickup(1, 9, 8), Decimal::from(3)),
            mock_transformed(VehicleClass::Yellow, pickup(1, 8, 12), Decimal::from(5)),
            mock_transformed(VehicleClass::Yellow, pickup(1, 8, 20), Decimal::from(1)),
        ];

        let report = rank_trips(&trips);
        let hours = report
            .bucket_extremes
            .iter()
            .find(|b| b.dimension == TemporalDimension::HourOfDay)
            .unwrap();

        assert_eq!(hours.heaviest_bucket, 12);
        assert_eq!(hours.heaviest_mean_co2, Decimal::from(5));
        assert_eq!(hours.lightest_bucket, 20);
        assert_eq!(hours.lightest_mean_co2, Decimal::from(1));
    }

    #[test]
    fn test_heavy_light_tie_goes_to_smallest_bucket() {
        let trips = vec![
            mock_transformed(VehicleClass::Green, pickup(1, 7, 6), Decimal::from(2)),
            mock_transformed(VehicleClass::Green, pickup(1, 7, 18), Decimal::from(2)),
        ];

        let report = rank_trips(&trips);
        let hours = report
            .bucket_extremes
            .iter()
            .find(|b| b.dimension == TemporalDimension::HourOfDay)
            .unwrap();

        assert_eq!(hours.heaviest_bucket, 6);
        assert_eq!(hours.lightest_bucket, 6);
    }

    #[test]
    fn test_heaviest_mean_dominates_all_buckets() {
        let mut trips = Vec::new();
        for (i, co2) in [3, 8, 1, 5, 9, 2, 4].iter().enumerate() {
            trips.push(mock_transformed(
                VehicleClass::Yellow,
                pickup(1 + i as u32, 3, i as u32 * 3),
                Decimal::from(*co2),
            ));
        }

        let report = rank_trips(&trips);
        for extremes in &report.bucket_extremes {
            // Recompute every bucket mean for this (class, dimension) pair
            // and check the selected extremes dominate.
            let mut buckets: BTreeMap<u32, (Decimal, u64)> = BTreeMap::new();
            for trip in trips.iter().filter(|t| t.vehicle_class == extremes.vehicle_class) {
                let entry = buckets
                    .entry(extremes.dimension.bucket_of(trip))
                    .or_insert((Decimal::ZERO, 0));
                entry.0 += trip.trip_co2_kgs;
                entry.1 += 1;
            }
            for (_, (sum, count)) in buckets {
                let mean = sum / Decimal::from(count);
                assert!(extremes.heaviest_mean_co2 >= mean);
                assert!(extremes.lightest_mean_co2 <= mean);
            }
        }
    }

    #[test]
    fn test_class_without_rows_is_absent_from_reports() {
        // The green 200-mile trip was filtered upstream, so ranking only
        // ever sees yellow rows: 2 and 50 miles at 0.2 kg/mile.
        let trips = vec![
            mock_transformed(VehicleClass::Yellow, pickup(4, 1, 9), Decimal::new(4, 1)),
            mock_transformed(VehicleClass::Yellow, pickup(4, 2, 9), Decimal::from(10)),
        ];

        let report = rank_trips(&trips);

        assert_eq!(report.largest_trips.len(), 1);
        assert_eq!(report.largest_trips[0].vehicle_class, VehicleClass::Yellow);
        assert_eq!(report.largest_trips[0].trip_co2_kgs, Decimal::from(10));

        assert!(report
            .bucket_extremes
            .iter()
            .all(|b| b.vehicle_class == VehicleClass::Yellow));

        // The green monthly series is still emitted, all zero.
        let green = report
            .monthly
            .iter()
            .find(|s| s.vehicle_class == VehicleClass::Green)
            .unwrap();
        assert!(green.totals.iter().all(|t| *t == Decimal::ZERO));
    }

    #[test]
    fn test_monthly_series_is_ordered_and_zero_filled() {
        let trips = vec![
            mock_transformed(VehicleClass::Yellow, pickup(1, 10, 10), Decimal::from(2)),
            mock_transformed(VehicleClass::Yellow, pickup(1, 11, 10), Decimal::from(3)),
            mock_transformed(VehicleClass::Yellow, pickup(12, 24, 23), Decimal::from(7)),
        ];

        let report = rank_trips(&trips);
        let yellow = report
            .monthly
            .iter()
            .find(|s| s.vehicle_class == VehicleClass::Yellow)
            .unwrap();

        assert_eq!(yellow.totals[0], Decimal::from(5));
        assert_eq!(yellow.totals[11], Decimal::from(7));
        for month in 1..11 {
            assert_eq!(yellow.totals[month], Decimal::ZERO);
        }
    }

    #[test]
    fn test_empty_input_yields_empty_reports() {
        let report = rank_trips(&[]);
        assert!(report.largest_trips.is_empty());
        assert!(report.bucket_extremes.is_empty());
        assert_eq!(report.monthly.len(), 2);
    }
}
