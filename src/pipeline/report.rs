//! Reporting boundary - display relabeling and console rendering of the
//! rank report
//!
//! The only place where stored bucket values are relabeled: hours shift
//! from the canonical 0-23 to the 1-24 display convention, day-of-week
//! and month map to names, week numbers print as-is.

use crate::pipeline::types::{BucketExtremes, RankReport, TemporalDimension};
use tracing::info;

const DOW_NAMES: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];
const MONTH_NAMES: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// Display label for a stored bucket value.
pub fn bucket_label(dimension: TemporalDimension, bucket: u32) -> String {
    match dimension {
        TemporalDimension::HourOfDay => (bucket + 1).to_string(),
        TemporalDimension::DayOfWeek => DOW_NAMES
            .get(bucket as usize)
            .map(|n| n.to_string())
            .unwrap_or_else(|| bucket.to_string()),
        TemporalDimension::WeekOfYear => bucket.to_string(),
        TemporalDimension::MonthOfYear => (bucket as usize)
            .checked_sub(1)
            .and_then(|i| MONTH_NAMES.get(i))
            .map(|n| n.to_string())
            .unwrap_or_else(|| bucket.to_string()),
    }
}

fn heavy_light_line(extremes: &BucketExtremes) -> String {
    format!(
        "{}: heavy {}={} ({:.3} kg), light {}={} ({:.3} kg)",
        extremes.vehicle_class.to_string().to_uppercase(),
        extremes.dimension.label(),
        bucket_label(extremes.dimension, extremes.heaviest_bucket),
        extremes.heaviest_mean_co2,
        extremes.dimension.label(),
        bucket_label(extremes.dimension, extremes.lightest_bucket),
        extremes.lightest_mean_co2,
    )
}

/// Render the rank report to the log, one line per finding.
pub fn log_report(report: &RankReport) {
    info!("== Largest CO2 trip by vehicle class ==");
    for trip in &report.largest_trips {
        info!(
            "{}: {:.3} kg CO2, distance={:.2} miles, pickup={}, dropoff={}",
            trip.vehicle_class.to_string().to_uppercase(),
            trip.trip_co2_kgs,
            trip.trip_distance_miles,
            trip.pickup_datetime,
            trip.dropoff_datetime,
        );
    }

    for dimension in TemporalDimension::ALL {
        info!("== Most carbon heavy/light {} ==", dimension.label());
        for extremes in report
            .bucket_extremes
            .iter()
            .filter(|b| b.dimension == dimension)
        {
            info!("{}", heavy_light_line(extremes));
        }
    }
}
