//! Store - materializes stage outputs under one directory with
//! whole-table replace semantics
//!
//! Every artifact is written in full to a temp file and renamed over the
//! previous version, so a downstream consumer never observes a partial
//! table and a failed run leaves the prior artifact untouched.

use crate::pipeline::error::PipelineError;
use crate::pipeline::types::{
    CleanTrip, MonthlySeries, RankReport, TransformedTrip, VerificationCounts,
};
use chrono::NaiveDateTime;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// File-backed table store rooted at the configured output directory
#[derive(Debug, Clone)]
pub struct TableStore {
    root: PathBuf,
}

impl TableStore {
    /// Open the store, creating the root directory if needed.
    pub fn open(root: &Path) -> Result<Self, PipelineError> {
        fs::create_dir_all(root).map_err(|e| PipelineError::connectivity(root, e))?;
        Ok(TableStore {
            root: root.to_path_buf(),
        })
    }

    pub fn path_of(&self, artifact: &str) -> PathBuf {
        self.root.join(artifact)
    }

    /// Replace trips_clean.csv with the full clean trip set.
    pub fn replace_clean_trips(&self, trips: &[CleanTrip]) -> Result<(), PipelineError> {
        self.replace_csv("trips_clean.csv", |writer| {
            writer.write_record([
                "vehicle_class",
                "pickup_datetime",
                "dropoff_datetime",
                "passenger_count",
                "trip_distance_miles",
                "pickup_location_id",
                "dropoff_location_id",
                "fare_amount",
                "tip_amount",
                "total_amount",
                "payment_type",
                "duration_seconds",
            ])?;
            for trip in trips {
                writer.write_record([
                    trip.vehicle_class.to_string(),
                    format_ts(trip.pickup_datetime),
                    format_ts(trip.dropoff_datetime),
                    trip.passenger_count.to_string(),
                    trip.trip_distance_miles.to_string(),
                    format_opt(trip.pickup_location_id),
                    format_opt(trip.dropoff_location_id),
                    trip.fare_amount.to_string(),
                    trip.tip_amount.to_string(),
                    trip.total_amount.to_string(),
                    format_opt(trip.payment_type),
                    trip.duration_seconds.to_string(),
                ])?;
            }
            Ok(())
        })?;
        info!("Replaced trips_clean.csv ({} rows)", trips.len());
        Ok(())
    }

    /// Replace trips_transformed.csv with the full transformed trip set.
    pub fn replace_transformed_trips(
        &self,
        trips: &[TransformedTrip],
    ) -> Result<(), PipelineError> {
        self.replace_csv("trips_transformed.csv", |writer| {
            writer.write_record([
                "vehicle_class",
                "pickup_datetime",
                "dropoff_datetime",
                "passenger_count",
                "trip_distance_miles",
                "pickup_location_id",
                "dropoff_location_id",
                "fare_amount",
                "tip_amount",
                "total_amount",
                "payment_type",
                "duration_seconds",
                "trip_co2_kgs",
                "hour_of_day",
                "day_of_week",
                "week_of_year",
                "month_of_year",
            ])?;
            for trip in trips {
                writer.write_record([
                    trip.vehicle_class.to_string(),
                    format_ts(trip.pickup_datetime),
                    format_ts(trip.dropoff_datetime),
                    trip.passenger_count.to_string(),
                    trip.trip_distance_miles.to_string(),
                    format_opt(trip.pickup_location_id),
                    format_opt(trip.dropoff_location_id),
                    trip.fare_amount.to_string(),
                    trip.tip_amount.to_string(),
                    trip.total_amount.to_string(),
                    format_opt(trip.payment_type),
                    trip.duration_seconds.to_string(),
                    trip.trip_co2_kgs.to_string(),
                    trip.hour_of_day.to_string(),
                    trip.day_of_week.to_string(),
                    trip.week_of_year.to_string(),
                    trip.month_of_year.to_string(),
                ])?;
            }
            Ok(())
        })?;
        info!("Replaced trips_transformed.csv ({} rows)", trips.len());
        Ok(())
    }

    /// Replace monthly_co2.csv: class-major, month-ascending totals.
    pub fn replace_monthly_series(&self, series: &[MonthlySeries]) -> Result<(), PipelineError> {
        self.replace_csv("monthly_co2.csv", |writer| {
            writer.write_record(["vehicle_class", "month_of_year", "total_co2_kgs"])?;
            for entry in series {
                for (month, total) in entry.totals.iter().enumerate() {
                    writer.write_record([
                        entry.vehicle_class.to_string(),
                        (month + 1).to_string(),
                        total.to_string(),
                    ])?;
                }
            }
            Ok(())
        })?;
        info!("Replaced monthly_co2.csv ({} series)", series.len());
        Ok(())
    }

    /// Replace clean_verification.json with the check-name -> count map.
    pub fn replace_verification(
        &self,
        counts: &VerificationCounts,
    ) -> Result<(), PipelineError> {
        self.replace_json("clean_verification.json", counts)?;
        info!("Replaced clean_verification.json");
        Ok(())
    }

    /// Replace rank_report.json with the full ranking output.
    pub fn replace_rank_report(&self, report: &RankReport) -> Result<(), PipelineError> {
        self.replace_json("rank_report.json", report)?;
        info!("Replaced rank_report.json");
        Ok(())
    }

    fn replace_csv<F>(&self, artifact: &str, write_rows: F) -> Result<(), PipelineError>
    where
        F: FnOnce(&mut csv::Writer<fs::File>) -> csv::Result<()>,
    {
        let tmp = self.root.join(format!("{artifact}.tmp"));
        let file = fs::File::create(&tmp).map_err(|e| PipelineError::connectivity(&tmp, e))?;
        let mut writer = csv::Writer::from_writer(file);

        write_rows(&mut writer).map_err(|e| csv_connectivity(&tmp, e))?;
        writer
            .flush()
            .map_err(|e| PipelineError::connectivity(&tmp, e))?;
        drop(writer);

        self.commit(&tmp, artifact)
    }

    fn replace_json<T: serde::Serialize>(
        &self,
        artifact: &str,
        value: &T,
    ) -> Result<(), PipelineError> {
        let json = serde_json::to_string_pretty(value).map_err(|e| {
            PipelineError::Serialization {
                artifact: artifact.to_string(),
                message: e.to_string(),
            }
        })?;
        let tmp = self.root.join(format!("{artifact}.tmp"));
        fs::write(&tmp, json).map_err(|e| PipelineError::connectivity(&tmp, e))?;

        self.commit(&tmp, artifact)
    }

    /// Atomically swap the temp file in for the previous artifact.
    fn commit(&self, tmp: &Path, artifact: &str) -> Result<(), PipelineError> {
        let target = self.path_of(artifact);
        fs::rename(tmp, &target).map_err(|e| PipelineError::connectivity(&target, e))
    }
}

fn format_ts(ts: NaiveDateTime) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

fn format_opt<T: std::fmt::Display>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn csv_connectivity(path: &Path, e: csv::Error) -> PipelineError {
    let io = match e.into_kind() {
        csv::ErrorKind::Io(io) => io,
        other => std::io::Error::new(std::io::ErrorKind::Other, format!("{other:?}")),
    };
    PipelineError::connectivity(path, io)
}
