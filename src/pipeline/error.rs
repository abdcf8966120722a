//! Error taxonomy for the pipeline stages
//!
//! Stages return these typed errors; the orchestrating binary decides
//! whether to abort or continue. `Validation` is the only recoverable
//! kind: it is surfaced prominently and the run may continue to
//! best-effort reporting.

use std::path::PathBuf;

use thiserror::Error;

use crate::pipeline::types::{VehicleClass, VerificationCounts};

#[derive(Debug, Error)]
pub enum PipelineError {
    /// Backing store or input file unreachable; fatal.
    #[error("storage unreachable at {path}: {source}")]
    Connectivity {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Expected input columns absent or mistyped; fatal, raised before
    /// any table is replaced.
    #[error("schema mismatch in {input} (row {row}): {message}")]
    SchemaMismatch {
        input: String,
        row: usize,
        message: String,
    },

    /// A trip's vehicle class has no emission factor row. Fatal for the
    /// derivation stage; CO2 is never silently defaulted.
    #[error("no emission factor for vehicle class '{class}'")]
    MissingEmissionFactor { class: VehicleClass },

    /// An output artifact could not be encoded; fatal for the stage
    /// persisting it.
    #[error("failed to encode artifact {artifact}: {message}")]
    Serialization { artifact: String, message: String },

    /// A post-filter verification count is non-zero.
    #[error("post-clean verification found anomalies: {counts}")]
    Validation { counts: VerificationCounts },
}

impl PipelineError {
    pub fn connectivity(path: &std::path::Path, source: std::io::Error) -> Self {
        PipelineError::Connectivity {
            path: path.to_path_buf(),
            source,
        }
    }

    pub fn schema(input: &str, row: usize, message: impl std::fmt::Display) -> Self {
        PipelineError::SchemaMismatch {
            input: input.to_string(),
            row,
            message: message.to_string(),
        }
    }
}
