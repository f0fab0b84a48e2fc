//! Error types shared by the inference core and the artifact loaders.

use std::path::PathBuf;

use polars::prelude::PolarsError;
use thiserror::Error;

use crate::segment::ClusterId;

/// Errors returned by this crate.
#[derive(Debug, Error)]
pub enum Error {
    /// Artifacts disagree with each other or with the expected shape.
    ///
    /// Raised while building the process-wide state; the process should not start.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The clustering model produced a cluster that has no segment label.
    #[error("cluster {cluster} has no segment label; the model and the RFM history are out of sync")]
    UnknownCluster {
        /// Cluster returned by the model.
        cluster: ClusterId,
    },

    /// A single request carried an invalid value.
    #[error("invalid parameter {name}: {message}")]
    InvalidParameter {
        /// Parameter name.
        name: &'static str,
        /// Human-readable explanation.
        message: String,
    },

    /// An artifact file could not be read.
    #[error("could not read artifact `{path}`: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A JSON artifact could not be decoded.
    #[error("could not parse artifact `{path}`: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },

    /// A tabular artifact could not be read or lacks a required column.
    #[error("could not load dataset `{path}`: {source}")]
    Dataset {
        path: PathBuf,
        source: PolarsError,
    },
}

impl Error {
    pub(crate) fn invalid(name: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name,
            message: message.into(),
        }
    }

    /// True for errors that only reject the current request.
    ///
    /// Everything else points at broken or mismatched artifacts.
    pub fn is_request_error(&self) -> bool {
        matches!(self, Self::InvalidParameter { .. } | Self::UnknownCluster { .. })
    }
}

/// Result type used by this crate.
pub type Result<T> = std::result::Result<T, Error>;
