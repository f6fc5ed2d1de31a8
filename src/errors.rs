//! Module for errors.
use std::{error::Error, fmt::Display};

/// Error from the retrieval pipeline.
#[derive(Debug)]
pub enum RbspDataErr {
    // Inherited errors from std
    /// Error forwarded from std
    IO(::std::io::Error),

    // Other forwarded errors
    /// Error forwarded from the strum crate
    StrumError(strum::ParseError),

    // Remote session errors
    /// Unable to reach the remote host.
    Connection(String),
    /// The remote host rejected the login.
    Authentication(String),
    /// A remote directory does not exist.
    NotFound(String),
    /// A single file transfer failed.
    Transfer {
        /// Remote file name.
        file_name: String,
        /// What went wrong.
        reason: String,
    },

    // Local processing errors
    /// A retrieved file could not be read.
    Ingest {
        /// Remote file name.
        file_name: String,
        /// What went wrong.
        reason: String,
    },
    /// Unable to prepare the scratch directory.
    Scratch(::std::io::Error),
    /// The file is not a well formed CDF file.
    InvalidCdf(&'static str),
    /// The CDF file uses a feature this reader does not handle.
    UnsupportedCdf(String),
    /// A required variable is absent from a CDF file.
    MissingVariable(String),

    // Caller errors
    /// Satellite identifier is not one of the RBSP probes.
    InvalidSatellite(String),
    /// End time comes before start time.
    InvalidTimeRange,
    /// The caller cancelled the request.
    Cancelled,
}

impl Display for RbspDataErr {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> Result<(), std::fmt::Error> {
        use crate::errors::RbspDataErr::*;

        match self {
            IO(err) => write!(f, "std lib io error: {}", err),

            StrumError(err) => write!(f, "error forwarded from strum crate: {}", err),

            Connection(msg) => write!(f, "problem connecting to server: {}", msg),
            Authentication(msg) => write!(f, "problem logging in to server: {}", msg),
            NotFound(path) => write!(f, "remote directory not found: {}", path),
            Transfer { file_name, reason } => {
                write!(f, "error retrieving file {}: {}", file_name, reason)
            }

            Ingest { file_name, reason } => write!(f, "error reading file {}: {}", file_name, reason),
            Scratch(err) => write!(f, "unable to prepare scratch directory: {}", err),
            InvalidCdf(msg) => write!(f, "invalid cdf file: {}", msg),
            UnsupportedCdf(msg) => write!(f, "unsupported cdf feature: {}", msg),
            MissingVariable(name) => write!(f, "missing cdf variable: {}", name),

            InvalidSatellite(sat) => {
                write!(f, "invalid satellite: {}, must be 'a', 'b', or both", sat)
            }
            InvalidTimeRange => write!(f, "end time before start time"),
            Cancelled => write!(f, "request cancelled"),
        }
    }
}

impl Error for RbspDataErr {}

impl From<::std::io::Error> for RbspDataErr {
    fn from(err: ::std::io::Error) -> RbspDataErr {
        RbspDataErr::IO(err)
    }
}

impl From<strum::ParseError> for RbspDataErr {
    fn from(err: strum::ParseError) -> RbspDataErr {
        RbspDataErr::StrumError(err)
    }
}

impl RbspDataErr {
    /// True for failures that end the whole request rather than one (day, satellite) slot.
    pub fn is_fatal(&self) -> bool {
        use crate::errors::RbspDataErr::*;

        match self {
            Connection(_) | Authentication(_) | NotFound(_) | Scratch(_) | Cancelled => true,
            _ => false,
        }
    }
}
