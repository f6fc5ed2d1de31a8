#![deny(missing_docs)]
//! Package to download and read RBSP (Van Allen Probes) EFW electric field and probe potential
//! data from the NASA CDAWeb archive.

//
// Public API
//
pub use cdf::{CdfFile, Rows};
pub use config::{CancelFlag, FetchConfig};
pub use errors::RbspDataErr;
pub use instrument::{EField, EFieldVector, Instrument, Potential, Potentials};
pub use record::{MeasurementRecord, Provenance};
pub use retrieve::{retrieve, retrieve_with, Accumulator, Request};
pub use satellite::Satellite;
pub use scratch::{ScratchDir, ScratchFile};
pub use session::{FtpSession, RemoteSession};
pub use store::{MemoryStore, RecordStore};
pub use version::{resolve_version, RemoteFileCandidate};
pub use window::time_window;

//
// Implementation only
//
mod cdf;
mod config;
mod errors;
mod ingest;
mod instrument;
mod record;
mod retrieve;
mod satellite;
mod scratch;
mod session;
mod store;
mod version;
mod window;

#[cfg(feature = "pylib")]
mod py_lib;
