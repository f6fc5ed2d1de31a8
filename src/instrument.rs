//! The instrument data products that can be retrieved.

use std::ops::Range;

use crate::{cdf::CdfFile, errors::RbspDataErr, record::Provenance, satellite::Satellite};

mod efield;
mod potential;

pub use self::{
    efield::{EField, EFieldVector},
    potential::{Potential, Potentials},
};

const EFW_INFO: &str = concat!(
    "These data were downloaded from NASA CDAWEB at ftp://cdaweb.gsfc.nasa.gov/pub/data/rbsp, ",
    "and the PI on the EFW instrument is J. Wygant from University of Minnesota"
);

/// An EFW data product served as one CDF file per satellite per day.
pub trait Instrument {
    /// The values carried by one record.
    type Payload: Clone + std::fmt::Debug + PartialEq;

    /// Directory of the product under `rbsp<sat>/l2/efw/`.
    const PRODUCT: &'static str;

    /// The time index variable in the day-files.
    const TIME_VARIABLE: &'static str = "epoch";

    /// Data set name and attribution attached to every record.
    const PROVENANCE: Provenance;

    /// Read the payloads for a range of records of an open day-file.
    fn payloads(cdf: &CdfFile, range: Range<usize>) -> Result<Vec<Self::Payload>, RbspDataErr>;

    /// Remote directory holding a year of day-files for one satellite.
    fn remote_dir(base: &str, sat: Satellite, year: i32) -> String {
        format!(
            "{}/rbsp{}/l2/efw/{}/{}",
            base.trim_end_matches('/'),
            sat.letter(),
            Self::PRODUCT,
            year
        )
    }
}

/*--------------------------------------------------------------------------------------------------
                                          Unit Tests
--------------------------------------------------------------------------------------------------*/
