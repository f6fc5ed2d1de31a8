use std::ops::Range;

use super::{Instrument, EFW_INFO};
use crate::{cdf::CdfFile, errors::RbspDataErr, record::Provenance};

/// EFW high resolution probe potentials.
///
/// The cadence is about 0.06 s, so a day-file holds well over a million samples. Reading more
/// than a couple of hours at a time is slow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Potential;

/// Probe potentials and their beam averages. Values are `None` when they could not be read or
/// are not good.
#[derive(Debug, Clone, PartialEq)]
pub struct Potentials {
    /// One potential per probe.
    pub vsvy: Vec<Option<f64>>,
    /// Average across potential beams.
    pub vsvy_avg: Vec<Option<f64>>,
}

impl Potential {
    const DATA_VARIABLE: &'static str = "vsvy";
    const AVERAGE_VARIABLE: &'static str = "vsvy_vavg";
}

impl Instrument for Potential {
    type Payload = Potentials;

    const PRODUCT: &'static str = "vsvy-highres";

    const PROVENANCE: Provenance = Provenance {
        data_set: "RBSP Potential Data",
        info: EFW_INFO,
    };

    fn payloads(cdf: &CdfFile, range: Range<usize>) -> Result<Vec<Potentials>, RbspDataErr> {
        let vsvy = cdf.read_values(Self::DATA_VARIABLE, range.clone())?;
        let avg = cdf.read_values(Self::AVERAGE_VARIABLE, range)?;

        if vsvy.len() != avg.len() {
            return Err(RbspDataErr::InvalidCdf(
                "potential and average variables differ in length",
            ));
        }

        Ok(vsvy
            .iter()
            .zip(avg.iter())
            .map(|(vsvy, avg)| Potentials {
                vsvy: vsvy.to_vec(),
                vsvy_avg: avg.to_vec(),
            })
            .collect())
    }
}
