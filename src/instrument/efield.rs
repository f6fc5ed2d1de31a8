use std::ops::Range;

use super::{Instrument, EFW_INFO};
use crate::{cdf::CdfFile, errors::RbspDataErr, record::Provenance};

/// EFW spin-fit electric field in MGSE coordinates.
///
/// RBSP EFW data is available from September 5 2012 on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EField;

/// Electric field vector. A component is `None` when it could not be read or is not good.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EFieldVector {
    pub ex: Option<f64>,
    pub ey: Option<f64>,
    pub ez: Option<f64>,
}

impl EFieldVector {
    /// Build from exactly three components.
    pub fn from_components(components: &[Option<f64>]) -> Result<Self, RbspDataErr> {
        match *components {
            [ex, ey, ez] => Ok(EFieldVector { ex, ey, ez }),
            _ => Err(RbspDataErr::InvalidCdf(
                "electric field does not have three components",
            )),
        }
    }
}

impl EField {
    const DATA_VARIABLE: &'static str = "e12_spinfit_mgse";
}

impl Instrument for EField {
    type Payload = EFieldVector;

    const PRODUCT: &'static str = "e-spinfit-mgse";

    const PROVENANCE: Provenance = Provenance {
        data_set: "RBSP Efield Spinfit Data",
        info: EFW_INFO,
    };

    fn payloads(cdf: &CdfFile, range: Range<usize>) -> Result<Vec<EFieldVector>, RbspDataErr> {
        cdf.read_values(Self::DATA_VARIABLE, range)?
            .iter()
            .map(EFieldVector::from_components)
            .collect()
    }
}
