//! The in-memory form of one measurement.

use chrono::NaiveDateTime;

use crate::satellite::Satellite;

/// Descriptive text shared by every record of a data set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Provenance {
    /// The name of the data set.
    pub data_set: &'static str,
    /// Where the data come from. Please give credit to data providers when credit is due.
    pub info: &'static str,
}

/// One time stamped measurement from one satellite.
///
/// Records are built while reading a day-file and never change afterward. The provenance is
/// not part of a record's identity.
#[derive(Debug, Clone)]
pub struct MeasurementRecord<P> {
    timestamp: NaiveDateTime,
    satellite: Satellite,
    payload: P,
    provenance: Provenance,
}

impl<P> MeasurementRecord<P> {
    /// Create a new record.
    pub fn new(
        timestamp: NaiveDateTime,
        satellite: Satellite,
        payload: P,
        provenance: Provenance,
    ) -> Self {
        MeasurementRecord {
            timestamp,
            satellite,
            payload,
            provenance,
        }
    }

    /// The UTC time of the measurement.
    pub fn timestamp(&self) -> NaiveDateTime {
        self.timestamp
    }

    /// The probe that made the measurement.
    pub fn satellite(&self) -> Satellite {
        self.satellite
    }

    /// The instrument specific values.
    pub fn payload(&self) -> &P {
        &self.payload
    }

    /// Data set name and attribution.
    pub fn provenance(&self) -> &Provenance {
        &self.provenance
    }
}

impl<P: PartialEq> PartialEq for MeasurementRecord<P> {
    fn eq(&self, other: &Self) -> bool {
        self.timestamp == other.timestamp
            && self.satellite == other.satellite
            && self.payload == other.payload
    }
}
