//! The interface an external record store provides.

use chrono::NaiveDateTime;

use crate::{
    errors::RbspDataErr, instrument::Instrument, record::MeasurementRecord, satellite::Satellite,
};

/// Somewhere to keep retrieved records for an instrument.
pub trait RecordStore<I: Instrument> {
    /// Add records to the store.
    fn store(&mut self, records: &[MeasurementRecord<I::Payload>]) -> Result<(), RbspDataErr>;

    /// Get the records in `[start, end)` for the given satellites, ordered by time.
    fn load(
        &self,
        start: NaiveDateTime,
        end: NaiveDateTime,
        satellites: &[Satellite],
    ) -> Result<Vec<MeasurementRecord<I::Payload>>, RbspDataErr>;
}

/// A store that keeps everything in memory, useful as a cache for one session.
#[derive(Debug)]
pub struct MemoryStore<I: Instrument> {
    records: Vec<MeasurementRecord<I::Payload>>,
}

impl<I: Instrument> Default for MemoryStore<I> {
    fn default() -> Self {
        MemoryStore {
            records: Vec::new(),
        }
    }
}

impl<I: Instrument> MemoryStore<I> {
    /// Create an empty store.
    pub fn new() -> Self {
        MemoryStore::default()
    }

    /// Number of records held.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True if nothing has been stored.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl<I: Instrument> RecordStore<I> for MemoryStore<I> {
    fn store(&mut self, records: &[MeasurementRecord<I::Payload>]) -> Result<(), RbspDataErr> {
        for record in records {
            // Insert after any equal times to keep arrival order among them.
            let at = self
                .records
                .partition_point(|have| have.timestamp() <= record.timestamp());

            if !self.records.contains(record) {
                self.records.insert(at, record.clone());
            }
        }

        Ok(())
    }

    fn load(
        &self,
        start: NaiveDateTime,
        end: NaiveDateTime,
        satellites: &[Satellite],
    ) -> Result<Vec<MeasurementRecord<I::Payload>>, RbspDataErr> {
        if end < start {
            return Err(RbspDataErr::InvalidTimeRange);
        }

        let lo = self.records.partition_point(|r| r.timestamp() < start);
        let hi = self.records.partition_point(|r| r.timestamp() < end);

        Ok(self.records[lo..hi.max(lo)]
            .iter()
            .filter(|r| satellites.contains(&r.satellite()))
            .cloned()
            .collect())
    }
}

/*--------------------------------------------------------------------------------------------------
                                          Unit Tests
--------------------------------------------------------------------------------------------------*/
