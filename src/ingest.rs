//! Turn one remote day-file into measurement records.

use std::io::{BufWriter, Write};

use chrono::NaiveDateTime;
use log::debug;

use crate::{
    cdf::CdfFile,
    errors::RbspDataErr,
    instrument::Instrument,
    record::MeasurementRecord,
    satellite::Satellite,
    scratch::ScratchDir,
    session::RemoteSession,
    window::time_window,
};

/// Download `file_name` from the session's current directory and read the records in
/// `[start, end)`.
///
/// The scratch copy is deleted before this returns, whatever the outcome. Transfer failures
/// come back as `RbspDataErr::Transfer` and problems reading the file as `RbspDataErr::Ingest`.
pub fn ingest_day_file<I, S>(
    session: &mut S,
    scratch: &ScratchDir,
    file_name: &str,
    sat: Satellite,
    start: NaiveDateTime,
    end: NaiveDateTime,
) -> Result<Vec<MeasurementRecord<I::Payload>>, RbspDataErr>
where
    I: Instrument,
    S: RemoteSession + ?Sized,
{
    let (guard, file) = scratch.create_file(file_name)?;

    let mut writer = BufWriter::new(file);
    let num_bytes = session.retrieve(file_name, &mut writer)?;
    writer.flush().map_err(|err| RbspDataErr::Transfer {
        file_name: file_name.to_owned(),
        reason: err.to_string(),
    })?;
    drop(writer);
    debug!("retrieved {} ({} bytes)", file_name, num_bytes);

    let ingest_err = |err: RbspDataErr| RbspDataErr::Ingest {
        file_name: file_name.to_owned(),
        reason: err.to_string(),
    };

    let cdf = CdfFile::open(guard.path()).map_err(ingest_err)?;
    let times = cdf.read_times(I::TIME_VARIABLE).map_err(ingest_err)?;
    let range = time_window(&times, start, end);
    let payloads = I::payloads(&cdf, range.clone()).map_err(ingest_err)?;

    if payloads.len() != range.len() {
        return Err(ingest_err(RbspDataErr::InvalidCdf(
            "data variable has fewer records than the time variable",
        )));
    }

    Ok(times[range]
        .iter()
        .zip(payloads)
        .map(|(&time, payload)| MeasurementRecord::new(time, sat, payload, I::PROVENANCE))
        .collect())
}

/*--------------------------------------------------------------------------------------------------
                                          Unit Tests
--------------------------------------------------------------------------------------------------*/
