use crate::{
    config::FetchConfig,
    errors::RbspDataErr,
    instrument::{EField, EFieldVector, Potential, Potentials},
    record::MeasurementRecord,
    retrieve::retrieve,
    satellite::Satellite,
};
use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike};
use pyo3::{
    exceptions,
    prelude::*,
    types::{PyDateAccess, PyDateTime, PyTimeAccess},
    wrap_pyfunction,
};

/// One electric field sample.
#[pyclass]
#[derive(Clone, Debug)]
struct EFieldRecord {
    time: NaiveDateTime,
    #[pyo3(get)]
    sat: String,
    #[pyo3(get)]
    ex: Option<f64>,
    #[pyo3(get)]
    ey: Option<f64>,
    #[pyo3(get)]
    ez: Option<f64>,
    data_set: &'static str,
    info: &'static str,
}

/// One set of probe potentials.
#[pyclass]
#[derive(Clone, Debug)]
struct PotentialRecord {
    time: NaiveDateTime,
    #[pyo3(get)]
    sat: String,
    #[pyo3(get)]
    vsvy: Vec<Option<f64>>,
    #[pyo3(get)]
    vsvy_avg: Vec<Option<f64>>,
    data_set: &'static str,
    info: &'static str,
}

impl From<&MeasurementRecord<EFieldVector>> for EFieldRecord {
    fn from(record: &MeasurementRecord<EFieldVector>) -> Self {
        let payload = record.payload();
        EFieldRecord {
            time: record.timestamp(),
            sat: record.satellite().letter().to_owned(),
            ex: payload.ex,
            ey: payload.ey,
            ez: payload.ez,
            data_set: record.provenance().data_set,
            info: record.provenance().info,
        }
    }
}

impl From<&MeasurementRecord<Potentials>> for PotentialRecord {
    fn from(record: &MeasurementRecord<Potentials>) -> Self {
        PotentialRecord {
            time: record.timestamp(),
            sat: record.satellite().letter().to_owned(),
            vsvy: record.payload().vsvy.clone(),
            vsvy_avg: record.payload().vsvy_avg.clone(),
            data_set: record.provenance().data_set,
            info: record.provenance().info,
        }
    }
}

#[pymethods]
impl EFieldRecord {
    #[getter]
    fn time(&self, py: Python) -> PyResult<PyObject> {
        convert_to_python(py, self.time)
    }

    #[getter]
    fn data_set(&self) -> &str {
        self.data_set
    }

    #[getter]
    fn info(&self) -> &str {
        self.info
    }
}

#[pymethods]
impl PotentialRecord {
    #[getter]
    fn time(&self, py: Python) -> PyResult<PyObject> {
        convert_to_python(py, self.time)
    }

    #[getter]
    fn data_set(&self) -> &str {
        self.data_set
    }

    #[getter]
    fn info(&self) -> &str {
        self.info
    }
}

/// Read RBSP EFW spin-fit electric field data from CDAWeb for `[start, end)`.
///
/// `end` defaults to a day after `start`, `sat` may be 'a', 'b', or a list of them. Returns
/// `None` if no data was found.
#[pyfunction(end = "None", sat = "None")]
fn read_efield_ftp(
    py: Python,
    start: &PyDateTime,
    end: Option<&PyDateTime>,
    sat: Option<&PyAny>,
) -> PyResult<Option<Vec<EFieldRecord>>> {
    let start = convert_to_chrono(start)?;
    let end = end.map(convert_to_chrono).transpose()?;
    let sats = satellite_ids(sat)?;
    let config = FetchConfig::default();

    let records = py.allow_threads(|| retrieve::<EField, _>(&config, start, end, &sats))?;

    Ok(records.map(|records| records.iter().map(EFieldRecord::from).collect()))
}

/// Read RBSP EFW high resolution probe potentials from CDAWeb for `[start, end)`.
///
/// The files are large, prefer requests of an hour or two.
#[pyfunction(end = "None", sat = "None")]
fn read_pot_ftp(
    py: Python,
    start: &PyDateTime,
    end: Option<&PyDateTime>,
    sat: Option<&PyAny>,
) -> PyResult<Option<Vec<PotentialRecord>>> {
    let start = convert_to_chrono(start)?;
    let end = end.map(convert_to_chrono).transpose()?;
    let sats = satellite_ids(sat)?;
    let config = FetchConfig::default();

    let records = py.allow_threads(|| retrieve::<Potential, _>(&config, start, end, &sats))?;

    Ok(records.map(|records| records.iter().map(PotentialRecord::from).collect()))
}

// A single identifier or a list of them, both probes when absent.
fn satellite_ids(sat: Option<&PyAny>) -> PyResult<Vec<String>> {
    match sat {
        None => Ok(Satellite::all()
            .into_iter()
            .map(|sat| sat.letter().to_owned())
            .collect()),
        Some(obj) => match obj.extract::<String>() {
            Ok(one) => Ok(vec![one]),
            Err(_) => obj.extract::<Vec<String>>(),
        },
    }
}

fn convert_to_chrono(dt: &PyDateTime) -> PyResult<NaiveDateTime> {
    let year = dt.get_year();
    let month: u32 = dt.get_month().into();
    let day: u32 = dt.get_day().into();
    let hour: u32 = dt.get_hour().into();
    let minute: u32 = dt.get_minute().into();
    let second: u32 = dt.get_second().into();
    let micro: u32 = dt.get_microsecond();

    NaiveDate::from_ymd_opt(year, month, day)
        .and_then(|date| date.and_hms_micro_opt(hour, minute, second, micro))
        .ok_or_else(|| exceptions::PyValueError::new_err("invalid date time"))
}

fn convert_to_python(py: Python, time: NaiveDateTime) -> PyResult<PyObject> {
    let dt = PyDateTime::new(
        py,
        time.year(),
        time.month() as u8,
        time.day() as u8,
        time.hour() as u8,
        time.minute() as u8,
        time.second() as u8,
        time.nanosecond() / 1_000,
        None,
    )?;

    Ok(dt.to_object(py))
}

/// Download RBSP EFW data.
#[pymodule]
fn rbsp_data(_py: Python<'_>, m: &PyModule) -> PyResult<()> {
    m.add_class::<EFieldRecord>()?;
    m.add_class::<PotentialRecord>()?;
    m.add_wrapped(wrap_pyfunction!(read_efield_ftp))?;
    m.add_wrapped(wrap_pyfunction!(read_pot_ftp))?;

    Ok(())
}

impl std::convert::From<RbspDataErr> for PyErr {
    fn from(err: RbspDataErr) -> PyErr {
        match err {
            RbspDataErr::InvalidSatellite(_) | RbspDataErr::InvalidTimeRange => {
                exceptions::PyValueError::new_err(err.to_string())
            }
            _ => exceptions::PyRuntimeError::new_err(err.to_string()),
        }
    }
}
