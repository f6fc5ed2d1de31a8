//! Drive a retrieval request over days and satellites.
//!
//! A request moves through these states:
//!
//! ```text
//! Idle -> SessionOpen -> PerDayLoop -> Closing -> Done
//!   |          |                         ^
//!   +----------+-> Aborted               |
//!              +-------------------------+ (directory not found, cancelled)
//! ```
//!
//! Validation of the call and creation of the scratch directory happen in `Idle`, before any
//! network activity. A failure to connect or log in aborts with no data. Once the session is
//! open it is always closed, however the loop ends.

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime};
use log::{debug, error, info, warn};
use vec1::Vec1;

use crate::{
    config::FetchConfig,
    errors::RbspDataErr,
    ingest::ingest_day_file,
    instrument::Instrument,
    record::MeasurementRecord,
    satellite::Satellite,
    scratch::ScratchDir,
    session::{FtpSession, RemoteSession},
    version::{resolve_version, RemoteFileCandidate},
};

/// A validated retrieval request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    start: NaiveDateTime,
    end: NaiveDateTime,
    satellites: Vec<Satellite>,
}

impl Request {
    /// Validate the arguments of a retrieval call.
    ///
    /// `end` defaults to one day after `start`. An `end` before `start` or a bad satellite
    /// identifier is an error. `end == start` is allowed and yields no data.
    pub fn new<S: AsRef<str>>(
        start: NaiveDateTime,
        end: Option<NaiveDateTime>,
        satellites: &[S],
    ) -> Result<Self, RbspDataErr> {
        let end = end.unwrap_or_else(|| start + Duration::days(1));
        if end < start {
            return Err(RbspDataErr::InvalidTimeRange);
        }

        let satellites = Satellite::parse_list(satellites)?;

        Ok(Request {
            start,
            end,
            satellites,
        })
    }

    /// Get the inclusive start of the window.
    pub fn start(&self) -> NaiveDateTime {
        self.start
    }

    /// Get the exclusive end of the window.
    pub fn end(&self) -> NaiveDateTime {
        self.end
    }

    /// Get the satellites, in request order.
    pub fn satellites(&self) -> &[Satellite] {
        &self.satellites
    }

    /// The days whose files are examined: from the day of `start` while the day's midnight is
    /// before `end`.
    ///
    /// A short tail past midnight still costs a full listing of the last day.
    pub fn days(&self) -> impl Iterator<Item = NaiveDate> {
        let end = self.end;
        std::iter::successors(Some(self.start.date()), NaiveDate::succ_opt).take_while(move |day| {
            day.and_hms_opt(0, 0, 0)
                .map(|midnight| midnight < end)
                .unwrap_or(false)
        })
    }
}

/// Collects records during the loop, then orders them once.
///
/// Collection is append only. `finish` sorts by time with a stable sort, so records with equal
/// times keep the order they were collected in, which is satellite order within a day.
#[derive(Debug)]
pub struct Accumulator<P> {
    records: Vec<MeasurementRecord<P>>,
}

impl<P> Default for Accumulator<P> {
    fn default() -> Self {
        Accumulator {
            records: Vec::new(),
        }
    }
}

impl<P> Accumulator<P> {
    /// Create an empty accumulator.
    pub fn new() -> Self {
        Accumulator::default()
    }

    /// Add the records from one (day, satellite) slot.
    pub fn collect(&mut self, records: Vec<MeasurementRecord<P>>) {
        self.records.extend(records);
    }

    /// Number of records collected so far.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True if nothing has been collected.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Sort by time. `None` if nothing was collected.
    pub fn finish(self) -> Option<Vec1<MeasurementRecord<P>>> {
        let mut records = self.records;
        records.sort_by_key(|record| record.timestamp());
        Vec1::try_from_vec(records).ok()
    }
}

/// Retrieve the records of an instrument in `[start, end)` from the archive server.
///
/// `end` defaults to `start` plus one day. Returns `Ok(None)` when there is no data, including
/// when the server cannot be reached, rejects the login, or lacks a directory. Errors are
/// reserved for a malformed call, an unusable scratch directory, and cancellation.
///
/// ```no_run
/// use chrono::NaiveDate;
/// use rbsp_data::{retrieve, EField, FetchConfig};
///
/// let start = NaiveDate::from_ymd_opt(2013, 1, 1).unwrap().and_hms_opt(1, 50, 0).unwrap();
/// let end = NaiveDate::from_ymd_opt(2013, 1, 1).unwrap().and_hms_opt(10, 0, 0).unwrap();
///
/// let records = retrieve::<EField, _>(&FetchConfig::default(), start, Some(end), &["a", "b"])?;
/// # Ok::<(), rbsp_data::RbspDataErr>(())
/// ```
pub fn retrieve<I, S>(
    config: &FetchConfig,
    start: NaiveDateTime,
    end: Option<NaiveDateTime>,
    satellites: &[S],
) -> Result<Option<Vec1<MeasurementRecord<I::Payload>>>, RbspDataErr>
where
    I: Instrument,
    S: AsRef<str>,
{
    let request = Request::new(start, end, satellites)?;
    let scratch = ScratchDir::new(config.scratch_root())?;

    if config.cancel_flag().is_cancelled() {
        return Err(RbspDataErr::Cancelled);
    }

    let session = match FtpSession::open(config) {
        Ok(session) => session,
        Err(err) => {
            error!("{}", err);
            return Ok(None);
        }
    };
    info!("connected to {}", config.host());

    retrieve_with::<I, _>(session, &scratch, config, &request)
}

/// Run a validated request over an already open session.
///
/// The session is closed before this returns. A problem closing it is logged and otherwise
/// ignored.
pub fn retrieve_with<I, S>(
    mut session: S,
    scratch: &ScratchDir,
    config: &FetchConfig,
    request: &Request,
) -> Result<Option<Vec1<MeasurementRecord<I::Payload>>>, RbspDataErr>
where
    I: Instrument,
    S: RemoteSession,
{
    let outcome = collect_records::<I, S>(&mut session, scratch, config, request);

    if let Err(err) = session.close() {
        warn!("{}", err);
    }

    match outcome {
        Ok(acc) => {
            info!("retrieved {} records", acc.len());
            Ok(acc.finish())
        }
        Err(err @ RbspDataErr::Cancelled) | Err(err @ RbspDataErr::Scratch(_)) => Err(err),
        Err(err) => {
            error!("{}", err);
            Ok(None)
        }
    }
}

fn collect_records<I, S>(
    session: &mut S,
    scratch: &ScratchDir,
    config: &FetchConfig,
    request: &Request,
) -> Result<Accumulator<I::Payload>, RbspDataErr>
where
    I: Instrument,
    S: RemoteSession,
{
    let cancel = config.cancel_flag();
    let check_cancel = || {
        if cancel.is_cancelled() {
            Err(RbspDataErr::Cancelled)
        } else {
            Ok(())
        }
    };

    let mut acc = Accumulator::new();

    for day in request.days() {
        let pattern = format!("*{}*", day.format("%Y%m%d"));

        for &sat in request.satellites() {
            check_cancel()?;
            let dir = I::remote_dir(config.base_path(), sat, day.year());
            session.change_dir(&dir)?;

            check_cancel()?;
            let listing: Vec<String> = session
                .list(&pattern)
                .unwrap_or_else(|err| {
                    warn!("treating failed listing as empty: {}", err);
                    vec![]
                })
                .into_iter()
                .filter(|name| match RemoteFileCandidate::parse(name).day {
                    Some(other) if other != day => {
                        debug!("ignoring {}, it is for {}", name, other);
                        false
                    }
                    _ => true,
                })
                .collect();

            let candidate = match resolve_version(&listing) {
                Some(candidate) => candidate,
                None => {
                    debug!("no {} file for rbsp{} on {}", I::PRODUCT, sat, day);
                    continue;
                }
            };
            debug!("selected {} from {} listed", candidate.file_name, listing.len());

            check_cancel()?;
            match ingest_day_file::<I, S>(
                session,
                scratch,
                candidate.file_name,
                sat,
                request.start(),
                request.end(),
            ) {
                Ok(records) => {
                    debug!("{} records from {}", records.len(), candidate.file_name);
                    acc.collect(records);
                }
                Err(err) if err.is_fatal() => return Err(err),
                Err(err) => warn!("skipping rbsp{} on {}: {}", sat, day, err),
            }
        }

        let swept = scratch.sweep_day(day);
        if swept > 0 {
            debug!("swept {} leftover scratch files for {}", swept, day);
        }
    }

    Ok(acc)
}

/*--------------------------------------------------------------------------------------------------
                                          Unit Tests
--------------------------------------------------------------------------------------------------*/
#[cfg(test)]
mod unit {
    use super::*;
    use crate::{
        cdf::writer::CdfWriter,
        config::CancelFlag,
        instrument::{EField, Potential},
        session::scripted::ScriptedSession,
    };

    use tempdir::TempDir;

    fn dt(day: u32, hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2013, 1, day)
            .unwrap()
            .and_hms_opt(hour, minute, 0)
            .unwrap()
    }

    fn efield_dir(sat: Satellite) -> String {
        EField::remote_dir(FetchConfig::DEFAULT_BASE_PATH, sat, 2013)
    }

    fn efield_name(sat: Satellite, day: u32, version: u32) -> String {
        format!(
            "rbsp{}_efw-l2_e-spinfit-mgse_201301{:02}_v{:02}.cdf",
            sat, day, version
        )
    }

    /// A day of samples every 30 minutes, starting at `offset` minutes past midnight.
    fn efield_file(day: u32, offset: i64, value: f32) -> Vec<u8> {
        let times: Vec<_> = (0..48)
            .map(|i| dt(day, 0, 0) + Duration::minutes(offset + 30 * i))
            .collect();
        let values = vec![value; 3 * times.len()];

        CdfWriter::new()
            .tt2000("epoch", &times)
            .real4("e12_spinfit_mgse", &[3], &values, Some(-1.0e31))
            .to_bytes()
    }

    fn two_satellite_session(days: &[u32]) -> ScriptedSession {
        let mut session = ScriptedSession::new();
        for &day in days {
            session = session
                .with_file(
                    &efield_dir(Satellite::A),
                    &efield_name(Satellite::A, day, 1),
                    efield_file(day, 0, 1.0),
                )
                .with_file(
                    &efield_dir(Satellite::B),
                    &efield_name(Satellite::B, day, 1),
                    efield_file(day, 15, 2.0),
                );
        }
        session
    }

    fn setup() -> (TempDir, ScratchDir, FetchConfig) {
        let tmp = TempDir::new("rbsp-data-test-retrieve").unwrap();
        let scratch = ScratchDir::new(tmp.path()).unwrap();
        let config = FetchConfig::default().with_scratch_root(tmp.path());
        (tmp, scratch, config)
    }

    fn scratch_is_empty(tmp: &TempDir) -> bool {
        std::fs::read_dir(tmp.path()).unwrap().next().is_none()
    }

    fn check_invariants<P>(records: &[MeasurementRecord<P>], request: &Request) {
        for pair in records.windows(2) {
            assert!(pair[0].timestamp() <= pair[1].timestamp());
        }
        for record in records {
            assert!(record.timestamp() >= request.start());
            assert!(record.timestamp() < request.end());
            assert!(request.satellites().contains(&record.satellite()));
        }
    }

    #[test]
    fn test_request_validation() {
        let start = dt(1, 0, 0);

        let request = Request::new(start, None, &["a"]).unwrap();
        assert_eq!(request.end(), dt(2, 0, 0));
        assert_eq!(request.satellites(), &[Satellite::A]);

        match Request::new(start, Some(dt(1, 0, 0) - Duration::seconds(1)), &["a"]) {
            Err(RbspDataErr::InvalidTimeRange) => {}
            other => panic!("unexpected result: {:?}", other),
        }

        match Request::new(start, None, &["a", "c"]) {
            Err(RbspDataErr::InvalidSatellite(sat)) => assert_eq!(sat, "c"),
            other => panic!("unexpected result: {:?}", other),
        }

        assert!(Request::new(start, Some(start), &["b"]).is_ok());
    }

    #[test]
    fn test_days() {
        let days = |start, end| -> Vec<NaiveDate> {
            Request::new(start, Some(end), &["a"])
                .unwrap()
                .days()
                .collect()
        };

        assert_eq!(days(dt(1, 1, 50), dt(1, 10, 0)).len(), 1);
        assert_eq!(days(dt(1, 0, 0), dt(2, 0, 0)).len(), 1);
        assert_eq!(days(dt(1, 20, 0), dt(2, 0, 1)).len(), 2);
        assert_eq!(days(dt(1, 20, 0), dt(1, 20, 0)).len(), 1);

        let new_year = NaiveDate::from_ymd_opt(2012, 12, 31)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();
        let years: Vec<i32> = days(new_year, dt(1, 12, 0)).iter().map(|d| d.year()).collect();
        assert_eq!(years, vec![2012, 2013]);
    }

    #[test]
    fn test_accumulator_stable_sort() {
        let rec = |hour, sat| {
            MeasurementRecord::new(dt(1, hour, 0), sat, (), EField::PROVENANCE)
        };

        let mut acc = Accumulator::new();
        assert!(acc.is_empty());
        acc.collect(vec![rec(3, Satellite::A), rec(5, Satellite::A)]);
        acc.collect(vec![rec(3, Satellite::B), rec(1, Satellite::B)]);
        assert_eq!(acc.len(), 4);

        let order: Vec<_> = acc
            .finish()
            .unwrap()
            .iter()
            .map(|r| (r.timestamp(), r.satellite()))
            .collect();
        assert_eq!(
            order,
            vec![
                (dt(1, 1, 0), Satellite::B),
                (dt(1, 3, 0), Satellite::A),
                (dt(1, 3, 0), Satellite::B),
                (dt(1, 5, 0), Satellite::A),
            ]
        );

        assert!(Accumulator::<()>::new().finish().is_none());
    }

    #[test]
    fn test_two_satellites_one_morning() {
        let (tmp, scratch, config) = setup();
        let session = two_satellite_session(&[1]);
        let log = session.log.clone();
        let request = Request::new(dt(1, 1, 50), Some(dt(1, 10, 0)), &["a", "b"]).unwrap();

        let records = retrieve_with::<EField, _>(session, &scratch, &config, &request)
            .unwrap()
            .unwrap();

        check_invariants(&records, &request);
        // A at 02:00 through 09:30, B at 02:15 through 09:45.
        assert_eq!(records.len(), 32);
        assert_eq!(records.first().timestamp(), dt(1, 2, 0));
        assert_eq!(records.last().timestamp(), dt(1, 9, 45));
        assert!(records.iter().any(|r| r.satellite() == Satellite::A));
        assert!(records.iter().any(|r| r.satellite() == Satellite::B));
        assert_eq!(records.first().payload().ex, Some(1.0));

        assert_eq!(log.borrow().closes, 1);
        assert!(scratch_is_empty(&tmp));
    }

    #[test]
    fn test_highest_version_is_retrieved() {
        let (_tmp, scratch, config) = setup();
        let dir = efield_dir(Satellite::A);
        let session = ScriptedSession::new()
            .with_file(&dir, &efield_name(Satellite::A, 1, 1), efield_file(1, 0, 1.0))
            .with_file(&dir, &efield_name(Satellite::A, 1, 3), efield_file(1, 0, 3.0))
            .with_file(&dir, &efield_name(Satellite::A, 1, 2), efield_file(1, 0, 2.0));
        let log = session.log.clone();
        let request = Request::new(dt(1, 0, 0), None, &["a"]).unwrap();

        let records = retrieve_with::<EField, _>(session, &scratch, &config, &request)
            .unwrap()
            .unwrap();

        assert_eq!(log.borrow().retrieved, vec![efield_name(Satellite::A, 1, 3)]);
        assert!(records.iter().all(|r| r.payload().ez == Some(3.0)));
    }

    #[test]
    fn test_transfer_failure_is_contained() {
        let (tmp, scratch, config) = setup();
        let session = two_satellite_session(&[1, 2])
            .with_failing_transfer(&efield_name(Satellite::A, 1, 1));
        let request = Request::new(dt(1, 0, 0), Some(dt(3, 0, 0)), &["a", "b"]).unwrap();

        let records = retrieve_with::<EField, _>(session, &scratch, &config, &request)
            .unwrap()
            .unwrap();

        check_invariants(&records, &request);
        assert_eq!(records.len(), 3 * 48);
        assert!(!records
            .iter()
            .any(|r| r.satellite() == Satellite::A && r.timestamp() < dt(2, 0, 0)));
        assert!(scratch_is_empty(&tmp));
    }

    #[test]
    fn test_scratch_file_failure_is_contained() {
        let (_tmp, scratch, config) = setup();
        let session = two_satellite_session(&[1]);
        let request = Request::new(dt(1, 0, 0), None, &["a", "b"]).unwrap();

        // Nothing can be written where a directory already sits.
        std::fs::create_dir(scratch.root().join(efield_name(Satellite::A, 1, 1))).unwrap();

        let records = retrieve_with::<EField, _>(session, &scratch, &config, &request)
            .unwrap()
            .unwrap();

        check_invariants(&records, &request);
        assert_eq!(records.len(), 48);
        assert!(records.iter().all(|r| r.satellite() == Satellite::B));
    }

    #[test]
    fn test_files_for_other_days_are_ignored() {
        let (tmp, scratch, config) = setup();
        let session = two_satellite_session(&[1]).with_file(
            &efield_dir(Satellite::A),
            "rbspa_efw-l2_e-spinfit-mgse_20121231_v09_20130101.cdf",
            b"garbage".to_vec(),
        );
        let request = Request::new(dt(1, 0, 0), None, &["a"]).unwrap();

        let records = retrieve_with::<EField, _>(session, &scratch, &config, &request)
            .unwrap()
            .unwrap();

        check_invariants(&records, &request);
        assert_eq!(records.len(), 48);
        assert!(scratch_is_empty(&tmp));
    }

    #[test]
    fn test_corrupt_file_is_contained() {
        let (tmp, scratch, config) = setup();
        let session = two_satellite_session(&[])
            .with_file(
                &efield_dir(Satellite::A),
                &efield_name(Satellite::A, 1, 1),
                b"garbage".to_vec(),
            )
            .with_file(
                &efield_dir(Satellite::B),
                &efield_name(Satellite::B, 1, 1),
                efield_file(1, 15, 2.0),
            );
        let request = Request::new(dt(1, 0, 0), None, &["a", "b"]).unwrap();

        let records = retrieve_with::<EField, _>(session, &scratch, &config, &request)
            .unwrap()
            .unwrap();

        assert_eq!(records.len(), 48);
        assert!(records.iter().all(|r| r.satellite() == Satellite::B));
        assert!(scratch_is_empty(&tmp));
    }

    #[test]
    fn test_missing_directory_aborts_with_no_data() {
        let (tmp, scratch, config) = setup();
        let session = ScriptedSession::new().with_file(
            &efield_dir(Satellite::A),
            &efield_name(Satellite::A, 1, 1),
            efield_file(1, 0, 1.0),
        );
        let log = session.log.clone();
        let request = Request::new(dt(1, 0, 0), Some(dt(3, 0, 0)), &["a", "b"]).unwrap();

        let result = retrieve_with::<EField, _>(session, &scratch, &config, &request).unwrap();

        assert!(result.is_none());
        assert_eq!(log.borrow().dirs_visited.len(), 2);
        assert_eq!(log.borrow().closes, 1);
        assert!(scratch_is_empty(&tmp));
    }

    #[test]
    fn test_empty_window_is_no_data() {
        let (_tmp, scratch, config) = setup();
        let session = two_satellite_session(&[1]);
        let request = Request::new(dt(1, 4, 0), Some(dt(1, 4, 0)), &["a", "b"]).unwrap();

        let result = retrieve_with::<EField, _>(session, &scratch, &config, &request).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_empty_listing_is_no_data() {
        let (_tmp, scratch, config) = setup();
        let session = ScriptedSession::new()
            .with_dir(&efield_dir(Satellite::A))
            .with_dir(&efield_dir(Satellite::B));
        let log = session.log.clone();
        let request = Request::new(dt(1, 0, 0), None, &["a", "b"]).unwrap();

        let result = retrieve_with::<EField, _>(session, &scratch, &config, &request).unwrap();

        assert!(result.is_none());
        assert!(log.borrow().retrieved.is_empty());
    }

    #[test]
    fn test_close_failure_is_swallowed() {
        let (_tmp, scratch, config) = setup();
        let session = two_satellite_session(&[1]).with_failing_close();
        let request = Request::new(dt(1, 0, 0), None, &["b"]).unwrap();

        let records = retrieve_with::<EField, _>(session, &scratch, &config, &request)
            .unwrap()
            .unwrap();
        assert!(records.iter().all(|r| r.satellite() == Satellite::B));
    }

    #[test]
    fn test_cancelled_request_closes_session() {
        let (_tmp, scratch, config) = setup();
        let cancel = CancelFlag::new();
        let config = config.with_cancel_flag(cancel.clone());
        let session = two_satellite_session(&[1]);
        let log = session.log.clone();
        let request = Request::new(dt(1, 0, 0), None, &["a", "b"]).unwrap();

        cancel.cancel();
        match retrieve_with::<EField, _>(session, &scratch, &config, &request) {
            Err(RbspDataErr::Cancelled) => {}
            other => panic!("unexpected result: {:?}", other),
        }

        assert!(log.borrow().dirs_visited.is_empty());
        assert_eq!(log.borrow().closes, 1);
    }

    #[test]
    fn test_leftover_scratch_files_are_swept() {
        let (tmp, scratch, config) = setup();
        std::fs::write(tmp.path().join("stale_20130101_v01.cdf"), b"old").unwrap();
        std::fs::write(tmp.path().join("keep_20130105_v01.cdf"), b"old").unwrap();

        let session = two_satellite_session(&[1]);
        let request = Request::new(dt(1, 0, 0), None, &["a"]).unwrap();
        retrieve_with::<EField, _>(session, &scratch, &config, &request).unwrap();

        assert!(!tmp.path().join("stale_20130101_v01.cdf").exists());
        assert!(tmp.path().join("keep_20130105_v01.cdf").exists());
    }

    #[test]
    fn test_potential_directory_layout() {
        let (_tmp, scratch, config) = setup();
        let session = ScriptedSession::new();
        let log = session.log.clone();
        let request = Request::new(dt(1, 0, 0), None, &["b"]).unwrap();

        let result = retrieve_with::<Potential, _>(session, &scratch, &config, &request).unwrap();

        assert!(result.is_none());
        assert_eq!(
            log.borrow().dirs_visited,
            vec!["/pub/data/rbsp/rbspb/l2/efw/vsvy-highres/2013".to_owned()]
        );
    }

    #[test]
    fn test_bad_call_fails_before_network() {
        let tmp = TempDir::new("rbsp-data-test-retrieve").unwrap();
        let config = FetchConfig::default()
            .with_host("host.invalid", 21)
            .with_scratch_root(tmp.path());

        match retrieve::<EField, _>(&config, dt(1, 0, 0), None, &["z"]) {
            Err(RbspDataErr::InvalidSatellite(_)) => {}
            other => panic!("unexpected result: {:?}", other),
        }

        match retrieve::<EField, _>(&config, dt(2, 0, 0), Some(dt(1, 0, 0)), &["a"]) {
            Err(RbspDataErr::InvalidTimeRange) => {}
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
