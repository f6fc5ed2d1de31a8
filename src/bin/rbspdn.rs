//! RBSP Downloader.
//!
//! Downloads RBSP EFW data from CDAWeb and writes it out as CSV.

use std::{
    io::{self, Write},
    path::PathBuf,
    time::Duration,
};

use chrono::{NaiveDate, NaiveDateTime};
use clap::{crate_version, App, Arg, ArgMatches};
use failure::{err_msg, Error, Fail};
use log::info;
use rbsp_data::{
    retrieve, EField, EFieldVector, FetchConfig, Instrument, MeasurementRecord, Potential,
    Potentials,
};

fn main() {
    if let Err(ref e) = run() {
        eprintln!("error: {}", e);

        let mut fail: &dyn Fail = e.as_fail();

        while let Some(cause) = fail.cause() {
            eprintln!("caused by: {}", cause);

            if let Some(backtrace) = cause.backtrace() {
                eprintln!("backtrace: {}\n\n\n", backtrace);
            }

            fail = cause;
        }

        ::std::process::exit(1);
    }
}

fn run() -> Result<(), Error> {
    let matches = new_app().get_matches();

    setup_logging(matches.occurrences_of("verbose"))?;

    let start = parse_time(matches.value_of("start").unwrap_or_default())?;
    let end = matches.value_of("end").map(parse_time).transpose()?;
    let sats: Vec<&str> = matches
        .values_of("sats")
        .map(|vals| vals.collect())
        .unwrap_or_else(|| vec!["a", "b"]);
    let config = build_config(&matches)?;

    let out: Box<dyn Write> = match matches.value_of("output") {
        Some(path) => Box::new(std::fs::File::create(path)?),
        None => Box::new(io::stdout()),
    };

    match matches.value_of("instrument").unwrap_or("efield") {
        "efield" => download::<EField, _>(&config, start, end, &sats, out),
        "pot" => download::<Potential, _>(&config, start, end, &sats, out),
        other => Err(err_msg(format!("unknown instrument: {}", other))),
    }
}

fn new_app<'a, 'b>() -> App<'a, 'b> {
    App::new("rbspdn")
        .about("Download RBSP EFW data from CDAWeb as CSV.")
        .version(crate_version!())
        .arg(
            Arg::with_name("start")
                .required(true)
                .index(1)
                .help("Start time, YYYY-MM-DD or YYYY-MM-DDTHH:MM:SS (UTC)."),
        )
        .arg(
            Arg::with_name("end")
                .index(2)
                .help("End time (exclusive), defaults to one day after the start."),
        )
        .arg(
            Arg::with_name("sats")
                .multiple(true)
                .short("s")
                .long("sats")
                .takes_value(true)
                .help("Satellites, a and/or b. Defaults to both."),
        )
        .arg(
            Arg::with_name("instrument")
                .short("i")
                .long("instrument")
                .takes_value(true)
                .possible_values(&["efield", "pot"])
                .default_value("efield")
                .help("Spin-fit electric field or high resolution probe potentials."),
        )
        .arg(
            Arg::with_name("output")
                .short("o")
                .long("output")
                .takes_value(true)
                .help("File to write to instead of stdout."),
        )
        .arg(
            Arg::with_name("scratch")
                .long("scratch")
                .takes_value(true)
                .help("Directory for downloaded files while they are read.")
                .long_help(
                    "Directory for downloaded files while they are read. Defaults to 'sat' \
                     in the system temporary directory.",
                ),
        )
        .arg(
            Arg::with_name("host")
                .long("host")
                .takes_value(true)
                .help("FTP server, defaults to cdaweb.gsfc.nasa.gov."),
        )
        .arg(
            Arg::with_name("port")
                .long("port")
                .takes_value(true)
                .default_value("21")
                .help("FTP port."),
        )
        .arg(
            Arg::with_name("timeout")
                .short("t")
                .long("timeout")
                .takes_value(true)
                .default_value("120")
                .help("Seconds to wait on any single network operation."),
        )
        .arg(
            Arg::with_name("verbose")
                .short("v")
                .multiple(true)
                .help("More logging, repeat for even more."),
        )
        .after_help(concat!(
            "Logging goes to stderr, RUST_LOG is honored.\n\n",
            "The high resolution potential files hold more than a million samples per day, ",
            "requests of an hour or two are much quicker."
        ))
}

fn setup_logging(verbosity: u64) -> Result<(), log::SetLoggerError> {
    let mut builder = env_logger::Builder::from_default_env();
    builder.target(env_logger::Target::Stderr);
    builder.format_target(false);
    match verbosity {
        0 => builder.filter_level(log::LevelFilter::Warn),
        1 => builder.filter_level(log::LevelFilter::Info),
        2 => builder.filter_level(log::LevelFilter::Debug),
        _ => builder.filter_level(log::LevelFilter::Trace),
    };
    builder.try_init()
}

fn parse_time(val: &str) -> Result<NaiveDateTime, Error> {
    NaiveDateTime::parse_from_str(val, "%Y-%m-%dT%H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(val, "%Y-%m-%d %H:%M:%S"))
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(val, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
        .ok_or_else(|| err_msg(format!("invalid time '{}'", val)))
}

fn build_config(matches: &ArgMatches) -> Result<FetchConfig, Error> {
    let mut config = FetchConfig::default();

    let host = matches.value_of("host").unwrap_or(FetchConfig::DEFAULT_HOST);
    let port: u16 = matches.value_of("port").unwrap_or("21").parse()?;
    config = config.with_host(host, port);

    if let Some(scratch) = matches.value_of("scratch") {
        config = config.with_scratch_root(PathBuf::from(scratch));
    }

    let timeout = Duration::from_secs(matches.value_of("timeout").unwrap_or("120").parse()?);
    config = config.with_timeouts(timeout.min(Duration::from_secs(30)), timeout);

    Ok(config)
}

fn download<I, W>(
    config: &FetchConfig,
    start: NaiveDateTime,
    end: Option<NaiveDateTime>,
    sats: &[&str],
    out: W,
) -> Result<(), Error>
where
    I: Instrument,
    I::Payload: CsvFields,
    W: Write,
{
    let records = match retrieve::<I, _>(config, start, end, sats)? {
        Some(records) => records,
        None => {
            eprintln!("No data found.");
            return Ok(());
        }
    };
    info!("writing {} records", records.len());

    let mut wtr = csv::Writer::from_writer(out);

    let mut header = vec!["time".to_owned(), "sat".to_owned()];
    header.extend(records.first().payload().header());
    wtr.write_record(&header)?;

    for record in records.iter() {
        wtr.write_record(&csv_row(record))?;
    }
    wtr.flush()?;

    let provenance = records.first().provenance();
    eprintln!("{}: {}", provenance.data_set, provenance.info);

    Ok(())
}

fn csv_row<P: CsvFields>(record: &MeasurementRecord<P>) -> Vec<String> {
    let mut row = vec![
        record.timestamp().format("%Y-%m-%dT%H:%M:%S%.6f").to_string(),
        record.satellite().to_string(),
    ];
    row.extend(record.payload().fields());
    row
}

/// Payloads that can be written as CSV columns.
trait CsvFields {
    fn header(&self) -> Vec<String>;
    fn fields(&self) -> Vec<String>;
}

fn opt_to_string(val: &Option<f64>) -> String {
    val.map(|val| val.to_string()).unwrap_or_default()
}

impl CsvFields for EFieldVector {
    fn header(&self) -> Vec<String> {
        vec!["ex".to_owned(), "ey".to_owned(), "ez".to_owned()]
    }

    fn fields(&self) -> Vec<String> {
        [self.ex, self.ey, self.ez].iter().map(opt_to_string).collect()
    }
}

impl CsvFields for Potentials {
    fn header(&self) -> Vec<String> {
        (1..=self.vsvy.len())
            .map(|i| format!("vsvy{}", i))
            .chain((1..=self.vsvy_avg.len()).map(|i| format!("vsvy_avg{}", i)))
            .collect()
    }

    fn fields(&self) -> Vec<String> {
        self.vsvy
            .iter()
            .chain(self.vsvy_avg.iter())
            .map(opt_to_string)
            .collect()
    }
}
