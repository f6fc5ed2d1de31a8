//! Pick the authoritative file out of the versions listed for one day.

use chrono::NaiveDate;
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref VERSION_RE: Regex = Regex::new(r"_v(\d{2})").expect("valid regex");
    static ref DATE_RE: Regex = Regex::new(r"(\d{8})").expect("valid regex");
}

/// A remote file name with the version and day parsed out of it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFileCandidate<'a> {
    /// Name as listed by the server.
    pub file_name: &'a str,
    /// The two digit version suffix, if there is one.
    pub version: Option<u32>,
    /// The day the file covers, if the name carries an 8 digit date.
    pub day: Option<NaiveDate>,
}

impl<'a> RemoteFileCandidate<'a> {
    /// Parse a listed file name, e.g. `rbspa_efw-l2_e-spinfit-mgse_20130101_v01.cdf`.
    pub fn parse(file_name: &'a str) -> Self {
        let version = VERSION_RE
            .captures(file_name)
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse().ok());

        let day = DATE_RE
            .captures_iter(file_name)
            .filter_map(|caps| caps.get(1))
            .find_map(|m| NaiveDate::parse_from_str(m.as_str(), "%Y%m%d").ok());

        RemoteFileCandidate {
            file_name,
            version,
            day,
        }
    }
}

/// Select the file with the highest version from the listing for one (satellite, day).
///
/// Ties go to the earliest entry in listing order. If no name carries a version, the first
/// listed file is chosen. Listing order on the server says nothing about recency, so that
/// fallback may pick a stale file; it is kept so that a day with oddly named files still yields
/// data. Returns `None` only for an empty listing.
pub fn resolve_version<S: AsRef<str>>(listing: &[S]) -> Option<RemoteFileCandidate> {
    let mut best: Option<RemoteFileCandidate> = None;

    for name in listing {
        let candidate = RemoteFileCandidate::parse(name.as_ref());

        let better = match (&best, candidate.version) {
            (None, _) => true,
            (Some(current), Some(ver)) => current.version.map(|cur| ver > cur).unwrap_or(true),
            (Some(_), None) => false,
        };

        if better {
            best = Some(candidate);
        }
    }

    best
}

/*--------------------------------------------------------------------------------------------------
                                          Unit Tests
--------------------------------------------------------------------------------------------------*/
