//! The RBSP probes.

use std::{fmt, str::FromStr};

use strum::IntoEnumIterator;
use strum_macros::{EnumIter, EnumString, IntoStaticStr};

use crate::errors::RbspDataErr;

/// One of the two Van Allen Probes (RBSP-A and RBSP-B).
#[derive(
    Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug, Hash, EnumString, IntoStaticStr, EnumIter,
)]
pub enum Satellite {
    /// RBSP-A
    #[strum(to_string = "a", serialize = "A", serialize = "rbspa", serialize = "RBSPA")]
    A,
    /// RBSP-B
    #[strum(to_string = "b", serialize = "B", serialize = "rbspb", serialize = "RBSPB")]
    B,
}

impl fmt::Display for Satellite {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.letter())
    }
}

impl Satellite {
    /// The lower case letter used in remote paths and file names.
    pub fn letter(self) -> &'static str {
        self.into()
    }

    /// Both probes, in the default request order.
    pub fn all() -> Vec<Satellite> {
        Satellite::iter().collect()
    }

    /// Validate a list of satellite identifiers.
    ///
    /// Duplicates are dropped, first occurrence wins. An empty list or any unknown identifier is
    /// rejected so that no network activity happens for a malformed request.
    pub fn parse_list<S: AsRef<str>>(ids: &[S]) -> Result<Vec<Satellite>, RbspDataErr> {
        if ids.is_empty() {
            return Err(RbspDataErr::InvalidSatellite("<none>".to_owned()));
        }

        let mut sats: Vec<Satellite> = Vec::with_capacity(ids.len());
        for id in ids {
            let id = id.as_ref();
            let sat = Satellite::from_str(id.trim())
                .map_err(|_| RbspDataErr::InvalidSatellite(id.to_owned()))?;

            if !sats.contains(&sat) {
                sats.push(sat);
            }
        }

        Ok(sats)
    }
}

/*--------------------------------------------------------------------------------------------------
                                          Unit Tests
--------------------------------------------------------------------------------------------------*/
