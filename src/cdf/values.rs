//! Data types, value decoding, and time conversions for CDF files.

use byteorder::{BigEndian, ByteOrder, LittleEndian};
use chrono::{Duration, NaiveDate, NaiveDateTime};

use crate::errors::RbspDataErr;

/// Byte order of the variable data in a file. Internal records are always big endian.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Encoding {
    Big,
    Little,
}

impl Encoding {
    pub(crate) fn from_code(code: i32) -> Result<Self, RbspDataErr> {
        match code {
            // NETWORK, SUN, SGi, IBMRS, PPC, HP, NeXT, ARM_BIG
            1 | 2 | 5 | 7 | 9 | 11 | 12 | 19 => Ok(Encoding::Big),
            // DECSTATION, IBMPC, ALPHAOSF1, ALPHAVMSi, ARM_LITTLE
            4 | 6 | 8 | 16 | 18 => Ok(Encoding::Little),
            _ => Err(RbspDataErr::UnsupportedCdf(format!("data encoding {}", code))),
        }
    }

    /// Decode a single numeric value. Returns `None` for non-numeric types.
    pub(crate) fn decode_f64(self, data_type: DataType, bytes: &[u8]) -> Option<f64> {
        match self {
            Encoding::Big => decode::<BigEndian>(data_type, bytes),
            Encoding::Little => decode::<LittleEndian>(data_type, bytes),
        }
    }

    pub(crate) fn decode_i64(self, bytes: &[u8]) -> i64 {
        match self {
            Encoding::Big => BigEndian::read_i64(bytes),
            Encoding::Little => LittleEndian::read_i64(bytes),
        }
    }
}

fn decode<B: ByteOrder>(data_type: DataType, bytes: &[u8]) -> Option<f64> {
    use DataType::*;

    let val = match data_type {
        Int1 => f64::from(bytes[0] as i8),
        Int2 => f64::from(B::read_i16(bytes)),
        Int4 => f64::from(B::read_i32(bytes)),
        Int8 | TimeTT2000 => B::read_i64(bytes) as f64,
        UInt1 => f64::from(bytes[0]),
        UInt2 => f64::from(B::read_u16(bytes)),
        UInt4 => f64::from(B::read_u32(bytes)),
        Real4 => f64::from(B::read_f32(bytes)),
        Real8 | Epoch => B::read_f64(bytes),
        Epoch16 | Char => return None,
    };

    Some(val)
}

/// The CDF data types.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum DataType {
    Int1,
    Int2,
    Int4,
    Int8,
    UInt1,
    UInt2,
    UInt4,
    Real4,
    Real8,
    Epoch,
    Epoch16,
    TimeTT2000,
    Char,
}

impl DataType {
    pub(crate) fn from_code(code: i32) -> Result<Self, RbspDataErr> {
        use DataType::*;

        match code {
            1 | 41 => Ok(Int1),
            2 => Ok(Int2),
            4 => Ok(Int4),
            8 => Ok(Int8),
            11 => Ok(UInt1),
            12 => Ok(UInt2),
            14 => Ok(UInt4),
            21 | 44 => Ok(Real4),
            22 | 45 => Ok(Real8),
            31 => Ok(Epoch),
            32 => Ok(Epoch16),
            33 => Ok(TimeTT2000),
            51 | 52 => Ok(Char),
            _ => Err(RbspDataErr::UnsupportedCdf(format!("data type {}", code))),
        }
    }

    /// Size in bytes of one element.
    pub(crate) fn size(self) -> usize {
        use DataType::*;

        match self {
            Int1 | UInt1 | Char => 1,
            Int2 | UInt2 => 2,
            Int4 | UInt4 | Real4 => 4,
            Int8 | Real8 | Epoch | TimeTT2000 => 8,
            Epoch16 => 16,
        }
    }
}

/// Milliseconds from 0000-01-01 to the unix epoch in the CDF_EPOCH time scale.
const EPOCH_MS_AT_UNIX_EPOCH: f64 = 62_167_219_200_000.0;

/// Values at or below this are fill in CDF_EPOCH and the real data types.
const FILL_THRESHOLD: f64 = -1.0e30;

/// TAI - UTC in seconds, with the UTC date each value took effect.
const LEAP_SECONDS: [(i32, u32, u32, i64); 28] = [
    (1972, 1, 1, 10),
    (1972, 7, 1, 11),
    (1973, 1, 1, 12),
    (1974, 1, 1, 13),
    (1975, 1, 1, 14),
    (1976, 1, 1, 15),
    (1977, 1, 1, 16),
    (1978, 1, 1, 17),
    (1979, 1, 1, 18),
    (1980, 1, 1, 19),
    (1981, 7, 1, 20),
    (1982, 7, 1, 21),
    (1983, 7, 1, 22),
    (1985, 7, 1, 23),
    (1988, 1, 1, 24),
    (1990, 1, 1, 25),
    (1991, 1, 1, 26),
    (1992, 7, 1, 27),
    (1993, 7, 1, 28),
    (1994, 7, 1, 29),
    (1996, 1, 1, 30),
    (1997, 7, 1, 31),
    (1999, 1, 1, 32),
    (2006, 1, 1, 33),
    (2009, 1, 1, 34),
    (2012, 7, 1, 35),
    (2015, 7, 1, 36),
    (2017, 1, 1, 37),
];

fn naive(year: i32, month: u32, day: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(year, month, day)
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .unwrap_or(NaiveDateTime::MIN)
}

fn unix_epoch() -> NaiveDateTime {
    naive(1970, 1, 1)
}

/// The TT2000 zero point, 2000-01-01T12:00:00 TT, on a clock that ticks TAI seconds but is
/// labeled like UTC.
fn tt2000_zero_tai() -> NaiveDateTime {
    naive(2000, 1, 1) + Duration::milliseconds(11 * 3_600_000 + 59 * 60_000 + 27_816)
}

/// Convert a CDF_EPOCH value (milliseconds since 0000-01-01) to UTC.
pub(crate) fn epoch_to_utc(ms: f64) -> Option<NaiveDateTime> {
    if !ms.is_finite() || ms <= FILL_THRESHOLD {
        return None;
    }

    let micros = ((ms - EPOCH_MS_AT_UNIX_EPOCH) * 1_000.0).round() as i64;
    unix_epoch().checked_add_signed(Duration::microseconds(micros))
}

/// Convert a CDF_TIME_TT2000 value (nanoseconds since J2000 terrestrial time) to UTC.
pub(crate) fn tt2000_to_utc(nanos: i64) -> Option<NaiveDateTime> {
    if nanos == i64::MIN || nanos == i64::MIN + 1 {
        return None;
    }

    let tai = tt2000_zero_tai().checked_add_signed(Duration::nanoseconds(nanos))?;

    let offset = LEAP_SECONDS
        .iter()
        .rev()
        .map(|&(y, m, d, ls)| (naive(y, m, d) + Duration::seconds(ls), ls))
        .find(|&(effective, _)| effective <= tai)
        .map(|(_, ls)| ls)
        .unwrap_or(LEAP_SECONDS[0].3);

    tai.checked_sub_signed(Duration::seconds(offset))
}

#[cfg(test)]
pub(crate) fn utc_to_tt2000(utc: NaiveDateTime) -> i64 {
    let offset = LEAP_SECONDS
        .iter()
        .rev()
        .find(|&&(y, m, d, _)| naive(y, m, d) <= utc)
        .map(|&(_, _, _, ls)| ls)
        .unwrap_or(LEAP_SECONDS[0].3);

    let tai = utc + Duration::seconds(offset);
    (tai - tt2000_zero_tai())
        .num_nanoseconds()
        .expect("test times fit in i64 nanoseconds")
}

#[cfg(test)]
pub(crate) fn utc_to_epoch(utc: NaiveDateTime) -> f64 {
    (utc - unix_epoch()).num_milliseconds() as f64 + EPOCH_MS_AT_UNIX_EPOCH
}

/*--------------------------------------------------------------------------------------------------
                                          Unit Tests
--------------------------------------------------------------------------------------------------*/
