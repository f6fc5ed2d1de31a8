//! Reader for NASA Common Data Format (CDF) version 3 files.
//!
//! Only what the instrument files need is supported: numeric and time variables, r and z
//! variables, multi-level record indexes, and gzip compression of either the whole file or the
//! individual variable records. Multi-dimensional values are returned in storage order.

use std::{ops::Range, path::Path};

use chrono::NaiveDateTime;

use crate::errors::RbspDataErr;

mod records;
mod values;
#[cfg(test)]
pub(crate) mod writer;

use self::{
    records::{Cdr, Gdr, Vdr},
    values::{DataType, Encoding},
};

/// Values at or below this are treated as fill for real valued data without a FILLVAL entry.
const REAL_FILL_THRESHOLD: f64 = -1.0e30;

/// An open CDF file held in memory.
#[derive(Debug)]
pub struct CdfFile {
    data: Vec<u8>,
    encoding: Encoding,
    variables: Vec<Variable>,
}

#[derive(Debug)]
struct Variable {
    vdr: Vdr,
    fill: Option<f64>,
}

/// Values read from one variable, `width` values per record.
#[derive(Debug, Clone, PartialEq)]
pub struct Rows {
    width: usize,
    values: Vec<Option<f64>>,
}

impl Rows {
    /// Number of values in each record.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.values.len() / self.width
    }

    /// True if no records were read.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterate over records.
    pub fn iter(&self) -> impl Iterator<Item = &[Option<f64>]> {
        self.values.chunks_exact(self.width)
    }
}

impl CdfFile {
    /// Load and parse a file from disk.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, RbspDataErr> {
        let data = std::fs::read(path)?;
        Self::from_bytes(data)
    }

    /// Parse a file already in memory.
    pub fn from_bytes(data: Vec<u8>) -> Result<Self, RbspDataErr> {
        let magic = records::be_u32(&data, 0)?;
        if magic != records::MAGIC_V3 {
            return Err(RbspDataErr::UnsupportedCdf(format!("magic number {:#010x}", magic)));
        }

        let data = match records::be_u32(&data, 4)? {
            records::MAGIC_UNCOMPRESSED => data,
            records::MAGIC_COMPRESSED => records::decompress_file(&data)?,
            _ => return Err(RbspDataErr::InvalidCdf("bad magic number")),
        };

        let cdr = Cdr::parse(&data)?;
        let gdr = Gdr::parse(&data, cdr.gdr)?;

        let fills = records::variable_attribute(&data, &gdr, cdr.encoding, "FILLVAL")?;

        let variables = records::variables(&data, &gdr)?
            .into_iter()
            .map(|vdr| {
                let fill = fills
                    .iter()
                    .find(|entry| entry.is_z == vdr.is_z && entry.var_num == vdr.num)
                    .and_then(|entry| entry.value);
                Variable { vdr, fill }
            })
            .collect();

        Ok(CdfFile {
            data,
            encoding: cdr.encoding,
            variables,
        })
    }

    /// Names of all the variables in the file.
    pub fn variable_names(&self) -> impl Iterator<Item = &str> {
        self.variables.iter().map(|var| var.vdr.name.as_str())
    }

    /// Number of records written for a variable.
    pub fn num_records(&self, name: &str) -> Result<usize, RbspDataErr> {
        let var = self.variable(name)?;
        Ok(Self::record_count(var))
    }

    /// Read the whole of a time variable (CDF_EPOCH or CDF_TIME_TT2000) as UTC.
    ///
    /// Any record holding a fill value or missing from the file makes the time index unusable
    /// and is an error.
    pub fn read_times(&self, name: &str) -> Result<Vec<NaiveDateTime>, RbspDataErr> {
        let var = self.variable(name)?;

        let convert: fn(Encoding, &[u8]) -> Option<NaiveDateTime> = match var.vdr.data_type {
            DataType::TimeTT2000 => |enc, bytes| values::tt2000_to_utc(enc.decode_i64(bytes)),
            DataType::Epoch => |enc, bytes| {
                enc.decode_f64(DataType::Epoch, bytes)
                    .and_then(values::epoch_to_utc)
            },
            other => {
                return Err(RbspDataErr::UnsupportedCdf(format!(
                    "time variable {} of type {:?}",
                    name, other
                )))
            }
        };

        if var.vdr.values_per_record != 1 {
            return Err(RbspDataErr::InvalidCdf("time variable is not a scalar"));
        }
        if !var.vdr.record_variance {
            return Err(RbspDataErr::InvalidCdf("time variable does not vary by record"));
        }

        let n = Self::record_count(var);
        let mut times = vec![];
        let encoding = self.encoding;

        // Sized by the records stored, not by the record count in the descriptor.
        self.visit_records(var, 0..n, |rec, bytes| {
            if rec != times.len() {
                return Err(RbspDataErr::InvalidCdf("missing records in time index"));
            }
            let time = convert(encoding, bytes)
                .ok_or(RbspDataErr::InvalidCdf("fill value in time index"))?;
            times.push(time);
            Ok(true)
        })?;

        if times.len() != n {
            return Err(RbspDataErr::InvalidCdf("missing records in time index"));
        }

        Ok(times)
    }

    /// Read a range of records of a numeric variable.
    ///
    /// The range is clamped to the records in the file. Fill values and non-finite values come
    /// back as `None`. Reading stops at the first record missing from the file, so a variable
    /// with gaps gives fewer rows than asked for. A variable that does not vary by record gives
    /// its one record.
    pub fn read_values(&self, name: &str, range: Range<usize>) -> Result<Rows, RbspDataErr> {
        let var = self.variable(name)?;
        let data_type = var.vdr.data_type;

        if data_type == DataType::Char || data_type == DataType::Epoch16 {
            return Err(RbspDataErr::UnsupportedCdf(format!(
                "numeric read of {} with type {:?}",
                name, data_type
            )));
        }

        let width = var.vdr.values_per_record;
        if width == 0 {
            return Err(RbspDataErr::InvalidCdf("variable with an empty dimension"));
        }

        let n = Self::record_count(var);
        let range = range.start.min(n)..range.end.min(n);
        let mut values: Vec<Option<f64>> = vec![];

        let encoding = self.encoding;
        // Cannot overflow, the record size was checked when the descriptor was read.
        let elem_size = data_type.size() * var.vdr.num_elems;

        let is_real = match data_type {
            DataType::Real4 | DataType::Real8 => true,
            _ => false,
        };
        let fill = var.fill;
        let mut next = range.start;

        self.visit_records(var, range, |rec, bytes| {
            if rec != next {
                return Ok(false);
            }
            next += 1;

            values.extend(bytes.chunks_exact(elem_size).map(|elem| {
                encoding.decode_f64(data_type, elem).filter(|val| {
                    val.is_finite()
                        && Some(*val) != fill
                        && !(is_real && fill.is_none() && *val <= REAL_FILL_THRESHOLD)
                })
            }));
            Ok(true)
        })?;

        Ok(Rows { width, values })
    }

    fn variable(&self, name: &str) -> Result<&Variable, RbspDataErr> {
        self.variables
            .iter()
            .find(|var| var.vdr.name == name)
            .ok_or_else(|| RbspDataErr::MissingVariable(name.to_owned()))
    }

    fn record_count(var: &Variable) -> usize {
        if var.vdr.max_rec < 0 {
            0
        } else {
            var.vdr.max_rec as usize + 1
        }
    }

    /// Call `visit` with the raw bytes of each stored record in `range`, in record order,
    /// until it returns `false`.
    ///
    /// A variable that does not vary by record has one physical record, visited once as the
    /// first record of the range.
    fn visit_records<F>(
        &self,
        var: &Variable,
        range: Range<usize>,
        mut visit: F,
    ) -> Result<(), RbspDataErr>
    where
        F: FnMut(usize, &[u8]) -> Result<bool, RbspDataErr>,
    {
        if range.is_empty() {
            return Ok(());
        }

        let rec_bytes = var.vdr.record_bytes;
        let blocks = records::blocks(&self.data, var.vdr.vxr_head)?;

        if !var.vdr.record_variance {
            if let Some(block) = blocks.iter().find(|block| block.first == 0) {
                let bytes = records::block_bytes(&self.data, block, &var.vdr)?;
                let rec = bytes
                    .get(..rec_bytes)
                    .ok_or(RbspDataErr::InvalidCdf("short data record"))?;
                visit(range.start, rec)?;
            }
            return Ok(());
        }

        for block in blocks {
            let lo = block.first.max(range.start);
            let hi = (block.last + 1).min(range.end);
            if lo >= hi {
                continue;
            }

            let bytes = records::block_bytes(&self.data, &block, &var.vdr)?;
            for r in lo..hi {
                let rec = (r - block.first)
                    .checked_mul(rec_bytes)
                    .and_then(|at| Some(at..at.checked_add(rec_bytes)?))
                    .and_then(|span| bytes.get(span))
                    .ok_or(RbspDataErr::InvalidCdf("short data record"))?;
                if !visit(r, rec)? {
                    return Ok(());
                }
            }
        }

        Ok(())
    }
}

/*--------------------------------------------------------------------------------------------------
                                          Unit Tests
--------------------------------------------------------------------------------------------------*/
