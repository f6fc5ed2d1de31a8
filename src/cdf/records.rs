//! Internal record layouts of a version 3 CDF file.
//!
//! All offsets and counts in internal records are big endian regardless of the data encoding.

use std::{borrow::Cow, collections::HashSet, io::Read};

use byteorder::{BigEndian, ByteOrder};

use super::values::{DataType, Encoding};
use crate::errors::RbspDataErr;

pub(super) const MAGIC_V3: u32 = 0xCDF3_0001;
pub(super) const MAGIC_UNCOMPRESSED: u32 = 0x0000_FFFF;
pub(super) const MAGIC_COMPRESSED: u32 = 0xCCCC_0001;

const CDR: i32 = 1;
const GDR: i32 = 2;
const RVDR: i32 = 3;
const ADR: i32 = 4;
const AGREDR: i32 = 5;
const VXR: i32 = 6;
const VVR: i32 = 7;
const ZVDR: i32 = 8;
const AZEDR: i32 = 9;
const CCR: i32 = 10;
const CPR: i32 = 11;
const CVVR: i32 = 13;

const GZIP: i32 = 5;
const NAME_LEN: usize = 256;

// Nested index records deeper than this are treated as corruption.
const MAX_VXR_DEPTH: usize = 16;

pub(super) fn be_u32(data: &[u8], off: usize) -> Result<u32, RbspDataErr> {
    data.get(off..off + 4)
        .map(BigEndian::read_u32)
        .ok_or(RbspDataErr::InvalidCdf("truncated file"))
}

fn be_i32(data: &[u8], off: usize) -> Result<i32, RbspDataErr> {
    data.get(off..off + 4)
        .map(BigEndian::read_i32)
        .ok_or(RbspDataErr::InvalidCdf("truncated file"))
}

fn be_i64(data: &[u8], off: usize) -> Result<i64, RbspDataErr> {
    data.get(off..off + 8)
        .map(BigEndian::read_i64)
        .ok_or(RbspDataErr::InvalidCdf("truncated file"))
}

fn count(data: &[u8], off: usize) -> Result<usize, RbspDataErr> {
    let val = be_i32(data, off)?;
    if val < 0 {
        return Err(RbspDataErr::InvalidCdf("negative count"));
    }
    Ok(val as usize)
}

/// A file offset where zero (and the -1 used by some writers) mean "no record".
fn link(data: &[u8], off: usize) -> Result<Option<usize>, RbspDataErr> {
    let val = be_i64(data, off)?;
    if val <= 0 {
        Ok(None)
    } else if val as u64 >= data.len() as u64 {
        Err(RbspDataErr::InvalidCdf("offset past end of file"))
    } else {
        Ok(Some(val as usize))
    }
}

fn name(data: &[u8], off: usize) -> Result<String, RbspDataErr> {
    let raw = data
        .get(off..off + NAME_LEN)
        .ok_or(RbspDataErr::InvalidCdf("truncated file"))?;
    let end = raw.iter().position(|&b| b == 0).unwrap_or(NAME_LEN);

    Ok(String::from_utf8_lossy(&raw[..end]).trim().to_owned())
}

fn expect_type(data: &[u8], off: usize, expected: i32) -> Result<(), RbspDataErr> {
    if be_i32(data, off + 8)? != expected {
        return Err(RbspDataErr::InvalidCdf("unexpected record type"));
    }
    Ok(())
}

fn record_size(data: &[u8], off: usize) -> Result<usize, RbspDataErr> {
    let size = be_i64(data, off)?;
    if size < 12 || off as u64 + size as u64 > data.len() as u64 {
        return Err(RbspDataErr::InvalidCdf("bad record size"));
    }
    Ok(size as usize)
}

/// Follow a linked list of records, refusing to loop forever on a corrupt file.
fn walk_chain<T, F>(data: &[u8], head: Option<usize>, mut parse: F) -> Result<Vec<T>, RbspDataErr>
where
    F: FnMut(usize) -> Result<(T, Option<usize>), RbspDataErr>,
{
    let max_links = data.len() / 12 + 1;
    let mut items = vec![];
    let mut next = head;

    while let Some(off) = next {
        if items.len() > max_links {
            return Err(RbspDataErr::InvalidCdf("record chain loops"));
        }
        let (item, following) = parse(off)?;
        items.push(item);
        next = following;
    }

    Ok(items)
}

/// Inflate at most `limit` bytes.
fn gunzip(compressed: &[u8], limit: u64) -> Result<Vec<u8>, RbspDataErr> {
    let mut out = vec![];
    flate2::read::GzDecoder::new(compressed)
        .take(limit)
        .read_to_end(&mut out)
        .map_err(|_| RbspDataErr::InvalidCdf("corrupt gzip data"))?;
    Ok(out)
}

fn check_gzip(data: &[u8], cpr_offset: Option<usize>) -> Result<(), RbspDataErr> {
    let off = cpr_offset.ok_or(RbspDataErr::InvalidCdf("missing compression record"))?;
    expect_type(data, off, CPR)?;

    let c_type = be_i32(data, off + 12)?;
    if c_type != GZIP {
        return Err(RbspDataErr::UnsupportedCdf(format!(
            "compression type {}",
            c_type
        )));
    }
    Ok(())
}

/// Undo whole-file compression, returning the bytes of the equivalent uncompressed file.
pub(super) fn decompress_file(data: &[u8]) -> Result<Vec<u8>, RbspDataErr> {
    let ccr = 8;
    expect_type(data, ccr, CCR)?;
    let size = record_size(data, ccr)?;
    if size < 32 {
        return Err(RbspDataErr::InvalidCdf("bad record size"));
    }
    check_gzip(data, link(data, ccr + 12)?)?;
    let u_size = be_i64(data, ccr + 20)?;
    if u_size < 0 {
        return Err(RbspDataErr::InvalidCdf("bad uncompressed size"));
    }

    let body = gunzip(&data[ccr + 32..ccr + size], u_size as u64 + 1)?;
    if body.len() as i64 != u_size {
        return Err(RbspDataErr::InvalidCdf("uncompressed size mismatch"));
    }

    let mut file = Vec::with_capacity(body.len() + 8);
    file.extend_from_slice(&MAGIC_V3.to_be_bytes());
    file.extend_from_slice(&MAGIC_UNCOMPRESSED.to_be_bytes());
    file.extend_from_slice(&body);
    Ok(file)
}

pub(super) struct Cdr {
    pub gdr: usize,
    pub encoding: Encoding,
}

impl Cdr {
    pub fn parse(data: &[u8]) -> Result<Self, RbspDataErr> {
        let off = 8;
        expect_type(data, off, CDR)?;

        let version = be_i32(data, off + 20)?;
        if version != 3 {
            return Err(RbspDataErr::UnsupportedCdf(format!("version {}", version)));
        }

        let gdr = link(data, off + 12)?.ok_or(RbspDataErr::InvalidCdf("missing GDR"))?;
        let encoding = Encoding::from_code(be_i32(data, off + 28)?)?;

        Ok(Cdr { gdr, encoding })
    }
}

pub(super) struct Gdr {
    pub rvdr_head: Option<usize>,
    pub zvdr_head: Option<usize>,
    pub adr_head: Option<usize>,
    pub r_dim_sizes: Vec<usize>,
}

impl Gdr {
    pub fn parse(data: &[u8], off: usize) -> Result<Self, RbspDataErr> {
        expect_type(data, off, GDR)?;

        let r_num_dims = count(data, off + 56)?;
        let r_dim_sizes = (0..r_num_dims)
            .map(|i| count(data, off + 84 + 4 * i))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Gdr {
            rvdr_head: link(data, off + 12)?,
            zvdr_head: link(data, off + 20)?,
            adr_head: link(data, off + 28)?,
            r_dim_sizes,
        })
    }
}

/// A variable descriptor, from either an rVDR or a zVDR.
#[derive(Debug)]
pub(super) struct Vdr {
    pub name: String,
    pub num: i32,
    pub is_z: bool,
    pub data_type: DataType,
    pub num_elems: usize,
    pub max_rec: i64,
    pub vxr_head: Option<usize>,
    pub record_variance: bool,
    pub cpr: Option<usize>,
    pub compressed: bool,
    pub dims: Vec<usize>,
    pub dim_varys: Vec<bool>,
    /// Number of values stored per record.
    pub values_per_record: usize,
    pub record_bytes: usize,
}

impl Vdr {
    fn parse(data: &[u8], off: usize, r_dim_sizes: &[usize]) -> Result<(Self, Option<usize>), RbspDataErr> {
        let is_z = match be_i32(data, off + 8)? {
            ZVDR => true,
            RVDR => false,
            _ => return Err(RbspDataErr::InvalidCdf("unexpected record type")),
        };

        let flags = be_i32(data, off + 44)?;

        let (dims, varys_at) = if is_z {
            let n = count(data, off + 340)?;
            let dims = (0..n)
                .map(|i| count(data, off + 344 + 4 * i))
                .collect::<Result<Vec<_>, _>>()?;
            (dims, off + 344 + 4 * n)
        } else {
            (r_dim_sizes.to_vec(), off + 340)
        };

        let dim_varys = (0..dims.len())
            .map(|i| be_i32(data, varys_at + 4 * i).map(|v| v != 0))
            .collect::<Result<Vec<_>, _>>()?;

        let data_type = DataType::from_code(be_i32(data, off + 20)?)?;
        let num_elems = count(data, off + 64)?.max(1);

        let values_per_record = dims
            .iter()
            .zip(&dim_varys)
            .filter(|(_, varys)| **varys)
            .try_fold(1usize, |acc, (size, _)| acc.checked_mul(*size))
            .ok_or(RbspDataErr::InvalidCdf("record size overflows"))?;
        let record_bytes = values_per_record
            .checked_mul(num_elems)
            .and_then(|n| n.checked_mul(data_type.size()))
            .ok_or(RbspDataErr::InvalidCdf("record size overflows"))?;

        let vdr = Vdr {
            name: name(data, off + 84)?,
            num: be_i32(data, off + 68)?,
            is_z,
            data_type,
            num_elems,
            max_rec: i64::from(be_i32(data, off + 24)?),
            vxr_head: link(data, off + 28)?,
            record_variance: flags & 0x1 != 0,
            cpr: link(data, off + 72)?,
            compressed: flags & 0x4 != 0,
            dims,
            dim_varys,
            values_per_record,
            record_bytes,
        };

        Ok((vdr, link(data, off + 12)?))
    }
}

/// Parse every r and z variable descriptor in the file.
pub(super) fn variables(data: &[u8], gdr: &Gdr) -> Result<Vec<Vdr>, RbspDataErr> {
    let mut vars = walk_chain(data, gdr.rvdr_head, |off| {
        Vdr::parse(data, off, &gdr.r_dim_sizes)
    })?;
    vars.extend(walk_chain(data, gdr.zvdr_head, |off| {
        Vdr::parse(data, off, &gdr.r_dim_sizes)
    })?);

    Ok(vars)
}

/// A variable scoped attribute entry.
pub(super) struct Entry {
    pub var_num: i32,
    pub is_z: bool,
    pub value: Option<f64>,
}

/// Find the entries of the named variable scoped attribute.
pub(super) fn variable_attribute(
    data: &[u8],
    gdr: &Gdr,
    encoding: Encoding,
    attr_name: &str,
) -> Result<Vec<Entry>, RbspDataErr> {
    let adrs = walk_chain(data, gdr.adr_head, |off| {
        expect_type(data, off, ADR)?;
        let adr = (
            name(data, off + 68)?,
            be_i32(data, off + 28)?,
            link(data, off + 20)?,
            link(data, off + 48)?,
        );
        Ok((adr, link(data, off + 12)?))
    })?;

    let mut entries = vec![];
    for (name, scope, agr_head, az_head) in adrs {
        // Scopes 2 and 4 are variable and assumed-variable.
        if name != attr_name || (scope != 2 && scope != 4) {
            continue;
        }

        for head in &[agr_head, az_head] {
            entries.extend(walk_chain(data, *head, |off| {
                let is_z = match be_i32(data, off + 8)? {
                    AZEDR => true,
                    AGREDR => false,
                    _ => return Err(RbspDataErr::InvalidCdf("unexpected record type")),
                };
                let data_type = DataType::from_code(be_i32(data, off + 24)?)?;
                let value = data
                    .get(off + 56..off + 56 + data_type.size())
                    .and_then(|bytes| encoding.decode_f64(data_type, bytes));

                let entry = Entry {
                    var_num: be_i32(data, off + 28)?,
                    is_z,
                    value,
                };
                Ok((entry, link(data, off + 12)?))
            })?);
        }
    }

    Ok(entries)
}

/// A run of consecutive records stored in one VVR or CVVR.
#[derive(Clone, Copy, Debug)]
pub(super) struct Block {
    pub first: usize,
    pub last: usize,
    offset: usize,
}

/// Flatten the index tree of a variable into its data blocks, in record order.
///
/// Each index record is read at most once, an index that reaches the same record twice is
/// corrupt.
pub(super) fn blocks(data: &[u8], vxr_head: Option<usize>) -> Result<Vec<Block>, RbspDataErr> {
    let mut found = vec![];
    let mut visited = HashSet::new();
    collect_blocks(data, vxr_head, 0, &mut visited, &mut found)?;
    found.sort_by_key(|block| block.first);
    Ok(found)
}

fn collect_blocks(
    data: &[u8],
    head: Option<usize>,
    depth: usize,
    visited: &mut HashSet<usize>,
    found: &mut Vec<Block>,
) -> Result<(), RbspDataErr> {
    if depth > MAX_VXR_DEPTH {
        return Err(RbspDataErr::InvalidCdf("index tree too deep"));
    }

    let vxrs = walk_chain(data, head, |off| {
        expect_type(data, off, VXR)?;
        if !visited.insert(off) {
            return Err(RbspDataErr::InvalidCdf("index records loop"));
        }
        Ok((off, link(data, off + 12)?))
    })?;

    for off in vxrs {
        let n_entries = count(data, off + 20)?;
        let n_used = count(data, off + 24)?.min(n_entries);

        for i in 0..n_used {
            let first = be_i32(data, off + 28 + 4 * i)?;
            let last = be_i32(data, off + 28 + 4 * n_entries + 4 * i)?;
            let target = link(data, off + 28 + 8 * n_entries + 8 * i)?
                .ok_or(RbspDataErr::InvalidCdf("index entry without data"))?;

            if first < 0 || last < first {
                return Err(RbspDataErr::InvalidCdf("bad index entry"));
            }

            if be_i32(data, target + 8)? == VXR {
                collect_blocks(data, Some(target), depth + 1, visited, found)?;
            } else {
                found.push(Block {
                    first: first as usize,
                    last: last as usize,
                    offset: target,
                });
            }
        }
    }

    Ok(())
}

/// The raw record bytes held by a block, decompressed if needed.
pub(super) fn block_bytes<'a>(
    data: &'a [u8],
    block: &Block,
    vdr: &Vdr,
) -> Result<Cow<'a, [u8]>, RbspDataErr> {
    let off = block.offset;
    let size = record_size(data, off)?;

    match be_i32(data, off + 8)? {
        VVR => Ok(Cow::Borrowed(&data[off + 12..off + size])),
        CVVR => {
            if !vdr.compressed {
                return Err(RbspDataErr::InvalidCdf(
                    "compressed records in uncompressed variable",
                ));
            }
            check_gzip(data, vdr.cpr)?;
            let c_size = be_i64(data, off + 16)?;
            if c_size < 0 || 24 + c_size as u64 > size as u64 {
                return Err(RbspDataErr::InvalidCdf("bad compressed record size"));
            }
            let records = (block.last - block.first + 1) as u64;
            let limit = records.saturating_mul(vdr.record_bytes as u64);
            Ok(Cow::Owned(gunzip(&data[off + 24..off + 24 + c_size as usize], limit)?))
        }
        _ => Err(RbspDataErr::InvalidCdf("unexpected record type")),
    }
}
