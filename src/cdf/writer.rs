//! A minimal CDF writer used to build test fixtures.

use std::io::Write;

use chrono::NaiveDateTime;
use flate2::{write::GzEncoder, Compression};

use super::{records, values};

enum Values {
    I64(Vec<i64>),
    F32(Vec<f32>),
    F64(Vec<f64>),
}

struct Var {
    name: String,
    data_type: i32,
    dims: Vec<usize>,
    num_records: usize,
    values: Values,
    fill: Option<Values>,
}

/// Builds an in-memory CDF file with z variables.
#[derive(Default)]
pub(crate) struct CdfWriter {
    little: bool,
    compress_vars: bool,
    compress_file: bool,
    vars: Vec<Var>,
}

fn gzip(bytes: &[u8]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(vec![], Compression::default());
    encoder.write_all(bytes).unwrap();
    encoder.finish().unwrap()
}

struct Buf {
    bytes: Vec<u8>,
}

impl Buf {
    fn i32(&mut self, val: i32) {
        self.bytes.extend_from_slice(&val.to_be_bytes());
    }

    fn i64(&mut self, val: i64) {
        self.bytes.extend_from_slice(&val.to_be_bytes());
    }

    fn off(&mut self, val: usize) {
        self.i64(val as i64);
    }

    fn name(&mut self, name: &str) {
        let mut raw = [0u8; 256];
        raw[..name.len()].copy_from_slice(name.as_bytes());
        self.bytes.extend_from_slice(&raw);
    }

    fn at(&self, expected: usize) {
        assert_eq!(self.bytes.len(), expected, "writer layout out of step");
    }
}

impl CdfWriter {
    pub(crate) fn new() -> Self {
        CdfWriter::default()
    }

    pub(crate) fn little_endian(mut self) -> Self {
        self.little = true;
        self
    }

    pub(crate) fn compress_variables(mut self) -> Self {
        self.compress_vars = true;
        self
    }

    pub(crate) fn compress_file(mut self) -> Self {
        self.compress_file = true;
        self
    }

    pub(crate) fn tt2000(mut self, name: &str, times: &[NaiveDateTime]) -> Self {
        let vals = times.iter().map(|t| values::utc_to_tt2000(*t)).collect();
        self.vars.push(Var {
            name: name.to_owned(),
            data_type: 33,
            dims: vec![],
            num_records: times.len(),
            values: Values::I64(vals),
            fill: None,
        });
        self
    }

    pub(crate) fn epoch(mut self, name: &str, times: &[NaiveDateTime]) -> Self {
        let vals = times.iter().map(|t| values::utc_to_epoch(*t)).collect();
        self.vars.push(Var {
            name: name.to_owned(),
            data_type: 31,
            dims: vec![],
            num_records: times.len(),
            values: Values::F64(vals),
            fill: None,
        });
        self
    }

    pub(crate) fn real4(
        mut self,
        name: &str,
        dims: &[usize],
        vals: &[f32],
        fill: Option<f32>,
    ) -> Self {
        let width: usize = dims.iter().product();
        self.vars.push(Var {
            name: name.to_owned(),
            data_type: 21,
            dims: dims.to_vec(),
            num_records: vals.len() / width,
            values: Values::F32(vals.to_vec()),
            fill: fill.map(|f| Values::F32(vec![f])),
        });
        self
    }

    pub(crate) fn real8(
        mut self,
        name: &str,
        dims: &[usize],
        vals: &[f64],
        fill: Option<f64>,
    ) -> Self {
        let width: usize = dims.iter().product();
        self.vars.push(Var {
            name: name.to_owned(),
            data_type: 22,
            dims: dims.to_vec(),
            num_records: vals.len() / width,
            values: Values::F64(vals.to_vec()),
            fill: fill.map(|f| Values::F64(vec![f])),
        });
        self
    }

    fn encode(&self, vals: &Values) -> Vec<u8> {
        let little = self.little;
        match vals {
            Values::I64(v) => v
                .iter()
                .flat_map(|x| (if little { x.to_le_bytes() } else { x.to_be_bytes() }).to_vec())
                .collect(),
            Values::F32(v) => v
                .iter()
                .flat_map(|x| (if little { x.to_le_bytes() } else { x.to_be_bytes() }).to_vec())
                .collect(),
            Values::F64(v) => v
                .iter()
                .flat_map(|x| (if little { x.to_le_bytes() } else { x.to_be_bytes() }).to_vec())
                .collect(),
        }
    }

    pub(crate) fn to_bytes(&self) -> Vec<u8> {
        let bytes = self.uncompressed();

        if !self.compress_file {
            return bytes;
        }

        let gz = gzip(&bytes[8..]);
        let mut buf = Buf { bytes: vec![] };
        buf.bytes.extend_from_slice(&records::MAGIC_V3.to_be_bytes());
        buf.bytes.extend_from_slice(&records::MAGIC_COMPRESSED.to_be_bytes());
        // CCR
        buf.off(32 + gz.len());
        buf.i32(10);
        buf.off(8 + 32 + gz.len());
        buf.off(bytes.len() - 8);
        buf.i32(0);
        buf.bytes.extend_from_slice(&gz);
        // CPR
        buf.i64(28);
        buf.i32(11);
        buf.i32(5);
        buf.i32(0);
        buf.i32(1);
        buf.i32(6);

        buf.bytes
    }

    fn uncompressed(&self) -> Vec<u8> {
        let raw: Vec<Vec<u8>> = self.vars.iter().map(|v| self.encode(&v.values)).collect();
        let stored: Vec<Vec<u8>> = raw
            .iter()
            .map(|r| if self.compress_vars { gzip(r) } else { r.clone() })
            .collect();
        let fills: Vec<(usize, Vec<u8>)> = self
            .vars
            .iter()
            .enumerate()
            .filter_map(|(i, v)| v.fill.as_ref().map(|f| (i, self.encode(f))))
            .collect();

        //
        // Lay out the offsets.
        //
        let cdr_off = 8;
        let gdr_off = cdr_off + 312;
        let mut off = gdr_off + 84;

        let adr_off = if fills.is_empty() {
            None
        } else {
            off += 324;
            Some(off - 324)
        };

        let mut aedr_offs = vec![];
        for (_, val) in &fills {
            aedr_offs.push(off);
            off += 56 + val.len();
        }

        let mut vdr_offs = vec![];
        for var in &self.vars {
            vdr_offs.push(off);
            off += 344 + 8 * var.dims.len();
        }

        // (vxr, cpr, data) for each variable with records
        let mut data_offs = vec![];
        for (var, bytes) in self.vars.iter().zip(&stored) {
            if var.num_records == 0 {
                data_offs.push(None);
                continue;
            }

            let vxr = off;
            off += 44;
            let cpr = if self.compress_vars {
                off += 28;
                Some(off - 28)
            } else {
                None
            };
            let data = off;
            let header = if self.compress_vars { 24 } else { 12 };
            off += header + bytes.len();
            data_offs.push(Some((vxr, cpr, data)));
        }
        let eof = off;

        //
        // Write it out.
        //
        let mut buf = Buf { bytes: vec![] };
        buf.bytes.extend_from_slice(&records::MAGIC_V3.to_be_bytes());
        buf.bytes.extend_from_slice(&records::MAGIC_UNCOMPRESSED.to_be_bytes());

        // CDR
        buf.at(cdr_off);
        buf.i64(312);
        buf.i32(1);
        buf.off(gdr_off);
        buf.i32(3);
        buf.i32(9);
        buf.i32(if self.little { 6 } else { 1 });
        buf.i32(3);
        buf.i32(0);
        buf.i32(0);
        buf.i32(0);
        buf.i32(2);
        buf.i32(-1);
        buf.name("test fixture");

        // GDR
        buf.at(gdr_off);
        buf.i64(84);
        buf.i32(2);
        buf.off(0);
        buf.off(vdr_offs.first().copied().unwrap_or(0));
        buf.off(adr_off.unwrap_or(0));
        buf.off(eof);
        buf.i32(0);
        buf.i32(if adr_off.is_some() { 1 } else { 0 });
        buf.i32(-1);
        buf.i32(0);
        buf.i32(self.vars.len() as i32);
        buf.off(0);
        buf.i32(0);
        buf.i32(0);
        buf.i32(-1);

        // ADR and its z entries
        if let Some(adr) = adr_off {
            buf.at(adr);
            buf.i64(324);
            buf.i32(4);
            buf.off(0);
            buf.off(0);
            buf.i32(2);
            buf.i32(0);
            buf.i32(0);
            buf.i32(-1);
            buf.i32(0);
            buf.off(aedr_offs[0]);
            buf.i32(fills.len() as i32);
            buf.i32(fills.last().map(|(i, _)| *i as i32).unwrap_or(-1));
            buf.i32(-1);
            buf.name("FILLVAL");
        }

        for (k, (var_num, val)) in fills.iter().enumerate() {
            buf.at(aedr_offs[k]);
            buf.off(56 + val.len());
            buf.i32(9);
            buf.off(aedr_offs.get(k + 1).copied().unwrap_or(0));
            buf.i32(0);
            buf.i32(self.vars[*var_num].data_type);
            buf.i32(*var_num as i32);
            buf.i32(1);
            buf.i32(0);
            buf.i32(0);
            buf.i32(0);
            buf.i32(-1);
            buf.i32(-1);
            buf.bytes.extend_from_slice(val);
        }

        // zVDRs
        for (i, var) in self.vars.iter().enumerate() {
            let (vxr, cpr) = data_offs[i].map(|(v, c, _)| (v, c)).unwrap_or((0, None));
            let mut flags = 0x1;
            if self.compress_vars {
                flags |= 0x4;
            }

            buf.at(vdr_offs[i]);
            buf.off(344 + 8 * var.dims.len());
            buf.i32(8);
            buf.off(vdr_offs.get(i + 1).copied().unwrap_or(0));
            buf.i32(var.data_type);
            buf.i32(var.num_records as i32 - 1);
            buf.off(vxr);
            buf.off(vxr);
            buf.i32(flags);
            buf.i32(0);
            buf.i32(0);
            buf.i32(-1);
            buf.i32(-1);
            buf.i32(1);
            buf.i32(i as i32);
            buf.i64(cpr.map(|c| c as i64).unwrap_or(-1));
            buf.i32(0);
            buf.name(&var.name);
            buf.i32(var.dims.len() as i32);
            for dim in &var.dims {
                buf.i32(*dim as i32);
            }
            for _ in &var.dims {
                buf.i32(-1);
            }
        }

        // Data
        for (i, var) in self.vars.iter().enumerate() {
            let (vxr, cpr, data) = match data_offs[i] {
                Some(offs) => offs,
                None => continue,
            };

            buf.at(vxr);
            buf.i64(44);
            buf.i32(6);
            buf.off(0);
            buf.i32(1);
            buf.i32(1);
            buf.i32(0);
            buf.i32(var.num_records as i32 - 1);
            buf.off(data);

            if let Some(cpr) = cpr {
                buf.at(cpr);
                buf.i64(28);
                buf.i32(11);
                buf.i32(5);
                buf.i32(0);
                buf.i32(1);
                buf.i32(6);

                buf.at(data);
                buf.off(24 + stored[i].len());
                buf.i32(13);
                buf.i32(0);
                buf.off(stored[i].len());
            } else {
                buf.at(data);
                buf.off(12 + stored[i].len());
                buf.i32(7);
            }
            buf.bytes.extend_from_slice(&stored[i]);
        }
        buf.at(eof);

        buf.bytes
    }
}

/// Offsets into a zVDR written by `CdfWriter`.
pub(crate) mod zvdr {
    pub(crate) const MAX_REC: usize = 24;
    pub(crate) const VXR_HEAD: usize = 28;
    pub(crate) const FLAGS: usize = 44;
    pub(crate) const FIRST_DIM: usize = 344;
}

/// Offsets into a VXR written by `CdfWriter`, which holds a single entry.
pub(crate) mod vxr {
    pub(crate) const NEXT: usize = 12;
    pub(crate) const ENTRY_TARGET: usize = 36;
}

/// Find the zVDR of the named variable in the bytes of an uncompressed file.
pub(crate) fn vdr_offset(bytes: &[u8], name: &str) -> usize {
    let mut needle = name.as_bytes().to_vec();
    needle.push(0);
    let at = bytes
        .windows(needle.len())
        .position(|window| window == &needle[..])
        .expect("variable not in file");
    at - 84
}

pub(crate) fn read_i64(bytes: &[u8], at: usize) -> i64 {
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&bytes[at..at + 8]);
    i64::from_be_bytes(raw)
}

pub(crate) fn patch_i32(bytes: &mut [u8], at: usize, val: i32) {
    bytes[at..at + 4].copy_from_slice(&val.to_be_bytes());
}

pub(crate) fn patch_i64(bytes: &mut [u8], at: usize, val: i64) {
    bytes[at..at + 8].copy_from_slice(&val.to_be_bytes());
}
