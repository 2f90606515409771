//! Module image binary format (`spec.md` §6.1): header, name table,
//! constant pool, function table, exports table. Endian-neutral:
//! integers little-endian, reals IEEE 754 little-endian. Grounded in
//! the teacher's `Script` byte-oriented reader pattern, generalized
//! from a single flat opcode stream to EEL's four-section image.

use std::convert::TryInto;

use crate::error::{EelError, EelResult};
use crate::value::Value;

pub const MAGIC: &[u8; 4] = b"EELI";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Version {
    pub major: u16,
    pub minor: u16,
    pub micro: u16,
}

/// One decoded constant-pool entry. Object constants are limited to
/// strings (`spec.md` §6.1: "for strings, the payload is a reference
/// into the name table") — any richer constant is built by bytecode
/// at load time instead.
#[derive(Debug, Clone, PartialEq)]
pub enum ImageConstant {
    Nil,
    Boolean(bool),
    Integer(i32),
    Real(f64),
    StringRef(u32),
}

#[derive(Debug, Clone)]
pub struct ImageFunction {
    /// Index into the name table, or `None` for an anonymous function.
    pub name_index: Option<u32>,
    pub reqargs: u8,
    pub optargs: u8,
    /// 0 = no trailing tuple; otherwise the tuple's element-group size.
    pub tuparg: u8,
    pub results: u8,
    pub num_registers: u32,
    pub code: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct ImageExport {
    pub name_index: u32,
    pub function_index: u32,
}

#[derive(Debug, Clone)]
pub struct Image {
    pub version: Version,
    pub names: Vec<String>,
    pub constants: Vec<ImageConstant>,
    pub functions: Vec<ImageFunction>,
    pub exports: Vec<ImageExport>,
}

struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    fn new() -> Self {
        Writer { buf: Vec::new() }
    }
    fn u8(&mut self, v: u8) {
        self.buf.push(v);
    }
    fn u16(&mut self, v: u16) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }
    fn u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }
    fn i32(&mut self, v: i32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }
    fn f64(&mut self, v: f64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }
    fn bytes(&mut self, v: &[u8]) {
        self.u32(v.len() as u32);
        self.buf.extend_from_slice(v);
    }
    fn str(&mut self, v: &str) {
        self.bytes(v.as_bytes());
    }
}

pub fn write_image(image: &Image) -> Vec<u8> {
    let mut w = Writer::new();
    w.buf.extend_from_slice(MAGIC);
    w.u16(image.version.major);
    w.u16(image.version.minor);
    w.u16(image.version.micro);

    w.u32(image.names.len() as u32);
    for name in &image.names {
        w.str(name);
    }

    w.u32(image.constants.len() as u32);
    for c in &image.constants {
        match c {
            ImageConstant::Nil => w.u8(0),
            ImageConstant::Boolean(b) => {
                w.u8(1);
                w.u8(*b as u8);
            }
            ImageConstant::Integer(i) => {
                w.u8(2);
                w.i32(*i);
            }
            ImageConstant::Real(r) => {
                w.u8(3);
                w.f64(*r);
            }
            ImageConstant::StringRef(idx) => {
                w.u8(4);
                w.u32(*idx);
            }
        }
    }

    w.u32(image.functions.len() as u32);
    for f in &image.functions {
        w.u32(f.name_index.unwrap_or(u32::MAX));
        w.u8(f.reqargs);
        w.u8(f.optargs);
        w.u8(f.tuparg);
        w.u8(f.results);
        w.u32(f.num_registers);
        w.bytes(&f.code);
    }

    w.u32(image.exports.len() as u32);
    for e in &image.exports {
        w.u32(e.name_index);
        w.u32(e.function_index);
    }

    w.buf
}

struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn u8(&mut self) -> EelResult<u8> {
        let b = *self.data.get(self.pos).ok_or_else(EelError::wrong_format)?;
        self.pos += 1;
        Ok(b)
    }
    fn u16(&mut self) -> EelResult<u16> {
        let slice = self.take(2)?;
        Ok(u16::from_le_bytes(slice.try_into().unwrap()))
    }
    fn u32(&mut self) -> EelResult<u32> {
        let slice = self.take(4)?;
        Ok(u32::from_le_bytes(slice.try_into().unwrap()))
    }
    fn i32(&mut self) -> EelResult<i32> {
        let slice = self.take(4)?;
        Ok(i32::from_le_bytes(slice.try_into().unwrap()))
    }
    fn f64(&mut self) -> EelResult<f64> {
        let slice = self.take(8)?;
        Ok(f64::from_le_bytes(slice.try_into().unwrap()))
    }
    fn take(&mut self, n: usize) -> EelResult<&'a [u8]> {
        let end = self.pos + n;
        let slice = self.data.get(self.pos..end).ok_or_else(EelError::wrong_format)?;
        self.pos = end;
        Ok(slice)
    }
    fn bytes(&mut self) -> EelResult<&'a [u8]> {
        let len = self.u32()? as usize;
        self.take(len)
    }
    fn string(&mut self) -> EelResult<String> {
        let b = self.bytes()?;
        String::from_utf8(b.to_vec()).map_err(|_| EelError::wrong_format())
    }
}

pub fn read_image(data: &[u8]) -> EelResult<Image> {
    let mut r = Reader { data, pos: 0 };
    let magic = r.take(4)?;
    if magic != MAGIC {
        return Err(EelError::wrong_format());
    }
    let version = Version {
        major: r.u16()?,
        minor: r.u16()?,
        micro: r.u16()?,
    };

    let name_count = r.u32()?;
    let mut names = Vec::with_capacity(name_count as usize);
    for _ in 0..name_count {
        names.push(r.string()?);
    }

    let const_count = r.u32()?;
    let mut constants = Vec::with_capacity(const_count as usize);
    for _ in 0..const_count {
        let tag = r.u8()?;
        constants.push(match tag {
            0 => ImageConstant::Nil,
            1 => ImageConstant::Boolean(r.u8()? != 0),
            2 => ImageConstant::Integer(r.i32()?),
            3 => ImageConstant::Real(r.f64()?),
            4 => ImageConstant::StringRef(r.u32()?),
            _ => return Err(EelError::wrong_format()),
        });
    }

    let func_count = r.u32()?;
    let mut functions = Vec::with_capacity(func_count as usize);
    for _ in 0..func_count {
        let name_index = r.u32()?;
        let reqargs = r.u8()?;
        let optargs = r.u8()?;
        let tuparg = r.u8()?;
        let results = r.u8()?;
        let num_registers = r.u32()?;
        let code = r.bytes()?.to_vec();
        functions.push(ImageFunction {
            name_index: if name_index == u32::MAX { None } else { Some(name_index) },
            reqargs,
            optargs,
            tuparg,
            results,
            num_registers,
            code,
        });
    }

    let export_count = r.u32()?;
    let mut exports = Vec::with_capacity(export_count as usize);
    for _ in 0..export_count {
        exports.push(ImageExport {
            name_index: r.u32()?,
            function_index: r.u32()?,
        });
    }

    Ok(Image { version, names, constants, functions, exports })
}

/// Resolve a decoded [`ImageConstant`] into a runtime [`Value`],
/// interning string references through the VM's string pool.
pub fn resolve_constant(vm: &mut crate::vm::Vm, names: &[String], c: &ImageConstant) -> EelResult<Value> {
    Ok(match c {
        ImageConstant::Nil => Value::Nil,
        ImageConstant::Boolean(b) => Value::Boolean(*b),
        ImageConstant::Integer(i) => Value::Integer(*i),
        ImageConstant::Real(r) => Value::Real(*r),
        ImageConstant::StringRef(idx) => {
            let name = names.get(*idx as usize).ok_or_else(EelError::wrong_index)?;
            Value::ObjRef(vm.intern_string(name.as_bytes()))
        }
    })
}
