//! Reader and writer for numpy `.npy` arrays (optionally gzipped).
//!
//! Supports format versions 1 to 3, little-endian boolean, integer and float
//! dtypes, and Fortran-ordered data (converted to C order on read).

use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::Path;

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;

use super::{is_gzipped, write_atomic};
use crate::error::{BrainrenderError, Result};

const MAGIC: &[u8] = b"\x93NUMPY";

/// Element types that can be read from and written to `.npy` files.
pub trait NpyElement: Copy {
    /// The dtype descriptor written to file headers.
    const DESCR: &'static str;
    /// Converts a decoded value.
    fn from_f64(value: f64) -> Self;
    /// Appends the little-endian encoding of `self`.
    fn write_le(self, out: &mut Vec<u8>);
}

impl NpyElement for f32 {
    const DESCR: &'static str = "<f4";
    #[allow(clippy::cast_possible_truncation)]
    fn from_f64(value: f64) -> Self {
        value as f32
    }
    fn write_le(self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.to_le_bytes());
    }
}

impl NpyElement for f64 {
    const DESCR: &'static str = "<f8";
    fn from_f64(value: f64) -> Self {
        value
    }
    fn write_le(self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.to_le_bytes());
    }
}

impl NpyElement for u32 {
    const DESCR: &'static str = "<u4";
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn from_f64(value: f64) -> Self {
        value as u32
    }
    fn write_le(self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.to_le_bytes());
    }
}

impl NpyElement for i64 {
    const DESCR: &'static str = "<i8";
    #[allow(clippy::cast_possible_truncation)]
    fn from_f64(value: f64) -> Self {
        value as i64
    }
    fn write_le(self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.to_le_bytes());
    }
}

/// An n-dimensional array in C order.
#[derive(Debug, Clone, PartialEq)]
pub struct NpyArray<T> {
    /// Size of each dimension.
    pub shape: Vec<usize>,
    /// Elements in C (row-major) order.
    pub data: Vec<T>,
}

impl<T: NpyElement> NpyArray<T> {
    /// Creates an array, checking that `data` matches `shape`.
    pub fn new(shape: Vec<usize>, data: Vec<T>) -> Result<Self> {
        let expected: usize = shape.iter().product();
        if expected != data.len() {
            return Err(BrainrenderError::SizeMismatch {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self { shape, data })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Bool,
    Int,
    UInt,
    Float,
}

#[derive(Debug, Clone, Copy)]
struct Dtype {
    kind: Kind,
    size: usize,
}

impl Dtype {
    fn parse(descr: &str) -> Result<Self> {
        let unsupported = || BrainrenderError::UnsupportedFormat(format!("npy dtype '{descr}'"));
        let mut chars = descr.chars();
        let order = chars.next().ok_or_else(unsupported)?;
        let kind = match chars.next() {
            Some('b') => Kind::Bool,
            Some('i') => Kind::Int,
            Some('u') => Kind::UInt,
            Some('f') => Kind::Float,
            _ => return Err(unsupported()),
        };
        let size: usize = chars.as_str().parse().map_err(|_| unsupported())?;
        let valid_size = match kind {
            Kind::Bool => size == 1,
            Kind::Int | Kind::UInt => matches!(size, 1 | 2 | 4 | 8),
            Kind::Float => matches!(size, 4 | 8),
        };
        if !valid_size || (order == '>' && size > 1) || !matches!(order, '<' | '>' | '|' | '=') {
            return Err(unsupported());
        }
        Ok(Self { kind, size })
    }

    #[allow(clippy::cast_precision_loss)]
    fn decode(self, bytes: &[u8]) -> f64 {
        let mut buf = [0_u8; 8];
        buf[..self.size].copy_from_slice(bytes);
        match (self.kind, self.size) {
            (Kind::Bool, _) => f64::from(u8::from(bytes[0] != 0)),
            (Kind::Float, 4) => f64::from(f32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]])),
            (Kind::Float, _) => f64::from_le_bytes(buf),
            (Kind::UInt, _) => u64::from_le_bytes(buf) as f64,
            (Kind::Int, size) => {
                // sign-extend from the element width
                let shift = 64 - 8 * size as u32;
                ((i64::from_le_bytes(buf) << shift) >> shift) as f64
            }
        }
    }
}

struct Header {
    dtype: Dtype,
    fortran_order: bool,
    shape: Vec<usize>,
}

fn header_value<'a>(header: &'a str, key: &str) -> Option<&'a str> {
    let start = header.find(&format!("'{key}'"))? + key.len() + 2;
    let rest = header[start..].trim_start().strip_prefix(':')?.trim_start();
    Some(rest)
}

fn parse_header(text: &str) -> Result<Header> {
    let malformed = || BrainrenderError::invalid(format!("malformed npy header: {text}"));

    let descr_value = header_value(text, "descr").ok_or_else(malformed)?;
    let descr = descr_value
        .strip_prefix('\'')
        .and_then(|s| s.split('\'').next())
        .ok_or_else(malformed)?;

    let fortran_value = header_value(text, "fortran_order").ok_or_else(malformed)?;
    let fortran_order = fortran_value.starts_with("True");

    let shape_value = header_value(text, "shape").ok_or_else(malformed)?;
    let inner = shape_value
        .strip_prefix('(')
        .and_then(|s| s.split(')').next())
        .ok_or_else(malformed)?;
    let shape = inner
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<usize>().map_err(|_| malformed()))
        .collect::<Result<Vec<_>>>()?;

    Ok(Header {
        dtype: Dtype::parse(descr)?,
        fortran_order,
        shape,
    })
}

fn fortran_to_c<T: Copy>(shape: &[usize], data: &[T]) -> Vec<T> {
    let mut out = Vec::with_capacity(data.len());
    let mut index = vec![0_usize; shape.len()];
    for _ in 0..data.len() {
        let mut f = 0;
        for d in (0..shape.len()).rev() {
            f = f * shape[d] + index[d];
        }
        out.push(data[f]);
        for d in (0..shape.len()).rev() {
            index[d] += 1;
            if index[d] < shape[d] {
                break;
            }
            index[d] = 0;
        }
    }
    out
}

/// Parses an in-memory `.npy` file.
pub fn parse_npy<T: NpyElement>(bytes: &[u8]) -> Result<NpyArray<T>> {
    if bytes.len() < 10 || !bytes.starts_with(MAGIC) {
        return Err(BrainrenderError::UnsupportedFormat("not an npy file".to_string()));
    }
    let (header_len, header_start) = match bytes[6] {
        1 => (usize::from(u16::from_le_bytes([bytes[8], bytes[9]])), 10),
        2 | 3 if bytes.len() >= 12 => (
            u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]) as usize,
            12,
        ),
        v => {
            return Err(BrainrenderError::UnsupportedFormat(format!(
                "npy format version {v}"
            )))
        }
    };
    let data_start = header_start + header_len;
    let header_bytes = bytes
        .get(header_start..data_start)
        .ok_or_else(|| BrainrenderError::invalid("truncated npy header"))?;
    let header = parse_header(&String::from_utf8_lossy(header_bytes))?;

    let count: usize = header.shape.iter().product();
    let payload = &bytes[data_start..];
    if payload.len() < count * header.dtype.size {
        return Err(BrainrenderError::SizeMismatch {
            expected: count * header.dtype.size,
            actual: payload.len(),
        });
    }
    let data: Vec<T> = payload
        .chunks_exact(header.dtype.size)
        .take(count)
        .map(|chunk| T::from_f64(header.dtype.decode(chunk)))
        .collect();
    let data = if header.fortran_order && header.shape.len() > 1 {
        fortran_to_c(&header.shape, &data)
    } else {
        data
    };
    NpyArray::new(header.shape, data)
}

/// Reads a `.npy` or `.npy.gz` file.
pub fn read_npy<T: NpyElement>(path: impl AsRef<Path>) -> Result<NpyArray<T>> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(BrainrenderError::ResourceMissing(path.to_path_buf()));
    }
    let mut bytes = Vec::new();
    let reader = BufReader::new(File::open(path)?);
    if is_gzipped(path) {
        GzDecoder::new(reader).read_to_end(&mut bytes)?;
    } else {
        let mut reader = reader;
        reader.read_to_end(&mut bytes)?;
    }
    parse_npy(&bytes)
}

/// Serialises an array in format version 1.0.
pub fn encode_npy<T: NpyElement>(array: &NpyArray<T>) -> Vec<u8> {
    let dims: Vec<String> = array.shape.iter().map(ToString::to_string).collect();
    let shape = match dims.len() {
        1 => format!("({},)", dims[0]),
        _ => format!("({})", dims.join(", ")),
    };
    let mut header = format!(
        "{{'descr': '{}', 'fortran_order': False, 'shape': {shape}, }}",
        T::DESCR
    );
    // magic + version + length + header + newline is a multiple of 64
    let unpadded = MAGIC.len() + 4 + header.len() + 1;
    header.push_str(&" ".repeat((64 - unpadded % 64) % 64));
    header.push('\n');

    let mut out = Vec::with_capacity(MAGIC.len() + 4 + header.len() + array.data.len() * 8);
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&[1, 0]);
    let len = u16::try_from(header.len()).unwrap_or(u16::MAX);
    out.extend_from_slice(&len.to_le_bytes());
    out.extend_from_slice(header.as_bytes());
    for &value in &array.data {
        value.write_le(&mut out);
    }
    out
}

/// Writes a `.npy` file, gzipped when the path ends in `.gz`.
pub fn write_npy<T: NpyElement>(path: impl AsRef<Path>, array: &NpyArray<T>) -> Result<()> {
    let path = path.as_ref();
    let bytes = encode_npy(array);
    if is_gzipped(path) {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&bytes)?;
        write_atomic(path, &encoder.finish()?)
    } else {
        write_atomic(path, &bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manual_npy(descr: &str, fortran: bool, shape: &str, payload: &[u8]) -> Vec<u8> {
        let header = format!(
            "{{'descr': '{descr}', 'fortran_order': {}, 'shape': {shape}, }}\n",
            if fortran { "True" } else { "False" }
        );
        let mut bytes = MAGIC.to_vec();
        bytes.extend_from_slice(&[1, 0]);
        bytes.extend_from_slice(&u16::try_from(header.len()).expect("short header").to_le_bytes());
        bytes.extend_from_slice(header.as_bytes());
        bytes.extend_from_slice(payload);
        bytes
    }

    #[test]
    fn test_header_alignment() {
        let array = NpyArray::new(vec![2, 3], vec![0.0_f32; 6]).expect("valid array");
        let bytes = encode_npy(&array);
        let header_len = usize::from(u16::from_le_bytes([bytes[8], bytes[9]]));
        assert_eq!((10 + header_len) % 64, 0);
        assert_eq!(bytes.len(), 10 + header_len + 24);
    }

    #[test]
    fn test_parse_int16_as_f32() {
        let payload: Vec<u8> = [-2_i16, 7, 300].iter().flat_map(|v| v.to_le_bytes()).collect();
        let bytes = manual_npy("<i2", false, "(3,)", &payload);
        let array: NpyArray<f32> = parse_npy(&bytes).expect("valid npy");
        assert_eq!(array.shape, vec![3]);
        assert_eq!(array.data, vec![-2.0, 7.0, 300.0]);
    }

    #[test]
    fn test_fortran_order_is_transposed() {
        // 2x3 matrix [[0, 1, 2], [3, 4, 5]] stored column-major
        let payload: Vec<u8> = [0_u8, 3, 1, 4, 2, 5].to_vec();
        let bytes = manual_npy("|u1", true, "(2, 3)", &payload);
        let array: NpyArray<u32> = parse_npy(&bytes).expect("valid npy");
        assert_eq!(array.data, vec![0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_rejects_unsupported() {
        let bytes = manual_npy("<c16", false, "(1,)", &[0; 16]);
        assert!(matches!(
            parse_npy::<f32>(&bytes),
            Err(BrainrenderError::UnsupportedFormat(_))
        ));
        assert!(parse_npy::<f32>(b"not numpy at all").is_err());
    }

    #[test]
    fn test_file_roundtrip_gz() {
        let dir = std::env::temp_dir().join(format!("brainrender-npy-{}", std::process::id()));
        std::fs::create_dir_all(&dir).expect("temp dir");
        let path = dir.join("grid.npy.gz");
        let array = NpyArray::new(vec![2, 2, 2], (0..8).map(|v| v as u32 * 3).collect())
            .expect("valid array");
        write_npy(&path, &array).expect("write");
        let back: NpyArray<u32> = read_npy(&path).expect("read");
        assert_eq!(back, array);
        let _ = std::fs::remove_dir_all(dir);
    }
}
