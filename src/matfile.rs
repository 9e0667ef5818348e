//! MATLAB level 5 MAT-file output
//!
//! Only the handful of array classes the results need are supported: character arrays,
//! real double and single matrices, complex single matrices and int64 scalars. Everything is
//! written little-endian, uncompressed and column-major.

use std::{
    fs,
    io::{ self, BufWriter, Write },
    path::Path,
};
use byteorder::{ LittleEndian, WriteBytesExt };
use ndarray::{ Array2, ShapeBuilder };
use num_complex::Complex32;
use crate::run::SweepResult;

const HEADER_TEXT_LEN: usize = 116;
const VERSION: u16 = 0x0100;

// data types
const MI_INT8: u32 = 1;
const MI_UINT16: u32 = 4;
const MI_INT32: u32 = 5;
const MI_UINT32: u32 = 6;
const MI_SINGLE: u32 = 7;
const MI_DOUBLE: u32 = 9;
const MI_INT64: u32 = 12;
const MI_MATRIX: u32 = 14;

// array classes
const MX_CHAR_CLASS: u32 = 4;
const MX_DOUBLE_CLASS: u32 = 6;
const MX_SINGLE_CLASS: u32 = 7;
const MX_INT64_CLASS: u32 = 14;

const COMPLEX_FLAG: u32 = 0x0800;

/// A value that can be stored as a MAT variable
#[derive(Debug, Clone, PartialEq)]
pub enum MatValue
{
    /// 1 x N character array, 0 x 0 when empty
    Text(String),
    Double(Array2<f64>),
    Single(Array2<f32>),
    ComplexSingle(Array2<Complex32>),
    Int64(i64),
}

impl MatValue
{
    pub fn double_scalar(value: f64) -> Self
    {
        Self::Double(Array2::from_elem((1, 1), value))
    }

    /// N x 1 column
    pub fn double_column(values: &[f64]) -> Self
    {
        Self::Double(Array2::from_shape_vec((values.len(), 1).f(), values.to_vec()).unwrap_or_default())
    }

    /// 1 x N row
    pub fn complex_row(values: &[Complex32]) -> Self
    {
        Self::ComplexSingle(Array2::from_shape_vec((1, values.len()).f(), values.to_vec()).unwrap_or_default())
    }
}

fn padding(len: usize) -> usize
{
    (8 - len % 8) % 8
}

/// Writes a tagged data element, padded to the next 8 byte boundary
fn write_element<W: Write>(out: &mut W, data_type: u32, data: &[u8]) -> io::Result<()>
{
    out.write_u32::<LittleEndian>(data_type)?;
    out.write_u32::<LittleEndian>(data.len() as u32)?;
    out.write_all(data)?;
    out.write_all(&[0u8; 8][..padding(data.len())])
}

fn encode<T, F>(values: impl Iterator<Item = T>, mut write: F) -> io::Result<Vec<u8>>
    where F: FnMut(&mut Vec<u8>, T) -> io::Result<()>
{
    let mut buf = Vec::new();
    for value in values {
        write(&mut buf, value)?;
    }

    Ok(buf)
}

/// Sequential MAT-file writer
pub struct MatWriter<W: Write>
{
    inner: W,
}

impl <W: Write> MatWriter<W>
{
    /// Writes the 128 byte file header
    pub fn new(mut inner: W, description: &str) -> io::Result<Self>
    {
        let mut text = description.as_bytes().to_vec();
        text.truncate(HEADER_TEXT_LEN);
        text.resize(HEADER_TEXT_LEN, b' ');

        inner.write_all(&text)?;
        // subsystem data offset, unused
        inner.write_all(&[0u8; 8])?;
        inner.write_u16::<LittleEndian>(VERSION)?;
        inner.write_all(b"IM")?;

        Ok(Self { inner: inner })
    }

    pub fn write_variable(&mut self, name: &str, value: &MatValue) -> io::Result<()>
    {
        let (class, dims, real, imag) = match value {
            MatValue::Text(text) => {
                let units: Vec<u16> = text.encode_utf16().collect();
                let dims = if units.is_empty() { [0, 0] } else { [1, units.len()] };
                let real = encode(units.into_iter(), |buf, unit| buf.write_u16::<LittleEndian>(unit))?;
                (MX_CHAR_CLASS, dims, (MI_UINT16, real), None)
            },
            MatValue::Double(array) => {
                let (rows, cols) = array.dim();
                let real = encode(array.t().iter().copied(), |buf, value| buf.write_f64::<LittleEndian>(value))?;
                (MX_DOUBLE_CLASS, [rows, cols], (MI_DOUBLE, real), None)
            },
            MatValue::Single(array) => {
                let (rows, cols) = array.dim();
                let real = encode(array.t().iter().copied(), |buf, value| buf.write_f32::<LittleEndian>(value))?;
                (MX_SINGLE_CLASS, [rows, cols], (MI_SINGLE, real), None)
            },
            MatValue::ComplexSingle(array) => {
                let (rows, cols) = array.dim();
                let real = encode(array.t().iter(), |buf, value| buf.write_f32::<LittleEndian>(value.re))?;
                let imag = encode(array.t().iter(), |buf, value| buf.write_f32::<LittleEndian>(value.im))?;
                (MX_SINGLE_CLASS | COMPLEX_FLAG, [rows, cols], (MI_SINGLE, real), Some((MI_SINGLE, imag)))
            },
            MatValue::Int64(value) => {
                let real = value.to_le_bytes().to_vec();
                (MX_INT64_CLASS, [1, 1], (MI_INT64, real), None)
            },
        };

        let mut body = Vec::new();

        let mut flags = Vec::with_capacity(8);
        flags.write_u32::<LittleEndian>(class)?;
        flags.write_u32::<LittleEndian>(0)?;
        write_element(&mut body, MI_UINT32, &flags)?;

        let dims = encode(dims.iter(), |buf, dim| buf.write_i32::<LittleEndian>(*dim as i32))?;
        write_element(&mut body, MI_INT32, &dims)?;

        write_element(&mut body, MI_INT8, name.as_bytes())?;
        write_element(&mut body, real.0, &real.1)?;
        if let Some((data_type, data)) = imag {
            write_element(&mut body, data_type, &data)?;
        }

        write_element(&mut self.inner, MI_MATRIX, &body)
    }

    pub fn into_inner(self) -> W
    {
        self.inner
    }
}

/// Variables of a result file, in the order they are written
pub fn variables(result: &SweepResult) -> Vec<(&'static str, MatValue)>
{
    let config = &result.config;
    let status = &result.compensation.status;

    vec![
        ("time", MatValue::Text(result.metadata.timestamp.clone())),
        ("idn", MatValue::Text(result.metadata.idn.clone())),
        ("acqProgramVersion", MatValue::Text(result.metadata.program_version.clone())),
        ("biasVoltage", MatValue::double_scalar(config.bias_voltage.as_f64())),
        ("biasCurrentMeasurement", MatValue::Single(result.measurements.bias_current.clone())),
        ("biasVoltageMeasurement", MatValue::Single(result.measurements.bias_voltage.clone())),
        ("oscillatorVoltage", MatValue::double_scalar(config.oscillator_voltage.as_f64())),
        ("measurementSpeed", MatValue::Int64(config.measurement_speed as i64)),
        ("numberOfSweepAverages", MatValue::Int64(config.sweep_averages as i64)),
        ("numberOfPointAverages", MatValue::Int64(config.point_averages as i64)),
        ("openCmpStatus", MatValue::Int64(status.open as i64)),
        ("shortCmpStatus", MatValue::Int64(status.short as i64)),
        ("fixture", MatValue::Text(status.fixture.clone())),
        ("FixtureCmpOpenImpedance", MatValue::complex_row(&result.compensation.open_impedance)),
        ("FixtureCmpShortImpedance", MatValue::complex_row(&result.compensation.short_impedance)),
        ("Frequency", MatValue::double_column(&result.frequencies)),
        ("X", MatValue::Single(result.measurements.reactance.clone())),
        ("R", MatValue::Single(result.measurements.resistance.clone())),
    ]
}

/// Writes the result file, creating its directory if needed
pub fn save(path: &Path, result: &SweepResult) -> io::Result<()>
{
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let description = format!(
        "MATLAB 5.0 MAT-file, Platform: {}, Created on: {}",
        std::env::consts::OS,
        result.metadata.timestamp,
    );
    let mut writer = MatWriter::new(BufWriter::new(fs::File::create(path)?), &description)?;

    for (name, value) in variables(result).iter() {
        writer.write_variable(name, value)?;
    }

    writer.into_inner().flush()
}

#[cfg(test)]
mod tests
{
    use super::*;
    use byteorder::{ ByteOrder, LittleEndian };

    fn written(name: &str, value: &MatValue) -> Vec<u8>
    {
        let mut writer = MatWriter::new(Vec::new(), "MATLAB 5.0 MAT-file").unwrap();
        writer.write_variable(name, value).unwrap();
        writer.into_inner()
    }

    #[test]
    fn header_layout()
    {
        let bytes = MatWriter::new(Vec::new(), "MATLAB 5.0 MAT-file").unwrap().into_inner();

        assert_eq!(bytes.len(), 128);
        assert!(bytes.starts_with(b"MATLAB 5.0 MAT-file "));
        assert_eq!(LittleEndian::read_u16(&bytes[124..126]), 0x0100);
        assert_eq!(&bytes[126..128], b"IM");
    }

    #[test]
    fn elements_are_aligned()
    {
        let bytes = written("fixture", &MatValue::Text("FIXT16047E".to_string()));
        let body = &bytes[128..];

        assert_eq!(body.len() % 8, 0);
        assert_eq!(LittleEndian::read_u32(&body[0..4]), MI_MATRIX);
        assert_eq!(LittleEndian::read_u32(&body[4..8]) as usize, body.len() - 8);
    }

    #[test]
    fn matrix_is_column_major()
    {
        let array = Array2::from_shape_vec((2, 2), vec![1.0f32, 2.0, 3.0, 4.0]).unwrap();
        let bytes = written("R", &MatValue::Single(array));
        let body = &bytes[136..];

        // flags, dims (2 x 2), name "R" padded to 8, then the data element
        assert_eq!(LittleEndian::read_u32(&body[0..4]), MI_UINT32);
        assert_eq!(LittleEndian::read_u32(&body[8..12]), MX_SINGLE_CLASS);
        assert_eq!(LittleEndian::read_i32(&body[24..28]), 2);
        assert_eq!(LittleEndian::read_i32(&body[28..32]), 2);
        assert_eq!(&body[40..41], b"R");
        assert_eq!(LittleEndian::read_u32(&body[48..52]), MI_SINGLE);
        assert_eq!(LittleEndian::read_u32(&body[52..56]), 16);

        let mut data = [0f32; 4];
        LittleEndian::read_f32_into(&body[56..72], &mut data);
        assert_eq!(data, [1.0, 3.0, 2.0, 4.0]);
    }

    #[test]
    fn complex_sets_flag()
    {
        let bytes = written("FixtureCmpOpenImpedance", &MatValue::complex_row(&[Complex32::new(1.0, -1.0)]));
        let flags = LittleEndian::read_u32(&bytes[136 + 8..136 + 12]);

        assert_eq!(flags, MX_SINGLE_CLASS | COMPLEX_FLAG);
    }

    #[test]
    fn empty_text_is_zero_by_zero()
    {
        let bytes = written("idn", &MatValue::Text(String::new()));
        let body = &bytes[136..];

        assert_eq!(LittleEndian::read_i32(&body[24..28]), 0);
        assert_eq!(LittleEndian::read_i32(&body[28..32]), 0);
    }
}
