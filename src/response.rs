//! Instrument response parsing
//!
//! Responses are single lines of comma separated tokens. Errors point at the offending token
//! so a malformed reply can be located in the debug log.

use std::fmt;
use num_complex::Complex32;
use thiserror::Error;

/// A description of the underlying cause of the parsing failure, if any
#[derive(Debug, Error)]
pub enum FormatErrorCause
{
    /// The response holds a different number of tokens than expected
    #[error("expected {expected} values, found {found}")]
    Length
    {
        expected: usize,
        found: usize,
    },
    /// Expected a decimal value
    #[error("caused by: {0}")]
    InvalidDecimal(#[from] std::num::ParseFloatError),
    /// Expected one of a fixed set of values
    ///
    /// The contained string describes which values were expected.
    #[error("unexpected or invalid variant. {0}")]
    InvalidEnum(&'static str),
}

/// A parsing error caused by a response of unexpected or invalid format
#[derive(Debug)]
pub struct FormatError
{
    /// The line returned by the device, without its terminator
    pub raw_data: String,
    /// Which token the error occurred at. Indexed from 1, 0 when the response as a whole is at fault
    token: usize,
    mesg: &'static str,
    maybe_cause: Option<FormatErrorCause>,
}

impl FormatError
{
    pub(crate) fn new(raw_data: &str, token: usize, mesg: &'static str, maybe_cause: Option<FormatErrorCause>) -> Self
    {
        Self {
            raw_data: raw_data.to_owned(),
            token: token,
            mesg: mesg,
            maybe_cause: maybe_cause,
        }
    }

    pub fn token(&self) -> usize
    {
        self.token
    }
}

impl fmt::Display for FormatError
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        if self.token == 0 {
            write!(f, "{}", self.mesg)?;
        }
        else {
            write!(f, "At token {}: {}", self.token, self.mesg)?;
        }

        if let Some(cause) = &self.maybe_cause {
            write!(f, ", {}", cause)?;
        }

        write!(f, " (response: {:?})", self.raw_data)
    }
}

impl std::error::Error for FormatError {}

fn tokens(raw: &str) -> impl Iterator<Item = &str>
{
    raw.trim().split(',').map(str::trim)
}

/// Parses a comma separated list of numbers
pub fn parse_values(raw: &str) -> Result<Vec<f64>, FormatError>
{
    if raw.trim().is_empty() {
        return Ok(Vec::new());
    }

    tokens(raw)
        .enumerate()
        .map(|(index, token)| {
            token.parse::<f64>().map_err(|err| {
                FormatError::new(raw, index + 1, "Expected a number", Some(err.into()))
            })
        })
        .collect()
}

/// Parses a list of numbers which must hold exactly `expected` values
pub fn parse_values_exact(raw: &str, expected: usize) -> Result<Vec<f64>, FormatError>
{
    let values = parse_values(raw)?;

    if values.len() != expected {
        Err(FormatError::new(
            raw,
            0,
            "Unexpected response length",
            Some(FormatErrorCause::Length { expected: expected, found: values.len() }),
        ))
    }
    else {
        Ok(values)
    }
}

pub fn parse_scalar(raw: &str) -> Result<f64, FormatError>
{
    let values = parse_values_exact(raw, 1)?;
    Ok(values[0])
}

/// Parses an integer, tolerating the instrument's habit of replying `+2.01000000000E+002`
pub fn parse_int(raw: &str) -> Result<i64, FormatError>
{
    parse_scalar(raw).map(|value| value.trunc() as i64)
}

pub fn parse_count(raw: &str) -> Result<usize, FormatError>
{
    let value = parse_int(raw)?;
    usize::try_from(value).map_err(|_| {
        FormatError::new(raw, 1, "Expected a count", Some(FormatErrorCause::InvalidEnum("count must not be negative")))
    })
}

pub fn parse_bool(raw: &str) -> Result<bool, FormatError>
{
    match raw.trim() {
        "1" | "+1" => Ok(true),
        "0" | "+0" => Ok(false),
        _ => Err(FormatError::new(raw, 1, "Expected a boolean", Some(FormatErrorCause::InvalidEnum("expected 0 or 1")))),
    }
}

/// Pairs interleaved real and imaginary parts into complex values
pub fn parse_complex(raw: &str) -> Result<Vec<Complex32>, FormatError>
{
    let values = parse_values(raw)?;

    if values.len() % 2 != 0 {
        return Err(FormatError::new(
            raw,
            values.len(),
            "Complex data holds an unpaired real part",
            None,
        ));
    }

    Ok(values
        .chunks_exact(2)
        .map(|pair| Complex32::new(pair[0] as f32, pair[1] as f32))
        .collect())
}
