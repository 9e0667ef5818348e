//! Crate-wide error type

use std::{ io, time::Duration };
use thiserror::Error;
use crate::response::FormatError;

/// Everything that can abort a run
///
/// None of these are retried. The run stops and no output file is written.
#[derive(Debug, Error)]
pub enum Error
{
    #[error("No USB instruments found")]
    NoInstrument,
    #[error("Multiple USB instruments found: {}", .0.join(", "))]
    MultipleInstruments(Vec<String>),
    #[error("Unable to connect to {resource}")]
    Connect
    {
        resource: String,
        #[source]
        source: io::Error,
    },
    #[error("{0}")]
    Config(String),
    #[error("Unable to read configuration file {path}")]
    ConfigFile
    {
        path: String,
        #[source]
        source: ini::Error,
    },
    /// The instrument disagrees with the configured number of segment points
    #[error("Number of configured points ({configured}) does not match the number reported by the instrument ({reported})")]
    SegmentPoints
    {
        configured: usize,
        reported: usize,
    },
    #[error("Fixture compensation mismatch: {0}")]
    Compensation(String),
    /// The sweep and its bookkeeping took longer than the pacing period allows
    #[error("The interval_period is too short: interval {interval} finished {behind:?} behind schedule")]
    Cadence
    {
        interval: usize,
        behind: Duration,
    },
    /// A query was sent as a plain command or the other way around
    #[error("`{command}` {reason}")]
    CommandKind
    {
        command: String,
        reason: &'static str,
    },
    #[error("Instrument did not respond within {0:?}")]
    Timeout(Duration),
    #[error("Malformed instrument response")]
    Response(#[from] FormatError),
    #[error("Instrument response is not valid UTF-8")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("Unable to draw plot: {0}")]
    Plot(String),
}

pub type Result<T> = std::result::Result<T, Error>;
