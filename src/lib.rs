//! Sweep acquisition for the Keysight E4990A impedance analyzer
//!
//! The analyzer is driven over its SCPI interface to run a linear or segmented frequency sweep
//! a fixed number of times, optionally at a fixed period. Resistance and reactance of every
//! sweep are collected together with the instrument identity, the fixture compensation data and
//! the acquisition settings, and saved as a MATLAB level 5 MAT-file.
//!
//! # Example
//! ```no_run
//! use e4990a::{ config::Configuration, context::RunContext, device::E4990A, resource, run };
//!
//! # async fn example() -> e4990a::error::Result<()> {
//! let config = Configuration::load("e4990a.ini".as_ref())?;
//! let context = RunContext::capture();
//! let connection = resource::discover(config.ip_address.as_deref())?.open().await?;
//!
//! run::acquire_to_file(E4990A::with(connection), &config.sweep, &context, "data.mat".as_ref()).await?;
//! # Ok(())
//! # }
//! ```

#[macro_use]
pub mod units;

pub mod acquisition;
pub mod cmd;
pub mod compensation;
pub mod config;
pub mod context;
pub mod device;
pub mod error;
pub mod matfile;
pub mod plot;
pub mod resource;
pub mod response;
pub mod run;
pub mod sweep;

mod executor;

pub use config::{ Configuration, SweepConfiguration };
pub use device::E4990A;
pub use error::{ Error, Result };
