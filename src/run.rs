//! Run orchestration
//!
//! A sweep run walks the instrument through identification, sweep configuration,
//! compensation checks and the interval loop. Whatever happens, the bias source is switched
//! off and the connection closed before the result is written.

use std::{ io, path::Path };
use tokio::io::{ AsyncReadExt, AsyncWriteExt };
use tracing::{ info, warn };
use crate::{
    acquisition::{ self, Measurements },
    compensation::{ self, CompensationStatus, FixtureCompensation },
    config::SweepConfiguration,
    context::{ self, RunContext },
    device::E4990A,
    error::Result,
    matfile,
    plot::{ LivePlot, SvgPlot },
    sweep,
};

/// Identification of the run recorded with the data
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Metadata
{
    pub timestamp: String,
    pub idn: String,
    pub options: String,
    pub program_version: String,
}

/// Everything a successful run hands to the result writer
#[derive(Debug, Clone, PartialEq)]
pub struct SweepResult
{
    pub metadata: Metadata,
    pub config: SweepConfiguration,
    pub compensation: FixtureCompensation,
    /// Stimulus frequencies in hertz
    pub frequencies: Vec<f64>,
    pub measurements: Measurements,
}

/// Runs a full acquisition on an open instrument
///
/// Leaves the bias source in whatever state the run reached. Callers must switch it off, as
/// [`acquire_to_file`] does.
pub async fn run_sweep<T>(
    device: &mut E4990A<T>,
    config: &SweepConfiguration,
    context: &RunContext,
    mut plot: Option<&mut dyn LivePlot>,
)
    -> Result<SweepResult>

    where T: AsyncReadExt + AsyncWriteExt + Unpin + Send
{
    info!("Acquisition program version: {}", context.program_version);
    let idn = device.identify().await?;
    info!("{}", idn);
    let options = device.options().await?;
    info!("Options installed: {}", options);
    info!("{}", config);

    device.clear_status().await?;
    let status = CompensationStatus::read(device).await?;

    let points = sweep::configure(device, config).await?;
    let (frequencies, compensation) = compensation::validate(device, status, points).await?;

    acquisition::prepare(device, config).await?;

    if let Some(plot) = plot.as_deref_mut() {
        plot.start(&frequencies)?;
    }
    let measurements = acquisition::acquire(device, config, points, plot).await?;

    Ok(SweepResult {
        metadata: Metadata {
            timestamp: context.iso_timestamp(),
            idn: idn,
            options: options,
            program_version: context.program_version.clone(),
        },
        config: config.clone(),
        compensation: compensation,
        frequencies: frequencies,
        measurements: measurements,
    })
}

/// Runs a sweep, releases the instrument and writes the result to `output`
///
/// The bias source is switched off and the connection closed on every path. The file is
/// only written when the sweep itself succeeded.
pub async fn acquire_to_file<T>(
    mut device: E4990A<T>,
    config: &SweepConfiguration,
    context: &RunContext,
    output: &Path,
)
    -> Result<SweepResult>

    where T: AsyncReadExt + AsyncWriteExt + Unpin + Send
{
    let mut svg_plot = SvgPlot::new(&context::plot_path(output));
    let plot: Option<&mut dyn LivePlot> = if config.plotting_enabled {
        info!("Plotting to {}", svg_plot.path().display());
        Some(&mut svg_plot)
    }
    else {
        None
    };

    let outcome = run_sweep(&mut device, config, context, plot).await;

    let bias_off = device.disable_bias().await;
    if let Err(err) = &bias_off {
        warn!("Unable to switch the bias source off: {}", err);
    }
    let closed = device.close().await;

    let result = outcome?;
    matfile::save(output, &result)?;
    info!("Data saved to \"{}\"", output.display());

    bias_off?;
    closed?;

    Ok(result)
}

/// Runs the interactive fixture compensation procedure and closes the connection
pub async fn run_fixture_compensation<T, P>(mut device: E4990A<T>, config: &SweepConfiguration, prompt: P) -> Result<()>
    where T: AsyncReadExt + AsyncWriteExt + Unpin + Send,
          P: FnMut(&str) -> io::Result<()>
{
    let outcome = compensation::collect(&mut device, config, prompt).await;
    let closed = device.close().await;

    outcome?;
    closed
}
