//! Fixture compensation
//!
//! Before a run the open/short compensation state of the fixture is read and the stored
//! compensation data is checked against the configured sweep. The data is only recorded with
//! the results. The instrument applies the compensation itself.

use std::{ fmt, io };
use num_complex::Complex32;
use tokio::io::{ AsyncReadExt, AsyncWriteExt };
use tracing::info;
use crate::{
    cmd::Standard,
    config::SweepConfiguration,
    device::E4990A,
    error::{ Error, Result },
    sweep,
    units::Volt,
};

/// Fixture and compensation state read before the sweep is configured
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompensationStatus
{
    pub fixture: String,
    pub open: bool,
    pub short: bool,
}

impl CompensationStatus
{
    pub async fn read<T>(device: &mut E4990A<T>) -> Result<Self>
        where T: AsyncReadExt + AsyncWriteExt + Unpin + Send
    {
        let status = Self {
            fixture: device.fixture().await?,
            open: device.compensation_enabled(Standard::Open).await?,
            short: device.compensation_enabled(Standard::Short).await?,
        };
        info!("{}", status);

        Ok(status)
    }
}

fn on_off(state: bool) -> &'static str
{
    if state { "ON" } else { "OFF" }
}

impl fmt::Display for CompensationStatus
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        write!(
            f,
            "Fixture: {}, open compensation: {}, short compensation: {}",
            self.fixture,
            on_off(self.open),
            on_off(self.short),
        )
    }
}

/// Compensation state and data recorded with the results
#[derive(Debug, Clone, PartialEq)]
pub struct FixtureCompensation
{
    pub status: CompensationStatus,
    pub open_impedance: Vec<Complex32>,
    pub short_impedance: Vec<Complex32>,
}

/// Checks that the open compensation was measured at exactly the sweep frequencies
///
/// Short compensation frequencies are not available separately and are taken to match.
pub fn check_frequency_axis(
    sweep_points: usize,
    sweep_frequencies: &[f64],
    compensation_points: usize,
    compensation_frequencies: &[f64],
)
    -> Result<()>
{
    if sweep_frequencies.len() != sweep_points {
        return Err(Error::Compensation(format!(
            "the instrument reports {} sweep frequencies but the sweep has {} points",
            sweep_frequencies.len(),
            sweep_points,
        )));
    }

    if sweep_points != compensation_points {
        return Err(Error::Compensation(format!(
            "compensation has {} points but the sweep has {}. Fixture compensation data is not \
             valid for the sweep frequency range",
            compensation_points,
            sweep_points,
        )));
    }

    if sweep_frequencies != compensation_frequencies {
        let first_difference = sweep_frequencies
            .iter()
            .zip(compensation_frequencies.iter())
            .position(|(sweep, compensation)| sweep != compensation);

        let detail = match first_difference {
            Some(index) => format!(
                "point {} is {} Hz in the sweep but {} Hz in the compensation",
                index + 1,
                sweep_frequencies[index],
                compensation_frequencies[index],
            ),
            None => format!(
                "the sweep reports {} frequencies but the compensation reports {}",
                sweep_frequencies.len(),
                compensation_frequencies.len(),
            ),
        };

        return Err(Error::Compensation(format!(
            "{}. Fixture compensation data is not valid for the sweep frequency range",
            detail,
        )));
    }

    Ok(())
}

/// Validates the stored compensation against the configured sweep and reads its data
///
/// Must run after the sweep is configured. Returns the sweep frequencies alongside the
/// compensation data.
pub async fn validate<T>(
    device: &mut E4990A<T>,
    status: CompensationStatus,
    sweep_points: usize,
)
    -> Result<(Vec<f64>, FixtureCompensation)>

    where T: AsyncReadExt + AsyncWriteExt + Unpin + Send
{
    let frequencies = device.frequencies().await?;
    let compensation_frequencies = device.compensation_frequencies().await?;
    let compensation_points = device.compensation_points().await?;

    check_frequency_axis(sweep_points, &frequencies, compensation_points, &compensation_frequencies)?;

    let compensation = FixtureCompensation {
        status: status,
        open_impedance: device.compensation_data(Standard::Open).await?,
        short_impedance: device.compensation_data(Standard::Short).await?,
    };

    Ok((frequencies, compensation))
}

/// Oscillator level for measuring the compensation standards
pub fn collection_oscillator_voltage() -> Volt
{
    Volt::from_f64(0.5)
}

/// Runs the interactive fixture compensation procedure
///
/// The instrument is preset and configured for the sweep. `prompt` is called before each
/// standard is measured and must return once the operator has set up the fixture.
pub async fn collect<T, P>(device: &mut E4990A<T>, config: &SweepConfiguration, mut prompt: P) -> Result<()>
    where T: AsyncReadExt + AsyncWriteExt + Unpin + Send,
          P: FnMut(&str) -> io::Result<()>
{
    device.preset().await?;
    sweep::configure(device, config).await?;
    device.use_user_frequency_points().await?;
    device.set_oscillator_voltage(collection_oscillator_voltage()).await?;

    info!("Starting fixture compensation procedure");

    prompt("Put the test fixture's device contacts in the OPEN state and press [ENTER]")?;
    device.acquire_standard(Standard::Open).await?;
    info!("Open compensation acquired");

    prompt("Put the test fixture's device contacts in the SHORT state and press [ENTER]")?;
    device.acquire_standard(Standard::Short).await?;
    info!("Short compensation acquired");

    Ok(())
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn matching_axis_passes()
    {
        let frequencies = [20.0, 100.0, 1000.0];
        assert!(check_frequency_axis(3, &frequencies, 3, &frequencies).is_ok());
    }

    #[test]
    fn point_count_mismatch()
    {
        let err = check_frequency_axis(3, &[20.0, 100.0, 1000.0], 2, &[20.0, 100.0]).unwrap_err();
        assert!(matches!(err, Error::Compensation(_)));
    }

    #[test]
    fn sweep_frequency_count_must_match_points()
    {
        let frequencies = [20.0, 100.0];
        let err = check_frequency_axis(3, &frequencies, 3, &frequencies).unwrap_err();

        match err {
            Error::Compensation(message) => assert!(message.contains("2 sweep frequencies")),
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn single_frequency_mismatch()
    {
        let err = check_frequency_axis(3, &[20.0, 100.0, 1000.0], 3, &[20.0, 100.5, 1000.0]).unwrap_err();

        match err {
            Error::Compensation(message) => assert!(message.contains("point 2")),
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn status_display()
    {
        let status = CompensationStatus {
            fixture: "FIXT16047E".to_string(),
            open: true,
            short: false,
        };

        assert_eq!(
            &status.to_string(),
            "Fixture: FIXT16047E, open compensation: ON, short compensation: OFF"
        );
    }
}
