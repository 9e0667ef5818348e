//! Interval acquisition loop
//!
//! Each interval triggers one sweep, waits for it to finish and copies the resistance and
//! reactance into the interval's column of the pre-allocated result matrices. When a period
//! is configured, intervals start on a fixed schedule measured from the start of the first
//! one. Falling behind that schedule aborts the run.

use std::time::Duration;
use ndarray::{ s, Array2, ShapeBuilder };
use tokio::{
    io::{ AsyncReadExt, AsyncWriteExt },
    time::Instant,
};
use tracing::info;
use crate::{
    cmd::Trace,
    config::SweepConfiguration,
    device::E4990A,
    error::{ Error, Result },
    plot::{ AxisLimits, LivePlot, PlotLimits },
    response::{ FormatError, FormatErrorCause },
};

/// Everything measured over the intervals of one run
#[derive(Debug, Clone, PartialEq)]
pub struct Measurements
{
    /// points x intervals
    pub resistance: Array2<f32>,
    /// points x intervals
    pub reactance: Array2<f32>,
    /// 1 x intervals with bias enabled, otherwise empty
    pub bias_current: Array2<f32>,
    /// 1 x intervals with bias enabled, otherwise empty
    pub bias_voltage: Array2<f32>,
}

impl Measurements
{
    /// Allocates zeroed, column-major matrices of the final size
    pub fn allocate(points: usize, intervals: usize, bias_enabled: bool) -> Self
    {
        let bias_shape = if bias_enabled { (1, intervals) } else { (0, 0) };

        Self {
            resistance: Array2::zeros((points, intervals).f()),
            reactance: Array2::zeros((points, intervals).f()),
            bias_current: Array2::zeros(bias_shape.f()),
            bias_voltage: Array2::zeros(bias_shape.f()),
        }
    }
}

/// Splits a raw data response into reactance (even indices) and resistance (odd indices)
pub fn deinterleave(samples: &[f64], points: usize) -> std::result::Result<(Vec<f32>, Vec<f32>), FormatError>
{
    if samples.len() != 2 * points {
        return Err(FormatError::new(
            "",
            0,
            "Sweep data does not hold two values per point",
            Some(FormatErrorCause::Length { expected: 2 * points, found: samples.len() }),
        ));
    }

    let reactance = samples.iter().step_by(2).map(|value| *value as f32).collect();
    let resistance = samples.iter().skip(1).step_by(2).map(|value| *value as f32).collect();

    Ok((reactance, resistance))
}

/// How long to wait after interval `index` (0 based) so the next one starts on schedule
///
/// Fails when the interval ended after the next one should have started.
pub fn sleep_time(period: Duration, index: usize, elapsed: Duration) -> Result<Duration>
{
    let scheduled = period.saturating_mul(index as u32 + 1);

    scheduled.checked_sub(elapsed).ok_or_else(|| Error::Cadence {
        interval: index + 1,
        behind: elapsed - scheduled,
    })
}

/// Sets up the stimulus, bias and marker ahead of the first interval
pub async fn prepare<T>(device: &mut E4990A<T>, config: &SweepConfiguration) -> Result<()>
    where T: AsyncReadExt + AsyncWriteExt + Unpin + Send
{
    device.set_oscillator_voltage(config.oscillator_voltage).await?;

    if config.bias_enabled() {
        device.enable_bias(config.bias_voltage).await?;
        device.set_dc_measurement(true).await?;
    }
    else {
        device.set_dc_measurement(false).await?;
    }

    device.enable_peak_marker().await
}

async fn plot_limits<T>(device: &mut E4990A<T>) -> Result<PlotLimits>
    where T: AsyncReadExt + AsyncWriteExt + Unpin + Send
{
    let reference_one = device.reference_level(Trace::One).await?;
    let reference_two = device.reference_level(Trace::Two).await?;
    let divisions = device.divisions().await?;
    let per_division_one = device.per_division(Trace::One).await?;
    let per_division_two = device.per_division(Trace::Two).await?;

    Ok(PlotLimits {
        resistance: AxisLimits::from_scale(reference_one, divisions, per_division_one),
        reactance: AxisLimits::from_scale(reference_two, divisions, per_division_two),
    })
}

/// Runs every interval of the configuration and returns the filled measurements
///
/// The instrument must already be configured for a sweep of `points` points and prepared
/// with [`prepare`].
pub async fn acquire<T>(
    device: &mut E4990A<T>,
    config: &SweepConfiguration,
    points: usize,
    mut plot: Option<&mut dyn LivePlot>,
)
    -> Result<Measurements>

    where T: AsyncReadExt + AsyncWriteExt + Unpin + Send
{
    let bias_enabled = config.bias_enabled();
    let mut measurements = Measurements::allocate(points, config.num_intervals, bias_enabled);
    let loop_start = Instant::now();

    for index in 0..config.num_intervals {
        if bias_enabled {
            device.clear_dc_measurement().await?;
        }

        let sweep_start = Instant::now();
        device.trigger_and_wait().await?;
        info!(
            interval = index + 1,
            "Acquisition time is {:.0} ms",
            sweep_start.elapsed().as_secs_f64() * 1e3,
        );

        device.autoscale().await?;
        device.execute_marker_search().await?;

        let samples = device.read_data(points).await?;
        let (reactance, resistance) = deinterleave(&samples, points)?;
        for point in 0..points {
            measurements.reactance[[point, index]] = reactance[point];
            measurements.resistance[[point, index]] = resistance[point];
        }

        if bias_enabled {
            measurements.bias_current[[0, index]] = device.dc_current().await? as f32;
            measurements.bias_voltage[[0, index]] = device.dc_voltage().await? as f32;
        }

        if let Some(plot) = plot.as_deref_mut() {
            let limits = plot_limits(device).await?;
            plot.update(
                measurements.resistance.slice(s![.., index]),
                measurements.reactance.slice(s![.., index]),
                &limits,
            )?;
        }

        if !config.interval_period.is_zero() {
            let sleep = sleep_time(config.interval_period, index, loop_start.elapsed())?;
            info!("Sleeping for {:.2} s", sleep.as_secs_f64());
            tokio::time::sleep(sleep).await;
        }
    }

    Ok(measurements)
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn even_samples_are_reactance()
    {
        let (reactance, resistance) = deinterleave(&[1.0, 10.0, 2.0, 20.0, 3.0, 30.0], 3).unwrap();

        assert_eq!(reactance, vec![1.0, 2.0, 3.0]);
        assert_eq!(resistance, vec![10.0, 20.0, 30.0]);
    }

    #[test]
    fn odd_sample_count_rejected()
    {
        assert!(deinterleave(&[1.0, 10.0, 2.0], 2).is_err());
        assert!(deinterleave(&[1.0, 10.0, 2.0, 20.0], 3).is_err());
    }

    #[test]
    fn schedule_is_absolute()
    {
        let period = Duration::from_secs(2);

        assert_eq!(sleep_time(period, 0, Duration::from_millis(300)).unwrap(), Duration::from_millis(1700));
        assert_eq!(sleep_time(period, 1, Duration::from_millis(2300)).unwrap(), Duration::from_millis(1700));
        assert_eq!(sleep_time(period, 2, Duration::from_secs(6)).unwrap(), Duration::ZERO);
    }

    #[test]
    fn falling_behind_is_fatal()
    {
        let err = sleep_time(Duration::from_secs(2), 0, Duration::from_millis(2500)).unwrap_err();
        assert!(matches!(err, Error::Cadence { interval: 1, behind } if behind == Duration::from_millis(500)));
    }

    #[test]
    fn bias_matrices_follow_bias_state()
    {
        let with_bias = Measurements::allocate(5, 3, true);
        assert_eq!(with_bias.resistance.dim(), (5, 3));
        assert_eq!(with_bias.bias_current.dim(), (1, 3));

        let without_bias = Measurements::allocate(5, 3, false);
        assert_eq!(without_bias.bias_voltage.dim(), (0, 0));
    }
}
