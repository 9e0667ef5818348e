//! Device handle and APIs
//!
//! [`E4990A`] wraps an open I/O stream and provides the high-level RPCs used for sweep
//! configuration, compensation checks and acquisition. Each RPC is a short, fixed exchange of
//! SCPI commands. Queries share the timeout given when the handle is built.
//!
//! # Cancel Safety
//! **The device RPCs are not cancel safe.** Dropping a future halfway through an RPC may leave a
//! response unread and desynchronize every later query.

use std::time::Duration;
use num_complex::Complex32;
use tokio::io::{ AsyncReadExt, AsyncWriteExt };
use crate::{
    cmd::{ CmdSet, Standard, Trace },
    error::Result,
    executor::Executor,
    response,
    units::Volt,
};

/// Longer than any single sweep the instrument can be configured for
pub const QUERY_TIMEOUT: Duration = Duration::from_millis(15_000);

/// Handle to a Keysight E4990A impedance analyzer
pub struct E4990A<T>
{
    executor: Executor<T>,
}

impl <T> E4990A<T>
    where T: AsyncReadExt + AsyncWriteExt + Unpin + Send
{
    pub fn with(io_handle: T) -> Self
    {
        Self::with_timeout(io_handle, QUERY_TIMEOUT)
    }

    pub fn with_timeout(io_handle: T, timeout: Duration) -> Self
    {
        Self {
            executor: Executor::with("\n", io_handle, timeout),
        }
    }

    /// Sends a command without a response. Queries are refused with
    /// [`CommandKind`](crate::error::Error::CommandKind).
    pub async fn send(&mut self, cmd: CmdSet) -> Result<()>
    {
        self.executor.exec_cmd(&cmd).await
    }

    pub async fn send_all(&mut self, cmds: &[CmdSet]) -> Result<()>
    {
        self.executor.exec_all(cmds).await
    }

    /// Sends a query and returns its response line. Plain commands are refused.
    pub async fn query(&mut self, cmd: CmdSet) -> Result<String>
    {
        self.executor.query(&cmd).await
    }

    async fn query_scalar(&mut self, cmd: CmdSet) -> Result<f64>
    {
        let response = self.executor.query(&cmd).await?;
        Ok(response::parse_scalar(&response)?)
    }

    async fn query_count(&mut self, cmd: CmdSet) -> Result<usize>
    {
        let response = self.executor.query(&cmd).await?;
        Ok(response::parse_count(&response)?)
    }

    async fn query_values(&mut self, cmd: CmdSet) -> Result<Vec<f64>>
    {
        let response = self.executor.query(&cmd).await?;
        Ok(response::parse_values(&response)?)
    }

    /// Manufacturer, model, serial number and firmware revision
    pub async fn identify(&mut self) -> Result<String>
    {
        self.query(CmdSet::Identify).await
    }

    /// Installed options, e.g. the frequency range and DC bias options
    pub async fn options(&mut self) -> Result<String>
    {
        self.query(CmdSet::Options).await
    }

    pub async fn clear_status(&mut self) -> Result<()>
    {
        self.send(CmdSet::ClearStatus).await
    }

    /// Returns the instrument to its power-on state
    pub async fn preset(&mut self) -> Result<()>
    {
        self.send(CmdSet::Preset).await
    }

    /// Blocks until every pending operation has finished
    pub async fn wait_complete(&mut self) -> Result<()>
    {
        self.query(CmdSet::OperationComplete).await?;
        Ok(())
    }

    pub async fn fixture(&mut self) -> Result<String>
    {
        self.query(CmdSet::Fixture).await
    }

    /// Whether the open or short fixture compensation is applied to measurements
    pub async fn compensation_enabled(&mut self, standard: Standard) -> Result<bool>
    {
        let response = self.query(CmdSet::CompensationState(standard)).await?;
        Ok(response::parse_bool(&response)?)
    }

    /// Number of points in the segment table, as computed by the instrument
    pub async fn segment_points(&mut self) -> Result<usize>
    {
        self.query_count(CmdSet::SegmentPoints).await
    }

    /// Stimulus frequencies of the configured sweep in hertz
    pub async fn frequencies(&mut self) -> Result<Vec<f64>>
    {
        self.query_values(CmdSet::FrequencyData).await
    }

    pub async fn compensation_frequencies(&mut self) -> Result<Vec<f64>>
    {
        self.query_values(CmdSet::CompensationFrequencies).await
    }

    pub async fn compensation_points(&mut self) -> Result<usize>
    {
        self.query_count(CmdSet::CompensationPoints).await
    }

    /// Measured impedance of a compensation standard at each compensation frequency
    pub async fn compensation_data(&mut self, standard: Standard) -> Result<Vec<Complex32>>
    {
        let response = self.query(CmdSet::CompensationData(standard)).await?;
        Ok(response::parse_complex(&response)?)
    }

    pub async fn set_oscillator_voltage(&mut self, voltage: Volt) -> Result<()>
    {
        self.send_all(&[CmdSet::OscillatorVoltageMode, CmdSet::OscillatorVoltage(voltage)]).await
    }

    /// Sets the bias level and switches the bias source on
    pub async fn enable_bias(&mut self, voltage: Volt) -> Result<()>
    {
        self.send_all(&[
            CmdSet::BiasVoltageMode,
            CmdSet::BiasVoltage(voltage),
            CmdSet::BiasOutput(true),
        ]).await
    }

    pub async fn disable_bias(&mut self) -> Result<()>
    {
        self.send(CmdSet::BiasOutput(false)).await
    }

    pub async fn set_dc_measurement(&mut self, enabled: bool) -> Result<()>
    {
        self.send(CmdSet::DcMeasurement(enabled)).await
    }

    pub async fn clear_dc_measurement(&mut self) -> Result<()>
    {
        self.send(CmdSet::ClearDcMeasurement).await
    }

    /// DC bias current monitor reading in amperes
    pub async fn dc_current(&mut self) -> Result<f64>
    {
        self.query_scalar(CmdSet::DcCurrent).await
    }

    /// DC bias voltage monitor reading in volts
    pub async fn dc_voltage(&mut self) -> Result<f64>
    {
        self.query_scalar(CmdSet::DcVoltage).await
    }

    /// Turns on marker 1 and sets it to search for the peak
    pub async fn enable_peak_marker(&mut self) -> Result<()>
    {
        self.send_all(&[CmdSet::Marker, CmdSet::PeakSearch]).await
    }

    pub async fn execute_marker_search(&mut self) -> Result<()>
    {
        self.send(CmdSet::ExecuteMarkerSearch).await
    }

    /// Triggers one sweep and waits for it to finish
    pub async fn trigger_and_wait(&mut self) -> Result<()>
    {
        self.send(CmdSet::TriggerSingle).await?;
        self.wait_complete().await
    }

    pub async fn autoscale(&mut self) -> Result<()>
    {
        self.send_all(&[CmdSet::Autoscale(Trace::One), CmdSet::Autoscale(Trace::Two)]).await
    }

    /// Reads the last sweep as `2 * points` interleaved values
    pub async fn read_data(&mut self, points: usize) -> Result<Vec<f64>>
    {
        let response = self.query(CmdSet::ReadData).await?;
        Ok(response::parse_values_exact(&response, 2 * points)?)
    }

    /// Number of vertical divisions of the display window
    pub async fn divisions(&mut self) -> Result<f64>
    {
        self.query_scalar(CmdSet::Divisions).await
    }

    pub async fn reference_level(&mut self, trace: Trace) -> Result<f64>
    {
        self.query_scalar(CmdSet::ReferenceLevel(trace)).await
    }

    /// Value of one vertical division of a trace
    pub async fn per_division(&mut self, trace: Trace) -> Result<f64>
    {
        self.query_scalar(CmdSet::PerDivision(trace)).await
    }

    /// Uses the sweep frequencies for fixture compensation instead of the fixed defaults
    pub async fn use_user_frequency_points(&mut self) -> Result<()>
    {
        self.send(CmdSet::UserFrequencyPoints).await
    }

    /// Measures a compensation standard and waits for the measurement to finish
    pub async fn acquire_standard(&mut self, standard: Standard) -> Result<()>
    {
        self.send(CmdSet::AcquireStandard(standard)).await?;
        self.wait_complete().await
    }

    /// Closes the connection. The handle cannot be used afterwards.
    pub async fn close(self) -> Result<()>
    {
        self.executor.close().await
    }
}
