//! Sweep configuration
//!
//! The configuration is first compiled into a [`SweepProgram`], an ordered list of commands,
//! which is then sent to the instrument. For segmented sweeps the instrument's own point
//! count is checked between the two halves of the program so that a rejected segment table
//! stops the run before anything else is sent.

use tokio::io::{ AsyncReadExt, AsyncWriteExt };
use tracing::{ debug, info };
use crate::{
    cmd::{ CmdSet, Parameter, SegmentTable, SweepType, Trace },
    config::{ FrequencyPlan, SweepConfiguration },
    device::E4990A,
    error::{ Error, Result },
};

#[derive(Debug, Clone, PartialEq)]
pub struct SweepProgram
{
    /// Commands sent before the point count is verified
    pub setup: Vec<CmdSet>,
    /// Commands sent after the point count is verified
    pub finish: Vec<CmdSet>,
    /// Number of points the configuration asks for
    pub points: usize,
    /// Whether the instrument must confirm `points` before `finish` is sent
    pub verify_points: bool,
}

impl SweepProgram
{
    pub fn compile(config: &SweepConfiguration) -> Self
    {
        let mut setup = vec![
            CmdSet::ContinuousInitiate,
            CmdSet::BusTrigger,
            CmdSet::DefineParameter(Trace::One, Parameter::Resistance),
            CmdSet::DefineParameter(Trace::Two, Parameter::Reactance),
        ];
        let mut finish = Vec::with_capacity(8);

        let verify_points = match &config.frequency_plan {
            FrequencyPlan::Segmented(segments) => {
                setup.push(CmdSet::SweepType(SweepType::Segmented));
                setup.push(CmdSet::SegmentData(SegmentTable(segments.clone())));
                finish.push(CmdSet::LinearXAxis);
                true
            },
            FrequencyPlan::Linear { start, stop, points } => {
                setup.push(CmdSet::SweepType(SweepType::Linear));
                setup.push(CmdSet::StartFrequency(*start));
                setup.push(CmdSet::StopFrequency(*stop));
                setup.push(CmdSet::SweepPoints(*points));
                false
            },
        };

        finish.push(CmdSet::PointAverageCount(config.point_averages));
        finish.push(CmdSet::PointAveraging);
        finish.push(CmdSet::Aperture(config.measurement_speed));

        if config.sweep_averages > 1 {
            finish.push(CmdSet::TriggerAveraging);
            finish.push(CmdSet::SweepAveraging(true));
            finish.push(CmdSet::SweepAverageCount(config.sweep_averages));
        }
        else {
            finish.push(CmdSet::SweepAveraging(false));
        }

        Self {
            setup: setup,
            finish: finish,
            points: config.frequency_plan.points(),
            verify_points: verify_points,
        }
    }

    /// Sends the program and returns the number of points per sweep
    ///
    /// Leaves the instrument bus triggered and continuously initiated. No sweep is taken.
    pub async fn run<T>(&self, device: &mut E4990A<T>) -> Result<usize>
        where T: AsyncReadExt + AsyncWriteExt + Unpin + Send
    {
        device.send_all(&self.setup).await?;

        if self.verify_points {
            let reported = device.segment_points().await?;
            debug!(configured = self.points, reported, "segment points");

            if reported != self.points {
                return Err(Error::SegmentPoints {
                    configured: self.points,
                    reported: reported,
                });
            }
        }

        device.send_all(&self.finish).await?;
        info!(points = self.points, "sweep configured");

        Ok(self.points)
    }
}

/// Configures the instrument for the sweep and returns the number of points per sweep
pub async fn configure<T>(device: &mut E4990A<T>, config: &SweepConfiguration) -> Result<usize>
    where T: AsyncReadExt + AsyncWriteExt + Unpin + Send
{
    SweepProgram::compile(config).run(device).await
}
