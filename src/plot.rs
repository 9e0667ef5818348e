//! Live plot of the latest sweep
//!
//! The acquisition loop pushes each finished sweep through [`LivePlot`]. The shipped
//! [`SvgPlot`] redraws a two-axis chart on disk after every interval so it can be watched with
//! any viewer that reloads the file.

use std::{ ops::Range, path::{ Path, PathBuf } };
use ndarray::ArrayView1;
use plotters::prelude::*;
use crate::error::{ Error, Result };

/// Vertical range of a trace as currently shown on the instrument display
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisLimits
{
    pub lower: f64,
    pub upper: f64,
}

impl AxisLimits
{
    /// Derives the visible range from the reference level at the center of the display
    pub fn from_scale(reference_level: f64, divisions: f64, per_division: f64) -> Self
    {
        let half_span = divisions / 2.0 * per_division;

        Self {
            lower: reference_level - half_span,
            upper: reference_level + half_span,
        }
    }

    fn range(&self) -> Range<f64>
    {
        if self.upper > self.lower {
            self.lower..self.upper
        }
        else {
            (self.lower - 1.0)..(self.lower + 1.0)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlotLimits
{
    pub resistance: AxisLimits,
    pub reactance: AxisLimits,
}

pub trait LivePlot
{
    /// Called once before the first sweep with the stimulus frequencies in hertz
    fn start(&mut self, frequencies: &[f64]) -> Result<()>;

    /// Shows one sweep, replacing the previous one
    fn update(&mut self, resistance: ArrayView1<f32>, reactance: ArrayView1<f32>, limits: &PlotLimits) -> Result<()>;
}

const RESISTANCE_COLOR: RGBColor = RGBColor(255, 127, 14);
const REACTANCE_COLOR: RGBColor = RGBColor(31, 119, 180);

/// Two-axis line chart written as an SVG file
pub struct SvgPlot
{
    path: PathBuf,
    frequencies_khz: Vec<f64>,
    size: (u32, u32),
}

impl SvgPlot
{
    pub fn new(path: &Path) -> Self
    {
        Self {
            path: path.to_path_buf(),
            frequencies_khz: Vec::new(),
            size: (960, 540),
        }
    }

    pub fn path(&self) -> &Path
    {
        &self.path
    }

    fn frequency_range(&self) -> Range<f64>
    {
        let lower = self.frequencies_khz.first().copied().unwrap_or(0.0);
        let upper = self.frequencies_khz.last().copied().unwrap_or(1.0);

        if upper > lower {
            lower..upper
        }
        else {
            (lower - 1.0)..(lower + 1.0)
        }
    }

    fn draw(&self, resistance: ArrayView1<f32>, reactance: ArrayView1<f32>, limits: &PlotLimits)
        -> std::result::Result<(), Box<dyn std::error::Error>>
    {
        let root = SVGBackend::new(&self.path, self.size).into_drawing_area();
        root.fill(&WHITE)?;

        let mut chart = ChartBuilder::on(&root)
            .margin(12)
            .x_label_area_size(40)
            .y_label_area_size(60)
            .right_y_label_area_size(60)
            .build_cartesian_2d(self.frequency_range(), limits.resistance.range())?
            .set_secondary_coord(self.frequency_range(), limits.reactance.range());

        chart
            .configure_mesh()
            .x_desc("Frequency [kHz]")
            .y_desc("R [\u{03A9}]")
            .axis_desc_style(("sans-serif", 16).into_font().color(&RESISTANCE_COLOR))
            .draw()?;

        chart
            .configure_secondary_axes()
            .y_desc("X [\u{03A9}]")
            .axis_desc_style(("sans-serif", 16).into_font().color(&REACTANCE_COLOR))
            .draw()?;

        chart.draw_series(LineSeries::new(
            self.frequencies_khz.iter().zip(resistance.iter()).map(|(x, y)| (*x, *y as f64)),
            &RESISTANCE_COLOR,
        ))?;

        chart.draw_secondary_series(LineSeries::new(
            self.frequencies_khz.iter().zip(reactance.iter()).map(|(x, y)| (*x, *y as f64)),
            &REACTANCE_COLOR,
        ))?;

        root.present()?;

        Ok(())
    }
}

impl LivePlot for SvgPlot
{
    fn start(&mut self, frequencies: &[f64]) -> Result<()>
    {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        self.frequencies_khz = frequencies.iter().map(|hertz| hertz / 1e3).collect();
        Ok(())
    }

    fn update(&mut self, resistance: ArrayView1<f32>, reactance: ArrayView1<f32>, limits: &PlotLimits) -> Result<()>
    {
        self.draw(resistance, reactance, limits)
            .map_err(|err| Error::Plot(err.to_string()))
    }
}
