//! Device command definition and serialization
//!
//! Every command the program sends to the analyzer is a variant of [`CmdSet`]. Its `Display`
//! implementation produces the exact SCPI text, without the line terminator.

use std::fmt;
use crate::{
    config::Segment,
    units::{ Hertz, Volt },
};

/// One of the two display traces
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trace
{
    One,
    Two,
}

impl Trace
{
    fn number(&self) -> u8
    {
        match self {
            Self::One => 1,
            Self::Two => 2,
        }
    }
}

/// Measurement parameter assigned to a trace
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parameter
{
    Resistance,
    Reactance,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepType
{
    Linear,
    Segmented,
}

/// Which fixture compensation standard a command refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Standard
{
    Open,
    Short,
}

impl Standard
{
    fn mnemonic(&self) -> &'static str
    {
        match self {
            Self::Open => "OPEN",
            Self::Short => "SHOR",
        }
    }
}

/// Segment sweep table
///
/// Sent as `7,0,0,0,0,0,0,0,<count>,<start>,<stop>,<points>,...` where the leading fields are
/// the table format version and the per-segment setting flags, all disabled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentTable(pub Vec<Segment>);

impl fmt::Display for SegmentTable
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        write!(f, "7,0,0,0,0,0,0,0,{}", self.0.len())?;
        for segment in self.0.iter() {
            write!(
                f,
                ",{},{},{}",
                view_anon!(segment.start),
                view_anon!(segment.stop),
                segment.points,
            )?;
        }

        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CmdSet
{
    /// Command: `*IDN?`
    Identify,
    /// Command: `*OPT?`
    Options,
    /// Command: `*CLS`
    ClearStatus,
    /// Blocks until all pending operations, such as a triggered sweep, are complete
    ///
    /// Command: `*OPC?`
    OperationComplete,
    /// Command: `:SYST:PRES`
    Preset,
    /// Command: `:SENS:FIXT:SEL?`
    Fixture,
    /// Whether a fixture compensation standard is applied
    ///
    /// Command: `:SENS1:CORR2:<OPEN|SHOR>?`
    CompensationState(Standard),
    /// Command: `:INIT1:CONT ON`
    ContinuousInitiate,
    /// Command: `:TRIG:SOUR BUS`
    BusTrigger,
    /// Command: `:CALC1:PAR<1|2>:DEF <R|X>`
    DefineParameter(Trace, Parameter),
    /// Command: `:SENS1:SWE:TYPE <LIN|SEGM>`
    SweepType(SweepType),
    /// Command: `:SENS1:SEGM:DATA <table>`
    SegmentData(SegmentTable),
    /// Total points of the segment table as computed by the instrument
    ///
    /// Command: `:SENS1:SEGM:SWE:POIN?`
    SegmentPoints,
    /// Command: `:DISP:WIND1:X:SPAC LIN`
    LinearXAxis,
    /// Command: `:SENS1:FREQ:START <hz>`
    StartFrequency(Hertz),
    /// Command: `:SENS1:FREQ:STOP <hz>`
    StopFrequency(Hertz),
    /// Command: `:SENS1:SWE:POIN <n>`
    SweepPoints(u32),
    /// Command: `:SENS1:AVER:COUN <n>`
    PointAverageCount(u32),
    /// Command: `:SENS1:AVER:STAT ON`
    PointAveraging,
    /// Command: `:SENS1:APER:TIME <1-5>`
    Aperture(u8),
    /// Command: `:TRIG:SEQ:AVER ON`
    TriggerAveraging,
    /// Command: `:CALC1:AVER <ON|OFF>`
    SweepAveraging(bool),
    /// Command: `:CALC1:AVER:COUN <n>`
    SweepAverageCount(u32),
    /// Stimulus frequencies of the current sweep
    ///
    /// Command: `:SENS1:FREQ:DATA?`
    FrequencyData,
    /// Command: `:SENS1:CORR2:ZME:OPEN:FREQ?`
    CompensationFrequencies,
    /// Command: `:SENS1:CORR2:ZME:OPEN:POIN?`
    CompensationPoints,
    /// Command: `:SENS1:CORR2:ZME:<OPEN|SHOR>:DATA?`
    CompensationData(Standard),
    /// Command: `:SOUR1:MODE VOLT`
    OscillatorVoltageMode,
    /// Command: `:SOUR1:VOLT <v>`
    OscillatorVoltage(Volt),
    /// Command: `:SOUR1:BIAS:MODE VOLT`
    BiasVoltageMode,
    /// Command: `:SOUR1:BIAS:VOLT <v>`
    BiasVoltage(Volt),
    /// Command: `:SOUR:BIAS:STAT <ON|OFF>`
    BiasOutput(bool),
    /// Command: `:SENS1:DC:MEAS:ENAB <ON|OFF>`
    DcMeasurement(bool),
    /// Command: `:SENS1:DC:MEAS:CLE`
    ClearDcMeasurement,
    /// Command: `:SENS1:DC:MEAS:DATA:DCI?`
    DcCurrent,
    /// Command: `:SENS1:DC:MEAS:DATA:DCV?`
    DcVoltage,
    /// Command: `:CALC1:MARK1 ON`
    Marker,
    /// Command: `:CALC1:MARK1:FUNC:TYPE PEAK`
    PeakSearch,
    /// Command: `:CALC1:MARK1:FUNC:EXEC`
    ExecuteMarkerSearch,
    /// Command: `:TRIG:SING`
    TriggerSingle,
    /// Command: `:DISP:WIND1:TRAC<1|2>:Y:AUTO`
    Autoscale(Trace),
    /// Interleaved data of the primary and secondary parameters
    ///
    /// Command: `:CALC1:DATA:RDAT?`
    ReadData,
    /// Command: `:DISP:WIND1:TRAC<1|2>:Y:RLEV?`
    ReferenceLevel(Trace),
    /// Command: `:DISP:WIND1:Y:DIV?`
    Divisions,
    /// Command: `:DISP:WIND1:TRAC<1|2>:Y:PDIV?`
    PerDivision(Trace),
    /// Command: `:SENS1:CORR:COLL:FPO USER`
    UserFrequencyPoints,
    /// Measure a compensation standard at the user frequency points
    ///
    /// Command: `:SENS1:CORR2:COLL:ACQ:<OPEN|SHOR>`
    AcquireStandard(Standard),
}

impl CmdSet
{
    /// Whether the instrument answers this command with a response line
    pub fn is_query(&self) -> bool
    {
        match self {
            Self::Identify
            | Self::Options
            | Self::OperationComplete
            | Self::Fixture
            | Self::CompensationState(_)
            | Self::SegmentPoints
            | Self::FrequencyData
            | Self::CompensationFrequencies
            | Self::CompensationPoints
            | Self::CompensationData(_)
            | Self::DcCurrent
            | Self::DcVoltage
            | Self::ReadData
            | Self::ReferenceLevel(_)
            | Self::Divisions
            | Self::PerDivision(_) => true,
            _ => false,
        }
    }
}

fn on_off(state: bool) -> &'static str
{
    if state { "ON" } else { "OFF" }
}

impl fmt::Display for CmdSet
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        match self {
            Self::Identify => write!(f, "*IDN?"),
            Self::Options => write!(f, "*OPT?"),
            Self::ClearStatus => write!(f, "*CLS"),
            Self::OperationComplete => write!(f, "*OPC?"),
            Self::Preset => write!(f, ":SYST:PRES"),
            Self::Fixture => write!(f, ":SENS:FIXT:SEL?"),
            Self::CompensationState(standard) => write!(f, ":SENS1:CORR2:{}?", standard.mnemonic()),
            Self::ContinuousInitiate => write!(f, ":INIT1:CONT ON"),
            Self::BusTrigger => write!(f, ":TRIG:SOUR BUS"),
            Self::DefineParameter(trace, parameter) => write!(
                f,
                ":CALC1:PAR{}:DEF {}",
                trace.number(),
                match parameter {
                    Parameter::Resistance => 'R',
                    Parameter::Reactance => 'X',
                }
            ),
            Self::SweepType(sweep_type) => write!(
                f,
                ":SENS1:SWE:TYPE {}",
                match sweep_type {
                    SweepType::Linear => "LIN",
                    SweepType::Segmented => "SEGM",
                }
            ),
            Self::SegmentData(table) => write!(f, ":SENS1:SEGM:DATA {}", table),
            Self::SegmentPoints => write!(f, ":SENS1:SEGM:SWE:POIN?"),
            Self::LinearXAxis => write!(f, ":DISP:WIND1:X:SPAC LIN"),
            Self::StartFrequency(hertz) => write!(f, ":SENS1:FREQ:START {}", view_anon!(hertz)),
            Self::StopFrequency(hertz) => write!(f, ":SENS1:FREQ:STOP {}", view_anon!(hertz)),
            Self::SweepPoints(points) => write!(f, ":SENS1:SWE:POIN {}", points),
            Self::PointAverageCount(count) => write!(f, ":SENS1:AVER:COUN {}", count),
            Self::PointAveraging => write!(f, ":SENS1:AVER:STAT ON"),
            Self::Aperture(speed) => write!(f, ":SENS1:APER:TIME {}", speed),
            Self::TriggerAveraging => write!(f, ":TRIG:SEQ:AVER ON"),
            Self::SweepAveraging(state) => write!(f, ":CALC1:AVER {}", on_off(*state)),
            Self::SweepAverageCount(count) => write!(f, ":CALC1:AVER:COUN {}", count),
            Self::FrequencyData => write!(f, ":SENS1:FREQ:DATA?"),
            Self::CompensationFrequencies => write!(f, ":SENS1:CORR2:ZME:OPEN:FREQ?"),
            Self::CompensationPoints => write!(f, ":SENS1:CORR2:ZME:OPEN:POIN?"),
            Self::CompensationData(standard) => write!(f, ":SENS1:CORR2:ZME:{}:DATA?", standard.mnemonic()),
            Self::OscillatorVoltageMode => write!(f, ":SOUR1:MODE VOLT"),
            Self::OscillatorVoltage(volts) => write!(f, ":SOUR1:VOLT {}", view_anon!(volts)),
            Self::BiasVoltageMode => write!(f, ":SOUR1:BIAS:MODE VOLT"),
            Self::BiasVoltage(volts) => write!(f, ":SOUR1:BIAS:VOLT {}", view_anon!(volts)),
            Self::BiasOutput(state) => write!(f, ":SOUR:BIAS:STAT {}", on_off(*state)),
            Self::DcMeasurement(state) => write!(f, ":SENS1:DC:MEAS:ENAB {}", on_off(*state)),
            Self::ClearDcMeasurement => write!(f, ":SENS1:DC:MEAS:CLE"),
            Self::DcCurrent => write!(f, ":SENS1:DC:MEAS:DATA:DCI?"),
            Self::DcVoltage => write!(f, ":SENS1:DC:MEAS:DATA:DCV?"),
            Self::Marker => write!(f, ":CALC1:MARK1 ON"),
            Self::PeakSearch => write!(f, ":CALC1:MARK1:FUNC:TYPE PEAK"),
            Self::ExecuteMarkerSearch => write!(f, ":CALC1:MARK1:FUNC:EXEC"),
            Self::TriggerSingle => write!(f, ":TRIG:SING"),
            Self::Autoscale(trace) => write!(f, ":DISP:WIND1:TRAC{}:Y:AUTO", trace.number()),
            Self::ReadData => write!(f, ":CALC1:DATA:RDAT?"),
            Self::ReferenceLevel(trace) => write!(f, ":DISP:WIND1:TRAC{}:Y:RLEV?", trace.number()),
            Self::Divisions => write!(f, ":DISP:WIND1:Y:DIV?"),
            Self::PerDivision(trace) => write!(f, ":DISP:WIND1:TRAC{}:Y:PDIV?", trace.number()),
            Self::UserFrequencyPoints => write!(f, ":SENS1:CORR:COLL:FPO USER"),
            Self::AcquireStandard(standard) => write!(f, ":SENS1:CORR2:COLL:ACQ:{}", standard.mnemonic()),
        }
    }
}
