//! Acquisition configuration
//!
//! The INI file is read once through a fixed schema. Every field names its section, key and
//! fallback, and is parsed by the typed accessor matching its kind. The result is an
//! immutable [`SweepConfiguration`] which is fully validated before any connection to the
//! instrument is attempted.

use std::{ fmt, path::Path, time::Duration };
use ini::Ini;
use crate::{
    error::{ Error, Result },
    units::{ Hertz, Volt },
};

/// Name of the configuration file looked up when none is given
pub const CONFIG_FILENAME_DEFAULT: &str = "e4990a.ini";

/// Contents written to [`CONFIG_FILENAME_DEFAULT`] when it does not exist yet
pub const TEMPLATE: &str = include_str!("../template.ini");

/// One sub-range of a segmented sweep
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment
{
    pub start: Hertz,
    pub stop: Hertz,
    pub points: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrequencyPlan
{
    Linear
    {
        start: Hertz,
        stop: Hertz,
        points: u32,
    },
    Segmented(Vec<Segment>),
}

impl FrequencyPlan
{
    /// Number of points the plan asks the instrument to acquire per sweep
    pub fn points(&self) -> usize
    {
        match self {
            Self::Linear { points, .. } => *points as usize,
            Self::Segmented(segments) => segments.iter().map(|segment| segment.points as usize).sum(),
        }
    }
}

/// Sweep and acquisition parameters for one run
#[derive(Debug, Clone, PartialEq)]
pub struct SweepConfiguration
{
    pub frequency_plan: FrequencyPlan,
    /// Aperture setting, 1 (fastest) through 5 (most accurate)
    pub measurement_speed: u8,
    pub sweep_averages: u32,
    pub point_averages: u32,
    pub oscillator_voltage: Volt,
    /// Zero disables the bias source for the run
    pub bias_voltage: Volt,
    pub num_intervals: usize,
    /// Spacing between interval starts. Zero disables pacing
    pub interval_period: Duration,
    pub plotting_enabled: bool,
}

impl SweepConfiguration
{
    pub fn bias_enabled(&self) -> bool
    {
        !self.bias_voltage.is_zero()
    }
}

impl fmt::Display for SweepConfiguration
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        writeln!(f, "Acquisition parameters:")?;
        match &self.frequency_plan {
            FrequencyPlan::Linear { start, stop, points } => {
                writeln!(f, "\tStart frequency: {:.3}", view!(start, Kilo))?;
                writeln!(f, "\tStop frequency: {:.3}", view!(stop, Kilo))?;
                writeln!(f, "\tNumber of points: {}", points)?;
            },
            FrequencyPlan::Segmented(segments) => {
                for (index, segment) in segments.iter().enumerate() {
                    writeln!(
                        f,
                        "\tSegment {}: {:.3} to {:.3}, {} points",
                        index + 1,
                        view!(segment.start, Kilo),
                        view!(segment.stop, Kilo),
                        segment.points,
                    )?;
                }
            },
        }
        writeln!(f, "\tMeasurement speed: {}", self.measurement_speed)?;
        writeln!(f, "\tNumber of sweep averages: {}", self.sweep_averages)?;
        writeln!(f, "\tNumber of point averages: {}", self.point_averages)?;
        writeln!(f, "\tOscillator voltage: {}", view!(self.oscillator_voltage))?;
        writeln!(f, "\tBias voltage: {}", view!(self.bias_voltage))?;
        writeln!(f, "\tNumber of intervals: {}", self.num_intervals)?;
        writeln!(f, "\tInterval period: {} seconds", self.interval_period.as_secs_f64())?;
        write!(f, "\tPlotting enabled: {}", self.plotting_enabled)
    }
}

/// Everything read from the configuration file
#[derive(Debug, Clone, PartialEq)]
pub struct Configuration
{
    /// Connect over LAN to this address instead of searching for a USB instrument
    pub ip_address: Option<String>,
    pub sweep: SweepConfiguration,
}

impl Configuration
{
    pub fn load(path: &Path) -> Result<Self>
    {
        let ini = Ini::load_from_file(path).map_err(|source| Error::ConfigFile {
            path: path.display().to_string(),
            source: source,
        })?;

        Self::from_ini(&ini)
    }

    pub fn parse(text: &str) -> Result<Self>
    {
        let ini = Ini::load_from_str(text).map_err(|err| Error::Config(err.to_string()))?;
        Self::from_ini(&ini)
    }

    fn from_ini(ini: &Ini) -> Result<Self>
    {
        if ini.section(Some("sweep")).is_none() {
            return Err(Error::Config("Configuration is missing the [sweep] section".into()));
        }

        let frequency_plan = frequency_plan(ini)?;

        let measurement_speed = MEASUREMENT_SPEED.required_int(ini)?;
        if !(1..=5).contains(&measurement_speed) {
            return Err(MEASUREMENT_SPEED.invalid("must be between 1 and 5"));
        }

        let sweep_averages = positive(&SWEEP_AVERAGES, SWEEP_AVERAGES.required_int(ini)?)?;
        let point_averages = positive(&POINT_AVERAGES, POINT_AVERAGES.required_int(ini)?)?;
        let num_intervals = positive(&NUMBER_OF_INTERVALS, NUMBER_OF_INTERVALS.required_int(ini)?)?;

        let interval_period = INTERVAL_PERIOD.required_float(ini)?;
        if !interval_period.is_finite() || interval_period < 0.0 {
            return Err(INTERVAL_PERIOD.invalid("must be a non-negative number of seconds"));
        }

        let sweep = SweepConfiguration {
            frequency_plan: frequency_plan,
            measurement_speed: measurement_speed as u8,
            sweep_averages: sweep_averages,
            point_averages: point_averages,
            oscillator_voltage: voltage(&OSCILLATOR_VOLTAGE, OSCILLATOR_VOLTAGE.required_float(ini)?)?,
            bias_voltage: voltage(&BIAS_VOLTAGE, BIAS_VOLTAGE.required_float(ini)?)?,
            num_intervals: num_intervals as usize,
            interval_period: Duration::from_secs_f64(interval_period),
            plotting_enabled: PLOTTING_ENABLED.required_bool(ini)?,
        };

        Ok(Self {
            ip_address: IP_ADDRESS.text(ini).map(str::to_owned),
            sweep: sweep,
        })
    }
}

fn frequency_plan(ini: &Ini) -> Result<FrequencyPlan>
{
    let start = START_FREQUENCY.float(ini)?;
    let stop = STOP_FREQUENCY.float(ini)?;
    let points = NUMBER_OF_POINTS.int(ini)?;
    let segments = SEGMENTS.int_list(ini)?;
    let any_linear = start.is_some() || stop.is_some() || points.is_some();

    match segments {
        Some(_) if any_linear => Err(Error::Config(
            "Configuration contains segmented and linear sweep parameters. Define only segments or \
             start_frequency/stop_frequency/number_of_points.".into()
        )),
        Some(values) => {
            if values.is_empty() || values.len() % 3 != 0 {
                return Err(SEGMENTS.invalid("must be a list of start,stop,points triples"));
            }

            let mut segments = Vec::with_capacity(values.len() / 3);
            for triple in values.chunks(3) {
                if triple[2] <= 0 {
                    return Err(SEGMENTS.invalid("every segment needs at least one point"));
                }
                segments.push(Segment {
                    start: frequency(&SEGMENTS, triple[0] as f64)?,
                    stop: frequency(&SEGMENTS, triple[1] as f64)?,
                    points: u32::try_from(triple[2]).map_err(|_| SEGMENTS.invalid("has a segment with too many points"))?,
                });
            }

            Ok(FrequencyPlan::Segmented(segments))
        },
        None => match (start, stop, points) {
            (Some(start), Some(stop), Some(points)) => Ok(FrequencyPlan::Linear {
                start: frequency(&START_FREQUENCY, start)?,
                stop: frequency(&STOP_FREQUENCY, stop)?,
                points: positive(&NUMBER_OF_POINTS, points)?,
            }),
            (None, None, None) => Err(Error::Config(
                "Configuration defines no sweep. Define either segments or \
                 start_frequency/stop_frequency/number_of_points.".into()
            )),
            _ => Err(Error::Config(
                "Linear sweep needs all of start_frequency, stop_frequency and number_of_points".into()
            )),
        },
    }
}

/// Stimulus range common to every E4990A frequency option
const FREQUENCY_MIN: i64 = 20;
const FREQUENCY_MAX: i64 = 120_000_000;

/// Truncates to whole hertz
fn frequency(field: &Field, value: f64) -> Result<Hertz>
{
    let out_of_range = || field.invalid(&format!(
        "must be between {} and {} Hz (found {})", FREQUENCY_MIN, FREQUENCY_MAX, value
    ));

    if !(FREQUENCY_MIN as f64..=FREQUENCY_MAX as f64).contains(&value.trunc()) {
        return Err(out_of_range());
    }

    Hertz::checked_from_f64_truncated(value).ok_or_else(out_of_range)
}

fn voltage(field: &Field, value: f64) -> Result<Volt>
{
    Volt::checked_from_f64(value).ok_or_else(|| field.invalid(&format!("must be a finite number of volts (found {})", value)))
}

fn positive(field: &Field, value: i64) -> Result<u32>
{
    if value < 1 {
        Err(field.invalid("must be a positive integer"))
    }
    else {
        u32::try_from(value).map_err(|_| field.invalid("is too large"))
    }
}

/// One entry of the configuration schema
struct Field
{
    section: &'static str,
    key: &'static str,
    /// Used when the key is missing or empty. `None` makes the key optional, or required when
    /// read through one of the `required_*` accessors.
    fallback: Option<&'static str>,
}

const IP_ADDRESS: Field = Field { section: "resource", key: "ip_address", fallback: None };
const START_FREQUENCY: Field = Field { section: "sweep", key: "start_frequency", fallback: None };
const STOP_FREQUENCY: Field = Field { section: "sweep", key: "stop_frequency", fallback: None };
const NUMBER_OF_POINTS: Field = Field { section: "sweep", key: "number_of_points", fallback: None };
const SEGMENTS: Field = Field { section: "sweep", key: "segments", fallback: None };
const MEASUREMENT_SPEED: Field = Field { section: "sweep", key: "measurement_speed", fallback: Some("1") };
const SWEEP_AVERAGES: Field = Field { section: "sweep", key: "number_of_sweep_averages", fallback: Some("1") };
const POINT_AVERAGES: Field = Field { section: "sweep", key: "number_of_point_averages", fallback: Some("1") };
const OSCILLATOR_VOLTAGE: Field = Field { section: "sweep", key: "oscillator_voltage", fallback: None };
const BIAS_VOLTAGE: Field = Field { section: "sweep", key: "bias_voltage", fallback: None };
const NUMBER_OF_INTERVALS: Field = Field { section: "sweep", key: "number_of_intervals", fallback: None };
const INTERVAL_PERIOD: Field = Field { section: "sweep", key: "interval_period", fallback: None };
const PLOTTING_ENABLED: Field = Field { section: "plotting", key: "enabled", fallback: Some("true") };

impl Field
{
    fn text<'a>(&self, ini: &'a Ini) -> Option<&'a str>
    {
        ini.get_from(Some(self.section), self.key)
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .or(self.fallback)
    }

    fn invalid(&self, reason: &str) -> Error
    {
        Error::Config(format!("[{}] {} {}", self.section, self.key, reason))
    }

    fn missing(&self) -> Error
    {
        Error::Config(format!("[{}] {} is required", self.section, self.key))
    }

    fn float(&self, ini: &Ini) -> Result<Option<f64>>
    {
        self.text(ini)
            .map(|value| value.parse::<f64>().map_err(|err| self.invalid(&format!("is not a number ({})", err))))
            .transpose()
    }

    /// Integers may be written as decimals or in exponent notation, the fraction is dropped
    fn int(&self, ini: &Ini) -> Result<Option<i64>>
    {
        match self.float(ini)? {
            Some(value) if !value.is_finite() => Err(self.invalid(&format!("is not a finite number ({})", value))),
            value => Ok(value.map(|value| value.trunc() as i64)),
        }
    }

    fn int_list(&self, ini: &Ini) -> Result<Option<Vec<i64>>>
    {
        self.text(ini)
            .map(|value| {
                value
                    .split(',')
                    .map(|token| {
                        token
                            .trim()
                            .parse::<f64>()
                            .map_err(|err| self.invalid(&format!("contains '{}' which is not a number ({})", token.trim(), err)))
                            .and_then(|number| {
                                if number.is_finite() {
                                    Ok(number.trunc() as i64)
                                }
                                else {
                                    Err(self.invalid(&format!("contains '{}' which is not finite", token.trim())))
                                }
                            })
                    })
                    .collect::<Result<Vec<i64>>>()
            })
            .transpose()
    }

    fn boolean(&self, ini: &Ini) -> Result<Option<bool>>
    {
        self.text(ini)
            .map(|value| match value.to_ascii_lowercase().as_str() {
                "1" | "yes" | "true" | "on" => Ok(true),
                "0" | "no" | "false" | "off" => Ok(false),
                _ => Err(self.invalid(&format!("is not a boolean ('{}')", value))),
            })
            .transpose()
    }

    fn required_float(&self, ini: &Ini) -> Result<f64>
    {
        self.float(ini)?.ok_or_else(|| self.missing())
    }

    fn required_int(&self, ini: &Ini) -> Result<i64>
    {
        self.int(ini)?.ok_or_else(|| self.missing())
    }

    fn required_bool(&self, ini: &Ini) -> Result<bool>
    {
        self.boolean(ini)?.ok_or_else(|| self.missing())
    }
}

#[cfg(test)]
mod tests
{
    use super::{ Configuration, FrequencyPlan, Segment, TEMPLATE };
    use crate::{ error::Error, units::{ Hertz, Volt } };
    use std::time::Duration;

    const LINEAR: &str = "
[sweep]
start_frequency = 20
stop_frequency = 1e6
number_of_points = 201
oscillator_voltage = 0.5004
bias_voltage = 0
number_of_intervals = 3
interval_period = 2.5
";

    #[test]
    fn linear_sweep_uses_fallbacks()
    {
        let config = Configuration::parse(LINEAR).unwrap();
        let sweep = config.sweep;

        assert_eq!(config.ip_address, None);
        assert_eq!(sweep.frequency_plan, FrequencyPlan::Linear {
            start: Hertz::from_whole(20),
            stop: Hertz::from_whole(1_000_000),
            points: 201,
        });
        assert_eq!(sweep.measurement_speed, 1);
        assert_eq!(sweep.sweep_averages, 1);
        assert_eq!(sweep.point_averages, 1);
        assert_eq!(sweep.oscillator_voltage, Volt::from_f64(0.5));
        assert!(!sweep.bias_enabled());
        assert_eq!(sweep.num_intervals, 3);
        assert_eq!(sweep.interval_period, Duration::from_millis(2500));
        assert!(sweep.plotting_enabled);
    }

    #[test]
    fn segmented_sweep_parses_triples()
    {
        let text = "
[resource]
ip_address = 192.168.1.20

[sweep]
segments = 20,1000,10, 1000,100000,21
oscillator_voltage = 0.5
bias_voltage = -1.25
number_of_intervals = 1
interval_period = 0

[plotting]
enabled = off
";
        let config = Configuration::parse(text).unwrap();

        assert_eq!(config.ip_address.as_deref(), Some("192.168.1.20"));
        assert_eq!(config.sweep.frequency_plan, FrequencyPlan::Segmented(vec![
            Segment { start: Hertz::from_whole(20), stop: Hertz::from_whole(1000), points: 10 },
            Segment { start: Hertz::from_whole(1000), stop: Hertz::from_whole(100_000), points: 21 },
        ]));
        assert_eq!(config.sweep.frequency_plan.points(), 31);
        assert!(config.sweep.bias_enabled());
        assert!(!config.sweep.plotting_enabled);
    }

    #[test]
    fn segmented_and_linear_conflict()
    {
        let text = format!("{}segments = 20,1000,10\n", LINEAR);
        let err = Configuration::parse(&text).unwrap_err();

        assert!(matches!(err, Error::Config(ref message) if message.contains("segmented and linear")));
    }

    #[test]
    fn partial_linear_sweep_rejected()
    {
        let text = LINEAR.replace("number_of_points = 201\n", "");
        assert!(matches!(Configuration::parse(&text), Err(Error::Config(_))));
    }

    #[test]
    fn segments_must_be_triples()
    {
        let text = "
[sweep]
segments = 20,1000
oscillator_voltage = 0.5
bias_voltage = 0
number_of_intervals = 1
interval_period = 0
";
        assert!(matches!(Configuration::parse(text), Err(Error::Config(_))));
    }

    #[test]
    fn measurement_speed_out_of_range()
    {
        let text = format!("{}measurement_speed = 6\n", LINEAR);
        assert!(matches!(Configuration::parse(&text), Err(Error::Config(_))));
    }

    #[test]
    fn negative_interval_period_rejected()
    {
        let text = LINEAR.replace("interval_period = 2.5", "interval_period = -1");
        assert!(matches!(Configuration::parse(&text), Err(Error::Config(_))));
    }

    #[test]
    fn missing_required_key()
    {
        let text = LINEAR.replace("number_of_intervals = 3\n", "");
        let err = Configuration::parse(&text).unwrap_err();

        assert!(matches!(err, Error::Config(ref message) if message.contains("number_of_intervals")));
    }

    #[test]
    fn template_is_valid()
    {
        assert!(Configuration::parse(TEMPLATE).is_ok());
    }

    #[test]
    fn frequency_out_of_range_rejected()
    {
        for value in ["1e17", "inf", "nan", "0", "-100", "10", "1.3e8"] {
            let text = LINEAR.replace("stop_frequency = 1e6", &format!("stop_frequency = {}", value));
            let err = Configuration::parse(&text).unwrap_err();

            assert!(
                matches!(err, Error::Config(ref message) if message.contains("stop_frequency")),
                "stop_frequency = {} gave {:?}", value, err,
            );
        }
    }

    #[test]
    fn frequency_range_is_inclusive()
    {
        let text = LINEAR.replace("stop_frequency = 1e6", "stop_frequency = 1.2e8");
        let config = Configuration::parse(&text).unwrap();

        assert!(matches!(
            config.sweep.frequency_plan,
            FrequencyPlan::Linear { start, stop, .. }
                if start == Hertz::from_whole(20) && stop == Hertz::from_whole(120_000_000)
        ));
    }

    #[test]
    fn segment_frequency_out_of_range_rejected()
    {
        let text = "
[sweep]
segments = 20,1000,10, 1000,1e17,21
oscillator_voltage = 0.5
bias_voltage = 0
number_of_intervals = 1
interval_period = 0
";
        let err = Configuration::parse(text).unwrap_err();
        assert!(matches!(err, Error::Config(ref message) if message.contains("segments")));
    }

    #[test]
    fn voltage_must_be_finite()
    {
        for field in ["bias_voltage = 0", "oscillator_voltage = 0.5004"] {
            for value in ["nan", "inf", "-inf"] {
                let key = field.split(" = ").next().unwrap_or_default();
                let text = LINEAR.replace(field, &format!("{} = {}", key, value));
                let err = Configuration::parse(&text).unwrap_err();

                assert!(matches!(err, Error::Config(ref message) if message.contains(key)), "{} = {}", key, value);
            }
        }
    }

    #[test]
    fn non_finite_integers_rejected()
    {
        let text = LINEAR.replace("number_of_intervals = 3", "number_of_intervals = inf");
        let err = Configuration::parse(&text).unwrap_err();

        assert!(matches!(err, Error::Config(ref message) if message.contains("number_of_intervals")));
    }
}
