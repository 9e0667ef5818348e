//! Simulated analyzer answering the subset of SCPI the acquisition program uses

#![allow(dead_code)]

use byteorder::{ ByteOrder, LittleEndian };
use std::{
    path::PathBuf,
    sync::{ Arc, Mutex },
    time::Duration,
};
use tokio::{
    io::{ duplex, AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream },
    task::JoinHandle,
    time::Instant,
};

pub const IDN: &str = "Keysight Technologies,E4990A,MY54100000,A.02.12";

#[derive(Debug, Clone)]
pub struct Settings
{
    /// How long `*OPC?` blocks after a triggered sweep
    pub sweep_time: Duration,
    /// Overrides the point count the instrument reports for a segment table
    pub segment_points: Option<usize>,
    /// Overrides the number of compensation points
    pub compensation_points: Option<usize>,
    /// Overrides the compensation frequencies
    pub compensation_frequencies: Option<Vec<f64>>,
    /// Sweep frequencies the instrument reports, 1 kHz steps when unset
    pub sweep_frequencies: Option<Vec<f64>>,
}

impl Default for Settings
{
    fn default() -> Self
    {
        Self {
            sweep_time: Duration::from_millis(100),
            segment_points: None,
            compensation_points: None,
            compensation_frequencies: None,
            sweep_frequencies: None,
        }
    }
}

pub type Log = Vec<(Instant, String)>;

pub struct Simulator
{
    log: Arc<Mutex<Log>>,
    handle: JoinHandle<()>,
}

impl Simulator
{
    /// Waits for the client to close the connection and returns every received line
    pub async fn finish(self) -> Log
    {
        self.handle.await.unwrap();
        let log = self.log.lock().unwrap();
        log.clone()
    }
}

pub fn commands(log: &Log) -> Vec<String>
{
    log.iter().map(|(_, line)| line.clone()).collect()
}

/// Frequencies the simulated sweep is taken at
pub fn sweep_frequencies(points: usize) -> Vec<f64>
{
    (0..points).map(|index| 1000.0 * (index + 1) as f64).collect()
}

/// Reactance the simulated sweep reports at a point
pub fn reactance_at(point: usize) -> f32
{
    -(point as f32) - 0.5
}

/// Resistance the simulated sweep reports at a point
pub fn resistance_at(point: usize) -> f32
{
    1000.0 + point as f32
}

fn join(values: impl Iterator<Item = f64>) -> String
{
    values.map(|value| value.to_string()).collect::<Vec<_>>().join(",")
}

struct State
{
    settings: Settings,
    points: usize,
    triggered: bool,
}

impl State
{
    fn respond(&mut self, line: &str) -> Option<String>
    {
        if let Some(points) = line.strip_prefix(":SENS1:SWE:POIN ") {
            self.points = points.trim().parse().unwrap();
        }
        else if let Some(table) = line.strip_prefix(":SENS1:SEGM:DATA ") {
            let fields: Vec<usize> = table.split(',').map(|field| field.trim().parse().unwrap()).collect();
            self.points = fields[9..].chunks(3).map(|segment| segment[2]).sum();
        }
        else if line == ":TRIG:SING" {
            self.triggered = true;
        }

        if !line.ends_with('?') {
            return None;
        }

        let response = match line {
            "*IDN?" => IDN.to_string(),
            "*OPT?" => "001,120".to_string(),
            "*OPC?" => "1".to_string(),
            ":SENS:FIXT:SEL?" => "FIXT16047E".to_string(),
            ":SENS1:CORR2:OPEN?" => "1".to_string(),
            ":SENS1:CORR2:SHOR?" => "0".to_string(),
            ":SENS1:SEGM:SWE:POIN?" => self.settings.segment_points.unwrap_or(self.points).to_string(),
            ":SENS1:FREQ:DATA?" => join(
                self.settings
                    .sweep_frequencies
                    .clone()
                    .unwrap_or_else(|| sweep_frequencies(self.points))
                    .into_iter()
            ),
            ":SENS1:CORR2:ZME:OPEN:FREQ?" => join(
                self.settings
                    .compensation_frequencies
                    .clone()
                    .unwrap_or_else(|| sweep_frequencies(self.points))
                    .into_iter()
            ),
            ":SENS1:CORR2:ZME:OPEN:POIN?" => self.settings.compensation_points.unwrap_or(self.points).to_string(),
            ":SENS1:CORR2:ZME:OPEN:DATA?" => join((0..self.points).flat_map(|_| [1e6, -2e3])),
            ":SENS1:CORR2:ZME:SHOR:DATA?" => join((0..self.points).flat_map(|_| [0.05, 0.25])),
            ":SENS1:DC:MEAS:DATA:DCI?" => "0.0015".to_string(),
            ":SENS1:DC:MEAS:DATA:DCV?" => "1.25".to_string(),
            ":CALC1:DATA:RDAT?" => join((0..self.points).flat_map(|point| {
                [reactance_at(point) as f64, resistance_at(point) as f64]
            })),
            ":DISP:WIND1:TRAC1:Y:RLEV?" | ":DISP:WIND1:TRAC2:Y:RLEV?" => "10".to_string(),
            ":DISP:WIND1:Y:DIV?" => "10".to_string(),
            ":DISP:WIND1:TRAC1:Y:PDIV?" | ":DISP:WIND1:TRAC2:Y:PDIV?" => "2".to_string(),
            _ => "0".to_string(),
        };

        Some(response)
    }
}

/// Starts a simulated analyzer and returns the client end of its connection
pub fn spawn(settings: Settings) -> (DuplexStream, Simulator)
{
    let (client, server) = duplex(1 << 16);
    let log = Arc::new(Mutex::new(Vec::new()));
    let server_log = log.clone();

    let handle = tokio::spawn(async move {
        let (read_half, mut write_half) = tokio::io::split(server);
        let mut lines = BufReader::new(read_half).lines();
        let mut state = State {
            settings: settings,
            points: 0,
            triggered: false,
        };

        while let Ok(Some(line)) = lines.next_line().await {
            server_log.lock().unwrap().push((Instant::now(), line.clone()));

            if line == "*OPC?" && state.triggered {
                state.triggered = false;
                tokio::time::sleep(state.settings.sweep_time).await;
            }

            if let Some(response) = state.respond(&line) {
                if write_half.write_all(format!("{}\n", response).as_bytes()).await.is_err() {
                    break;
                }
            }
        }
    });

    (client, Simulator { log: log, handle: handle })
}

/// A fresh directory for files written by one test
pub fn scratch_dir(name: &str) -> PathBuf
{
    let dir = std::env::temp_dir().join(format!("e4990a-{}-{}", name, std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    dir
}

pub fn linear_config(intervals: usize, period: f64, bias: f64, plotting: bool) -> String
{
    format!(
        "[sweep]
start_frequency = 1000
stop_frequency = 5000
number_of_points = 5
measurement_speed = 2
oscillator_voltage = 0.5
bias_voltage = {}
number_of_intervals = {}
interval_period = {}

[plotting]
enabled = {}
",
        bias, intervals, period, plotting,
    )
}

// MAT array classes
pub const CHAR: u32 = 4;
pub const DOUBLE: u32 = 6;
pub const SINGLE: u32 = 7;
pub const INT64: u32 = 14;

/// One variable read back from a MAT file
#[derive(Debug)]
pub struct MatVariable
{
    pub name: String,
    pub class: u32,
    pub complex: bool,
    pub dims: (usize, usize),
    pub real: Vec<u8>,
}

impl MatVariable
{
    pub fn singles(&self) -> Vec<f32>
    {
        let mut values = vec![0f32; self.real.len() / 4];
        LittleEndian::read_f32_into(&self.real, &mut values);
        values
    }

    pub fn doubles(&self) -> Vec<f64>
    {
        let mut values = vec![0f64; self.real.len() / 8];
        LittleEndian::read_f64_into(&self.real, &mut values);
        values
    }
}

/// Splits a tagged element off the front of `bytes`, returning its type, data and the rest
fn element(bytes: &[u8]) -> (u32, &[u8], &[u8])
{
    let data_type = LittleEndian::read_u32(&bytes[0..4]);
    let len = LittleEndian::read_u32(&bytes[4..8]) as usize;
    let padded = (len + 7) / 8 * 8;

    (data_type, &bytes[8..8 + len], &bytes[8 + padded..])
}

/// Walks every variable of an uncompressed level 5 MAT file
pub fn read_mat(bytes: &[u8]) -> Vec<MatVariable>
{
    assert_eq!(&bytes[126..128], b"IM");

    let mut variables = Vec::new();
    let mut rest = &bytes[128..];
    while !rest.is_empty() {
        let (data_type, body, next) = element(rest);
        assert_eq!(data_type, 14, "top level elements are matrices");
        rest = next;

        let (_, flags, body) = element(body);
        let (_, dims, body) = element(body);
        let (_, name, body) = element(body);
        let (_, real, _) = element(body);
        let class_flags = LittleEndian::read_u32(&flags[0..4]);

        variables.push(MatVariable {
            name: String::from_utf8(name.to_vec()).unwrap(),
            class: class_flags & 0xff,
            complex: class_flags & 0x0800 != 0,
            dims: (
                LittleEndian::read_i32(&dims[0..4]) as usize,
                LittleEndian::read_i32(&dims[4..8]) as usize,
            ),
            real: real.to_vec(),
        });
    }

    variables
}
