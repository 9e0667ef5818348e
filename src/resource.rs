//! Instrument discovery and connection
//!
//! The analyzer is reached either over LAN through its raw SCPI socket, or through the Linux
//! USB-TMC driver which exposes each instrument as a `/dev/usbtmc*` character device.

use std::{
    io,
    path::{ Path, PathBuf },
    pin::Pin,
    task::{ Context, Poll },
};
use tokio::{
    fs::{ File, OpenOptions },
    io::{ AsyncRead, AsyncWrite, ReadBuf },
    net::TcpStream,
};
use tracing::info;
use crate::error::{ Error, Result };

/// Raw SCPI socket port of the analyzer
pub const SCPI_PORT: u16 = 5025;

const USBTMC_DIR: &str = "/dev";
const USBTMC_PREFIX: &str = "usbtmc";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resource
{
    Tcp
    {
        host: String,
        port: u16,
    },
    UsbTmc(PathBuf),
}

impl std::fmt::Display for Resource
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result
    {
        match self {
            Self::Tcp { host, port } => write!(f, "TCPIP::{}::{}::SOCKET", host, port),
            Self::UsbTmc(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Picks the one USB instrument among the candidates
pub fn select_usb(mut candidates: Vec<PathBuf>) -> Result<Resource>
{
    match candidates.len() {
        0 => Err(Error::NoInstrument),
        1 => Ok(Resource::UsbTmc(candidates.remove(0))),
        _ => {
            candidates.sort();
            Err(Error::MultipleInstruments(
                candidates.iter().map(|path| path.display().to_string()).collect()
            ))
        },
    }
}

fn usbtmc_devices(dir: &Path) -> io::Result<Vec<PathBuf>>
{
    let mut devices = Vec::new();

    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_name().to_string_lossy().starts_with(USBTMC_PREFIX) {
            devices.push(entry.path());
        }
    }

    Ok(devices)
}

/// Resolves the instrument to connect to
///
/// A configured IP address always wins. Otherwise exactly one USB instrument must be attached.
pub fn discover(ip_address: Option<&str>) -> Result<Resource>
{
    match ip_address {
        Some(host) => Ok(Resource::Tcp {
            host: host.to_owned(),
            port: SCPI_PORT,
        }),
        None => {
            let candidates = usbtmc_devices(Path::new(USBTMC_DIR)).map_err(|source| Error::Connect {
                resource: USBTMC_DIR.to_owned(),
                source: source,
            })?;
            select_usb(candidates)
        },
    }
}

/// An open byte stream to the instrument
pub enum Connection
{
    Tcp(TcpStream),
    UsbTmc(File),
}

impl Resource
{
    pub async fn open(&self) -> Result<Connection>
    {
        let connection = match self {
            Self::Tcp { host, port } => TcpStream::connect((host.as_str(), *port))
                .await
                .map(Connection::Tcp),
            Self::UsbTmc(path) => OpenOptions::new()
                .read(true)
                .write(true)
                .open(path)
                .await
                .map(Connection::UsbTmc),
        };

        let connection = connection.map_err(|source| Error::Connect {
            resource: self.to_string(),
            source: source,
        })?;
        info!(resource = %self, "connected");

        Ok(connection)
    }
}

impl AsyncRead for Connection
{
    fn poll_read(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<io::Result<()>>
    {
        match self.get_mut() {
            Self::Tcp(stream) => Pin::new(stream).poll_read(cx, buf),
            Self::UsbTmc(file) => Pin::new(file).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for Connection
{
    fn poll_write(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>>
    {
        match self.get_mut() {
            Self::Tcp(stream) => Pin::new(stream).poll_write(cx, buf),
            Self::UsbTmc(file) => Pin::new(file).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>>
    {
        match self.get_mut() {
            Self::Tcp(stream) => Pin::new(stream).poll_flush(cx),
            Self::UsbTmc(file) => Pin::new(file).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>>
    {
        match self.get_mut() {
            Self::Tcp(stream) => Pin::new(stream).poll_shutdown(cx),
            Self::UsbTmc(file) => Pin::new(file).poll_shutdown(cx),
        }
    }
}
