//! Serial transport implementation

use super::{Console, EndpointOpener, LineFramer, LineSource};
use crate::error::Result;
use serialport::{DataBits, FlowControl, Parity, SerialPort, StopBits};
use std::io::{Read, Write};
use std::time::Duration;

/// Serial transport for the arm's USB console
pub struct SerialTransport {
    port: Box<dyn SerialPort>,
    path: String,
}

impl SerialTransport {
    /// Open a serial port
    ///
    /// # Arguments
    /// * `path` - Serial port path (e.g., "/dev/ttyUSB0")
    /// * `baud_rate` - Baud rate (115200 for the arm firmware)
    /// * `read_timeout` - Upper bound on a single blocking read
    ///
    /// On unix the port is opened exclusively (TIOCEXCL), so a second reader
    /// on the same path fails instead of splitting the byte stream.
    pub fn open(path: &str, baud_rate: u32, read_timeout: Duration) -> Result<Self> {
        let port = serialport::new(path, baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(read_timeout)
            .open()?;

        log::debug!("Opened serial port: {} at {} baud", path, baud_rate);

        Ok(SerialTransport {
            port,
            path: path.to_string(),
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Read available bytes; a read timeout yields `Ok(0)`
    pub fn read(&mut self, buffer: &mut [u8]) -> Result<usize> {
        match self.port.read(buffer) {
            Ok(n) => Ok(n),
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => Ok(0),
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => Ok(0),
            Err(e) => Err(e.into()),
        }
    }

    /// Write the whole buffer and flush
    pub fn write_all(&mut self, data: &[u8]) -> Result<()> {
        self.port.write_all(data)?;
        self.port.flush()?;
        Ok(())
    }

    /// Drop anything the device sent before our next request
    pub fn clear_input(&mut self) -> Result<()> {
        self.port.clear(serialport::ClearBuffer::Input)?;
        Ok(())
    }
}

impl Drop for SerialTransport {
    fn drop(&mut self) {
        log::debug!("Closed serial port: {}", self.path);
    }
}

/// Serial port framed into lines
pub struct SerialLink {
    transport: SerialTransport,
    framer: LineFramer,
    chunk: [u8; 256],
}

impl SerialLink {
    pub fn new(transport: SerialTransport) -> Self {
        Self {
            transport,
            framer: LineFramer::new(),
            chunk: [0u8; 256],
        }
    }
}

impl Console for SerialLink {
    fn discard_input(&mut self) -> Result<()> {
        self.framer.clear();
        self.transport.clear_input()
    }

    fn write_line(&mut self, line: &[u8]) -> Result<()> {
        self.transport.write_all(line)?;
        self.transport.write_all(b"\n")
    }
}

impl LineSource for SerialLink {
    fn next_line(&mut self) -> Result<Option<Vec<u8>>> {
        if let Some(line) = self.framer.next_line() {
            return Ok(Some(line));
        }

        let n = self.transport.read(&mut self.chunk)?;
        if n == 0 {
            return Ok(None);
        }
        self.framer.push(&self.chunk[..n]);
        Ok(self.framer.next_line())
    }
}

/// Opens serial endpoints by device path
#[derive(Debug, Clone)]
pub struct SerialOpener {
    baud_rate: u32,
    read_timeout: Duration,
}

impl SerialOpener {
    pub fn new(baud_rate: u32, read_timeout: Duration) -> Self {
        Self {
            baud_rate,
            read_timeout,
        }
    }
}

impl EndpointOpener for SerialOpener {
    type Link = SerialLink;

    fn open(&self, endpoint: &str) -> Result<SerialLink> {
        let transport = SerialTransport::open(endpoint, self.baud_rate, self.read_timeout)?;
        Ok(SerialLink::new(transport))
    }
}
