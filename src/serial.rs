//! Native asynchronous serial port support for [`Gateway`](crate::Gateway).
//!
//! Uses the [`serial2-tokio`](https://crates.io/crates/serial2-tokio) crate.

extern crate std;

use crate::transport::Transport;
use alloc::{boxed::Box, string::String};
use embedded_io_adapters::tokio_1::FromTokio;
use embedded_io_async::{ErrorType, Read, Write};
use serial2_tokio::{CharSize, Parity, SerialPort, Settings, StopBits};
use std::io;

/// Baud rate used by the gateway.
pub const BAUD_RATE: u32 = 9600;

/// Serial port type implementing [`Read`] and [`Write`].
pub type Port = FromTokio<SerialPort>;

/// Port-specific error type to be used as `E` for the generic [`Error<E>`](crate::Error) type.
pub type PortError = <Port as ErrorType>::Error;

/// Opens a native serial port at the given path.
///
/// The port is configured for 9600 baud, 8 data bits, no parity and 1 stop bit.
/// Pending input and output is discarded.
pub fn open(path: &str) -> io::Result<Port> {
    let port = SerialPort::open(path, |mut settings: Settings| {
        settings.set_raw();
        settings.set_baud_rate(BAUD_RATE)?;
        settings.set_char_size(CharSize::Bits8);
        settings.set_parity(Parity::None);
        settings.set_stop_bits(StopBits::One);

        Ok(settings)
    })?;

    port.discard_buffers()?;

    Ok(FromTokio::new(port))
}

/// Serial [`Transport`] that opens its port on demand.
///
/// Reads and writes fail with [`io::ErrorKind::NotConnected`] while the port is closed.
///
/// # Examples
///
/// ```no_run
/// # #[tokio::main]
/// # async fn main() -> otgw::Result<(), otgw::serial::PortError> {
/// let link = otgw::serial::SerialLink::new("/dev/ttyUSB0");
/// let mut gw = otgw::Gateway::new(link);
///
/// gw.connect().await?;
/// # Ok(())
/// # }
/// ```
pub struct SerialLink {
    path: String,
    port: Option<Port>,
}

impl core::fmt::Debug for SerialLink {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SerialLink")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl SerialLink {
    /// Constructs a closed serial link for the port at the given path.
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            port: None,
        }
    }

    /// Returns the path of the serial port.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    fn port(&mut self) -> io::Result<&mut Port> {
        self.port
            .as_mut()
            .ok_or_else(|| io::ErrorKind::NotConnected.into())
    }
}

impl ErrorType for SerialLink {
    type Error = PortError;
}

impl Read for SerialLink {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        self.port()?.read(buf).await
    }
}

impl Write for SerialLink {
    async fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        self.port()?.write(buf).await
    }

    async fn flush(&mut self) -> Result<(), Self::Error> {
        self.port()?.flush().await
    }
}

#[async_trait::async_trait(?Send)]
impl Transport for SerialLink {
    async fn open(&mut self) -> Result<(), Self::Error> {
        if self.port.is_none() {
            self.port = Some(open(&self.path)?);
        }

        Ok(())
    }

    async fn close(&mut self) -> Result<(), Self::Error> {
        self.port = None;

        Ok(())
    }
}
