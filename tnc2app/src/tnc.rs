use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpStream};

use thiserror::Error;

/// A TNC that supports reading and writing KISS messages, such as a TCP connection to
/// a software modem.
///
/// TNCs must be cloneable to support reading and writing from different threads,
/// via a working implementation of try_clone(). We do not require `Clone` directly
/// as this could not be fulfilled by `TcpStream`.
pub trait Tnc: Read + Write + Sized + Send + 'static {
    /// Return a copy of this TNC.
    ///
    /// `Tnc2App` will use this to create a second instance of the supplied TNC then use
    /// one of them for reading and one of them for writing, concurrently across two threads.
    fn try_clone(&mut self) -> Result<Self, TncError>;

    /// Shut down I/O - it is assumed we cannot restart.
    ///
    /// Any blocked `read()` on a clone must return promptly afterwards.
    fn close(&mut self) -> Result<(), TncError>;
}

#[derive(Debug, Error)]
pub enum TncError {
    #[error("unable to connect to KISS modem at {0}: {1}")]
    Connect(String, #[source] io::Error),

    #[error("KISS modem I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("not connected to a KISS modem")]
    NotConnected,
}

impl Tnc for TcpStream {
    fn try_clone(&mut self) -> Result<Self, TncError> {
        Ok(TcpStream::try_clone(self)?)
    }

    fn close(&mut self) -> Result<(), TncError> {
        Ok(self.shutdown(Shutdown::Both)?)
    }
}

/// Opens fresh connections to a TNC, both at startup and when asked to reconnect.
pub trait TncFactory: Send + 'static {
    type Tnc: Tnc;

    fn open(&mut self) -> Result<Self::Tnc, TncError>;
}

/// KISS over TCP, as offered by Dire Wolf and most software modems.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TcpTncFactory {
    pub host: String,
    pub port: u16,
}

impl TcpTncFactory {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl Default for TcpTncFactory {
    fn default() -> Self {
        Self::new("127.0.0.1", 8001)
    }
}

impl TncFactory for TcpTncFactory {
    type Tnc = TcpStream;

    fn open(&mut self) -> Result<TcpStream, TncError> {
        TcpStream::connect((self.host.as_str(), self.port))
            .map_err(|e| TncError::Connect(format!("{}:{}", self.host, self.port), e))
    }
}
