//! KISS framing over a byte stream to the modem.

use std::io::{ErrorKind, Read, Write};

use log::debug;
use tnc2core::kiss::{KissBuffer, KissCommand, KissFrame, tx_delay_units};

use crate::tnc::TncError;

/// Sending half of a KISS connection.
///
/// Each call writes one complete frame. Failures are returned to the caller; nothing
/// is retried here.
pub struct KissTransport<T: Write> {
    tnc: T,
    port: u8,
}

impl<T: Write> KissTransport<T> {
    pub fn new(tnc: T, port: u8) -> Self {
        Self { tnc, port }
    }

    /// Write a frame with any port and command.
    pub fn send(&mut self, port: u8, command: KissCommand, payload: &[u8]) -> Result<(), TncError> {
        let frame = KissFrame::new_command(port, command, payload);
        self.tnc.write_all(frame.as_bytes())?;
        self.tnc.flush()?;
        Ok(())
    }

    /// Send an AX.25 frame on the configured port.
    pub fn send_data(&mut self, payload: &[u8]) -> Result<(), TncError> {
        self.send(self.port, KissCommand::DataFrame, payload)
    }

    /// Set the modem's transmit delay. KISS carries this in 10 ms units.
    pub fn set_txdelay(&mut self, ms: u32) -> Result<(), TncError> {
        self.send(self.port, KissCommand::TxDelay, &[tx_delay_units(ms)])
    }

    pub fn get_mut(&mut self) -> &mut T {
        &mut self.tnc
    }
}

/// Receiving half of a KISS connection: yields `(port, payload)` for every data frame.
///
/// Frames for other KISS commands are consumed silently. The iterator finishes when the
/// stream reaches EOF or fails, so closing the underlying TNC ends it.
pub struct KissReceiver<R: Read> {
    reader: R,
    buffer: KissBuffer,
    finished: bool,
}

impl<R: Read> KissReceiver<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buffer: KissBuffer::new(),
            finished: false,
        }
    }
}

impl<R: Read> Iterator for KissReceiver<R> {
    type Item = (u8, Vec<u8>);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            while let Some(frame) = self.buffer.next_frame() {
                if frame.command() != Ok(KissCommand::DataFrame) {
                    continue;
                }
                let (Ok(port), Ok(payload)) = (frame.port(), frame.payload()) else {
                    debug!("failed to decode payload from KISS frame");
                    continue;
                };
                return Some((port, payload));
            }
            if self.finished {
                return None;
            }
            match self.reader.read(self.buffer.buf_remaining()) {
                Ok(0) => self.finished = true,
                Ok(n) => self.buffer.did_write(n),
                Err(e) if e.kind() == ErrorKind::Interrupted => (),
                Err(e) => {
                    debug!("KISS read ended: {e}");
                    self.finished = true;
                }
            }
        }
    }
}
