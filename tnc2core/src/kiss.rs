use alloc::vec::Vec;
use core::fmt;

// KISS protocol reference: http://www.ax25.net/kiss.aspx

pub const FEND: u8 = 0xC0;
pub const FESC: u8 = 0xDB;
pub const TFEND: u8 = 0xDC;
pub const TFESC: u8 = 0xDD;

/// KISS port used when none is configured. Single-port modems only listen on 0.
pub const DEFAULT_PORT: u8 = 0;

/// Size of the receive buffer in `KissBuffer`.
///
/// An AX.25 frame with a full 8-entry digipeater path and a 256-byte info field
/// is 328 bytes. Supposing every byte needed escaping, plus a FEND at each end and
/// the header byte, that comes to 659. This leaves room for several frames to be
/// queued up between reads.
pub const MAX_BUFFER_LEN: usize = 4096;

/// Holder for a complete KISS frame as it appears on the wire, including both FENDs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KissFrame {
    data: Vec<u8>,
}

impl KissFrame {
    /// Request to transmit a data frame (an AX.25 frame without FCS) on the given port.
    pub fn new_data(port: u8, payload: &[u8]) -> Self {
        Self::new_command(port, KissCommand::DataFrame, payload)
    }

    /// Build a frame for any KISS command with an arbitrary payload.
    pub fn new_command(port: u8, command: KissCommand, payload: &[u8]) -> Self {
        let mut data = Vec::with_capacity(payload.len() + 3);
        data.push(FEND);
        data.push(kiss_header(port, command.proto_value()));
        escape(payload, &mut data);
        data.push(FEND);
        KissFrame { data }
    }

    /// Request to set the TxDelay, in units of 10 ms.
    pub fn new_set_tx_delay(port: u8, units: u8) -> Self {
        Self::new_command(port, KissCommand::TxDelay, &[units])
    }

    /// Return this frame's KISS command type.
    pub fn command(&self) -> Result<KissCommand, KissError> {
        let header = self.header_byte()?;
        if header == 0xFF {
            return Ok(KissCommand::Return);
        }
        KissCommand::from_proto(header & 0x0f)
    }

    /// Return the KISS port to which this frame relates.
    pub fn port(&self) -> Result<u8, KissError> {
        Ok(self.header_byte()? >> 4)
    }

    /// Payload part of the frame between the header byte and the trailing FEND, unescaped.
    pub fn payload(&self) -> Result<Vec<u8>, KissError> {
        if self.data.len() < 3 {
            return Err(KissError::MalformedKissFrame);
        }
        let mut out = Vec::with_capacity(self.data.len() - 3);
        unescape(&self.data[2..self.data.len() - 1], &mut out);
        Ok(out)
    }

    /// Borrow the frame as a slice
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Return the header byte of the KISS frame, which directly follows the opening FEND.
    fn header_byte(&self) -> Result<u8, KissError> {
        match self.data.as_slice() {
            [FEND, header, .., FEND] => Ok(*header),
            _ => Err(KissError::MalformedKissFrame),
        }
    }
}

/// Convert a TXDELAY in milliseconds to the 10 ms units carried by KISS.
pub fn tx_delay_units(ms: u32) -> u8 {
    (ms / 10).min(255) as u8
}

fn kiss_header(port: u8, command: u8) -> u8 {
    (port << 4) | (command & 0x0f)
}

/// Accumulates bytes from the modem, which may arrive in arbitrary chunks, and splits
/// them into complete KISS frames.
pub struct KissBuffer {
    data: [u8; MAX_BUFFER_LEN],
    written: usize,
}

impl KissBuffer {
    pub fn new() -> Self {
        Self {
            data: [0u8; MAX_BUFFER_LEN],
            written: 0,
        }
    }

    /// Space into which the next read from the modem may be placed.
    ///
    /// Always non-empty as long as `next_frame()` is drained after each `did_write()`.
    pub fn buf_remaining(&mut self) -> &mut [u8] {
        &mut self.data[self.written..]
    }

    /// Record that `n` bytes were written into the slice from `buf_remaining()`.
    pub fn did_write(&mut self, n: usize) {
        self.written = (self.written + n).min(MAX_BUFFER_LEN);
    }

    /// Copy bytes into the buffer, returning how many fit.
    pub fn extend(&mut self, bytes: &[u8]) -> usize {
        let target = self.buf_remaining();
        let n = bytes.len().min(target.len());
        target[..n].copy_from_slice(&bytes[..n]);
        self.did_write(n);
        n
    }

    /// Extract the next complete frame, if one has been fully received.
    ///
    /// Should be called in a loop after each write until it returns `None`.
    pub fn next_frame(&mut self) -> Option<KissFrame> {
        loop {
            let Some(start) = self.data[..self.written].iter().position(|b| *b == FEND) else {
                // Noise outside any frame
                self.written = 0;
                return None;
            };
            self.consume(start);

            let Some(end) = self.data[1..self.written]
                .iter()
                .position(|b| *b == FEND)
                .map(|p| p + 1)
            else {
                if self.written == MAX_BUFFER_LEN {
                    log::warn!("KISS buffer full without a frame boundary, dropping partial frame");
                    self.written = 0;
                }
                return None;
            };
            if end == 1 {
                // FEND FEND: nothing between them
                self.consume(1);
                continue;
            }

            let frame = KissFrame {
                data: self.data[..=end].to_vec(),
            };
            // The closing FEND may also open the next frame
            self.consume(end);
            return Some(frame);
        }
    }

    fn consume(&mut self, n: usize) {
        self.data.copy_within(n..self.written, 0);
        self.written -= n;
    }
}

impl Default for KissBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KissCommand {
    DataFrame,
    TxDelay,
    P,
    SlotTime,
    TxTail,
    FullDuplex,
    SetHardware,
    Return,
}

impl KissCommand {
    fn from_proto(value: u8) -> Result<Self, KissError> {
        Ok(match value {
            0 => KissCommand::DataFrame,
            1 => KissCommand::TxDelay,
            2 => KissCommand::P,
            3 => KissCommand::SlotTime,
            4 => KissCommand::TxTail,
            5 => KissCommand::FullDuplex,
            6 => KissCommand::SetHardware,
            _ => return Err(KissError::UnsupportedKissCommand),
        })
    }

    pub fn proto_value(&self) -> u8 {
        match self {
            KissCommand::DataFrame => 0,
            KissCommand::TxDelay => 1,
            KissCommand::P => 2,
            KissCommand::SlotTime => 3,
            KissCommand::TxTail => 4,
            KissCommand::FullDuplex => 5,
            KissCommand::SetHardware => 6,
            KissCommand::Return => 0x0f,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KissError {
    MalformedKissFrame,
    UnsupportedKissCommand,
}

impl fmt::Display for KissError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KissError::MalformedKissFrame => write!(f, "malformed KISS frame"),
            KissError::UnsupportedKissCommand => write!(f, "unsupported KISS command"),
        }
    }
}

impl core::error::Error for KissError {}

pub fn escape(src: &[u8], dst: &mut Vec<u8>) {
    for b in src {
        match *b {
            FEND => dst.extend_from_slice(&[FESC, TFEND]),
            FESC => dst.extend_from_slice(&[FESC, TFESC]),
            other => dst.push(other),
        }
    }
}

pub fn unescape(src: &[u8], dst: &mut Vec<u8>) {
    let mut i = 0;
    while i < src.len() {
        if src[i] == FESC {
            if i == src.len() - 1 {
                break;
            }
            i += 1;
            match src[i] {
                TFEND => dst.push(FEND),
                TFESC => dst.push(FESC),
                other => dst.extend_from_slice(&[FESC, other]),
            }
        } else {
            dst.push(src[i]);
        }
        i += 1;
    }
}
