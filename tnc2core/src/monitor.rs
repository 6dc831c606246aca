//! Human-readable classification of frames heard on the channel.

use alloc::string::String;
use core::fmt::{self, Write};

use crate::protocol::{CTL_DISC, CTL_DM, CTL_SABM, CTL_UA, CTL_UI, Frame};

/// What kind of frame a control byte describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    Ui,
    Sabm,
    Ua,
    Disc,
    Dm,
    /// Numbered information frame
    I { ns: u8, nr: u8 },
    Rr { nr: u8 },
    Rnr { nr: u8 },
    Rej { nr: u8 },
    /// Supervisory frame with the reserved subtype
    UnknownS { nr: u8 },
    /// Any other unnumbered control value
    Unknown(u8),
}

impl FrameKind {
    pub fn classify(control: u8) -> Self {
        match control {
            CTL_UI => FrameKind::Ui,
            CTL_SABM => FrameKind::Sabm,
            CTL_UA => FrameKind::Ua,
            CTL_DISC => FrameKind::Disc,
            CTL_DM => FrameKind::Dm,
            c if c & 0x01 == 0 => FrameKind::I {
                ns: (c >> 1) & 0x07,
                nr: (c >> 5) & 0x07,
            },
            c if c & 0x03 == 0x01 => {
                let nr = (c >> 5) & 0x07;
                match (c >> 2) & 0x03 {
                    0 => FrameKind::Rr { nr },
                    1 => FrameKind::Rnr { nr },
                    2 => FrameKind::Rej { nr },
                    _ => FrameKind::UnknownS { nr },
                }
            }
            c => FrameKind::Unknown(c),
        }
    }

    /// Receive sequence number, where the frame carries one.
    pub fn nr(&self) -> Option<u8> {
        match *self {
            FrameKind::I { nr, .. }
            | FrameKind::Rr { nr }
            | FrameKind::Rnr { nr }
            | FrameKind::Rej { nr }
            | FrameKind::UnknownS { nr } => Some(nr),
            _ => None,
        }
    }

    /// Send sequence number, only present on I-frames.
    pub fn ns(&self) -> Option<u8> {
        match *self {
            FrameKind::I { ns, .. } => Some(ns),
            _ => None,
        }
    }
}

impl fmt::Display for FrameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameKind::Ui => write!(f, "UI"),
            FrameKind::Sabm => write!(f, "SABM"),
            FrameKind::Ua => write!(f, "UA"),
            FrameKind::Disc => write!(f, "DISC"),
            FrameKind::Dm => write!(f, "DM"),
            FrameKind::I { .. } => write!(f, "I"),
            FrameKind::Rr { .. } => write!(f, "RR"),
            FrameKind::Rnr { .. } => write!(f, "RNR"),
            FrameKind::Rej { .. } => write!(f, "REJ"),
            FrameKind::UnknownS { .. } => write!(f, "S?"),
            FrameKind::Unknown(c) => write!(f, "CTL=0x{c:02X}"),
        }
    }
}

/// One monitored frame, ready for display.
///
/// The header reads like `N0CALL-5>APRS VIA WIDE1-1 UI PID=0xF0` and the body is the
/// rendered information field, which may be empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorLine {
    pub kind: FrameKind,
    pub header: String,
    pub body: String,
}

impl MonitorLine {
    pub fn new(frame: &Frame, detail: bool) -> Self {
        let kind = FrameKind::classify(frame.control);
        let mut header = String::new();
        let _ = write!(header, "{}>{}", frame.source, frame.destination);
        if !frame.path.is_empty() {
            let _ = write!(header, " VIA ");
            for (i, digi) in frame.path.iter().enumerate() {
                if i > 0 {
                    header.push(',');
                }
                let _ = write!(header, "{digi}");
            }
        }
        let _ = write!(header, " {kind}");
        if let Some(ns) = kind.ns() {
            let _ = write!(header, " N(S)={ns}");
        }
        if let Some(nr) = kind.nr() {
            let _ = write!(header, " N(R)={nr}");
        }
        if let (FrameKind::Ui, Some(pid)) = (kind, frame.pid) {
            let _ = write!(header, " PID=0x{pid:02X}");
        }
        MonitorLine {
            kind,
            header,
            body: render_info(&frame.info, detail),
        }
    }
}

impl fmt::Display for MonitorLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.header)?;
        if !self.body.is_empty() {
            write!(f, "\n{}", self.body)?;
        }
        Ok(())
    }
}

/// Render an information field as text.
///
/// Invalid UTF-8 is replaced rather than rejected, carriage returns become newlines and
/// trailing whitespace is dropped. With `detail` a hex dump of the raw bytes follows.
pub fn render_info(info: &[u8], detail: bool) -> String {
    if info.is_empty() {
        return String::new();
    }
    let text = String::from_utf8_lossy(info)
        .replace("\r\n", "\n")
        .replace('\r', "\n");
    let mut out = String::from(text.trim_end());
    if detail {
        if !out.is_empty() {
            out.push('\n');
        }
        out.push_str("[hex]");
        for b in info {
            let _ = write!(out, " {b:02x}");
        }
    }
    out
}
