use alloc::vec::Vec;
use core::fmt;

use crate::address::{ADDRESS_LEN, Address, decode_address, encode_address};

pub const CTL_UI: u8 = 0x03;
pub const CTL_SABM: u8 = 0x2F;
pub const CTL_UA: u8 = 0x63;
pub const CTL_DISC: u8 = 0x43;
pub const CTL_DM: u8 = 0x0F;

/// PID for "no layer 3 protocol", carried by UI and I frames.
pub const PID_NO_LAYER3: u8 = 0xF0;

/// Maximum number of digipeaters that may appear in the address field.
pub const MAX_PATH_LEN: usize = 8;

/// A decoded AX.25 frame, without FCS (the KISS modem strips and adds it).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub destination: Address,
    pub source: Address,
    pub path: Vec<Address>,
    pub control: u8,
    pub pid: Option<u8>,
    pub info: Vec<u8>,
}

impl Frame {
    /// Decode a frame from the payload of a KISS data frame.
    ///
    /// Returns `None` if the address field is truncated, contains fewer than two
    /// addresses, or there is no control byte after it.
    pub fn parse(bytes: &[u8]) -> Option<Self> {
        let mut addresses = Vec::new();
        let mut idx = 0;
        loop {
            let unit: &[u8; ADDRESS_LEN] = bytes.get(idx..idx + ADDRESS_LEN)?.try_into().ok()?;
            let (address, last) = decode_address(unit);
            addresses.push(address);
            idx += ADDRESS_LEN;
            if last {
                break;
            }
        }
        if addresses.len() < 2 {
            return None;
        }

        let control = *bytes.get(idx)?;
        idx += 1;
        let pid = if control == CTL_UI || control & 0x01 == 0 {
            let pid = bytes.get(idx).copied();
            if pid.is_some() {
                idx += 1;
            }
            pid
        } else {
            None
        };
        let info = bytes.get(idx..).unwrap_or(&[]).to_vec();

        let path = addresses.split_off(2);
        Some(Frame {
            destination: addresses[0],
            source: addresses[1],
            path,
            control,
            pid,
            info,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    PathTooLong(usize),
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameError::PathTooLong(n) => {
                write!(f, "digipeater path has {n} entries; maximum is {MAX_PATH_LEN}")
            }
        }
    }
}

impl core::error::Error for FrameError {}

/// Build the address field: destination, source, then each digipeater in order.
///
/// Only the final address emitted carries the "last" marker.
pub fn build_header(
    source: &Address,
    destination: &Address,
    path: &[Address],
) -> Result<Vec<u8>, FrameError> {
    if path.len() > MAX_PATH_LEN {
        return Err(FrameError::PathTooLong(path.len()));
    }
    let mut out = Vec::with_capacity((2 + path.len()) * ADDRESS_LEN);
    out.extend_from_slice(&encode_address(destination, false));
    out.extend_from_slice(&encode_address(source, path.is_empty()));
    for (i, digi) in path.iter().enumerate() {
        out.extend_from_slice(&encode_address(digi, i == path.len() - 1));
    }
    Ok(out)
}

/// Unconnected information frame, as used for beacons and unproto traffic.
pub fn build_ui_frame(
    source: &Address,
    destination: &Address,
    path: &[Address],
    info: &[u8],
) -> Result<Vec<u8>, FrameError> {
    let mut out = build_header(source, destination, path)?;
    out.push(CTL_UI);
    out.push(PID_NO_LAYER3);
    out.extend_from_slice(info);
    Ok(out)
}

/// Unnumbered frame with no information field, such as SABM, UA, DISC or DM.
pub fn build_u_frame(
    source: &Address,
    destination: &Address,
    path: &[Address],
    control: u8,
) -> Result<Vec<u8>, FrameError> {
    let mut out = build_header(source, destination, path)?;
    out.push(control);
    Ok(out)
}

/// Numbered information frame. Sequence numbers are taken modulo 8.
pub fn build_i_frame(
    source: &Address,
    destination: &Address,
    path: &[Address],
    ns: u8,
    nr: u8,
    info: &[u8],
) -> Result<Vec<u8>, FrameError> {
    let mut out = build_header(source, destination, path)?;
    out.push(((ns & 0x07) << 1) | ((nr & 0x07) << 5));
    out.push(PID_NO_LAYER3);
    out.extend_from_slice(info);
    Ok(out)
}
