use thiserror::Error;
use tnc2core::protocol::FrameError;

use crate::tnc::TncError;

#[derive(Debug, Error)]
pub enum Tnc2Error {
    #[error("given callsign contains at least one character invalid in AX.25: {0}")]
    InvalidCallsignCharacters(char),

    #[error("given callsign is {0} characters long; maximum is 6")]
    CallsignTooLong(usize),

    #[error("callsign is empty")]
    EmptyCallsign,

    #[error("SSID '{0}' is not a number from 0 to 15")]
    InvalidSsid(String),

    #[error("digipeater path has {0} entries; maximum is 8")]
    PathTooLong(usize),

    #[error("unable to build frame: {0}")]
    Frame(#[from] FrameError),

    #[error(transparent)]
    Tnc(#[from] TncError),
}
