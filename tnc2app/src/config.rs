use std::time::Duration;

use tnc2core::address::{Address, Callsign};
use tnc2core::kiss::DEFAULT_PORT;

use crate::station::StationAddress;

/// How long to wait for a UA after sending SABM or DISC (AX.25 timer T1).
pub const DEFAULT_T1: Duration = Duration::from_secs(5);

/// How many SABMs to send before giving up on a connection (AX.25 retry count N2).
pub const DEFAULT_N2: u8 = 3;

/// Settings the session runs with. Loading and saving them is up to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TncConfig {
    /// Our own station address, used as the source of every frame.
    pub mycall: StationAddress,
    /// Destination for UI frames sent with `send_unproto`.
    pub unproto_dest: Option<StationAddress>,
    pub unproto_path: Vec<StationAddress>,
    /// Report every heard frame to the monitor adapter.
    pub monitor: bool,
    /// Include a hex dump of each information field.
    pub monitor_detail: bool,
    /// TXDELAY to apply whenever the modem connection opens.
    pub txdelay_ms: Option<u32>,
    pub kiss_port: u8,
    pub t1: Duration,
    pub n2: u8,
}

impl TncConfig {
    pub fn new(mycall: StationAddress) -> Self {
        Self {
            mycall,
            unproto_dest: None,
            unproto_path: vec![],
            monitor: false,
            monitor_detail: false,
            txdelay_ms: None,
            kiss_port: DEFAULT_PORT,
            t1: DEFAULT_T1,
            n2: DEFAULT_N2,
        }
    }
}

impl Default for TncConfig {
    fn default() -> Self {
        Self::new(StationAddress::from(Address::new(
            Callsign::from_bytes(b"N0CALL"),
            0,
        )))
    }
}
