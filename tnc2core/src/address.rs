use core::fmt;

/// Length of one encoded address unit in the AX.25 header.
pub const ADDRESS_LEN: usize = 7;

/// ASCII representation of a callsign.
///
/// Always 6 characters long - if the callsign is shorter then remaining space is filled
/// with space characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Callsign(pub [u8; 6]);

impl Callsign {
    /// Pad or truncate the given characters to exactly 6 uppercase bytes.
    pub fn from_bytes(call: &[u8]) -> Self {
        let mut out = [b' '; 6];
        for (slot, c) in out.iter_mut().zip(call.iter()) {
            *slot = c.to_ascii_uppercase();
        }
        Callsign(out)
    }

    /// The callsign without trailing padding.
    pub fn as_str(&self) -> &str {
        let len = self
            .0
            .iter()
            .rposition(|c| *c != b' ')
            .map(|p| p + 1)
            .unwrap_or(0);
        core::str::from_utf8(&self.0[..len]).unwrap_or("")
    }
}

/// A station address: callsign plus 4-bit SSID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Address {
    pub callsign: Callsign,
    pub ssid: u8,
}

impl Address {
    pub fn new(callsign: Callsign, ssid: u8) -> Self {
        Self {
            callsign,
            ssid: ssid & 0x0f,
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.ssid == 0 {
            write!(f, "{}", self.callsign.as_str())
        } else {
            write!(f, "{}-{}", self.callsign.as_str(), self.ssid)
        }
    }
}

/// Encode an address into its 7-byte header form.
///
/// `last` sets the extension bit which marks the final address of the header.
pub fn encode_address(address: &Address, last: bool) -> [u8; ADDRESS_LEN] {
    let mut out = [0u8; ADDRESS_LEN];
    for (o, c) in out.iter_mut().zip(address.callsign.0.iter()) {
        *o = c << 1;
    }
    out[6] = 0x60 | ((address.ssid & 0x0f) << 1) | (last as u8);
    out
}

/// Decode a 7-byte header unit, returning the address and whether it is marked last.
pub fn decode_address(encoded: &[u8; ADDRESS_LEN]) -> (Address, bool) {
    let mut call = [b' '; 6];
    for (c, e) in call.iter_mut().zip(encoded.iter()) {
        *c = e >> 1;
    }
    let ssid = (encoded[6] >> 1) & 0x0f;
    let last = encoded[6] & 0x01 != 0;
    (Address::new(Callsign(call), ssid), last)
}
