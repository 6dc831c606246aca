use std::fmt::Display;
use std::str::FromStr;

use tnc2core::address::{Address, Callsign};
use tnc2core::protocol::MAX_PATH_LEN;

use crate::error::Tnc2Error;

/// Station address. High level version of `Address` from core, always holding a valid
/// callsign and SSID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StationAddress(Address);

impl StationAddress {
    /// Parse `CALL` or `CALL-SSID`, e.g. `N0CALL-7`.
    pub fn from_callsign(callsign: &str) -> Result<Self, Tnc2Error> {
        let trimmed = callsign.trim().to_uppercase();
        let (base, ssid) = match trimmed.split_once('-') {
            Some((base, ssid)) => (base, Some(ssid)),
            None => (trimmed.as_str(), None),
        };
        if base.is_empty() {
            return Err(Tnc2Error::EmptyCallsign);
        }
        let len = base.chars().count();
        if len > 6 {
            return Err(Tnc2Error::CallsignTooLong(len));
        }
        if let Some(c) = base.chars().find(|c| !c.is_ascii_alphanumeric()) {
            return Err(Tnc2Error::InvalidCallsignCharacters(c));
        }
        let ssid = match ssid {
            None => 0,
            Some(s) => match s.parse::<u8>() {
                Ok(n) if n <= 15 => n,
                _ => return Err(Tnc2Error::InvalidSsid(s.to_owned())),
            },
        };
        Ok(Self(Address::new(Callsign::from_bytes(base.as_bytes()), ssid)))
    }

    pub fn address(&self) -> &Address {
        &self.0
    }

    pub fn ssid(&self) -> u8 {
        self.0.ssid
    }
}

impl From<Address> for StationAddress {
    fn from(address: Address) -> Self {
        Self(address)
    }
}

impl FromStr for StationAddress {
    type Err = Tnc2Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_callsign(s)
    }
}

impl Display for StationAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Parse a digipeater path such as `WIDE1-1,WIDE2-1` or `VIA WIDE1-1 WIDE2-1`.
///
/// An empty string is an empty path.
pub fn parse_path(path: &str) -> Result<Vec<StationAddress>, Tnc2Error> {
    let mut words = path
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|w| !w.is_empty())
        .peekable();
    if words.peek().is_some_and(|w| w.eq_ignore_ascii_case("VIA")) {
        words.next();
    }
    let path = words
        .map(StationAddress::from_callsign)
        .collect::<Result<Vec<_>, _>>()?;
    if path.len() > MAX_PATH_LEN {
        return Err(Tnc2Error::PathTooLong(path.len()));
    }
    Ok(path)
}

/// Render a path the way it is typed, e.g. ` VIA WIDE1-1,WIDE2-1`, or nothing if empty.
pub fn format_path(path: &[StationAddress]) -> String {
    if path.is_empty() {
        return String::new();
    }
    let digis: Vec<String> = path.iter().map(|d| d.to_string()).collect();
    format!(" VIA {}", digis.join(","))
}

pub(crate) fn to_addresses(path: &[StationAddress]) -> Vec<Address> {
    path.iter().map(|s| s.0).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn callsign_with_ssid() {
        let a = StationAddress::from_callsign("kj6ywd-7").unwrap();
        assert_eq!(a.address().callsign.as_str(), "KJ6YWD");
        assert_eq!(a.ssid(), 7);
        assert_eq!(a.to_string(), "KJ6YWD-7");
        assert_eq!("CQ".parse::<StationAddress>().unwrap().to_string(), "CQ");
        assert_eq!(StationAddress::from_callsign("N0CALL-0").unwrap().to_string(), "N0CALL");
    }

    #[test]
    fn bad_callsigns() {
        assert!(matches!(
            StationAddress::from_callsign("TOOLONG"),
            Err(Tnc2Error::CallsignTooLong(7))
        ));
        assert!(matches!(
            StationAddress::from_callsign("N0/CL"),
            Err(Tnc2Error::InvalidCallsignCharacters('/'))
        ));
        assert!(matches!(
            StationAddress::from_callsign("  "),
            Err(Tnc2Error::EmptyCallsign)
        ));
        assert!(matches!(
            StationAddress::from_callsign("N0CALL-16"),
            Err(Tnc2Error::InvalidSsid(_))
        ));
        assert!(matches!(
            StationAddress::from_callsign("N0CALL-X"),
            Err(Tnc2Error::InvalidSsid(_))
        ));
    }

    #[test]
    fn paths() {
        assert!(parse_path("").unwrap().is_empty());
        let p = parse_path("via wide1-1, WIDE2-1").unwrap();
        assert_eq!(format_path(&p), " VIA WIDE1-1,WIDE2-1");
        assert_eq!(parse_path("RELAY").unwrap().len(), 1);
        assert!(matches!(
            parse_path("A,B,C,D,E,F,G,H,I"),
            Err(Tnc2Error::PathTooLong(9))
        ));
        assert!(parse_path("WIDE1-1,BAD!").is_err());
    }
}
