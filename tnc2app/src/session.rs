use std::fmt::Display;
use std::time::Instant;

use tnc2core::address::Address;

use crate::station::StationAddress;

/// Externally visible state of the single AX.25 link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkState {
    Idle,
    ConnectPending(StationAddress),
    Connected(StationAddress),
    DisconnectPending(StationAddress),
}

impl LinkState {
    pub fn is_connected(&self) -> bool {
        matches!(self, LinkState::Connected(_))
    }

    pub fn peer(&self) -> Option<&StationAddress> {
        match self {
            LinkState::Idle => None,
            LinkState::ConnectPending(p)
            | LinkState::Connected(p)
            | LinkState::DisconnectPending(p) => Some(p),
        }
    }
}

/// How a command finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome {
    /// Command carried out, nothing further to report
    Done,
    /// Peer answered our SABM with UA
    Connected,
    /// Peer acknowledged our DISC
    Disconnected,
    /// No answer to DISC; the link was dropped anyway
    DisconnectTimeout,
    /// No UA after every SABM attempt
    HandshakeTimeout,
    /// Peer answered with DM
    PeerRejected,
    /// Command does not make sense in the current link state
    InvalidState,
    /// An argument could not be turned into a frame
    InvalidArgument,
    /// UI transmission requested with no UNPROTO destination configured
    NoDestination,
    /// There is no working connection to the KISS modem
    NotConnected,
    /// The session shut down while the command was waiting
    Cancelled,
}

/// Result of a command, ready to be shown to the operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandResult {
    pub outcome: CommandOutcome,
    pub message: String,
    /// True when this command left the link connected.
    pub linked: bool,
}

impl CommandResult {
    pub(crate) fn new(outcome: CommandOutcome, message: impl Into<String>) -> Self {
        Self {
            outcome,
            message: message.into(),
            linked: false,
        }
    }

    pub(crate) fn done(message: impl Into<String>) -> Self {
        Self::new(CommandOutcome::Done, message)
    }

    pub(crate) fn cancelled() -> Self {
        Self::new(CommandOutcome::Cancelled, "*** session closed")
    }

    pub(crate) fn linked(mut self) -> Self {
        self.linked = true;
        self
    }

    pub fn is_success(&self) -> bool {
        matches!(
            self.outcome,
            CommandOutcome::Done | CommandOutcome::Connected | CommandOutcome::Disconnected
        )
    }
}

impl Display for CommandResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// Unsolicited changes to the link, reported to the `MonitorAdapter`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    /// A remote station connected to us
    ConnectedFrom(StationAddress),
    /// The peer sent DISC
    DisconnectedByPeer(StationAddress),
    /// The peer sent DM while we thought we were connected
    DroppedByPeer(StationAddress),
    /// The KISS connection went away
    TransportLost,
}

/// The remote end of the link and how to reach it.
#[derive(Debug, Clone)]
pub(crate) struct Peer {
    pub(crate) address: Address,
    pub(crate) path: Vec<Address>,
    /// Send sequence number for the next I-frame.
    pub(crate) ns: u8,
}

impl Peer {
    pub(crate) fn new(address: Address, path: Vec<Address>) -> Self {
        Self {
            address,
            path,
            ns: 0,
        }
    }

    pub(crate) fn station(&self) -> StationAddress {
        StationAddress::from(self.address)
    }
}

/// A handshake in flight. `reply` is completed exactly once.
pub(crate) struct Pending<R> {
    pub(crate) peer: Peer,
    pub(crate) attempts: u8,
    pub(crate) deadline: Instant,
    pub(crate) reply: R,
}

/// Internal link state, owned by the session worker.
pub(crate) enum Link<R> {
    Idle,
    ConnectPending(Pending<R>),
    Connected(Peer),
    DisconnectPending(Pending<R>),
}

impl<R> Link<R> {
    pub(crate) fn deadline(&self) -> Option<Instant> {
        match self {
            Link::ConnectPending(p) | Link::DisconnectPending(p) => Some(p.deadline),
            _ => None,
        }
    }

    pub(crate) fn public(&self) -> LinkState {
        match self {
            Link::Idle => LinkState::Idle,
            Link::ConnectPending(p) => LinkState::ConnectPending(p.peer.station()),
            Link::Connected(peer) => LinkState::Connected(peer.station()),
            Link::DisconnectPending(p) => LinkState::DisconnectPending(p.peer.station()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn link_state_peer() {
        let peer = StationAddress::from_callsign("N0CALL-5").unwrap();
        assert_eq!(LinkState::Idle.peer(), None);
        assert_eq!(LinkState::ConnectPending(peer).peer(), Some(&peer));
        assert_eq!(LinkState::DisconnectPending(peer).peer(), Some(&peer));
        assert!(LinkState::Connected(peer).is_connected());
        assert!(!LinkState::ConnectPending(peer).is_connected());
    }
}
