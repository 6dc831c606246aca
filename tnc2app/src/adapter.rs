use tnc2core::monitor::MonitorLine;

use crate::config::TncConfig;
use crate::session::LinkEvent;
use crate::station::StationAddress;

/// Receives everything the session wants to show the operator outside of command results.
pub trait MonitorAdapter: Send + 'static {
    /// A frame was heard on the channel while monitoring is enabled.
    fn frame_heard(&self, line: &MonitorLine);

    /// The link changed state without a command asking for it.
    fn link_event(&self, event: LinkEvent);

    /// The connected peer sent us an I-frame.
    fn data_received(&self, from: &StationAddress, data: &[u8]);
}

/// Source of persisted settings, consulted when the session reconnects to the modem.
pub trait SettingsProvider: Send + 'static {
    /// Overwrite whichever fields of `config` are persisted.
    fn reload(&self, config: &mut TncConfig);
}

pub struct NullMonitor;
impl MonitorAdapter for NullMonitor {
    fn frame_heard(&self, _line: &MonitorLine) {}
    fn link_event(&self, _event: LinkEvent) {}
    fn data_received(&self, _from: &StationAddress, _data: &[u8]) {}
}

/// Settings are never persisted; reconnecting keeps the current configuration.
pub struct NullSettings;
impl SettingsProvider for NullSettings {
    fn reload(&self, _config: &mut TncConfig) {}
}
