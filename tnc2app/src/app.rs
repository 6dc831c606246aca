use crate::adapter::{MonitorAdapter, SettingsProvider};
use crate::config::TncConfig;
use crate::error::Tnc2Error;
use crate::session::{CommandOutcome, CommandResult, Link, LinkEvent, LinkState, Peer, Pending};
use crate::station::{StationAddress, format_path, to_addresses};
use crate::tnc::{Tnc, TncError, TncFactory};
use crate::transport::{KissReceiver, KissTransport};
use tnc2core::address::Address;
use tnc2core::monitor::{FrameKind, MonitorLine};
use tnc2core::protocol::{
    CTL_DISC, CTL_SABM, CTL_UA, Frame, MAX_PATH_LEN, build_i_frame, build_u_frame, build_ui_frame,
};

use log::{debug, info, warn};
use std::mem;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, SyncSender};
use std::time::Instant;

/// A TNC-2 style controller for a single AX.25 link over a KISS modem.
///
/// All link state lives on a worker thread. Methods on this handle send a request to
/// that thread and block until it has a result, which for `connect()` and
/// `disconnect()` means waiting for the handshake to complete or time out.
pub struct Tnc2App {
    event_tx: SyncSender<SessionEvent>,
}

impl Tnc2App {
    /// Start the session and try to open the modem connection.
    ///
    /// If the modem cannot be reached the session still starts; commands that need to
    /// transmit will report `NotConnected` until `reconnect()` succeeds.
    pub fn new<F, M, S>(factory: F, config: TncConfig, monitor: M, settings: S) -> Self
    where
        F: TncFactory,
        M: MonitorAdapter,
        S: SettingsProvider,
    {
        let (event_tx, event_rx) = mpsc::sync_channel(128);
        let worker = SessionWorker {
            factory,
            config,
            monitor: Box::new(monitor),
            settings: Box::new(settings),
            event_tx: event_tx.clone(),
            transport: None,
            generation: 0,
            link: Link::Idle,
            parse_errors: 0,
        };
        spawn_worker(worker, event_rx);
        Self { event_tx }
    }

    /// Establish a link with `peer` via the given digipeaters (SABM/UA).
    pub fn connect(&self, peer: StationAddress, path: Vec<StationAddress>) -> CommandResult {
        self.request(Command::Connect(peer, path))
    }

    /// Tear down the current link (DISC/UA).
    pub fn disconnect(&self) -> CommandResult {
        self.request(Command::Disconnect)
    }

    /// Transmit a line as a UI frame to the UNPROTO destination. Valid in any link state.
    pub fn send_unproto(&self, line: &str) -> CommandResult {
        self.request(Command::SendUnproto(line.to_owned()))
    }

    /// Transmit a line as an I-frame to the connected peer.
    pub fn send_linked(&self, line: &str) -> CommandResult {
        self.request(Command::SendLinked(line.to_owned()))
    }

    pub fn set_unproto(&self, dest: StationAddress, path: Vec<StationAddress>) -> CommandResult {
        self.request(Command::SetUnproto(dest, path))
    }

    /// Close and reopen the modem connection, reloading persisted settings.
    pub fn reconnect(&self) -> CommandResult {
        self.request(Command::Reconnect)
    }

    pub fn set_txdelay(&self, ms: u32) -> CommandResult {
        self.request(Command::SetTxDelay(ms))
    }

    pub fn set_monitor(&self, on: bool) -> CommandResult {
        self.request(Command::SetMonitor(on))
    }

    pub fn set_monitor_detail(&self, on: bool) -> CommandResult {
        self.request(Command::SetMonitorDetail(on))
    }

    pub fn set_mycall(&self, mycall: StationAddress) -> CommandResult {
        self.request(Command::SetMycall(mycall))
    }

    pub fn state(&self) -> LinkState {
        let (reply_tx, reply_rx) = mpsc::channel();
        if self.event_tx.send(SessionEvent::State(reply_tx)).is_err() {
            return LinkState::Idle;
        }
        reply_rx.recv().unwrap_or(LinkState::Idle)
    }

    /// Shut down the session. Any command still waiting on a handshake returns `Cancelled`.
    pub fn close(&self) {
        let _ = self.event_tx.send(SessionEvent::Close);
    }

    fn request(&self, command: Command) -> CommandResult {
        let (reply_tx, reply_rx) = mpsc::channel();
        if self
            .event_tx
            .send(SessionEvent::Command(command, reply_tx))
            .is_err()
        {
            return CommandResult::cancelled();
        }
        reply_rx.recv().unwrap_or_else(|_| CommandResult::cancelled())
    }
}

impl Drop for Tnc2App {
    fn drop(&mut self) {
        self.close();
    }
}

type Reply = Sender<CommandResult>;

enum Command {
    Connect(StationAddress, Vec<StationAddress>),
    Disconnect,
    SendUnproto(String),
    SendLinked(String),
    SetUnproto(StationAddress, Vec<StationAddress>),
    Reconnect,
    SetTxDelay(u32),
    SetMonitor(bool),
    SetMonitorDetail(bool),
    SetMycall(StationAddress),
}

/// Everything the worker reacts to, in the order it happened.
enum SessionEvent {
    Command(Command, Reply),
    State(Sender<LinkState>),
    /// A KISS data frame from the reader of the given transport generation.
    Received {
        generation: u64,
        port: u8,
        payload: Vec<u8>,
    },
    ReaderEnded {
        generation: u64,
    },
    Close,
}

struct SessionWorker<F: TncFactory> {
    factory: F,
    config: TncConfig,
    monitor: Box<dyn MonitorAdapter>,
    settings: Box<dyn SettingsProvider>,
    /// Handed to each reader thread.
    event_tx: SyncSender<SessionEvent>,
    transport: Option<KissTransport<F::Tnc>>,
    /// Incremented on every (re)open so events from old readers can be ignored.
    generation: u64,
    link: Link<Reply>,
    parse_errors: u64,
}

fn spawn_worker<F: TncFactory>(mut worker: SessionWorker<F>, event_rx: Receiver<SessionEvent>) {
    std::thread::spawn(move || {
        if let Err(e) = worker.open_transport() {
            warn!("{e}");
        }
        loop {
            let deadline = worker.link.deadline();
            if deadline.is_some_and(|d| d <= Instant::now()) {
                worker.handle_timeout();
                continue;
            }
            let ev = match deadline {
                Some(deadline) => {
                    match event_rx.recv_timeout(deadline.saturating_duration_since(Instant::now()))
                    {
                        Ok(ev) => ev,
                        Err(RecvTimeoutError::Timeout) => {
                            worker.handle_timeout();
                            continue;
                        }
                        Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                None => match event_rx.recv() {
                    Ok(ev) => ev,
                    Err(_) => break,
                },
            };
            match ev {
                SessionEvent::Command(command, reply) => worker.handle_command(command, reply),
                SessionEvent::State(reply) => {
                    let _ = reply.send(worker.link.public());
                }
                SessionEvent::Received {
                    generation,
                    port,
                    payload,
                } => {
                    if generation == worker.generation {
                        worker.handle_payload(port, &payload);
                    }
                }
                SessionEvent::ReaderEnded { generation } => {
                    if generation == worker.generation {
                        worker.transport_lost();
                    }
                }
                SessionEvent::Close => {
                    worker.shutdown();
                    break;
                }
            }
        }
        debug!("session worker finished");
    });
}

fn spawn_reader<T: Tnc>(tnc: T, generation: u64, event_tx: SyncSender<SessionEvent>) {
    std::thread::spawn(move || {
        for (port, payload) in KissReceiver::new(tnc) {
            let ev = SessionEvent::Received {
                generation,
                port,
                payload,
            };
            if event_tx.send(ev).is_err() {
                return;
            }
        }
        let _ = event_tx.send(SessionEvent::ReaderEnded { generation });
    });
}

impl<F: TncFactory> SessionWorker<F> {
    fn open_transport(&mut self) -> Result<(), Tnc2Error> {
        self.generation += 1;
        let mut tnc = self.factory.open()?;
        let reader = tnc.try_clone()?;
        spawn_reader(reader, self.generation, self.event_tx.clone());
        let mut transport = KissTransport::new(tnc, self.config.kiss_port);
        if let Some(ms) = self.config.txdelay_ms {
            if let Err(e) = transport.set_txdelay(ms) {
                let _ = transport.get_mut().close();
                return Err(e.into());
            }
        }
        self.transport = Some(transport);
        info!("KISS modem connection open");
        Ok(())
    }

    fn close_transport(&mut self) {
        if let Some(mut transport) = self.transport.take() {
            if let Err(e) = transport.get_mut().close() {
                debug!("tnc close err: {e}");
            }
        }
    }

    /// Send one AX.25 frame. A failed write drops the transport; the reader notices shortly after.
    fn transmit(&mut self, frame: &[u8]) -> Result<(), Tnc2Error> {
        let transport = self.transport.as_mut().ok_or(TncError::NotConnected)?;
        if let Err(e) = transport.send_data(frame) {
            warn!("kiss send err: {e}");
            self.close_transport();
            return Err(e.into());
        }
        Ok(())
    }

    fn send_control(&mut self, peer: &Peer, control: u8) -> Result<(), Tnc2Error> {
        let frame = build_u_frame(self.config.mycall.address(), &peer.address, &peer.path, control)?;
        self.transmit(&frame)
    }

    /// Reply to an inbound frame along the reverse of the path it arrived on.
    ///
    /// Returns whether the reply was handed to the modem.
    fn answer(&mut self, frame: &Frame, control: u8) -> bool {
        let path = reverse_path(&frame.path);
        let result = build_u_frame(self.config.mycall.address(), &frame.source, &path, control)
            .map_err(Tnc2Error::from)
            .and_then(|bytes| self.transmit(&bytes));
        if let Err(e) = result {
            warn!("unable to answer {}: {e}", frame.source);
            return false;
        }
        true
    }

    fn handle_command(&mut self, command: Command, reply: Reply) {
        let result = match command {
            Command::Connect(peer, path) => return self.connect(peer, path, reply),
            Command::Disconnect => return self.disconnect(reply),
            Command::SendUnproto(line) => self.send_unproto(&line),
            Command::SendLinked(line) => self.send_linked(&line),
            Command::SetUnproto(dest, path) => self.set_unproto(dest, path),
            Command::Reconnect => self.reconnect(),
            Command::SetTxDelay(ms) => self.set_txdelay(ms),
            Command::SetMonitor(on) => {
                self.config.monitor = on;
                Ok(CommandResult::done(format!("MONITOR {}", on_off(on))))
            }
            Command::SetMonitorDetail(on) => {
                self.config.monitor_detail = on;
                Ok(CommandResult::done(format!("MONITOR DETAIL {}", on_off(on))))
            }
            Command::SetMycall(mycall) => {
                // Takes effect for frames sent and matched from now on, even mid-link
                self.config.mycall = mycall;
                Ok(CommandResult::done(format!("MYCALL {mycall}")))
            }
        };
        let _ = reply.send(result.unwrap_or_else(failure));
    }

    fn connect(&mut self, peer: StationAddress, path: Vec<StationAddress>, reply: Reply) {
        if !matches!(self.link, Link::Idle) {
            let _ = reply.send(self.link_busy());
            return;
        }
        let peer = Peer::new(*peer.address(), to_addresses(&path));
        if let Err(e) = self.send_control(&peer, CTL_SABM) {
            let _ = reply.send(failure(e));
            return;
        }
        info!("connecting to {}", peer.station());
        self.link = Link::ConnectPending(Pending {
            peer,
            attempts: 1,
            deadline: Instant::now() + self.config.t1,
            reply,
        });
    }

    fn disconnect(&mut self, reply: Reply) {
        let peer = match mem::replace(&mut self.link, Link::Idle) {
            Link::Connected(peer) => peer,
            other => {
                self.link = other;
                let _ = reply.send(self.link_busy());
                return;
            }
        };
        if let Err(e) = self.send_control(&peer, CTL_DISC) {
            let _ = reply.send(failure(e));
            return;
        }
        info!("disconnecting from {}", peer.station());
        self.link = Link::DisconnectPending(Pending {
            peer,
            attempts: 1,
            deadline: Instant::now() + self.config.t1,
            reply,
        });
    }

    fn send_unproto(&mut self, line: &str) -> Result<CommandResult, Tnc2Error> {
        let Some(dest) = self.config.unproto_dest else {
            warn!("UNPROTO destination not set, not sending");
            return Ok(CommandResult::new(
                CommandOutcome::NoDestination,
                "UNPROTO not set. Example: UNPROTO CQ VIA WIDE1-1,WIDE2-1",
            ));
        };
        let frame = build_ui_frame(
            self.config.mycall.address(),
            dest.address(),
            &to_addresses(&self.config.unproto_path),
            &line_bytes(line),
        )?;
        self.transmit(&frame)?;
        Ok(CommandResult::done(""))
    }

    fn send_linked(&mut self, line: &str) -> Result<CommandResult, Tnc2Error> {
        // N(R) stays 0: received I-frames are not tracked or acknowledged
        let frame = match &self.link {
            Link::Connected(peer) => build_i_frame(
                self.config.mycall.address(),
                &peer.address,
                &peer.path,
                peer.ns,
                0,
                &line_bytes(line),
            )?,
            _ => return Ok(self.not_linked()),
        };
        self.transmit(&frame)?;
        if let Link::Connected(peer) = &mut self.link {
            peer.ns = (peer.ns + 1) % 8;
        }
        Ok(CommandResult::done("").linked())
    }

    fn set_unproto(
        &mut self,
        dest: StationAddress,
        path: Vec<StationAddress>,
    ) -> Result<CommandResult, Tnc2Error> {
        if path.len() > MAX_PATH_LEN {
            return Err(Tnc2Error::PathTooLong(path.len()));
        }
        let message = format!("UNPROTO {dest}{}", format_path(&path));
        self.config.unproto_dest = Some(dest);
        self.config.unproto_path = path;
        Ok(CommandResult::done(message))
    }

    fn set_txdelay(&mut self, ms: u32) -> Result<CommandResult, Tnc2Error> {
        self.config.txdelay_ms = Some(ms);
        let transport = self.transport.as_mut().ok_or(TncError::NotConnected)?;
        if let Err(e) = transport.set_txdelay(ms) {
            self.close_transport();
            return Err(e.into());
        }
        Ok(CommandResult::done(format!("TXDELAY {ms} ms")))
    }

    fn reconnect(&mut self) -> Result<CommandResult, Tnc2Error> {
        self.abandon_link(CommandResult::cancelled());
        self.close_transport();
        self.settings.reload(&mut self.config);
        self.open_transport()?;
        Ok(CommandResult::done("*** reconnected to KISS modem"))
    }

    fn link_busy(&self) -> CommandResult {
        let message = match &self.link {
            Link::Idle => return self.not_linked(),
            Link::Connected(peer) => format!("*** already connected to {}", peer.station()),
            Link::ConnectPending(p) | Link::DisconnectPending(p) => {
                format!("*** link busy with {}", p.peer.station())
            }
        };
        CommandResult::new(CommandOutcome::InvalidState, message)
    }

    fn not_linked(&self) -> CommandResult {
        CommandResult::new(CommandOutcome::InvalidState, "*** not connected")
    }

    fn handle_timeout(&mut self) {
        match mem::replace(&mut self.link, Link::Idle) {
            Link::ConnectPending(mut pending) => {
                let station = pending.peer.station();
                if pending.attempts >= self.config.n2 {
                    info!("no answer from {station} after {} attempts", pending.attempts);
                    let _ = pending.reply.send(CommandResult::new(
                        CommandOutcome::HandshakeTimeout,
                        format!("*** retry count exceeded\n*** DISCONNECTED from {station}"),
                    ));
                    return;
                }
                pending.attempts += 1;
                debug!("SABM attempt {} to {station}", pending.attempts);
                if let Err(e) = self.send_control(&pending.peer, CTL_SABM) {
                    let _ = pending.reply.send(failure(e));
                    return;
                }
                pending.deadline = Instant::now() + self.config.t1;
                self.link = Link::ConnectPending(pending);
            }
            Link::DisconnectPending(pending) => {
                let station = pending.peer.station();
                info!("no answer to DISC from {station}");
                let _ = pending.reply.send(CommandResult::new(
                    CommandOutcome::DisconnectTimeout,
                    format!("*** DISCONNECTED from {station} (no response)"),
                ));
            }
            other => self.link = other,
        }
    }

    fn handle_payload(&mut self, port: u8, payload: &[u8]) {
        let Some(frame) = Frame::parse(payload) else {
            self.parse_errors += 1;
            debug!(
                "dropping unparseable {} byte frame ({} so far)",
                payload.len(),
                self.parse_errors
            );
            return;
        };
        if self.config.monitor {
            let line = MonitorLine::new(&frame, self.config.monitor_detail);
            self.monitor.frame_heard(&line);
        }
        if port != self.config.kiss_port || frame.destination != *self.config.mycall.address() {
            return;
        }
        match FrameKind::classify(frame.control) {
            FrameKind::Sabm => self.on_sabm(&frame),
            FrameKind::Ua => self.on_ua(&frame),
            FrameKind::Dm => self.on_dm(&frame),
            FrameKind::Disc => self.on_disc(&frame),
            FrameKind::I { .. } => self.on_iframe(&frame),
            _ => (),
        }
    }

    fn on_sabm(&mut self, frame: &Frame) {
        // Always acknowledged so the remote end stops retrying, even if we are busy with
        // another station. No UA on the air means no link.
        if !self.answer(frame, CTL_UA) {
            return;
        }
        let from = StationAddress::from(frame.source);
        self.link = match mem::replace(&mut self.link, Link::Idle) {
            Link::Idle => {
                info!("connected from {from}");
                self.monitor.link_event(LinkEvent::ConnectedFrom(from));
                Link::Connected(Peer::new(frame.source, reverse_path(&frame.path)))
            }
            Link::Connected(mut peer) if peer.address == frame.source => {
                debug!("link reset by {from}");
                peer.ns = 0;
                Link::Connected(peer)
            }
            Link::ConnectPending(pending) if pending.peer.address == frame.source => {
                self.complete_connect(pending)
            }
            other => {
                debug!("acknowledged SABM from {from} while busy");
                other
            }
        };
    }

    fn on_ua(&mut self, frame: &Frame) {
        self.link = match mem::replace(&mut self.link, Link::Idle) {
            Link::ConnectPending(pending) if pending.peer.address == frame.source => {
                self.complete_connect(pending)
            }
            Link::DisconnectPending(pending) if pending.peer.address == frame.source => {
                complete_disconnect(pending);
                Link::Idle
            }
            other => other,
        };
    }

    fn on_dm(&mut self, frame: &Frame) {
        let from = StationAddress::from(frame.source);
        self.link = match mem::replace(&mut self.link, Link::Idle) {
            Link::ConnectPending(pending) if pending.peer.address == frame.source => {
                info!("{from} refused connection");
                let _ = pending.reply.send(CommandResult::new(
                    CommandOutcome::PeerRejected,
                    format!("*** {from} busy\n*** DISCONNECTED"),
                ));
                Link::Idle
            }
            Link::DisconnectPending(pending) if pending.peer.address == frame.source => {
                complete_disconnect(pending);
                Link::Idle
            }
            Link::Connected(peer) if peer.address == frame.source => {
                info!("{from} dropped the link");
                self.monitor.link_event(LinkEvent::DroppedByPeer(from));
                Link::Idle
            }
            other => other,
        };
    }

    fn on_disc(&mut self, frame: &Frame) {
        let _ = self.answer(frame, CTL_UA);
        let from = StationAddress::from(frame.source);
        self.link = match mem::replace(&mut self.link, Link::Idle) {
            Link::Connected(peer) if peer.address == frame.source => {
                info!("disconnected by {from}");
                self.monitor
                    .link_event(LinkEvent::DisconnectedByPeer(from));
                Link::Idle
            }
            Link::DisconnectPending(pending) if pending.peer.address == frame.source => {
                complete_disconnect(pending);
                Link::Idle
            }
            other => other,
        };
    }

    fn on_iframe(&mut self, frame: &Frame) {
        if let Link::Connected(peer) = &self.link {
            if peer.address == frame.source {
                self.monitor.data_received(&peer.station(), &frame.info);
            }
        }
    }

    fn complete_connect(&mut self, pending: Pending<Reply>) -> Link<Reply> {
        let station = pending.peer.station();
        info!("connected to {station}");
        let _ = pending.reply.send(
            CommandResult::new(
                CommandOutcome::Connected,
                format!("*** CONNECTED to {station}"),
            )
            .linked(),
        );
        Link::Connected(Peer {
            ns: 0,
            ..pending.peer
        })
    }

    /// Drop any link, completing a waiting command with `result`.
    fn abandon_link(&mut self, result: CommandResult) {
        if let Link::ConnectPending(p) | Link::DisconnectPending(p) =
            mem::replace(&mut self.link, Link::Idle)
        {
            let _ = p.reply.send(result);
        }
    }

    fn transport_lost(&mut self) {
        warn!("lost connection to KISS modem");
        self.close_transport();
        self.abandon_link(CommandResult::new(
            CommandOutcome::NotConnected,
            "*** lost connection to KISS modem",
        ));
        self.monitor.link_event(LinkEvent::TransportLost);
    }

    fn shutdown(&mut self) {
        self.abandon_link(CommandResult::cancelled());
        self.close_transport();
    }
}

fn complete_disconnect(pending: Pending<Reply>) {
    let station = pending.peer.station();
    info!("disconnected from {station}");
    let _ = pending.reply.send(CommandResult::new(
        CommandOutcome::Disconnected,
        format!("*** DISCONNECTED from {station}"),
    ));
}

fn failure(err: Tnc2Error) -> CommandResult {
    let outcome = match err {
        Tnc2Error::Tnc(_) => CommandOutcome::NotConnected,
        _ => CommandOutcome::InvalidArgument,
    };
    CommandResult::new(outcome, format!("*** {err}"))
}

fn reverse_path(path: &[Address]) -> Vec<Address> {
    path.iter().rev().copied().collect()
}

/// Lines go out with a carriage return, as a TNC-2 does in converse mode.
fn line_bytes(line: &str) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(line.len() + 1);
    bytes.extend_from_slice(line.as_bytes());
    bytes.push(b'\r');
    bytes
}

fn on_off(on: bool) -> &'static str {
    if on { "ON" } else { "OFF" }
}
