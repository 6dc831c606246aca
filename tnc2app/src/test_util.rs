use std::collections::VecDeque;
use std::io::{self, ErrorKind, Read, Write};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tnc2core::address::Address;
use tnc2core::kiss::{KissBuffer, KissCommand, KissFrame};
use tnc2core::monitor::MonitorLine;
use tnc2core::protocol::{Frame, build_u_frame};

use crate::adapter::MonitorAdapter;
use crate::session::LinkEvent;
use crate::station::StationAddress;
use crate::tnc::{Tnc, TncError, TncFactory};

type Responder = Box<dyn FnMut(&Frame) -> Vec<Vec<u8>> + Send>;

/// Stands in for a KISS modem and every station on the air beyond it.
///
/// Each AX.25 frame the session transmits is recorded and passed to the responder,
/// whose return values are delivered back to the session as received frames.
#[derive(Clone)]
pub(crate) struct ScriptedModem {
    state: Arc<Mutex<ModemState>>,
}

struct ModemState {
    responder: Responder,
    kiss_in: KissBuffer,
    sent: Vec<Frame>,
    commands: Vec<KissFrame>,
    to_host: Option<Sender<Vec<u8>>>,
    opens: usize,
    refuse: bool,
    fail_writes: bool,
}

impl ScriptedModem {
    pub(crate) fn new(responder: impl FnMut(&Frame) -> Vec<Vec<u8>> + Send + 'static) -> Self {
        Self {
            state: Arc::new(Mutex::new(ModemState {
                responder: Box::new(responder),
                kiss_in: KissBuffer::new(),
                sent: vec![],
                commands: vec![],
                to_host: None,
                opens: 0,
                refuse: false,
                fail_writes: false,
            })),
        }
    }

    /// Nobody answers.
    pub(crate) fn silent() -> Self {
        Self::new(|_| vec![])
    }

    /// Far end that answers the listed control values with UA.
    pub(crate) fn acking(controls: &'static [u8], ack: u8) -> Self {
        Self::new(move |f| {
            if controls.contains(&f.control) {
                vec![answer(f, ack)]
            } else {
                vec![]
            }
        })
    }

    pub(crate) fn refuse_connections(&self, refuse: bool) {
        self.state.lock().unwrap().refuse = refuse;
    }

    /// Make every write from the session fail while reads keep working.
    pub(crate) fn fail_writes(&self, fail: bool) {
        self.state.lock().unwrap().fail_writes = fail;
    }

    /// Drop the current connection as if the modem went away.
    pub(crate) fn hang_up(&self) {
        self.state.lock().unwrap().to_host = None;
    }

    /// Deliver an AX.25 frame to the session on KISS port 0.
    pub(crate) fn inject(&self, payload: &[u8]) {
        self.inject_raw(KissFrame::new_data(0, payload).as_bytes());
    }

    pub(crate) fn inject_raw(&self, bytes: &[u8]) {
        if let Some(tx) = &self.state.lock().unwrap().to_host {
            let _ = tx.send(bytes.to_vec());
        }
    }

    pub(crate) fn sent(&self) -> Vec<Frame> {
        self.state.lock().unwrap().sent.clone()
    }

    pub(crate) fn sent_with_control(&self, control: u8) -> usize {
        self.sent().iter().filter(|f| f.control == control).count()
    }

    /// Non-data KISS frames the session wrote, such as TXDELAY.
    pub(crate) fn commands(&self) -> Vec<KissFrame> {
        self.state.lock().unwrap().commands.clone()
    }

    pub(crate) fn opens(&self) -> usize {
        self.state.lock().unwrap().opens
    }
}

impl TncFactory for ScriptedModem {
    type Tnc = ScriptedTnc;

    fn open(&mut self) -> Result<ScriptedTnc, TncError> {
        let mut state = self.state.lock().unwrap();
        if state.refuse {
            return Err(TncError::Io(io::Error::from(ErrorKind::ConnectionRefused)));
        }
        let (tx, rx) = mpsc::channel();
        state.to_host = Some(tx);
        state.opens += 1;
        Ok(ScriptedTnc {
            modem: self.clone(),
            host: Arc::new(Mutex::new(HostSide {
                rx,
                pending: VecDeque::new(),
            })),
        })
    }
}

#[derive(Clone)]
pub(crate) struct ScriptedTnc {
    modem: ScriptedModem,
    host: Arc<Mutex<HostSide>>,
}

/// Bytes on their way from the modem to the session.
struct HostSide {
    rx: Receiver<Vec<u8>>,
    pending: VecDeque<u8>,
}

impl Read for ScriptedTnc {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut host = self.host.lock().unwrap();
        if host.pending.is_empty() {
            match host.rx.recv() {
                Ok(chunk) => host.pending.extend(chunk),
                Err(_) => return Ok(0),
            }
        }
        let n = buf.len().min(host.pending.len());
        for (dst, src) in buf.iter_mut().zip(host.pending.drain(..n)) {
            *dst = src;
        }
        Ok(n)
    }
}

impl Write for ScriptedTnc {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut guard = self.modem.state.lock().unwrap();
        let state = &mut *guard;
        if state.to_host.is_none() || state.fail_writes {
            return Err(io::Error::from(ErrorKind::BrokenPipe));
        }
        let n = state.kiss_in.extend(buf);
        while let Some(frame) = state.kiss_in.next_frame() {
            if frame.command() != Ok(KissCommand::DataFrame) {
                state.commands.push(frame);
                continue;
            }
            let Some(parsed) = frame.payload().ok().and_then(|p| Frame::parse(&p)) else {
                continue;
            };
            let replies = (state.responder)(&parsed);
            state.sent.push(parsed);
            if let Some(tx) = &state.to_host {
                for reply in replies {
                    let _ = tx.send(KissFrame::new_data(0, &reply).as_bytes().to_vec());
                }
            }
        }
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Tnc for ScriptedTnc {
    fn try_clone(&mut self) -> Result<Self, TncError> {
        Ok(self.clone())
    }

    fn close(&mut self) -> Result<(), TncError> {
        self.modem.hang_up();
        Ok(())
    }
}

/// Collects everything reported to the monitor adapter.
#[derive(Clone, Default)]
pub(crate) struct RecordingMonitor {
    pub(crate) lines: Arc<Mutex<Vec<MonitorLine>>>,
    pub(crate) events: Arc<Mutex<Vec<LinkEvent>>>,
    pub(crate) data: Arc<Mutex<Vec<(StationAddress, Vec<u8>)>>>,
}

impl MonitorAdapter for RecordingMonitor {
    fn frame_heard(&self, line: &MonitorLine) {
        self.lines.lock().unwrap().push(line.clone());
    }

    fn link_event(&self, event: LinkEvent) {
        self.events.lock().unwrap().push(event);
    }

    fn data_received(&self, from: &StationAddress, data: &[u8]) {
        self.data.lock().unwrap().push((*from, data.to_vec()));
    }
}

/// Reply to `frame` from the station it was addressed to.
pub(crate) fn answer(frame: &Frame, control: u8) -> Vec<u8> {
    let path: Vec<Address> = frame.path.iter().rev().copied().collect();
    build_u_frame(&frame.destination, &frame.source, &path, control).unwrap()
}

/// Poll `condition` for up to five seconds.
pub(crate) fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    condition()
}
