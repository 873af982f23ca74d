//! Talk to an OpenTherm Gateway (OTGW) over its serial command and reporting protocol.
//!
//! # Overview
//!
//! The `otgw` crate implements the line-based protocol spoken by the
//! OpenTherm Gateway, a device sitting between a room thermostat and a boiler.
//! It offers an asynchronous, platform-agnostic API that:
//!
//! - Validates and submits commands (e.g. `TT=19.5`) and matches the gateway's responses.
//! - Decodes the OpenTherm frames reported by the gateway into labeled values.
//! - Keeps track of the latest value reported for each Data-ID and direction.
//! - Probes the gateway's version, operating mode and hot water setting after connecting.
//!
//! The lower-level building blocks are available as separate modules:
//!
//! - [`command`] validates commands against the table of known command codes.
//! - [`frame`] classifies received lines and parses OpenTherm frames.
//! - [`message`] decodes frames into labeled values.
//! - [`queue`] matches responses to submitted commands.
//! - [`store`] keeps the latest decoded values.
//!
//! # Getting started
//!
//! The gateway exposes a serial interface configured as follows:
//!
//! - **Baud rate:** 9600
//! - **Parity:** None
//! - **Data bits:** 8
//! - **Stop bits:** 1
//!
//! If you enable the `native-serial` feature, [`serial::SerialLink`] provides
//! a compatible [`Transport`]. Any other byte stream implementing [`Transport`]
//! (e.g. a TCP connection to a network-attached gateway) works as well.
//!
//! # Examples
//!
//! ```no_run
//! use otgw::{Data, Event, Gateway, Transport};
//!
//! async fn monitor<T: Transport>(link: T) -> otgw::Result<(), T::Error> {
//!     let mut gw = Gateway::new(link);
//!
//!     gw.connect().await?;
//!
//!     while let Some(event) = gw.next_event().await {
//!         match event {
//!             Event::Initialized => {
//!                 let _reply = gw.send_command("TT=19.5").await?;
//!             }
//!             Event::Data { data: Data::Message(msg), .. } => {
//!                 println!("{}: {:?}", msg.label, msg.value);
//!             }
//!             _ => {}
//!         }
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! # Protocol details
//!
//! Commands consist of a two-letter code and a value, e.g. `TT=19.5`, terminated by CRLF.
//! The gateway answers each command with a line starting with the same code, e.g. `TT: 19.50`.
//! Responses are not guaranteed to arrive in submission order, so each response is
//! matched against the oldest pending command with the same code.
//!
//! No timeouts are applied. A command the gateway never answers stays pending.

#![no_std]
#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

extern crate alloc;

pub mod command;
pub mod frame;
pub mod message;
pub mod queue;
pub mod store;
pub mod summary;
pub mod transport;

#[cfg(feature = "native-serial")]
#[cfg_attr(docsrs, doc(cfg(feature = "native-serial")))]
pub mod serial;

pub use embedded_io_async;
pub use transport::Transport;

use crate::{
    command::{Command, CommandError},
    frame::{ErrorCode, Line, Malformed},
    message::Message,
    queue::{CorrelationQueue, Response},
    store::DataStore,
    summary::SummaryRecord,
};
use alloc::{collections::VecDeque, string::String, vec::Vec};
use core::fmt::{Display, Formatter};
use embedded_io_async::{Error as _, ErrorKind};
use futures_channel::oneshot;
use log::{debug, trace, warn};

/// A specialized [`Result`] type for [`Gateway`] operations.
///
/// Uses [`Error<E>`] as the error variant, which can include transport-specific errors.
pub type Result<T, E> = core::result::Result<T, Error<E>>;

/// Error type for [`Gateway`] operations.
///
/// The generic parameter `E` allows the error type to carry a transport-specific error.
///
/// This enum is marked `#[non_exhaustive]` to allow for future variants.
#[non_exhaustive]
#[derive(PartialEq, Eq, Debug)]
pub enum Error<E> {
    /// The command was rejected before being sent.
    Command(CommandError),
    /// A transport-specific input/output error.
    Io(E),
}

impl<E: core::error::Error> Display for Error<E> {
    fn fmt(&self, f: &mut Formatter) -> core::fmt::Result {
        match self {
            Self::Command(err) => write!(f, "command rejected: {err}"),
            Self::Io(err) => write!(f, "input/output error: {err}"),
        }
    }
}

impl<E: core::error::Error> core::error::Error for Error<E> {}

impl<E> From<E> for Error<E> {
    fn from(err: E) -> Self {
        Self::Io(err)
    }
}

/// Operating mode of the gateway.
#[derive(strum::Display, strum::IntoStaticStr, PartialEq, Eq, Copy, Clone, Debug)]
pub enum Mode {
    /// The gateway intercepts and modifies OpenTherm traffic.
    Gateway,
    /// The gateway passively relays OpenTherm traffic.
    Monitor,
}

/// Connection state of a [`Gateway`].
#[derive(PartialEq, Eq, Copy, Clone, Debug)]
pub enum State {
    /// The transport is closed.
    Disconnected,
    /// The transport is being opened.
    Connecting,
    /// The transport is open, but the gateway has not been probed successfully.
    Connected,
    /// The gateway is being probed.
    Initializing,
    /// The gateway has been probed successfully.
    Initialized,
}

/// Future resolving to the gateway's [`Response`] to a submitted command.
///
/// Resolves to [`oneshot::Canceled`] if the [`Gateway`] is dropped before the response arrives.
pub type Reply = oneshot::Receiver<Response>;

/// Data reported by the gateway.
#[derive(PartialEq, Clone, Debug)]
pub enum Data {
    /// Decoded OpenTherm frame.
    Message(Message),
    /// Summary report.
    Summary(SummaryRecord),
}

/// Event emitted by a [`Gateway`].
///
/// This enum is marked `#[non_exhaustive]` to allow for future variants.
#[non_exhaustive]
#[derive(PartialEq, Clone, Debug)]
pub enum Event {
    /// The transport has been opened.
    Connected,
    /// The transport has been closed.
    Disconnected,
    /// The gateway has been probed successfully.
    Initialized,
    /// The transport failed to open, read or write.
    TransportError(ErrorKind),
    /// A command was rejected before being sent.
    CommandRejected(CommandError),
    /// A response arrived for which no command is pending.
    UnsolicitedResponse {
        /// Command code of the response.
        code: String,
        /// Received line.
        line: String,
    },
    /// A line could not be interpreted.
    MalformedData {
        /// Received line.
        line: String,
        /// Reason the line was rejected.
        reason: Malformed,
    },
    /// The gateway reported an error code.
    ProtocolError(ErrorCode),
    /// The gateway reported data.
    Data {
        /// Received line.
        raw: String,
        /// Decoded data.
        data: Data,
    },
}

/// Step of the probe sequence run after connecting.
#[derive(PartialEq, Eq, Copy, Clone, Debug)]
enum Probe {
    About,
    Mode,
    HotWater,
}

impl Probe {
    fn command(self) -> &'static str {
        match self {
            Self::About => "PR=A",
            Self::Mode => "PR=M",
            Self::HotWater => "PR=W",
        }
    }
}

/// Maximum length of a received line, excluding the line terminator.
const MAX_LINE_LEN: usize = 512;

/// Outcome of reading from the transport.
enum Received {
    Line(String),
    /// Partial line exceeding [`MAX_LINE_LEN`].
    Overflow(String),
    Closed,
}

/// Action taken once the response to a command arrives.
#[derive(Debug)]
enum Completion {
    Reply(oneshot::Sender<Response>),
    Probe(Probe),
}

/// Asynchronous OpenTherm Gateway session.
///
/// Requires a [`Transport`] for communication. Received lines are processed
/// one at a time, in order, while the caller pulls events using [`Gateway::next_event`].
///
/// # Examples
///
/// ```no_run
/// # async fn example<T: otgw::Transport>(link: T) -> otgw::Result<(), T::Error> {
/// let mut gw = otgw::Gateway::new(link);
///
/// gw.connect().await?;
///
/// let reply = gw.send_command("PR=A").await?;
///
/// while gw.pending() > 0 {
///     gw.next_event().await;
/// }
///
/// if let Ok(resp) = reply.await {
///     println!("Version: {}", resp.answer);
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Gateway<T> {
    transport: T,
    state: State,
    about: Option<String>,
    mode: Option<Mode>,
    hot_water_enabled: bool,
    summary_mode: bool,
    queue: CorrelationQueue<Completion>,
    store: DataStore,
    events: VecDeque<Event>,
    rx: Vec<u8>,
    discard_line: bool,
}

impl<T: Transport> Gateway<T> {
    /// Constructs a new, disconnected gateway session.
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            state: State::Disconnected,
            about: None,
            mode: None,
            hot_water_enabled: false,
            summary_mode: false,
            queue: CorrelationQueue::new(),
            store: DataStore::new(),
            events: VecDeque::new(),
            rx: Vec::new(),
            discard_line: false,
        }
    }

    /// Constructs a new gateway session and opens the transport.
    ///
    /// Failure to open the transport is reported as [`Event::TransportError`],
    /// leaving the session disconnected.
    pub async fn open(transport: T) -> Self {
        let mut gw = Self::new(transport);

        if let Err(err) = gw.connect().await {
            debug!("Failed to open transport: {err:?}");
        }

        gw
    }

    /// Opens the transport and starts probing the gateway.
    ///
    /// Does nothing if the session is already connected.
    pub async fn connect(&mut self) -> Result<(), T::Error> {
        if self.is_connected() {
            return Ok(());
        }

        self.state = State::Connecting;
        debug!("Opening transport");

        if let Err(err) = self.transport.open().await {
            self.events.push_back(Event::TransportError(err.kind()));
            self.state = State::Disconnected;

            return Err(err.into());
        }

        self.set_connected(true).await;

        Ok(())
    }

    /// Closes the transport.
    ///
    /// Pending commands are kept and may still be resolved after reconnecting.
    /// An unfinished probe is discarded and restarts on the next [`Gateway::connect`].
    pub async fn close(&mut self) -> Result<(), T::Error> {
        if !self.is_connected() {
            return Ok(());
        }

        let res = self.transport.close().await;

        if let Err(err) = &res {
            self.events.push_back(Event::TransportError(err.kind()));
        }

        self.set_connected(false).await;

        Ok(res?)
    }

    /// Validates and sends a command, e.g. `TT=19.5`.
    ///
    /// Returns a [`Reply`] resolving to the gateway's response.
    ///
    /// # Errors
    ///
    /// - [`Error::Command`] if the session is not connected or the command is invalid.
    ///   Nothing is written to the transport in this case.
    /// - [`Error::Io`] if writing to the transport fails.
    ///
    /// Both are reported as an [`Event`] as well.
    pub async fn send_command(&mut self, raw: &str) -> Result<Reply, T::Error> {
        let (tx, rx) = oneshot::channel();

        self.submit(raw, Completion::Reply(tx)).await?;

        Ok(rx)
    }

    /// Returns the next event, reading from the transport if none is queued.
    ///
    /// Returns `None` once the session is disconnected and all events have been returned.
    pub async fn next_event(&mut self) -> Option<Event> {
        loop {
            if let Some(event) = self.events.pop_front() {
                return Some(event);
            }

            if !self.is_connected() {
                return None;
            }

            match self.read_line().await {
                Ok(Received::Line(line)) => self.handle_line(&line).await,
                Ok(Received::Overflow(line)) => {
                    warn!("Dropping line exceeding {MAX_LINE_LEN} bytes");
                    self.events.push_back(Event::MalformedData {
                        line,
                        reason: Malformed::TooLong,
                    });
                }
                Ok(Received::Closed) => {
                    debug!("Transport closed");
                    self.set_connected(false).await;
                }
                Err(err) => {
                    self.events.push_back(Event::TransportError(err.kind()));
                    self.set_connected(false).await;
                }
            }
        }
    }

    /// Returns the next queued event without reading from the transport.
    pub fn pop_event(&mut self) -> Option<Event> {
        self.events.pop_front()
    }

    /// Processes a single line received from the gateway.
    ///
    /// Lines are normally read by [`Gateway::next_event`].
    /// Resulting events are queued.
    pub async fn handle_line(&mut self, line: &str) {
        trace!("Received line: {line:?}");

        match frame::classify(line, self.summary_mode) {
            Line::Reply { code, payload } => self.handle_reply(line, code, payload).await,
            Line::Summary(record) => self.events.push_back(Event::Data {
                raw: line.into(),
                data: Data::Summary(record),
            }),
            Line::Frame(frame) => {
                let msg = message::decode(frame);

                self.store.update(&msg);
                self.events.push_back(Event::Data {
                    raw: line.into(),
                    data: Data::Message(msg),
                });
            }
            Line::Error(code) => {
                warn!("Gateway reported error: {code} ({})", code.description());
                self.events.push_back(Event::ProtocolError(code));
            }
            Line::Malformed(reason) => {
                warn!("Dropping malformed line {line:?}: {reason}");
                self.events.push_back(Event::MalformedData {
                    line: line.into(),
                    reason,
                });
            }
        }
    }

    /// Returns the connection state.
    #[must_use]
    pub fn state(&self) -> State {
        self.state
    }

    /// Returns whether the transport is open.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        matches!(
            self.state,
            State::Connected | State::Initializing | State::Initialized
        )
    }

    /// Returns whether the gateway has been probed successfully.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.state == State::Initialized
    }

    /// Returns the version string reported by the gateway.
    #[must_use]
    pub fn about(&self) -> Option<&str> {
        self.about.as_deref()
    }

    /// Returns the operating mode reported by the gateway.
    #[must_use]
    pub fn mode(&self) -> Option<Mode> {
        self.mode
    }

    /// Returns whether domestic hot water is enabled, as reported by the gateway.
    #[must_use]
    pub fn hot_water_enabled(&self) -> bool {
        self.hot_water_enabled
    }

    /// Returns whether the gateway prints summary reports instead of frames.
    #[must_use]
    pub fn summary_mode(&self) -> bool {
        self.summary_mode
    }

    /// Returns the number of commands awaiting a response.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Returns the latest decoded values.
    #[must_use]
    pub fn data(&self) -> &DataStore {
        &self.store
    }

    /// Returns a reference to the transport.
    #[must_use]
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Returns a mutable reference to the transport.
    #[must_use]
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    async fn set_connected(&mut self, connected: bool) {
        if connected == self.is_connected() {
            return;
        }

        // Observers must never see an initialized but disconnected session
        self.set_initialized(false);

        if connected {
            debug!("Connected");
            self.state = State::Connected;
            self.events.push_back(Event::Connected);
            self.probe(Probe::About).await;
        } else {
            debug!("Disconnected");
            self.queue
                .retain(|entry| !matches!(entry.completion, Completion::Probe(_)));
            self.rx.clear();
            self.discard_line = false;
            self.state = State::Disconnected;
            self.events.push_back(Event::Disconnected);
        }
    }

    fn set_initialized(&mut self, initialized: bool) {
        if initialized == self.is_initialized() {
            return;
        }

        if initialized {
            debug!("Initialized");
            self.state = State::Initialized;
            self.events.push_back(Event::Initialized);
        } else {
            self.state = State::Connected;
        }
    }

    async fn probe(&mut self, step: Probe) {
        debug!("Probing gateway: {}", step.command());
        self.state = State::Initializing;

        if self
            .submit(step.command(), Completion::Probe(step))
            .await
            .is_err()
        {
            self.state = State::Connected;
        }
    }

    async fn advance_probe(&mut self, step: Probe, resp: Response) {
        if self.state != State::Initializing {
            debug!("Ignoring probe {} in state {:?}", step.command(), self.state);

            return;
        }

        if resp.mismatch {
            warn!(
                "Probe {} halted: unexpected response {:?}",
                step.command(),
                resp.echo
            );
            self.state = State::Connected;

            return;
        }

        match step {
            Probe::About => {
                self.about = Some(resp.answer);
                self.probe(Probe::Mode).await;
            }
            Probe::Mode => {
                self.mode = Some(if resp.answer == "G" {
                    Mode::Gateway
                } else {
                    Mode::Monitor
                });
                self.probe(Probe::HotWater).await;
            }
            Probe::HotWater => {
                self.hot_water_enabled = resp.answer == "1";
                self.set_initialized(true);
            }
        }
    }

    /// Validates a command, writes it to the transport and queues its completion.
    async fn submit(&mut self, raw: &str, completion: Completion) -> Result<(), T::Error> {
        let parsed = if self.is_connected() {
            command::parse(raw)
        } else {
            Err(CommandError::NotConnected)
        };
        let (cmd, value) = match parsed {
            Ok(parsed) => parsed,
            Err(err) => {
                warn!("Rejected command {raw:?}: {err}");
                self.events.push_back(Event::CommandRejected(err.clone()));

                return Err(Error::Command(err));
            }
        };

        if let Err(err) = self.write_line(raw).await {
            self.events.push_back(Event::TransportError(err.kind()));

            return Err(err.into());
        }

        self.queue.enqueue(cmd, value, completion);

        Ok(())
    }

    async fn handle_reply(&mut self, line: &str, code: &str, payload: &str) {
        let Some((completion, resp)) = self.queue.resolve(code, payload) else {
            warn!("Unsolicited response: {line:?}");
            self.events.push_back(Event::UnsolicitedResponse {
                code: code.into(),
                line: line.into(),
            });

            return;
        };

        if resp.command == Command::PrintSummary {
            self.summary_mode = resp.answer == "1";
            debug!("Summary mode: {}", self.summary_mode);
        }

        match completion {
            Completion::Reply(tx) => {
                // Receiver may have been dropped
                let _ = tx.send(resp);
            }
            Completion::Probe(step) => self.advance_probe(step, resp).await,
        }
    }

    /// Reads the next non-empty line from the transport.
    async fn read_line(&mut self) -> core::result::Result<Received, T::Error> {
        loop {
            if let Some(pos) = self.rx.iter().position(|&b| b == b'\n') {
                let mut line: Vec<u8> = self.rx.drain(..=pos).collect();

                if core::mem::take(&mut self.discard_line) {
                    continue;
                }

                line.pop();

                if line.last() == Some(&b'\r') {
                    line.pop();
                }

                if line.is_empty() {
                    continue;
                }

                return Ok(Received::Line(String::from_utf8_lossy(&line).into_owned()));
            }

            if self.rx.len() > MAX_LINE_LEN {
                let line = core::mem::take(&mut self.rx);

                if !self.discard_line {
                    self.discard_line = true;

                    return Ok(Received::Overflow(String::from_utf8_lossy(&line).into_owned()));
                }

                continue;
            }

            let mut buf = [0x00; 64];
            let len = self.transport.read(&mut buf).await?;

            if len == 0 {
                return Ok(Received::Closed);
            }

            trace!("Read from transport: {:02x?}", &buf[..len]);
            self.rx.extend_from_slice(&buf[..len]);
        }
    }

    /// Writes a line terminated by CRLF to the transport.
    async fn write_line(&mut self, line: &str) -> core::result::Result<(), T::Error> {
        trace!("Write to transport: {line:?}");
        self.transport.write_all(line.as_bytes()).await?;
        self.transport.write_all(b"\r\n").await?;
        self.transport.flush().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        frame::Direction,
        message::{Status, Value},
    };
    use alloc::boxed::Box;
    use embedded_io_async::{ErrorType, Read, Write};
    use log::LevelFilter;

    pub fn init_logger() {
        let _ = env_logger::builder()
            .filter_level(LevelFilter::max())
            .is_test(true)
            .try_init();
    }

    /// In-memory transport replaying scripted input.
    #[derive(Default, Debug)]
    struct Link {
        rx: VecDeque<u8>,
        tx: Vec<u8>,
        fail_open: bool,
        fail_write: bool,
    }

    impl Link {
        fn with_input(input: &str) -> Self {
            Self {
                rx: input.bytes().collect(),
                ..Self::default()
            }
        }
    }

    impl ErrorType for Link {
        type Error = ErrorKind;
    }

    impl Read for Link {
        async fn read(&mut self, buf: &mut [u8]) -> core::result::Result<usize, ErrorKind> {
            let len = buf.len().min(self.rx.len());

            for (dst, src) in buf.iter_mut().zip(self.rx.drain(..len)) {
                *dst = src;
            }

            Ok(len)
        }
    }

    impl Write for Link {
        async fn write(&mut self, buf: &[u8]) -> core::result::Result<usize, ErrorKind> {
            if self.fail_write {
                return Err(ErrorKind::BrokenPipe);
            }

            self.tx.extend_from_slice(buf);

            Ok(buf.len())
        }

        async fn flush(&mut self) -> core::result::Result<(), ErrorKind> {
            Ok(())
        }
    }

    #[async_trait::async_trait(?Send)]
    impl Transport for Link {
        async fn open(&mut self) -> core::result::Result<(), ErrorKind> {
            if self.fail_open {
                Err(ErrorKind::NotFound)
            } else {
                Ok(())
            }
        }

        async fn close(&mut self) -> core::result::Result<(), ErrorKind> {
            Ok(())
        }
    }

    fn written(gw: &mut Gateway<Link>) -> String {
        String::from_utf8(core::mem::take(&mut gw.transport_mut().tx)).unwrap()
    }

    fn drain_events(gw: &mut Gateway<Link>) -> Vec<Event> {
        core::iter::from_fn(|| gw.pop_event()).collect()
    }

    async fn initialized_gateway() -> Result<Gateway<Link>, ErrorKind> {
        let mut gw = Gateway::new(Link::default());

        gw.connect().await?;
        gw.handle_line("PR: A=OpenTherm Gateway 4.2.5").await;
        gw.handle_line("PR: M=G").await;
        gw.handle_line("PR: W=1").await;
        written(&mut gw);
        drain_events(&mut gw);

        Ok(gw)
    }

    #[tokio::test]
    async fn connect_and_probe() -> Result<(), ErrorKind> {
        init_logger();

        let mut gw = Gateway::new(Link::default());

        assert_eq!(gw.state(), State::Disconnected, "session should start disconnected");

        gw.connect().await?;

        assert_eq!(gw.pop_event(), Some(Event::Connected), "connected event should be emitted");
        assert_eq!(gw.state(), State::Initializing, "session should be initializing");
        assert_eq!(written(&mut gw), "PR=A\r\n", "about probe should be written");

        gw.handle_line("PR: A=OpenTherm Gateway 4.2.5").await;

        assert_eq!(written(&mut gw), "PR=M\r\n", "mode probe should be written");

        gw.handle_line("PR: M=G").await;

        assert_eq!(written(&mut gw), "PR=W\r\n", "hot water probe should be written");
        assert!(!gw.is_initialized(), "session should not be initialized yet");

        gw.handle_line("PR: W=1").await;

        assert_eq!(drain_events(&mut gw), [Event::Initialized], "initialized event should be emitted once");
        assert!(gw.is_initialized(), "session should be initialized");
        assert_eq!(gw.about(), Some("OpenTherm Gateway 4.2.5"), "about string should be correct");
        assert_eq!(gw.mode(), Some(Mode::Gateway), "mode should be gateway");
        assert!(gw.hot_water_enabled(), "hot water should be enabled");
        assert_eq!(gw.pending(), 0, "no commands should be pending");

        Ok(())
    }

    #[tokio::test]
    async fn connect_is_idempotent() -> Result<(), ErrorKind> {
        init_logger();

        let mut gw = Gateway::new(Link::default());

        gw.connect().await?;
        gw.connect().await?;

        assert_eq!(drain_events(&mut gw), [Event::Connected], "connected event should be emitted once");
        assert_eq!(written(&mut gw), "PR=A\r\n", "probe should be written once");

        Ok(())
    }

    #[tokio::test]
    async fn probe_monitor_mode() -> Result<(), ErrorKind> {
        init_logger();

        let mut gw = Gateway::new(Link::default());

        gw.connect().await?;
        gw.handle_line("PR: A=OpenTherm Gateway 4.2.5").await;
        gw.handle_line("PR: M=M").await;
        gw.handle_line("PR: W=0").await;

        assert!(gw.is_initialized(), "session should be initialized");
        assert_eq!(gw.mode(), Some(Mode::Monitor), "mode should be monitor");
        assert!(!gw.hot_water_enabled(), "hot water should be disabled");

        Ok(())
    }

    #[tokio::test]
    async fn probe_halts_on_mismatch() -> Result<(), ErrorKind> {
        init_logger();

        let mut gw = Gateway::new(Link::default());

        gw.connect().await?;
        gw.handle_line("PR: A=OpenTherm Gateway 4.2.5").await;
        gw.handle_line("PR: NG").await;

        assert_eq!(written(&mut gw), "PR=A\r\nPR=M\r\n", "hot water probe should not be written");
        assert_eq!(gw.state(), State::Connected, "session should fall back to connected");
        assert!(!gw.is_initialized(), "session should not be initialized");
        assert!(
            !drain_events(&mut gw).contains(&Event::Initialized),
            "initialized event should not be emitted"
        );

        Ok(())
    }

    #[tokio::test]
    async fn open_failure() {
        init_logger();

        let link = Link {
            fail_open: true,
            ..Link::default()
        };
        let mut gw = Gateway::open(link).await;

        assert_eq!(gw.state(), State::Disconnected, "session should stay disconnected");
        assert_eq!(
            gw.next_event().await,
            Some(Event::TransportError(ErrorKind::NotFound)),
            "transport error should be emitted"
        );
        assert_eq!(gw.next_event().await, None, "no further events should be emitted");
    }

    #[tokio::test]
    async fn reject_when_disconnected() {
        init_logger();

        let mut gw = Gateway::new(Link::default());
        let res = gw.send_command("TT=19.5").await;

        assert_eq!(
            res.err(),
            Some(Error::Command(CommandError::NotConnected)),
            "command should be rejected"
        );
        assert_eq!(
            gw.pop_event(),
            Some(Event::CommandRejected(CommandError::NotConnected)),
            "rejection should be emitted"
        );
        assert!(gw.transport().tx.is_empty(), "nothing should be written");
    }

    #[tokio::test]
    async fn validate_before_write() -> Result<(), ErrorKind> {
        init_logger();

        let mut gw = initialized_gateway().await?;

        for raw in [
            "TT=abc",
            "TT19.5",
            "XX=1",
            "GW=2",
            "SC=24:00/1",
            "OH=2",
            "DP=4a",
            "TT= 19.5",
            "HW=1\r\nGW=X",
        ] {
            assert!(
                matches!(gw.send_command(raw).await, Err(Error::Command(_))),
                "{raw} should be rejected"
            );
        }

        assert!(gw.transport().tx.is_empty(), "rejected commands should not be written");
        assert_eq!(gw.pending(), 0, "rejected commands should not be queued");
        assert_eq!(drain_events(&mut gw).len(), 9, "every rejection should be emitted");

        for raw in ["TT=19.5", "GW=1", "SC=7:05/3", "DP=4A", "HW=x"] {
            assert!(gw.send_command(raw).await.is_ok(), "{raw} should be accepted");
        }

        assert_eq!(
            written(&mut gw),
            "TT=19.5\r\nGW=1\r\nSC=7:05/3\r\nDP=4A\r\nHW=x\r\n",
            "accepted commands should be written"
        );
        assert_eq!(gw.pending(), 5, "accepted commands should be queued");

        Ok(())
    }

    #[tokio::test]
    async fn resolve_out_of_order() -> Result<(), ErrorKind> {
        init_logger();

        let mut gw = initialized_gateway().await?;
        let mut temporary = gw.send_command("TT=19.5").await?;
        let constant = gw.send_command("TC=16.0").await?;

        gw.handle_line("TC: 16.0").await;

        let resp = constant.await.unwrap();

        assert_eq!(resp.command, Command::ConstantTemperature, "TC should be resolved");
        assert!(!resp.mismatch, "echo should match");
        assert_eq!(temporary.try_recv(), Ok(None), "TT should still be pending");
        assert_eq!(gw.pending(), 1, "one command should be pending");

        gw.handle_line("TT: 19.50").await;

        let resp = temporary.await.unwrap();

        assert_eq!(resp.answer, "19.50", "answer should be correct");
        assert!(resp.mismatch, "differently formatted echo should be a mismatch");

        Ok(())
    }

    #[tokio::test]
    async fn unsolicited_response() -> Result<(), ErrorKind> {
        init_logger();

        let mut gw = initialized_gateway().await?;

        gw.handle_line("ZZ: 1").await;

        assert_eq!(
            drain_events(&mut gw),
            [Event::UnsolicitedResponse {
                code: "ZZ".into(),
                line: "ZZ: 1".into()
            }],
            "unsolicited response should be emitted"
        );
        assert!(gw.is_initialized(), "state should be untouched");
        assert!(gw.data().is_empty(), "data store should be untouched");

        Ok(())
    }

    #[tokio::test]
    async fn summary_mode() -> Result<(), ErrorKind> {
        init_logger();

        let line = "00000000/00000000,10.00,00000000/00000000,100.00,0/0,20.00,0.00,1.50,20.50,\
                    45.00,50.00,7.00,40.00,65/40,90/20,55.00,80.00,100,200,300,400,500,600,700,800";
        let mut gw = initialized_gateway().await?;
        let reply = gw.send_command("PS=1").await?;

        gw.handle_line("PS: 1").await;

        assert!(!reply.await.unwrap().mismatch, "echo should match");
        assert!(gw.summary_mode(), "summary mode should be enabled");

        gw.handle_line(line).await;

        let Some(Event::Data {
            data: Data::Summary(record),
            ..
        }) = gw.pop_event()
        else {
            panic!("summary should be emitted");
        };

        assert_eq!(record.iter().next().map(|(name, _)| name), Some("Status"), "first field should be status");
        assert_eq!(
            record.iter().last(),
            Some(("DHW burner operation hours", "800")),
            "last field should be correct"
        );

        gw.handle_line(line.rsplit_once(',').unwrap().0).await;

        assert!(
            matches!(
                gw.pop_event(),
                Some(Event::MalformedData {
                    reason: Malformed::FieldCount(24),
                    ..
                })
            ),
            "short summary should be malformed"
        );

        gw.send_command("PS=0").await?;
        gw.handle_line("PS: 0").await;

        assert!(!gw.summary_mode(), "summary mode should be disabled");

        Ok(())
    }

    #[tokio::test]
    async fn decode_and_store_frames() -> Result<(), ErrorKind> {
        init_logger();

        let mut gw = initialized_gateway().await?;

        gw.handle_line("B40190A00").await;
        gw.handle_line("BC0000300").await;

        let events = drain_events(&mut gw);

        assert!(
            matches!(&events[0], Event::Data { raw, data: Data::Message(msg) }
                if raw == "B40190A00" && msg.value == Value::Number(10.0)),
            "boiler temperature should be emitted"
        );
        assert_eq!(
            gw.data().get(Direction::FromBoiler, "BoilerWaterTemperature"),
            Some(&Value::Number(10.0)),
            "boiler temperature should be stored"
        );
        assert_eq!(
            gw.data().get(Direction::FromBoiler, "Status"),
            Some(&Value::Status(Status::from_bytes(0x03, 0x00))),
            "status should be stored"
        );
        assert_eq!(
            gw.data().status_labels(Direction::FromBoiler).map(|labels| labels["DomesticHotwaterEnable"]),
            Some("Enabled"),
            "status labels should be stored"
        );

        Ok(())
    }

    #[tokio::test]
    async fn report_errors_and_malformed_lines() -> Result<(), ErrorKind> {
        init_logger();

        let mut gw = initialized_gateway().await?;

        gw.handle_line("SE").await;
        gw.handle_line("X40190A00").await;
        gw.handle_line("B4019").await;

        assert_eq!(
            drain_events(&mut gw),
            [
                Event::ProtocolError(ErrorCode::SyntaxError),
                Event::MalformedData {
                    line: "X40190A00".into(),
                    reason: Malformed::Direction('X')
                },
                Event::MalformedData {
                    line: "B4019".into(),
                    reason: Malformed::Length(5)
                },
            ],
            "errors should be emitted in order"
        );
        assert!(gw.is_initialized(), "errors should not affect the session");

        Ok(())
    }

    #[tokio::test]
    async fn read_lines_until_closed() -> Result<(), ErrorKind> {
        init_logger();

        let mut gw = Gateway::new(Link::with_input("B40190A00\r\nNG\r\n\r\nXYZ\n"));

        gw.connect().await?;

        assert_eq!(gw.next_event().await, Some(Event::Connected), "connected event should be first");
        assert!(
            matches!(gw.next_event().await, Some(Event::Data { raw, .. }) if raw == "B40190A00"),
            "frame should be read"
        );
        assert_eq!(
            gw.next_event().await,
            Some(Event::ProtocolError(ErrorCode::NoGood)),
            "error code should be read"
        );
        assert_eq!(
            gw.next_event().await,
            Some(Event::MalformedData {
                line: "XYZ".into(),
                reason: Malformed::Length(3)
            }),
            "empty line should be skipped"
        );
        assert_eq!(gw.next_event().await, Some(Event::Disconnected), "end of input should disconnect");
        assert_eq!(gw.next_event().await, None, "no further events should be emitted");
        assert_eq!(gw.pending(), 0, "unanswered probe should be discarded");

        Ok(())
    }

    #[tokio::test]
    async fn disconnect_clears_initialized() -> Result<(), ErrorKind> {
        init_logger();

        let mut gw = initialized_gateway().await?;

        gw.close().await?;

        assert_eq!(drain_events(&mut gw), [Event::Disconnected], "disconnected event should be emitted");
        assert_eq!(gw.state(), State::Disconnected, "session should be disconnected");
        assert!(!gw.is_initialized(), "session should not be initialized");
        assert!(
            matches!(gw.send_command("TT=19.5").await, Err(Error::Command(CommandError::NotConnected))),
            "commands should be rejected after closing"
        );

        gw.connect().await?;

        assert_eq!(written(&mut gw), "PR=A\r\n", "probe should restart after reconnecting");

        Ok(())
    }

    #[tokio::test]
    async fn late_answer_after_close() -> Result<(), ErrorKind> {
        init_logger();

        let mut gw = Gateway::new(Link::default());

        gw.connect().await?;
        gw.close().await?;
        drain_events(&mut gw);
        gw.handle_line("PR: A=OpenTherm Gateway 4.2.5").await;

        assert_eq!(gw.state(), State::Disconnected, "session should stay disconnected");
        assert!(!gw.is_connected(), "session should not be connected");
        assert_eq!(written(&mut gw), "PR=A\r\n", "mode probe should not be written");
        assert!(
            matches!(drain_events(&mut gw).as_slice(), [Event::UnsolicitedResponse { .. }]),
            "late response should be unsolicited"
        );

        Ok(())
    }

    #[tokio::test]
    async fn reconnect_restarts_initialization() -> Result<(), ErrorKind> {
        init_logger();

        let mut gw = Gateway::new(Link::default());

        gw.connect().await?;

        let reply = gw.send_command("TT=19.5").await?;

        gw.close().await?;

        assert_eq!(gw.pending(), 1, "command should stay pending");

        gw.connect().await?;
        written(&mut gw);
        gw.handle_line("PR: A=OpenTherm Gateway 4.2.5").await;

        assert_eq!(written(&mut gw), "PR=M\r\n", "mode probe should be written");

        gw.handle_line("PR: M=G").await;

        assert_eq!(written(&mut gw), "PR=W\r\n", "hot water probe should be written");

        gw.handle_line("PR: W=1").await;

        assert!(gw.is_initialized(), "session should be initialized");
        assert_eq!(gw.about(), Some("OpenTherm Gateway 4.2.5"), "about string should be correct");

        gw.handle_line("TT: 19.5").await;

        assert!(!reply.await.unwrap().mismatch, "command should resolve after reconnecting");
        assert_eq!(gw.pending(), 0, "no commands should be pending");

        Ok(())
    }

    #[tokio::test]
    async fn drop_overlong_lines() -> Result<(), ErrorKind> {
        init_logger();

        let input = alloc::format!("{}\r\nNG\r\n", "B".repeat(1200));
        let mut gw = Gateway::new(Link::with_input(&input));

        gw.connect().await?;

        assert_eq!(gw.next_event().await, Some(Event::Connected), "connected event should be first");
        assert!(
            matches!(
                gw.next_event().await,
                Some(Event::MalformedData {
                    reason: Malformed::TooLong,
                    ..
                })
            ),
            "overlong line should be malformed"
        );
        assert_eq!(
            gw.next_event().await,
            Some(Event::ProtocolError(ErrorCode::NoGood)),
            "rest of the overlong line should be skipped"
        );
        assert_eq!(gw.next_event().await, Some(Event::Disconnected), "end of input should disconnect");

        Ok(())
    }

    #[tokio::test]
    async fn write_failure() -> Result<(), ErrorKind> {
        init_logger();

        let mut gw = initialized_gateway().await?;

        gw.transport_mut().fail_write = true;

        assert_eq!(
            gw.send_command("TT=19.5").await.err(),
            Some(Error::Io(ErrorKind::BrokenPipe)),
            "write error should be returned"
        );
        assert_eq!(
            drain_events(&mut gw),
            [Event::TransportError(ErrorKind::BrokenPipe)],
            "transport error should be emitted"
        );
        assert_eq!(gw.pending(), 0, "failed command should not be queued");
        assert!(gw.is_connected(), "write errors should not disconnect");

        Ok(())
    }

    #[tokio::test]
    async fn probe_write_failure() -> Result<(), ErrorKind> {
        init_logger();

        let link = Link {
            fail_write: true,
            ..Link::default()
        };
        let mut gw = Gateway::new(link);

        gw.connect().await?;

        assert_eq!(
            drain_events(&mut gw),
            [Event::Connected, Event::TransportError(ErrorKind::BrokenPipe)],
            "transport error should follow connecting"
        );
        assert_eq!(gw.state(), State::Connected, "probe should be halted");

        Ok(())
    }

    #[tokio::test]
    async fn dropping_gateway_cancels_replies() -> Result<(), ErrorKind> {
        init_logger();

        let mut gw = initialized_gateway().await?;
        let reply = gw.send_command("TT=19.5").await?;

        drop(gw);

        assert!(reply.await.is_err(), "reply should be canceled");

        Ok(())
    }

    #[tokio::test]
    async fn borrowed_transport() -> Result<(), ErrorKind> {
        init_logger();

        let mut link = Link::default();
        let mut gw = Gateway::new(&mut link);

        gw.connect().await?;
        drop(gw);

        assert_eq!(link.tx, b"PR=A\r\n", "probe should be written through the borrow");

        Ok(())
    }
}
