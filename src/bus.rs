// canlink/src/bus.rs
//
// The CAN bus handle.
//
// This file is part of the Rust 'canlink' library.
//
// Licensed under the MIT license:
//   <LICENSE or http://opensource.org/licenses/MIT>
// This file may not be copied, modified, or distributed except according
// to those terms.

//! The CAN bus handle.
//!
//! A [`CanBus`] owns at most one raw socket, bound to one named interface.
//! It starts out closed. Opening it runs these steps in order, stopping at
//! the first failure with the error for that step:
//!
//! ```text
//! create socket      -> BusError::SocketCreate
//! resolve interface  -> BusError::InterfaceNameToIndex
//! (FD only)
//!   query MTU        -> BusError::Mtu
//!   MTU == CANFD_MTU -> BusError::CanFdNotSupported
//!   enable FD frames -> BusError::EnableFdSupport
//! set read timeout   -> (failure only logged)
//! bind               -> BusError::Bind
//! ```
//!
//! A socket that fails part way through is closed before `open` returns.
//! The interface name, mode and timeout are recorded either way.
//!
//! Each `write` sends exactly one frame and each `read` receives at most
//! one. Nothing is retried.

use crate::{
    frame::{canfd_frame_default, decode, encode, CANFD_MTU},
    BusError, BusResult, CanAddr, CanRawSocket, Frame, IoError, IoErrorKind, IoResult, RawSocket,
    SocketMode, WireFrame,
};
use log::{debug, trace, warn};
use std::time::Duration;

/// The read timeout used when none is given.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(3);

// ===== BusConfig =====

/// Settings applied when a bus is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusConfig {
    /// How long a read waits for a frame. Zero waits forever.
    pub read_timeout: Duration,
    /// Whether to carry Classic or FD frames.
    pub mode: SocketMode,
}

impl BusConfig {
    /// Creates the default configuration: Classic frames, 3 ms read timeout.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the read timeout.
    pub fn with_read_timeout(mut self, read_timeout: Duration) -> Self {
        self.read_timeout = read_timeout;
        self
    }

    /// Sets the socket mode.
    pub fn with_mode(mut self, mode: SocketMode) -> Self {
        self.mode = mode;
        self
    }
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            read_timeout: DEFAULT_READ_TIMEOUT,
            mode: SocketMode::Classic,
        }
    }
}

// ===== CanBus =====

/// A handle to a CAN bus on one interface.
///
/// The handle can be moved but not copied. The socket is closed by
/// [`close`](CanBus::close) or when the handle is dropped, whichever
/// comes first.
///
/// A single handle is not meant to be shared between threads without
/// external locking.
#[derive(Debug)]
pub struct CanBus<S = CanRawSocket> {
    ifname: String,
    mode: SocketMode,
    read_timeout: Duration,
    sock: Option<S>,
}

impl CanBus<CanRawSocket> {
    /// Creates a closed handle backed by a SocketCAN socket.
    pub fn new() -> Self {
        Self::default()
    }
}

impl<S: RawSocket> CanBus<S> {
    /// Opens the bus on the named interface.
    ///
    /// The read timeout is in milliseconds.
    pub fn open(&mut self, ifname: &str, read_timeout_ms: u32, mode: SocketMode) -> BusResult<()> {
        let config = BusConfig::new()
            .with_read_timeout(Duration::from_millis(read_timeout_ms.into()))
            .with_mode(mode);
        self.open_with(ifname, &config)
    }

    /// Opens the bus on the named interface with the given settings.
    ///
    /// A socket left over from an earlier open is closed first.
    pub fn open_with(&mut self, ifname: &str, config: &BusConfig) -> BusResult<()> {
        self.release();

        self.ifname = ifname.to_owned();
        self.mode = config.mode;
        self.read_timeout = config.read_timeout;

        let sock = self.configure()?;
        self.sock = Some(sock);
        debug!("Opened {:?} CAN bus on '{}'", self.mode, self.ifname);
        Ok(())
    }

    // Runs the open sequence. Dropping `sock` on an early return closes it.
    fn configure(&self) -> BusResult<S> {
        let sock = S::create().map_err(BusError::SocketCreate)?;

        let ifindex = S::if_index(&self.ifname).map_err(|source| {
            BusError::InterfaceNameToIndex {
                ifname: self.ifname.clone(),
                source,
            }
        })?;
        debug!("CAN interface '{}' has index {}", self.ifname, ifindex);

        if self.mode.is_fd() {
            let mtu = sock.mtu(&self.ifname).map_err(BusError::Mtu)?;
            if mtu != CANFD_MTU {
                return Err(BusError::CanFdNotSupported { mtu });
            }
            sock.set_fd_frames(true).map_err(BusError::EnableFdSupport)?;
        }

        let timeout = Some(self.read_timeout).filter(|t| !t.is_zero());
        if let Err(err) = sock.set_read_timeout(timeout) {
            warn!(
                "Could not set read timeout on '{}', reads may block: {}",
                self.ifname, err
            );
        }

        sock.bind(&CanAddr::new(ifindex)).map_err(BusError::Bind)?;
        Ok(sock)
    }

    /// Writes one frame to the bus.
    ///
    /// The frame is sent as a single wire frame of the bus mode's size. In
    /// FD mode the length goes out rounded up to a legal CAN FD length.
    pub fn write(&self, frame: &Frame) -> BusResult<()> {
        let sock = self.socket().map_err(BusError::Write)?;

        let wire = encode(frame, self.mode);
        let buf = wire.as_bytes();

        match sock.send(buf).map_err(BusError::Write)? {
            n if n == buf.len() => {
                trace!("{} TX {:?}", self.ifname, wire);
                Ok(())
            }
            n => Err(BusError::Write(IoError::new(
                IoErrorKind::WriteZero,
                format!("short write: {} of {} bytes", n, buf.len()),
            ))),
        }
    }

    /// Reads one frame from the bus.
    ///
    /// Either a Classic or an FD frame can arrive, whatever the bus mode.
    /// If nothing arrives within the read timeout, this fails with a
    /// `BusError::Read` for which `should_retry()` is true.
    pub fn read(&self) -> BusResult<Frame> {
        let sock = self.socket().map_err(BusError::Read)?;

        // Room for the larger frame; the size received picks the mode.
        let mut wire = WireFrame::new(canfd_frame_default(), SocketMode::Fd);
        let n = sock.recv(wire.as_bytes_mut()).map_err(BusError::Read)?;

        let mode = SocketMode::from_mtu(n).ok_or_else(|| {
            BusError::Read(IoError::new(
                IoErrorKind::InvalidData,
                format!("unexpected CAN frame size: {} bytes", n),
            ))
        })?;

        let wire = WireFrame::new(*wire.as_ref(), mode);
        trace!("{} RX {:?}", self.ifname, wire);
        Ok(decode(&wire))
    }

    /// Reads one frame from the bus into `frame`.
    ///
    /// On error, `frame` is left untouched.
    pub fn read_into(&self, frame: &mut Frame) -> BusResult<()> {
        *frame = self.read()?;
        Ok(())
    }

    /// Closes the bus.
    ///
    /// This is safe to call on a bus that is already closed, or that was
    /// never opened, and always succeeds.
    pub fn close(&mut self) -> BusResult<()> {
        self.release();
        Ok(())
    }

    fn socket(&self) -> IoResult<&S> {
        self.sock.as_ref().ok_or_else(BusError::not_open)
    }
}

impl<S> CanBus<S> {
    /// Gets the name of the interface from the last open.
    ///
    /// This is empty before the first open.
    pub fn interface_name(&self) -> &str {
        &self.ifname
    }

    /// Gets the socket mode from the last open.
    pub fn mode(&self) -> SocketMode {
        self.mode
    }

    /// Gets the read timeout from the last open.
    pub fn read_timeout(&self) -> Duration {
        self.read_timeout
    }

    /// Whether the bus holds an open socket.
    pub fn is_open(&self) -> bool {
        self.sock.is_some()
    }

    /// Gets a shared reference to the underlying socket, if open.
    pub fn as_raw_socket(&self) -> Option<&S> {
        self.sock.as_ref()
    }

    fn release(&mut self) {
        if self.sock.take().is_some() {
            debug!("Closed CAN bus on '{}'", self.ifname);
        }
    }
}

impl<S> Default for CanBus<S> {
    fn default() -> Self {
        Self {
            ifname: String::new(),
            mode: SocketMode::default(),
            read_timeout: DEFAULT_READ_TIMEOUT,
            sock: None,
        }
    }
}

impl<S> Drop for CanBus<S> {
    fn drop(&mut self) {
        self.release();
    }
}

/////////////////////////////////////////////////////////////////////////////
