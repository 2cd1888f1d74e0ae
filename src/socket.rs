// canlink/src/socket.rs
//
// The raw SocketCAN socket used by the bus handle.
//
// This file is part of the Rust 'canlink' library.
//
// Licensed under the MIT license:
//   <LICENSE or http://opensource.org/licenses/MIT>
// This file may not be copied, modified, or distributed except according
// to those terms.

//! Raw CAN sockets.
//!
//! The [`RawSocket`] trait is the set of OS primitives the bus handle is
//! built on: create, resolve an interface, query its MTU, set options,
//! bind, send and receive. Each one is a single system call and reports
//! the OS error unchanged. [`CanRawSocket`] implements it with a Linux
//! `PF_CAN`/`SOCK_RAW` socket.
//!
//! A socket is closed by dropping it.

use crate::{BusError, BusResult, CanAddr, IoError, IoErrorKind, IoResult};
use libc::{c_char, socklen_t, AF_CAN, EINPROGRESS};
use nix::net::if_::if_nametoindex;
use socket2::SockAddr;
use std::{
    fmt,
    io::{Read, Write},
    mem::{self, size_of},
    os::{
        raw::{c_int, c_void},
        unix::io::{AsRawFd, RawFd},
    },
    time::Duration,
};

pub use libc::{CAN_RAW, CAN_RAW_FD_FRAMES, SOL_CAN_RAW};

/// Check an error return value for timeouts.
///
/// Due to the fact that timeouts are reported as errors, calling `read`
/// on a bus with a timeout that does not receive a frame in time will
/// result in an error being returned. This trait adds a `should_retry` method
/// to `Error` and `Result` to check for this condition.
pub trait ShouldRetry {
    /// Check for timeout
    ///
    /// If `true`, the error is probably due to a timeout.
    fn should_retry(&self) -> bool;
}

impl ShouldRetry for IoError {
    fn should_retry(&self) -> bool {
        match self.kind() {
            // EAGAIN, EINPROGRESS and EWOULDBLOCK are the three possible codes
            // returned when a timeout occurs. the stdlib already maps EAGAIN
            // and EWOULDBLOCK os WouldBlock
            IoErrorKind::WouldBlock | IoErrorKind::TimedOut => true,
            // however, EINPROGRESS is also valid
            _ => matches!(self.raw_os_error(), Some(errno) if errno == EINPROGRESS),
        }
    }
}

impl<E: fmt::Debug> ShouldRetry for IoResult<E> {
    fn should_retry(&self) -> bool {
        match *self {
            Err(ref e) => e.should_retry(),
            _ => false,
        }
    }
}

impl ShouldRetry for BusError {
    /// Only a read can time out.
    fn should_retry(&self) -> bool {
        match self {
            BusError::Read(err) => err.should_retry(),
            _ => false,
        }
    }
}

impl<E: fmt::Debug> ShouldRetry for BusResult<E> {
    fn should_retry(&self) -> bool {
        match *self {
            Err(ref e) => e.should_retry(),
            _ => false,
        }
    }
}

// ===== RawSocket trait =====

/// The OS primitives needed to run a CAN bus.
///
/// Dropping the socket must close it.
pub trait RawSocket: Sized {
    /// Creates a new, unbound raw CAN socket.
    fn create() -> IoResult<Self>;

    /// Resolves an interface name, like "can0", to its kernel index.
    fn if_index(ifname: &str) -> IoResult<u32>;

    /// Queries the MTU of the named interface.
    fn mtu(&self, ifname: &str) -> IoResult<usize>;

    /// Enables or disables the reception and transmission of FD frames.
    fn set_fd_frames(&self, enable: bool) -> IoResult<()>;

    /// Sets the receive timeout. `None` blocks indefinitely.
    fn set_read_timeout(&self, timeout: Option<Duration>) -> IoResult<()>;

    /// Binds the socket to a CAN interface.
    fn bind(&self, addr: &CanAddr) -> IoResult<()>;

    /// Sends a buffer as one datagram, returning the number of bytes sent.
    fn send(&self, buf: &[u8]) -> IoResult<usize>;

    /// Receives one datagram into the buffer, returning its size.
    fn recv(&self, buf: &mut [u8]) -> IoResult<usize>;
}

// ===== CanRawSocket =====

/// A Linux raw SocketCAN socket.
///
/// The socket is automatically closed when the object is dropped.
/// Internally this is just a wrapped socket (file) descriptor.
#[allow(missing_copy_implementations)]
#[derive(Debug)]
pub struct CanRawSocket(socket2::Socket);

impl CanRawSocket {
    /// Sets an option on the socket.
    ///
    /// The libc `setsockopt` function is set to set various options on a socket.
    /// `set_socket_option` offers a somewhat type-safe wrapper that does not
    /// require messing around with `*const c_void`s.
    ///
    /// Note that the `val` parameter must be specified correctly; if an option
    /// expects an integer, it is advisable to pass in a `c_int`, not the default
    /// of `i32`.
    pub fn set_socket_option<T>(&self, level: c_int, name: c_int, val: &T) -> IoResult<()> {
        let ret = unsafe {
            libc::setsockopt(
                self.as_raw_fd(),
                level,
                name,
                val as *const _ as *const c_void,
                size_of::<T>() as socklen_t,
            )
        };

        match ret {
            0 => Ok(()),
            _ => Err(IoError::last_os_error()),
        }
    }

    /// Gets a shared reference to the underlying socket object
    pub fn as_raw_socket(&self) -> &socket2::Socket {
        &self.0
    }
}

impl RawSocket for CanRawSocket {
    fn create() -> IoResult<Self> {
        let af_can = socket2::Domain::from(AF_CAN);
        let can_raw = socket2::Protocol::from(CAN_RAW);

        let sock = socket2::Socket::new_raw(af_can, socket2::Type::RAW, Some(can_raw))?;
        Ok(Self(sock))
    }

    fn if_index(ifname: &str) -> IoResult<u32> {
        Ok(if_nametoindex(ifname)?)
    }

    fn mtu(&self, ifname: &str) -> IoResult<usize> {
        let name = ifname.as_bytes();
        if name.len() >= libc::IFNAMSIZ {
            return Err(IoError::new(
                IoErrorKind::InvalidInput,
                "interface name too long",
            ));
        }

        let mut ifr: libc::ifreq = unsafe { mem::zeroed() };
        for (dst, &src) in ifr.ifr_name.iter_mut().zip(name) {
            *dst = src as c_char;
        }

        let ret = unsafe { libc::ioctl(self.as_raw_fd(), libc::SIOCGIFMTU as _, &mut ifr) };
        if ret < 0 {
            return Err(IoError::last_os_error());
        }

        let mtu = unsafe { ifr.ifr_ifru.ifru_mtu };
        Ok(mtu as usize)
    }

    fn set_fd_frames(&self, enable: bool) -> IoResult<()> {
        let enable = c_int::from(enable);
        self.set_socket_option(SOL_CAN_RAW, CAN_RAW_FD_FRAMES, &enable)
    }

    fn set_read_timeout(&self, timeout: Option<Duration>) -> IoResult<()> {
        self.0.set_read_timeout(timeout)
    }

    fn bind(&self, addr: &CanAddr) -> IoResult<()> {
        self.0.bind(&SockAddr::from(*addr))
    }

    fn send(&self, buf: &[u8]) -> IoResult<usize> {
        (&self.0).write(buf)
    }

    fn recv(&self, buf: &mut [u8]) -> IoResult<usize> {
        (&self.0).read(buf)
    }
}

impl AsRawFd for CanRawSocket {
    fn as_raw_fd(&self) -> RawFd {
        self.0.as_raw_fd()
    }
}

/////////////////////////////////////////////////////////////////////////////
