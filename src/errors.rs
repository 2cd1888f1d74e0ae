// canlink/src/errors.rs
//
// Error types for the CAN bus transport.
//
// This file is part of the Rust 'canlink' library.
//
// Licensed under the MIT license:
//   <LICENSE or http://opensource.org/licenses/MIT>
// This file may not be copied, modified, or distributed except according
// to those terms.

//! Errors reported by the bus handle.
//!
//! Every step of opening a bus, and every frame transfer, fails with its
//! own [`BusError`] variant. Exactly one error is reported per call, and
//! nothing is retried internally. The OS-level cause, if any, is kept as
//! the error's source.

use std::io;
use thiserror::Error;

/// Result type for bus operations.
pub type BusResult<T> = Result<T, BusError>;

// ===== BusError =====

/// A failed bus operation.
#[derive(Error, Debug)]
pub enum BusError {
    /// The raw CAN socket could not be created.
    #[error("failed to create CAN socket: {0}")]
    SocketCreate(#[source] io::Error),
    /// The interface name could not be resolved to an index.
    #[error("CAN interface '{ifname}' not found: {source}")]
    InterfaceNameToIndex {
        /// The name that failed to resolve
        ifname: String,
        /// The lookup failure
        #[source]
        source: io::Error,
    },
    /// The MTU of the interface could not be queried.
    #[error("failed to get interface MTU: {0}")]
    Mtu(#[source] io::Error),
    /// The interface is not configured to carry FD frames.
    #[error("CAN FD not supported on interface (MTU {mtu})")]
    CanFdNotSupported {
        /// The MTU reported by the interface
        mtu: usize,
    },
    /// The socket refused to switch into FD mode.
    #[error("failed to enable CAN FD frames on socket: {0}")]
    EnableFdSupport(#[source] io::Error),
    /// The socket could not be bound to the interface.
    #[error("failed to bind CAN socket: {0}")]
    Bind(#[source] io::Error),
    /// A frame could not be written in full.
    #[error("failed to write CAN frame: {0}")]
    Write(#[source] io::Error),
    /// No complete frame could be read, including on timeout.
    #[error("failed to read CAN frame: {0}")]
    Read(#[source] io::Error),
}

impl BusError {
    /// Gets the plain status code for the error.
    pub fn status(&self) -> Status {
        use BusError::*;
        match self {
            SocketCreate(_) => Status::SocketCreateError,
            InterfaceNameToIndex { .. } => Status::InterfaceNameToIndexError,
            Mtu(_) => Status::MtuError,
            CanFdNotSupported { .. } => Status::CanFdNotSupported,
            EnableFdSupport(_) => Status::EnableFdSupportError,
            Bind(_) => Status::BindError,
            Write(_) => Status::WriteError,
            Read(_) => Status::ReadError,
        }
    }

    /// Gets the underlying I/O error, if there is one.
    pub fn io_error(&self) -> Option<&io::Error> {
        use BusError::*;
        match self {
            SocketCreate(err) | Mtu(err) | EnableFdSupport(err) | Bind(err) | Write(err)
            | Read(err) => Some(err),
            InterfaceNameToIndex { source, .. } => Some(source),
            CanFdNotSupported { .. } => None,
        }
    }

    /// Creates an error for an operation attempted on a closed handle.
    pub(crate) fn not_open() -> io::Error {
        io::Error::new(io::ErrorKind::NotConnected, "CAN bus is not open")
    }
}

// ===== Status =====

/// The outcome of a bus operation as a plain code.
///
/// The codes are mutually exclusive; a call reports exactly one.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Status {
    /// The operation succeeded
    Ok,
    /// See [`BusError::SocketCreate`]
    SocketCreateError,
    /// See [`BusError::InterfaceNameToIndex`]
    InterfaceNameToIndexError,
    /// See [`BusError::Mtu`]
    MtuError,
    /// See [`BusError::CanFdNotSupported`]
    CanFdNotSupported,
    /// See [`BusError::EnableFdSupport`]
    EnableFdSupportError,
    /// See [`BusError::Write`]
    WriteError,
    /// See [`BusError::Read`]
    ReadError,
    /// See [`BusError::Bind`]
    BindError,
}

impl<T> From<&BusResult<T>> for Status {
    fn from(res: &BusResult<T>) -> Self {
        match res {
            Ok(_) => Status::Ok,
            Err(err) => err.status(),
        }
    }
}

// ===== ConstructionError =====

#[derive(Error, Debug, Copy, Clone, PartialEq, Eq)]
/// Error that occurs when creating CAN frames
pub enum ConstructionError {
    /// Larger payload than can be held in the frame.
    #[error("Payload is too large")]
    TooMuchData,
}

/////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status() {
        let err = BusError::CanFdNotSupported { mtu: 16 };
        assert_eq!(Status::CanFdNotSupported, err.status());
        assert!(err.io_error().is_none());
        assert_eq!("CAN FD not supported on interface (MTU 16)", err.to_string());

        let err = BusError::Read(io::ErrorKind::WouldBlock.into());
        assert_eq!(Status::ReadError, err.status());
        assert_eq!(
            Some(io::ErrorKind::WouldBlock),
            err.io_error().map(|e| e.kind())
        );

        let res: BusResult<()> = Ok(());
        assert_eq!(Status::Ok, Status::from(&res));

        let res: BusResult<()> = Err(BusError::Bind(BusError::not_open()));
        assert_eq!(Status::BindError, Status::from(&res));
    }

    #[test]
    fn test_source_chain() {
        use std::error::Error;

        let err = BusError::InterfaceNameToIndex {
            ifname: "nope0".into(),
            source: io::Error::from_raw_os_error(libc::ENODEV),
        };
        assert!(err.to_string().contains("nope0"));
        assert!(err.source().is_some());
    }
}
