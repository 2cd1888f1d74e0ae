// canlink/src/lib.rs
//
// The main lib file for the Rust 'canlink' library.
//
// This file is part of the Rust 'canlink' library.
//
// Licensed under the MIT license:
//   <LICENSE or http://opensource.org/licenses/MIT>
// This file may not be copied, modified, or distributed except according
// to those terms.

//! A minimal CAN and CAN FD transport over Linux SocketCAN.
//!
//! The Linux kernel supports using CAN-devices through a network-like API
//! (see <https://www.kernel.org/doc/Documentation/networking/can.txt>).
//! This crate wraps one raw CAN socket in a [`CanBus`] handle that can be
//! opened on a named interface, then used to write and read [`Frame`]s.
//!
//! ```no_run
//! use canlink::{CanBus, FdFlags, Frame, SocketMode};
//!
//! let mut bus = CanBus::new();
//! bus.open("vcan0", 100, SocketMode::Fd)?;
//!
//! let frame = Frame::init(0x123, &[0x11; 9], FdFlags::BRS)?;
//! bus.write(&frame)?;
//!
//! let frame = bus.read()?;
//! println!("{:X}", frame);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Frames on the wire
//!
//! A bus opened in [`SocketMode::Classic`] sends `can_frame`-sized frames
//! (`CAN_MTU`, 16 bytes) and one opened in [`SocketMode::Fd`] sends
//! `canfd_frame`-sized ones (`CANFD_MTU`, 72 bytes). An FD frame can only
//! carry 0-8, 12, 16, 20, 24, 32, 48 or 64 bytes, so the length of an
//! outgoing FD frame is rounded up with zero padding. See the [`dlc`]
//! module for the conversions.
//!
//! A read accepts either size, so a bus in FD mode also receives Classic
//! frames.
//!
//! # Errors
//!
//! Every failure comes back as a [`BusError`], one variant per step that
//! can fail. Nothing is retried internally; a read that times out can be
//! detected with [`ShouldRetry`].

use std::{mem::size_of, slice};

pub use std::io::{Error as IoError, ErrorKind as IoErrorKind, Result as IoResult};

pub use embedded_can::{self, ExtendedId, Frame as EmbeddedFrame, Id, StandardId};

pub mod errors;
pub use errors::{BusError, BusResult, ConstructionError, Status};

pub mod dlc;
pub use dlc::{dlc_from_len, len_from_dlc, quantize_len};

pub mod frame;
pub use frame::{decode, encode, FdFlags, Frame, SocketMode, WireFrame};

pub mod addr;
pub use addr::CanAddr;

pub mod socket;
pub use socket::{CanRawSocket, RawSocket, ShouldRetry};

pub mod bus;
pub use bus::{BusConfig, CanBus, DEFAULT_READ_TIMEOUT};

/// Gets a byte slice for any sized variable.
///
/// Note that this should normally be unsafe, but since we're only
/// using it internally for types sent to/from the OS, it's OK here.
pub(crate) fn as_bytes<T: Sized>(val: &T) -> &[u8] {
    let sz = size_of::<T>();
    unsafe { slice::from_raw_parts::<'_, u8>(val as *const _ as *const u8, sz) }
}

/// Gets a mutable byte slice for any sized variable.
pub(crate) fn as_bytes_mut<T: Sized>(val: &mut T) -> &mut [u8] {
    let sz = size_of::<T>();
    unsafe { slice::from_raw_parts_mut(val as *mut _ as *mut u8, sz) }
}
