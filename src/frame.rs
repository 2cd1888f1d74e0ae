// canlink/src/frame.rs
//
// Implements the generic frame and its codec for SocketCAN on Linux.
//
// This file is part of the Rust 'canlink' library.
//
// Licensed under the MIT license:
//   <LICENSE or http://opensource.org/licenses/MIT>
// This file may not be copied, modified, or distributed except according
// to those terms.

//! CAN bus frames and the wire codec.
//!
//! Applications exchange a single [`Frame`] type with the bus, whatever
//! the socket mode. It holds the composite 32-bit CAN ID word, the payload
//! length, the FD flags and a fixed 64-byte payload buffer, of which only
//! the first `len()` bytes are meaningful.
//!
//! On the wire, the kernel expects the structs defined by
//! [libc](https://crates.io/crates/libc):
//! - [can_frame](https://docs.rs/libc/latest/libc/struct.can_frame.html)
//!   The Classic CAN 2.0 frame with up to 8 bytes of data, `CAN_MTU` bytes.
//! - [canfd_frame](https://docs.rs/libc/latest/libc/struct.canfd_frame.html)
//!   The CAN Flexible Data Rate frame with up to 64 bytes of data,
//!   `CANFD_MTU` bytes.
//!
//! The first `CAN_MTU` bytes of both structs share one layout, so a
//! [`WireFrame`] always holds a `canfd_frame` and exposes as many of its
//! bytes as the [`SocketMode`] calls for.
//!
//! [`encode`] and [`decode`] translate between the two representations.
//! In FD mode, encoding rounds the length up to the next legal CAN FD
//! length; the padding bytes are always zero.

use crate::{as_bytes, as_bytes_mut, dlc, ConstructionError};
use bitflags::bitflags;
use embedded_can::{ExtendedId, Frame as EmbeddedFrame, Id, StandardId};
use itertools::Itertools;
use libc::{canfd_frame, canid_t};
use std::{fmt, mem};

pub use libc::{
    CANFD_BRS, CANFD_ESI, CANFD_MAX_DLEN, CANFD_MTU, CAN_EFF_FLAG, CAN_EFF_MASK, CAN_ERR_FLAG,
    CAN_MAX_DLEN, CAN_MTU, CAN_RTR_FLAG, CAN_SFF_MASK,
};

bitflags! {
    /// Bit flags for the Flexible Data (FD) frames.
    ///
    /// Bits without a name here are kept as-is when passing through.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct FdFlags: u8 {
        /// Bit rate switch (second bit rate for payload data)
        const BRS = CANFD_BRS as u8;
        /// Error state indicator of the transmitting node
        const ESI = CANFD_ESI as u8;
    }
}

/// Gets the canid_t value from an Id
/// If it's an extended ID, the CAN_EFF_FLAG bit is also set.
pub fn id_to_canid_t(id: impl Into<Id>) -> canid_t {
    match id.into() {
        Id::Standard(id) => id.as_raw() as canid_t,
        Id::Extended(id) => id.as_raw() | CAN_EFF_FLAG,
    }
}

/// Creates a default C `canfd_frame`.
/// This initializes the entire structure to zeros.
#[inline(always)]
pub fn canfd_frame_default() -> canfd_frame {
    unsafe { mem::zeroed() }
}

// ===== SocketMode =====

/// The kind of frames a bus socket carries.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SocketMode {
    /// Classic CAN 2.0 frames with up to 8 bytes of data
    #[default]
    Classic,
    /// CAN FD frames with up to 64 bytes of data
    Fd,
}

impl SocketMode {
    /// The size, in bytes, of one frame on the wire in this mode.
    pub fn mtu(&self) -> usize {
        match self {
            Self::Classic => CAN_MTU,
            Self::Fd => CANFD_MTU,
        }
    }

    /// The largest payload a frame can carry in this mode.
    pub fn max_data_len(&self) -> usize {
        match self {
            Self::Classic => CAN_MAX_DLEN,
            Self::Fd => CANFD_MAX_DLEN,
        }
    }

    /// Whether this is the FD mode.
    pub fn is_fd(&self) -> bool {
        matches!(self, Self::Fd)
    }

    /// Gets the mode whose wire frame has exactly `mtu` bytes.
    pub fn from_mtu(mtu: usize) -> Option<Self> {
        match mtu {
            CAN_MTU => Some(Self::Classic),
            CANFD_MTU => Some(Self::Fd),
            _ => None,
        }
    }
}

// ===== Frame =====

/// A CAN frame as exchanged with the bus.
///
/// The ID word is passed through unmodified, including any EFF/RTR/ERR
/// flag bits; use the [`embedded_can::Frame`] methods for a decoded ID.
/// The length can never exceed the 64-byte buffer.
#[derive(Clone, Copy)]
pub struct Frame {
    id: canid_t,
    len: u8,
    flags: u8,
    data: [u8; CANFD_MAX_DLEN],
}

impl Frame {
    /// Creates a frame from a raw ID word, the payload, and FD flags.
    pub fn init(
        id_word: canid_t,
        data: &[u8],
        flags: FdFlags,
    ) -> Result<Self, ConstructionError> {
        let mut frame = Self {
            id: id_word,
            flags: flags.bits(),
            ..Self::default()
        };
        frame.set_data(data)?;
        Ok(frame)
    }

    /// Creates a frame with FD flags, from an embedded-hal ID.
    pub fn with_flags(id: impl Into<Id>, data: &[u8], flags: FdFlags) -> Option<Self> {
        Self::init(id_to_canid_t(id), data, flags).ok()
    }

    /// Gets the composite SocketCAN ID word, with EFF/RTR/ERR flags
    pub fn id_word(&self) -> canid_t {
        self.id
    }

    /// Sets the composite ID word.
    pub fn set_id_word(&mut self, id_word: canid_t) {
        self.id = id_word;
    }

    /// Sets the CAN ID for the frame, replacing any flags in the ID word.
    pub fn set_id(&mut self, id: impl Into<Id>) {
        self.id = id_to_canid_t(id);
    }

    /// Return the actual raw CAN ID (without EFF/RTR/ERR flags)
    pub fn raw_id(&self) -> canid_t {
        let mask = if self.is_extended() {
            CAN_EFF_MASK
        } else {
            CAN_SFF_MASK
        };
        self.id & mask
    }

    /// Gets the payload length in bytes.
    pub fn len(&self) -> usize {
        usize::from(self.len)
    }

    /// Whether the frame has no payload.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Gets the FD flags.
    pub fn flags(&self) -> FdFlags {
        FdFlags::from_bits_retain(self.flags)
    }

    /// Sets the FD flags.
    pub fn set_flags(&mut self, flags: FdFlags) {
        self.flags = flags.bits();
    }

    /// Whether the frame uses a bit rate switch.
    pub fn is_brs(&self) -> bool {
        self.flags().contains(FdFlags::BRS)
    }

    /// Gets the error state indicator of the transmitting node
    pub fn is_esi(&self) -> bool {
        self.flags().contains(FdFlags::ESI)
    }

    /// Gets the meaningful payload bytes, the first `len()` of the buffer.
    pub fn data(&self) -> &[u8] {
        &self.data[..self.len()]
    }

    /// Sets the data payload of the frame.
    ///
    /// The payload can be up to 64 bytes. Whether it fits a Classic
    /// socket is up to the caller.
    pub fn set_data(&mut self, data: &[u8]) -> Result<(), ConstructionError> {
        match data.len() {
            n if n <= CANFD_MAX_DLEN => {
                self.data[..n].copy_from_slice(data);
                self.len = n as u8;
                Ok(())
            }
            _ => Err(ConstructionError::TooMuchData),
        }
    }
}

impl EmbeddedFrame for Frame {
    /// Create a new frame with no FD flags.
    fn new(id: impl Into<Id>, data: &[u8]) -> Option<Self> {
        Self::with_flags(id, data, FdFlags::empty())
    }

    /// Creates a remote frame, which carries no data.
    fn new_remote(id: impl Into<Id>, dlc: usize) -> Option<Self> {
        if dlc > CAN_MAX_DLEN {
            return None;
        }
        let mut frame = Self {
            id: id_to_canid_t(id) | CAN_RTR_FLAG,
            ..Self::default()
        };
        frame.len = dlc as u8;
        Some(frame)
    }

    /// Check if frame uses 29-bit extended ID format.
    fn is_extended(&self) -> bool {
        self.id & CAN_EFF_FLAG != 0
    }

    /// Check if frame is a remote transmission request.
    fn is_remote_frame(&self) -> bool {
        self.id & CAN_RTR_FLAG != 0
    }

    /// Return the frame identifier.
    fn id(&self) -> Id {
        // The masks keep the raw values in range for each ID type.
        if self.is_extended() {
            ExtendedId::new(self.id & CAN_EFF_MASK).unwrap().into()
        } else {
            StandardId::new((self.id & CAN_SFF_MASK) as u16)
                .unwrap()
                .into()
        }
    }

    /// Data length code
    fn dlc(&self) -> usize {
        usize::from(dlc::dlc_from_len(self.len))
    }

    /// A slice into the actual data.
    fn data(&self) -> &[u8] {
        Frame::data(self)
    }
}

impl Default for Frame {
    /// The default frame has all fields and data set to zero.
    fn default() -> Self {
        Self {
            id: 0,
            len: 0,
            flags: 0,
            data: [0; CANFD_MAX_DLEN],
        }
    }
}

/// Frames are equal when their ID word, flags and meaningful payload bytes
/// match. Buffer bytes past the length are ignored.
impl PartialEq for Frame {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.flags == other.flags && self.data() == other.data()
    }
}

impl Eq for Frame {}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Frame {{ ")?;
        fmt::UpperHex::fmt(self, f)?;
        write!(f, " }}")
    }
}

impl fmt::UpperHex for Frame {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        if self.len() <= CAN_MAX_DLEN && self.flags == 0 {
            write!(f, "{:X}#", self.id)?;
        } else {
            write!(f, "{:X}##{} ", self.id, self.flags)?;
        }
        let mut parts = self.data().iter().map(|v| format!("{:02X}", v));
        write!(f, "{}", parts.join(" "))
    }
}

// ===== WireFrame =====

/// A frame in the exact layout the kernel reads and writes.
#[derive(Clone, Copy)]
pub struct WireFrame {
    frame: canfd_frame,
    mode: SocketMode,
}

impl WireFrame {
    /// Wraps a raw kernel frame, of which `mode.mtu()` bytes are valid.
    pub fn new(frame: canfd_frame, mode: SocketMode) -> Self {
        Self { frame, mode }
    }

    /// The socket mode this frame is laid out for.
    pub fn mode(&self) -> SocketMode {
        self.mode
    }

    /// The payload length declared in the frame.
    pub fn len(&self) -> usize {
        usize::from(self.frame.len)
    }

    /// Whether the frame declares an empty payload.
    pub fn is_empty(&self) -> bool {
        self.frame.len == 0
    }

    /// The bytes to put on the wire, exactly `mode().mtu()` of them.
    pub fn as_bytes(&self) -> &[u8] {
        &as_bytes(&self.frame)[..self.mode.mtu()]
    }

    /// The bytes to receive into, exactly `mode().mtu()` of them.
    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut as_bytes_mut(&mut self.frame)[..self.mode.mtu()]
    }
}

impl Default for WireFrame {
    /// An all-zero Classic frame.
    fn default() -> Self {
        Self::new(canfd_frame_default(), SocketMode::Classic)
    }
}

impl AsRef<canfd_frame> for WireFrame {
    fn as_ref(&self) -> &canfd_frame {
        &self.frame
    }
}

impl fmt::Debug for WireFrame {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "WireFrame {{ {:?}, ", self.mode)?;
        fmt::UpperHex::fmt(&decode(self), f)?;
        write!(f, " }}")
    }
}

// ===== Codec =====

/// Converts a frame into its wire layout for the given socket mode.
///
/// The wire frame starts zeroed, so padding never leaks old memory. In
/// FD mode the declared length is rounded up to a legal CAN FD length.
/// Classic mode passes the length through; keeping it at 8 or below is
/// up to the caller.
pub fn encode(frame: &Frame, mode: SocketMode) -> WireFrame {
    let mut wire = canfd_frame_default();
    wire.can_id = frame.id;
    wire.flags = frame.flags;

    let data = frame.data();
    wire.data[..data.len()].copy_from_slice(data);

    wire.len = match mode {
        SocketMode::Fd => dlc::quantize_len(frame.len),
        SocketMode::Classic => frame.len,
    };
    WireFrame::new(wire, mode)
}

/// Converts a wire frame back into a frame.
///
/// The declared length is trusted, up to the 64-byte buffer.
pub fn decode(wire: &WireFrame) -> Frame {
    let n = wire.len().min(CANFD_MAX_DLEN);

    let mut frame = Frame {
        id: wire.frame.can_id,
        len: n as u8,
        flags: wire.frame.flags,
        ..Frame::default()
    };
    frame.data[..n].copy_from_slice(&wire.frame.data[..n]);
    frame
}

/////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    const STD_ID: Id = Id::Standard(StandardId::MAX);
    const EXT_ID: Id = Id::Extended(ExtendedId::MAX);

    const DATA: &[u8] = &[0, 1, 2, 3];
    const DATA9: &[u8] = &[0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88, 0x99];

    #[test]
    fn test_defaults() {
        let frame = Frame::default();

        assert_eq!(0, frame.id_word());
        assert_eq!(0, frame.raw_id());
        assert!(frame.flags().is_empty());
        assert!(frame.is_empty());
        assert_eq!(0, frame.dlc());
        assert_eq!(&[] as &[u8], frame.data());
    }

    #[test]
    fn test_socket_mode() {
        assert_eq!(SocketMode::Classic, SocketMode::default());
        assert_eq!(16, SocketMode::Classic.mtu());
        assert_eq!(72, SocketMode::Fd.mtu());
        assert_eq!(8, SocketMode::Classic.max_data_len());
        assert_eq!(64, SocketMode::Fd.max_data_len());

        assert_eq!(Some(SocketMode::Classic), SocketMode::from_mtu(CAN_MTU));
        assert_eq!(Some(SocketMode::Fd), SocketMode::from_mtu(CANFD_MTU));
        assert_eq!(None, SocketMode::from_mtu(0));
        assert_eq!(None, SocketMode::from_mtu(CAN_MTU + 1));
    }

    #[test]
    fn test_frame() {
        let frame = Frame::new(STD_ID, DATA).unwrap();
        assert_eq!(STD_ID, frame.id());
        assert_eq!(0x7FF, frame.raw_id());
        assert!(frame.is_standard());
        assert!(frame.is_data_frame());
        assert_eq!(DATA, frame.data());
        assert_eq!(DATA.len(), frame.len());

        let frame = Frame::with_flags(EXT_ID, DATA9, FdFlags::BRS).unwrap();
        assert_eq!(EXT_ID, frame.id());
        assert_eq!(CAN_EFF_FLAG | 0x1FFF_FFFF, frame.id_word());
        assert!(frame.is_extended());
        assert!(frame.is_brs());
        assert!(!frame.is_esi());
        assert_eq!(9, frame.dlc());

        let frame = Frame::new_remote(STD_ID, 4).unwrap();
        assert!(frame.is_remote_frame());
        assert_eq!(4, frame.len());
        assert!(Frame::new_remote(STD_ID, CAN_MAX_DLEN + 1).is_none());
    }

    #[test]
    fn test_frame_too_much_data() {
        let data = [0xAAu8; CANFD_MAX_DLEN + 1];
        assert_eq!(
            Err(ConstructionError::TooMuchData),
            Frame::init(0x123, &data, FdFlags::empty())
        );
        assert!(Frame::new(STD_ID, &data).is_none());

        let mut frame = Frame::init(0x123, DATA, FdFlags::empty()).unwrap();
        assert!(frame.set_data(&data).is_err());
        assert_eq!(DATA, frame.data());

        assert!(frame.set_data(&data[..CANFD_MAX_DLEN]).is_ok());
        assert_eq!(CANFD_MAX_DLEN, frame.len());
    }

    #[test]
    fn test_unknown_flags_pass_through() {
        let frame = Frame::init(0x100, DATA, FdFlags::from_bits_retain(0x84)).unwrap();
        let wire = encode(&frame, SocketMode::Fd);
        assert_eq!(0x84, wire.as_ref().flags);
        assert_eq!(frame, decode(&wire));
    }

    #[test]
    fn test_classic_round_trip() {
        let frame = Frame::init(0x123 | CAN_ERR_FLAG, &DATA9[..8], FdFlags::ESI).unwrap();

        let wire = encode(&frame, SocketMode::Classic);
        assert_eq!(CAN_MTU, wire.as_bytes().len());
        assert_eq!(8, wire.len());

        let rx = decode(&wire);
        assert_eq!(frame.id_word(), rx.id_word());
        assert_eq!(frame.len(), rx.len());
        assert_eq!(frame.flags(), rx.flags());
        assert_eq!(frame.data(), rx.data());
    }

    #[test]
    fn test_fd_legal_length_unchanged() {
        let frame = Frame::init(0x10, &DATA9[..5], FdFlags::empty()).unwrap();
        let wire = encode(&frame, SocketMode::Fd);
        assert_eq!(5, wire.len());
        assert_eq!(CANFD_MTU, wire.as_bytes().len());
    }

    #[test]
    fn test_fd_length_padded() {
        let frame = Frame::init(0x10, DATA9, FdFlags::BRS).unwrap();
        let wire = encode(&frame, SocketMode::Fd);
        assert_eq!(12, wire.len());

        let raw = wire.as_ref();
        assert_eq!(DATA9, &raw.data[..9]);
        assert_eq!(&[0u8; 3], &raw.data[9..12]);

        let rx = decode(&wire);
        assert_eq!(12, rx.len());
        assert_eq!(DATA9, &rx.data()[..9]);
        assert!(rx.is_brs());
    }

    #[test]
    fn test_encode_zeroes_padding() {
        let mut frame = Frame::init(0x10, &[0xFF; 64], FdFlags::empty()).unwrap();
        frame.set_data(&[1]).unwrap();

        // The stale bytes in the frame buffer must not reach the wire.
        let wire = encode(&frame, SocketMode::Fd);
        assert_eq!(1, wire.len());
        assert!(wire.as_ref().data[1..].iter().all(|&b| b == 0));
        assert_eq!(&[0u8; 3], &wire.as_bytes()[5..8]);
    }

    #[test]
    fn test_decode_bounds_length() {
        let mut raw = canfd_frame_default();
        raw.len = 200;
        raw.data = [0x5Au8; CANFD_MAX_DLEN];

        let frame = decode(&WireFrame::new(raw, SocketMode::Fd));
        assert_eq!(CANFD_MAX_DLEN, frame.len());
        assert_eq!(&[0x5Au8; CANFD_MAX_DLEN][..], frame.data());
    }

    #[test]
    fn test_wire_layout() {
        let frame = Frame::init(0x0102_0304, &[0xAA, 0xBB], FdFlags::BRS).unwrap();
        let wire = encode(&frame, SocketMode::Classic);
        let bytes = wire.as_bytes();

        assert_eq!(&0x0102_0304u32.to_ne_bytes(), &bytes[..4]);
        assert_eq!(2, bytes[4]);
        assert_eq!(FdFlags::BRS.bits(), bytes[5]);
        assert_eq!(&[0xAAu8, 0xBB], &bytes[8..10]);
    }

    #[test]
    fn test_wire_receive_buffer() {
        let mut wire = WireFrame::new(canfd_frame_default(), SocketMode::Fd);
        let buf = wire.as_bytes_mut();
        assert_eq!(CANFD_MTU, buf.len());

        buf[..4].copy_from_slice(&0x321u32.to_ne_bytes());
        buf[4] = 3;
        buf[8..11].copy_from_slice(&[7, 8, 9]);

        let frame = decode(&WireFrame::new(*wire.as_ref(), SocketMode::Classic));
        assert_eq!(0x321, frame.id_word());
        assert_eq!(&[7u8, 8, 9], frame.data());

        let mut wire = WireFrame::default();
        assert_eq!(CAN_MTU, wire.as_bytes_mut().len());
    }

    #[test]
    fn test_upper_hex() {
        let frame = Frame::init(0x123, &[0x01, 0xAB], FdFlags::empty()).unwrap();
        assert_eq!("123#01 AB", format!("{:X}", frame));

        let frame = Frame::init(0x123, &[0x01], FdFlags::BRS).unwrap();
        assert_eq!("123##1 01", format!("{:X}", frame));
    }
}
