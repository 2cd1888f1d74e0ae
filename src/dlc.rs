// canlink/src/dlc.rs
//
// CAN FD data length code conversions.
//
// This file is part of the Rust 'canlink' library.
//
// Licensed under the MIT license:
//   <LICENSE or http://opensource.org/licenses/MIT>
// This file may not be copied, modified, or distributed except according
// to those terms.

//! CAN FD data length codes.
//!
//! A CAN FD frame declares its payload size with a 4-bit data length code
//! (DLC). Codes 0-8 map directly to byte counts, while codes 9-15 map to
//! the extended lengths 12, 16, 20, 24, 32, 48 and 64. Any other payload
//! length has to be padded up to the next legal one before it can go on
//! the wire.
//!
//! ```text
//! DLC:  0 1 2 3 4 5 6 7 8  9 10 11 12 13 14 15
//! LEN:  0 1 2 3 4 5 6 7 8 12 16 20 24 32 48 64
//! ```

/// Data length for each 4-bit DLC value.
const DLC_TO_LEN: [u8; 16] = [0, 1, 2, 3, 4, 5, 6, 7, 8, 12, 16, 20, 24, 32, 48, 64];

/// Smallest DLC able to carry each payload length, 0..=64.
#[rustfmt::skip]
const LEN_TO_DLC: [u8; 65] = [
    0, 1, 2, 3, 4, 5, 6, 7, 8,                  // 0 - 8
    9, 9, 9, 9,                                 // 9 - 12
    10, 10, 10, 10,                             // 13 - 16
    11, 11, 11, 11,                             // 17 - 20
    12, 12, 12, 12,                             // 21 - 24
    13, 13, 13, 13, 13, 13, 13, 13,             // 25 - 32
    14, 14, 14, 14, 14, 14, 14, 14,             // 33 - 40
    14, 14, 14, 14, 14, 14, 14, 14,             // 41 - 48
    15, 15, 15, 15, 15, 15, 15, 15,             // 49 - 56
    15, 15, 15, 15, 15, 15, 15, 15,             // 57 - 64
];

/// The largest DLC, also returned for lengths that can't be represented.
pub const CANFD_MAX_DLC: u8 = 0x0F;

/// Gets the payload length for a CAN FD data length code.
///
/// Only the low nibble of `dlc` is used, so this never fails.
#[inline]
pub fn len_from_dlc(dlc: u8) -> u8 {
    DLC_TO_LEN[usize::from(dlc & 0x0F)]
}

/// Gets the smallest data length code whose length holds `len` bytes.
///
/// Lengths above 64 return `CANFD_MAX_DLC`.
#[inline]
pub fn dlc_from_len(len: u8) -> u8 {
    LEN_TO_DLC
        .get(usize::from(len))
        .copied()
        .unwrap_or(CANFD_MAX_DLC)
}

/// Rounds a payload length up to the next length a CAN FD frame can carry.
#[inline]
pub fn quantize_len(len: u8) -> u8 {
    len_from_dlc(dlc_from_len(len))
}

/// Checks whether `len` is one of the 16 legal CAN FD payload lengths.
pub fn is_valid_fd_len(len: u8) -> bool {
    DLC_TO_LEN.contains(&len)
}

/////////////////////////////////////////////////////////////////////////////
