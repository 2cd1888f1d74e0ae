// canlink/demos/send.rs
//
// This file is part of the Rust 'canlink' library.
//
// Licensed under the MIT license:
//   <LICENSE or http://opensource.org/licenses/MIT>
// This file may not be copied, modified, or distributed except according
// to those terms.
//
//! Send a few frames to a CAN interface.
//!
//! Usage: send [iface] [fd]
//!
//! With "fd", the bus is opened in FD mode and the frames carry up to
//! 64 bytes, including some lengths that get padded on the wire.
//!
//! You can watch them arrive with:
//!
//!```text
//! $ candump -x vcan0
//!```
//!

use anyhow::Context;
use canlink::{CanBus, FdFlags, Frame, SocketMode};
use std::{env, thread, time::Duration};

fn main() -> anyhow::Result<()> {
    let iface = env::args().nth(1).unwrap_or_else(|| "vcan0".into());
    let mode = match env::args().nth(2).as_deref() {
        Some("fd") => SocketMode::Fd,
        _ => SocketMode::Classic,
    };

    let mut bus = CanBus::new();
    bus.open(&iface, 100, mode)
        .with_context(|| format!("Failed to open {:?} bus on interface {}", mode, iface))?;

    let max_len = mode.max_data_len();
    let flags = if mode.is_fd() {
        FdFlags::BRS
    } else {
        FdFlags::empty()
    };

    for (i, len) in [0usize, 3, 8, 9, 21, 64]
        .into_iter()
        .filter(|&n| n <= max_len)
        .enumerate()
    {
        let data: Vec<u8> = (0..len as u8).collect();
        let frame = Frame::init(0x100 + i as u32, &data, flags)?;

        bus.write(&frame).context("Failed to write frame")?;
        println!("{:X}", frame);

        thread::sleep(Duration::from_millis(100));
    }

    bus.close()?;
    Ok(())
}
