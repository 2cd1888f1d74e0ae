// canlink/demos/dump.rs
//
// This file is part of the Rust 'canlink' library.
//
// Licensed under the MIT license:
//   <LICENSE or http://opensource.org/licenses/MIT>
// This file may not be copied, modified, or distributed except according
// to those terms.
//
//! Print every frame arriving on a CAN interface until ^C.
//!
//! Usage: dump [iface]
//!
//! The bus is opened in FD mode, so both Classic and FD frames show up.
//! Read timeouts are used to poll for the quit flag.
//!

use anyhow::Context;
use canlink::{CanBus, ShouldRetry, SocketMode};
use std::{
    env,
    sync::atomic::{AtomicBool, Ordering},
};

fn main() -> anyhow::Result<()> {
    let iface = env::args().nth(1).unwrap_or_else(|| "vcan0".into());

    let mut bus = CanBus::new();
    bus.open(&iface, 250, SocketMode::Fd)
        .with_context(|| format!("Failed to open FD bus on interface {}", iface))?;

    static QUIT: AtomicBool = AtomicBool::new(false);

    ctrlc::set_handler(|| {
        QUIT.store(true, Ordering::Relaxed);
    })
    .expect("Failed to set ^C signal handler");

    while !QUIT.load(Ordering::Relaxed) {
        match bus.read() {
            Ok(frame) => println!("{}  {:X}", bus.interface_name(), frame),
            Err(err) if err.should_retry() => (),
            Err(err) => return Err(err.into()),
        }
    }

    Ok(())
}
