//! Run the stack against a Linux TAP device
//!
//! Frames read from `tap0` are delivered to the simulated adapter, the stack
//! processes them, and whatever it transmits is written back to `tap0`. From
//! the host you can then:
//!
//! ```sh
//! ping 10.0.2.15
//! curl http://10.0.2.15/
//! nc -lu 1234 &                       # UDP echoes come back here
//! echo hello | nc -u -w1 10.0.2.15 9
//! ```
//!
//! To run this example:
//!
//! ```sh
//! cargo run --example tap_responder
//! ```
//!
//! Note: Root/sudo privileges are required to create and configure the TAP
//! device. The host side of the link is given 10.0.2.2 and the MAC pinned in
//! the stack's ARP cache. Host TCP stacks reject the biased TCP checksum, so
//! the demo turns the bias off.

use std::io;
use std::process::Command;

use log::{Level, LevelFilter, Metadata, Record};
use toy_kernel_net::config::{DEFAULT_HOST_IP, DEFAULT_HOST_MAC};
use toy_kernel_net::{E1000, IdentityMap, MonotonicClock, NetConfig, NetworkInterface, SimulatedE1000};
use tun_tap::{Iface, Mode};

struct StdoutLogger;

impl log::Log for StdoutLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= Level::Debug
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            println!("[{:5}] {}", record.level(), record.args());
        }
    }

    fn flush(&self) {}
}

static LOGGER: StdoutLogger = StdoutLogger;

fn ip(args: &[&str]) -> io::Result<()> {
    let status = Command::new("ip").args(args).status()?;
    if !status.success() {
        return Err(io::Error::new(
            io::ErrorKind::Other,
            format!("`ip {}` failed", args.join(" ")),
        ));
    }
    Ok(())
}

fn configure_interface(name: &str) -> io::Result<()> {
    let mac = DEFAULT_HOST_MAC
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect::<Vec<_>>()
        .join(":");
    ip(&["link", "set", "dev", name, "address", &mac])?;
    ip(&["addr", "add", &format!("{}/24", DEFAULT_HOST_IP), "dev", name])?;
    ip(&["link", "set", "up", "dev", name])?;
    println!("Interface {} configured as {} ({})", name, DEFAULT_HOST_IP, mac);
    Ok(())
}

fn main() -> io::Result<()> {
    log::set_logger(&LOGGER)
        .map(|()| log::set_max_level(LevelFilter::Debug))
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))?;

    let tap = Iface::without_packet_info("tap0", Mode::Tap)?;
    configure_interface(tap.name())?;

    let config = NetConfig::default().with_tcp_checksum_port_bias(false);
    // SAFETY: the adapter is attached once with IdentityMap and never leaves
    // the driver.
    let sim = unsafe { SimulatedE1000::new(config.mac) };
    let nic = E1000::attach(sim, MonotonicClock::new(), &IdentityMap);
    let mut stack = NetworkInterface::new(nic, config);

    let mut buf = [0u8; 2048];
    let mut frames = 0u64;
    loop {
        let nbytes = tap.recv(&mut buf)?;
        frames += 1;

        if !stack.nic_mut().registers_mut().inject(&buf[..nbytes]) {
            log::warn!("frame #{} dropped: receive ring full", frames);
            continue;
        }

        loop {
            match stack.poll() {
                Ok(0) => break,
                Ok(_) => {}
                Err(e) => log::debug!("frame #{} dropped: {} (code {})", frames, e, e.code()),
            }
        }

        for frame in stack.nic_mut().registers_mut().drain_transmitted() {
            if let Err(e) = tap.send(&frame) {
                eprintln!("Failed to send frame: {}", e);
            }
        }
    }
}
