//! UDP control plane
//!
//! One datagram per command, one datagram back:
//!
//! | Request  | Effect               | Reply            |
//! |----------|----------------------|------------------|
//! | `next`   | advance the selector | `page -> {n}`    |
//! | `status` | none                 | `page {n}`       |
//! | other    | none                 | usage string     |
//!
//! Commands are trimmed and case-insensitive.

use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{Context, Result};
use log::{debug, info, warn};

use crate::selector::PageSelector;

pub const USAGE: &str = "commands: next, status";

/// Read timeout; bounds how long `stop` waits for the thread
pub const POLL_INTERVAL: Duration = Duration::from_secs(1);

const MAX_DATAGRAM: usize = 512;

/// Apply one command and build its reply
pub fn handle_command(command: &str, selector: &PageSelector) -> String {
    match command.trim().to_ascii_lowercase().as_str() {
        "next" => format!("page -> {}", selector.advance()),
        "status" => format!("page {}", selector.current()),
        _ => USAGE.to_string(),
    }
}

/// Background listener thread
pub struct ControlServer {
    local_addr: SocketAddr,
    running: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl ControlServer {
    /// Bind `addr` and start answering commands
    pub fn start(addr: &str, selector: Arc<PageSelector>) -> Result<Self> {
        let socket = UdpSocket::bind(addr).with_context(|| format!("Failed to bind control socket {addr}"))?;
        socket
            .set_read_timeout(Some(POLL_INTERVAL))
            .context("Failed to set control socket timeout")?;
        let local_addr = socket.local_addr().context("Control socket has no local address")?;

        let running = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&running);
        let thread = thread::Builder::new()
            .name(String::from("control"))
            .spawn(move || serve(&socket, &selector, &flag))
            .context("Failed to spawn control thread")?;

        info!("Control plane listening on {}", local_addr);
        Ok(Self {
            local_addr,
            running,
            thread: Some(thread),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Ask the thread to exit and wait for it
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("Control thread exited abnormally");
            }
            info!("Control plane stopped");
        }
    }
}

impl Drop for ControlServer {
    fn drop(&mut self) {
        self.stop();
    }
}

fn serve(socket: &UdpSocket, selector: &PageSelector, running: &AtomicBool) {
    let mut buf = [0u8; MAX_DATAGRAM];
    while running.load(Ordering::SeqCst) {
        let (len, peer) = match socket.recv_from(&mut buf) {
            Ok(received) => received,
            Err(e) if matches!(e.kind(), std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut) => {
                continue;
            }
            Err(e) => {
                warn!("Control receive failed: {}", e);
                continue;
            }
        };
        let command = String::from_utf8_lossy(&buf[..len]);
        let reply = handle_command(&command, selector);
        debug!("Control {:?} from {} -> {:?}", command.trim(), peer, reply);
        if let Err(e) = socket.send_to(reply.as_bytes(), peer) {
            warn!("Control reply to {} failed: {}", peer, e);
        }
    }
}

/// Send one command and wait for the reply
pub fn send_command(addr: &str, command: &str, timeout: Duration) -> Result<String> {
    let target = addr
        .to_socket_addrs()
        .with_context(|| format!("Invalid control address {addr}"))?
        .next()
        .with_context(|| format!("Control address {addr} did not resolve"))?;
    let local = if target.is_ipv4() { "0.0.0.0:0" } else { "[::]:0" };
    let socket = UdpSocket::bind(local).context("Failed to bind client socket")?;
    socket
        .set_read_timeout(Some(timeout))
        .context("Failed to set client timeout")?;
    socket
        .send_to(command.as_bytes(), target)
        .with_context(|| format!("Failed to send to {target}"))?;

    let mut buf = [0u8; MAX_DATAGRAM];
    let (len, _) = socket
        .recv_from(&mut buf)
        .with_context(|| format!("No reply from {target}"))?;
    Ok(String::from_utf8_lossy(&buf[..len]).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_command() {
        let selector = PageSelector::new(3);
        assert_eq!(handle_command("status", &selector), "page 0");
        assert_eq!(handle_command("  NEXT\n", &selector), "page -> 1");
        assert_eq!(handle_command("Status", &selector), "page 1");
        assert_eq!(handle_command("jump 2", &selector), USAGE);
        assert_eq!(handle_command("", &selector), USAGE);
    }

    #[test]
    fn test_next_respects_lock() {
        let selector = PageSelector::new(3);
        selector.lock();
        assert_eq!(handle_command("next", &selector), "page -> 0");
        selector.unlock();
        assert_eq!(handle_command("next", &selector), "page -> 1");
    }

    #[test]
    fn test_round_trip_over_udp() {
        let selector = Arc::new(PageSelector::new(8));
        let mut server = ControlServer::start("127.0.0.1:0", Arc::clone(&selector)).unwrap();
        let addr = server.local_addr().to_string();
        let timeout = Duration::from_secs(2);

        assert_eq!(send_command(&addr, "next", timeout).unwrap(), "page -> 1");
        assert_eq!(send_command(&addr, "next", timeout).unwrap(), "page -> 2");
        assert_eq!(send_command(&addr, "status", timeout).unwrap(), "page 2");
        assert_eq!(send_command(&addr, "help", timeout).unwrap(), USAGE);
        assert_eq!(selector.current(), 2);

        server.stop();
        assert!(send_command(&addr, "status", Duration::from_millis(200)).is_err());
    }
}
