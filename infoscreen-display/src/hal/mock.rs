//! Recording bus for tests and headless runs
//!
//! Every operation is appended to a shared log. Writes are classified as
//! commands or data by the DC level at the time of the write, so tests can
//! assert on the register sequence directly.

use std::sync::{Arc, Mutex, MutexGuard};
use std::sync::atomic::{AtomicU64, Ordering};

use embedded_hal::delay::DelayNs;

use super::{BusError, DisplayInterface, Level, Pin};

/// One recorded bus operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    Pin(Pin, Level),
    Command(u8),
    Data(Vec<u8>),
    Reopen,
    Close,
}

#[derive(Debug)]
struct MockState {
    ops: Vec<Op>,
    dc: Level,
    fail_writes: usize,
    fail_reopens: usize,
    closed: bool,
    max_transfer: usize,
    /// Keep at most this many ops, dropping the oldest
    log_limit: Option<usize>,
}

impl MockState {
    fn record(&mut self, op: Op) {
        self.ops.push(op);
        if let Some(limit) = self.log_limit {
            if self.ops.len() > limit {
                let excess = self.ops.len() - limit;
                self.ops.drain(..excess);
            }
        }
    }
}

/// Cloneable handle to a recording bus; clones share the same log
#[derive(Debug, Clone)]
pub struct MockInterface {
    state: Arc<Mutex<MockState>>,
}

impl Default for MockInterface {
    fn default() -> Self {
        Self::new()
    }
}

impl MockInterface {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState {
                ops: Vec::new(),
                dc: Level::High,
                fail_writes: 0,
                fail_reopens: 0,
                closed: false,
                max_transfer: 4096,
                log_limit: None,
            })),
        }
    }

    /// Set the chunk size reported by [`DisplayInterface::max_transfer`]
    pub fn with_max_transfer(self, max_transfer: usize) -> Self {
        self.lock().max_transfer = max_transfer;
        self
    }

    /// Bound the log for long headless runs
    pub fn with_log_limit(self, limit: usize) -> Self {
        self.lock().log_limit = Some(limit);
        self
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Make the next `count` byte writes fail
    pub fn fail_next_writes(&self, count: usize) {
        self.lock().fail_writes = count;
    }

    /// Make the next `count` reopen attempts fail
    pub fn fail_next_reopens(&self, count: usize) {
        self.lock().fail_reopens = count;
    }

    /// Snapshot of the recorded operations
    pub fn ops(&self) -> Vec<Op> {
        self.lock().ops.clone()
    }

    /// Command bytes in the order they were sent
    pub fn commands(&self) -> Vec<u8> {
        self.lock()
            .ops
            .iter()
            .filter_map(|op| match op {
                Op::Command(c) => Some(*c),
                _ => None,
            })
            .collect()
    }

    /// Total number of data bytes written
    pub fn data_len(&self) -> usize {
        self.lock()
            .ops
            .iter()
            .map(|op| match op {
                Op::Data(d) => d.len(),
                _ => 0,
            })
            .sum()
    }

    /// Number of successful and failed reopen calls
    pub fn reopen_count(&self) -> usize {
        self.lock().ops.iter().filter(|op| **op == Op::Reopen).count()
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    pub fn clear_log(&self) {
        self.lock().ops.clear();
    }
}

impl DisplayInterface for MockInterface {
    fn set_pin(&mut self, pin: Pin, level: Level) -> Result<(), BusError> {
        let mut state = self.lock();
        if pin == Pin::DataCommand {
            state.dc = level;
        }
        state.record(Op::Pin(pin, level));
        Ok(())
    }

    fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), BusError> {
        let mut state = self.lock();
        if state.closed {
            return Err(BusError::Closed);
        }
        if state.fail_writes > 0 {
            state.fail_writes -= 1;
            return Err(BusError::Spi("injected failure".into()));
        }
        let op = match state.dc {
            Level::Low if bytes.len() == 1 => Op::Command(bytes[0]),
            _ => Op::Data(bytes.to_vec()),
        };
        state.record(op);
        Ok(())
    }

    fn reopen(&mut self) -> Result<(), BusError> {
        let mut state = self.lock();
        state.record(Op::Reopen);
        if state.fail_reopens > 0 {
            state.fail_reopens -= 1;
            state.closed = true;
            return Err(BusError::Open {
                device: "mock".into(),
                message: "injected failure".into(),
            });
        }
        state.closed = false;
        Ok(())
    }

    fn close(&mut self) {
        let mut state = self.lock();
        state.closed = true;
        state.record(Op::Close);
    }

    fn max_transfer(&self) -> usize {
        self.lock().max_transfer
    }
}

/// Delay that only accumulates the requested time
#[derive(Debug, Clone, Default)]
pub struct MockDelay {
    elapsed_ns: Arc<AtomicU64>,
}

impl MockDelay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total requested delay in milliseconds
    pub fn elapsed_ms(&self) -> u64 {
        self.elapsed_ns.load(Ordering::Relaxed) / 1_000_000
    }
}

impl DelayNs for MockDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.elapsed_ns.fetch_add(u64::from(ns), Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_and_data_classification() {
        let mut bus = MockInterface::new();
        bus.write_command(0x29).unwrap();
        bus.write_data(&[0x55]).unwrap();

        assert_eq!(bus.commands(), vec![0x29]);
        assert_eq!(bus.data_len(), 1);
        assert_eq!(
            bus.ops()[..3],
            [
                Op::Pin(Pin::ChipSelect, Level::Low),
                Op::Pin(Pin::DataCommand, Level::Low),
                Op::Command(0x29),
            ]
        );
    }

    #[test]
    fn test_injected_failures_are_consumed() {
        let mut bus = MockInterface::new();
        bus.fail_next_writes(1);
        assert!(bus.write_data(&[1, 2]).is_err());
        assert!(bus.write_data(&[1, 2]).is_ok());
    }

    #[test]
    fn test_stream_respects_max_transfer() {
        let mut bus = MockInterface::new().with_max_transfer(3);
        bus.write_stream(&[0u8; 7]).unwrap();
        let chunks: Vec<usize> = bus
            .ops()
            .iter()
            .filter_map(|op| match op {
                Op::Data(d) => Some(d.len()),
                _ => None,
            })
            .collect();
        assert_eq!(chunks, vec![3, 3, 1]);
    }

    #[test]
    fn test_closed_bus_rejects_writes() {
        let mut bus = MockInterface::new();
        bus.close();
        assert!(matches!(bus.write_bytes(&[0]), Err(BusError::Closed)));
        bus.reopen().unwrap();
        assert!(bus.write_bytes(&[0]).is_ok());
    }

    #[test]
    fn test_log_limit_keeps_newest() {
        let mut bus = MockInterface::new().with_log_limit(2);
        bus.write_command(0x01).unwrap();
        bus.write_command(0x11).unwrap();
        assert_eq!(bus.ops().len(), 2);
        assert_eq!(bus.ops().last(), Some(&Op::Pin(Pin::ChipSelect, Level::High)));
        assert_eq!(bus.commands(), vec![0x11]);
    }

    #[test]
    fn test_mock_delay_accumulates() {
        let mut delay = MockDelay::new();
        delay.delay_ms(100);
        delay.delay_ms(20);
        assert_eq!(delay.elapsed_ms(), 120);
    }
}
