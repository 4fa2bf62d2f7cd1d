//! In-memory transport used by the integration tests.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use maestro_servo::serial::protocol::{self, DeviceAddress};
use maestro_servo::serial::{PortOpener, PortSettings, SerialError, SerialLink};

pub const DEVICE: DeviceAddress = DeviceAddress::new(12);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Write(Vec<u8>),
    Read(Vec<u8>),
}

/// Shared state behind every link the mock opener hands out.
#[derive(Default)]
pub struct MockState {
    pub events: Vec<Event>,
    pub rx: VecDeque<u8>,
    pub fail_next_write: bool,
    /// Number of upcoming open attempts that fail.
    pub failing_opens: usize,
    pub open_attempts: Vec<tokio::time::Instant>,
    pub successful_opens: usize,
    /// Links dropped by the interface, i.e. closed ports.
    pub closed_links: usize,
    pub clears: usize,
    /// Position reported by get_position, per channel. Defaults to 6000.
    pub positions: std::collections::HashMap<u8, u16>,
    /// Drop the second byte of word responses.
    pub truncate_responses: bool,
    pub read_delay: Option<Duration>,
}

impl MockState {
    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.events
            .iter()
            .filter_map(|e| match e {
                Event::Write(frame) => Some(frame.clone()),
                Event::Read(_) => None,
            })
            .collect()
    }

    /// Channels of every addressed get_position frame, in write order.
    pub fn polled_channels(&self) -> Vec<u8> {
        self.writes()
            .into_iter()
            .filter(|f| f.len() == 4 && f[2] == protocol::OP_GET_POSITION & 0x7F)
            .map(|f| f[3])
            .collect()
    }

    fn respond(&mut self, frame: &[u8]) {
        // Addressed frames only: [0xAA, device, opcode, args...]
        if frame.len() < 3 || frame[0] != protocol::ADDRESSED_START {
            return;
        }
        let response: Vec<u8> = match frame[2] | 0x80 {
            protocol::OP_GET_POSITION => {
                let position = self.positions.get(&frame[3]).copied().unwrap_or(6000);
                vec![(position & 0xFF) as u8, (position >> 8) as u8]
            }
            protocol::OP_GET_ERRORS => vec![0, 0],
            protocol::OP_GET_MOVING_STATE => vec![1],
            _ => Vec::new(),
        };
        let keep = if self.truncate_responses && response.len() > 1 {
            response.len() - 1
        } else {
            response.len()
        };
        self.rx.extend(&response[..keep]);
    }
}

pub type Shared = Arc<Mutex<MockState>>;

pub struct MockLink {
    state: Shared,
}

impl SerialLink for MockLink {
    fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.fail_next_write {
            state.fail_next_write = false;
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "cable pulled"));
        }
        state.events.push(Event::Write(data.to_vec()));
        state.respond(data);
        Ok(())
    }

    fn read_exact(&mut self, buf: &mut [u8]) -> io::Result<()> {
        let delay = self.state.lock().unwrap().read_delay;
        if let Some(delay) = delay {
            std::thread::sleep(delay);
        }
        let mut state = self.state.lock().unwrap();
        if state.rx.len() < buf.len() {
            state.rx.clear();
            return Err(io::Error::new(io::ErrorKind::TimedOut, "short read"));
        }
        for byte in buf.iter_mut() {
            *byte = state.rx.pop_front().unwrap();
        }
        state.events.push(Event::Read(buf.to_vec()));
        Ok(())
    }

    fn clear_input(&mut self) -> io::Result<()> {
        let mut state = self.state.lock().unwrap();
        state.rx.clear();
        state.clears += 1;
        Ok(())
    }
}

impl Drop for MockLink {
    fn drop(&mut self) {
        if let Ok(mut state) = self.state.lock() {
            state.closed_links += 1;
        }
    }
}

#[derive(Clone, Default)]
pub struct MockOpener {
    pub state: Shared,
}

impl MockOpener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(opens: usize) -> Self {
        let opener = Self::default();
        opener.state.lock().unwrap().failing_opens = opens;
        opener
    }
}

impl PortOpener for MockOpener {
    fn open(&self, settings: &PortSettings) -> Result<Box<dyn SerialLink>, SerialError> {
        let mut state = self.state.lock().unwrap();
        state.open_attempts.push(tokio::time::Instant::now());
        if state.failing_opens > 0 {
            state.failing_opens -= 1;
            return Err(SerialError::PortNotFound(settings.port_name.clone()));
        }
        state.successful_opens += 1;
        Ok(Box::new(MockLink {
            state: self.state.clone(),
        }))
    }
}

pub fn settings() -> PortSettings {
    PortSettings {
        port_name: "/dev/mock0".to_string(),
        baud_rate: 115200,
        read_timeout_ms: 100,
    }
}
