//! Per-socket input/output buffering and frame splitting, driven by the
//! event loop's readiness notifications.
//!
//! A `Connection` owns its socket outright: once the event loop tells it a
//! file descriptor is readable or writable, it performs the actual read or
//! write itself, buffering whatever doesn't fit in one non-blocking call
//! rather than handing raw bytes to and from a side-effect-free transform.

use crate::address::Stream;
use crate::error::{ErrorKind, Result};
use crate::message::{parse_message, ParseResult};
use std::collections::VecDeque;

/// Input buffer cap (8 MiB). Exceeding it pauses reads but keeps the socket
/// registered so pending writes can still drain.
pub const MAX_INPUT_BUFFER: usize = 8 * 1024 * 1024;

/// Per-tick write chunk size.
pub const WRITE_CHUNK: usize = 8 * 1024;

/// Which direction(s) the event loop should poll this connection for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interest {
    pub readable: bool,
    pub writable: bool,
}

/// A single client socket's buffered, frame-oriented I/O state.
pub struct Connection {
    stream: Box<dyn Stream>,
    recv_buf: Vec<u8>,
    send_buf: VecDeque<u8>,
    max_input_buffer: usize,
    pub(crate) eof: bool,
}

impl Connection {
    pub fn new(stream: Box<dyn Stream>) -> Result<Self> {
        Self::with_cap(stream, MAX_INPUT_BUFFER)
    }

    pub fn with_cap(stream: Box<dyn Stream>, max_input_buffer: usize) -> Result<Self> {
        stream.set_nonblocking(true)?;
        Ok(Connection {
            stream,
            recv_buf: Vec::new(),
            send_buf: VecDeque::new(),
            max_input_buffer,
            eof: false,
        })
    }

    pub fn desired_events(&self) -> Interest {
        Interest {
            readable: !self.eof && self.recv_buf.len() < self.max_input_buffer,
            writable: !self.send_buf.is_empty(),
        }
    }

    /// Read up to one chunk into the input buffer. Returns `true` if the peer
    /// closed the connection (a zero-byte read).
    pub fn fill_read(&mut self) -> Result<bool> {
        let mut chunk = [0u8; WRITE_CHUNK];
        loop {
            match std::io::Read::read(&mut self.stream, &mut chunk) {
                Ok(0) => {
                    self.eof = true;
                    return Ok(true);
                }
                Ok(n) => {
                    self.recv_buf.extend_from_slice(&chunk[..n]);
                    if n < chunk.len() {
                        return Ok(false);
                    }
                }
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => return Ok(false),
                Err(e) => return Err(ErrorKind::Io(e)),
            }
        }
    }

    /// Drain up to one chunk from the output buffer to the socket.
    pub fn drain_write(&mut self) -> Result<()> {
        while !self.send_buf.is_empty() {
            let chunk: Vec<u8> = self.send_buf.iter().take(WRITE_CHUNK).copied().collect();
            match std::io::Write::write(&mut self.stream, &chunk) {
                Ok(0) => break,
                Ok(n) => {
                    self.send_buf.drain(..n);
                }
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => break,
                Err(e) => return Err(ErrorKind::Io(e)),
            }
        }
        Ok(())
    }

    /// Pop every complete NUL-terminated frame currently buffered.
    pub fn read_frames(&mut self) -> Vec<Vec<u8>> {
        let mut frames = Vec::new();
        loop {
            match parse_message(&self.recv_buf) {
                ParseResult::Complete { payload, consumed } => {
                    frames.push(payload.to_vec());
                    self.recv_buf.drain(..consumed);
                }
                ParseResult::Incomplete => break,
            }
        }
        frames
    }

    pub fn write(&mut self, bytes: &[u8]) {
        self.send_buf.extend(bytes.iter().copied());
    }

    pub fn has_pending_output(&self) -> bool {
        !self.send_buf.is_empty()
    }

    pub fn shutdown(&self) {
        let _ = self.stream.shutdown();
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::os::unix::net::UnixStream;

    #[test]
    fn test_frame_splitting_across_fills() {
        let (mut a, b) = UnixStream::pair().unwrap();
        let mut conn = Connection::new(Box::new(b)).unwrap();
        std::io::Write::write_all(&mut a, b"{\"method\":\"a.b.F\"}\0{\"method\":").unwrap();
        conn.fill_read().unwrap();
        let frames = conn.read_frames();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0], b"{\"method\":\"a.b.F\"}");
        assert!(conn.read_frames().is_empty());
    }

    #[test]
    fn test_desired_events_writable_only_with_pending_output() {
        let (_a, b) = UnixStream::pair().unwrap();
        let mut conn = Connection::new(Box::new(b)).unwrap();
        assert!(!conn.desired_events().writable);
        conn.write(b"x");
        assert!(conn.desired_events().writable);
    }
}
