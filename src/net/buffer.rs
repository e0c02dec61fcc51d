//! Fixed-capacity per-connection read/write buffers with consume semantics.
//! Generalizes the teacher's `Protocol` wrapper around a
//! `BufReader<TcpStream>` into an explicit, reactor-friendly buffer the
//! session loop drives by hand rather than blocking reads.

use std::io::{self, ErrorKind, Read, Write};
use thiserror::Error;

pub const DEFAULT_BUFFER_CAPACITY: usize = 4096;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum BufferError {
    #[error("read buffer is full; the connection must be dropped")]
    Overflow,
}

/// Outcome of a single `read()` attempt against the underlying socket.
#[derive(Debug, PartialEq, Eq)]
pub enum ReadOutcome {
    Read(usize),
    WouldBlock,
    EndOfStream,
}

/// Holds the valid region `[0, offset)` of a fixed-capacity read buffer and a
/// plain growable write buffer for outgoing bytes.
pub struct ConnectionBuffer {
    read_buf: Vec<u8>,
    offset: usize,
    write_buf: Vec<u8>,
    capacity: usize,
}

impl ConnectionBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            read_buf: vec![0u8; capacity],
            offset: 0,
            write_buf: Vec::new(),
            capacity,
        }
    }

    /// The valid, not-yet-consumed region of the read buffer.
    pub fn filled(&self) -> &[u8] {
        &self.read_buf[..self.offset]
    }

    /// Reads from `source` into the unfilled tail of the read buffer.
    pub fn read_from(&mut self, source: &mut impl Read) -> Result<ReadOutcome, BufferError> {
        if self.offset == self.capacity {
            return Err(BufferError::Overflow);
        }
        match source.read(&mut self.read_buf[self.offset..]) {
            Ok(0) => Ok(ReadOutcome::EndOfStream),
            Ok(n) => {
                self.offset += n;
                Ok(ReadOutcome::Read(n))
            }
            Err(e) if e.kind() == ErrorKind::WouldBlock => Ok(ReadOutcome::WouldBlock),
            Err(e) if e.kind() == ErrorKind::Interrupted => Ok(ReadOutcome::Read(0)),
            Err(_) => Ok(ReadOutcome::EndOfStream),
        }
    }

    /// Advances the logical start of the read buffer by `n` bytes, shifting
    /// the remaining tail down to the front.
    pub fn consume(&mut self, n: usize) {
        debug_assert!(n <= self.offset);
        let remaining = self.offset - n;
        self.read_buf.copy_within(n..self.offset, 0);
        self.offset = remaining;
    }

    pub fn queue_write(&mut self, bytes: &[u8]) {
        self.write_buf.extend_from_slice(bytes);
    }

    /// A single non-blocking write attempt of the queued bytes. Partial
    /// writes and `WouldBlock` are logged by the caller and the delivery is
    /// dropped rather than retried.
    pub fn flush_once(&mut self, sink: &mut impl Write) -> io::Result<usize> {
        if self.write_buf.is_empty() {
            return Ok(0);
        }
        let n = sink.write(&self.write_buf)?;
        self.write_buf.clear();
        Ok(n)
    }

    pub fn is_full(&self) -> bool {
        self.offset == self.capacity
    }
}
