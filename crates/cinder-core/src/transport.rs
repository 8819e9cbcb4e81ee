//! Transport read buffer shared between a connection and its driver.
//!
//! The connection appends bytes as they arrive from the socket; the driver
//! hands the buffer to the state machine, which consumes whole records from
//! the front. The driver never appends.

use std::{cell::RefCell, rc::Rc};

use bytes::{Bytes, BytesMut};

/// Buffer shared between the connection and the driver.
pub type SharedReadBuffer = Rc<RefCell<TransportReadBuffer>>;

/// FIFO of bytes read from the transport and not yet consumed.
#[derive(Debug, Default)]
pub struct TransportReadBuffer {
    buf: BytesMut,
}

impl TransportReadBuffer {
    /// Create an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty buffer wrapped for sharing.
    pub fn shared() -> SharedReadBuffer {
        Rc::new(RefCell::new(Self::new()))
    }

    /// Append bytes read from the transport.
    pub fn append(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Number of unconsumed bytes.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// True if nothing is buffered.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Unconsumed bytes, without consuming them.
    pub fn peek(&self) -> &[u8] {
        &self.buf
    }

    /// Consume and return the first `len` bytes. `None` if fewer are
    /// buffered.
    pub fn take(&mut self, len: usize) -> Option<Bytes> {
        if len > self.buf.len() {
            return None;
        }
        Some(self.buf.split_to(len).freeze())
    }

    /// Consume everything that is buffered.
    pub fn take_all(&mut self) -> Bytes {
        self.buf.split().freeze()
    }
}
