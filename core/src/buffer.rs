//! Per-transfer response accumulator.

/// Initial capacity reserved for every transfer.
pub const INITIAL_CAPACITY: usize = 4096;

/// Append-only byte buffer fed by the transport's write callback.
///
/// One buffer is created per `perform` call and consumed (or dropped) before
/// that call returns.
#[derive(Debug)]
pub struct ResponseBuffer {
    bytes: Vec<u8>,
}

impl ResponseBuffer {
    pub fn new() -> Self {
        Self::with_capacity(INITIAL_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            bytes: Vec::with_capacity(capacity.max(1)),
        }
    }

    /// Append one received chunk and return the number of bytes consumed.
    ///
    /// Returns 0 when the buffer cannot grow, which the transport treats as
    /// a write failure and aborts the transfer.
    pub fn append(&mut self, chunk: &[u8]) -> usize {
        if self.bytes.try_reserve(chunk.len()).is_err() {
            return 0;
        }
        self.bytes.extend_from_slice(chunk);
        chunk.len()
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.bytes.capacity()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

impl Default for ResponseBuffer {
    fn default() -> Self {
        Self::new()
    }
}
