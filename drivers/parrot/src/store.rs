//! The bytes the device hands out.

/// Compiled-in content of the device.
pub const PAYLOAD: &[u8] = b"Hello, world!";

/// A fixed, read-only byte payload that lives as long as the module.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferStore {
    bytes: &'static [u8],
}

impl BufferStore {
    pub const fn new(bytes: &'static [u8]) -> Self {
        BufferStore { bytes }
    }

    pub fn as_bytes(&self) -> &'static [u8] {
        self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Bytes from `offset` to the end; empty at or past the end.
    pub fn remaining_from(&self, offset: usize) -> &'static [u8] {
        self.bytes.get(offset..).unwrap_or_default()
    }
}

impl Default for BufferStore {
    fn default() -> Self {
        BufferStore::new(PAYLOAD)
    }
}
