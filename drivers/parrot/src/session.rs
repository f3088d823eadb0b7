//! Per-open read state.
//!
//! Every open of the device gets its own [`Session`] with a cursor starting
//! at zero. Sessions only share the read-only [`BufferStore`] and a counter,
//! so they never get in each other's way.

use alloc::sync::Arc;
use core::sync::atomic::{AtomicUsize, Ordering};

use kernel::{
    buf::UserSliceWriter,
    error::KernelResult,
    fs::file_operations::{File, FileOperations, ReadFn},
};
use spin::Mutex;

use crate::{
    error::{ParrotError, Result},
    store::BufferStore,
};

/// State shared by every open of the device.
#[derive(Debug)]
pub struct DeviceState {
    store: BufferStore,
    open_sessions: AtomicUsize,
}

impl DeviceState {
    pub fn new(store: BufferStore) -> Self {
        DeviceState {
            store,
            open_sessions: AtomicUsize::new(0),
        }
    }

    pub fn store(&self) -> &BufferStore {
        &self.store
    }

    /// Number of sessions currently open. Diagnostic only.
    pub fn open_sessions(&self) -> usize {
        self.open_sessions.load(Ordering::Relaxed)
    }
}

/// An open handle on the device.
pub struct Session {
    state: Arc<DeviceState>,
    // Never exceeds `state.store.len()`. Held across the user copy so reads
    // racing on one file hand out each byte once. On a real kernel this
    // must be a sleeping mutex: the copy can fault and sleep.
    offset: Mutex<usize>,
}

impl Session {
    /// Opens a new session at offset zero.
    pub fn open(state: &Arc<DeviceState>) -> Self {
        state.open_sessions.fetch_add(1, Ordering::Relaxed);
        Session {
            state: state.clone(),
            offset: Mutex::new(0),
        }
    }

    pub fn offset(&self) -> usize {
        *self.offset.lock()
    }

    /// Copies the next `min(buf.len(), remaining)` bytes into `buf`.
    ///
    /// Returns the number of bytes copied; zero once everything has been
    /// read. If the caller's memory cannot be written the cursor does not
    /// move and the session stays usable.
    pub fn read(&self, buf: &mut UserSliceWriter<'_>) -> Result<usize> {
        let mut offset = self.offset.lock();
        let data = self.state.store.remaining_from(*offset);
        let count = data.len().min(buf.len());
        buf.write_slice(&data[..count]).map_err(|_| ParrotError::Fault)?;
        *offset += count;
        Ok(count)
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.state.open_sessions.fetch_sub(1, Ordering::Relaxed);
    }
}

impl FileOperations for Session {
    type OpenData = Arc<DeviceState>;

    fn open(context: &Arc<DeviceState>, file: &File) -> KernelResult<Self> {
        let session = Session::open(context);
        log::debug!("open {} ({} open)", file.dev(), context.open_sessions());
        Ok(session)
    }

    // The session cursor is authoritative; the host position only mirrors it.
    const READ: ReadFn<Self> = Some(
        |this: &Self,
         _file: &File,
         buf: &mut UserSliceWriter<'_>,
         _offset: u64|
         -> KernelResult<usize> { Ok(this.read(buf)?) },
    );

    fn release(self, file: &File) {
        log::debug!("release {} at offset {}", file.dev(), self.offset());
    }
}
