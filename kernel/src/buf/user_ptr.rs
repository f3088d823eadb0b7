use super::{copy_to_user, UserPtr};
use crate::code::EFAULT;
use crate::error::KernelResult as Result;
use crate::host::UserAccess;

/// A pointer to an area in userspace memory, which can be either read-only or read-write.
///
/// All methods on this struct are safe: attempting to write outside the caller's mappings
/// results in an [`EFAULT`] error rather than a write to arbitrary memory.
pub struct UserSlice<'a> {
    access: &'a dyn UserAccess,
    ptr: UserPtr,
    length: usize,
}

impl<'a> UserSlice<'a> {
    /// Constructs a user slice from a raw pointer and a length in bytes.
    ///
    /// Nothing is checked here; every access through the returned slice is.
    pub fn new(access: &'a dyn UserAccess, ptr: UserPtr, length: usize) -> Self {
        UserSlice {
            access,
            ptr,
            length,
        }
    }

    /// Constructs a [`UserSliceWriter`].
    pub fn writer(self) -> UserSliceWriter<'a> {
        UserSliceWriter {
            access: self.access,
            ptr: self.ptr,
            length: self.length,
        }
    }
}

/// A writer for [`UserSlice`].
///
/// Used to incrementally write into the user slice.
pub struct UserSliceWriter<'a> {
    access: &'a dyn UserAccess,
    ptr: UserPtr,
    length: usize,
}

impl UserSliceWriter<'_> {
    /// Returns the amount of space remaining in this buffer.
    ///
    /// Note that even writing less than this number of bytes may fail.
    pub fn len(&self) -> usize {
        self.length
    }

    /// Returns `true` if no more data can be written to this buffer.
    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Writes raw data to this user pointer from a kernel buffer.
    ///
    /// Fails with [`EFAULT`] if the write happens on a bad address, or if the write goes out of
    /// bounds of this [`UserSliceWriter`]. On failure nothing has been written and the writer is
    /// unchanged.
    pub fn write_slice(&mut self, data: &[u8]) -> Result {
        let len = data.len();
        if len > self.length {
            return Err(EFAULT);
        }
        copy_to_user(self.access, self.ptr, data)?;
        self.ptr = self.ptr.wrapping_add(len);
        self.length -= len;
        Ok(())
    }
}
