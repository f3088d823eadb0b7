//! The primitives a kernel provides to a character device driver.
//!
//! Drivers never reach the kernel directly; they are handed an
//! `Arc<dyn Host>` through [`ThisModule`](crate::ThisModule) and everything
//! they do (device numbers, cdev publication, copies to user memory) goes
//! through it.

use crate::{
    error::KernelResult as Result,
    fs::file_operations::FileOperationsTable,
    DevT,
};
use alloc::sync::Arc;
use core::any::Any;

/// The type used for userspace addresses.
pub type UserPtr = usize;

/// Shared context handed to a device's `open` callback.
///
/// Holds an `Arc<T::OpenData>` erased to `dyn Any`: the callback downcasts
/// to `T::OpenData` itself, so a context built by hand must wrap the value
/// in its own `Arc` even when `OpenData` is already an `Arc`.
pub type OpenContext = Arc<dyn Any + Send + Sync>;

/// Access to the memory of the calling process.
pub trait UserAccess: Send + Sync {
    /// Checks that `[ptr, ptr + len)` is mapped writable in the caller's
    /// address space. Equivalent to `access_ok` for a write.
    fn access_ok(&self, ptr: UserPtr, len: usize) -> bool;

    /// Copies `from` to user memory at `to`.
    ///
    /// Returns the number of bytes that could not be copied, like
    /// `raw_copy_to_user`. Callers must go through
    /// [`copy_to_user`](crate::buf::copy_to_user) instead of calling this.
    fn raw_copy_to_user(&self, to: UserPtr, from: &[u8]) -> usize;
}

/// A character device as handed to [`Host::cdev_add`], the equivalent of an
/// initialised `struct cdev`.
#[derive(Clone)]
pub struct Cdev {
    /// Name of the module owning the device, the `owner` slot of the table.
    pub owner: &'static str,
    pub ops: &'static FileOperationsTable,
    pub context: OpenContext,
}

/// Device number and cdev management.
///
/// C header: `include/linux/cdev.h`, `include/linux/fs.h`
pub trait Host: UserAccess {
    /// Allocates `count` minors starting at `first_minor` under a dynamically
    /// chosen major. Equivalent to `alloc_chrdev_region`.
    fn alloc_chrdev_region(&self, first_minor: u32, count: u32, name: &'static str)
        -> Result<DevT>;

    /// Releases a region obtained from [`Host::alloc_chrdev_region`].
    fn unregister_chrdev_region(&self, first: DevT, count: u32) -> Result;

    /// Makes `cdev` live for `count` minors starting at `dev`. From this
    /// point on the host may call into `cdev.ops`.
    fn cdev_add(&self, cdev: Cdev, dev: DevT, count: u32) -> Result;

    /// Removes a device added with [`Host::cdev_add`]. Already open files
    /// keep working until they are released.
    fn cdev_del(&self, dev: DevT) -> Result;
}
