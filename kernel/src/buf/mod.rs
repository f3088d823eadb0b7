//! User-space buffers.
//!
//! Kernel code never dereferences a [`UserPtr`]. The only way bytes reach
//! caller memory is [`copy_to_user`], which validates the whole destination
//! range before the first byte is written.

mod user_ptr;

pub use user_ptr::*;

use crate::code::EFAULT;
use crate::error::KernelResult as Result;
use crate::host::UserAccess;
pub use crate::host::UserPtr;

/// Copies `from` into user memory at `to`.
///
/// Fails with [`EFAULT`] before touching anything if `[to, to + from.len())`
/// is not a writable mapping of the caller, and also if the copy itself
/// comes up short. On success the returned count equals `from.len()`.
pub fn copy_to_user(access: &dyn UserAccess, to: UserPtr, from: &[u8]) -> Result<usize> {
    let len = from.len();
    if len == 0 {
        return Ok(0);
    }
    if to.checked_add(len).is_none() || !access.access_ok(to, len) {
        return Err(EFAULT);
    }
    let uncopied = access.raw_copy_to_user(to, from);
    if uncopied != 0 {
        return Err(EFAULT);
    }
    Ok(len)
}
