//! Kernel errors.
//!
//! C header: `include/uapi/asm-generic/errno-base.h`

use core::fmt;

use crate::pr_warn;

pub type KernelResult<T = ()> = Result<T, Error>;

/// Largest errno the kernel hands out, mirrors `MAX_ERRNO`.
pub const MAX_ERRNO: i32 = 4095;

/// Generic integer kernel error.
///
/// # Invariants
///
/// The value is a valid `errno` (i.e. `>= -MAX_ERRNO && < 0`).
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Error(i32);

impl Error {
    /// Creates an [`Error`] from a kernel error code.
    ///
    /// Out of range codes are reported and collapse to [`linux_err::EINVAL`].
    pub fn from_errno(errno: i32) -> Error {
        if !(-MAX_ERRNO..0).contains(&errno) {
            pr_warn!(
                "attempted to create `Error` with out of range `errno`: {}",
                errno
            );
            return linux_err::EINVAL;
        }
        // INVARIANT: The check above ensures the type invariant
        // will hold.
        Error(errno)
    }

    pub fn to_errno(&self) -> i32 {
        self.0
    }

    /// Returns a string representing the error, if one exists.
    pub fn name(&self) -> Option<&'static str> {
        linux_err::name_of(-self.0)
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            // Print out number if no name can be found.
            None => f.debug_tuple("Error").field(&-self.0).finish(),
            Some(name) => f.debug_tuple(name).finish(),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            None => write!(f, "errno {}", -self.0),
            Some(name) => write!(f, "{} ({})", name, linux_err::describe(-self.0)),
        }
    }
}

/// Contains the C-compatible error codes.
#[rustfmt::skip]
#[allow(unused)]
pub mod linux_err {
    macro_rules! declare_err {
        ($($err:ident = $num:literal, $doc:expr;)+) => {
            $(
            #[doc = $doc]
            pub const $err: super::Error = super::Error(-$num);
            )+

            pub(super) fn name_of(errno: i32) -> Option<&'static str> {
                match errno {
                    $($num => Some(stringify!($err)),)+
                    _ => None,
                }
            }

            pub(super) fn describe(errno: i32) -> &'static str {
                match errno {
                    $($num => $doc,)+
                    _ => "Unknown error.",
                }
            }
        };
    }

    declare_err! {
        EPERM = 1, "Operation not permitted.";
        ENOENT = 2, "No such file or directory.";
        EINTR = 4, "Interrupted system call.";
        EIO = 5, "I/O error.";
        ENXIO = 6, "No such device or address.";
        EBADF = 9, "Bad file number.";
        EAGAIN = 11, "Try again.";
        ENOMEM = 12, "Out of memory.";
        EACCES = 13, "Permission denied.";
        EFAULT = 14, "Bad address.";
        EBUSY = 16, "Device or resource busy.";
        EEXIST = 17, "File exists.";
        ENODEV = 19, "No such device.";
        EINVAL = 22, "Invalid argument.";
        ENFILE = 23, "File table overflow.";
        EMFILE = 24, "Too many open files.";
        ENOTTY = 25, "Not a typewriter.";
        ENOSPC = 28, "No space left on device.";
        ESPIPE = 29, "Illegal seek.";
        EROFS = 30, "Read-only file system.";
        ERANGE = 34, "Math result not representable.";
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::format;

    #[test]
    fn errno_round_trips_through_constants() {
        assert_eq!(linux_err::EFAULT.to_errno(), -14);
        assert_eq!(Error::from_errno(-14), linux_err::EFAULT);
        assert_eq!(linux_err::EFAULT.name(), Some("EFAULT"));
    }

    #[test]
    fn out_of_range_errno_becomes_einval() {
        assert_eq!(Error::from_errno(0), linux_err::EINVAL);
        assert_eq!(Error::from_errno(5), linux_err::EINVAL);
        assert_eq!(Error::from_errno(-5000), linux_err::EINVAL);
    }

    #[test]
    fn formatting_uses_errno_names() {
        assert_eq!(format!("{:?}", linux_err::EBUSY), "EBUSY");
        assert_eq!(format!("{:?}", Error::from_errno(-200)), "Error(200)");
        assert_eq!(
            format!("{}", linux_err::ENODEV),
            "ENODEV (No such device.)"
        );
    }
}
