use core::fmt;

use kernel::{chrdev::BuildError, code::EFAULT, error::Error};

/// Errors of the parrot driver.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ParrotError {
    /// The kernel had no device number to give.
    Allocation(Error),
    /// The device node could not be published. Anything allocated before
    /// has been released again.
    Registration(Error),
    /// The caller's buffer is not writable memory. Nothing was copied.
    Fault,
}

pub type Result<T> = core::result::Result<T, ParrotError>;

impl fmt::Display for ParrotError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use ParrotError::*;
        match self {
            Allocation(e) => write!(f, "Failed to allocate char device region: {:?}", e),
            Registration(e) => write!(f, "Failed to add char dev: {:?}", e),
            Fault => write!(f, "Bad address in caller buffer"),
        }
    }
}

impl From<BuildError> for ParrotError {
    fn from(e: BuildError) -> Self {
        match e {
            BuildError::Region(e) => ParrotError::Allocation(e),
            other => ParrotError::Registration(other.errno()),
        }
    }
}

impl From<ParrotError> for Error {
    fn from(e: ParrotError) -> Error {
        match e {
            ParrotError::Allocation(e) | ParrotError::Registration(e) => e,
            ParrotError::Fault => EFAULT,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kernel::code::{EBUSY, EINVAL, ENOMEM};

    #[test]
    fn build_errors_map_onto_the_taxonomy() {
        assert_eq!(
            ParrotError::from(BuildError::Region(EBUSY)),
            ParrotError::Allocation(EBUSY)
        );
        assert_eq!(
            ParrotError::from(BuildError::Cdev {
                minor: 0,
                error: ENOMEM
            }),
            ParrotError::Registration(ENOMEM)
        );
        assert_eq!(
            ParrotError::from(BuildError::TooManyDevices),
            ParrotError::Registration(EINVAL)
        );
    }

    #[test]
    fn errno_and_messages() {
        assert_eq!(Error::from(ParrotError::Fault), EFAULT);
        assert_eq!(Error::from(ParrotError::Allocation(EBUSY)), EBUSY);
        assert_eq!(
            ParrotError::Registration(ENOMEM).to_string(),
            "Failed to add char dev: ENOMEM"
        );
    }
}
