use core::fmt;

/// Number of bits reserved for the minor part of a [`DevT`].
///
/// C header: `include/linux/kdev_t.h`
pub const MINORBITS: u32 = 20;
const MINORMASK: u32 = (1 << MINORBITS) - 1;

/// A device number, the packed major/minor pair the kernel routes I/O with.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[repr(transparent)]
pub struct DevT(u32);

impl DevT {
    /// Equivalent to `MKDEV`.
    pub const fn new(major: u32, minor: u32) -> Self {
        DevT((major << MINORBITS) | (minor & MINORMASK))
    }

    pub const fn from_raw(raw: u32) -> Self {
        DevT(raw)
    }

    pub const fn as_raw(self) -> u32 {
        self.0
    }

    pub const fn major(self) -> u32 {
        self.0 >> MINORBITS
    }

    pub const fn minor(self) -> u32 {
        self.0 & MINORMASK
    }

    /// Returns the device number `offset` minors past this one.
    pub const fn offset(self, offset: u32) -> Self {
        DevT::new(self.major(), self.minor() + offset)
    }
}

impl fmt::Debug for DevT {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DevT({}:{})", self.major(), self.minor())
    }
}

impl fmt::Display for DevT {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.major(), self.minor())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packs_major_and_minor() {
        let dev = DevT::new(254, 3);
        assert_eq!(dev.major(), 254);
        assert_eq!(dev.minor(), 3);
        assert_eq!(dev.as_raw(), (254 << 20) | 3);
        assert_eq!(dev.offset(2), DevT::new(254, 5));
    }
}
