use alloc::{collections::BTreeMap, vec, vec::Vec};

use bitflags::bitflags;

use crate::{
    code::{EFAULT, EINVAL, ENOMEM},
    error::KernelResult as Result,
    host::UserPtr,
};

pub const PAGE_SIZE: usize = 4096;

bitflags! {
    /// Page protections of a user mapping.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Prot: u32 {
        const READ = 1 << 0;
        const WRITE = 1 << 1;
    }
}

struct Mapping {
    prot: Prot,
    bytes: Vec<u8>,
}

/// The address space of the simulated calling process.
///
/// Mappings are handed out upwards from the configured base with an unmapped
/// guard page between them, so running off the end of one never lands in
/// the next.
pub(crate) struct UserMemory {
    next: UserPtr,
    maps: BTreeMap<UserPtr, Mapping>,
}

impl UserMemory {
    pub(crate) fn new(base: UserPtr) -> Self {
        UserMemory {
            next: base,
            maps: BTreeMap::new(),
        }
    }

    pub(crate) fn map(&mut self, len: usize, prot: Prot) -> Result<UserPtr> {
        if len == 0 {
            return Err(EINVAL);
        }
        let span = len
            .checked_next_multiple_of(PAGE_SIZE)
            .and_then(|pages| pages.checked_add(PAGE_SIZE))
            .ok_or(ENOMEM)?;
        let base = self.next;
        self.next = base.checked_add(span).ok_or(ENOMEM)?;
        self.maps.insert(
            base,
            Mapping {
                prot,
                bytes: vec![0; len],
            },
        );
        Ok(base)
    }

    pub(crate) fn unmap(&mut self, base: UserPtr) -> Result {
        self.maps.remove(&base).map(|_| ()).ok_or(EINVAL)
    }

    pub(crate) fn protect(&mut self, base: UserPtr, prot: Prot) -> Result {
        let mapping = self.maps.get_mut(&base).ok_or(EINVAL)?;
        mapping.prot = prot;
        Ok(())
    }

    /// Finds the mapping that wholly contains `[ptr, ptr + len)`.
    fn find(&self, ptr: UserPtr, len: usize) -> Option<(UserPtr, &Mapping)> {
        let end = ptr.checked_add(len)?;
        let (&base, mapping) = self.maps.range(..=ptr).next_back()?;
        (end <= base + mapping.bytes.len()).then_some((base, mapping))
    }

    pub(crate) fn check(&self, ptr: UserPtr, len: usize, prot: Prot) -> bool {
        self.find(ptr, len)
            .is_some_and(|(_, mapping)| mapping.prot.contains(prot))
    }

    /// Returns the number of bytes not written.
    pub(crate) fn write(&mut self, ptr: UserPtr, data: &[u8]) -> usize {
        let Some((base, _)) = self.find(ptr, data.len()) else {
            return data.len();
        };
        let Some(mapping) = self.maps.get_mut(&base) else {
            return data.len();
        };
        if !mapping.prot.contains(Prot::WRITE) {
            return data.len();
        }
        let start = ptr - base;
        mapping.bytes[start..start + data.len()].copy_from_slice(data);
        0
    }

    pub(crate) fn read(&self, ptr: UserPtr, len: usize) -> Result<Vec<u8>> {
        let (base, mapping) = self.find(ptr, len).ok_or(EFAULT)?;
        if !mapping.prot.contains(Prot::READ) {
            return Err(EFAULT);
        }
        let start = ptr - base;
        Ok(mapping.bytes[start..start + len].to_vec())
    }
}
