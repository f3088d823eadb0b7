//! Character devices.
//!
//! Also called "char devices", `chrdev`, `cdev`.
//!
//! C header: `include/linux/cdev.h`
//!
//! Reference: <https://www.kernel.org/doc/html/latest/core-api/kernel-api.html#char-devices>

use alloc::{sync::Arc, vec::Vec};
use core::{fmt, ops::Range};

use crate::{
    code::EINVAL,
    error::{Error, KernelResult as Result},
    fs::file_operations::{FileOperations, FileOperationsTable, OperationsVtable},
    host::{Cdev, OpenContext},
    pr_info, pr_warn, DevT, ThisModule,
};

/// Why [`Builder::build`] failed.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum BuildError {
    /// No device numbers could be allocated for the region.
    Region(Error),
    /// A device could not be added; everything registered before it has
    /// been torn down again.
    Cdev { minor: u32, error: Error },
    /// More devices were registered than the region has minors.
    TooManyDevices,
}

impl BuildError {
    pub fn errno(&self) -> Error {
        match *self {
            BuildError::Region(error) | BuildError::Cdev { error, .. } => error,
            BuildError::TooManyDevices => EINVAL,
        }
    }
}

impl fmt::Display for BuildError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildError::Region(e) => write!(f, "failed to allocate char device region: {:?}", e),
            BuildError::Cdev { minor, error } => {
                write!(f, "failed to add char dev for minor {}: {:?}", minor, error)
            }
            BuildError::TooManyDevices => write!(f, "more devices than minors in the region"),
        }
    }
}

impl From<BuildError> for Error {
    fn from(e: BuildError) -> Error {
        e.errno()
    }
}

struct PendingDevice {
    ops: &'static FileOperationsTable,
    context: OpenContext,
}

/// Starts describing a character device region named `name` covering
/// `minors`. Devices are bound to consecutive minors in registration order.
pub fn builder(module: &ThisModule, name: &'static str, minors: Range<u16>) -> Result<Builder> {
    if minors.is_empty() {
        return Err(EINVAL);
    }
    Ok(Builder {
        module: module.clone(),
        name,
        minors,
        devices: Vec::new(),
    })
}

pub struct Builder {
    module: ThisModule,
    name: &'static str,
    minors: Range<u16>,
    devices: Vec<PendingDevice>,
}

impl Builder {
    /// Binds the next free minor to `T`, handing `context` to every open.
    pub fn register_device<T: FileOperations>(mut self, context: T::OpenData) -> Builder {
        self.devices.push(PendingDevice {
            ops: OperationsVtable::<T>::build(),
            context: Arc::new(context),
        });
        self
    }

    /// Allocates the region and publishes every registered device.
    ///
    /// Either everything is registered or nothing is: a failing `cdev_add`
    /// removes the devices added before it and releases the region.
    pub fn build(self) -> core::result::Result<Registration, BuildError> {
        let count = self.minors.len() as u32;
        if self.devices.len() > count as usize {
            return Err(BuildError::TooManyDevices);
        }
        let host = self.module.host().clone();
        let first = host
            .alloc_chrdev_region(self.minors.start.into(), count, self.name)
            .map_err(BuildError::Region)?;

        let mut registration = Registration {
            module: self.module,
            name: self.name,
            first,
            count,
            region_held: true,
            added: Vec::with_capacity(self.devices.len()),
        };
        for (i, device) in self.devices.into_iter().enumerate() {
            let dev = first.offset(i as u32);
            let cdev = Cdev {
                owner: registration.module.name(),
                ops: device.ops,
                context: device.context,
            };
            // Dropping `registration` on the error path rolls back.
            host.cdev_add(cdev, dev, 1).map_err(|error| BuildError::Cdev {
                minor: dev.minor(),
                error,
            })?;
            registration.added.push(dev);
        }
        pr_info!(
            "{}: registered {} with {} device(s) at {}",
            registration.module.name(),
            registration.name,
            registration.added.len(),
            first
        );
        Ok(registration)
    }
}

/// A registered character device region and the devices living in it.
///
/// Dropping it removes the devices and releases the region. Teardown cannot
/// fail; problems are logged and the remaining steps still run.
pub struct Registration {
    module: ThisModule,
    name: &'static str,
    first: DevT,
    count: u32,
    region_held: bool,
    added: Vec<DevT>,
}

impl Registration {
    /// First device number of the region.
    pub fn dev(&self) -> DevT {
        self.first
    }

    /// Device numbers that currently have a live cdev.
    pub fn devices(&self) -> &[DevT] {
        &self.added
    }

    fn teardown(&mut self) {
        let host = self.module.host();
        for dev in self.added.drain(..).rev() {
            if let Err(e) = host.cdev_del(dev) {
                pr_warn!("{}: failed to delete char dev {}: {:?}", self.name, dev, e);
            }
        }
        if core::mem::take(&mut self.region_held) {
            if let Err(e) = host.unregister_chrdev_region(self.first, self.count) {
                pr_warn!(
                    "{}: failed to release char device region {}: {:?}",
                    self.name,
                    self.first,
                    e
                );
            }
        }
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.teardown();
    }
}
