//! A read-only character device.
//!
//! `parrot` registers a single device node that hands out a fixed,
//! compiled-in byte payload. Every open gets its own cursor; reads copy the
//! next bytes into the caller's buffer until the payload is exhausted, after
//! which they keep returning zero.
#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod device;
pub mod error;
pub mod session;
pub mod store;

pub use device::{register, register_with, DeviceHandle, RegistrationStatus, DEVICE_NAME};
pub use error::ParrotError;
pub use session::{DeviceState, Session};
pub use store::{BufferStore, PAYLOAD};

use kernel::{error::KernelResult as Result, logger, pr_err, Module, ThisModule};

/// The module object. Owns all state of the driver for as long as the
/// module is loaded.
pub struct Parrot {
    device: DeviceHandle,
}

impl Parrot {
    pub fn device(&self) -> &DeviceHandle {
        &self.device
    }
}

impl Module for Parrot {
    fn init(module: &ThisModule) -> Result<Self> {
        logger::init_logger();
        let device = register(module).map_err(|e| {
            pr_err!("{}", e);
            e
        })?;
        Ok(Parrot { device })
    }
}

impl Drop for Parrot {
    fn drop(&mut self) {
        let open = self.device.state().open_sessions();
        if open > 0 {
            log::warn!("unloading with {} open session(s)", open);
        }
        self.device.unregister();
    }
}
