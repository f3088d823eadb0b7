//! Registration of the parrot device with the kernel.

use alloc::sync::Arc;

use kernel::{chrdev, DevT, ThisModule};

use crate::{
    error::{ParrotError, Result},
    session::{DeviceState, Session},
    store::BufferStore,
};

/// Name of the device region and node.
pub const DEVICE_NAME: &str = "parrot";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationStatus {
    Unregistered,
    Registered,
}

/// The registered parrot device: one major/minor pair with a live node.
pub struct DeviceHandle {
    dev: DevT,
    state: Arc<DeviceState>,
    registration: Option<chrdev::Registration>,
}

/// Registers the device serving the compiled-in payload.
pub fn register(module: &ThisModule) -> Result<DeviceHandle> {
    register_with(module, BufferStore::default())
}

/// Registers the device serving `store`.
///
/// Fails with [`ParrotError::Allocation`] if no device number is available
/// and with [`ParrotError::Registration`] if the node cannot be published;
/// in both cases nothing stays registered.
pub fn register_with(module: &ThisModule, store: BufferStore) -> Result<DeviceHandle> {
    let state = Arc::new(DeviceState::new(store));
    let registration = chrdev::builder(module, DEVICE_NAME, 0..1)
        .map_err(ParrotError::Registration)?
        .register_device::<Session>(state.clone())
        .build()?;
    let dev = registration.dev();
    log::info!("registered {} at {} ({} bytes)", DEVICE_NAME, dev, store.len());
    Ok(DeviceHandle {
        dev,
        state,
        registration: Some(registration),
    })
}

impl DeviceHandle {
    pub fn dev(&self) -> DevT {
        self.dev
    }

    pub fn major(&self) -> u32 {
        self.dev.major()
    }

    pub fn minor(&self) -> u32 {
        self.dev.minor()
    }

    pub fn status(&self) -> RegistrationStatus {
        match self.registration {
            Some(_) => RegistrationStatus::Registered,
            None => RegistrationStatus::Unregistered,
        }
    }

    pub fn state(&self) -> &Arc<DeviceState> {
        &self.state
    }

    /// Removes the node and releases the device number.
    ///
    /// Never fails: teardown problems are logged and the rest of the
    /// teardown still happens. Only the first call does anything.
    pub fn unregister(&mut self) {
        match self.registration.take() {
            Some(registration) => {
                drop(registration);
                log::info!("unregistered {} at {}", DEVICE_NAME, self.dev);
            }
            None => log::warn!("{} at {} is not registered", DEVICE_NAME, self.dev),
        }
    }
}

impl Drop for DeviceHandle {
    fn drop(&mut self) {
        if self.registration.is_some() {
            self.unregister();
        }
    }
}
