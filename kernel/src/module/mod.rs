//! Module lifecycle.
//!
//! A module is a single object created by [`Module::init`] when it is loaded
//! and dropped when it is unloaded. All of its state lives in that object.

use alloc::sync::Arc;
use core::fmt;

use crate::{error::KernelResult as Result, host::Host, pr_info};

/// The top level entrypoint to implementing a kernel module.
///
/// For any teardown or cleanup operations, your type may implement [`Drop`].
/// Teardown cannot fail: a module that runs into trouble while dropping
/// logs it and carries on.
pub trait Module: Sized + Sync {
    /// Called at module initialization time.
    ///
    /// Use this method to perform whatever setup or registration your module
    /// should do.
    ///
    /// Equivalent to the `module_init` macro in the C API.
    fn init(module: &ThisModule) -> Result<Self>;
}

/// Equivalent to `THIS_MODULE` in the C API.
///
/// Identifies the module to the kernel and carries the handle to the host
/// kernel the module was loaded into.
#[derive(Clone)]
pub struct ThisModule {
    name: &'static str,
    host: Arc<dyn Host>,
}

impl ThisModule {
    pub fn new(name: &'static str, host: Arc<dyn Host>) -> Self {
        ThisModule { name, host }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn host(&self) -> &Arc<dyn Host> {
        &self.host
    }
}

impl fmt::Debug for ThisModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThisModule").field("name", &self.name).finish()
    }
}

/// A module that has been loaded into a host.
///
/// Equivalent to the `init_module`/`cleanup_module` pair: [`LoadedModule::load`]
/// runs [`Module::init`], [`LoadedModule::unload`] (or dropping the value)
/// runs the module's teardown.
pub struct LoadedModule<T: Module> {
    this: ThisModule,
    inner: Option<T>,
}

impl<T: Module> LoadedModule<T> {
    pub fn load(this: ThisModule) -> Result<Self> {
        let inner = T::init(&this)?;
        pr_info!("{}: loaded", this.name);
        Ok(LoadedModule {
            this,
            inner: Some(inner),
        })
    }

    pub fn this_module(&self) -> &ThisModule {
        &self.this
    }

    /// Returns the module object, `None` once unloaded.
    pub fn get(&self) -> Option<&T> {
        self.inner.as_ref()
    }

    pub fn unload(mut self) {
        self.cleanup();
    }

    fn cleanup(&mut self) {
        if let Some(inner) = self.inner.take() {
            drop(inner);
            pr_info!("{}: unloaded", self.this.name);
        }
    }
}

impl<T: Module> Drop for LoadedModule<T> {
    fn drop(&mut self) {
        self.cleanup();
    }
}
