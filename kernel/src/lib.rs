//! The `kernel` crate.
//!
//! Safe abstractions over the primitives a kernel offers to a character
//! device driver: device number regions, cdev publication, file operation
//! tables, checked copies into user memory and the kernel log.
//!
//! Everything the kernel itself provides is reached through the
//! [`host::Host`] trait. With the `sim` feature the crate also ships
//! [`sim::SimKernel`], an in-process host that drivers are tested against.
#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod buf;
pub mod chrdev;
pub mod error;
pub mod fs;
pub mod host;
pub mod logger;
pub mod module;
pub mod print;
#[cfg(feature = "sim")]
pub mod sim;
mod types;

pub use error::linux_err as code;
pub use module::{LoadedModule, Module, ThisModule};
pub use types::DevT;
