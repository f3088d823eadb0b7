//! File system related abstractions.

pub mod file_operations;

pub use file_operations::{File, FileOperations};
