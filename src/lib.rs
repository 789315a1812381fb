//! Workspace facade crate.
//!
//! Re-exports the runtime and library crates so host services can depend on
//! `musicsocial-core` alone and reach configuration, logging, the catalog and
//! playlist stores through one path.

pub use core_library as library;
pub use core_runtime as runtime;

pub use core_library::{Library, LibraryError};
pub use core_runtime::CoreConfig;
