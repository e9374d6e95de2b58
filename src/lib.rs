//! # twinbin - one object set, two executables
//!
//! twinbin builds a C++ project that embeds one C module. Every source is
//! compiled into a staging directory, and the objects are linked into the
//! production executable. With tests enabled, the same objects are then
//! patched with `objcopy --redefine-sym` and linked again. The production
//! `main` becomes `oldmain` and the test unit's `test` becomes `main`. The
//! result is a test executable built without compiling anything twice.
//!
//! ## Quick Start
//!
//! ```bash
//! # Build ./main
//! twinbin build
//!
//! # Build ./main and ./test
//! twinbin build --tests
//! ```
//!
//! ## Module Organization
//!
//! - [`build`] - Discovery, compile/link stages, test patching, the driver
//! - [`config`] - Configuration parsing (`twinbin.toml`)
//! - [`toolchain`] - External tool invocation
//! - [`error`] - The pipeline's error type

/// Build pipeline: sources, compile, link, test patch, driver.
pub mod build;

/// Configuration file parsing (`twinbin.toml`).
pub mod config;

pub mod error;

/// Compiler, linker and symbol editor invocation.
pub mod toolchain;

pub use error::{BuildError, BuildResult};
