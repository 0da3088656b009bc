//! JALM provisioning: intent-to-deployment compiler.
//!
//! An intent document names an app, its features and integrations. The
//! compiler matches it against the local function and template catalogs,
//! builds a canonical provision plan and writes a small client deployment
//! (entry source, Dockerfile, compose file, env, widget assets) that talks
//! to the shared JALM backends.
//!
//! ```no_run
//! use std::path::Path;
//! let dir = jalm_provision::compile(Path::new("barbershop.jalm.yaml"), Path::new("deployments"))?;
//! println!("{}", dir.display());
//! # Ok::<(), jalm_provision::CompileError>(())
//! ```

pub mod cli;
pub mod core;
pub mod materialize;
pub mod telemetry;
pub mod tripwire;

pub use crate::core::compiler::{compile, Compilation, Compiler};
pub use crate::core::error::{CompileError, Result};
