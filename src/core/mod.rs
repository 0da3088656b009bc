//! Core pipeline: types, parsing, catalog discovery, selection, planning.

pub mod catalog;
pub mod compiler;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod parser;
pub mod planner;
pub mod selector;
pub mod types;
