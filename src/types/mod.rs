//! Type definitions

pub mod import;

pub use import::*;
