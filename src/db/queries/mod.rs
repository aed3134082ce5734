//! Database queries

pub mod import;
