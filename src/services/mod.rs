//! Business logic services

pub mod admin_guard;
pub mod column_schema;
pub mod csv_pipeline;
pub mod import_service;
pub mod samples;
pub mod store;
