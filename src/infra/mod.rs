//! Infrastructure adapters: persistence, cache store, telemetry.

pub mod db;
pub mod error;
pub mod kv;
pub mod telemetry;
