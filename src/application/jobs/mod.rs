//! Background jobs.

mod sweep;

pub use sweep::spawn_token_sweep;
