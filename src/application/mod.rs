//! Application services: authentication, account and token lifecycle, and
//! owner-scoped feed operations.

pub mod auth;
pub mod error;
pub mod feeds;
pub mod jobs;
pub mod repos;
pub mod tokens;
pub mod users;
