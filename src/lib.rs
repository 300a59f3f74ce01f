//! Course platform backend: catalog, enrollment, and sequential lesson
//! progress over a document store, behind a session-authenticated HTTP API.

pub mod account;
pub mod api;
pub mod catalog;
pub mod config;
pub mod enrollment;
pub mod error;
pub mod progress;
pub mod server;
pub mod store;
pub mod utils;
