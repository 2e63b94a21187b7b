//! Pulse Recovery library: recovery point model, store, HTTP API and the
//! dashboard pipeline that consumes it.

pub mod api;
pub mod config;
pub mod dashboard;
pub mod mock;
pub mod recovery;
pub mod store;
