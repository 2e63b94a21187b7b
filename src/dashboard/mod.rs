//! Dashboard side of recovery tracking: filter state, request builders,
//! derived panels and the client that feeds them.

pub mod client;
pub mod filters;
pub mod grouping;
pub mod links;
pub mod notify;
pub mod points;
pub mod report;
pub mod rollups;
pub mod settings;
pub mod timeline;
pub mod view;
