pub mod bookmark_store;
pub mod config;
pub mod controller;
pub mod error;
pub mod fuzzy;
pub mod logging;
pub mod metadata_store;
pub mod model;
pub mod orchestrator;
pub mod search;
pub mod sqlite_store;
