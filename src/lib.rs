pub mod cache;
pub mod config;
pub mod error;
pub mod fetch;
pub mod loader;
pub mod render;
pub mod report;
pub mod sold;
pub mod stats;

pub use error::{HubError, Result};
