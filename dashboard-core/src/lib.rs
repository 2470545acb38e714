//! dashboard-core: Shared infrastructure for the dashboard client crates.
pub mod config;
pub mod error;
pub mod observability;

pub use serde;
pub use serde_json;
pub use tokio;
pub use tracing;
