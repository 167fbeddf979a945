//! Utility functions and types

pub mod data_loader;

pub use data_loader::DataLoader;

/// Milliseconds since the Unix epoch
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
