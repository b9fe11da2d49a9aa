//! Concrete adapters for the search capability.

pub mod file;
pub mod http;

pub use file::{FileSearchAdapter, FileSearchConfig};
pub use http::{HttpSearchAdapter, HttpSearchConfig};
