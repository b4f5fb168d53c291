//! Registry snapshot and search.

pub mod index;
pub mod types;

pub use index::{SearchIndex, SearchService, ToolSummary, SEARCH_LIMIT};
pub use types::{decode_snapshot, Distribution, LaunchConfig, Publisher, RegistryEntry};
