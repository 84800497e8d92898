pub mod core;
pub mod features;
pub mod routes;
pub mod scraping;
pub mod tools;

// --- Primary core exports ---
pub use crate::core::types;
pub use crate::core::types::*;
pub use crate::core::AppState;

pub use features::{freshness, refresh_queue, store};
pub use scraping::{extract, fetcher};
pub use tools::{rank, resolve};
