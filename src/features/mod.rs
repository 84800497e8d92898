pub mod freshness;
pub mod refresh_queue;
pub mod store;
