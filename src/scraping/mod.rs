pub mod encoding;
pub mod extract;
pub mod fetcher;
pub mod http;
pub mod redirect;
