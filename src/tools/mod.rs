pub mod rank;
pub mod resolve;
