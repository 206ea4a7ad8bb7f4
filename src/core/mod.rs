//! Core business logic abstractions

pub mod cache;
pub mod config;
pub mod error;
pub mod log;
pub mod price;

// Re-export main types for cleaner imports
pub use cache::{Cache, PriceCache};
pub use error::FetchError;
pub use price::{Pair, PriceFetcher};
