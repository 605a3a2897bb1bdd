pub mod client;

pub use client::{Search, SearchClient};
