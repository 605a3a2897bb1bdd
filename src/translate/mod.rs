pub mod client;

pub use client::{TranslateError, Translator};
