#[macro_use]
extern crate rust_i18n;

i18n!("locales", fallback = "en");

pub mod auth;
pub mod blog;
pub mod core;
pub mod crypto;
pub mod i18n;
pub mod notify;
pub mod queue;
pub mod search;
pub mod social;
pub mod storage;
pub mod translate;
pub mod web;

pub use crate::core::app::{AppState, Application};
pub use crate::core::config::Settings;
