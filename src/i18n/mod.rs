pub mod catalog;
pub mod locale;

pub use catalog::{Localizer, Message};
pub use locale::{parse_accept_language, select_locale, LanguageRange};
