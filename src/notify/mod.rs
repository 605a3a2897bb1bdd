pub mod mailer;
pub mod rotating_file;
pub mod sinks;

pub use mailer::Mailer;
pub use sinks::attach;
