pub mod manager;
pub mod service;

pub use manager::LoginManager;
pub use service::{AuthService, Session};
