pub mod service;

pub use service::SocialService;
