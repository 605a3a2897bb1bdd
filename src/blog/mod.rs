pub mod service;

pub use service::BlogService;
