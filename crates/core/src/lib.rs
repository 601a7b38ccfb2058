pub mod config;
pub mod error;
pub mod renderer;
pub mod store;
pub mod types;

pub use config::AppConfig;
pub use error::CrawlError;
pub use renderer::Renderer;
pub use store::Store;
pub use types::*;
