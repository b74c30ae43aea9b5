pub mod configs;
pub mod defaults;
pub mod envconfig;
pub mod validate;

pub use configs::{ApiConfig, AppConfig, LoggingConfig, RedirectConfig, StorageConfig};
pub use envconfig::EnvConfig;
