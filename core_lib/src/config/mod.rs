pub mod settings;

pub use settings::{
    AppConfig, AuthConfig, FileConfig, LoggingConfig, RateLimitConfig, ServerConfig,
    CONFIG_FILE_NAME, DATA_DIR_ENV,
};
