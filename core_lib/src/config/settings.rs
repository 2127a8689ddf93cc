use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::sandbox;

pub const CONFIG_FILE_NAME: &str = "config.toml";
pub const DATA_DIR_ENV: &str = "FILELITE_DATA_DIR";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub auth: AuthConfig,
    pub files: FileConfig,
    pub rate_limit: RateLimitConfig,
    pub logging: LoggingConfig,
    /// Directory holding `config.toml` and the default uploads folder.
    #[serde(skip)]
    pub data_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub tls_key: String,
    pub tls_cert: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub no_auth: bool,
    pub password: String,
    pub max_attempts: u32,
    pub ban_duration_minutes: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileConfig {
    pub safe_base_dir: String,
    pub legacy_prefix_match: bool,
    pub max_walk_depth: usize,
    pub upload_dir: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    pub max_requests: u32,
    pub window_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub enable_log: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            auth: AuthConfig::default(),
            files: FileConfig::default(),
            rate_limit: RateLimitConfig::default(),
            logging: LoggingConfig::default(),
            data_dir: default_data_dir(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3100,
            tls_key: String::new(),
            tls_cert: String::new(),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            no_auth: false,
            password: String::new(),
            max_attempts: 5,
            ban_duration_minutes: 15,
        }
    }
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            safe_base_dir: "./".to_string(),
            legacy_prefix_match: false,
            max_walk_depth: 64,
            upload_dir: String::new(),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 1000,
            window_seconds: 60,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { enable_log: true }
    }
}

pub fn default_data_dir() -> PathBuf {
    match std::env::var_os(DATA_DIR_ENV) {
        Some(dir) if !dir.is_empty() => PathBuf::from(dir),
        _ => PathBuf::from("file-lite"),
    }
}

impl AuthConfig {
    pub fn ban_duration(&self) -> Duration {
        Duration::from_secs(self.ban_duration_minutes * 60)
    }

    /// The configured password, or a freshly generated 8 character token.
    pub fn resolve_token(&self) -> String {
        if self.password.is_empty() {
            uuid::Uuid::new_v4().simple().to_string()[..8].to_string()
        } else {
            self.password.clone()
        }
    }
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&default_data_dir())
    }

    pub fn load_from(data_dir: &Path) -> Result<Self, ConfigError> {
        let mut builder = Config::builder()
            .add_source(Config::try_from(&AppConfig::default())?);

        let config_file = data_dir.join(CONFIG_FILE_NAME);
        if config_file.exists() {
            builder = builder.add_source(
                File::from(config_file.as_path()).format(FileFormat::Toml),
            );
        }

        builder = builder.add_source(
            Environment::with_prefix("FILELITE")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        let mut app_config: AppConfig = config.try_deserialize()?;
        app_config.data_dir = data_dir.to_path_buf();

        app_config.validate()?;

        Ok(app_config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::Message("Server port cannot be 0".to_string()));
        }

        if self.auth.max_attempts == 0 {
            return Err(ConfigError::Message(
                "Max auth attempts must be greater than 0".to_string(),
            ));
        }

        if self.auth.ban_duration_minutes == 0 {
            return Err(ConfigError::Message(
                "Ban duration must be greater than 0".to_string(),
            ));
        }

        if self.rate_limit.window_seconds == 0 {
            return Err(ConfigError::Message(
                "Rate limit window must be greater than 0".to_string(),
            ));
        }

        if self.server.tls_key.is_empty() != self.server.tls_cert.is_empty() {
            return Err(ConfigError::Message(
                "tls_key and tls_cert must be set together".to_string(),
            ));
        }

        if self.files.max_walk_depth == 0 {
            return Err(ConfigError::Message(
                "Max walk depth must be greater than 0".to_string(),
            ));
        }

        if self.auth.no_auth {
            tracing::warn!("Authentication is disabled - anyone reaching the port can modify files");
        }

        Ok(())
    }

    /// Writes the default configuration into the data directory unless one exists.
    pub fn write_default_if_missing(data_dir: &Path) -> std::io::Result<bool> {
        let config_file = data_dir.join(CONFIG_FILE_NAME);
        if config_file.exists() {
            return Ok(false);
        }

        std::fs::create_dir_all(data_dir)?;
        let contents = toml::to_string_pretty(&AppConfig::default())
            .map_err(std::io::Error::other)?;
        std::fs::write(&config_file, contents)?;
        Ok(true)
    }

    /// Absolute, normalized sandbox root; `None` means unrestricted.
    pub fn sandbox_root(&self) -> std::io::Result<Option<String>> {
        if self.files.safe_base_dir.trim().is_empty() {
            return Ok(None);
        }

        let configured = Path::new(&self.files.safe_base_dir);
        let absolute = if configured.is_absolute() {
            configured.to_path_buf()
        } else {
            std::env::current_dir()?.join(configured)
        };

        Ok(Some(sandbox::normalize(&absolute.to_string_lossy())))
    }

    pub fn upload_dir(&self) -> PathBuf {
        if self.files.upload_dir.is_empty() {
            self.data_dir.join("uploads")
        } else {
            PathBuf::from(&self.files.upload_dir)
        }
    }

    pub fn tls_paths(&self) -> Option<(PathBuf, PathBuf)> {
        if self.server.tls_key.is_empty() || self.server.tls_cert.is_empty() {
            return None;
        }
        Some((
            self.data_dir.join(&self.server.tls_cert),
            self.data_dir.join(&self.server.tls_key),
        ))
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
