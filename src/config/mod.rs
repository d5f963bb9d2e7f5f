// Configuration module entry point
// Layers defaults, config file, environment and command-line overrides

mod state;
mod types;

use std::net::SocketAddr;
use std::path::PathBuf;

// Re-export public types
pub use state::AppState;
pub use types::{Config, MatchMode, UploadConfig};

/// Environment variable prefix, e.g. `IMGSRV_SERVER__PORT=8080`
const ENV_PREFIX: &str = "IMGSRV";

/// Values supplied on the command line; they win over every other source
#[derive(Debug, Default, Clone)]
pub struct ConfigOverrides {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub public_url: Option<String>,
    pub workers: Option<usize>,
    pub storage_dir: Option<PathBuf>,
    pub max_file_size: Option<u64>,
    pub allowed_types: Option<Vec<String>>,
    pub match_mode: Option<String>,
    pub log_level: Option<String>,
}

impl Config {
    /// Load configuration from specified file path (without extension)
    /// Default config file is "config.toml" when no path specified
    pub fn load_from(
        config_path: &str,
        overrides: &ConfigOverrides,
    ) -> Result<Self, config::ConfigError> {
        let settings = config::Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 5000)?
            .set_default("upload.storage_dir", "./images")?
            .set_default("upload.max_file_size", 2_097_152)? // 2MB
            .set_default("upload.allowed_types", vec!["jpeg", "jpg", "png", "gif"])?
            .set_default("upload.field_name", "image")?
            .set_default("upload.match_mode", "strict")?
            .set_default("upload.route", "/upload")?
            .set_default("upload.public_prefix", "/images")?
            .set_default("logging.level", "info")?
            .set_default("logging.access_log", true)?
            .set_default("performance.keep_alive_timeout", 75)?
            .set_default("performance.read_timeout", 30)?
            .set_default("performance.write_timeout", 30)?
            .set_default("http.server_name", "image-upload-server")?
            .set_default("http.enable_cors", true)?
            .set_default("http.max_body_size", 10_485_760)? // 10MB
            .add_source(config::File::with_name(config_path).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("upload.allowed_types")
                    .try_parsing(true),
            )
            .set_override_option("server.host", overrides.host.clone())?
            .set_override_option("server.port", overrides.port.map(i64::from))?
            .set_override_option("server.public_url", overrides.public_url.clone())?
            .set_override_option(
                "server.workers",
                overrides.workers.and_then(|w| u64::try_from(w).ok()),
            )?
            .set_override_option(
                "upload.storage_dir",
                overrides
                    .storage_dir
                    .as_ref()
                    .map(|p| p.to_string_lossy().into_owned()),
            )?
            .set_override_option("upload.max_file_size", overrides.max_file_size)?
            .set_override_option("upload.allowed_types", overrides.allowed_types.clone())?
            .set_override_option("upload.match_mode", overrides.match_mode.clone())?
            .set_override_option("logging.level", overrides.log_level.clone())?
            .build()?;

        let mut cfg: Self = settings.try_deserialize()?;
        cfg.normalize();
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn get_socket_addr(&self) -> Result<SocketAddr, String> {
        format!("{}:{}", self.server.host, self.server.port)
            .parse()
            .map_err(|e| format!("Invalid address: {e}"))
    }

    /// Base URL that stored images are reachable under, without trailing slash
    ///
    /// A wildcard bind address is not routable, so it is reported as `localhost`.
    pub fn public_base_url(&self) -> String {
        if let Some(url) = &self.server.public_url {
            return url.trim_end_matches('/').to_string();
        }
        let host = match self.server.host.as_str() {
            "0.0.0.0" | "::" | "[::]" => "localhost",
            other => other,
        };
        format!("http://{host}:{}", self.server.port)
    }

    /// Lowercase and trim the allow-set so matching can compare directly
    fn normalize(&mut self) {
        self.upload.allowed_types = self
            .upload
            .allowed_types
            .iter()
            .map(|t| t.trim().to_ascii_lowercase())
            .filter(|t| !t.is_empty())
            .collect();
        self.upload.public_prefix = self.upload.public_prefix.trim_end_matches('/').to_string();
    }

    fn validate(&self) -> Result<(), config::ConfigError> {
        let invalid = |msg: String| Err(config::ConfigError::Message(msg));

        if self.upload.allowed_types.is_empty() {
            return invalid("upload.allowed_types must contain at least one type".to_string());
        }
        if self.upload.max_file_size == 0 {
            return invalid("upload.max_file_size must be greater than zero".to_string());
        }
        if self.upload.field_name.is_empty() {
            return invalid("upload.field_name must not be empty".to_string());
        }
        for (key, value) in [
            ("upload.route", &self.upload.route),
            ("upload.public_prefix", &self.upload.public_prefix),
        ] {
            if !value.starts_with('/') || value.len() < 2 {
                return invalid(format!("{key} must start with '/' and not be the root path"));
            }
        }
        if self.performance.read_timeout == 0 || self.performance.write_timeout == 0 {
            return invalid("performance read/write timeouts must be at least one second".to_string());
        }
        if let Err(e) = self.get_socket_addr() {
            return invalid(e);
        }
        Ok(())
    }
}
