use std::net::SocketAddr;
use std::path::PathBuf;

/// Injected limits for recipe fields. Validation never hardcodes these;
/// operators can tighten or relax them per deployment.
#[derive(Debug, Clone, Copy)]
pub struct RecipeBounds {
    pub min_cooking_time: i64,
    pub max_cooking_time: i64,
    pub min_ingredient_amount: i64,
    pub max_ingredient_amount: i64,
}

impl Default for RecipeBounds {
    fn default() -> Self {
        Self {
            min_cooking_time: 1,
            max_cooking_time: 32_000,
            min_ingredient_amount: 1,
            max_ingredient_amount: 32_000,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub data_dir: PathBuf,
    pub bounds: RecipeBounds,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        format!("{}:{}", self.host, self.port).parse()
    }

    #[must_use]
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("ladle.db")
    }

    #[must_use]
    pub fn media_dir(&self) -> PathBuf {
        self.data_dir.join("media")
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            data_dir: PathBuf::from("./data"),
            bounds: RecipeBounds::default(),
        }
    }
}
