use config::{ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use std::fmt;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub chain: ChainConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub workers: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
}

#[derive(Deserialize, Clone)]
pub struct ChainConfig {
    pub rpc_url: String,
    /// Hex-encoded admin signing key. Redacted from Debug output; must never
    /// reach logs or error responses.
    pub admin_private_key: String,
}

impl fmt::Debug for ChainConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChainConfig")
            .field("rpc_url", &self.rpc_url)
            .field("admin_private_key", &"<redacted>")
            .finish()
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let environment = env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string());

        let mut builder = config::Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8080)?
            .set_default("server.workers", 4)?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 2)?
            .set_default("chain.rpc_url", "http://127.0.0.1:8545")?;

        if let Ok(config_file) = env::var("CONFIG_FILE") {
            builder = builder.add_source(File::with_name(&config_file).required(false));
        } else {
            builder = builder
                .add_source(File::with_name(&format!("config/{}", environment)).required(false));
        }

        builder = builder.add_source(
            Environment::with_prefix("REWARD_ENGINE")
                .separator("__")
                .list_separator(","),
        );

        // Special handling for common env vars
        if let Ok(db_url) = env::var("DATABASE_URL") {
            builder = builder.set_override("database.url", db_url)?;
        }

        if let Ok(rpc_url) = env::var("CHAIN_RPC_URL") {
            builder = builder.set_override("chain.rpc_url", rpc_url)?;
        }

        if let Ok(admin_key) = env::var("ADMIN_PRIVATE_KEY") {
            builder = builder.set_override("chain.admin_private_key", admin_key)?;
        }

        if let Ok(port) = env::var("PORT") {
            builder = builder.set_override("server.port", port)?;
        }

        builder.build()?.try_deserialize()
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.server.port == 0 {
            return Err("Server port cannot be 0".to_string());
        }

        if self.database.url.is_empty() {
            return Err("Database URL is required".to_string());
        }

        if self.chain.rpc_url.is_empty() {
            return Err("Chain RPC URL is required".to_string());
        }

        if self.chain.admin_private_key.is_empty() {
            return Err("Admin signing key is required".to_string());
        }

        Ok(())
    }
}
