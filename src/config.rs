use crate::error::{AppResult, Error};
use dotenvy::dotenv;
use serde::{Deserialize, Serialize};
use std::env;
use std::net::{IpAddr, SocketAddr};

/// Main configuration structure for the service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Redis connection URL
    pub redis_url: String,
    /// Address to bind the HTTP listener to
    pub bind_addr: String,
    /// Port for the HTTP listener
    pub port: u16,
}

impl Config {
    /// Load configuration from the environment. Every variable has a
    /// default, so loading only fails on unparseable values.
    pub fn load() -> AppResult<Self> {
        // Load .env file if it exists
        dotenv().ok();

        let redis_url =
            env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string());

        let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1".to_string());

        let port = match env::var("PORT") {
            Ok(raw) => raw
                .parse::<u16>()
                .map_err(|_| Error::Environment(format!("Invalid PORT value: {raw}")))?,
            Err(_) => 3000,
        };

        Ok(Config {
            redis_url,
            bind_addr,
            port,
        })
    }

    /// The socket address the listener binds to
    pub fn socket_addr(&self) -> AppResult<SocketAddr> {
        let ip = self
            .bind_addr
            .parse::<IpAddr>()
            .map_err(|_| Error::Environment(format!("Invalid BIND_ADDR value: {}", self.bind_addr)))?;
        Ok(SocketAddr::from((ip, self.port)))
    }
}
