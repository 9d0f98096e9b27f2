//! API Configuration Module
//!
//! Configuration is loaded from environment variables with defaults suited to
//! local development. Each `from_env` delegates to a `from_vars` that takes a
//! lookup function, so parsing can be exercised without touching the process
//! environment.

use std::net::SocketAddr;
use std::path::PathBuf;

use tally_core::ConfigError;

/// Default HTTP port.
pub const DEFAULT_PORT: u16 = 8080;

/// Default LMDB map size.
pub const DEFAULT_STORE_MAX_SIZE_MB: usize = 256;

fn parse_bool(value: &str) -> bool {
    !matches!(value.trim().to_lowercase().as_str(), "false" | "0" | "no")
}

// ============================================================================
// SERVER
// ============================================================================

/// HTTP listener configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiConfig {
    pub bind_host: String,
    pub port: u16,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
        }
    }
}

impl ApiConfig {
    /// Create ApiConfig from environment variables.
    ///
    /// - `TALLY_API_BIND`: listen host (default: 0.0.0.0)
    /// - `PORT`, then `TALLY_API_PORT`: listen port (default: 8080)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let bind_host = var("TALLY_API_BIND").unwrap_or_else(|| "0.0.0.0".to_string());
        let port = match var("PORT").or_else(|| var("TALLY_API_PORT")) {
            Some(raw) => raw.trim().parse::<u16>().map_err(|e| ConfigError::InvalidValue {
                field: "port".to_string(),
                value: raw.clone(),
                reason: e.to_string(),
            })?,
            None => DEFAULT_PORT,
        };
        Ok(Self { bind_host, port })
    }

    /// Resolve the listen address.
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        let addr = format!("{}:{}", self.bind_host, self.port);
        addr.parse().map_err(|e: std::net::AddrParseError| ConfigError::InvalidValue {
            field: "bind address".to_string(),
            value: addr.clone(),
            reason: e.to_string(),
        })
    }
}

// ============================================================================
// STORE
// ============================================================================

/// Entity store selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// LMDB directory. `None` selects the in-memory store.
    pub path: Option<PathBuf>,
    pub max_size_mb: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: None,
            max_size_mb: DEFAULT_STORE_MAX_SIZE_MB,
        }
    }
}

impl StoreConfig {
    /// Create StoreConfig from environment variables.
    ///
    /// - `TALLY_STORE_PATH`: LMDB directory (unset: in-memory store)
    /// - `TALLY_STORE_MAX_SIZE_MB`: LMDB map size (default: 256)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let path = var("TALLY_STORE_PATH")
            .filter(|p| !p.trim().is_empty())
            .map(PathBuf::from);
        let max_size_mb = match var("TALLY_STORE_MAX_SIZE_MB") {
            Some(raw) => raw.trim().parse::<usize>().map_err(|e| ConfigError::InvalidValue {
                field: "store max size".to_string(),
                value: raw.clone(),
                reason: e.to_string(),
            })?,
            None => DEFAULT_STORE_MAX_SIZE_MB,
        };
        Ok(Self { path, max_size_mb })
    }

    pub fn is_persistent(&self) -> bool {
        self.path.is_some()
    }
}

// ============================================================================
// FAÇADE
// ============================================================================

/// Write-path eviction policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FacadeConfig {
    /// Whether UPDATE also clears the list region. The list may otherwise
    /// serve the pre-update row until its TTL runs out.
    pub update_evicts_list: bool,
}

impl Default for FacadeConfig {
    fn default() -> Self {
        Self {
            update_evicts_list: true,
        }
    }
}

impl FacadeConfig {
    /// - `TALLY_CACHE_UPDATE_EVICTS_LIST`: "false" to evict only the entry (default: true)
    pub fn from_env() -> Self {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Self {
        let update_evicts_list = var("TALLY_CACHE_UPDATE_EVICTS_LIST")
            .map(|s| parse_bool(&s))
            .unwrap_or(true);
        Self { update_evicts_list }
    }
}
