//! Named multi-instance connection registry for Redis deployments.
//!
//! This crate lets a process talk to several logically distinct Redis
//! deployments at once — standalone nodes, clusters, or sentinel-managed
//! groups — each registered under a logical name ("sessions", "cache",
//! "ratelimits") and configured from a flat string-keyed option map.
//!
//! Two layers:
//! * Options translation: [`InstanceOptions::from_map`] resolves a flat
//!   `HashMap<String, String>` into a fully-defaulted configuration, with
//!   tolerant value coercion and topology selection.
//! * Instance registry: [`InstanceRegistry`] owns the set of live handles,
//!   enforces name uniqueness, and serves concurrent lookups.
//!
//! Registration never touches the network; the first command on a handle
//! establishes the underlying connection.
//!
//! ```no_run
//! use redis_fleet::InstanceRegistry;
//! use std::collections::HashMap;
//!
//! # async fn example() -> redis_fleet::Result<()> {
//! let registry = InstanceRegistry::new();
//!
//! let mut cfg = HashMap::new();
//! cfg.insert("addr".to_string(), "127.0.0.1:6379".to_string());
//! cfg.insert("db".to_string(), "2".to_string());
//! registry.add_map("sessions", &cfg).await?;
//!
//! let sessions = registry.get_redis("sessions").await?;
//! let mut conn = sessions.connection().await?;
//! let () = redis::cmd("SET").arg("k").arg("v").query_async(&mut conn).await?;
//! # Ok(())
//! # }
//! ```

pub mod connection;
pub mod instance;
pub mod metrics;
pub mod options;
pub mod registry;

pub use connection::{ConnectHook, ConnectOverrides, DialFn, InstanceConnection, TlsOptions};
pub use instance::{InstanceHandle, RedisInstance};
pub use options::{InstanceOptions, OptionMap, Timeout, Topology};
pub use registry::InstanceRegistry;

/// Crate error type
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Configuration error (bad option value, unusable TLS material, ...)
    #[error("configuration error: {0}")]
    Config(String),

    /// Add attempted for a name that already has a live instance
    #[error("instance '{0}' is already registered")]
    DuplicateName(String),

    /// Lookup referenced a name with no registered instance
    #[error("no instance registered under '{0}'")]
    NotFound(String),

    /// Operation on a handle that has already been closed
    #[error("instance '{0}' has been closed")]
    Closed(String),

    /// Typed retrieval found a handle of a different concrete type
    #[error("instance '{0}' is not a Redis instance")]
    TypeMismatch(String),

    /// Connection establishment exceeded the configured dial timeout
    #[error("connect timed out after {0:?}")]
    DialTimeout(std::time::Duration),

    /// Closing an instance failed; the instance was evicted regardless
    #[error("closing instance '{name}' failed")]
    Close {
        /// Logical name of the instance that failed to close
        name: String,
        /// Underlying close failure
        #[source]
        source: Box<Error>,
    },

    /// Error from the underlying client library
    #[error(transparent)]
    Redis(#[from] redis::RedisError),
}

/// Crate result type
pub type Result<T> = std::result::Result<T, Error>;
