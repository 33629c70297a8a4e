//! Instance handles
//!
//! A handle is the long-lived object through which commands reach one named
//! deployment. [`RedisInstance`] is the concrete handle over the `redis`
//! crate; the [`InstanceHandle`] trait is the capability surface the
//! registry depends on, so the registry itself never names the underlying
//! client type.

use std::any::Any;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::connection::{self, ConnectOverrides, InstanceConnection};
use crate::options::{InstanceOptions, OptionMap, Topology};
use crate::{Error, Result};

/// Minimal capability surface of a registered handle: a name, a way to
/// close it, and an upcast for typed retrieval.
///
/// Closing is the registry's job. Callers that obtained a handle through
/// `get` hold a non-owning reference and must not close it — other parts of
/// the application may still be using the same handle.
#[async_trait]
pub trait InstanceHandle: Send + Sync {
    /// Logical name the instance is registered under.
    fn name(&self) -> &str;

    /// Close the instance, releasing its connections. Idempotent; the
    /// handle stays unusable afterwards.
    async fn close(&self) -> Result<()>;

    /// Upcast for typed retrieval.
    fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

enum ConnState {
    /// No connection established yet.
    Idle,
    /// Established and shared with every caller since.
    Ready(InstanceConnection),
    /// Terminal.
    Closed,
}

/// A named, independently configured connection to one Redis deployment.
///
/// Construction is lazy: registering an instance performs no I/O, and the
/// first [`connection`](RedisInstance::connection) call dials, runs the
/// client-name handshake and the post-connect hook, then caches the
/// connection for every later caller.
pub struct RedisInstance {
    name: String,
    options: InstanceOptions,
    overrides: ConnectOverrides,
    state: RwLock<ConnState>,
}

impl RedisInstance {
    /// Create an instance from an already-resolved configuration.
    pub fn new(
        name: impl Into<String>,
        options: InstanceOptions,
        overrides: ConnectOverrides,
    ) -> Self {
        Self {
            name: name.into(),
            options,
            overrides,
            state: RwLock::new(ConnState::Idle),
        }
    }

    /// Create an instance by translating a flat option map.
    pub fn from_map(name: impl Into<String>, cfg: &OptionMap) -> Self {
        Self::from_map_with(name, cfg, ConnectOverrides::default())
    }

    /// Create an instance from a flat option map plus transport overrides.
    pub fn from_map_with(
        name: impl Into<String>,
        cfg: &OptionMap,
        overrides: ConnectOverrides,
    ) -> Self {
        Self::new(name, InstanceOptions::from_map(cfg), overrides)
    }

    /// Resolved configuration this instance was built from.
    pub fn options(&self) -> &InstanceOptions {
        &self.options
    }

    /// Deployment shape this instance targets.
    pub fn topology(&self) -> Topology {
        self.options.topology()
    }

    /// The live connection, dialing on first use.
    ///
    /// The returned value is cheap to clone and safe for concurrent command
    /// issuance; hold on to it rather than calling this per command.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::Closed`] once the instance has been closed, or
    /// with the underlying dial error on first establishment.
    pub async fn connection(&self) -> Result<InstanceConnection> {
        {
            let state = self.state.read().await;
            match &*state {
                ConnState::Ready(conn) => return Ok(conn.clone()),
                ConnState::Closed => return Err(Error::Closed(self.name.clone())),
                ConnState::Idle => {}
            }
        }

        let mut state = self.state.write().await;
        match &*state {
            ConnState::Ready(conn) => Ok(conn.clone()),
            ConnState::Closed => Err(Error::Closed(self.name.clone())),
            ConnState::Idle => {
                let conn = self.establish().await?;
                *state = ConnState::Ready(conn.clone());
                Ok(conn)
            }
        }
    }

    async fn establish(&self) -> Result<InstanceConnection> {
        let mut conn = match &self.overrides.dialer {
            Some(dialer) => dialer(self.options.clone()).await?,
            None => connection::dial(&self.options, self.overrides.tls.as_ref()).await?,
        };

        if !self.options.client_name.is_empty() {
            let () = redis::cmd("CLIENT")
                .arg("SETNAME")
                .arg(&self.options.client_name)
                .query_async(&mut conn)
                .await?;
        }
        if let Some(hook) = &self.overrides.on_connect {
            hook(&mut conn).await?;
        }

        tracing::debug!(
            name = %self.name,
            topology = %self.options.topology(),
            "connection established"
        );
        Ok(conn)
    }
}

impl std::fmt::Debug for RedisInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisInstance")
            .field("name", &self.name)
            .field("topology", &self.options.topology())
            .field("addrs", &self.options.addrs)
            .finish()
    }
}

#[async_trait]
impl InstanceHandle for RedisInstance {
    fn name(&self) -> &str {
        &self.name
    }

    async fn close(&self) -> Result<()> {
        let mut state = self.state.write().await;
        if !matches!(*state, ConnState::Closed) {
            tracing::debug!(name = %self.name, "instance closed");
        }
        // Dropping the cached connection tears the transport down once the
        // last caller-held clone goes away.
        *state = ConnState::Closed;
        Ok(())
    }

    fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(entries: &[(&str, &str)]) -> OptionMap {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_from_map_resolves_options() {
        let cfg = map(&[("addr", "127.0.0.1:6379"), ("db", "2"), ("maxRetries", "5")]);
        let instance = RedisInstance::from_map("sessions", &cfg);

        assert_eq!(instance.name(), "sessions");
        assert_eq!(instance.options().db, 2);
        assert_eq!(instance.options().max_retries, 5);
        assert_eq!(instance.topology(), Topology::Standalone);
    }

    #[tokio::test]
    async fn test_connection_after_close_fails() {
        let instance = RedisInstance::from_map("gone", &map(&[("addr", "127.0.0.1:6379")]));
        instance.close().await.expect("close");

        match instance.connection().await {
            Err(Error::Closed(name)) => assert_eq!(name, "gone"),
            other => panic!("expected Closed error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let instance = RedisInstance::from_map("twice", &map(&[("addr", "127.0.0.1:6379")]));
        instance.close().await.expect("first close");
        instance.close().await.expect("second close");
    }

    #[tokio::test]
    async fn test_typed_upcast_roundtrip() {
        let instance: Arc<dyn InstanceHandle> =
            Arc::new(RedisInstance::from_map("typed", &map(&[("addr", "a:1")])));
        let concrete = instance
            .as_any()
            .downcast::<RedisInstance>()
            .expect("downcast");
        assert_eq!(concrete.name(), "typed");
    }
}
