//! Out-of-band transport overrides.
//!
//! TLS material, a custom dial function, and a post-connect hook are not
//! part of the string option map; callers supply them alongside it. Absence
//! of an override leaves the corresponding behavior to the underlying
//! client's defaults.

use std::sync::Arc;

use futures::future::BoxFuture;

use super::{InstanceConnection, TlsOptions};
use crate::options::InstanceOptions;
use crate::Result;

/// Custom dial function.
///
/// When present it replaces connection establishment entirely: it receives
/// the resolved options and must return a live [`InstanceConnection`].
pub type DialFn = Arc<dyn Fn(InstanceOptions) -> BoxFuture<'static, Result<InstanceConnection>> + Send + Sync>;

/// Post-connect hook, invoked against each newly established connection
/// before it is handed out (after the dial and the client-name handshake).
pub type ConnectHook =
    Arc<dyn for<'a> Fn(&'a mut InstanceConnection) -> BoxFuture<'a, Result<()>> + Send + Sync>;

/// Transport overrides shared by one or many instance registrations.
#[derive(Clone, Default)]
pub struct ConnectOverrides {
    /// TLS configuration; endpoints are dialed over TLS when set.
    pub tls: Option<TlsOptions>,
    /// Custom dial function.
    pub dialer: Option<DialFn>,
    /// Post-connect hook.
    pub on_connect: Option<ConnectHook>,
}

impl ConnectOverrides {
    /// Overrides that leave every transport decision to the client library.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the TLS configuration.
    pub fn tls(mut self, tls: TlsOptions) -> Self {
        self.tls = Some(tls);
        self
    }

    /// Set the custom dial function.
    pub fn dialer(mut self, dialer: DialFn) -> Self {
        self.dialer = Some(dialer);
        self
    }

    /// Set the post-connect hook.
    pub fn on_connect(mut self, hook: ConnectHook) -> Self {
        self.on_connect = Some(hook);
        self
    }
}

impl std::fmt::Debug for ConnectOverrides {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectOverrides")
            .field("tls", &self.tls)
            .field("dialer", &self.dialer.as_ref().map(|_| "<DialFn>"))
            .field("on_connect", &self.on_connect.as_ref().map(|_| "<ConnectHook>"))
            .finish()
    }
}
