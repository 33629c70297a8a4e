//! Connection construction
//!
//! This module handles:
//! * Topology mapping onto the underlying client (standalone, cluster, sentinel)
//! * TLS configuration and PEM validation
//! * Out-of-band transport overrides (custom dialer, post-connect hook)

mod flavor;
mod overrides;
mod tls;

pub use flavor::InstanceConnection;
pub use overrides::{ConnectHook, ConnectOverrides, DialFn};
pub use tls::{TlsOptions, TlsOptionsBuilder};

pub(crate) use flavor::dial;
