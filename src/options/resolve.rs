//! Resolution of flat option maps into structured instance options.
//!
//! [`InstanceOptions::from_map`] is the translation layer: every recognized
//! key is coerced to its target type when present and falls back to a
//! documented default when absent. Unrecognized keys are ignored so option
//! maps can carry keys for other consumers. Translation never fails; a
//! malformed value degrades to the type's zero value (see
//! [`coerce`](super::coerce)) and connection problems surface on first use.

use std::collections::HashMap;
use std::time::Duration;

use super::coerce;

/// Flat string-keyed configuration for one instance.
pub type OptionMap = HashMap<String, String>;

/// Default command retry count.
pub const DEFAULT_MAX_RETRIES: i64 = 3;
/// Default minimum retry backoff.
pub const DEFAULT_MIN_RETRY_BACKOFF: Duration = Duration::from_millis(8);
/// Default maximum retry backoff.
pub const DEFAULT_MAX_RETRY_BACKOFF: Duration = Duration::from_millis(512);
/// Default connect timeout.
pub const DEFAULT_DIAL_TIMEOUT: Duration = Duration::from_secs(5);
/// Default read timeout.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(3);
/// Default write timeout.
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(3);
/// Port assumed for endpoints given without one.
pub const DEFAULT_PORT: u16 = 6379;

/// A timing bound with the three sentinel states shared by every timeout
/// and lifetime option.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Timeout {
    /// Use the underlying library's default (raw value `0`).
    #[default]
    Default,
    /// No bound; block indefinitely (raw value `-1`).
    Unbounded,
    /// Do not manage deadlines at all (raw value `-2`).
    Unenforced,
    /// Explicit bound.
    After(Duration),
}

impl Timeout {
    /// Map a signed nanosecond count onto the sentinel scheme.
    pub(crate) fn from_nanos(nanos: i64) -> Self {
        match nanos {
            0 => Timeout::Default,
            -2 => Timeout::Unenforced,
            n if n < 0 => Timeout::Unbounded,
            n => Timeout::After(Duration::from_nanos(n as u64)),
        }
    }

    /// The explicit bound, if one was set.
    pub fn as_duration(&self) -> Option<Duration> {
        match self {
            Timeout::After(d) => Some(*d),
            _ => None,
        }
    }
}

impl std::fmt::Display for Timeout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Timeout::Default => write!(f, "default"),
            Timeout::Unbounded => write!(f, "unbounded"),
            Timeout::Unenforced => write!(f, "unenforced"),
            Timeout::After(d) => write!(f, "{d:?}"),
        }
    }
}

/// Deployment shape an instance targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Topology {
    /// Single node.
    Standalone,
    /// Redis Cluster.
    Cluster,
    /// Sentinel-managed high-availability group.
    Sentinel,
}

impl std::fmt::Display for Topology {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Topology::Standalone => write!(f, "standalone"),
            Topology::Cluster => write!(f, "cluster"),
            Topology::Sentinel => write!(f, "sentinel"),
        }
    }
}

/// Fully resolved connection configuration for one instance.
///
/// Produced by [`InstanceOptions::from_map`] or constructed directly for the
/// structured-configuration path. Which fields apply depends on the
/// [`topology`](InstanceOptions::topology): `db` is ignored by clusters, the
/// routing flags only matter for clusters, and the `sentinel_*` fields only
/// matter for sentinel groups.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceOptions {
    /// Ordered endpoint list (`host` or `host:port`).
    pub addrs: Vec<String>,
    /// Connection display name sent to the server.
    pub client_name: String,
    /// Target database index (standalone and sentinel only).
    pub db: i64,
    /// Auth username.
    pub username: Option<String>,
    /// Auth password.
    pub password: Option<String>,

    /// Maximum command retries.
    pub max_retries: i64,
    /// Minimum retry backoff (zero disables backoff).
    pub min_retry_backoff: Duration,
    /// Maximum retry backoff (zero disables backoff).
    pub max_retry_backoff: Duration,

    /// Connect timeout.
    pub dial_timeout: Timeout,
    /// Read timeout.
    pub read_timeout: Timeout,
    /// Write timeout.
    pub write_timeout: Timeout,
    /// Pool-acquire timeout.
    pub pool_timeout: Timeout,
    /// Honor caller-supplied deadlines.
    pub context_timeout_enabled: bool,

    /// Pool reuse order: true = FIFO, false = LIFO.
    pub pool_fifo: bool,
    /// Pool size, already scaled by host parallelism (zero = library default).
    pub pool_size: usize,
    /// Minimum idle connections kept in the pool.
    pub min_idle_conns: usize,
    /// Maximum idle connections kept in the pool (zero = no bound).
    pub max_idle_conns: usize,
    /// Maximum idle lifetime of a pooled connection.
    pub conn_max_idle_time: Timeout,
    /// Maximum total lifetime of a pooled connection.
    pub conn_max_lifetime: Timeout,

    /// Maximum cluster redirects to follow (zero = library default).
    pub max_redirects: i64,
    /// Allow read-only commands on replicas.
    pub read_only: bool,
    /// Route reads to the lowest-latency node.
    pub route_by_latency: bool,
    /// Route reads to a random node.
    pub route_randomly: bool,

    /// Sentinel master name; non-empty selects the sentinel topology.
    pub master_name: Option<String>,
    /// Auth username for the sentinel nodes themselves.
    pub sentinel_username: Option<String>,
    /// Auth password for the sentinel nodes themselves.
    pub sentinel_password: Option<String>,

    /// Wire protocol version selector (2 or 3, `None` = library default).
    pub protocol: Option<i64>,
}

impl Default for InstanceOptions {
    fn default() -> Self {
        Self {
            addrs: Vec::new(),
            client_name: String::new(),
            db: 0,
            username: None,
            password: None,
            max_retries: DEFAULT_MAX_RETRIES,
            min_retry_backoff: DEFAULT_MIN_RETRY_BACKOFF,
            max_retry_backoff: DEFAULT_MAX_RETRY_BACKOFF,
            dial_timeout: Timeout::After(DEFAULT_DIAL_TIMEOUT),
            read_timeout: Timeout::After(DEFAULT_READ_TIMEOUT),
            write_timeout: Timeout::After(DEFAULT_WRITE_TIMEOUT),
            pool_timeout: Timeout::Default,
            context_timeout_enabled: false,
            pool_fifo: false,
            pool_size: 0,
            min_idle_conns: 0,
            max_idle_conns: 0,
            conn_max_idle_time: Timeout::Default,
            conn_max_lifetime: Timeout::Default,
            max_redirects: 0,
            read_only: false,
            route_by_latency: false,
            route_randomly: false,
            master_name: None,
            sentinel_username: None,
            sentinel_password: None,
            protocol: None,
        }
    }
}

impl InstanceOptions {
    /// Resolve a flat option map into a fully defaulted configuration.
    ///
    /// Pool size is scaled by the host's available parallelism here, at
    /// translation time, so pool capacity is proportional to the machine the
    /// process started on.
    pub fn from_map(cfg: &OptionMap) -> Self {
        let mut opts = Self::default();

        opts.addrs = split_addrs(present(cfg, "addr").unwrap_or(""));
        if let Some(raw) = present(cfg, "clientName") {
            opts.client_name = raw.to_string();
        }
        if let Some(raw) = present(cfg, "db") {
            opts.db = coerce::to_i64("db", raw);
        }
        opts.username = non_empty(cfg, "username").map(str::to_string);
        opts.password = non_empty(cfg, "password").map(str::to_string);

        if let Some(raw) = present(cfg, "maxRetries") {
            opts.max_retries = coerce::to_i64("maxRetries", raw);
        }
        if let Some(raw) = present(cfg, "minRetryBackoff") {
            opts.min_retry_backoff = backoff("minRetryBackoff", raw);
        }
        if let Some(raw) = present(cfg, "maxRetryBackoff") {
            opts.max_retry_backoff = backoff("maxRetryBackoff", raw);
        }

        if let Some(raw) = present(cfg, "dialTimeout") {
            opts.dial_timeout = timeout("dialTimeout", raw);
        }
        if let Some(raw) = present(cfg, "readTimeout") {
            opts.read_timeout = timeout("readTimeout", raw);
        }
        if let Some(raw) = present(cfg, "writeTimeout") {
            opts.write_timeout = timeout("writeTimeout", raw);
        }
        if let Some(raw) = present(cfg, "contextTimeoutEnabled") {
            opts.context_timeout_enabled = coerce::to_bool("contextTimeoutEnabled", raw);
        }
        if let Some(raw) = present(cfg, "poolFIFO") {
            opts.pool_fifo = coerce::to_bool("poolFIFO", raw);
        }

        if let Some(raw) = non_empty(cfg, "poolSize") {
            opts.pool_size = scale_pool_size(coerce::to_i64("poolSize", raw), parallelism());
        }
        if let Some(raw) = non_empty(cfg, "poolTimeout") {
            opts.pool_timeout = timeout("poolTimeout", raw);
        }
        if let Some(raw) = non_empty(cfg, "minIdleConns") {
            opts.min_idle_conns = coerce::to_i64("minIdleConns", raw).max(0) as usize;
        }
        if let Some(raw) = non_empty(cfg, "maxIdleConns") {
            opts.max_idle_conns = coerce::to_i64("maxIdleConns", raw).max(0) as usize;
        }
        if let Some(raw) = non_empty(cfg, "connMaxIdleTime") {
            opts.conn_max_idle_time = timeout("connMaxIdleTime", raw);
        }
        if let Some(raw) = non_empty(cfg, "connMaxLifetime") {
            opts.conn_max_lifetime = timeout("connMaxLifetime", raw);
        }

        if let Some(raw) = non_empty(cfg, "maxRedirects") {
            opts.max_redirects = coerce::to_i64("maxRedirects", raw);
        }
        if let Some(raw) = non_empty(cfg, "readOnly") {
            opts.read_only = coerce::to_bool("readOnly", raw);
        }
        if let Some(raw) = non_empty(cfg, "routeByLatency") {
            opts.route_by_latency = coerce::to_bool("routeByLatency", raw);
        }
        if let Some(raw) = non_empty(cfg, "routeRandomly") {
            opts.route_randomly = coerce::to_bool("routeRandomly", raw);
        }

        opts.master_name = non_empty(cfg, "masterName").map(str::to_string);
        opts.sentinel_username = non_empty(cfg, "sentinelUsername").map(str::to_string);
        opts.sentinel_password = non_empty(cfg, "sentinelPassword").map(str::to_string);

        if let Some(raw) = non_empty(cfg, "protocol") {
            opts.protocol = Some(coerce::to_i64("protocol", raw));
        }

        opts
    }

    /// Deployment shape selected by this configuration: a master name means
    /// sentinel, more than one endpoint means cluster, otherwise standalone.
    pub fn topology(&self) -> Topology {
        if self.master_name.is_some() {
            Topology::Sentinel
        } else if self.addrs.len() > 1 {
            Topology::Cluster
        } else {
            Topology::Standalone
        }
    }

    /// Endpoints as `(host, port)` pairs, preserving configuration order.
    pub fn endpoints(&self) -> Vec<(String, u16)> {
        self.addrs.iter().map(|a| host_port(a)).collect()
    }
}

/// Value for a key that was present in the map, empty or not.
fn present<'a>(cfg: &'a OptionMap, key: &str) -> Option<&'a str> {
    cfg.get(key).map(String::as_str)
}

/// Value for a key that was present and non-empty; keys that only apply when
/// explicitly set use this form.
fn non_empty<'a>(cfg: &'a OptionMap, key: &str) -> Option<&'a str> {
    present(cfg, key).filter(|v| !v.is_empty())
}

fn timeout(key: &str, raw: &str) -> Timeout {
    Timeout::from_nanos(coerce::to_duration_nanos(key, raw))
}

/// Backoffs are plain durations; a negative value disables backoff.
fn backoff(key: &str, raw: &str) -> Duration {
    let nanos = coerce::to_duration_nanos(key, raw);
    if nanos <= 0 {
        Duration::ZERO
    } else {
        Duration::from_nanos(nanos as u64)
    }
}

fn split_addrs(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .map(str::to_string)
        .collect()
}

fn host_port(addr: &str) -> (String, u16) {
    if let Some((host, port)) = addr.rsplit_once(':') {
        if let Ok(port) = port.parse::<u16>() {
            let host = host.trim_start_matches('[').trim_end_matches(']');
            return (host.to_string(), port);
        }
    }
    (addr.to_string(), DEFAULT_PORT)
}

pub(crate) fn scale_pool_size(per_unit: i64, units: usize) -> usize {
    if per_unit <= 0 {
        0
    } else {
        per_unit as usize * units
    }
}

pub(crate) fn parallelism() -> usize {
    std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
}
