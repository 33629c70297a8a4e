//! Topology mapping onto the underlying client.
//!
//! One resolved [`InstanceOptions`] value can target a standalone node, a
//! cluster, or a sentinel-managed group; this module turns it into the
//! matching `redis` client and dials the initial connection. Field
//! applicability mirrors the universal-client rules: clusters ignore the
//! database index, the routing flags only matter for clusters, and the
//! `sentinel_*` credentials authenticate against the sentinel nodes rather
//! than the data nodes.

use redis::aio::{ConnectionLike, ConnectionManager, ConnectionManagerConfig, MultiplexedConnection};
use redis::cluster::ClusterClientBuilder;
use redis::cluster_async::ClusterConnection;
use redis::sentinel::{SentinelClient, SentinelNodeConnectionInfo, SentinelServerType};
use redis::{
    Client, Cmd, ConnectionAddr, ConnectionInfo, Pipeline, ProtocolVersion, RedisConnectionInfo,
    RedisFuture, TlsMode, Value,
};

use super::TlsOptions;
use crate::options::{InstanceOptions, Topology};
use crate::{Error, Result};

/// Live connection variants across topologies.
///
/// All variants multiplex concurrent commands over shared transport state,
/// so the value is cheap to clone and safe to use from many tasks. It
/// implements [`redis::aio::ConnectionLike`] and can be passed anywhere the
/// `redis` crate expects a connection.
#[derive(Clone)]
pub enum InstanceConnection {
    /// Self-reconnecting connection to a standalone node.
    Standalone(ConnectionManager),
    /// Slot-aware cluster connection.
    Cluster(ClusterConnection),
    /// Connection to the node a sentinel group resolved.
    Sentinel(MultiplexedConnection),
}

impl InstanceConnection {
    /// Topology this connection targets.
    pub fn topology(&self) -> Topology {
        match self {
            InstanceConnection::Standalone(_) => Topology::Standalone,
            InstanceConnection::Cluster(_) => Topology::Cluster,
            InstanceConnection::Sentinel(_) => Topology::Sentinel,
        }
    }
}

impl std::fmt::Debug for InstanceConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InstanceConnection::Standalone(_) => f.write_str("InstanceConnection::Standalone"),
            InstanceConnection::Cluster(_) => f.write_str("InstanceConnection::Cluster"),
            InstanceConnection::Sentinel(_) => f.write_str("InstanceConnection::Sentinel"),
        }
    }
}

impl ConnectionLike for InstanceConnection {
    fn req_packed_command<'a>(&'a mut self, cmd: &'a Cmd) -> RedisFuture<'a, Value> {
        match self {
            InstanceConnection::Standalone(conn) => conn.req_packed_command(cmd),
            InstanceConnection::Cluster(conn) => conn.req_packed_command(cmd),
            InstanceConnection::Sentinel(conn) => conn.req_packed_command(cmd),
        }
    }

    fn req_packed_commands<'a>(
        &'a mut self,
        cmd: &'a Pipeline,
        offset: usize,
        count: usize,
    ) -> RedisFuture<'a, Vec<Value>> {
        match self {
            InstanceConnection::Standalone(conn) => conn.req_packed_commands(cmd, offset, count),
            InstanceConnection::Cluster(conn) => conn.req_packed_commands(cmd, offset, count),
            InstanceConnection::Sentinel(conn) => conn.req_packed_commands(cmd, offset, count),
        }
    }

    fn get_db(&self) -> i64 {
        match self {
            InstanceConnection::Standalone(conn) => conn.get_db(),
            InstanceConnection::Cluster(conn) => conn.get_db(),
            InstanceConnection::Sentinel(conn) => conn.get_db(),
        }
    }
}

/// Establish the initial connection for the topology the options select.
pub(crate) async fn dial(
    options: &InstanceOptions,
    tls: Option<&TlsOptions>,
) -> Result<InstanceConnection> {
    match options.topology() {
        Topology::Standalone => dial_standalone(options, tls).await,
        Topology::Cluster => dial_cluster(options, tls).await,
        Topology::Sentinel => dial_sentinel(options, tls).await,
    }
}

async fn dial_standalone(
    options: &InstanceOptions,
    tls: Option<&TlsOptions>,
) -> Result<InstanceConnection> {
    let (host, port) = options
        .endpoints()
        .into_iter()
        .next()
        .ok_or_else(no_endpoints)?;
    let info = ConnectionInfo {
        addr: make_addr(host, port, tls),
        redis: redis_info(options, options.db),
    };
    let client = match tls {
        Some(t) => Client::build_with_tls(info, t.to_certificates())?,
        None => Client::open(info)?,
    };

    let mut config = ConnectionManagerConfig::new()
        .set_number_of_retries(options.max_retries.max(0) as usize)
        .set_factor(options.min_retry_backoff.as_millis() as u64)
        .set_max_delay(options.max_retry_backoff.as_millis() as u64);
    if let Some(d) = options.dial_timeout.as_duration() {
        config = config.set_connection_timeout(d);
    }
    if let Some(d) = options.read_timeout.as_duration() {
        config = config.set_response_timeout(d);
    }

    let manager = client.get_connection_manager_with_config(config).await?;
    Ok(InstanceConnection::Standalone(manager))
}

async fn dial_cluster(
    options: &InstanceOptions,
    tls: Option<&TlsOptions>,
) -> Result<InstanceConnection> {
    let nodes: Vec<ConnectionInfo> = options
        .endpoints()
        .into_iter()
        .map(|(host, port)| ConnectionInfo {
            addr: make_addr(host, port, tls),
            // Clusters have no database index.
            redis: redis_info(options, 0),
        })
        .collect();
    if nodes.is_empty() {
        return Err(no_endpoints());
    }

    let mut builder = ClusterClientBuilder::new(nodes);
    if options.max_retries > 0 {
        builder = builder.retries(options.max_retries as u32);
    }
    if options.read_only || options.route_by_latency || options.route_randomly {
        builder = builder.read_from_replicas();
    }
    if let Some(d) = options.dial_timeout.as_duration() {
        builder = builder.connection_timeout(d);
    }
    if let Some(d) = options.read_timeout.as_duration() {
        builder = builder.response_timeout(d);
    }
    if let Some(t) = tls {
        builder = builder.certs(t.to_certificates());
    }

    let client = builder.build()?;
    let conn = client.get_async_connection().await?;
    Ok(InstanceConnection::Cluster(conn))
}

async fn dial_sentinel(
    options: &InstanceOptions,
    tls: Option<&TlsOptions>,
) -> Result<InstanceConnection> {
    let master = options.master_name.clone().unwrap_or_default();
    let sentinels: Vec<ConnectionInfo> = options
        .endpoints()
        .into_iter()
        .map(|(host, port)| ConnectionInfo {
            addr: make_addr(host, port, tls),
            redis: RedisConnectionInfo {
                db: 0,
                username: options.sentinel_username.clone(),
                password: options.sentinel_password.clone(),
                protocol: protocol_version(options.protocol),
                ..Default::default()
            },
        })
        .collect();
    if sentinels.is_empty() {
        return Err(no_endpoints());
    }

    let node_info = SentinelNodeConnectionInfo {
        tls_mode: tls.map(|t| {
            if t.insecure() {
                TlsMode::Insecure
            } else {
                TlsMode::Secure
            }
        }),
        redis_connection_info: Some(redis_info(options, options.db)),
    };
    let server_type = if options.read_only {
        SentinelServerType::Replica
    } else {
        SentinelServerType::Master
    };

    let mut client = SentinelClient::build(sentinels, master, Some(node_info), server_type)?;
    let conn = match options.dial_timeout.as_duration() {
        Some(d) => tokio::time::timeout(d, client.get_async_connection())
            .await
            .map_err(|_| Error::DialTimeout(d))??,
        None => client.get_async_connection().await?,
    };
    Ok(InstanceConnection::Sentinel(conn))
}

fn make_addr(host: String, port: u16, tls: Option<&TlsOptions>) -> ConnectionAddr {
    match tls {
        Some(t) => ConnectionAddr::TcpTls {
            host,
            port,
            insecure: t.insecure(),
            tls_params: None,
        },
        None => ConnectionAddr::Tcp(host, port),
    }
}

fn redis_info(options: &InstanceOptions, db: i64) -> RedisConnectionInfo {
    RedisConnectionInfo {
        db,
        username: options.username.clone(),
        password: options.password.clone(),
        protocol: protocol_version(options.protocol),
        ..Default::default()
    }
}

fn protocol_version(selector: Option<i64>) -> ProtocolVersion {
    match selector {
        Some(3) => ProtocolVersion::RESP3,
        _ => ProtocolVersion::RESP2,
    }
}

fn no_endpoints() -> Error {
    Error::Config("no endpoints configured".into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::{OptionMap, Timeout};

    fn options(addr: &str) -> InstanceOptions {
        let mut cfg = OptionMap::new();
        cfg.insert("addr".to_string(), addr.to_string());
        InstanceOptions::from_map(&cfg)
    }

    #[test]
    fn test_protocol_version_selection() {
        assert_eq!(protocol_version(Some(3)), ProtocolVersion::RESP3);
        assert_eq!(protocol_version(Some(2)), ProtocolVersion::RESP2);
        assert_eq!(protocol_version(None), ProtocolVersion::RESP2);
    }

    #[test]
    fn test_make_addr_plain_and_tls() {
        let plain = make_addr("cache".to_string(), 6379, None);
        assert!(matches!(plain, ConnectionAddr::Tcp(ref h, 6379) if h == "cache"));

        let tls = TlsOptions::builder()
            .danger_accept_invalid_certs(true)
            .build()
            .expect("tls");
        let secure = make_addr("cache".to_string(), 6379, Some(&tls));
        assert!(matches!(
            secure,
            ConnectionAddr::TcpTls { ref host, port: 6379, insecure: true, .. } if host == "cache"
        ));
    }

    #[test]
    fn test_redis_info_carries_auth() {
        let mut opts = options("a:6379");
        opts.username = Some("svc".to_string());
        opts.password = Some("secret".to_string());
        opts.db = 4;

        let info = redis_info(&opts, opts.db);
        assert_eq!(info.db, 4);
        assert_eq!(info.username.as_deref(), Some("svc"));
        assert_eq!(info.password.as_deref(), Some("secret"));
    }

    #[tokio::test]
    async fn test_dial_without_endpoints_fails() {
        let opts = InstanceOptions::default();
        let result = dial(&opts, None).await;
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[tokio::test]
    async fn test_dial_refused_endpoint_fails() {
        // Port 1 on loopback refuses immediately; the error must come back
        // through the retry path instead of hanging.
        let mut opts = options("127.0.0.1:1");
        opts.dial_timeout = Timeout::After(std::time::Duration::from_millis(200));
        opts.min_retry_backoff = std::time::Duration::from_millis(1);
        opts.max_retry_backoff = std::time::Duration::from_millis(2);

        let result = dial(&opts, None).await;
        assert!(result.is_err());
    }
}
