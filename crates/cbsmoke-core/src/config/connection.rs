//! Connection string parsing and the connection record

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{Error, Result};

/// Default management port for plain HTTP
pub const DEFAULT_MGMT_PORT: u16 = 8091;

/// Default management port for HTTPS
pub const DEFAULT_MGMT_TLS_PORT: u16 = 18091;

/// Key-value ports that may appear in `couchbase://` strings. They are never
/// a valid bootstrap target for the REST services.
const KV_PORTS: [u16; 2] = [11210, 11207];

/// Connection string scheme
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    Couchbase,
    Couchbases,
    Http,
    Https,
}

impl Scheme {
    fn parse(input: &str) -> Option<Self> {
        match input.to_ascii_lowercase().as_str() {
            "couchbase" => Some(Scheme::Couchbase),
            "couchbases" => Some(Scheme::Couchbases),
            "http" => Some(Scheme::Http),
            "https" => Some(Scheme::Https),
            _ => None,
        }
    }

    /// Whether the scheme itself requires a secured transport
    pub fn is_tls(&self) -> bool {
        matches!(self, Scheme::Couchbases | Scheme::Https)
    }

    /// Whether an explicit port addresses the management service directly
    fn port_is_management(&self) -> bool {
        matches!(self, Scheme::Http | Scheme::Https)
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Scheme::Couchbase => "couchbase",
            Scheme::Couchbases => "couchbases",
            Scheme::Http => "http",
            Scheme::Https => "https",
        };
        write!(f, "{}", s)
    }
}

/// Address set the client uses to reach cluster nodes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Network {
    /// The addresses nodes advertise for themselves
    #[default]
    Default,
    /// The `external` alternate addresses, for clients outside the cluster's
    /// own network (e.g. behind a Kubernetes load balancer)
    External,
}

impl Network {
    fn parse(value: &str, whole: &str) -> Result<Self> {
        match value.to_ascii_lowercase().as_str() {
            "default" => Ok(Network::Default),
            "external" => Ok(Network::External),
            other => Err(Error::invalid_connection_string(
                whole,
                format!("unknown network '{}' (expected default or external)", other),
            )),
        }
    }
}

/// A single seed host with an optional port
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostPort {
    pub host: String,
    pub port: Option<u16>,
}

impl HostPort {
    fn parse(input: &str, whole: &str) -> Result<Self> {
        let entry = input.trim();
        if entry.is_empty() {
            return Err(Error::invalid_connection_string(whole, "empty host entry"));
        }

        // Bracketed IPv6 literal, e.g. [::1]:8091
        if let Some(rest) = entry.strip_prefix('[') {
            let (host, after) = rest.split_once(']').ok_or_else(|| {
                Error::invalid_connection_string(
                    whole,
                    format!("unterminated IPv6 literal '{}'", entry),
                )
            })?;
            let port = match after {
                "" => None,
                p => Some(parse_port(p.strip_prefix(':').unwrap_or(p), whole)?),
            };
            return Ok(Self {
                host: host.to_string(),
                port,
            });
        }

        match entry.matches(':').count() {
            0 => Ok(Self {
                host: entry.to_string(),
                port: None,
            }),
            1 => {
                let (host, port) = entry.split_once(':').unwrap_or((entry, ""));
                if host.is_empty() {
                    return Err(Error::invalid_connection_string(
                        whole,
                        "host name missing before port",
                    ));
                }
                Ok(Self {
                    host: host.to_string(),
                    port: Some(parse_port(port, whole)?),
                })
            }
            // Bare IPv6 literal without a port
            _ => Ok(Self {
                host: entry.to_string(),
                port: None,
            }),
        }
    }

    /// Host formatted for use in a URL authority
    pub fn url_host(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]", self.host)
        } else {
            self.host.clone()
        }
    }
}

fn parse_port(input: &str, whole: &str) -> Result<u16> {
    input
        .parse::<u16>()
        .map_err(|_| Error::invalid_connection_string(whole, format!("invalid port '{}'", input)))
}

/// Parsed cluster connection string
///
/// Accepts `couchbase://`, `couchbases://`, `http://` and `https://` schemes
/// (no scheme means `couchbase://`), a comma- or semicolon-separated host
/// list and optional `?key=value&...` parameters. Only `network` is
/// interpreted; other parameters are SDK tuning knobs and are ignored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionString {
    scheme: Scheme,
    hosts: Vec<HostPort>,
    network: Network,
    raw: String,
}

impl ConnectionString {
    /// Parse a connection string
    pub fn parse(input: &str) -> Result<Self> {
        let raw = input.trim();
        if raw.is_empty() {
            return Err(Error::invalid_connection_string(input, "connection string is empty"));
        }

        let (scheme, rest) = match raw.split_once("://") {
            Some((scheme, rest)) => {
                let scheme = Scheme::parse(scheme).ok_or_else(|| {
                    Error::invalid_connection_string(
                        raw,
                        format!("unsupported scheme '{}'", scheme),
                    )
                })?;
                (scheme, rest)
            }
            None => (Scheme::Couchbase, raw),
        };

        let (host_part, query) = match rest.split_once('?') {
            Some((hosts, query)) => (hosts, Some(query)),
            None => (rest, None),
        };
        let host_part = host_part.trim_end_matches('/');

        if host_part.trim().is_empty() {
            return Err(Error::invalid_connection_string(raw, "no hosts specified"));
        }

        let hosts = host_part
            .split(&[',', ';'][..])
            .map(|entry| HostPort::parse(entry, raw))
            .collect::<Result<Vec<_>>>()?;

        let mut network = Network::Default;
        if let Some(query) = query {
            for pair in query.split('&').filter(|p| !p.is_empty()) {
                let (key, value) = pair.split_once('=').ok_or_else(|| {
                    Error::invalid_connection_string(raw, format!("malformed parameter '{}'", pair))
                })?;
                match key {
                    "network" => network = Network::parse(value, raw)?,
                    _ => tracing::debug!("Ignoring connection string parameter {}", key),
                }
            }
        }

        Ok(Self {
            scheme,
            hosts,
            network,
            raw: raw.to_string(),
        })
    }

    pub fn scheme(&self) -> Scheme {
        self.scheme
    }

    pub fn hosts(&self) -> &[HostPort] {
        &self.hosts
    }

    pub fn network(&self) -> Network {
        self.network
    }

    /// Seed host and management port used to bootstrap the REST session.
    ///
    /// An explicit port on an `http(s)://` string is the management port.
    /// On `couchbase(s)://` strings a key-value port is ignored in favour of
    /// the default management port.
    pub fn bootstrap(&self, tls: bool) -> (HostPort, u16) {
        let seed = self.hosts[0].clone();
        let default_port = if tls {
            DEFAULT_MGMT_TLS_PORT
        } else {
            DEFAULT_MGMT_PORT
        };

        let port = match seed.port {
            Some(p) if self.scheme.port_is_management() => p,
            Some(p) if !KV_PORTS.contains(&p) => p,
            _ => default_port,
        };

        (seed, port)
    }
}

impl FromStr for ConnectionString {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for ConnectionString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.raw)
    }
}

/// Immutable connection record built once at program start
#[derive(Clone)]
pub struct ConnectionConfig {
    pub connection: ConnectionString,
    pub username: String,
    pub password: String,
    pub bucket: String,
    pub ca_file: Option<PathBuf>,
}

impl ConnectionConfig {
    /// Build a connection record, validating the connection string
    pub fn new(
        connection: &str,
        username: impl Into<String>,
        password: impl Into<String>,
        bucket: impl Into<String>,
    ) -> Result<Self> {
        let bucket = bucket.into();
        if bucket.trim().is_empty() {
            return Err(Error::missing_field("bucket"));
        }
        let username = username.into();
        if username.is_empty() {
            return Err(Error::missing_field("username"));
        }

        Ok(Self {
            connection: ConnectionString::parse(connection)?,
            username,
            password: password.into(),
            bucket,
            ca_file: None,
        })
    }

    /// Trust the certificate at `path` and enable TLS
    pub fn with_ca_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.ca_file = Some(path.into());
        self
    }

    pub fn ca_file(&self) -> Option<&Path> {
        self.ca_file.as_deref()
    }

    /// TLS is on when the scheme demands it or a trust anchor was supplied
    pub fn tls_enabled(&self) -> bool {
        self.connection.scheme().is_tls() || self.ca_file.is_some()
    }
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("connection", &self.connection.to_string())
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("bucket", &self.bucket)
            .field("ca_file", &self.ca_file)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_default_scheme() {
        let cs = ConnectionString::parse("10.0.0.1").unwrap();
        assert_eq!(cs.scheme(), Scheme::Couchbase);
        assert_eq!(cs.hosts().len(), 1);
        assert_eq!(cs.hosts()[0].host, "10.0.0.1");
        assert_eq!(cs.hosts()[0].port, None);
    }

    #[test]
    fn test_parse_multiple_hosts_and_params() {
        let cs =
            ConnectionString::parse("couchbases://node1:11207,node2;node3?network=external&x=1")
                .unwrap();
        assert_eq!(cs.scheme(), Scheme::Couchbases);
        assert!(cs.scheme().is_tls());
        let hosts: Vec<&str> = cs.hosts().iter().map(|h| h.host.as_str()).collect();
        assert_eq!(hosts, vec!["node1", "node2", "node3"]);
        assert_eq!(cs.hosts()[0].port, Some(11207));
        assert_eq!(cs.network(), Network::External);
    }

    #[test]
    fn test_network_defaults_and_validation() {
        let cs = ConnectionString::parse("couchbase://node1?timeout=10s").unwrap();
        assert_eq!(cs.network(), Network::Default);

        let cs = ConnectionString::parse("couchbase://node1?network=Default").unwrap();
        assert_eq!(cs.network(), Network::Default);

        let err = ConnectionString::parse("couchbase://node1?network=internal").unwrap_err();
        assert!(err.to_string().contains("unknown network 'internal'"));
    }

    #[test]
    fn test_parse_ipv6() {
        let cs = ConnectionString::parse("http://[::1]:9000").unwrap();
        assert_eq!(cs.hosts()[0].host, "::1");
        assert_eq!(cs.hosts()[0].port, Some(9000));
        assert_eq!(cs.hosts()[0].url_host(), "[::1]");
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert!(ConnectionString::parse("").is_err());
        assert!(ConnectionString::parse("couchbase://").is_err());
        assert!(ConnectionString::parse("ftp://host").is_err());
        assert!(ConnectionString::parse("couchbase://host:notaport").is_err());
        assert!(ConnectionString::parse("couchbase://a,,b").is_err());
        assert!(ConnectionString::parse("couchbase://host?flag").is_err());
    }

    #[test]
    fn test_bootstrap_ignores_kv_port() {
        let cs = ConnectionString::parse("couchbase://node1:11210").unwrap();
        let (seed, port) = cs.bootstrap(false);
        assert_eq!(seed.host, "node1");
        assert_eq!(port, DEFAULT_MGMT_PORT);

        let (_, port) = cs.bootstrap(true);
        assert_eq!(port, DEFAULT_MGMT_TLS_PORT);
    }

    #[test]
    fn test_bootstrap_http_port_is_management() {
        let cs = ConnectionString::parse("http://127.0.0.1:45123").unwrap();
        let (_, port) = cs.bootstrap(false);
        assert_eq!(port, 45123);
    }

    #[test]
    fn test_connection_config_tls() {
        let plain =
            ConnectionConfig::new("couchbase://localhost", "admin", "pw", "default").unwrap();
        assert!(!plain.tls_enabled());

        let with_ca = plain.clone().with_ca_file("/tmp/ca.pem");
        assert!(with_ca.tls_enabled());
        assert_eq!(with_ca.ca_file(), Some(Path::new("/tmp/ca.pem")));

        let secure =
            ConnectionConfig::new("couchbases://localhost", "admin", "pw", "default").unwrap();
        assert!(secure.tls_enabled());
    }

    #[test]
    fn test_connection_config_requires_bucket() {
        let err = ConnectionConfig::new("localhost", "admin", "pw", " ").unwrap_err();
        assert!(matches!(err, Error::MissingField { .. }));
    }

    #[test]
    fn test_debug_redacts_password() {
        let config = ConnectionConfig::new("localhost", "admin", "s3cret", "default").unwrap();
        let debug = format!("{:?}", config);
        assert!(!debug.contains("s3cret"));
        assert!(debug.contains("<redacted>"));
    }
}
