//! Service endpoints and topology discovery
//!
//! The management service advertises every node's service ports under
//! `/pools/default/nodeServices`. `ServiceMap` keeps the first endpoint
//! found for each service. A service no node advertises stays unmapped and
//! requests to it fail with `ServiceUnavailable`.

use std::collections::HashMap;
use std::fmt;

use cbsmoke_core::Network;
use serde::Deserialize;
use url::Url;

use crate::error::{ClusterError, Result};

/// Placeholder some server versions use instead of a concrete host name
const HOST_PLACEHOLDER: &str = "$HOST";

/// A cluster service reachable over HTTP
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceType {
    Management,
    Query,
    Analytics,
    Search,
    Views,
}

impl ServiceType {
    pub const ALL: [ServiceType; 5] = [
        ServiceType::Management,
        ServiceType::Query,
        ServiceType::Analytics,
        ServiceType::Search,
        ServiceType::Views,
    ];

    /// Key in the `services` object of a nodeServices entry
    fn port_key(&self, tls: bool) -> &'static str {
        match (self, tls) {
            (ServiceType::Management, false) => "mgmt",
            (ServiceType::Management, true) => "mgmtSSL",
            (ServiceType::Query, false) => "n1ql",
            (ServiceType::Query, true) => "n1qlSSL",
            (ServiceType::Analytics, false) => "cbas",
            (ServiceType::Analytics, true) => "cbasSSL",
            (ServiceType::Search, false) => "fts",
            (ServiceType::Search, true) => "ftsSSL",
            (ServiceType::Views, false) => "capi",
            (ServiceType::Views, true) => "capiSSL",
        }
    }

    /// Well-known port used before the topology has been fetched
    fn default_port(&self, tls: bool) -> u16 {
        let plain = match self {
            ServiceType::Management => 8091,
            ServiceType::Views => 8092,
            ServiceType::Query => 8093,
            ServiceType::Search => 8094,
            ServiceType::Analytics => 8095,
        };
        if tls {
            plain + 10_000
        } else {
            plain
        }
    }
}

impl fmt::Display for ServiceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ServiceType::Management => "management",
            ServiceType::Query => "query",
            ServiceType::Analytics => "analytics",
            ServiceType::Search => "search",
            ServiceType::Views => "views",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NodeServicesResponse {
    #[serde(default)]
    nodes_ext: Vec<NodeExt>,
}

#[derive(Debug, Deserialize)]
struct NodeExt {
    #[serde(default)]
    hostname: Option<String>,
    #[serde(default)]
    services: HashMap<String, u16>,
    #[serde(default, rename = "alternateAddresses")]
    alternate_addresses: HashMap<String, AlternateAddress>,
}

#[derive(Debug, Deserialize)]
struct AlternateAddress {
    hostname: String,
    /// Remapped ports; services missing here keep their advertised port
    #[serde(default)]
    ports: HashMap<String, u16>,
}

/// Base URL per service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceMap {
    endpoints: HashMap<ServiceType, Url>,
}

impl ServiceMap {
    /// Every service on the bootstrap host at its well-known port. The
    /// management endpoint uses `mgmt_port`.
    pub fn fallback(host: &str, mgmt_port: u16, tls: bool) -> Result<Self> {
        let mut endpoints = HashMap::new();
        for service in ServiceType::ALL {
            let port = match service {
                ServiceType::Management => mgmt_port,
                other => other.default_port(tls),
            };
            endpoints.insert(service, base_url(host, port, tls)?);
        }
        Ok(Self { endpoints })
    }

    /// Parse a nodeServices payload. Nodes without a host name (or with the
    /// `$HOST` placeholder) are reached through `bootstrap_host`.
    ///
    /// With `Network::External` a node's `external` alternate address is
    /// used when it has one.
    pub fn from_node_services(
        body: &[u8],
        bootstrap_host: &str,
        tls: bool,
        network: Network,
    ) -> Result<Self> {
        let response: NodeServicesResponse =
            serde_json::from_slice(body).map_err(|source| ClusterError::Decode {
                service: ServiceType::Management,
                source,
            })?;

        if response.nodes_ext.is_empty() {
            return Err(ClusterError::Config(
                "topology response lists no nodes".to_string(),
            ));
        }

        let mut endpoints = HashMap::new();
        for node in &response.nodes_ext {
            let external = match network {
                Network::External => node.alternate_addresses.get("external"),
                Network::Default => None,
            };
            let host = match (external, node.hostname.as_deref()) {
                (Some(alt), _) => alt.hostname.as_str(),
                (None, Some(h)) if !h.is_empty() && h != HOST_PLACEHOLDER => h,
                _ => bootstrap_host,
            };
            for service in ServiceType::ALL {
                if endpoints.contains_key(&service) {
                    continue;
                }
                let key = service.port_key(tls);
                let port = external
                    .and_then(|alt| alt.ports.get(key))
                    .or_else(|| node.services.get(key));
                if let Some(port) = port {
                    endpoints.insert(service, base_url(host, *port, tls)?);
                }
            }
        }

        Ok(Self { endpoints })
    }

    /// Base URL for `service`
    pub fn endpoint(&self, service: ServiceType) -> Result<&Url> {
        self.endpoints
            .get(&service)
            .ok_or(ClusterError::ServiceUnavailable { service })
    }

    pub fn has(&self, service: ServiceType) -> bool {
        self.endpoints.contains_key(&service)
    }
}

fn base_url(host: &str, port: u16, tls: bool) -> Result<Url> {
    let scheme = if tls { "https" } else { "http" };
    let host = if host.contains(':') && !host.starts_with('[') {
        format!("[{}]", host)
    } else {
        host.to_string()
    };
    Url::parse(&format!("{}://{}:{}/", scheme, host, port))
        .map_err(|e| ClusterError::Config(format!("invalid endpoint {}:{}: {}", host, port, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    const TWO_NODES: &str = r#"{
        "rev": 1024,
        "nodesExt": [
            {
                "services": {"mgmt": 8091, "mgmtSSL": 18091, "kv": 11210, "capi": 8092},
                "thisNode": true
            },
            {
                "hostname": "node2.example.com",
                "services": {"mgmt": 8091, "n1ql": 8093, "n1qlSSL": 18093, "fts": 8094, "cbas": 8095}
            }
        ]
    }"#;

    #[test]
    fn test_parse_node_services() {
        let map = ServiceMap::from_node_services(
            TWO_NODES.as_bytes(),
            "10.0.0.1",
            false,
            Network::Default,
        )
        .unwrap();

        assert_eq!(
            map.endpoint(ServiceType::Management).unwrap().as_str(),
            "http://10.0.0.1:8091/"
        );
        assert_eq!(
            map.endpoint(ServiceType::Views).unwrap().as_str(),
            "http://10.0.0.1:8092/"
        );
        assert_eq!(
            map.endpoint(ServiceType::Query).unwrap().as_str(),
            "http://node2.example.com:8093/"
        );
        assert_eq!(
            map.endpoint(ServiceType::Search).unwrap().as_str(),
            "http://node2.example.com:8094/"
        );
    }

    #[test]
    fn test_tls_uses_ssl_ports() {
        let map = ServiceMap::from_node_services(
            TWO_NODES.as_bytes(),
            "10.0.0.1",
            true,
            Network::Default,
        )
        .unwrap();

        assert_eq!(
            map.endpoint(ServiceType::Query).unwrap().as_str(),
            "https://node2.example.com:18093/"
        );
        // No node advertises ftsSSL
        assert!(matches!(
            map.endpoint(ServiceType::Search),
            Err(ClusterError::ServiceUnavailable {
                service: ServiceType::Search
            })
        ));
    }

    #[test]
    fn test_host_placeholder_uses_bootstrap() {
        let body = r#"{"nodesExt":[{"hostname":"$HOST","services":{"mgmt":9000}}]}"#;
        let map = ServiceMap::from_node_services(
            body.as_bytes(),
            "::1",
            false,
            Network::Default,
        )
        .unwrap();
        assert_eq!(
            map.endpoint(ServiceType::Management).unwrap().as_str(),
            "http://[::1]:9000/"
        );
    }

    const EXTERNAL: &str = r#"{
        "nodesExt": [
            {
                "hostname": "10.244.0.5",
                "services": {"mgmt": 8091, "n1ql": 8093, "fts": 8094},
                "alternateAddresses": {
                    "external": {
                        "hostname": "cb.example.com",
                        "ports": {"mgmt": 30091, "n1ql": 30093}
                    }
                }
            },
            {
                "hostname": "10.244.0.6",
                "services": {"cbas": 8095}
            }
        ]
    }"#;

    #[test]
    fn test_external_network_uses_alternate_addresses() {
        let map = ServiceMap::from_node_services(
            EXTERNAL.as_bytes(),
            "seed",
            false,
            Network::External,
        )
        .unwrap();

        assert_eq!(
            map.endpoint(ServiceType::Query).unwrap().as_str(),
            "http://cb.example.com:30093/"
        );
        // No remapped port: alternate host with the advertised port
        assert_eq!(
            map.endpoint(ServiceType::Search).unwrap().as_str(),
            "http://cb.example.com:8094/"
        );
        // Node without an external address keeps its own
        assert_eq!(
            map.endpoint(ServiceType::Analytics).unwrap().as_str(),
            "http://10.244.0.6:8095/"
        );
    }

    #[test]
    fn test_default_network_ignores_alternate_addresses() {
        let map = ServiceMap::from_node_services(
            EXTERNAL.as_bytes(),
            "seed",
            false,
            Network::Default,
        )
        .unwrap();
        assert_eq!(
            map.endpoint(ServiceType::Management).unwrap().as_str(),
            "http://10.244.0.5:8091/"
        );
        assert!(!map.has(ServiceType::Views));
    }

    #[test]
    fn test_empty_topology_rejected() {
        let err = ServiceMap::from_node_services(
            br#"{"nodesExt":[]}"#,
            "h",
            false,
            Network::Default,
        )
        .unwrap_err();
        assert!(matches!(err, ClusterError::Config(_)));
    }

    #[test]
    fn test_fallback_ports() {
        let map = ServiceMap::fallback("localhost", 8091, false).unwrap();
        assert_eq!(
            map.endpoint(ServiceType::Analytics).unwrap().as_str(),
            "http://localhost:8095/"
        );

        let tls = ServiceMap::fallback("localhost", 18091, true).unwrap();
        assert_eq!(
            tls.endpoint(ServiceType::Search).unwrap().as_str(),
            "https://localhost:18094/"
        );
        assert!(tls.has(ServiceType::Views));
    }
}
