//! Mock cluster helpers
//!
//! Every service is served by the same wiremock instance; the topology
//! response advertises the mock's port for all of them.

use std::time::Duration;

use cbsmoke_cluster::{Cluster, ClusterOptions};
use cbsmoke_core::Network;
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use super::{PASSWORD, USERNAME};

/// nodeServices payload routing every service to `port` on the bootstrap host
pub fn topology_body(port: u16) -> serde_json::Value {
    json!({
        "rev": 1,
        "nodesExt": [{
            "hostname": "$HOST",
            "thisNode": true,
            "services": {
                "mgmt": port,
                "kv": 11210,
                "n1ql": port,
                "cbas": port,
                "fts": port,
                "capi": port
            }
        }]
    })
}

pub fn options() -> ClusterOptions {
    ClusterOptions {
        username: USERNAME.to_string(),
        password: PASSWORD.to_string(),
        ca_certificate: None,
        request_timeout: Duration::from_secs(5),
        tls: false,
        network: Network::Default,
    }
}

/// Mount a healthy topology endpoint
pub async fn mock_topology(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/pools/default/nodeServices"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(topology_body(server.address().port())),
        )
        .mount(server)
        .await;
}

/// Topology endpoint that answers 503 for the first `fail_count` requests
pub async fn mock_flaky_topology(server: &MockServer, fail_count: u64) {
    Mock::given(method("GET"))
        .and(path("/pools/default/nodeServices"))
        .respond_with(ResponseTemplate::new(503).set_body_string("warming up"))
        .up_to_n_times(fail_count)
        .mount(server)
        .await;

    mock_topology(server).await;
}

/// Session against `server` with services not yet discovered
pub fn cluster_for(server: &MockServer) -> Cluster {
    Cluster::with_options("127.0.0.1", server.address().port(), options())
        .expect("cluster should build")
}

/// Session against `server` with topology already discovered
pub async fn connected_cluster(server: &MockServer) -> Cluster {
    mock_topology(server).await;
    let mut cluster = cluster_for(server);
    cluster
        .wait_until_ready(Duration::from_secs(2))
        .await
        .expect("topology should load");
    cluster
}
