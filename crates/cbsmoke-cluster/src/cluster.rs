//! Cluster session over the REST services
//!
//! A `Cluster` starts out addressing every service on the bootstrap host at
//! its well-known port. `wait_until_ready` replaces that guess with the
//! topology advertised by the management service.

use std::fs;
use std::future::Future;
use std::time::Duration;

use cbsmoke_core::poll::{ReadinessPoller, ReadinessPollerBuilder, TracingObserver};
use cbsmoke_core::{ConnectionConfig, Network, PollPolicy, RuntimeConfig};
use reqwest::{Client, Method, RequestBuilder};
use serde::Deserialize;
use tokio::sync::{watch, Mutex};
use tracing::{debug, info};
use url::Url;

use crate::error::{ClusterError, Result};
use crate::service::{ServiceMap, ServiceType};

/// Credentials and transport settings for a session
#[derive(Clone)]
pub struct ClusterOptions {
    pub username: String,
    pub password: String,
    /// Extra trust anchor in PEM form
    pub ca_certificate: Option<Vec<u8>>,
    pub request_timeout: Duration,
    pub tls: bool,
    /// Which advertised node addresses to route services through
    pub network: Network,
}

impl std::fmt::Debug for ClusterOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClusterOptions")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("ca_certificate", &self.ca_certificate.as_ref().map(|c| c.len()))
            .field("request_timeout", &self.request_timeout)
            .field("tls", &self.tls)
            .field("network", &self.network)
            .finish()
    }
}

impl ClusterOptions {
    /// Build options from the connection record, reading the CA file if one
    /// was given
    pub fn from_config(config: &ConnectionConfig, runtime: &RuntimeConfig) -> Result<Self> {
        let ca_certificate = match config.ca_file() {
            Some(path) => {
                let pem = fs::read(path).map_err(|e| ClusterError::Certificate {
                    path: path.display().to_string(),
                    message: e.to_string(),
                })?;
                debug!("Loaded CA certificate from {}", path.display());
                Some(pem)
            }
            None => None,
        };

        Ok(Self {
            username: config.username.clone(),
            password: config.password.clone(),
            ca_certificate,
            request_timeout: runtime.request_timeout(),
            tls: config.tls_enabled(),
            network: config.connection.network(),
        })
    }
}

/// An authenticated session against one cluster
pub struct Cluster {
    client: Client,
    username: String,
    password: String,
    tls: bool,
    network: Network,
    bootstrap_host: String,
    management: Url,
    services: ServiceMap,
    cancel: Option<watch::Receiver<bool>>,
}

impl std::fmt::Debug for Cluster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cluster")
            .field("username", &self.username)
            .field("management", &self.management.as_str())
            .field("tls", &self.tls)
            .finish_non_exhaustive()
    }
}

impl Cluster {
    /// Open a session. No request is sent until the first operation.
    pub fn connect(config: &ConnectionConfig, runtime: &RuntimeConfig) -> Result<Self> {
        let options = ClusterOptions::from_config(config, runtime)?;
        let (seed, mgmt_port) = config.connection.bootstrap(options.tls);
        Self::with_options(&seed.host, mgmt_port, options)
    }

    /// Open a session against `host:mgmt_port`
    pub fn with_options(host: &str, mgmt_port: u16, options: ClusterOptions) -> Result<Self> {
        let mut builder = Client::builder()
            .timeout(options.request_timeout)
            .user_agent(format!("cbsmoke/{}", env!("CARGO_PKG_VERSION")));

        if let Some(pem) = &options.ca_certificate {
            let cert = reqwest::Certificate::from_pem(pem).map_err(|e| ClusterError::Certificate {
                path: "<pem>".to_string(),
                message: e.to_string(),
            })?;
            builder = builder.add_root_certificate(cert);
        }

        let client = builder
            .build()
            .map_err(|e| ClusterError::Config(format!("failed to build HTTP client: {}", e)))?;

        let services = ServiceMap::fallback(host, mgmt_port, options.tls)?;
        let management = services.endpoint(ServiceType::Management)?.clone();

        info!(
            "Connecting to {} ({})",
            management,
            if options.tls { "tls" } else { "plain" }
        );

        Ok(Self {
            client,
            username: options.username,
            password: options.password,
            tls: options.tls,
            network: options.network,
            bootstrap_host: host.to_string(),
            management,
            services,
            cancel: None,
        })
    }

    /// Interrupt readiness waits once `cancel` carries `true`
    pub fn with_cancellation(mut self, cancel: watch::Receiver<bool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn services(&self) -> &ServiceMap {
        &self.services
    }

    pub fn tls(&self) -> bool {
        self.tls
    }

    /// Handle for bucket-scoped readiness checks
    pub fn bucket(&self, name: impl Into<String>) -> Bucket<'_> {
        Bucket {
            cluster: self,
            name: name.into(),
        }
    }

    /// Poll the management service until it reports the cluster topology,
    /// then route every service through the advertised endpoints.
    pub async fn wait_until_ready(&mut self, timeout: Duration) -> Result<()> {
        let slot: Mutex<Option<ServiceMap>> = Mutex::new(None);
        {
            let this: &Self = self;
            let slot = &slot;
            this.wait_for(timeout, "cluster topology", || async move {
                let map = this.fetch_topology().await?;
                *slot.lock().await = Some(map);
                Ok::<_, ClusterError>(())
            })
            .await?;
        }

        if let Some(map) = slot.into_inner() {
            for service in ServiceType::ALL {
                if !map.has(service) {
                    debug!("{} service not advertised by any node", service);
                }
            }
            self.services = map;
        }
        info!("Cluster ready");
        Ok(())
    }

    async fn fetch_topology(&self) -> Result<ServiceMap> {
        let url = join(&self.management, &["pools", "default", "nodeServices"])?;
        let body = self
            .send(ServiceType::Management, self.client.get(url))
            .await?;
        ServiceMap::from_node_services(&body, &self.bootstrap_host, self.tls, self.network)
    }

    /// Poll `probe` until it succeeds. A rejected login ends the wait at
    /// once with that error.
    async fn wait_for<F, Fut>(
        &self,
        timeout: Duration,
        resource: &str,
        mut probe: F,
    ) -> Result<()>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<()>>,
    {
        let rejected: Mutex<Option<ClusterError>> = Mutex::new(None);
        {
            let rejected = &rejected;
            self.poller(timeout, resource)
                .poll(|| {
                    let attempt = probe();
                    async move {
                        match attempt.await {
                            Err(e) if e.is_auth_failure() => {
                                *rejected.lock().await = Some(e);
                                Ok(())
                            }
                            other => other,
                        }
                    }
                })
                .await?;
        }

        match rejected.into_inner() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn poller(&self, timeout: Duration, resource: &str) -> ReadinessPoller<TracingObserver> {
        let mut builder = ReadinessPollerBuilder::new()
            .with_policy(PollPolicy::with_timeout(timeout))
            .with_observer(TracingObserver::new(resource));
        if let Some(cancel) = &self.cancel {
            builder = builder.with_cancellation(cancel.clone());
        }
        builder.build()
    }

    /// URL for `segments` below the base of `service`
    pub(crate) fn url(&self, service: ServiceType, segments: &[&str]) -> Result<Url> {
        join(self.services.endpoint(service)?, segments)
    }

    pub(crate) fn request(&self, method: Method, url: Url) -> RequestBuilder {
        self.client.request(method, url)
    }

    /// Send an authenticated request and return status and body
    pub(crate) async fn execute(
        &self,
        service: ServiceType,
        request: RequestBuilder,
    ) -> Result<(u16, Vec<u8>)> {
        let response = request
            .basic_auth(&self.username, Some(&self.password))
            .send()
            .await
            .map_err(|source| ClusterError::Http { service, source })?;

        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|source| ClusterError::Http { service, source })?
            .to_vec();

        debug!("{} service answered HTTP {} ({} bytes)", service, status, body.len());
        Ok((status, body))
    }

    /// Like `execute`, but any non-2xx status becomes `ClusterError::Service`
    pub(crate) async fn send(
        &self,
        service: ServiceType,
        request: RequestBuilder,
    ) -> Result<Vec<u8>> {
        let (status, body) = self.execute(service, request).await?;
        if !(200..300).contains(&status) {
            return Err(ClusterError::Service {
                service,
                status,
                body: String::from_utf8_lossy(&body).into_owned(),
            });
        }
        Ok(body)
    }
}

fn join(base: &Url, segments: &[&str]) -> Result<Url> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|_| ClusterError::Config(format!("{} cannot be a base URL", base)))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

#[derive(Debug, Deserialize)]
struct BucketInfo {
    #[serde(default)]
    nodes: Vec<BucketNode>,
}

#[derive(Debug, Deserialize)]
struct BucketNode {
    #[serde(default)]
    hostname: String,
    #[serde(default)]
    status: String,
}

/// A bucket on a connected cluster
#[derive(Debug)]
pub struct Bucket<'a> {
    cluster: &'a Cluster,
    name: String,
}

impl Bucket<'_> {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Poll until every node serving the bucket reports healthy
    pub async fn wait_until_ready(&self, timeout: Duration) -> Result<()> {
        let resource = format!("bucket {}", self.name);
        self.cluster
            .wait_for(timeout, &resource, || self.check_ready())
            .await?;
        info!("Bucket {} ready", self.name);
        Ok(())
    }

    async fn check_ready(&self) -> Result<()> {
        let url = self.cluster.url(
            ServiceType::Management,
            &["pools", "default", "buckets", &self.name],
        )?;
        let body = self
            .cluster
            .send(ServiceType::Management, self.cluster.request(Method::GET, url))
            .await?;

        let info: BucketInfo =
            serde_json::from_slice(&body).map_err(|source| ClusterError::Decode {
                service: ServiceType::Management,
                source,
            })?;

        if info.nodes.is_empty() {
            return Err(ClusterError::BucketNotReady {
                bucket: self.name.clone(),
                reason: "no nodes serve the bucket yet".to_string(),
            });
        }

        if let Some(node) = info.nodes.iter().find(|n| n.status != "healthy") {
            return Err(ClusterError::BucketNotReady {
                bucket: self.name.clone(),
                reason: format!("node {} is {}", node.hostname, node.status),
            });
        }

        Ok(())
    }
}
