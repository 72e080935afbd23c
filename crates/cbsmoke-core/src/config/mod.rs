//! Connection and runtime configuration
//!
//! `ConnectionConfig` is built once from command-line arguments and passed by
//! reference to whatever establishes the cluster session. `RuntimeConfig`
//! carries timeouts and poll policies and may be loaded from a YAML file.

mod connection;
mod runtime;

pub use connection::{ConnectionConfig, ConnectionString, HostPort, Network, Scheme};
pub use runtime::{PollPolicy, RuntimeConfig};
