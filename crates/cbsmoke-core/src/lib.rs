//! # cbsmoke-core
//!
//! Core library for the cbsmoke CLI providing:
//! - Readiness polling with a deadline and a fixed inter-attempt delay
//! - Connection string parsing and the immutable connection record
//! - Runtime configuration (timeouts and poll policies) loaded from YAML

pub mod config;
pub mod error;
pub mod poll;

pub use config::{
    ConnectionConfig, ConnectionString, HostPort, Network, PollPolicy, RuntimeConfig, Scheme,
};
pub use error::{Error, Result};
pub use poll::{poll_until_ready, ReadinessPoller, ReadinessPollerBuilder};
