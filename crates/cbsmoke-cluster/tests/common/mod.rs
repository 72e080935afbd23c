//! Common test infrastructure for cbsmoke-cluster tests
//!
//! # Usage
//!
//! ```ignore
//! mod common;
//! use common::*;
//! ```

#![allow(dead_code)]
#![allow(unused_imports)]

pub mod mock_server;

pub use mock_server::*;

pub const USERNAME: &str = "Administrator";
pub const PASSWORD: &str = "password";
pub const BUCKET: &str = "travel-sample";
