//! Search cluster client
//!
//! [`SearchCluster`] is the seam between the REST layer and an Elasticsearch or
//! OpenSearch cluster. [`HttpCluster`] talks to a real cluster over HTTP; tests
//! substitute their own implementation.

pub mod client;
pub mod error;

pub use client::{ClusterInfo, ClusterVersion, HttpCluster, HttpClusterConfig, SearchCluster};
pub use error::{ClusterError, Result};
