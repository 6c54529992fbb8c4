//! Sieve - REST search views over a search cluster
//!
//! Each configured view exposes list, count, suggest, functional suggest,
//! retrieve and more-like-this endpoints. Query-string parameters are turned
//! into cluster searches by the view's backend chain (`sieve_query`) and run
//! through a [`sieve_cluster::SearchCluster`].

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod state;
pub mod views;

pub use config::Config;
pub use error::{Error, Result};
pub use state::AppState;
