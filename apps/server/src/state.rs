//! Shared application state
//!
//! Everything here is built once at startup and shared read-only across
//! requests: the resolved views, the cursor codec, the permission checker and
//! the cluster client (which owns the connection pool).

use std::sync::Arc;

use anyhow::Context;
use sieve_cluster::{HttpCluster, HttpClusterConfig, SearchCluster};
use sieve_query::{
    CursorCodec, HitSerializer, PaginationSettings, SourceSerializer, ViewConfig,
};

use crate::auth::ApiKeyAuth;
use crate::config::{Config, ObjectPermission, PermissionMode};

/// One resolved view and what it needs at request time.
pub struct ViewState {
    pub config: ViewConfig,
    pub serializer: Arc<dyn HitSerializer>,
    pub permission: PermissionMode,
    pub object_permission: Option<ObjectPermission>,
}

impl std::fmt::Debug for ViewState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ViewState")
            .field("name", &self.config.name)
            .field("index", &self.config.index)
            .field("permission", &self.permission)
            .finish_non_exhaustive()
    }
}

/// Registered views in declaration order.
#[derive(Debug, Default)]
pub struct ViewRegistry {
    views: Vec<Arc<ViewState>>,
}

impl ViewRegistry {
    /// Resolve every configured view; any invalid declaration fails the whole set.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let mut views = Vec::with_capacity(config.views.len());
        for entry in &config.views {
            let resolved = entry
                .definition
                .resolve()
                .with_context(|| format!("invalid view '{}'", entry.definition.name))?;
            tracing::debug!(
                view = %resolved.name,
                index = %resolved.index,
                document_type = resolved.document_type.as_deref().unwrap_or("-"),
                pagination = resolved.pagination.as_str(),
                backends = resolved.backends.len(),
                "resolved view"
            );
            views.push(Arc::new(ViewState {
                serializer: Arc::new(SourceSerializer::new(&resolved.serializer)),
                config: resolved,
                permission: entry.permission.unwrap_or(config.auth.mode),
                object_permission: entry.object_permission.clone(),
            }));
        }
        Ok(Self { views })
    }

    pub fn get(&self, name: &str) -> Option<Arc<ViewState>> {
        self.views.iter().find(|v| v.config.name == name).cloned()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.views.iter().map(|v| v.config.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.views.len()
    }

    pub fn is_empty(&self) -> bool {
        self.views.is_empty()
    }
}

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub cluster: Arc<dyn SearchCluster>,
    pub views: Arc<ViewRegistry>,
    pub cursor_codec: Option<Arc<CursorCodec>>,
    pub pagination: PaginationSettings,
    pub auth: Arc<ApiKeyAuth>,
}

impl AppState {
    /// Build the state with an HTTP client for the configured cluster.
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let cluster = HttpCluster::new(&HttpClusterConfig {
            url: config.cluster.url.clone(),
            username: config.cluster.username.clone(),
            password: config.cluster.password.clone(),
            timeout: config.cluster.timeout(),
        })
        .context("Failed to create search cluster client")?;
        Self::with_cluster(config, Arc::new(cluster))
    }

    /// Build the state around an existing cluster client.
    pub fn with_cluster(config: Config, cluster: Arc<dyn SearchCluster>) -> anyhow::Result<Self> {
        let views = ViewRegistry::from_config(&config)?;
        let cursor_codec = match config
            .pagination
            .cursor_secret
            .as_deref()
            .filter(|s| !s.is_empty())
        {
            Some(secret) => Some(Arc::new(
                CursorCodec::new(secret.as_bytes()).context("Invalid pagination.cursor_secret")?,
            )),
            None => None,
        };
        let auth = ApiKeyAuth::new(&config.auth)?;

        tracing::info!(views = views.len(), "Views registered");

        Ok(Self {
            pagination: config.pagination_settings(),
            config: Arc::new(config),
            cluster,
            views: Arc::new(views),
            cursor_codec,
            auth: Arc::new(auth),
        })
    }

    pub fn view(&self, name: &str) -> Option<Arc<ViewState>> {
        self.views.get(name)
    }
}
