//! ServerBuilder for fluent API to build HTTP servers

use super::handlers::AppState;
use super::router::build_routes;
use crate::config::{FeatureFlags, StaticFlags};
use crate::core::model::ModelRegistry;
use crate::core::store::{Datastore, PublicIdStore, RowStore, RowWriter};
use crate::ids::context::ResolutionContext;
use anyhow::{Result, anyhow};
use axum::Router;
use std::sync::Arc;
use tokio::net::TcpListener;

/// Builder for creating HTTP servers over a model registry and a store
///
/// # Example
///
/// ```ignore
/// let app = ServerBuilder::new()
///     .with_registry(registry.clone())
///     .with_store(Arc::new(InMemoryDatabase::new(registry)))
///     .with_flags(RuntimeFlags::new(true))
///     .build()?;
/// ```
pub struct ServerBuilder {
    registry: Option<Arc<ModelRegistry>>,
    rows: Option<Arc<dyn RowStore>>,
    mappings: Option<Arc<dyn PublicIdStore>>,
    writer: Option<Arc<dyn RowWriter>>,
    flags: Option<Arc<dyn FeatureFlags>>,
    custom_routes: Vec<Router>,
}

impl ServerBuilder {
    pub fn new() -> Self {
        Self {
            registry: None,
            rows: None,
            mappings: None,
            writer: None,
            flags: None,
            custom_routes: Vec::new(),
        }
    }

    /// Set the model registry (required)
    pub fn with_registry(mut self, registry: Arc<ModelRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Use one backend for rows, writes and mappings (required)
    pub fn with_store<S: Datastore + 'static>(mut self, store: Arc<S>) -> Self {
        let rows: Arc<dyn RowStore> = store.clone();
        let mappings: Arc<dyn PublicIdStore> = store.clone();
        let writer: Arc<dyn RowWriter> = store;
        self.rows = Some(rows);
        self.mappings = Some(mappings);
        self.writer = Some(writer);
        self
    }

    /// Feature flag source. Defaults to all flags off.
    pub fn with_flags(mut self, flags: impl FeatureFlags + 'static) -> Self {
        let flags: Arc<dyn FeatureFlags> = Arc::new(flags);
        self.flags = Some(flags);
        self
    }

    /// Add custom routes to the server
    pub fn with_custom_routes(mut self, routes: Router) -> Self {
        self.custom_routes.push(routes);
        self
    }

    /// Build the shared handler state
    pub fn build_state(&mut self) -> Result<AppState> {
        let registry = self
            .registry
            .take()
            .ok_or_else(|| anyhow!("ModelRegistry is required. Call .with_registry()"))?;
        let (Some(rows), Some(mappings), Some(writer)) =
            (self.rows.take(), self.mappings.take(), self.writer.take())
        else {
            return Err(anyhow!("A store is required. Call .with_store()"));
        };
        let flags = self
            .flags
            .take()
            .unwrap_or_else(|| Arc::new(StaticFlags::new()) as Arc<dyn FeatureFlags>);

        let ctx = ResolutionContext::new(registry, rows, mappings, flags);
        Ok(AppState::new(ctx, writer))
    }

    /// Build the final router
    pub fn build(mut self) -> Result<Router> {
        let state = self.build_state()?;
        let mut app = build_routes(state);
        for custom in std::mem::take(&mut self.custom_routes) {
            app = app.merge(custom);
        }
        Ok(app)
    }

    /// Serve the application with graceful shutdown
    ///
    /// ```ignore
    /// ServerBuilder::new()
    ///     .with_registry(registry)
    ///     .with_store(store)
    ///     .serve("127.0.0.1:3000").await?;
    /// ```
    pub async fn serve(self, addr: &str) -> Result<()> {
        let app = self.build()?;
        let listener = TcpListener::bind(addr).await?;

        tracing::info!("Server listening on {}", addr);

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        tracing::info!("Server shutdown complete");
        Ok(())
    }
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal, initiating graceful shutdown...");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM signal, initiating graceful shutdown...");
        },
    }
}
