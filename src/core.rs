use crate::{
    api,
    app::AppContext,
    config::Config,
    health::health_routes,
    http::RouteModule,
    middleware::{MakeRequestUuid, REQUEST_ID_HEADER},
};
use axum::{Router, extract::DefaultBodyLimit};
use std::time::Duration;
use tokio::signal;
use tower_http::request_id::{PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

/// API routes are mounted under this prefix.
pub const API_PREFIX: &str = "/api";

/// Main application structure
pub struct App {
    router: Router<AppContext>,
    api: Router<AppContext>,
    config: Config,
    context: AppContext,
}

impl App {
    /// Application with every billing API module and `/health`.
    pub fn new(config: Config, context: AppContext) -> Self {
        Self::bare(config, context)
            .register_module(api::AuthModule)
            .register_module(api::AccountsModule)
            .register_module(api::TenantsModule)
            .register_module(api::PlansModule)
            .register_module(api::SubscriptionsModule)
            .register_module(api::BillingModule)
    }

    /// Application with only `/health`.
    pub fn bare(config: Config, context: AppContext) -> Self {
        Self {
            router: health_routes(),
            api: Router::new(),
            config,
            context,
        }
    }

    /// Mount a route module under [`API_PREFIX`].
    pub fn register_module<M: RouteModule>(mut self, module: M) -> Self {
        self.api = module.register(self.api);
        self
    }

    pub fn context(&self) -> &AppContext {
        &self.context
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Fully layered router with state applied.
    pub fn into_router(self) -> Router {
        self.router
            .nest(API_PREFIX, self.api)
            .layer(DefaultBodyLimit::max(self.config.server.max_body_size))
            .layer(TraceLayer::new_for_http())
            .layer(PropagateRequestIdLayer::new(REQUEST_ID_HEADER))
            .layer(SetRequestIdLayer::new(REQUEST_ID_HEADER, MakeRequestUuid))
            .with_state(self.context)
    }

    /// Serve on the configured address until Ctrl+C or SIGTERM.
    pub async fn serve(self) -> Result<(), std::io::Error> {
        let addr = self
            .config
            .server
            .addr()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;

        let listener = tokio::net::TcpListener::bind(addr).await?;

        tracing::info!("Server starting on http://{}", addr);
        tracing::info!("Health check available at http://{}/health", addr);

        self.serve_with_listener(listener, shutdown_signal()).await
    }

    /// Serve on an already bound listener until `shutdown` resolves.
    pub async fn serve_with_listener<F>(self, listener: tokio::net::TcpListener, shutdown: F) -> Result<(), std::io::Error>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        axum::serve(listener, self.into_router())
            .with_graceful_shutdown(shutdown)
            .await
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
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
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal, starting graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received terminate signal, starting graceful shutdown");
        },
    }

    // Give connections a grace period to close
    tokio::time::sleep(Duration::from_secs(1)).await;
    tracing::info!("Shutdown complete");
}
