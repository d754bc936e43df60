use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{Router, middleware, routing::get};
use tower_http::trace::TraceLayer;

use rtg_graphql::TypeDictionary;

use crate::config::GatewayConfig;
use crate::handlers;
use crate::middleware as app_middleware;
use crate::upstream::UpstreamClient;

/// How long in-flight handlers get to finish after a shutdown signal.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<GatewayConfig>,
    /// Built once from introspection before the listener starts; read-only
    /// for the life of the process.
    pub dictionary: Arc<TypeDictionary>,
    pub upstream: UpstreamClient,
}

/// Builds the shared state: constructs the upstream client and performs
/// the startup introspection. Failure here is fatal; the gateway cannot
/// translate anything without a type dictionary.
pub async fn build_state(config: GatewayConfig) -> anyhow::Result<AppState> {
    let upstream = UpstreamClient::new(&config)?;
    let dictionary = upstream.introspect().await?;

    tracing::info!(
        upstream = %config.upstream_server,
        resource_types = dictionary.len(),
        healthcheck = %config.healthcheck_path,
        "introspection complete"
    );

    Ok(AppState {
        config: Arc::new(config),
        dictionary: Arc::new(dictionary),
        upstream,
    })
}

/// Assembles the router: an explicit healthcheck route, the dispatcher as
/// fallback, and the middleware stack (request id innermost, trace layer
/// outermost).
pub fn build_app(state: AppState) -> Router {
    let health_path: Arc<str> = Arc::from(state.config.healthcheck_path.as_str());

    Router::new()
        .route(&health_path, get(handlers::healthcheck))
        .fallback(handlers::dispatch)
        .layer(middleware::from_fn(app_middleware::request_id))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(move |req: &axum::http::Request<_>| {
                    // Healthcheck probes would flood the log otherwise.
                    if req.uri().path() == &*health_path {
                        return tracing::span!(tracing::Level::TRACE, "noop");
                    }
                    let request_id = req
                        .headers()
                        .get("x-request-id")
                        .and_then(|value| value.to_str().ok())
                        .unwrap_or("")
                        .to_string();
                    tracing::info_span!(
                        "http.request",
                        http.method = %req.method(),
                        http.target = %req.uri(),
                        request_id = %request_id
                    )
                })
                .on_response(
                    |res: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     span: &tracing::Span| {
                        if let Some(meta) = span.metadata() {
                            if meta.name() != "noop" {
                                tracing::info!(
                                    http.status = %res.status().as_u16(),
                                    elapsed_ms = %latency.as_millis(),
                                    "request handled"
                                );
                            }
                        }
                    },
                ),
        )
        .with_state(state)
}

pub struct ServerBuilder {
    config: GatewayConfig,
}

impl ServerBuilder {
    pub fn new() -> Self {
        Self {
            config: GatewayConfig::default(),
        }
    }

    pub fn with_config(mut self, config: GatewayConfig) -> Self {
        self.config = config;
        self
    }

    /// Builds the gateway, introspecting the upstream in the process.
    pub async fn build(self) -> anyhow::Result<GatewayServer> {
        tracing::info!(version = env!("CARGO_PKG_VERSION"), "FHIR RTG starting");
        let addr = self.config.addr();
        let state = build_state(self.config).await?;
        Ok(GatewayServer {
            addr,
            app: build_app(state),
        })
    }
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

pub struct GatewayServer {
    addr: SocketAddr,
    app: Router,
}

impl GatewayServer {
    /// Serves until SIGINT/SIGTERM, then drains in-flight handlers for at
    /// most [`SHUTDOWN_GRACE`] before closing.
    pub async fn run(self) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        tracing::info!(addr = %self.addr, "gateway listening");

        let (drain_tx, drain_rx) = tokio::sync::oneshot::channel::<()>();
        let serve = axum::serve(
            listener,
            self.app
                .into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown_signal(drain_tx))
        .into_future();
        let mut serve = std::pin::pin!(serve);

        tokio::select! {
            result = &mut serve => {
                result?;
                tracing::info!("gateway stopped");
            }
            _ = drain_deadline(drain_rx) => {
                tracing::warn!("in-flight requests did not drain in time, closing");
            }
        }
        Ok(())
    }
}

async fn shutdown_signal(drain_started: tokio::sync::oneshot::Sender<()>) {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };
    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(_) => std::future::pending().await,
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    tracing::info!("shutdown signal received");
    let _ = drain_started.send(());
}

/// Resolves [`SHUTDOWN_GRACE`] after the shutdown signal fires; pends
/// forever if it never does.
async fn drain_deadline(drain_started: tokio::sync::oneshot::Receiver<()>) {
    if drain_started.await.is_err() {
        std::future::pending::<()>().await;
    }
    tokio::time::sleep(SHUTDOWN_GRACE).await;
}
