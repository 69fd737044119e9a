//! Axum HTTP server

use std::future::Future;
use std::net::SocketAddr;

use axum::http::{header, HeaderValue, Method};
use axum::{
    extract::Request,
    middleware::{self, Next},
    response::Response,
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};

use crate::hub::HubHandle;
use crate::{error::ControlError, Result};

use super::routes::build_router;
use super::websocket::ws_handler;

/// Application state shared across all requests
#[derive(Clone)]
pub struct AppState {
    pub hub: HubHandle,
}

/// Web server configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WebServerConfig {
    pub host: String,
    pub port: u16,
    pub enable_cors: bool,
    pub allowed_origins: Vec<String>,
    /// Path of the WebSocket endpoint
    pub ws_path: String,
}

fn default_allowed_origins() -> Vec<String> {
    vec!["*".to_string()]
}

impl Default for WebServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3001,
            enable_cors: true,
            allowed_origins: default_allowed_origins(),
            ws_path: "/ws".to_string(),
        }
    }
}

impl WebServerConfig {
    /// Create a new web server config
    pub fn new(port: u16) -> Self {
        Self {
            port,
            ..Default::default()
        }
    }

    /// Set the host address
    pub fn with_host(mut self, host: String) -> Self {
        self.host = host;
        self
    }

    /// Set CORS enabled/disabled
    pub fn with_cors(mut self, enable: bool) -> Self {
        self.enable_cors = enable;
        self
    }

    /// Set allowed origins for CORS
    pub fn with_allowed_origins(mut self, origins: Vec<String>) -> Self {
        self.allowed_origins = origins;
        self
    }

    /// Set the WebSocket path
    pub fn with_ws_path(mut self, path: impl Into<String>) -> Self {
        self.ws_path = path.into();
        self
    }

    /// Socket address to bind
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| ControlError::HttpError(format!("Invalid address: {}", e)))
    }
}

/// Web server for the REST API and the WebSocket endpoint
pub struct WebServer {
    config: WebServerConfig,
    hub: HubHandle,
}

impl WebServer {
    /// Create a web server in front of a running hub
    pub fn new(config: WebServerConfig, hub: HubHandle) -> Self {
        Self { config, hub }
    }

    /// Build the full application: API routes, WebSocket, middleware
    pub fn router(&self) -> Result<Router> {
        if !self.config.ws_path.starts_with('/') {
            return Err(ControlError::HttpError(format!(
                "WebSocket path must start with '/': {}",
                self.config.ws_path
            )));
        }

        let state = AppState {
            hub: self.hub.clone(),
        };

        let app = build_router()
            .route(&self.config.ws_path, get(ws_handler))
            .layer(middleware::from_fn(security_headers))
            .with_state(state);

        if !self.config.enable_cors {
            return Ok(app);
        }

        let cors_layer = CorsLayer::new()
            .allow_methods([Method::GET, Method::POST])
            .allow_headers([header::CONTENT_TYPE]);

        if self.config.allowed_origins.iter().any(|o| o == "*")
            || self.config.allowed_origins.is_empty()
        {
            Ok(app.layer(cors_layer.allow_origin(Any)))
        } else {
            let origins: Result<Vec<HeaderValue>> = self
                .config
                .allowed_origins
                .iter()
                .map(|o| {
                    o.parse::<HeaderValue>().map_err(|e| {
                        ControlError::HttpError(format!("Invalid origin header: {}", e))
                    })
                })
                .collect();

            Ok(app.layer(cors_layer.allow_origin(origins?)))
        }
    }

    /// Serve on an already bound listener until `shutdown` resolves
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let app = self.router()?;
        let addr = listener.local_addr()?;
        tracing::info!(
            "Web server listening on {} (WebSocket at {})",
            addr,
            self.config.ws_path
        );

        axum::serve(listener, app.into_make_service())
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| ControlError::HttpError(format!("Server error: {}", e)))?;

        tracing::info!("Web server stopped");
        Ok(())
    }

    /// Bind the configured address and serve until `shutdown` resolves
    pub async fn run<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = self.config.socket_addr()?;
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ControlError::HttpError(format!("Failed to bind {}: {}", addr, e)))?;
        self.serve(listener, shutdown).await
    }

    /// Spawn the server in a background task
    pub fn spawn<F>(self, shutdown: F) -> tokio::task::JoinHandle<Result<()>>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        tokio::spawn(async move { self.run(shutdown).await })
    }
}

/// Security headers middleware
async fn security_headers(req: Request, next: Next) -> Response {
    let mut response = next.run(req).await;
    let headers = response.headers_mut();

    headers.insert(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );
    headers.insert(header::X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));
    headers.insert(
        header::REFERRER_POLICY,
        HeaderValue::from_static("no-referrer"),
    );

    response
}
