//! HTTP server implementation.

use crate::error::ServerError;
use crate::routes;
use mirage_core::HttpConfig;
use mirage_runtime::DeceptionRouter;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

/// The HTTP/JSON front end.
pub struct HttpServer {
    config: HttpConfig,
    router: Arc<DeceptionRouter>,
}

impl HttpServer {
    pub fn new(config: HttpConfig, router: Arc<DeceptionRouter>) -> Self {
        Self { config, router }
    }

    pub fn config(&self) -> &HttpConfig {
        &self.config
    }

    pub async fn bind(&self) -> Result<TcpListener, ServerError> {
        TcpListener::bind(&self.config.bind)
            .await
            .map_err(|e| ServerError::BindFailed {
                address: self.config.bind.clone(),
                source: e,
            })
    }

    /// Bind and serve until the task is dropped.
    pub async fn run(&self) -> Result<(), ServerError> {
        let listener = self.bind().await?;
        self.serve(listener).await
    }

    pub async fn serve(&self, listener: TcpListener) -> Result<(), ServerError> {
        let local = listener.local_addr().map_err(ServerError::Serve)?;
        tracing::info!(address = %local, "HTTP front end listening");

        let app = routes::create_router(self.router.clone());
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .map_err(ServerError::Serve)
    }
}
