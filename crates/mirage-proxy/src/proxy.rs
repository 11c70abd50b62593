//! Main proxy server implementation.
//!
//! Accepts Postgres wire connections and answers every query through the
//! shared [`DeceptionRouter`].

use crate::error::ProxyError;
use crate::handler::{MirageQueryHandler, MirageServerHandlers, PasswordStartupHandler, SessionContext};
use mirage_core::ProxyConfig;
use mirage_runtime::DeceptionRouter;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::RwLock;

/// The Postgres wire front end.
pub struct MirageProxy {
    config: ProxyConfig,
    router: Arc<DeceptionRouter>,
    password: Option<Arc<String>>,
}

impl MirageProxy {
    pub fn new(config: ProxyConfig, router: Arc<DeceptionRouter>) -> Self {
        let password = config.password.clone().map(Arc::new);
        Self {
            config,
            router,
            password,
        }
    }

    /// Get a reference to the proxy configuration.
    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }

    /// Handlers for one connection, each with its own session.
    fn create_connection_handlers(&self) -> Arc<MirageServerHandlers> {
        let session = Arc::new(RwLock::new(SessionContext::default()));

        let startup_handler = Arc::new(PasswordStartupHandler::new(
            self.password.clone(),
            session.clone(),
        ));
        let query_handler = Arc::new(MirageQueryHandler::new(self.router.clone(), session));

        Arc::new(MirageServerHandlers::new(query_handler, startup_handler))
    }

    /// Bind the configured address.
    pub async fn bind(&self) -> Result<TcpListener, ProxyError> {
        let listen_addr = self.config.listen_address();
        TcpListener::bind(&listen_addr)
            .await
            .map_err(|e| ProxyError::BindFailed {
                address: listen_addr.clone(),
                source: e,
            })
    }

    /// Bind and serve until the task is dropped.
    pub async fn run(&self) -> Result<(), ProxyError> {
        let listener = self.bind().await?;
        self.serve(listener).await
    }

    /// Serve connections from an already bound listener.
    pub async fn serve(&self, listener: TcpListener) -> Result<(), ProxyError> {
        let local: SocketAddr = listener.local_addr().map_err(ProxyError::Listener)?;
        tracing::info!(
            address = %local,
            password_required = self.password.is_some(),
            "Postgres front end listening"
        );

        loop {
            let (socket, peer_addr) = match listener.accept().await {
                Ok(conn) => conn,
                Err(e) => {
                    tracing::error!(error = %e, "Failed to accept connection");
                    continue;
                }
            };

            tracing::debug!(peer = %peer_addr, "New connection");

            let handlers = self.create_connection_handlers();

            tokio::spawn(async move {
                if let Err(e) = pgwire::tokio::process_socket(socket, None, handlers).await {
                    tracing::error!(peer = %peer_addr, error = ?e, "Connection error");
                }
            });
        }
    }
}
