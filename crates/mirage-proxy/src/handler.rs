//! Connection handler for the Postgres wire protocol front end.
//!
//! Every simple query goes through the [`DeceptionRouter`]. Both paths
//! produce the same row description for a given table, so a client cannot
//! tell a fabricated result set from a real one.

use async_trait::async_trait;
use futures::Sink;
use futures::sink::SinkExt;
use futures::stream;
use mirage_core::{ExecutionError, Query, ResponseEnvelope};
use mirage_runtime::DeceptionRouter;
use pgwire::api::auth::{
    DefaultServerParameterProvider, StartupHandler, finish_authentication, protocol_negotiation,
    save_startup_parameters_to_metadata,
};
use pgwire::api::query::SimpleQueryHandler;
use pgwire::api::results::{DataRowEncoder, FieldFormat, FieldInfo, QueryResponse, Response};
use pgwire::api::{ClientInfo, ClientPortalStore, PgWireConnectionState, PgWireServerHandlers, Type};
use pgwire::error::{ErrorInfo, PgWireError, PgWireResult};
use pgwire::messages::startup::Authentication;
use pgwire::messages::{PgWireBackendMessage, PgWireFrontendMessage};
use serde_json::Value;
use std::fmt::Debug;
use std::net::SocketAddr;
use std::sync::Arc;
use subtle::ConstantTimeEq;
use tokio::sync::RwLock;

/// SQLSTATE for statements refused by the read-only store.
pub const SQLSTATE_READ_ONLY: &str = "25006";
/// SQLSTATE for store failures.
pub const SQLSTATE_INTERNAL: &str = "XX000";

/// Session state for a connected client.
#[derive(Debug, Clone)]
pub struct SessionContext {
    /// User name from the startup packet.
    pub user: Option<String>,
    /// Client address.
    pub client_addr: Option<SocketAddr>,
    /// Connection ID.
    pub connection_id: String,
}

impl Default for SessionContext {
    fn default() -> Self {
        Self {
            user: None,
            client_addr: None,
            connection_id: uuid::Uuid::new_v4().to_string(),
        }
    }
}

/// Cleartext password startup handler.
///
/// Accepts any password unless one is configured.
pub struct PasswordStartupHandler {
    password: Option<Arc<String>>,
    session: Arc<RwLock<SessionContext>>,
    parameter_provider: DefaultServerParameterProvider,
}

impl PasswordStartupHandler {
    pub fn new(password: Option<Arc<String>>, session: Arc<RwLock<SessionContext>>) -> Self {
        Self {
            password,
            session,
            parameter_provider: DefaultServerParameterProvider::default(),
        }
    }

    fn accepts(&self, presented: &str) -> bool {
        self.password.as_deref().is_none_or(|expected| {
            bool::from(expected.as_bytes().ct_eq(presented.as_bytes()))
        })
    }
}

#[async_trait]
impl StartupHandler for PasswordStartupHandler {
    async fn on_startup<C>(
        &self,
        client: &mut C,
        message: PgWireFrontendMessage,
    ) -> PgWireResult<()>
    where
        C: ClientInfo + Sink<PgWireBackendMessage> + Unpin + Send + Sync,
        C::Error: Debug,
        PgWireError: From<<C as Sink<PgWireBackendMessage>>::Error>,
    {
        match message {
            PgWireFrontendMessage::Startup(ref startup) => {
                protocol_negotiation(client, startup).await?;
                save_startup_parameters_to_metadata(client, startup);
                client.set_state(PgWireConnectionState::AuthenticationInProgress);
                client
                    .send(PgWireBackendMessage::Authentication(
                        Authentication::CleartextPassword,
                    ))
                    .await?;
            }
            PgWireFrontendMessage::PasswordMessageFamily(pwd) => {
                let password_msg = pwd.into_password()?;
                let user = client.metadata().get("user").cloned();

                if !self.accepts(&password_msg.password) {
                    tracing::warn!(user = ?user, peer = %client.socket_addr(), "Password rejected");
                    return Err(PgWireError::InvalidPassword(
                        user.unwrap_or_else(|| "unknown".to_string()),
                    ));
                }

                {
                    let mut session = self.session.write().await;
                    session.user = user;
                    session.client_addr = Some(client.socket_addr());
                    tracing::debug!(
                        connection_id = %session.connection_id,
                        user = ?session.user,
                        "Client authenticated"
                    );
                }

                finish_authentication(client, &self.parameter_provider).await?;
            }
            _ => {}
        }
        Ok(())
    }
}

/// Routes every simple query through the deception router.
pub struct MirageQueryHandler {
    router: Arc<DeceptionRouter>,
    session: Arc<RwLock<SessionContext>>,
}

impl MirageQueryHandler {
    pub fn new(router: Arc<DeceptionRouter>, session: Arc<RwLock<SessionContext>>) -> Self {
        Self { router, session }
    }

    async fn peer(&self) -> Option<std::net::IpAddr> {
        self.session.read().await.client_addr.map(|addr| addr.ip())
    }
}

#[async_trait]
impl SimpleQueryHandler for MirageQueryHandler {
    async fn do_query<C>(&self, _client: &mut C, query: &str) -> PgWireResult<Vec<Response>>
    where
        C: ClientInfo + ClientPortalStore + Sink<PgWireBackendMessage> + Unpin + Send + Sync,
        C::Error: Debug,
        PgWireError: From<<C as Sink<PgWireBackendMessage>>::Error>,
    {
        let peer = self.peer().await;

        match self.router.handle(Query::new(query), peer).await {
            Ok(envelope) => {
                let fields: Vec<FieldInfo> = envelope
                    .columns()
                    .iter()
                    .map(|name| FieldInfo::new(name.clone(), None, None, Type::TEXT, FieldFormat::Text))
                    .collect();
                let schema = Arc::new(fields);

                let rows: Vec<PgWireResult<pgwire::messages::data::DataRow>> = text_rows(&envelope)
                    .into_iter()
                    .map(|row| {
                        let mut encoder = DataRowEncoder::new(schema.clone());
                        for value in row {
                            encoder.encode_field(&value)?;
                        }
                        Ok(encoder.take_row())
                    })
                    .collect();

                Ok(vec![Response::Query(QueryResponse::new(
                    schema,
                    stream::iter(rows),
                ))])
            }
            Err(e) => Err(PgWireError::UserError(Box::new(error_info(&e)))),
        }
    }
}

/// Render each record as text columns, `null` as SQL NULL.
pub fn text_rows(envelope: &ResponseEnvelope) -> Vec<Vec<Option<String>>> {
    envelope
        .records()
        .iter()
        .map(|record| record.values().map(text_value).collect())
        .collect()
}

fn text_value(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Wire error for a caller-visible execution error.
pub fn error_info(error: &ExecutionError) -> ErrorInfo {
    let code = match error {
        ExecutionError::WriteNotPermitted => SQLSTATE_READ_ONLY,
        ExecutionError::BackendExecution(_) => SQLSTATE_INTERNAL,
    };
    ErrorInfo::new("ERROR".to_owned(), code.to_owned(), error.to_string())
}

/// Server handlers implementation for pgwire 0.37.
pub struct MirageServerHandlers {
    query_handler: Arc<MirageQueryHandler>,
    startup_handler: Arc<PasswordStartupHandler>,
}

impl MirageServerHandlers {
    pub fn new(
        query_handler: Arc<MirageQueryHandler>,
        startup_handler: Arc<PasswordStartupHandler>,
    ) -> Self {
        Self {
            query_handler,
            startup_handler,
        }
    }
}

impl PgWireServerHandlers for MirageServerHandlers {
    fn simple_query_handler(&self) -> Arc<impl SimpleQueryHandler> {
        self.query_handler.clone()
    }

    fn startup_handler(&self) -> Arc<impl StartupHandler> {
        self.startup_handler.clone()
    }
}
