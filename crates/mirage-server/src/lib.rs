//! # mirage-server
//!
//! HTTP/JSON front end for Mirage.
//!
//! - `POST /query` with `{"query": "..."}` returns the record array, or
//!   `403`/`502` with `{"error": "..."}` for the two caller-visible errors.
//! - `GET /healthz` returns `{"ok": true}`.

pub mod error;
pub mod routes;
pub mod server;

pub use error::{QueryFailure, ServerError};
pub use routes::{QueryRequest, create_router};
pub use server::HttpServer;

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::Router;
    use axum::body::Body;
    use axum::extract::connect_info::MockConnectInfo;
    use axum::http::{Request, StatusCode};
    use mirage_audit::{AuditEventKind, AuditLogger, MemoryStorage};
    use mirage_core::{AuditConfig, MirageConfig, SourceMode, StoreRow};
    use mirage_runtime::{
        BackendError, DeceptionRouter, GenerativeBackend, RowStore, StoreError,
    };
    use serde_json::{Value, json};
    use std::net::SocketAddr;
    use std::sync::Arc;
    use tower::ServiceExt;

    struct Store {
        fail: bool,
    }

    #[async_trait]
    impl RowStore for Store {
        async fn fetch(&self, _sql: &str) -> Result<Vec<StoreRow>, StoreError> {
            if self.fail {
                return Err(StoreError::Query("syntax error at or near \"FORM\"".to_string()));
            }
            Ok(vec![StoreRow::new().with("id", json!(1)).with("name", json!("Alice"))])
        }

        fn label(&self) -> String {
            "fake".to_string()
        }
    }

    struct Silent;

    #[async_trait]
    impl GenerativeBackend for Silent {
        async fn generate(&self, _prompt: &str, _stream: bool) -> Result<String, BackendError> {
            Ok("Sorry, no data.".to_string())
        }

        fn label(&self) -> String {
            "silent".to_string()
        }
    }

    fn app(fail: bool) -> (Router, Arc<MemoryStorage>) {
        let events = Arc::new(MemoryStorage::new());
        let audit = Arc::new(AuditLogger::with_storage(
            AuditConfig {
                source_mode: SourceMode::Obfuscated,
                ..Default::default()
            },
            events.clone(),
        ));
        let router = Arc::new(DeceptionRouter::from_config(
            &MirageConfig::default(),
            Arc::new(Store { fail }),
            Arc::new(Silent),
            audit,
        ));
        let peer: SocketAddr = "198.51.100.23:40000".parse().unwrap();
        (create_router(router).layer(MockConnectInfo(peer)), events)
    }

    async fn post_query(app: Router, sql: &str) -> (StatusCode, Value) {
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/query")
                    .header("content-type", "application/json")
                    .body(Body::from(json!({ "query": sql }).to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let (app, _) = app(false);
        let response = app
            .oneshot(Request::builder().uri("/healthz").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_benign_query_returns_records() {
        let (app, events) = app(false);
        let (status, body) = post_query(app, "SELECT * FROM users WHERE id = 1").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!([{"id": 1, "name": "Alice", "email": null, "department": null, "access_level": null}])
        );
        let events = events.events();
        assert_eq!(events[0].event_type, AuditEventKind::Normal);
        assert_eq!(events[0].source_ip, "198.51.100.x");
    }

    #[tokio::test]
    async fn test_failed_deception_looks_like_empty_result() {
        let (app, events) = app(false);
        let (status, body) = post_query(app, "SELECT * FROM users UNION SELECT 1,2,3,4,5").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!([]));
        assert_eq!(events.events()[0].event_type, AuditEventKind::AttackRedirect);
    }

    #[tokio::test]
    async fn test_write_is_forbidden() {
        let (app, _) = app(false);
        let (status, body) = post_query(app, "INSERT INTO users VALUES (9)").await;

        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"], "ERROR: read-only mode, statement not permitted");
    }

    #[tokio::test]
    async fn test_store_failure_is_bad_gateway() {
        let (app, _) = app(true);
        let (status, body) = post_query(app, "SELECT * FORM users").await;

        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["error"], "database error: syntax error at or near \"FORM\"");
    }
}
