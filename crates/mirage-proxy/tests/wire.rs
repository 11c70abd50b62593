//! Drives the Postgres front end with an ordinary Postgres client.
//!
//! Collaborators are in-process fakes, so no real database or model is
//! needed.

use async_trait::async_trait;
use mirage_audit::{AuditEventKind, AuditLogger, MemoryStorage};
use mirage_core::{AuditConfig, MirageConfig, ProxyConfig, StoreRow};
use mirage_proxy::MirageProxy;
use mirage_runtime::{BackendError, DeceptionRouter, GenerativeBackend, RowStore, StoreError};
use sqlx::postgres::{PgConnectOptions, PgSslMode};
use sqlx::{ConnectOptions, Connection, PgConnection, Row};
use std::net::SocketAddr;
use std::sync::Arc;

struct OneUser;

#[async_trait]
impl RowStore for OneUser {
    async fn fetch(&self, _sql: &str) -> Result<Vec<StoreRow>, StoreError> {
        Ok(vec![
            StoreRow::new()
                .with("id", serde_json::json!(1))
                .with("name", serde_json::json!("Alice Admin"))
                .with("email", serde_json::json!("alice@corp.example"))
                .with("department", serde_json::json!("Security"))
                .with("access_level", serde_json::json!(10)),
        ])
    }

    fn label(&self) -> String {
        "fake".to_string()
    }
}

struct Fabricator;

#[async_trait]
impl GenerativeBackend for Fabricator {
    async fn generate(&self, _prompt: &str, _stream: bool) -> Result<String, BackendError> {
        Ok(r#"[{"id": 77, "name": "이영희", "email": "yh.lee@corp.example", "department": "Legal", "access_level": 4}]"#.to_string())
    }

    fn label(&self) -> String {
        "fake-llm".to_string()
    }
}

async fn start(password: Option<&str>) -> (SocketAddr, Arc<MemoryStorage>) {
    let events = Arc::new(MemoryStorage::new());
    let audit = Arc::new(AuditLogger::with_storage(AuditConfig::default(), events.clone()));
    let router = Arc::new(DeceptionRouter::from_config(
        &MirageConfig::default(),
        Arc::new(OneUser),
        Arc::new(Fabricator),
        audit,
    ));

    let proxy = MirageProxy::new(
        ProxyConfig {
            listen_addr: "127.0.0.1".to_string(),
            listen_port: 0,
            password: password.map(str::to_string),
            ..Default::default()
        },
        router,
    );
    let listener = proxy.bind().await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = proxy.serve(listener).await;
    });
    (addr, events)
}

fn options(addr: SocketAddr, password: &str) -> PgConnectOptions {
    PgConnectOptions::new()
        .host(&addr.ip().to_string())
        .port(addr.port())
        .username("analyst")
        .password(password)
        .database("corp")
        .ssl_mode(PgSslMode::Disable)
}

#[tokio::test]
async fn real_and_fabricated_rows_look_alike() {
    let (addr, events) = start(None).await;
    let mut conn = options(addr, "whatever").connect().await.unwrap();

    let real = sqlx::raw_sql("SELECT * FROM users WHERE id = 1")
        .fetch_all(&mut conn)
        .await
        .unwrap();
    let fake = sqlx::raw_sql("SELECT * FROM users WHERE email = 'x' OR 1=1")
        .fetch_all(&mut conn)
        .await
        .unwrap();

    assert_eq!(real.len(), 1);
    assert_eq!(fake.len(), 1);
    assert_eq!(real[0].try_get::<String, _>("name").unwrap(), "Alice Admin");
    assert_eq!(fake[0].try_get::<String, _>("name").unwrap(), "이영희");
    assert_eq!(fake[0].try_get::<String, _>("access_level").unwrap(), "4");

    let real_columns: Vec<_> = real[0].columns().iter().map(sqlx::Column::name).collect();
    let fake_columns: Vec<_> = fake[0].columns().iter().map(sqlx::Column::name).collect();
    assert_eq!(real_columns, fake_columns);

    let kinds: Vec<_> = events.events().iter().map(|e| e.event_type).collect();
    assert_eq!(kinds, vec![AuditEventKind::Normal, AuditEventKind::AttackRedirect]);

    conn.close().await.unwrap();
}

#[tokio::test]
async fn write_is_refused_with_read_only_sqlstate() {
    let (addr, _events) = start(None).await;
    let mut conn = options(addr, "whatever").connect().await.unwrap();

    let err = sqlx::raw_sql("DELETE FROM users WHERE id = 3")
        .execute(&mut conn)
        .await
        .unwrap_err();
    let db = err.as_database_error().unwrap();
    assert_eq!(db.code().as_deref(), Some("25006"));
}

#[tokio::test]
async fn configured_password_is_enforced() {
    let (addr, _events) = start(Some("s3cret")).await;

    assert!(options(addr, "guess").connect().await.is_err());
    let conn = options(addr, "s3cret").connect().await.unwrap();
    conn.close().await.unwrap();
}
